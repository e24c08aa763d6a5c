use std::fmt;

/// Chat lines the engine asks the host to print. Rendered with `{color}`
/// tags; the host translates tags into its own colour codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Announce { url: String },
    RefreshCooldown { remaining: i64 },
    RefreshInProgress,
    RefreshStarted,
    RefreshCompleted,
    RefreshFailed,
    SprayCooldown { remaining: i64 },
    LoginInProgress,
    LoginUrl { url: String },
    LoginFailed,
    RoundWinCase { prefix: String },
    NoCasesEnabled,
    NoCasesDisabled,
    CaseOpened {
        user_name: String,
        item_name: String,
        rarity: Option<String>,
    },
    TradeUpCompleted {
        user_name: String,
        item_name: String,
        rarity: Option<String>,
    },
}

/// Chat colour tag for an item rarity name.
pub fn rarity_color(rarity: Option<&str>) -> &'static str {
    let rarity = rarity.map(str::to_ascii_lowercase);
    match rarity.as_deref() {
        Some("uncommon") => "{lightblue}",
        Some("rare") => "{blue}",
        Some("mythical") => "{purple}",
        Some("legendary") => "{lightpurple}",
        Some("ancient") => "{red}",
        Some("immortal") => "{gold}",
        _ => "{white}",
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Announce { url } => {
                write!(f, "Equip skins at {{lime}}{url}{{default}}, then type {{lime}}!ws{{default}}.")
            }
            Notice::RefreshCooldown { remaining } => write!(
                f,
                "{{red}}Please wait {remaining} second(s) before refreshing again."
            ),
            Notice::RefreshInProgress => f.write_str("{yellow}Your inventory is already being refreshed."),
            Notice::RefreshStarted => f.write_str("Refreshing your inventory..."),
            Notice::RefreshCompleted => f.write_str("{lime}Your inventory has been refreshed."),
            Notice::RefreshFailed => {
                f.write_str("{red}Could not refresh your inventory. Try again later.")
            }
            Notice::SprayCooldown { remaining } => write!(
                f,
                "{{red}}Please wait {remaining} second(s) before spraying again."
            ),
            Notice::LoginInProgress => f.write_str("Generating your login link..."),
            Notice::LoginUrl { url } => write!(f, "Log in at {{lime}}{url}"),
            Notice::LoginFailed => f.write_str("{red}Could not generate a login link."),
            Notice::RoundWinCase { prefix } => {
                write!(f, "{{gold}}{prefix}{{default}} You received a case for winning the round!")
            }
            Notice::NoCasesEnabled => {
                f.write_str("You will {red}no longer{default} receive round-win cases.")
            }
            Notice::NoCasesDisabled => {
                f.write_str("You will {lime}now{default} receive round-win cases again.")
            }
            Notice::CaseOpened {
                user_name,
                item_name,
                rarity,
            } => write!(
                f,
                "{{lime}}{user_name}{{default}} unboxed {}{item_name}{{default}}.",
                rarity_color(rarity.as_deref())
            ),
            Notice::TradeUpCompleted {
                user_name,
                item_name,
                rarity,
            } => write!(
                f,
                "{{lime}}{user_name}{{default}} received {}{item_name}{{default}} from a trade up.",
                rarity_color(rarity.as_deref())
            ),
        }
    }
}

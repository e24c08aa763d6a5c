use std::sync::Arc;

use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::SyncEngine;
use crate::host::MainTask;
use crate::notice::Notice;
use crate::state::{Flight, PlayerId};

#[derive(Debug)]
pub enum SignInOutcome {
    Disabled,
    NotConnected,
    InProgress,
    /// Resolves to whether a login link was produced.
    Started(JoinHandle<bool>),
}

impl SyncEngine {
    /// Request a one-time login link for `player`. The link, or a failure
    /// notice, is delivered through the main task queue.
    pub fn sign_in(self: &Arc<Self>, player: PlayerId) -> SignInOutcome {
        if !self.config.wslogin_enabled || !self.api.has_api_key() {
            return SignInOutcome::Disabled;
        }
        let Some(entry) = self.registry.lookup(player) else {
            return SignInOutcome::NotConnected;
        };
        if entry.in_flight(Flight::SignIn) {
            return SignInOutcome::InProgress;
        }

        let engine = Arc::clone(self);
        SignInOutcome::Started(tokio::spawn(async move {
            let Some(_guard) = entry.try_begin(Flight::SignIn) else {
                return false;
            };
            let notice = match engine.api.send_sign_in(player).await {
                Ok(Some(response)) => {
                    info!(target: "invsim::sign_in", %player, "sign_in.completed");
                    Notice::LoginUrl {
                        url: engine.login_url(&response.token),
                    }
                }
                Ok(None) => {
                    warn!(target: "invsim::sign_in", %player, "sign_in.failed=empty");
                    Notice::LoginFailed
                }
                Err(err) => {
                    warn!(target: "invsim::sign_in", %player, error = %err, "sign_in.failed");
                    Notice::LoginFailed
                }
            };
            let succeeded = matches!(notice, Notice::LoginUrl { .. });
            engine.main_tasks.push(MainTask::Notify {
                entry: Arc::clone(&entry),
                notice,
            });
            succeeded
        }))
    }

    /// `{url}/api/sign-in/callback?token={token}` with the token encoded.
    pub fn login_url(&self, token: &str) -> String {
        let callback = self.config.endpoint("/api/sign-in/callback");
        match Url::parse(&callback) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("token", token);
                url.into()
            }
            Err(_) => format!("{callback}?token={token}"),
        }
    }
}

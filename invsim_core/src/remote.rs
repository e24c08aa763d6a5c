use std::time::Duration;

use async_trait::async_trait;
use invsim_proto::{
    AddContainerRequest, AddItemInventoryItem, AddItemRequest, EquippedInventory,
    LastCaseOpening, LastTradeUp, SignInRequest, SignInResponse, StatTrakIncrementRequest,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::SyncConfig;
use crate::state::PlayerId;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {path}")]
    Status { path: String, status: u16 },
    #[error("malformed response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("an API key is required to call {0}")]
    MissingApiKey(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The inventory service as seen by the engine.
///
/// Lookups return `Ok(None)` when the service has nothing for the player.
/// The engine logs every `Err` and carries on with the data it already has.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    fn has_api_key(&self) -> bool;

    async fn fetch_equipped(
        &self,
        player: PlayerId,
    ) -> Result<Option<EquippedInventory>, RemoteError>;

    async fn fetch_last_case_opening(
        &self,
        player: PlayerId,
    ) -> Result<Option<LastCaseOpening>, RemoteError>;

    async fn fetch_last_trade_up(
        &self,
        player: PlayerId,
    ) -> Result<Option<LastTradeUp>, RemoteError>;

    async fn send_sign_in(&self, player: PlayerId) -> Result<Option<SignInResponse>, RemoteError>;

    async fn send_stat_trak_increment(
        &self,
        player: PlayerId,
        target_uid: i32,
    ) -> Result<(), RemoteError>;

    async fn send_add_item(&self, player: PlayerId, item_id: u32) -> Result<(), RemoteError>;

    async fn send_add_container(&self, player: PlayerId) -> Result<(), RemoteError>;
}

/// [`InventoryApi`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpInventoryApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpInventoryApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::Client)?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, RemoteError> {
        Self::new(
            config.url.clone(),
            config.api_key().map(str::to_string),
            config.request_timeout(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn require_key(&self, call: &'static str) -> Result<String, RemoteError> {
        self.api_key
            .clone()
            .ok_or(RemoteError::MissingApiKey(call))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, RemoteError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                path: path.to_string(),
                source,
            })?;
        read_optional_json(path, response).await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, RemoteError> {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                path: path.to_string(),
                source,
            })
    }

    async fn post_expect_success<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), RemoteError> {
        let response = self.post_json(path, body).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

async fn read_optional_json<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<Option<T>, RemoteError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(RemoteError::Status {
            path: path.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response
        .text()
        .await
        .map_err(|source| RemoteError::Transport {
            path: path.to_string(),
            source,
        })?;
    decode_optional_body(path, &body)
}

/// Empty and `null` bodies mean "nothing to report".
fn decode_optional_body<T: DeserializeOwned>(
    path: &str,
    body: &str,
) -> Result<Option<T>, RemoteError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| RemoteError::Decode {
            path: path.to_string(),
            source,
        })
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_equipped(
        &self,
        player: PlayerId,
    ) -> Result<Option<EquippedInventory>, RemoteError> {
        self.get_json(&format!("/api/equipped/v4/{}.json", player.user_id()))
            .await
    }

    async fn fetch_last_case_opening(
        &self,
        player: PlayerId,
    ) -> Result<Option<LastCaseOpening>, RemoteError> {
        self.get_json(&format!("/api/last-case-opening/{}", player.user_id()))
            .await
    }

    async fn fetch_last_trade_up(
        &self,
        player: PlayerId,
    ) -> Result<Option<LastTradeUp>, RemoteError> {
        self.get_json(&format!("/api/last-trade-up/{}", player.user_id()))
            .await
    }

    async fn send_sign_in(&self, player: PlayerId) -> Result<Option<SignInResponse>, RemoteError> {
        let path = "/api/sign-in";
        let request = SignInRequest {
            api_key: self.require_key("sign-in")?,
            user_id: player.user_id(),
        };
        let response = self.post_json(path, &request).await?;
        read_optional_json(path, response).await
    }

    async fn send_stat_trak_increment(
        &self,
        player: PlayerId,
        target_uid: i32,
    ) -> Result<(), RemoteError> {
        let request = StatTrakIncrementRequest {
            api_key: self.require_key("increment-item-stattrak")?,
            target_uid,
            user_id: player.user_id(),
        };
        self.post_expect_success("/api/increment-item-stattrak", &request)
            .await
    }

    async fn send_add_item(&self, player: PlayerId, item_id: u32) -> Result<(), RemoteError> {
        let request = AddItemRequest {
            api_key: self.require_key("add-item")?,
            user_id: player.user_id(),
            inventory_item: AddItemInventoryItem { id: item_id },
        };
        self.post_expect_success("/api/add-item", &request).await
    }

    async fn send_add_container(&self, player: PlayerId) -> Result<(), RemoteError> {
        let request = AddContainerRequest {
            api_key: self.require_key("add-container")?,
            user_id: player.user_id(),
            weapon: true,
        };
        self.post_expect_success("/api/add-container", &request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_bodies_mean_no_data() {
        let empty: Option<LastTradeUp> = decode_optional_body("/x", "  ").expect("empty");
        assert!(empty.is_none());
        let null: Option<LastTradeUp> = decode_optional_body("/x", "null").expect("null");
        assert!(null.is_none());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let result: Result<Option<LastTradeUp>, _> = decode_optional_body("/x", "{\"nope\":1}");
        assert!(matches!(result, Err(RemoteError::Decode { .. })));
    }

    #[tokio::test]
    async fn mutating_calls_require_an_api_key() {
        let api = HttpInventoryApi::new("http://127.0.0.1:9", Some(" ".into()), Duration::from_secs(1))
            .expect("client builds");
        assert!(!api.has_api_key());
        let err = api
            .send_add_container(PlayerId(1))
            .await
            .expect_err("no key");
        assert!(matches!(err, RemoteError::MissingApiKey("add-container")));
    }
}

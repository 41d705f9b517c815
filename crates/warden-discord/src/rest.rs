//! Discord REST API client.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{DiscordError, DiscordResult};
use crate::types::{ChannelObject, InteractionResponse, MessageObject, PUBLIC_THREAD, ThreadList};

/// Base URL for the Discord REST API.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Minutes of inactivity before Discord auto-archives a thread.
const AUTO_ARCHIVE_MINUTES: u32 = 1440;

/// Archived threads fetched per lookup.
const ARCHIVED_PAGE: u32 = 100;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/warden-gate/warden, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Thin wrapper around the Discord REST API.
#[derive(Clone)]
pub struct DiscordRest {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl DiscordRest {
    /// Create a client for the public API.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>) -> DiscordResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base: DEFAULT_API_BASE.to_owned(),
            token: token.into(),
        })
    }

    /// Point the client at another API root.
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_owned();
        self
    }

    /// The API root in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    // ── Gateway ──────────────────────────────────────────────

    /// Fetch the Gateway `WebSocket` URL.
    ///
    /// # Errors
    ///
    /// [`DiscordError::AuthenticationFailed`] for a rejected token.
    pub async fn gateway_url(&self) -> DiscordResult<String> {
        #[derive(serde::Deserialize)]
        struct GatewayBot {
            url: String,
        }
        match self.request::<GatewayBot>(Method::GET, "/gateway/bot", None).await {
            Ok(body) => Ok(body.url),
            Err(DiscordError::Api { status: 401, .. }) => Err(DiscordError::AuthenticationFailed),
            Err(e) => Err(e),
        }
    }

    // ── Channels and threads ─────────────────────────────────

    /// Fetch a channel or thread. `None` when it does not exist.
    pub(crate) async fn get_channel(&self, channel_id: &str) -> DiscordResult<Option<ChannelObject>> {
        match self
            .request(Method::GET, &format!("/channels/{channel_id}"), None)
            .await
        {
            Ok(channel) => Ok(Some(channel)),
            Err(DiscordError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Active threads of a guild.
    pub(crate) async fn active_threads(&self, guild_id: &str) -> DiscordResult<ThreadList> {
        self.request(Method::GET, &format!("/guilds/{guild_id}/threads/active"), None)
            .await
    }

    /// Most recently archived public threads of a channel.
    pub(crate) async fn archived_threads(&self, channel_id: &str) -> DiscordResult<ThreadList> {
        self.request(
            Method::GET,
            &format!("/channels/{channel_id}/threads/archived/public?limit={ARCHIVED_PAGE}"),
            None,
        )
        .await
    }

    /// Start a public thread without a starter message.
    pub(crate) async fn create_thread(&self, channel_id: &str, name: &str) -> DiscordResult<ChannelObject> {
        let body = json!({
            "name": name,
            "type": PUBLIC_THREAD,
            "auto_archive_duration": AUTO_ARCHIVE_MINUTES,
        });
        self.request(
            Method::POST,
            &format!("/channels/{channel_id}/threads"),
            Some(&body),
        )
        .await
    }

    /// Archive or unarchive a thread.
    pub(crate) async fn set_archived(&self, thread_id: &str, archived: bool) -> DiscordResult<()> {
        let body = json!({ "archived": archived });
        self.request::<Value>(Method::PATCH, &format!("/channels/{thread_id}"), Some(&body))
            .await
            .map(drop)
    }

    // ── Messages ─────────────────────────────────────────────

    /// Send a message.
    pub(crate) async fn create_message(&self, channel_id: &str, body: &Value) -> DiscordResult<MessageObject> {
        self.request(
            Method::POST,
            &format!("/channels/{channel_id}/messages"),
            Some(body),
        )
        .await
    }

    /// Edit a message.
    pub(crate) async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        body: &Value,
    ) -> DiscordResult<()> {
        self.request::<Value>(
            Method::PATCH,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            Some(body),
        )
        .await
        .map(drop)
    }

    // ── Interactions ─────────────────────────────────────────

    /// Respond to an interaction (initial callback).
    ///
    /// # Errors
    ///
    /// Fails on transport errors or if Discord rejects the response.
    pub async fn interaction_respond(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> DiscordResult<()> {
        let body = serde_json::to_value(response)?;
        self.request::<Value>(
            Method::POST,
            &format!("/interactions/{interaction_id}/{interaction_token}/callback"),
            Some(&body),
        )
        .await
        .map(drop)
    }

    // ── HTTP Helpers ─────────────────────────────────────────

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> DiscordResult<T> {
        let url = format!("{}{path}", self.base);
        trace!(%method, %url, "Discord request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            debug!(%method, path, status = status.as_u16(), "Discord API error");
            return Err(DiscordError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().is_empty() {
            Ok(serde_json::from_value(Value::Null)?)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }
}

//! HTTP client for the broker.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use warden_core::{ApproveRequest, Decision, StopNotice};

use crate::error::{HookError, HookResult};

/// How long a stop notification may take.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the broker's loopback API.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    client: Client,
    base_url: String,
    approve_timeout: Duration,
}

impl BrokerClient {
    /// Create a client for the broker at `base_url`.
    ///
    /// `approve_timeout` must exceed the broker's own timeout plus grace so
    /// the broker always answers first.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, approve_timeout: Duration) -> HookResult<Self> {
        let client = Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            approve_timeout,
        })
    }

    /// The broker base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the broker for a decision. Blocks until a human answers or the
    /// broker times out.
    ///
    /// # Errors
    ///
    /// Transport failures, timeouts and non-success statuses.
    pub async fn approve(&self, request: &ApproveRequest) -> HookResult<Decision> {
        let url = format!("{}/approve", self.base_url);
        debug!(%url, "forwarding approval request");
        let resp = self
            .client
            .post(&url)
            .timeout(self.approve_timeout)
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HookError::Broker {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<Decision>().await?)
    }

    /// Tell the broker the session stopped.
    ///
    /// # Errors
    ///
    /// Transport failures, timeouts and non-success statuses.
    pub async fn notify_stop(&self, notice: &StopNotice) -> HookResult<()> {
        let url = format!("{}/notify-stop", self.base_url);
        let resp = self
            .client
            .post(&url)
            .timeout(STOP_TIMEOUT)
            .json(notice)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HookError::Broker {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

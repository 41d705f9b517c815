//! Discord implementation of [`NotificationChannel`].
//!
//! Session threads are public threads under the configured destination
//! channel. Prompts and notices are embeds with components attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use warden_broker::{
    ChannelError, ChannelResult, MessageRef, Notice, NotificationChannel, Prompt, ThreadRef,
};
use warden_core::Outcome;

use crate::components::{notice_components, notice_embed, outcome_embed, prompt_components, prompt_embed};
use crate::rest::DiscordRest;
use crate::types::ChannelObject;

/// Shared flag set while the Gateway session is live.
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// A flag that starts unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the Gateway is connected.
    #[must_use]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Update the flag.
    pub fn set(&self, ready: bool) {
        let was = self.0.swap(ready, Ordering::AcqRel);
        if was != ready {
            info!(ready, "Discord readiness changed");
        }
    }
}

/// Discord notification channel.
#[derive(Debug)]
pub struct DiscordChannel {
    rest: DiscordRest,
    destination: String,
    guild_id: OnceCell<String>,
    ready: Readiness,
}

impl DiscordChannel {
    /// Create a channel posting under `destination`.
    #[must_use]
    pub fn new(rest: DiscordRest, destination: impl Into<String>, ready: Readiness) -> Self {
        Self {
            rest,
            destination: destination.into(),
            guild_id: OnceCell::new(),
            ready,
        }
    }

    /// The destination channel id.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Check that the destination exists and is reachable.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotFound`] if Discord does not know the channel.
    pub async fn verify_destination(&self) -> ChannelResult<()> {
        self.guild_id().await.map(drop)
    }

    async fn guild_id(&self) -> ChannelResult<&str> {
        self.guild_id
            .get_or_try_init(|| self.lookup_guild())
            .await
            .map(String::as_str)
    }

    async fn lookup_guild(&self) -> ChannelResult<String> {
        let channel = self
            .rest
            .get_channel(&self.destination)
            .await?
            .ok_or_else(|| ChannelError::NotFound(format!("channel {}", self.destination)))?;
        channel.guild_id.ok_or_else(|| {
            ChannelError::NotFound(format!("channel {} is not in a guild", self.destination))
        })
    }

    fn thread_ref(channel: ChannelObject) -> ThreadRef {
        ThreadRef {
            archived: channel.archived(),
            name: channel.name.unwrap_or_default(),
            id: channel.id,
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    async fn fetch_thread(&self, thread_id: &str) -> ChannelResult<Option<ThreadRef>> {
        Ok(self.rest.get_channel(thread_id).await?.map(Self::thread_ref))
    }

    async fn find_thread(&self, name: &str) -> ChannelResult<Option<ThreadRef>> {
        let guild = self.guild_id().await?;
        let active = self.rest.active_threads(guild).await?;
        let under_destination =
            |t: &ChannelObject| t.parent_id.as_deref() == Some(self.destination.as_str());
        if let Some(found) = active
            .threads
            .into_iter()
            .find(|t| under_destination(t) && t.name.as_deref() == Some(name))
        {
            return Ok(Some(Self::thread_ref(found)));
        }

        let archived = self.rest.archived_threads(&self.destination).await?;
        if archived.has_more {
            debug!(name, "only the most recent archived threads were searched");
        }
        Ok(archived
            .threads
            .into_iter()
            .find(|t| t.name.as_deref() == Some(name))
            .map(|t| ThreadRef {
                archived: true,
                ..Self::thread_ref(t)
            }))
    }

    async fn create_thread(&self, name: &str) -> ChannelResult<ThreadRef> {
        let created = self.rest.create_thread(&self.destination, name).await?;
        Ok(Self::thread_ref(created))
    }

    async fn unarchive_thread(&self, thread_id: &str) -> ChannelResult<()> {
        Ok(self.rest.set_archived(thread_id, false).await?)
    }

    async fn archive_thread(&self, thread_id: &str) -> ChannelResult<()> {
        Ok(self.rest.set_archived(thread_id, true).await?)
    }

    async fn post_prompt(&self, thread_id: &str, prompt: &Prompt) -> ChannelResult<MessageRef> {
        let body = json!({
            "embeds": [prompt_embed(prompt)],
            "components": prompt_components(prompt),
            "allowed_mentions": { "parse": [] },
        });
        let msg = self.rest.create_message(thread_id, &body).await?;
        Ok(MessageRef {
            thread_id: msg.channel_id,
            message_id: msg.id,
        })
    }

    async fn post_notice(&self, thread_id: &str, notice: &Notice) -> ChannelResult<MessageRef> {
        let body = json!({
            "embeds": [notice_embed(notice)],
            "components": notice_components(notice),
            "allowed_mentions": { "parse": [] },
        });
        let msg = self.rest.create_message(thread_id, &body).await?;
        Ok(MessageRef {
            thread_id: msg.channel_id,
            message_id: msg.id,
        })
    }

    async fn finalize_prompt(
        &self,
        message: &MessageRef,
        prompt: &Prompt,
        outcome: &Outcome,
    ) -> ChannelResult<()> {
        let body = json!({
            "embeds": [outcome_embed(prompt, outcome)],
            "components": [],
        });
        Ok(self
            .rest
            .edit_message(&message.thread_id, &message.message_id, &body)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_broker::Affordances;
    use warden_core::RequestId;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn channel(server: &MockServer) -> DiscordChannel {
        let rest = DiscordRest::new("tok").unwrap().with_base_url(server.uri());
        DiscordChannel::new(rest, "100", Readiness::new())
    }

    async fn mount_destination(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/channels/100"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "100", "guild_id": "g1"})),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn readiness_flag() {
        let ready = Readiness::new();
        let shared = ready.clone();
        assert!(!ready.get());
        shared.set(true);
        assert!(ready.get());
    }

    #[tokio::test]
    async fn find_thread_prefers_active_under_destination() {
        let server = MockServer::start().await;
        mount_destination(&server).await;
        Mock::given(method("GET"))
            .and(path("/guilds/g1/threads/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"threads": [
                {"id": "other", "name": "app: fix", "parent_id": "999"},
                {"id": "mine", "name": "app: fix", "parent_id": "100"}
            ]})))
            .mount(&server)
            .await;

        let found = channel(&server).await.find_thread("app: fix").await.unwrap();
        assert_eq!(found.unwrap().id, "mine");
    }

    #[tokio::test]
    async fn find_thread_falls_back_to_archived() {
        let server = MockServer::start().await;
        mount_destination(&server).await;
        Mock::given(method("GET"))
            .and(path("/guilds/g1/threads/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"threads": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/channels/100/threads/archived/public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "threads": [{"id": "old", "name": "app: fix", "parent_id": "100"}],
                "has_more": false
            })))
            .mount(&server)
            .await;

        let found = channel(&server)
            .await
            .find_thread("app: fix")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "old");
        assert!(found.archived);
    }

    #[tokio::test]
    async fn unknown_destination_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/100"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Channel"))
            .mount(&server)
            .await;

        let err = channel(&server).await.verify_destination().await.unwrap_err();
        assert!(matches!(err, ChannelError::NotFound(_)));
    }

    #[tokio::test]
    async fn post_prompt_attaches_components() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/t1/messages"))
            .and(body_partial_json(json!({
                "components": [{"type": 1, "components": [{"custom_id": "apr:r1:allow"}]}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "m1", "channel_id": "t1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let prompt = Prompt {
            request_id: RequestId::from("r1"),
            title: "Bash".into(),
            body: "body".into(),
            footer: "footer".into(),
            affordances: Affordances::Approval,
        };
        let msg = channel(&server).await.post_prompt("t1", &prompt).await.unwrap();
        assert_eq!(msg.message_id, "m1");
        assert_eq!(msg.thread_id, "t1");
    }

    #[tokio::test]
    async fn archive_patches_thread() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/channels/t1"))
            .and(body_partial_json(json!({"archived": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1"})))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server).await.archive_thread("t1").await.unwrap();
    }
}

//! Maps sessions to channel threads.

use std::sync::Arc;

use tracing::{debug, info, warn};
use warden_core::SessionId;
use warden_core::text::clip;

use crate::channel::{NotificationChannel, ThreadRef};
use crate::error::BrokerResult;
use crate::session::SessionStore;

/// Resolves, reuses and retires the thread bound to each session.
#[derive(Clone)]
pub struct SessionRouter {
    channel: Arc<dyn NotificationChannel>,
    sessions: Arc<SessionStore>,
    name_max: usize,
}

impl std::fmt::Debug for SessionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRouter")
            .field("name_max", &self.name_max)
            .finish_non_exhaustive()
    }
}

impl SessionRouter {
    /// Create a router. Thread names are clipped to `name_max` characters.
    #[must_use]
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        sessions: Arc<SessionStore>,
        name_max: usize,
    ) -> Self {
        Self {
            channel,
            sessions,
            name_max,
        }
    }

    /// The thread name used for a display title.
    #[must_use]
    pub fn thread_name<'a>(&self, title: &'a str) -> &'a str {
        clip(title.trim(), self.name_max)
    }

    /// Return the session's thread, binding one first if needed.
    ///
    /// Concurrent calls for the same session are serialized, so only one
    /// thread is ever created per session.
    ///
    /// # Errors
    ///
    /// [`BrokerError::ChannelUnavailable`](crate::BrokerError::ChannelUnavailable)
    /// if the channel fails.
    pub async fn resolve_thread(
        &self,
        session: &SessionId,
        display_title: &str,
    ) -> BrokerResult<ThreadRef> {
        let lock = self.sessions.thread_lock(session);
        let _guard = lock.lock().await;

        if let Some(bound) = self.sessions.thread(session) {
            match self.channel.fetch_thread(&bound.id).await? {
                Some(live) => {
                    let live = self.reopen(live).await?;
                    self.sessions.bind_thread(session, live.clone());
                    return Ok(live);
                },
                None => {
                    debug!(%session, thread = %bound.id, "bound thread is gone");
                    self.sessions.unbind_thread(session);
                },
            }
        }

        let name = self.thread_name(display_title);
        let thread = match self.channel.find_thread(name).await? {
            Some(found) => {
                debug!(%session, thread = %found.id, "reusing thread by name");
                self.reopen(found).await?
            },
            None => {
                let created = self.channel.create_thread(name).await?;
                info!(%session, thread = %created.id, name, "created session thread");
                created
            },
        };
        self.sessions.bind_thread(session, thread.clone());
        Ok(thread)
    }

    async fn reopen(&self, thread: ThreadRef) -> BrokerResult<ThreadRef> {
        if !thread.archived {
            return Ok(thread);
        }
        self.channel.unarchive_thread(&thread.id).await?;
        debug!(thread = %thread.id, "unarchived thread");
        Ok(ThreadRef {
            archived: false,
            ..thread
        })
    }

    /// Archive the session's thread and forget the session.
    ///
    /// Archive failures are logged; the session state is cleared regardless.
    pub async fn close_session(&self, session: &SessionId) {
        let lock = self.sessions.thread_lock(session);
        let _guard = lock.lock().await;

        if let Some(thread) = self.sessions.thread(session)
            && let Err(e) = self.channel.archive_thread(&thread.id).await
        {
            warn!(%session, thread = %thread.id, error = %e, "failed to archive thread");
        }
        self.sessions.clear(session);
        debug!(%session, "session closed");
    }
}

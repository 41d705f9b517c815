//! Session completion notices and terminal replies.

use std::sync::Arc;

use tracing::{debug, info, warn};
use warden_core::{InteractionReply, SessionId, TerminalReply};

use crate::channel::NotificationChannel;
use crate::render::render_completion;
use crate::router::SessionRouter;
use crate::session::SessionStore;
use crate::terminal::TerminalInjector;

/// A session that stopped.
#[derive(Debug, Clone, Default)]
pub struct SessionEnd {
    /// The session.
    pub session_id: SessionId,
    /// Thread title, used only if the session has no bound thread.
    pub display_title: String,
    /// Last thing the agent said.
    pub summary: String,
    /// Why the agent stopped.
    pub stop_reason: Option<String>,
}

/// Posts completion notices and routes terminal replies.
#[derive(Clone)]
pub struct CompletionNotifier {
    channel: Arc<dyn NotificationChannel>,
    sessions: Arc<SessionStore>,
    router: SessionRouter,
    injector: Arc<dyn TerminalInjector>,
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier").finish_non_exhaustive()
    }
}

impl CompletionNotifier {
    /// Create a notifier.
    #[must_use]
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        sessions: Arc<SessionStore>,
        router: SessionRouter,
        injector: Arc<dyn TerminalInjector>,
    ) -> Self {
        Self {
            channel,
            sessions,
            router,
            injector,
        }
    }

    /// Tell the human a session stopped.
    ///
    /// Sessions that never needed a human are skipped. With a live terminal
    /// the notice offers quick replies and the session stays open; without
    /// one the session's thread is archived and its state cleared. Failures
    /// are logged and never surface to the caller.
    pub async fn notify_session_end(&self, end: SessionEnd) {
        let session = &end.session_id;
        if !self.sessions.required_approval(session) {
            debug!(%session, "session never needed approval; no notice");
            return;
        }

        let live = match self.sessions.pane(session) {
            Some(pane) => self.injector.is_alive(&pane).await,
            None => false,
        };

        let notice = render_completion(
            &end.summary,
            end.stop_reason.as_deref(),
            live.then(|| session.clone()),
        );

        if !self.channel.is_ready() {
            warn!(%session, "channel not ready; completion notice dropped");
        } else {
            match self.router.resolve_thread(session, &end.display_title).await {
                Ok(thread) => {
                    if let Err(e) = self.channel.post_notice(&thread.id, &notice).await {
                        warn!(%session, error = %e, "failed to post completion notice");
                    } else {
                        info!(%session, live, "posted completion notice");
                    }
                },
                Err(e) => warn!(%session, error = %e, "no thread for completion notice"),
            }
        }

        if !live {
            self.router.close_session(session).await;
        }
    }

    /// Type a quick reply into the session's terminal.
    pub async fn handle_terminal(
        &self,
        session: &SessionId,
        reply: &TerminalReply,
    ) -> InteractionReply {
        let Some(pane) = self.sessions.pane(session) else {
            debug!(%session, "no pane recorded");
            return InteractionReply::TerminalUnavailable;
        };
        if !self.injector.is_alive(&pane).await {
            return InteractionReply::TerminalUnavailable;
        }
        match self.injector.inject(&pane, reply.text()).await {
            Ok(()) => InteractionReply::Injected,
            Err(e) => {
                warn!(%session, pane, error = %e, "terminal injection failed");
                InteractionReply::TerminalUnavailable
            },
        }
    }
}

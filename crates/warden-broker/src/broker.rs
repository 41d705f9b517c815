//! The approval broker.
//!
//! Turns an approval request into a prompt in the session's thread, waits
//! for the first resolution (human or timeout) and reports the decision.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use warden_core::{
    ApprovalAction, ApproveRequest, Decision, HealthReport, InteractionEvent, InteractionReply,
    Outcome, RequestId, SessionId, StopNotice, ToolInvocation,
};

use crate::channel::NotificationChannel;
use crate::error::{BrokerError, BrokerResult, ChannelError};
use crate::notifier::{CompletionNotifier, SessionEnd};
use crate::registry::{RequestRegistry, Resolution, Settlement};
use crate::render::render_prompt;
use crate::router::SessionRouter;
use crate::session::{SessionContext, SessionStore};
use crate::terminal::TerminalInjector;
use crate::transcript;

/// Broker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSettings {
    /// How long a human has to answer.
    pub timeout: Duration,
    /// Extra wait before the broker resolves a timeout itself.
    pub grace: Duration,
    /// Longest thread name the channel accepts.
    pub thread_name_max: usize,
    /// Session id characters used when no title is known.
    pub id_fallback_len: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            grace: Duration::from_secs(5),
            thread_name_max: 100,
            id_fallback_len: 8,
        }
    }
}

/// One approval request, validated.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Correlation id.
    pub request_id: RequestId,
    /// Owning session.
    pub session_id: SessionId,
    /// What the agent wants to do.
    pub invocation: ToolInvocation,
    /// Agent working directory.
    pub cwd: Option<PathBuf>,
    /// Session transcript.
    pub transcript: Option<PathBuf>,
    /// Terminal pane.
    pub pane: Option<String>,
    /// Overrides the configured timeout.
    pub timeout: Option<Duration>,
}

impl Submission {
    /// Validate a wire request.
    ///
    /// # Errors
    ///
    /// [`BrokerError::MalformedRequest`] when `request_id` is missing or empty.
    pub fn from_request(req: &ApproveRequest) -> BrokerResult<Self> {
        let request_id = req
            .request_id()
            .ok_or_else(|| BrokerError::MalformedRequest("missing request_id".to_owned()))?;
        Ok(Self {
            request_id,
            session_id: req.session(),
            invocation: req.invocation(),
            cwd: req.cwd.clone(),
            transcript: req.transcript_path.clone(),
            pane: req.pane().map(str::to_owned),
            timeout: None,
        })
    }
}

/// Discards a registered request if the waiting future is dropped early.
struct PendingGuard {
    registry: RequestRegistry,
    request_id: Option<RequestId>,
}

impl PendingGuard {
    fn disarm(&mut self) {
        self.request_id = None;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(id) = self.request_id.take() {
            self.registry.discard(id);
        }
    }
}

/// The approval broker.
#[derive(Clone)]
pub struct ApprovalBroker {
    registry: RequestRegistry,
    sessions: Arc<SessionStore>,
    channel: Arc<dyn NotificationChannel>,
    router: SessionRouter,
    notifier: CompletionNotifier,
    settings: BrokerSettings,
}

impl std::fmt::Debug for ApprovalBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalBroker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ApprovalBroker {
    /// Create a broker and start its registry task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        injector: Arc<dyn TerminalInjector>,
        settings: BrokerSettings,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let router = SessionRouter::new(
            Arc::clone(&channel),
            Arc::clone(&sessions),
            settings.thread_name_max,
        );
        let notifier = CompletionNotifier::new(
            Arc::clone(&channel),
            Arc::clone(&sessions),
            router.clone(),
            injector,
        );
        Self {
            registry: RequestRegistry::spawn(),
            sessions,
            channel,
            router,
            notifier,
            settings,
        }
    }

    /// The broker settings.
    #[must_use]
    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Session state.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The session router.
    #[must_use]
    pub fn router(&self) -> &SessionRouter {
        &self.router
    }

    /// Validate and submit a wire request.
    ///
    /// # Errors
    ///
    /// See [`Submission::from_request`] and [`ApprovalBroker::submit`].
    pub async fn approve(&self, req: &ApproveRequest) -> BrokerResult<Decision> {
        self.submit(Submission::from_request(req)?).await
    }

    /// Ask a human about one invocation and wait for the decision.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::DuplicateRequest`] if the id is already pending.
    /// - [`BrokerError::ChannelUnavailable`] if the prompt could not be
    ///   posted; the pending entry is removed.
    /// - [`BrokerError::Shutdown`] if the registry has stopped.
    pub async fn submit(&self, sub: Submission) -> BrokerResult<Decision> {
        let Submission {
            request_id,
            session_id: session,
            invocation,
            cwd,
            transcript,
            pane,
            timeout,
        } = sub;
        let timeout = timeout.unwrap_or(self.settings.timeout);

        self.sessions.observe(
            &session,
            SessionContext {
                cwd: cwd.as_deref(),
                transcript: transcript.as_deref(),
                pane: pane.as_deref(),
            },
        );

        let mut rx = self
            .registry
            .register(
                request_id.clone(),
                session.clone(),
                invocation.questions().to_vec(),
            )
            .await?;
        let mut guard = PendingGuard {
            registry: self.registry.clone(),
            request_id: Some(request_id.clone()),
        };
        self.sessions.mark_required(&session);

        if self.sessions.is_escalated(&session) {
            guard.disarm();
            let outcome = match self
                .registry
                .resolve(request_id.clone(), Resolution::Outcome(Outcome::AutoAllowed))
                .await
            {
                Ok(Settlement::Resolved { outcome, .. }) => outcome,
                _ => rx.await.unwrap_or(Outcome::Shutdown),
            };
            info!(%request_id, %session, tool = invocation.tool_name(), "auto-allowed (session escalated)");
            return Ok(outcome.decision());
        }

        if !self.channel.is_ready() {
            warn!(%request_id, %session, "channel not ready");
            return Err(ChannelError::NotReady.into());
        }

        // A bound thread may have been deleted, so the router can still need a name.
        let title = self.display_title(&session).await;
        let thread = self.router.resolve_thread(&session, &title).await?;

        let prompt = render_prompt(&request_id, &invocation, timeout);
        let message = self.channel.post_prompt(&thread.id, &prompt).await?;
        info!(
            %request_id,
            %session,
            tool = invocation.tool_name(),
            thread = %thread.id,
            "approval prompt posted"
        );

        let wait = timeout.saturating_add(self.settings.grace);
        let outcome = match tokio::time::timeout(wait, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Outcome::Shutdown,
            Err(_) => match self
                .registry
                .resolve(request_id.clone(), Resolution::Outcome(Outcome::TimedOut))
                .await
            {
                Ok(Settlement::Resolved { outcome, .. }) => outcome,
                _ => rx.await.unwrap_or(Outcome::Shutdown),
            },
        };
        guard.disarm();

        if outcome == Outcome::AllowedAll {
            self.sessions.escalate(&session);
        }
        info!(%request_id, %session, outcome = outcome.label(), "request resolved");

        let channel = Arc::clone(&self.channel);
        let finalized = outcome.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.finalize_prompt(&message, &prompt, &finalized).await {
                debug!(request_id = %prompt.request_id, error = %e, "failed to update prompt");
            }
        });

        Ok(outcome.decision())
    }

    /// Handle a session stop.
    pub async fn notify_stop(&self, notice: &StopNotice) {
        let session = notice.session();
        if !self.sessions.required_approval(&session) {
            debug!(%session, "stop for a session that never needed approval");
            return;
        }
        self.sessions.observe(
            &session,
            SessionContext {
                cwd: notice.cwd.as_deref(),
                transcript: notice.transcript_path.as_deref(),
                pane: notice.pane(),
            },
        );

        let state = self.sessions.get(&session).unwrap_or_default();
        let summary = match state.transcript.clone() {
            Some(path) => tokio::task::spawn_blocking(move || transcript::last_assistant_text(&path))
                .await
                .ok()
                .flatten()
                .unwrap_or_default(),
            None => String::new(),
        };
        let display_title = self.display_title(&session).await;
        let stop_reason = Some(notice.stop_reason.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_owned);

        self.notifier
            .notify_session_end(SessionEnd {
                session_id: session,
                display_title,
                summary,
                stop_reason,
            })
            .await;
    }

    /// Apply a human's interaction.
    pub async fn handle_interaction(&self, event: InteractionEvent) -> InteractionReply {
        match event {
            InteractionEvent::Approval { request_id, action } => {
                self.handle_approval(request_id, action).await
            },
            InteractionEvent::Terminal { session_id, reply } => {
                self.notifier.handle_terminal(&session_id, &reply).await
            },
        }
    }

    async fn handle_approval(&self, request_id: RequestId, action: ApprovalAction) -> InteractionReply {
        let resolution = match action {
            ApprovalAction::Allow => Resolution::Outcome(Outcome::Allowed),
            ApprovalAction::Deny => Resolution::Outcome(Outcome::Denied),
            ApprovalAction::AllowAll => Resolution::Outcome(Outcome::AllowedAll),
            ApprovalAction::Reply(text) => Resolution::Outcome(Outcome::Replied(text)),
            ApprovalAction::Answer(text) => Resolution::Answer(text),
            ApprovalAction::Submit => Resolution::Submit,
            ApprovalAction::Select { question, values } => {
                return match self.registry.select(request_id.clone(), question, values).await {
                    Ok(()) => InteractionReply::Recorded,
                    Err(e) => {
                        debug!(%request_id, error = %e, "selection ignored");
                        InteractionReply::Expired
                    },
                };
            },
        };

        match self.registry.resolve(request_id.clone(), resolution).await {
            Ok(Settlement::Resolved {
                session_id,
                outcome,
            }) => {
                if outcome == Outcome::AllowedAll {
                    self.sessions.escalate(&session_id);
                }
                InteractionReply::Resolved { outcome }
            },
            Ok(Settlement::Incomplete { missing }) => InteractionReply::Incomplete { missing },
            Err(e) => {
                debug!(%request_id, error = %e, "interaction lost the race");
                InteractionReply::Expired
            },
        }
    }

    /// Requests waiting for a human.
    pub async fn pending(&self) -> usize {
        self.registry.len().await
    }

    /// Service health.
    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok".to_owned(),
            channel_ready: self.channel.is_ready(),
            pending: self.pending().await,
            sessions: self.sessions.len(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }

    /// Resolve everything still pending with a shutdown denial.
    pub async fn shutdown(&self) -> usize {
        let drained = self.registry.drain(Outcome::Shutdown).await;
        if drained > 0 {
            info!(drained, "pending requests released for shutdown");
        }
        drained
    }

    async fn display_title(&self, session: &SessionId) -> String {
        let state = self.sessions.get(session).unwrap_or_default();
        let title = match state.transcript.clone() {
            Some(path) => tokio::task::spawn_blocking(move || transcript::session_title(&path))
                .await
                .ok()
                .flatten(),
            None => None,
        };
        transcript::display_title(
            session,
            state.cwd.as_deref(),
            title.as_deref(),
            self.settings.id_fallback_len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_requires_request_id() {
        let req = ApproveRequest {
            request_id: Some("  ".into()),
            tool_name: "Bash".into(),
            ..ApproveRequest::default()
        };
        let err = Submission::from_request(&req).unwrap_err();
        assert!(matches!(err, BrokerError::MalformedRequest(_)));
    }

    #[test]
    fn submission_carries_context() {
        let req = ApproveRequest {
            request_id: Some("r1".into()),
            tool_name: "Bash".into(),
            tool_input: serde_json::json!({"command": "rm a"}),
            session_id: "s1".into(),
            cwd: Some(PathBuf::from("/w")),
            tmux_pane: Some(String::new()),
            ..ApproveRequest::default()
        };
        let sub = Submission::from_request(&req).unwrap();
        assert_eq!(sub.request_id, RequestId::from("r1"));
        assert_eq!(sub.session_id, SessionId::from("s1"));
        assert!(sub.pane.is_none());
        assert_eq!(sub.invocation.tool_name(), "Bash");
    }

    #[test]
    fn default_settings() {
        let s = BrokerSettings::default();
        assert_eq!(s.timeout, Duration::from_secs(300));
        assert_eq!(s.grace, Duration::from_secs(5));
    }
}

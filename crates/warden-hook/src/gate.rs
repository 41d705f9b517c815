//! The pre-tool-use gate: classify locally, ask the broker only when a
//! human is needed, and fall through to the agent's own prompting on any
//! failure.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};
use warden_classifier::{Assessment, GitCli, RiskClassifier, RuleSet, VersionControl};
use warden_config::Config;
use warden_core::{ApproveRequest, Decision, StopNotice, Verdict};

use crate::client::BrokerClient;
use crate::error::{HookError, HookResult};
use crate::terminal::TerminalContext;

/// What the hook prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    /// Print nothing; the agent handles the call natively.
    Defer,
    /// Print the decision.
    Decide(Decision),
}

impl HookOutput {
    /// The stdout line, if any.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Defer => None,
            Self::Decide(decision) => serde_json::to_string(decision).ok(),
        }
    }
}

/// Classifier plus broker client.
pub struct Gate<V = GitCli> {
    classifier: Arc<RiskClassifier<V>>,
    client: BrokerClient,
}

impl<V> std::fmt::Debug for Gate<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("broker", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

impl Gate<GitCli> {
    /// Build the gate the hook binary uses.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in rules fail to compile or the HTTP
    /// client cannot be created.
    pub fn from_config(config: &Config) -> HookResult<Self> {
        let classifier = RiskClassifier::new(RuleSet::builtin()?, GitCli::default())
            .with_safe_tools(config.classifier.safe_tools.iter().cloned())
            .with_question_tools(config.classifier.question_tools.iter().cloned());
        let client = BrokerClient::new(
            config.hook.server_url(&config.server),
            config.approval.client_timeout(),
        )?;
        Ok(Self::new(classifier, client))
    }
}

impl<V: VersionControl + 'static> Gate<V> {
    /// Combine a classifier and a client.
    #[must_use]
    pub fn new(classifier: RiskClassifier<V>, client: BrokerClient) -> Self {
        Self {
            classifier: Arc::new(classifier),
            client,
        }
    }

    /// Decide on one tool call. Never fails: errors become
    /// [`HookOutput::Defer`].
    pub async fn pre_tool_use(&self, request: ApproveRequest, terminal: &TerminalContext) -> HookOutput {
        info!(
            tool = %request.tool_name,
            session_id = %request.session_id,
            "START"
        );

        let assessment = match self.assess(&request, terminal.inside_tmux).await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "classification failed; deferring");
                return HookOutput::Defer;
            },
        };
        debug!(findings = ?assessment.findings, "classified");

        match assessment.verdict {
            Verdict::AutoAllow => {
                info!(tool = %request.tool_name, "AUTO_ALLOW");
                HookOutput::Decide(Decision::Allow)
            },
            Verdict::PassThrough => {
                info!(tool = %request.tool_name, "PASS_THROUGH: no terminal to answer from");
                HookOutput::Defer
            },
            Verdict::NeedsApproval => self.forward(request, terminal).await,
        }
    }

    async fn assess(&self, request: &ApproveRequest, reachable: bool) -> HookResult<Assessment> {
        let classifier = Arc::clone(&self.classifier);
        let invocation = request.invocation();
        let cwd = request
            .cwd
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::task::spawn_blocking(move || classifier.assess(&invocation, &cwd, reachable))
            .await
            .map_err(|e| HookError::Join(e.to_string()))
    }

    async fn forward(&self, mut request: ApproveRequest, terminal: &TerminalContext) -> HookOutput {
        if request.request_id().is_none() {
            request.request_id = Some(uuid::Uuid::new_v4().to_string());
        }
        if request.pane().is_none() {
            request.tmux_pane.clone_from(&terminal.pane);
        }
        info!(
            tool = %request.tool_name,
            request_id = request.request_id.as_deref().unwrap_or_default(),
            "FORWARD"
        );

        match self.client.approve(&request).await {
            Ok(decision) => {
                info!(
                    tool = %request.tool_name,
                    allowed = decision.is_allowed(),
                    reason = decision.reason().unwrap_or_default(),
                    "RESPONSE"
                );
                HookOutput::Decide(decision)
            },
            Err(e) => {
                warn!(error = %e, "broker unavailable; deferring");
                HookOutput::Defer
            },
        }
    }
}

/// Report a stopped session to the broker. Failures are logged only.
pub async fn notify_stop(client: &BrokerClient, mut notice: StopNotice, terminal: &TerminalContext) {
    if notice.tmux_pane.as_deref().is_none_or(str::is_empty) {
        notice.tmux_pane.clone_from(&terminal.pane);
    }
    info!(session_id = %notice.session_id, pane = ?notice.tmux_pane, "STOP");
    if let Err(e) = client.notify_stop(&notice).await {
        warn!(error = %e, "stop notification failed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use serde_json::json;
    use warden_test::{approve_request, bash_request, question_request, stop_notice};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate(base_url: &str) -> Gate {
        let classifier = RiskClassifier::new(RuleSet::builtin().unwrap(), GitCli::default());
        Gate::new(
            classifier,
            BrokerClient::new(base_url, Duration::from_secs(5)).unwrap(),
        )
    }

    fn in_tmux() -> TerminalContext {
        TerminalContext::from_vars(Some("/tmp/tmux"), Some("%7"))
    }

    #[test]
    fn render_shapes() {
        assert_eq!(HookOutput::Defer.render(), None);
        assert_eq!(
            HookOutput::Decide(Decision::Allow).render().as_deref(),
            Some(r#"{"decision":"allow"}"#)
        );
    }

    #[tokio::test]
    async fn safe_tool_is_allowed_without_broker() {
        let server = MockServer::start().await;
        let out = gate(&server.uri())
            .pre_tool_use(
                approve_request("r1", "s1", "Read", json!({"file_path": "/etc/hosts"})),
                &TerminalContext::none(),
            )
            .await;
        assert_eq!(out, HookOutput::Decide(Decision::Allow));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn harmless_command_is_allowed() {
        let server = MockServer::start().await;
        let out = gate(&server.uri())
            .pre_tool_use(bash_request("r1", "s1", "ls -la"), &TerminalContext::none())
            .await;
        assert_eq!(out, HookOutput::Decide(Decision::Allow));
    }

    #[tokio::test]
    async fn question_outside_tmux_defers() {
        let server = MockServer::start().await;
        let out = gate(&server.uri())
            .pre_tool_use(question_request("r1", "s1", &["A", "B"]), &TerminalContext::none())
            .await;
        assert_eq!(out, HookOutput::Defer);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_rewrite_is_forwarded_with_pane() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approve"))
            .and(body_partial_json(json!({"tool_name": "Bash", "tmux_pane": "%7"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"decision": "deny", "reason": "use a branch"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut req = bash_request("r1", "s1", "git reset --hard HEAD~3");
        req.request_id = None;
        let out = gate(&server.uri()).pre_tool_use(req, &in_tmux()).await;
        assert_eq!(out, HookOutput::Decide(Decision::deny("use a branch")));

        let sent: serde_json::Value =
            serde_json::from_slice(&server.received_requests().await.unwrap()[0].body).unwrap();
        assert!(!sent["request_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broker_down_defers() {
        let out = gate("http://127.0.0.1:9")
            .pre_tool_use(bash_request("r1", "s1", "git clean -fdx"), &in_tmux())
            .await;
        assert_eq!(out, HookOutput::Defer);
    }

    #[tokio::test]
    async fn broker_error_defers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approve"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let out = gate(&server.uri())
            .pre_tool_use(bash_request("r1", "s1", "git clean -fdx"), &in_tmux())
            .await;
        assert_eq!(out, HookOutput::Defer);
    }

    #[tokio::test]
    async fn stop_fills_in_pane() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify-stop"))
            .and(body_partial_json(json!({"session_id": "s1", "tmux_pane": "%7"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = BrokerClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        notify_stop(&client, stop_notice("s1"), &in_tmux()).await;
    }
}

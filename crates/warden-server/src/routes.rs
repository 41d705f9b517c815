//! HTTP routes.
//!
//! | Method | Path           | Handler          |
//! |--------|----------------|------------------|
//! | POST   | `/approve`     | [`approve`]      |
//! | POST   | `/notify-stop` | [`notify_stop`]  |
//! | GET    | `/health`      | [`health`]       |

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use warden_broker::ApprovalBroker;
use warden_core::{ApproveRequest, Decision, HealthReport, StatusResponse, StopNotice};

use crate::error::{ServerError, ServerResult};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The broker behind the routes.
    pub broker: ApprovalBroker,
}

impl AppState {
    /// Wrap a broker.
    #[must_use]
    pub fn new(broker: ApprovalBroker) -> Self {
        Self { broker }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/approve", post(approve))
        .route("/notify-stop", post(notify_stop))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Block until a human decides on the request.
///
/// The body is parsed by hand so a malformed envelope maps to a 400 with
/// the same `{"error": ..}` shape as every other failure.
pub async fn approve(State(state): State<AppState>, body: Bytes) -> ServerResult<Json<Decision>> {
    let req: ApproveRequest =
        serde_json::from_slice(&body).map_err(|e| ServerError::BadBody(e.to_string()))?;
    info!(
        request_id = req.request_id.as_deref().unwrap_or_default(),
        session_id = %req.session_id,
        tool = %req.tool_name,
        "approval requested"
    );
    let decision = state.broker.approve(&req).await?;
    Ok(Json(decision))
}

/// Record that a session stopped. Always acknowledges.
pub async fn notify_stop(State(state): State<AppState>, body: Bytes) -> Json<StatusResponse> {
    match serde_json::from_slice::<StopNotice>(&body) {
        Ok(notice) => {
            debug!(session_id = %notice.session_id, "stop notice received");
            let broker = state.broker.clone();
            tokio::spawn(async move { broker.notify_stop(&notice).await });
        },
        Err(e) => debug!(error = %e, "ignoring unreadable stop notice"),
    }
    Json(StatusResponse::ok())
}

/// Service and channel readiness.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.broker.health().await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use warden_broker::BrokerSettings;
    use warden_core::{ApprovalAction, InteractionEvent, RequestId};
    use warden_test::{MockChannel, MockInjector, bash_request, stop_notice};

    use super::*;

    fn broker(channel: &MockChannel) -> ApprovalBroker {
        ApprovalBroker::new(
            Arc::new(channel.clone()),
            Arc::new(MockInjector::new()),
            BrokerSettings::default(),
        )
    }

    fn post_json(uri: &str, body: &impl serde::Serialize) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_readiness() {
        let channel = MockChannel::new();
        let app = router(AppState::new(broker(&channel)));

        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["channel_ready"], true);
        assert_eq!(body["pending"], 0);
    }

    #[tokio::test]
    async fn approve_without_request_id_is_rejected() {
        let channel = MockChannel::new();
        let app = router(AppState::new(broker(&channel)));
        let mut req = bash_request("r1", "s1", "rm -rf build");
        req.request_id = None;

        let resp = app.oneshot(post_json("/approve", &req)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(resp).await["error"].is_string());
        assert!(channel.prompts().is_empty());
        assert_eq!(channel.created_count(), 0);
    }

    #[tokio::test]
    async fn approve_with_garbage_body_is_rejected() {
        let channel = MockChannel::new();
        let app = router(AppState::new(broker(&channel)));

        let req = Request::post("/approve")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approve_returns_the_human_decision() {
        let channel = MockChannel::new();
        let broker = broker(&channel);
        let app = router(AppState::new(broker.clone()));

        let call = tokio::spawn(app.oneshot(post_json(
            "/approve",
            &bash_request("r1", "s1", "rm -rf build"),
        )));
        channel.wait_for_prompts(1).await;
        broker
            .handle_interaction(InteractionEvent::Approval {
                request_id: RequestId::from("r1"),
                action: ApprovalAction::Allow,
            })
            .await;

        let resp = call.await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["decision"], "allow");
    }

    #[tokio::test]
    async fn approve_fails_when_channel_is_down() {
        let channel = MockChannel::disconnected();
        let app = router(AppState::new(broker(&channel)));

        let resp = app
            .oneshot(post_json("/approve", &bash_request("r1", "s1", "rm x")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn notify_stop_always_acknowledges() {
        let channel = MockChannel::new();
        let app = router(AppState::new(broker(&channel)));

        let resp = app
            .clone()
            .oneshot(post_json("/notify-stop", &stop_notice("s1")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");

        let garbage = Request::post("/notify-stop").body(Body::from("nope")).unwrap();
        let resp = app.oneshot(garbage).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

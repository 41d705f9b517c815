//! The HTTP surface driven through the axum router, and the hook talking
//! to a live server.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Harness;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use warden_classifier::{GitCli, RiskClassifier, RuleSet};
use warden_core::{ApprovalAction, Decision};
use warden_hook::{BrokerClient, Gate, HookOutput, TerminalContext};
use warden_server::{AppState, router, serve};
use warden_test::{bash_request, stop_notice};

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn to_value(req: &warden_core::ApproveRequest) -> Value {
    serde_json::to_value(req).unwrap()
}

#[tokio::test]
async fn approve_blocks_until_decided() {
    let h = Harness::new();
    let app = router(AppState::new(h.broker.clone()));

    let call = tokio::spawn(
        app.clone()
            .oneshot(post("/approve", &to_value(&bash_request("r1", "s1", "rm a")))),
    );
    h.channel.wait_for_prompts(1).await;

    let health = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health = body_json(health).await;
    assert_eq!(health["pending"], 1);
    assert_eq!(health["sessions"], 1);

    h.act("r1", ApprovalAction::Reply("not on main".into())).await;
    let resp = call.await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"decision": "deny", "reason": "not on main"})
    );
}

#[tokio::test]
async fn missing_request_id_is_400_without_side_effects() {
    let h = Harness::new();
    let app = router(AppState::new(h.broker.clone()));
    let body = json!({"tool_name": "Bash", "tool_input": {"command": "rm a"}, "session_id": "s1"});

    let resp = app.oneshot(post("/approve", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.channel.prompts().is_empty());
    assert_eq!(h.broker.pending().await, 0);
}

#[tokio::test]
async fn duplicate_request_id_is_400() {
    let h = Harness::new();
    let app = router(AppState::new(h.broker.clone()));
    let req = to_value(&bash_request("r1", "s1", "rm a"));

    let first = tokio::spawn(app.clone().oneshot(post("/approve", &req)));
    h.channel.wait_for_prompts(1).await;

    let dup = app.oneshot(post("/approve", &req)).await.unwrap();
    assert_eq!(dup.status(), StatusCode::BAD_REQUEST);

    h.act("r1", ApprovalAction::Allow).await;
    assert_eq!(first.await.unwrap().unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn unreachable_channel_is_500() {
    let h = Harness::new();
    h.channel.set_ready(false);
    let app = router(AppState::new(h.broker.clone()));

    let resp = app
        .oneshot(post("/approve", &to_value(&bash_request("r1", "s1", "rm a"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(resp).await["error"].as_str().unwrap().contains("not ready"));
    assert_eq!(h.broker.pending().await, 0);
}

#[tokio::test]
async fn notify_stop_is_fire_and_forget() {
    let h = Harness::new();
    let app = router(AppState::new(h.broker.clone()));
    let call = h.spawn_approve(bash_request("r1", "s1", "rm a"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::Allow).await;
    call.await.unwrap().unwrap();

    let resp = app
        .oneshot(post(
            "/notify-stop",
            &serde_json::to_value(stop_notice("s1")).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await, json!({"status": "ok"}));

    h.channel.wait_for_notices(1).await;
    h.channel.wait_for_archived(1).await;
}

#[tokio::test]
async fn hook_round_trip_over_http() {
    let h = Harness::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, h.broker.clone(), shutdown.clone()));

    let gate = Gate::new(
        RiskClassifier::new(RuleSet::builtin().unwrap(), GitCli::default()),
        BrokerClient::new(&base, Duration::from_secs(10)).unwrap(),
    );
    let terminal = TerminalContext::from_vars(Some("/tmp/tmux"), Some("%1"));
    let mut req = bash_request("", "s1", "git push --force origin main");
    req.request_id = None;

    let hook = tokio::spawn(async move { gate.pre_tool_use(req, &terminal).await });
    let prompts = h.channel.wait_for_prompts(1).await;
    h.act(prompts[0].request_id.as_str(), ApprovalAction::Allow)
        .await;

    assert_eq!(hook.await.unwrap(), HookOutput::Decide(Decision::Allow));
    assert_eq!(
        h.broker
            .sessions()
            .pane(&warden_core::SessionId::from("s1"))
            .as_deref(),
        Some("%1")
    );

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn hook_falls_through_when_server_stops() {
    let h = Harness::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, h.broker.clone(), shutdown.clone()));
    shutdown.cancel();
    server.await.unwrap().unwrap();

    let gate = Gate::new(
        RiskClassifier::new(RuleSet::builtin().unwrap(), GitCli::default()),
        BrokerClient::new(&base, Duration::from_secs(2)).unwrap(),
    );
    let out = gate
        .pre_tool_use(
            bash_request("r1", "s1", "git clean -fdx"),
            &TerminalContext::none(),
        )
        .await;
    assert_eq!(out, HookOutput::Defer);
}

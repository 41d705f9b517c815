//! Session escalation, thread reuse and session close.

mod common;

use common::Harness;
use warden_broker::BrokerSettings;
use warden_core::{
    ApprovalAction, Decision, InteractionEvent, InteractionReply, SessionId, TerminalReply,
};
use warden_test::{MockChannel, MockInjector, bash_request, stop_notice};

fn with_pane(mut req: warden_core::ApproveRequest, pane: &str) -> warden_core::ApproveRequest {
    req.tmux_pane = Some(pane.to_owned());
    req
}

#[tokio::test]
async fn allow_all_short_circuits_until_close() {
    let h = Harness::new();
    let first = h.spawn_approve(bash_request("r1", "s1", "rm -rf build"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::AllowAll).await;
    assert_eq!(first.await.unwrap().unwrap(), Decision::Allow);
    assert!(h.broker.sessions().is_escalated(&SessionId::from("s1")));

    // Even with the channel down, escalated sessions never touch it.
    h.channel.set_ready(false);
    for i in 2..5 {
        let decision = h
            .broker
            .approve(&bash_request(&format!("r{i}"), "s1", "rm -rf dist"))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow);
    }
    assert_eq!(h.channel.prompts().len(), 1);
    h.channel.set_ready(true);

    // Other sessions are unaffected.
    let other = h.spawn_approve(bash_request("r9", "s2", "rm x"));
    h.channel.wait_for_prompts(2).await;
    h.act("r9", ApprovalAction::Deny).await;
    assert!(!other.await.unwrap().unwrap().is_allowed());

    // Closing without a live terminal clears the escalation.
    h.broker.notify_stop(&stop_notice("s1")).await;
    assert!(!h.broker.sessions().is_escalated(&SessionId::from("s1")));
    let again = h.spawn_approve(bash_request("r10", "s1", "rm -rf build"));
    h.channel.wait_for_prompts(3).await;
    h.act("r10", ApprovalAction::Allow).await;
    again.await.unwrap().unwrap();
}

#[tokio::test]
async fn session_reuses_its_thread_across_archive() {
    let h = Harness::new();
    let a = h.spawn_approve(bash_request("r1", "s1", "rm a"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::Allow).await;
    a.await.unwrap().unwrap();

    let (thread_id, _) = h.channel.prompts()[0].clone();
    h.channel.archive_externally(&thread_id);

    let b = h.spawn_approve(bash_request("r2", "s1", "rm b"));
    h.channel.wait_for_prompts(2).await;
    h.act("r2", ApprovalAction::Allow).await;
    b.await.unwrap().unwrap();

    assert_eq!(h.channel.created_count(), 1);
    assert_eq!(h.channel.unarchived(), vec![thread_id.clone()]);
    assert_eq!(h.channel.prompts()[1].0, thread_id);
    assert!(!h.channel.thread(&thread_id).unwrap().archived);
}

#[tokio::test]
async fn restarted_broker_finds_thread_by_name() {
    let channel = MockChannel::new();
    let first = Harness::with(channel.clone(), MockInjector::new(), BrokerSettings::default());
    let call = first.spawn_approve(bash_request("r1", "session-abcdef", "rm a"));
    channel.wait_for_prompts(1).await;
    first.act("r1", ApprovalAction::Allow).await;
    call.await.unwrap().unwrap();
    first.broker.notify_stop(&stop_notice("session-abcdef")).await;
    assert_eq!(channel.archived().len(), 1);

    let second = Harness::with(channel.clone(), MockInjector::new(), BrokerSettings::default());
    let call = second.spawn_approve(bash_request("r2", "session-abcdef", "rm b"));
    channel.wait_for_prompts(2).await;
    second.act("r2", ApprovalAction::Allow).await;
    call.await.unwrap().unwrap();

    assert_eq!(channel.created_count(), 1);
    assert_eq!(channel.unarchived().len(), 1);
}

#[tokio::test]
async fn deleted_thread_is_replaced() {
    let h = Harness::new();
    let a = h.spawn_approve(bash_request("r1", "s1", "rm a"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::Allow).await;
    a.await.unwrap().unwrap();

    let (thread_id, _) = h.channel.prompts()[0].clone();
    h.channel.delete_thread(&thread_id);

    let b = h.spawn_approve(bash_request("r2", "s1", "rm b"));
    h.channel.wait_for_prompts(2).await;
    h.act("r2", ApprovalAction::Allow).await;
    b.await.unwrap().unwrap();

    assert_eq!(h.channel.created_count(), 2);
    let replacement = h.channel.prompts()[1].0.clone();
    assert_ne!(replacement, thread_id);
    assert_eq!(h.channel.thread(&replacement).unwrap().name, "s1");
}

#[tokio::test]
async fn quiet_stops_leave_no_session_behind() {
    let h = Harness::new();
    for i in 0..50 {
        h.broker
            .notify_stop(&stop_notice(&format!("quiet-{i}")))
            .await;
    }
    assert!(h.broker.sessions().is_empty());
    assert_eq!(h.broker.health().await.sessions, 0);
    assert!(h.channel.notices().is_empty());
}

#[tokio::test]
async fn close_with_live_terminal_keeps_session() {
    let injector = MockInjector::new().with_live_pane("%3");
    let h = Harness::with(MockChannel::new(), injector, BrokerSettings::default());
    let call = h.spawn_approve(with_pane(bash_request("r1", "s1", "rm a"), "%3"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::AllowAll).await;
    call.await.unwrap().unwrap();

    h.broker.notify_stop(&stop_notice("s1")).await;

    let notices = h.channel.wait_for_notices(1).await;
    assert_eq!(notices[0].terminal, Some(SessionId::from("s1")));
    assert!(h.channel.archived().is_empty());
    let state = h.broker.sessions().get(&SessionId::from("s1")).unwrap();
    assert!(state.escalated);
    assert!(state.thread.is_some());

    let reply = h
        .broker
        .handle_interaction(InteractionEvent::Terminal {
            session_id: SessionId::from("s1"),
            reply: TerminalReply::Text("run the tests".into()),
        })
        .await;
    assert_eq!(reply, InteractionReply::Injected);
    assert_eq!(
        h.injector.injected(),
        vec![("%3".to_owned(), "run the tests".to_owned())]
    );
}

#[tokio::test]
async fn close_without_terminal_archives_and_clears() {
    let h = Harness::new();
    let call = h.spawn_approve(bash_request("r1", "s1", "rm a"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::AllowAll).await;
    call.await.unwrap().unwrap();
    let (thread_id, _) = h.channel.prompts()[0].clone();

    h.broker.notify_stop(&stop_notice("s1")).await;

    let notices = h.channel.wait_for_notices(1).await;
    assert!(notices[0].terminal.is_none());
    assert_eq!(h.channel.archived(), vec![thread_id]);
    assert!(h.broker.sessions().get(&SessionId::from("s1")).is_none());
}

#[tokio::test]
async fn dead_pane_reports_terminal_unavailable() {
    let injector = MockInjector::new().with_live_pane("%3");
    let h = Harness::with(MockChannel::new(), injector, BrokerSettings::default());
    let call = h.spawn_approve(with_pane(bash_request("r1", "s1", "rm a"), "%3"));
    h.channel.wait_for_prompts(1).await;
    h.act("r1", ApprovalAction::Allow).await;
    call.await.unwrap().unwrap();
    h.broker.notify_stop(&stop_notice("s1")).await;

    h.injector.set_alive("%3", false);
    let reply = h
        .broker
        .handle_interaction(InteractionEvent::Terminal {
            session_id: SessionId::from("s1"),
            reply: TerminalReply::Yes,
        })
        .await;
    assert_eq!(reply, InteractionReply::TerminalUnavailable);
    assert!(h.injector.injected().is_empty());
}

#[tokio::test]
async fn stop_without_prior_approval_is_silent() {
    let h = Harness::new();
    h.broker.notify_stop(&stop_notice("quiet")).await;
    assert!(h.channel.notices().is_empty());
    assert_eq!(h.channel.created_count(), 0);
}

//! Shared harness for broker integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use warden_broker::{ApprovalBroker, BrokerResult, BrokerSettings};
use warden_core::{
    ApprovalAction, ApproveRequest, Decision, InteractionEvent, InteractionReply, RequestId,
};
use warden_test::{MockChannel, MockInjector};

/// A broker wired to mocks.
pub struct Harness {
    pub channel: MockChannel,
    pub injector: MockInjector,
    pub broker: ApprovalBroker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MockChannel::new(), MockInjector::new(), BrokerSettings::default())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with(
            MockChannel::new(),
            MockInjector::new(),
            BrokerSettings {
                timeout,
                grace: Duration::from_millis(50),
                ..BrokerSettings::default()
            },
        )
    }

    pub fn with(channel: MockChannel, injector: MockInjector, settings: BrokerSettings) -> Self {
        warden_test::init_test_logging();
        let broker = ApprovalBroker::new(
            Arc::new(channel.clone()),
            Arc::new(injector.clone()),
            settings,
        );
        Self {
            channel,
            injector,
            broker,
        }
    }

    /// Submit in the background; the caller blocks until resolution.
    pub fn spawn_approve(&self, req: ApproveRequest) -> JoinHandle<BrokerResult<Decision>> {
        let broker = self.broker.clone();
        tokio::spawn(async move { broker.approve(&req).await })
    }

    pub async fn act(&self, request_id: &str, action: ApprovalAction) -> InteractionReply {
        self.broker
            .handle_interaction(InteractionEvent::Approval {
                request_id: RequestId::from(request_id),
                action,
            })
            .await
    }
}

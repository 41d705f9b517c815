//! Warden Test - Shared test utilities.
//!
//! Mock implementations of the broker seams and fixtures for envelopes
//! and throwaway git repositories, used as a dev-dependency across the
//! workspace.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_test::{MockChannel, MockInjector, bash_request};
//!
//! let channel = MockChannel::new();
//! let broker = ApprovalBroker::new(
//!     Arc::new(channel.clone()),
//!     Arc::new(MockInjector::new()),
//!     BrokerSettings::default(),
//! );
//! let pending = tokio::spawn(async move { broker.approve(&bash_request("r1", "s1", "rm x")).await });
//! let prompt = channel.wait_for_prompts(1).await.remove(0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

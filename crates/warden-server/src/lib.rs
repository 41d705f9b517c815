//! Warden Server - the broker service.
//!
//! Wires the Discord channel, the approval broker and the Gateway listener
//! together and exposes them over a loopback HTTP API:
//!
//! - `POST /approve` blocks until a human (or the timeout) decides.
//! - `POST /notify-stop` reports that an agent session stopped.
//! - `GET /health` reports readiness.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod routes;
pub mod service;

pub use error::{ServerError, ServerResult};
pub use routes::{AppState, router};
pub use service::{broker_settings, run, serve};

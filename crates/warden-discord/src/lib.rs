//! Warden Discord - the Discord notification channel.
//!
//! This crate provides:
//! - [`DiscordRest`]: a thin REST client for channels, threads, messages
//!   and interaction callbacks.
//! - [`DiscordChannel`]: the [`NotificationChannel`] implementation that
//!   keeps one thread per agent session.
//! - [`GatewayClient`]: the Gateway listener that delivers button presses
//!   and modal submissions to the broker through an
//!   [`InteractionHandler`].
//!
//! [`NotificationChannel`]: warden_broker::NotificationChannel

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod channel;
pub mod components;
pub mod error;
pub mod gateway;
pub mod interactions;
pub mod rest;
pub mod types;

pub use channel::{DiscordChannel, Readiness};
pub use error::{DiscordError, DiscordResult};
pub use gateway::{GatewayClient, GatewayConfig};
pub use interactions::{InteractionHandler, InteractionSink, Route};
pub use rest::{DEFAULT_API_BASE, DiscordRest};

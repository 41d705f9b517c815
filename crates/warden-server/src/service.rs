//! Startup wiring: Discord channel, broker, Gateway listener and HTTP
//! server, all stopped by one cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warden_broker::{ApprovalBroker, BrokerSettings, TmuxInjector};
use warden_config::Config;
use warden_discord::{DiscordChannel, DiscordRest, GatewayClient, InteractionHandler, Readiness};

use crate::error::ServerResult;
use crate::routes::{AppState, router};

/// Broker tuning taken from the configuration.
#[must_use]
pub fn broker_settings(config: &Config) -> BrokerSettings {
    BrokerSettings {
        timeout: config.approval.timeout(),
        grace: Duration::from_secs(config.approval.grace_secs),
        thread_name_max: config.session.thread_name_max,
        id_fallback_len: config.session.id_fallback_len,
    }
}

/// Run the broker service until `shutdown` is cancelled.
///
/// A fatal Gateway error (rejected token, bad intents) cancels `shutdown`
/// and is returned once the HTTP server has drained.
///
/// # Errors
///
/// Missing credentials, an unbindable address, or a fatal Gateway error.
pub async fn run(config: Config, shutdown: CancellationToken) -> ServerResult<()> {
    let credentials = config.channel.credentials()?;
    let rest = DiscordRest::new(credentials.token)?;
    let ready = Readiness::new();
    let channel = DiscordChannel::new(rest.clone(), credentials.destination, ready.clone());
    match channel.verify_destination().await {
        Ok(()) => info!(destination = channel.destination(), "destination channel verified"),
        Err(e) => warn!(
            destination = channel.destination(),
            error = %e,
            "destination channel could not be verified"
        ),
    }

    let broker = ApprovalBroker::new(
        Arc::new(channel),
        Arc::new(TmuxInjector::new()),
        broker_settings(&config),
    );
    let handler = InteractionHandler::new(
        rest.clone(),
        Arc::new(broker.clone()),
        config.channel.allowed_users.clone(),
    );

    let gateway = GatewayClient::new(rest, handler, ready, shutdown.child_token());
    let on_fatal = shutdown.clone();
    let gateway_task = tokio::spawn(async move {
        let result = gateway.run().await;
        if let Err(e) = &result {
            error!(error = %e, "Discord gateway stopped; shutting down");
            on_fatal.cancel();
        }
        result
    });

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, timeout_secs = config.approval.timeout_secs, "broker listening");
    serve(listener, broker, shutdown.clone()).await?;

    shutdown.cancel();
    match gateway_task.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "gateway task ended abnormally"),
    }
    debug!("broker stopped");
    Ok(())
}

/// Serve the HTTP routes on `listener` until `shutdown` is cancelled.
///
/// On cancellation every pending approval is released with a shutdown
/// denial so blocked callers return before the server finishes.
///
/// # Errors
///
/// Returns an I/O error if the server fails.
pub async fn serve(
    listener: TcpListener,
    broker: ApprovalBroker,
    shutdown: CancellationToken,
) -> ServerResult<()> {
    let drain = broker.clone();
    let app = router(AppState::new(broker));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("shutdown requested");
            drain.shutdown().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_config::ConfigError;
    use warden_test::{MockChannel, MockInjector};

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.approval.timeout_secs = 60;
        config.approval.grace_secs = 2;
        config.session.thread_name_max = 80;

        let settings = broker_settings(&config);
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(settings.grace, Duration::from_secs(2));
        assert_eq!(settings.thread_name_max, 80);
        assert_eq!(settings.id_fallback_len, 8);
    }

    #[tokio::test]
    async fn run_requires_credentials() {
        let err = run(Config::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ServerError::Config(ConfigError::MissingField { .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_releases_pending_callers() {
        let channel = MockChannel::new();
        let broker = ApprovalBroker::new(
            Arc::new(channel.clone()),
            Arc::new(MockInjector::new()),
            BrokerSettings::default(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, broker.clone(), shutdown.clone()));

        let waiting = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .approve(&warden_test::bash_request("r1", "s1", "rm -rf out"))
                    .await
            })
        };
        channel.wait_for_prompts(1).await;

        shutdown.cancel();
        let decision = waiting.await.unwrap().unwrap();
        assert!(!decision.is_allowed());
        assert_eq!(decision.reason(), Some(warden_core::SHUTDOWN_REASON));
        server.await.unwrap().unwrap();
    }
}

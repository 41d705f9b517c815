//! Discord Gateway listener.
//!
//! Keeps an outbound `WebSocket` to the Gateway so that button presses,
//! select menus and modal submissions reach the broker. Reconnects with
//! resume when Discord allows it and flips the shared [`Readiness`] flag
//! so the broker knows whether prompts can be answered at all.

mod heartbeat;
pub(crate) mod protocol;
mod reconnect;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use self::heartbeat::{HeartbeatLink, HeartbeatState};
use self::protocol::{CloseKind, Event, Inbound, Outbound};
use self::reconnect::Reconnects;
use crate::channel::Readiness;
use crate::error::{DiscordError, DiscordResult};
use crate::interactions::InteractionHandler;
use crate::rest::DiscordRest;
use crate::types::Interaction;

/// How long to wait for Hello after connecting.
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the writer gets to flush after the loop ends.
const WRITER_FLUSH: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsReader = SplitStream<WsStream>;
type WsWriter = SplitSink<WsStream, Message>;

/// Gateway connection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Intents bitmask sent in Identify.
    pub intents: u32,
    /// Base reconnect delay.
    pub backoff_base: Duration,
    /// Reconnect delay cap.
    pub backoff_max: Duration,
    /// Consecutive failed reconnects before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            intents: protocol::DEFAULT_INTENTS,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            max_reconnect_attempts: u32::MAX,
        }
    }
}

/// Resume state carried across reconnects.
#[derive(Debug, Default)]
struct GatewayState {
    session_id: Option<String>,
    sequence: Option<u64>,
    resume_gateway_url: Option<String>,
}

impl GatewayState {
    fn clear_session(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
    }

    fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_gateway_url.is_some()
    }
}

/// What the reconnect loop does after a connection ends.
#[derive(Debug, PartialEq, Eq)]
enum LoopAction {
    Shutdown,
    Resume,
    Reconnect,
}

/// The Gateway listener.
pub struct GatewayClient {
    rest: DiscordRest,
    handler: InteractionHandler,
    ready: Readiness,
    config: GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Create a listener. Nothing connects until [`run`](Self::run).
    #[must_use]
    pub fn new(
        rest: DiscordRest,
        handler: InteractionHandler,
        ready: Readiness,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rest,
            handler,
            ready,
            config: GatewayConfig::default(),
            state: GatewayState::default(),
            shutdown,
        }
    }

    /// Override the connection tuning.
    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Connect and listen until shutdown.
    ///
    /// # Errors
    ///
    /// Returns on fatal errors only: a rejected token, bad intents, an
    /// unrecoverable close code, or too many failed reconnects.
    pub async fn run(mut self) -> DiscordResult<()> {
        let mut reconnects = Reconnects::new(&self.config);

        let result = loop {
            if self.shutdown.is_cancelled() {
                break Ok(());
            }

            let step = match self.connect_and_run(&mut reconnects).await {
                Ok(action) => self.after_disconnect(action, &mut reconnects).await,
                Err(e) => self.after_error(e, &mut reconnects).await,
            };

            match step {
                Ok(()) => {},
                Err(DiscordError::Shutdown) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.ready.set(false);
        info!("Gateway listener stopped");
        result
    }

    async fn after_disconnect(
        &mut self,
        action: LoopAction,
        reconnects: &mut Reconnects,
    ) -> DiscordResult<()> {
        match action {
            LoopAction::Shutdown => Err(DiscordError::Shutdown),
            LoopAction::Resume => {
                let delay = Duration::from_millis(fastrand::u64(1000..=5000));
                info!(delay_ms = delay.as_millis(), "Attempting resume");
                self.sleep_or_shutdown(delay).await
            },
            LoopAction::Reconnect => {
                self.state.clear_session();
                self.reconnect_delay(reconnects).await
            },
        }
    }

    async fn after_error(
        &mut self,
        err: DiscordError,
        reconnects: &mut Reconnects,
    ) -> DiscordResult<()> {
        match err {
            DiscordError::AuthenticationFailed
            | DiscordError::InvalidIntents(_)
            | DiscordError::UnrecoverableClose(_) => {
                error!(error = %err, "Fatal Gateway error");
                Err(err)
            },
            DiscordError::Shutdown => Err(err),
            _ => {
                warn!(error = %err, "Gateway connection error");
                self.state.clear_session();
                self.reconnect_delay(reconnects).await
            },
        }
    }

    async fn reconnect_delay(&self, reconnects: &mut Reconnects) -> DiscordResult<()> {
        let Some(delay) = reconnects.next_delay() else {
            error!(
                max = self.config.max_reconnect_attempts,
                "Max reconnect attempts exceeded"
            );
            return Err(DiscordError::Protocol("max reconnect attempts exceeded".into()));
        };
        info!(
            delay_ms = delay.as_millis(),
            attempt = reconnects.failures(),
            "Reconnecting after backoff"
        );
        self.sleep_or_shutdown(delay).await
    }

    /// One connection: handshake, then the event loop.
    async fn connect_and_run(&mut self, reconnects: &mut Reconnects) -> DiscordResult<LoopAction> {
        let base = self.gateway_url().await?;
        let url = protocol::connect_url(&base)?;
        info!(url = %url, resuming = self.state.can_resume(), "Connecting to Discord Gateway");

        let (ws, _response) = connect_async(url.as_str()).await?;
        let (writer, mut reader) = ws.split();

        let heartbeat_interval = Self::wait_for_hello(&mut reader).await?;

        let sequence = Arc::new(Mutex::new(self.state.sequence));
        let hb_state = Arc::new(Mutex::new(HeartbeatState::new()));
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(64);
        let (zombie_tx, zombie_rx) = oneshot::channel();

        let beat_shutdown = self.shutdown.child_token();
        let heartbeat = tokio::spawn(heartbeat::run_heartbeat(
            heartbeat_interval,
            HeartbeatLink {
                sequence: Arc::clone(&sequence),
                state: Arc::clone(&hb_state),
                outbound: outbound_tx.clone(),
                zombie: zombie_tx,
            },
            beat_shutdown.clone(),
        ));

        outbound_tx
            .send(self.auth_frame())
            .await
            .map_err(|_| DiscordError::Protocol("writer channel closed".into()))?;
        let mut writer_handle = tokio::spawn(run_writer(writer, outbound_rx));

        let action = self
            .event_loop(&mut reader, &outbound_tx, &sequence, &hb_state, zombie_rx, reconnects)
            .await;

        self.ready.set(false);
        beat_shutdown.cancel();
        heartbeat.abort();

        drop(outbound_tx);
        tokio::select! {
            _ = &mut writer_handle => {},
            () = tokio::time::sleep(WRITER_FLUSH) => writer_handle.abort(),
        }

        action
    }

    /// The resume URL when resuming, a fresh one otherwise.
    async fn gateway_url(&mut self) -> DiscordResult<String> {
        if self.state.can_resume() {
            let url = self.state.resume_gateway_url.clone().unwrap_or_default();
            if protocol::is_valid_resume_url(&url) {
                return Ok(url);
            }
            warn!(url = %url, "Invalid resume URL, fetching a fresh one");
            self.state.clear_session();
        }
        self.rest.gateway_url().await
    }

    /// Resume when the last session allows it, identify otherwise.
    fn auth_frame(&self) -> Outbound {
        let token = self.rest.token().to_owned();
        match (&self.state.session_id, self.state.can_resume()) {
            (Some(session_id), true) => Outbound::Resume {
                token,
                session_id: session_id.clone(),
                seq: self.state.sequence.unwrap_or(0),
            },
            _ => Outbound::Identify {
                token,
                intents: self.config.intents,
            },
        }
    }

    /// The heartbeat interval from Hello.
    async fn wait_for_hello(reader: &mut WsReader) -> DiscordResult<Duration> {
        let hello = async {
            loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if let Inbound::Hello { heartbeat_interval } = Inbound::decode(&text)? {
                            return Ok(heartbeat_interval);
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map_or(1000, |f| f.code.into());
                        return Err(DiscordError::Closed(code));
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        return Err(DiscordError::Protocol(
                            "connection closed before Hello".into(),
                        ));
                    },
                }
            }
        };

        tokio::time::timeout(HELLO_TIMEOUT, hello)
            .await
            .map_err(|_| DiscordError::HelloTimeout)?
    }

    async fn event_loop(
        &mut self,
        reader: &mut WsReader,
        outbound: &mpsc::Sender<Outbound>,
        sequence: &Mutex<Option<u64>>,
        hb_state: &Mutex<HeartbeatState>,
        mut zombie: oneshot::Receiver<()>,
        reconnects: &mut Reconnects,
    ) -> DiscordResult<LoopAction> {
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    info!("Gateway listener received shutdown");
                    return Ok(LoopAction::Shutdown);
                }

                _ = &mut zombie => {
                    warn!("Zombie connection, resuming");
                    return Ok(LoopAction::Resume);
                }

                msg = reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let inbound = match Inbound::decode(&text) {
                            Ok(inbound) => inbound,
                            Err(e) => {
                                warn!(error = %e, "Failed to decode Gateway frame");
                                continue;
                            },
                        };
                        if let Some(action) = self
                            .handle_inbound(inbound, outbound, sequence, hb_state, reconnects)
                            .await
                        {
                            return Ok(action);
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map_or(1000, |f| f.code.into());
                        return self.handle_close_code(code);
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read error");
                        return Ok(self.resume_or_reconnect());
                    },
                    None => {
                        warn!("WebSocket stream ended");
                        return Ok(self.resume_or_reconnect());
                    },
                },
            }
        }
    }

    fn resume_or_reconnect(&self) -> LoopAction {
        if self.state.can_resume() {
            LoopAction::Resume
        } else {
            LoopAction::Reconnect
        }
    }

    /// Act on one frame. `Some` ends the connection.
    async fn handle_inbound(
        &mut self,
        inbound: Inbound,
        outbound: &mpsc::Sender<Outbound>,
        sequence: &Mutex<Option<u64>>,
        hb_state: &Mutex<HeartbeatState>,
        reconnects: &mut Reconnects,
    ) -> Option<LoopAction> {
        match inbound {
            Inbound::Dispatch { seq, event } => {
                if let Some(seq) = seq {
                    *sequence.lock().await = Some(seq);
                    self.state.sequence = Some(seq);
                }
                self.handle_event(event, reconnects);
                None
            },
            Inbound::HeartbeatRequest => {
                let seq = *sequence.lock().await;
                let _ = outbound.send(Outbound::Heartbeat(seq)).await;
                None
            },
            Inbound::HeartbeatAck => {
                hb_state.lock().await.ack_received();
                None
            },
            Inbound::Reconnect => {
                info!("Gateway requested reconnect");
                Some(LoopAction::Resume)
            },
            Inbound::InvalidSession { resumable } => Some(self.handle_invalid_session(resumable)),
            Inbound::Hello { .. } => {
                warn!("Unexpected Hello mid-session");
                None
            },
            Inbound::Other(op) => {
                debug!(op, "Unknown Gateway opcode");
                None
            },
        }
    }

    fn handle_event(&mut self, event: Event, reconnects: &mut Reconnects) {
        match event {
            Event::Ready {
                session_id,
                resume_gateway_url,
            } => {
                info!(session_id = %session_id, "Gateway session established");
                self.state.session_id = Some(session_id);
                let valid = protocol::is_valid_resume_url(&resume_gateway_url);
                if !valid {
                    warn!(url = %resume_gateway_url, "READY carried an invalid resume URL");
                }
                self.state.resume_gateway_url = valid.then_some(resume_gateway_url);
                reconnects.connected();
                self.ready.set(true);
            },
            Event::Resumed => {
                info!("Gateway session resumed");
                reconnects.connected();
                self.ready.set(true);
            },
            Event::Interaction(data) => self.dispatch_interaction(data),
            Event::Ignored(name) => trace!(event = %name, "Ignoring Gateway dispatch"),
        }
    }

    /// Interactions must be acknowledged within three seconds, so each one
    /// is handled on its own task.
    fn dispatch_interaction(&self, data: serde_json::Value) {
        let interaction: Interaction = match serde_json::from_value(data) {
            Ok(i) => i,
            Err(e) => {
                warn!(error = %e, "Malformed interaction");
                return;
            },
        };
        debug!(
            interaction_id = %interaction.id,
            custom_id = interaction.custom_id(),
            "Interaction received"
        );
        let handler = self.handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.handle(interaction).await {
                warn!(error = %e, "Failed to acknowledge interaction");
            }
        });
    }

    fn handle_invalid_session(&mut self, resumable: bool) -> LoopAction {
        if resumable {
            info!("Invalid session (resumable)");
            LoopAction::Resume
        } else {
            info!("Invalid session, full reconnect");
            self.state.clear_session();
            LoopAction::Reconnect
        }
    }

    fn handle_close_code(&mut self, code: u16) -> DiscordResult<LoopAction> {
        match CloseKind::of(code) {
            CloseKind::BadToken => Err(DiscordError::AuthenticationFailed),
            CloseKind::BadIntents => Err(DiscordError::InvalidIntents(code)),
            CloseKind::Unrecoverable => Err(DiscordError::UnrecoverableClose(code)),
            CloseKind::Normal => {
                info!(code, "Normal close, full reconnect");
                self.state.clear_session();
                Ok(LoopAction::Reconnect)
            },
            CloseKind::Transient => {
                warn!(code, "Gateway closed the connection");
                Ok(self.resume_or_reconnect())
            },
        }
    }

    async fn sleep_or_shutdown(&self, duration: Duration) -> DiscordResult<()> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(DiscordError::Shutdown),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

async fn run_writer(mut writer: WsWriter, mut outbound: mpsc::Receiver<Outbound>) {
    while let Some(frame) = outbound.recv().await {
        let json = match frame.encode() {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, ?frame, "Failed to encode Gateway frame");
                continue;
            },
        };
        if let Err(e) = writer.send(Message::Text(json.into())).await {
            debug!(error = %e, "Gateway writer stopped");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::InteractionSink;
    use async_trait::async_trait;
    use serde_json::json;
    use warden_core::{InteractionEvent, InteractionReply, Outcome};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Resolves(mpsc::UnboundedSender<InteractionEvent>);

    #[async_trait]
    impl InteractionSink for Resolves {
        async fn deliver(&self, event: InteractionEvent) -> InteractionReply {
            let _ = self.0.send(event);
            InteractionReply::Resolved {
                outcome: Outcome::Allowed,
            }
        }
    }

    fn client_with(rest: DiscordRest, sink: Arc<dyn InteractionSink>) -> GatewayClient {
        let handler = InteractionHandler::new(rest.clone(), sink, Vec::new());
        GatewayClient::new(rest, handler, Readiness::new(), CancellationToken::new())
    }

    fn client() -> GatewayClient {
        let (tx, _rx) = mpsc::unbounded_channel();
        client_with(DiscordRest::new("tok").unwrap(), Arc::new(Resolves(tx)))
    }

    fn reconnects() -> Reconnects {
        Reconnects::new(&GatewayConfig {
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(100),
            ..GatewayConfig::default()
        })
    }

    /// Feed one raw frame through the loop, returning what it did and
    /// anything it sent back.
    async fn feed(
        gw: &mut GatewayClient,
        frame: serde_json::Value,
        reconnects: &mut Reconnects,
    ) -> (Option<LoopAction>, Vec<Outbound>) {
        let inbound = Inbound::decode(&frame.to_string()).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let sequence = Mutex::new(gw.state.sequence);
        let hb = Mutex::new(HeartbeatState::new());
        let action = gw
            .handle_inbound(inbound, &tx, &sequence, &hb, reconnects)
            .await;
        drop(tx);
        let mut sent = Vec::new();
        while let Some(frame) = rx.recv().await {
            sent.push(frame);
        }
        (action, sent)
    }

    fn ready(seq: u64, resume_url: &str) -> serde_json::Value {
        json!({
            "op": 0, "s": seq, "t": "READY",
            "d": { "session_id": "sess-1", "resume_gateway_url": resume_url, "user": { "id": "bot" } }
        })
    }

    #[tokio::test]
    async fn ready_sets_resume_state_and_readiness() {
        let mut gw = client();
        let mut r = reconnects();
        let _ = r.next_delay();
        feed(&mut gw, ready(1, "wss://gateway-us-east1-b.discord.gg"), &mut r).await;

        assert!(gw.ready.get());
        assert!(gw.state.can_resume());
        assert_eq!(gw.state.sequence, Some(1));
        assert_eq!(r.failures(), 0);
    }

    #[tokio::test]
    async fn ready_with_foreign_resume_url_cannot_resume() {
        let mut gw = client();
        feed(&mut gw, ready(1, "wss://evil.example"), &mut reconnects()).await;
        assert!(gw.ready.get());
        assert!(!gw.state.can_resume());
    }

    #[tokio::test]
    async fn auth_frame_identifies_then_resumes() {
        let mut gw = client();
        assert!(matches!(gw.auth_frame(), Outbound::Identify { intents: 1, .. }));
        feed(&mut gw, ready(1, "wss://gateway.discord.gg"), &mut reconnects()).await;
        gw.state.sequence = Some(9);
        assert_eq!(
            gw.auth_frame(),
            Outbound::Resume {
                token: "tok".into(),
                session_id: "sess-1".into(),
                seq: 9,
            }
        );
    }

    #[tokio::test]
    async fn invalid_session_resumable_or_not() {
        let mut gw = client();
        feed(&mut gw, ready(1, "wss://gateway.discord.gg"), &mut reconnects()).await;

        let (action, _) = feed(&mut gw, json!({"op": 9, "d": true}), &mut reconnects()).await;
        assert_eq!(action, Some(LoopAction::Resume));
        assert!(gw.state.can_resume());

        let (action, _) = feed(&mut gw, json!({"op": 9, "d": false}), &mut reconnects()).await;
        assert_eq!(action, Some(LoopAction::Reconnect));
        assert!(!gw.state.can_resume());
    }

    #[tokio::test]
    async fn close_codes() {
        let mut gw = client();
        assert!(matches!(
            gw.handle_close_code(4004),
            Err(DiscordError::AuthenticationFailed)
        ));
        assert!(matches!(
            gw.handle_close_code(4014),
            Err(DiscordError::InvalidIntents(4014))
        ));
        assert!(matches!(
            gw.handle_close_code(4010),
            Err(DiscordError::UnrecoverableClose(4010))
        ));
        assert_eq!(gw.handle_close_code(1000).unwrap(), LoopAction::Reconnect);

        feed(&mut gw, ready(1, "wss://gateway.discord.gg"), &mut reconnects()).await;
        assert_eq!(gw.handle_close_code(4000).unwrap(), LoopAction::Resume);
    }

    #[tokio::test]
    async fn heartbeat_request_is_answered_immediately() {
        let mut gw = client();
        gw.state.sequence = Some(12);
        let (action, sent) = feed(&mut gw, json!({"op": 1}), &mut reconnects()).await;
        assert!(action.is_none());
        assert_eq!(sent, vec![Outbound::Heartbeat(Some(12))]);
    }

    #[tokio::test]
    async fn reconnect_request_ends_the_connection() {
        let mut gw = client();
        let (action, sent) = feed(&mut gw, json!({"op": 7}), &mut reconnects()).await;
        assert_eq!(action, Some(LoopAction::Resume));
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn interaction_create_is_routed_and_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interactions/i9/tok9/callback"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let rest = DiscordRest::new("tok").unwrap().with_base_url(server.uri());
        let mut gw = client_with(rest, Arc::new(Resolves(tx)));

        let frame = json!({
            "op": 0, "s": 4, "t": "INTERACTION_CREATE",
            "d": {
                "id": "i9", "type": 3, "token": "tok9",
                "user": { "id": "u1" },
                "data": { "custom_id": "apr:r1:allow", "component_type": 2 }
            }
        });
        feed(&mut gw, frame, &mut reconnects()).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, InteractionEvent::Approval { .. }));
        assert_eq!(gw.state.sequence, Some(4));
    }

    #[tokio::test]
    async fn malformed_interaction_still_advances_the_sequence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut gw = client_with(DiscordRest::new("tok").unwrap(), Arc::new(Resolves(tx)));
        let frame = json!({"op": 0, "s": 5, "t": "INTERACTION_CREATE", "d": {"nonsense": true}});
        let (action, _) = feed(&mut gw, frame, &mut reconnects()).await;
        assert!(action.is_none());
        assert_eq!(gw.state.sequence, Some(5));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sleep_or_shutdown_returns_on_cancel() {
        let gw = client();
        gw.shutdown.cancel();
        let result = gw.sleep_or_shutdown(Duration::from_secs(60)).await;
        assert!(matches!(result, Err(DiscordError::Shutdown)));
    }

    #[tokio::test]
    async fn run_returns_on_fatal_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let rest = DiscordRest::new("bad").unwrap().with_base_url(server.uri());
        let gw = client_with(rest, Arc::new(Resolves(tx)));
        let err = gw.run().await.unwrap_err();
        assert!(matches!(err, DiscordError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn run_gives_up_after_max_reconnect_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let rest = DiscordRest::new("tok").unwrap().with_base_url(server.uri());
        let gw = client_with(rest, Arc::new(Resolves(tx))).with_config(GatewayConfig {
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
            max_reconnect_attempts: 2,
            ..GatewayConfig::default()
        });
        let err = gw.run().await.unwrap_err();
        assert!(matches!(err, DiscordError::Protocol(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn run_exits_cleanly_when_cancelled() {
        let gw = client();
        gw.shutdown.cancel();
        gw.run().await.unwrap();
    }
}

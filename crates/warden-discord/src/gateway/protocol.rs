//! Gateway v10 messages as the listener sees them.
//!
//! Text frames are decoded once into [`Inbound`] so the event loop
//! matches on meaning rather than opcode numbers. Interaction data stays
//! raw JSON here; the interaction router owns its schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{DiscordError, DiscordResult};

/// `GUILDS` only. Interactions arrive regardless of intents.
pub(crate) const DEFAULT_INTENTS: u32 = 1;

const API_VERSION: &str = "10";

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RESUME: u8 = 6;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// The envelope every frame shares.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    op: u8,
    #[serde(default)]
    d: Option<Value>,
    #[serde(default, skip_serializing)]
    s: Option<u64>,
    #[serde(default, skip_serializing)]
    t: Option<String>,
}

/// A frame from Discord.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    /// First frame of every connection.
    Hello { heartbeat_interval: Duration },
    /// An event, with the sequence number to resume from.
    Dispatch { seq: Option<u64>, event: Event },
    /// Discord wants a heartbeat now.
    HeartbeatRequest,
    HeartbeatAck,
    /// Discord wants us to reconnect and resume.
    Reconnect,
    InvalidSession { resumable: bool },
    /// An opcode the listener has no use for.
    Other(u8),
}

/// The dispatch events the listener cares about.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Ready {
        session_id: String,
        resume_gateway_url: String,
    },
    Resumed,
    /// `INTERACTION_CREATE` data, parsed by the router.
    Interaction(Value),
    Ignored(String),
}

#[derive(Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

#[derive(Deserialize)]
struct ReadyData {
    session_id: String,
    resume_gateway_url: String,
}

impl Inbound {
    /// Decode one text frame.
    pub(crate) fn decode(text: &str) -> DiscordResult<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        Ok(match frame.op {
            OP_HELLO => {
                let hello: HelloData = serde_json::from_value(required(frame.d, "Hello")?)?;
                Self::Hello {
                    heartbeat_interval: Duration::from_millis(hello.heartbeat_interval),
                }
            },
            OP_DISPATCH => Self::Dispatch {
                seq: frame.s,
                event: Event::decode(frame.t.unwrap_or_default(), frame.d)?,
            },
            OP_HEARTBEAT => Self::HeartbeatRequest,
            OP_HEARTBEAT_ACK => Self::HeartbeatAck,
            OP_RECONNECT => Self::Reconnect,
            OP_INVALID_SESSION => Self::InvalidSession {
                resumable: frame.d.as_ref().and_then(Value::as_bool).unwrap_or(false),
            },
            other => Self::Other(other),
        })
    }
}

impl Event {
    fn decode(name: String, data: Option<Value>) -> DiscordResult<Self> {
        Ok(match name.as_str() {
            "READY" => {
                let ready: ReadyData = serde_json::from_value(required(data, "READY")?)?;
                Self::Ready {
                    session_id: ready.session_id,
                    resume_gateway_url: ready.resume_gateway_url,
                }
            },
            "RESUMED" => Self::Resumed,
            "INTERACTION_CREATE" => Self::Interaction(required(data, "INTERACTION_CREATE")?),
            _ => Self::Ignored(name),
        })
    }
}

fn required(data: Option<Value>, what: &str) -> DiscordResult<Value> {
    data.ok_or_else(|| DiscordError::Protocol(format!("{what} frame has no data")))
}

/// A frame we send.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Outbound {
    Identify { token: String, intents: u32 },
    Resume { token: String, session_id: String, seq: u64 },
    Heartbeat(Option<u64>),
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identify { intents, .. } => f
                .debug_struct("Identify")
                .field("intents", intents)
                .finish_non_exhaustive(),
            Self::Resume { session_id, seq, .. } => f
                .debug_struct("Resume")
                .field("session_id", session_id)
                .field("seq", seq)
                .finish_non_exhaustive(),
            Self::Heartbeat(seq) => f.debug_tuple("Heartbeat").field(seq).finish(),
        }
    }
}

impl Outbound {
    /// The JSON text frame.
    pub(crate) fn encode(&self) -> DiscordResult<String> {
        let (op, d) = match self {
            Self::Identify { token, intents } => (
                OP_IDENTIFY,
                json!({
                    "token": token,
                    "intents": intents,
                    "properties": {
                        "os": std::env::consts::OS,
                        "browser": "warden",
                        "device": "warden",
                    },
                }),
            ),
            Self::Resume {
                token,
                session_id,
                seq,
            } => (
                OP_RESUME,
                json!({ "token": token, "session_id": session_id, "seq": seq }),
            ),
            Self::Heartbeat(seq) => (OP_HEARTBEAT, json!(seq)),
        };
        Ok(serde_json::to_string(&Frame {
            op,
            d: Some(d),
            s: None,
            t: None,
        })?)
    }
}

/// How the listener reacts to a close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseKind {
    /// 4004: the bot token was rejected.
    BadToken,
    /// 4013 or 4014: the intents are wrong for this bot.
    BadIntents,
    /// Sharding codes. A single-guild bot never shards, so this is fatal.
    Unrecoverable,
    /// 1000 or 1001: the session is over, identify afresh.
    Normal,
    /// Anything else: resume if possible.
    Transient,
}

impl CloseKind {
    pub(crate) fn of(code: u16) -> Self {
        match code {
            4004 => Self::BadToken,
            4013 | 4014 => Self::BadIntents,
            4010 | 4011 => Self::Unrecoverable,
            1000 | 1001 => Self::Normal,
            _ => Self::Transient,
        }
    }
}

/// Pin the API version and encoding on a Gateway URL.
pub(crate) fn connect_url(base: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(base)?;
    url.query_pairs_mut()
        .clear()
        .append_pair("v", API_VERSION)
        .append_pair("encoding", "json");
    Ok(url)
}

/// A resume URL is only followed if it is `wss` on Discord's domain.
pub(crate) fn is_valid_resume_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|url| {
        url.scheme() == "wss"
            && url
                .host_str()
                .is_some_and(|host| host == "discord.gg" || host.ends_with(".discord.gg"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(outbound: &Outbound) -> Value {
        serde_json::from_str(&outbound.encode().unwrap()).unwrap()
    }

    #[test]
    fn identify_names_the_bot_as_warden() {
        let frame = sent(&Outbound::Identify {
            token: "tok".into(),
            intents: DEFAULT_INTENTS,
        });
        assert_eq!(frame["op"], 2);
        assert_eq!(frame["d"]["token"], "tok");
        assert_eq!(frame["d"]["intents"], 1);
        assert_eq!(frame["d"]["properties"]["device"], "warden");
        assert!(frame.get("s").is_none());
    }

    #[test]
    fn resume_carries_session_and_sequence() {
        let frame = sent(&Outbound::Resume {
            token: "tok".into(),
            session_id: "sess".into(),
            seq: 42,
        });
        assert_eq!(frame["op"], 6);
        assert_eq!(frame["d"]["session_id"], "sess");
        assert_eq!(frame["d"]["seq"], 42);
    }

    #[test]
    fn heartbeat_is_null_before_the_first_dispatch() {
        assert_eq!(sent(&Outbound::Heartbeat(None)), json!({"op": 1, "d": null}));
        assert_eq!(sent(&Outbound::Heartbeat(Some(7)))["d"], 7);
    }

    #[test]
    fn debug_hides_the_token() {
        let identify = Outbound::Identify {
            token: "secret-token".into(),
            intents: 1,
        };
        assert!(!format!("{identify:?}").contains("secret-token"));
    }

    #[test]
    fn hello_and_ready_decode() {
        assert_eq!(
            Inbound::decode(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap(),
            Inbound::Hello {
                heartbeat_interval: Duration::from_millis(41_250)
            }
        );
        let ready = Inbound::decode(
            r#"{"op":0,"s":3,"t":"READY","d":{"session_id":"a","resume_gateway_url":"wss://x.discord.gg"}}"#,
        )
        .unwrap();
        assert_eq!(
            ready,
            Inbound::Dispatch {
                seq: Some(3),
                event: Event::Ready {
                    session_id: "a".into(),
                    resume_gateway_url: "wss://x.discord.gg".into(),
                },
            }
        );
    }

    #[test]
    fn frames_without_required_data_are_errors() {
        assert!(Inbound::decode(r#"{"op":10}"#).is_err());
        assert!(Inbound::decode(r#"{"op":0,"s":1,"t":"READY"}"#).is_err());
        assert!(Inbound::decode("not json").is_err());
    }

    #[test]
    fn control_frames_decode() {
        assert_eq!(
            Inbound::decode(r#"{"op":9,"d":true}"#).unwrap(),
            Inbound::InvalidSession { resumable: true }
        );
        assert_eq!(
            Inbound::decode(r#"{"op":9,"d":null}"#).unwrap(),
            Inbound::InvalidSession { resumable: false }
        );
        assert_eq!(Inbound::decode(r#"{"op":7}"#).unwrap(), Inbound::Reconnect);
        assert_eq!(Inbound::decode(r#"{"op":3}"#).unwrap(), Inbound::Other(3));
        assert_eq!(
            Inbound::decode(r#"{"op":0,"s":2,"t":"GUILD_CREATE","d":{}}"#).unwrap(),
            Inbound::Dispatch {
                seq: Some(2),
                event: Event::Ignored("GUILD_CREATE".into()),
            }
        );
    }

    #[test]
    fn close_codes_are_classified() {
        assert_eq!(CloseKind::of(4004), CloseKind::BadToken);
        assert_eq!(CloseKind::of(4014), CloseKind::BadIntents);
        assert_eq!(CloseKind::of(4011), CloseKind::Unrecoverable);
        assert_eq!(CloseKind::of(1001), CloseKind::Normal);
        assert_eq!(CloseKind::of(4009), CloseKind::Transient);
    }

    #[test]
    fn connect_url_replaces_the_query() {
        let url = connect_url("wss://gateway.discord.gg/?v=6").unwrap();
        assert_eq!(url.as_str(), "wss://gateway.discord.gg/?v=10&encoding=json");
    }

    #[test]
    fn resume_url_must_stay_on_discord() {
        assert!(is_valid_resume_url("wss://gateway-us-east1-b.discord.gg"));
        assert!(!is_valid_resume_url("ws://gateway.discord.gg"));
        assert!(!is_valid_resume_url("wss://discord.gg.evil.com"));
        assert!(!is_valid_resume_url("wss://evil.com/discord.gg"));
        assert!(!is_valid_resume_url("not a url"));
    }
}

//! The pending-request registry.
//!
//! A single task owns every [`PendingRequest`]. Callers talk to it through a
//! cloneable [`RequestRegistry`] handle by message passing, so resolution is
//! an atomic check-and-remove: the first resolver removes the entry and
//! fires its signal, and every later resolver is told the request expired.

use std::collections::{BTreeMap, HashMap};

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use warden_core::{Outcome, Question, RequestId, SessionId};

use crate::answers::{collected_answers, single_answer};
use crate::error::{BrokerError, BrokerResult};

/// Command queue depth.
const COMMAND_BUFFER: usize = 256;

/// How an interaction tries to settle a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Settle with this outcome.
    Outcome(Outcome),
    /// Answer the (single) question with this text.
    Answer(String),
    /// Submit the recorded selections.
    Submit,
}

/// Result of a successful resolve attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The request was resolved by this call.
    Resolved {
        /// Session the request belonged to.
        session_id: SessionId,
        /// The winning outcome.
        outcome: Outcome,
    },
    /// Submit was attempted with unanswered questions; still pending.
    Incomplete {
        /// Indexes of unanswered questions.
        missing: Vec<usize>,
    },
}

struct PendingRequest {
    session_id: SessionId,
    questions: Vec<Question>,
    selections: BTreeMap<usize, Vec<String>>,
    signal: oneshot::Sender<Outcome>,
}

enum Command {
    Register {
        request_id: RequestId,
        session_id: SessionId,
        questions: Vec<Question>,
        reply: oneshot::Sender<BrokerResult<oneshot::Receiver<Outcome>>>,
    },
    Resolve {
        request_id: RequestId,
        resolution: Resolution,
        reply: oneshot::Sender<BrokerResult<Settlement>>,
    },
    Select {
        request_id: RequestId,
        question: usize,
        values: Vec<String>,
        reply: oneshot::Sender<BrokerResult<()>>,
    },
    Discard {
        request_id: RequestId,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    Drain {
        outcome: Outcome,
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the registry task.
#[derive(Debug, Clone)]
pub struct RequestRegistry {
    tx: mpsc::Sender<Command>,
}

impl RequestRegistry {
    /// Start the registry task on the current runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = RegistryActor {
            pending: HashMap::new(),
            rx,
        };
        tokio::spawn(actor.run());
        Self { tx }
    }

    /// Register a pending request and return the signal it resolves through.
    ///
    /// # Errors
    ///
    /// [`BrokerError::DuplicateRequest`] if the id is already pending,
    /// [`BrokerError::Shutdown`] if the registry has stopped.
    pub async fn register(
        &self,
        request_id: RequestId,
        session_id: SessionId,
        questions: Vec<Question>,
    ) -> BrokerResult<oneshot::Receiver<Outcome>> {
        self.call(|reply| Command::Register {
            request_id,
            session_id,
            questions,
            reply,
        })
        .await?
    }

    /// Try to resolve a request.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Expired`] if the request is no longer pending.
    pub async fn resolve(
        &self,
        request_id: RequestId,
        resolution: Resolution,
    ) -> BrokerResult<Settlement> {
        self.call(|reply| Command::Resolve {
            request_id,
            resolution,
            reply,
        })
        .await?
    }

    /// Record the selection for one question of a multi-question request.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Expired`] if the request is no longer pending,
    /// [`BrokerError::MalformedRequest`] if the question index is out of range.
    pub async fn select(
        &self,
        request_id: RequestId,
        question: usize,
        values: Vec<String>,
    ) -> BrokerResult<()> {
        self.call(|reply| Command::Select {
            request_id,
            question,
            values,
            reply,
        })
        .await?
    }

    /// Drop a pending request without signalling it.
    ///
    /// Usable from `Drop`: never waits. When the queue is full the command
    /// is handed to a task that waits for room.
    pub fn discard(&self, request_id: RequestId) {
        match self.tx.try_send(Command::Discard { request_id }) {
            Ok(()) => {},
            Err(TrySendError::Full(command)) => match Handle::try_current() {
                Ok(runtime) => {
                    let tx = self.tx.clone();
                    runtime.spawn(async move {
                        if tx.send(command).await.is_err() {
                            debug!("registry stopped before a deferred discard");
                        }
                    });
                },
                Err(_) => warn!("registry queue full outside a runtime; discard dropped"),
            },
            Err(TrySendError::Closed(_)) => debug!("registry stopped; nothing to discard"),
        }
    }

    /// Number of pending requests.
    pub async fn len(&self) -> usize {
        self.call(|reply| Command::Len { reply }).await.unwrap_or(0)
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Resolve every pending request with `outcome`. Returns how many.
    pub async fn drain(&self, outcome: Outcome) -> usize {
        self.call(|reply| Command::Drain { outcome, reply })
            .await
            .unwrap_or(0)
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> BrokerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        rx.await.map_err(|_| BrokerError::Shutdown)
    }
}

struct RegistryActor {
    pending: HashMap<RequestId, PendingRequest>,
    rx: mpsc::Receiver<Command>,
}

impl RegistryActor {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        debug!(pending = self.pending.len(), "registry stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register {
                request_id,
                session_id,
                questions,
                reply,
            } => {
                let _ = reply.send(self.register(request_id, session_id, questions));
            },
            Command::Resolve {
                request_id,
                resolution,
                reply,
            } => {
                let _ = reply.send(self.resolve(request_id, resolution));
            },
            Command::Select {
                request_id,
                question,
                values,
                reply,
            } => {
                let _ = reply.send(self.select(request_id, question, values));
            },
            Command::Discard { request_id } => {
                if self.pending.remove(&request_id).is_some() {
                    debug!(%request_id, "pending request discarded");
                }
            },
            Command::Len { reply } => {
                let _ = reply.send(self.pending.len());
            },
            Command::Drain { outcome, reply } => {
                let count = self.pending.len();
                for (request_id, entry) in self.pending.drain() {
                    debug!(%request_id, "draining pending request");
                    let _ = entry.signal.send(outcome.clone());
                }
                let _ = reply.send(count);
            },
        }
    }

    fn register(
        &mut self,
        request_id: RequestId,
        session_id: SessionId,
        questions: Vec<Question>,
    ) -> BrokerResult<oneshot::Receiver<Outcome>> {
        if self.pending.contains_key(&request_id) {
            warn!(%request_id, "duplicate request id");
            return Err(BrokerError::DuplicateRequest(request_id));
        }
        let (signal, rx) = oneshot::channel();
        self.pending.insert(
            request_id,
            PendingRequest {
                session_id,
                questions,
                selections: BTreeMap::new(),
                signal,
            },
        );
        Ok(rx)
    }

    fn resolve(
        &mut self,
        request_id: RequestId,
        resolution: Resolution,
    ) -> BrokerResult<Settlement> {
        let Some(entry) = self.pending.get(&request_id) else {
            return Err(BrokerError::Expired(request_id));
        };

        let outcome = match resolution {
            Resolution::Outcome(outcome) => outcome,
            Resolution::Answer(text) => match entry.questions.first() {
                Some(q) => Outcome::Answered(single_answer(q, &text)),
                None => Outcome::Answered(text),
            },
            Resolution::Submit => match collected_answers(&entry.questions, &entry.selections) {
                Ok(text) => Outcome::Answered(text),
                Err(missing) => return Ok(Settlement::Incomplete { missing }),
            },
        };

        let Some(entry) = self.pending.remove(&request_id) else {
            return Err(BrokerError::Expired(request_id));
        };
        if entry.signal.send(outcome.clone()).is_err() {
            debug!(%request_id, "waiter already gone");
        }
        Ok(Settlement::Resolved {
            session_id: entry.session_id,
            outcome,
        })
    }

    fn select(
        &mut self,
        request_id: RequestId,
        question: usize,
        values: Vec<String>,
    ) -> BrokerResult<()> {
        let Some(entry) = self.pending.get_mut(&request_id) else {
            return Err(BrokerError::Expired(request_id));
        };
        if question >= entry.questions.len() {
            return Err(BrokerError::MalformedRequest(format!(
                "question {question} out of range"
            )));
        }
        entry.selections.insert(question, values);
        Ok(())
    }
}

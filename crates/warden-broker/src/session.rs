//! Per-session state.
//!
//! [`SessionStore`] is the only owner of session bookkeeping. Every method
//! takes the inner lock for the duration of a map operation and releases it
//! before returning, so no caller can hold it across an `.await`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Mutex as AsyncMutex;
use warden_core::SessionId;

use crate::channel::ThreadRef;

/// What the broker remembers about one agent session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Last reported working directory.
    pub cwd: Option<PathBuf>,
    /// Last reported transcript path.
    pub transcript: Option<PathBuf>,
    /// Last reported terminal pane.
    pub pane: Option<String>,
    /// At least one request of this session went to a human.
    pub required_approval: bool,
    /// A human pressed Allow All for this session.
    pub escalated: bool,
    /// Bound channel thread.
    pub thread: Option<ThreadRef>,
}

/// Context reported alongside every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionContext<'a> {
    /// Working directory.
    pub cwd: Option<&'a Path>,
    /// Transcript path.
    pub transcript: Option<&'a Path>,
    /// Terminal pane.
    pub pane: Option<&'a str>,
}

/// Mutex-guarded map of session state.
///
/// Thread locks live in their own map of weak references: a lock stays
/// shared for as long as anyone holds it, even across [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<SessionId, SessionState>>,
    thread_locks: Mutex<HashMap<SessionId, Weak<AsyncMutex<()>>>>,
}

// A panic while holding the lock leaves plain data behind; keep going.
fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionState>> {
        guard(&self.inner)
    }

    /// Record the latest context of a session, creating it if unknown.
    ///
    /// Absent fields keep their previous value.
    pub fn observe(&self, session: &SessionId, ctx: SessionContext<'_>) {
        let mut map = self.lock();
        let state = map.entry(session.clone()).or_default();
        if let Some(cwd) = ctx.cwd {
            state.cwd = Some(cwd.to_path_buf());
        }
        if let Some(transcript) = ctx.transcript {
            state.transcript = Some(transcript.to_path_buf());
        }
        if let Some(pane) = ctx.pane {
            state.pane = Some(pane.to_owned());
        }
    }

    /// Snapshot of a session's state.
    #[must_use]
    pub fn get(&self, session: &SessionId) -> Option<SessionState> {
        self.lock().get(session).cloned()
    }

    /// Note that a request of this session needed a human.
    pub fn mark_required(&self, session: &SessionId) {
        self.lock()
            .entry(session.clone())
            .or_default()
            .required_approval = true;
    }

    /// Whether any request of this session needed a human.
    #[must_use]
    pub fn required_approval(&self, session: &SessionId) -> bool {
        self.lock()
            .get(session)
            .is_some_and(|s| s.required_approval)
    }

    /// Whether Allow All is in effect.
    #[must_use]
    pub fn is_escalated(&self, session: &SessionId) -> bool {
        self.lock().get(session).is_some_and(|s| s.escalated)
    }

    /// Put Allow All in effect until the session closes.
    pub fn escalate(&self, session: &SessionId) {
        self.lock().entry(session.clone()).or_default().escalated = true;
    }

    /// The bound thread.
    #[must_use]
    pub fn thread(&self, session: &SessionId) -> Option<ThreadRef> {
        self.lock().get(session).and_then(|s| s.thread.clone())
    }

    /// Bind a thread, replacing any previous binding.
    pub fn bind_thread(&self, session: &SessionId, thread: ThreadRef) {
        self.lock().entry(session.clone()).or_default().thread = Some(thread);
    }

    /// Drop a stale thread binding.
    pub fn unbind_thread(&self, session: &SessionId) {
        if let Some(state) = self.lock().get_mut(session) {
            state.thread = None;
        }
    }

    /// The last reported terminal pane.
    #[must_use]
    pub fn pane(&self, session: &SessionId) -> Option<String> {
        self.lock().get(session).and_then(|s| s.pane.clone())
    }

    /// Lock serializing thread resolution for one session.
    ///
    /// Does not create session state.
    #[must_use]
    pub fn thread_lock(&self, session: &SessionId) -> Arc<AsyncMutex<()>> {
        let mut locks = guard(&self.thread_locks);
        if let Some(lock) = locks.get(session).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(session.clone(), Arc::downgrade(&lock));
        lock
    }

    /// Forget a session: thread binding, approval flag and escalation.
    pub fn clear(&self, session: &SessionId) -> Option<SessionState> {
        self.lock().remove(session)
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no session is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

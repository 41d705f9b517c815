//! Mock implementations of the broker seams.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use warden_broker::{
    BrokerError, BrokerResult, ChannelError, ChannelResult, MessageRef, Notice,
    NotificationChannel, Prompt, TerminalInjector, ThreadRef,
};
use warden_core::Outcome;

/// How long the `wait_for_*` helpers wait before panicking.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Everything a [`MockChannel`] has seen.
#[derive(Debug, Default)]
struct ChannelLog {
    threads: Vec<ThreadRef>,
    created: usize,
    archived: Vec<String>,
    unarchived: Vec<String>,
    prompts: Vec<(String, Prompt)>,
    notices: Vec<(String, Notice)>,
    finalized: Vec<(MessageRef, Outcome)>,
    messages: usize,
    fail_posts: bool,
}

/// In-memory [`NotificationChannel`].
///
/// Records every call and lets tests wait for prompts, notices and
/// finalized outcomes without sleeping.
#[derive(Debug, Clone)]
pub struct MockChannel {
    log: Arc<Mutex<ChannelLog>>,
    ready: Arc<AtomicBool>,
    events: Arc<watch::Sender<usize>>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    /// A ready channel with no threads.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(ChannelLog::default())),
            ready: Arc::new(AtomicBool::new(true)),
            events: Arc::new(watch::Sender::new(0)),
        }
    }

    /// A channel that reports not ready.
    #[must_use]
    pub fn disconnected() -> Self {
        let channel = Self::new();
        channel.set_ready(false);
        channel
    }

    fn log(&self) -> MutexGuard<'_, ChannelLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.events.send_modify(|n| *n = n.saturating_add(1));
    }

    /// Flip readiness.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Make every post fail with a transport error.
    pub fn fail_posts(&self, fail: bool) {
        self.log().fail_posts = fail;
    }

    /// Seed an existing thread, as if left over from an earlier run.
    pub fn seed_thread(&self, id: &str, name: &str, archived: bool) {
        self.log().threads.push(ThreadRef {
            id: id.to_owned(),
            name: name.to_owned(),
            archived,
        });
    }

    /// Delete a thread behind the broker's back.
    pub fn delete_thread(&self, id: &str) {
        self.log().threads.retain(|t| t.id != id);
    }

    /// Archive a thread behind the broker's back.
    pub fn archive_externally(&self, id: &str) {
        if let Some(t) = self.log().threads.iter_mut().find(|t| t.id == id) {
            t.archived = true;
        }
    }

    /// All threads.
    #[must_use]
    pub fn threads(&self) -> Vec<ThreadRef> {
        self.log().threads.clone()
    }

    /// A thread by id.
    #[must_use]
    pub fn thread(&self, id: &str) -> Option<ThreadRef> {
        self.log().threads.iter().find(|t| t.id == id).cloned()
    }

    /// Number of `create_thread` calls.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.log().created
    }

    /// Ids passed to `archive_thread`, in order.
    #[must_use]
    pub fn archived(&self) -> Vec<String> {
        self.log().archived.clone()
    }

    /// Ids passed to `unarchive_thread`, in order.
    #[must_use]
    pub fn unarchived(&self) -> Vec<String> {
        self.log().unarchived.clone()
    }

    /// Posted prompts with their thread id.
    #[must_use]
    pub fn prompts(&self) -> Vec<(String, Prompt)> {
        self.log().prompts.clone()
    }

    /// Posted notices with their thread id.
    #[must_use]
    pub fn notices(&self) -> Vec<(String, Notice)> {
        self.log().notices.clone()
    }

    /// Finalized prompts.
    #[must_use]
    pub fn finalized(&self) -> Vec<(MessageRef, Outcome)> {
        self.log().finalized.clone()
    }

    async fn wait_until(&self, what: &str, done: impl Fn(&ChannelLog) -> bool) {
        let mut rx = self.events.subscribe();
        let waited = tokio::time::timeout(WAIT_LIMIT, async {
            loop {
                if done(&self.log()) {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {what}");
    }

    /// Wait until at least `n` prompts were posted.
    ///
    /// # Panics
    ///
    /// After five seconds.
    pub async fn wait_for_prompts(&self, n: usize) -> Vec<Prompt> {
        self.wait_until("prompts", |log| log.prompts.len() >= n).await;
        self.prompts().into_iter().map(|(_, p)| p).collect()
    }

    /// Wait until at least `n` notices were posted.
    ///
    /// # Panics
    ///
    /// After five seconds.
    pub async fn wait_for_notices(&self, n: usize) -> Vec<Notice> {
        self.wait_until("notices", |log| log.notices.len() >= n).await;
        self.notices().into_iter().map(|(_, n)| n).collect()
    }

    /// Wait until at least `n` prompts were finalized.
    ///
    /// # Panics
    ///
    /// After five seconds.
    pub async fn wait_for_finalized(&self, n: usize) -> Vec<Outcome> {
        self.wait_until("finalized prompts", |log| log.finalized.len() >= n)
            .await;
        self.finalized().into_iter().map(|(_, o)| o).collect()
    }

    /// Wait until at least `n` threads were archived.
    ///
    /// # Panics
    ///
    /// After five seconds.
    pub async fn wait_for_archived(&self, n: usize) -> Vec<String> {
        self.wait_until("archived threads", |log| log.archived.len() >= n)
            .await;
        self.archived()
    }

    fn set_archived(&self, thread_id: &str, archived: bool) -> ChannelResult<()> {
        let mut log = self.log();
        let thread = log
            .threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| ChannelError::NotFound(thread_id.to_owned()))?;
        thread.archived = archived;
        if archived {
            log.archived.push(thread_id.to_owned());
        } else {
            log.unarchived.push(thread_id.to_owned());
        }
        drop(log);
        self.bump();
        Ok(())
    }

    fn next_message(log: &mut ChannelLog, thread_id: &str) -> ChannelResult<MessageRef> {
        if log.fail_posts {
            return Err(ChannelError::Transport("injected post failure".into()));
        }
        if !log.threads.iter().any(|t| t.id == thread_id) {
            return Err(ChannelError::NotFound(thread_id.to_owned()));
        }
        log.messages = log.messages.saturating_add(1);
        Ok(MessageRef {
            thread_id: thread_id.to_owned(),
            message_id: format!("msg-{}", log.messages),
        })
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn fetch_thread(&self, thread_id: &str) -> ChannelResult<Option<ThreadRef>> {
        Ok(self.thread(thread_id))
    }

    async fn find_thread(&self, name: &str) -> ChannelResult<Option<ThreadRef>> {
        Ok(self.log().threads.iter().find(|t| t.name == name).cloned())
    }

    async fn create_thread(&self, name: &str) -> ChannelResult<ThreadRef> {
        if name.trim().is_empty() {
            return Err(ChannelError::Rejected {
                status: 400,
                message: "thread name must not be empty".into(),
            });
        }
        let mut log = self.log();
        log.created = log.created.saturating_add(1);
        let thread = ThreadRef {
            id: format!("thread-{}", log.created),
            name: name.to_owned(),
            archived: false,
        };
        log.threads.push(thread.clone());
        Ok(thread)
    }

    async fn unarchive_thread(&self, thread_id: &str) -> ChannelResult<()> {
        self.set_archived(thread_id, false)
    }

    async fn archive_thread(&self, thread_id: &str) -> ChannelResult<()> {
        self.set_archived(thread_id, true)
    }

    async fn post_prompt(&self, thread_id: &str, prompt: &Prompt) -> ChannelResult<MessageRef> {
        let mut log = self.log();
        let msg = Self::next_message(&mut log, thread_id)?;
        log.prompts.push((thread_id.to_owned(), prompt.clone()));
        drop(log);
        self.bump();
        Ok(msg)
    }

    async fn post_notice(&self, thread_id: &str, notice: &Notice) -> ChannelResult<MessageRef> {
        let mut log = self.log();
        let msg = Self::next_message(&mut log, thread_id)?;
        log.notices.push((thread_id.to_owned(), notice.clone()));
        drop(log);
        self.bump();
        Ok(msg)
    }

    async fn finalize_prompt(
        &self,
        message: &MessageRef,
        _prompt: &Prompt,
        outcome: &Outcome,
    ) -> ChannelResult<()> {
        self.log()
            .finalized
            .push((message.clone(), outcome.clone()));
        self.bump();
        Ok(())
    }
}

/// In-memory [`TerminalInjector`].
#[derive(Debug, Clone, Default)]
pub struct MockInjector {
    alive: Arc<Mutex<HashSet<String>>>,
    injected: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockInjector {
    /// An injector with no live panes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a pane as live.
    #[must_use]
    pub fn with_live_pane(self, pane: &str) -> Self {
        self.set_alive(pane, true);
        self
    }

    /// Mark a pane live or dead.
    pub fn set_alive(&self, pane: &str, alive: bool) {
        let mut panes = self.alive.lock().unwrap_or_else(PoisonError::into_inner);
        if alive {
            panes.insert(pane.to_owned());
        } else {
            panes.remove(pane);
        }
    }

    /// `(pane, text)` pairs typed so far.
    #[must_use]
    pub fn injected(&self) -> Vec<(String, String)> {
        self.injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TerminalInjector for MockInjector {
    async fn is_alive(&self, pane: &str) -> bool {
        self.alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(pane)
    }

    async fn inject(&self, pane: &str, text: &str) -> BrokerResult<()> {
        if !self.is_alive(pane).await {
            return Err(BrokerError::Terminal(format!("pane {pane} is gone")));
        }
        self.injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pane.to_owned(), text.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_broker::Affordances;
    use warden_core::RequestId;

    fn prompt() -> Prompt {
        Prompt {
            request_id: RequestId::from("r1"),
            title: "Bash".into(),
            body: "rm x".into(),
            footer: String::new(),
            affordances: Affordances::Approval,
        }
    }

    #[tokio::test]
    async fn records_prompts_in_created_threads() {
        let channel = MockChannel::new();
        let thread = channel.create_thread("app: fix").await.unwrap();
        channel.post_prompt(&thread.id, &prompt()).await.unwrap();

        let prompts = channel.wait_for_prompts(1).await;
        assert_eq!(prompts[0].request_id, RequestId::from("r1"));
        assert_eq!(channel.find_thread("app: fix").await.unwrap(), Some(thread));
    }

    #[tokio::test]
    async fn posting_to_unknown_thread_fails() {
        let channel = MockChannel::new();
        let err = channel.post_prompt("nope", &prompt()).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failures() {
        let channel = MockChannel::new();
        channel.seed_thread("t", "n", false);
        channel.fail_posts(true);
        assert!(channel.post_prompt("t", &prompt()).await.is_err());
    }

    #[tokio::test]
    async fn injector_requires_live_pane() {
        let injector = MockInjector::new().with_live_pane("%1");
        injector.inject("%1", "yes").await.unwrap();
        assert!(injector.inject("%2", "yes").await.is_err());
        assert_eq!(injector.injected(), vec![("%1".into(), "yes".into())]);
    }
}

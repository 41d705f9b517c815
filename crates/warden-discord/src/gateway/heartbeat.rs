//! Heartbeat task and zombie connection detection.
//!
//! The first beat goes out after a random fraction of the interval, the
//! rest at the full interval. If the previous beat was never
//! acknowledged when the next is due, the connection is a zombie and the
//! event loop is told to reconnect.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::protocol::Outbound;

/// Ack bookkeeping shared with the event loop.
pub(crate) struct HeartbeatState {
    pub last_ack_received: bool,
}

impl HeartbeatState {
    pub(super) fn new() -> Self {
        Self {
            last_ack_received: true,
        }
    }

    pub(super) fn ack_received(&mut self) {
        self.last_ack_received = true;
        trace!("Heartbeat ACK received");
    }
}

/// Shared handles the heartbeat task works with.
pub(crate) struct HeartbeatLink {
    pub sequence: Arc<Mutex<Option<u64>>>,
    pub state: Arc<Mutex<HeartbeatState>>,
    pub outbound: mpsc::Sender<Outbound>,
    pub zombie: oneshot::Sender<()>,
}

pub(crate) async fn run_heartbeat(interval: Duration, link: HeartbeatLink, shutdown: CancellationToken) {
    let HeartbeatLink {
        sequence,
        state,
        outbound,
        zombie,
    } = link;

    let first_delay = interval.mul_f64(fastrand::f64());
    debug!(
        interval_ms = interval.as_millis(),
        first_delay_ms = first_delay.as_millis(),
        "Heartbeat task started"
    );

    let mut delay = first_delay;
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!("Heartbeat task shutting down");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }
        if !beat(&sequence, &state, &outbound).await {
            warn!("Heartbeat ACK missed, zombie connection detected");
            let _ = zombie.send(());
            return;
        }
        delay = interval;
    }
}

/// Send a heartbeat if the previous one was acknowledged.
async fn beat(
    sequence: &Mutex<Option<u64>>,
    state: &Mutex<HeartbeatState>,
    outbound: &mpsc::Sender<Outbound>,
) -> bool {
    let mut guard = state.lock().await;
    if !guard.last_ack_received {
        return false;
    }
    let seq = *sequence.lock().await;
    guard.last_ack_received = false;
    drop(guard);

    trace!(seq = ?seq, "Sending heartbeat");
    // A closed writer means the connection is gone already.
    outbound.send(Outbound::Heartbeat(seq)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> (
        HeartbeatLink,
        Arc<Mutex<HeartbeatState>>,
        mpsc::Receiver<Outbound>,
        oneshot::Receiver<()>,
    ) {
        let state = Arc::new(Mutex::new(HeartbeatState::new()));
        let (tx, rx) = mpsc::channel(8);
        let (ztx, zrx) = oneshot::channel();
        let link = HeartbeatLink {
            sequence: Arc::new(Mutex::new(Some(5))),
            state: Arc::clone(&state),
            outbound: tx,
            zombie: ztx,
        };
        (link, state, rx, zrx)
    }

    #[test]
    fn ack_cycle() {
        let mut state = HeartbeatState::new();
        assert!(state.last_ack_received);
        state.last_ack_received = false;
        state.ack_received();
        assert!(state.last_ack_received);
    }

    #[tokio::test(start_paused = true)]
    async fn missed_ack_signals_zombie() {
        let (link, _state, mut rx, zombie) = link();
        let task = tokio::spawn(run_heartbeat(
            Duration::from_secs(40),
            link,
            CancellationToken::new(),
        ));

        assert_eq!(rx.recv().await.unwrap(), Outbound::Heartbeat(Some(5)));

        // No ACK arrives before the next beat is due.
        zombie.await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn acked_beats_keep_going() {
        let (link, state, mut rx, mut zombie) = link();
        tokio::spawn(run_heartbeat(
            Duration::from_secs(40),
            link,
            CancellationToken::new(),
        ));

        for _ in 0..3 {
            rx.recv().await.unwrap();
            state.lock().await.ack_received();
        }
        assert!(zombie.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_task() {
        let (link, _state, _rx, _zombie) = link();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(Duration::from_secs(40), link, shutdown.clone()));
        shutdown.cancel();
        task.await.unwrap();
    }
}

//! Timer management for the production runner.
//!
//! Provides a tokio-based timer implementation for the deterministic state
//! machine. Timers are spawned as tokio tasks and can be cancelled;
//! cancellation is best-effort, so a firing racing a cancellation may still
//! deliver its event and handlers re-check their guards.

use palisade_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Convert a TimerId to the corresponding Event.
fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::Leader => Event::LeaderTimer,
        TimerId::NoOp => Event::NoOpTimer,
        TimerId::Reconnect(host) => Event::ReconnectTimer { host },
    }
}

/// Manages timers for the production runner.
///
/// Each timer is a tokio task that sleeps for the specified duration and
/// then sends the appropriate timer event to the event channel.
pub struct TimerManager {
    /// Active timers (id -> task handle).
    timers: HashMap<TimerId, JoinHandle<()>>,
    /// Event sender for timer fires.
    event_tx: mpsc::Sender<Event>,
}

impl TimerManager {
    /// Create a new timer manager.
    pub fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            timers: HashMap::new(),
            event_tx,
        }
    }

    /// Set a timer that will fire after the given duration.
    ///
    /// If a timer with the same ID already exists, it is cancelled first.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id.clone());

        let event_tx = self.event_tx.clone();
        let timer_id = id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trace!(?timer_id, "timer fired");
            let _ = event_tx.send(timer_event(timer_id)).await;
        });

        self.timers.insert(id.clone(), handle);
        debug!(?id, ?duration, "timer set");
    }

    /// Cancel a timer.
    ///
    /// If the timer doesn't exist or has already fired, this is a no-op.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            debug!(?id, "timer cancelled");
        }
    }

    /// Cancel all timers. Called during shutdown.
    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(?id, "timer cancelled (shutdown)");
        }
    }

    /// Get the number of active timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_types::Host;

    #[tokio::test]
    async fn timer_fires() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::Leader, Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert!(matches!(event, Event::LeaderTimer));
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::NoOp, Duration::from_millis(50));
        manager.cancel_timer(TimerId::NoOp);

        let result = tokio::time::timeout(Duration::from_millis(100), event_rx.recv()).await;
        assert!(result.is_err(), "timer should have been cancelled");
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (event_tx, _event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::NoOp, Duration::from_millis(50));
        manager.cancel_timer(TimerId::NoOp);
        manager.cancel_timer(TimerId::NoOp);
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn setting_again_replaces_the_timer() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::Leader, Duration::from_millis(100));
        manager.set_timer(TimerId::Leader, Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_millis(50), event_rx.recv())
            .await
            .expect("timeout - replacement timer didn't fire quickly")
            .expect("channel closed");
        assert!(matches!(event, Event::LeaderTimer));
    }

    #[tokio::test]
    async fn reconnect_timers_are_per_host() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        let a: Host = "127.0.0.1:5001".parse().unwrap();
        let b: Host = "127.0.0.1:5002".parse().unwrap();
        manager.set_timer(TimerId::Reconnect(a), Duration::from_millis(10));
        manager.set_timer(TimerId::Reconnect(b), Duration::from_millis(10));
        assert_eq!(manager.active_count(), 2);

        let mut hosts = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
                .await
                .expect("timeout")
                .expect("channel closed");
            match event {
                Event::ReconnectTimer { host } => hosts.push(host),
                other => panic!("unexpected event {}", other.type_name()),
            }
        }
        hosts.sort();
        assert_eq!(hosts, vec![a, b]);
    }
}

//! Production replica runner.
//!
//! Owns the event loop: the transport and the timer subsystem feed a single
//! event channel, the state machine consumes it one event at a time, and
//! every returned action is executed before the next event is dequeued.
//! Upcalls reach the embedding application through a notification channel.

use crate::config::{ConfigError, ReplicaConfig};
use crate::network::{TcpAdapter, TransportError};
use crate::timers::TimerManager;
use palisade_core::{Action, Event, Notification, StateMachine};
use palisade_pbft::PbftState;
use palisade_types::{Host, ProposeRequest};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Fatal errors while bringing a replica up.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Configuration is malformed or key material is missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport listener could not be bound.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Application-facing handle for submitting propose requests.
#[derive(Debug, Clone)]
pub struct ReplicaHandle {
    event_tx: mpsc::Sender<Event>,
}

impl ReplicaHandle {
    /// Submits a payload for total-order agreement. Returns `false` if the
    /// replica has shut down.
    pub async fn propose(&self, block: Vec<u8>, timestamp: u64) -> bool {
        self.event_tx
            .send(Event::Propose {
                request: ProposeRequest::new(block, timestamp),
            })
            .await
            .is_ok()
    }
}

/// The replica event loop.
pub struct ProductionRunner {
    state: PbftState,
    local: Host,
    peers: Vec<Host>,
    adapter: TcpAdapter,
    timers: TimerManager,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    notification_tx: mpsc::Sender<Notification>,
    started_at: Instant,
}

impl ProductionRunner {
    /// Builds a replica from its configuration: loads key material, binds
    /// the transport, and wires the channels. Returns the runner plus the
    /// receiving end of the upcall channel.
    pub async fn new(
        config: &ReplicaConfig,
    ) -> Result<(Self, mpsc::Receiver<Notification>), BootstrapError> {
        let local = config.local_host()?;
        let members = config.membership()?;
        let secret = config.load_secret_key()?;
        let truststore = config.load_truststore()?;

        let state = PbftState::new(
            local,
            members.clone(),
            config.crypto_name.clone(),
            secret,
            truststore,
            config.pbft_config(),
        );

        let (event_tx, event_rx) = mpsc::channel(1024);
        let (notification_tx, notification_rx) = mpsc::channel(256);
        let adapter = TcpAdapter::bind(local, event_tx.clone()).await?;
        let timers = TimerManager::new(event_tx.clone());

        info!(%local, members = members.len(), "replica bootstrapped");

        Ok((
            Self {
                state,
                local,
                peers: members,
                adapter,
                timers,
                event_rx,
                event_tx,
                notification_tx,
                started_at: Instant::now(),
            },
            notification_rx,
        ))
    }

    /// Handle for submitting propose requests to this replica.
    pub fn handle(&self) -> ReplicaHandle {
        ReplicaHandle {
            event_tx: self.event_tx.clone(),
        }
    }

    /// Runs the event loop until the event channel closes.
    ///
    /// Startup order: dial every peer, then install the first view. Peers
    /// that are not yet listening surface as `OutboundFailed` and go
    /// through the engine's reconnect schedule, so no blocking grace
    /// period is needed.
    pub async fn run(mut self) {
        for peer in self.peers.clone() {
            if peer != self.local {
                self.adapter.dial(peer);
            }
        }

        self.state.set_time(self.started_at.elapsed());
        for action in self.state.init() {
            self.execute(action).await;
        }

        while let Some(event) = self.event_rx.recv().await {
            self.state.set_time(self.started_at.elapsed());
            for action in self.state.handle(event) {
                self.execute(action).await;
            }
        }
        info!(local = %self.local, "event channel closed, replica stopping");
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Send { to, message } => self.adapter.send(to, &message).await,
            Action::Connect { host } => self.adapter.dial(host),
            Action::SetTimer { id, duration } => self.timers.set_timer(id, duration),
            Action::CancelTimer { id } => self.timers.cancel_timer(id),
            Action::Notify { notification } => {
                if self.notification_tx.send(notification).await.is_err() {
                    warn!("notification receiver dropped, discarding upcall");
                }
            }
        }
    }
}

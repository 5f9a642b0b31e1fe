//! PBFT replication state machine.

use crate::config::PbftConfig;
use crate::ops_map::{OpsKey, OpsMap};
use crate::slots::SlotLedger;
use palisade_core::{Action, Event, Notification, StateMachine, TimerId};
use palisade_messages::{CommitMessage, PrePrepareMessage, PrepareMessage, WireMessage};
use palisade_types::{
    Hash, Host, ProposeRequest, SecretKey, SeqN, SlotKey, Truststore, View,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// The three-phase agreement engine for one replica.
///
/// # State Machine Flow
///
/// 1. **Propose** → If leader, stamp the next sequence number, open a slot,
///    store the payload, broadcast a signed pre-prepare
/// 2. **PrePrepare received** → Validate signature and slot, store payload,
///    broadcast a signed prepare
/// 3. **Prepare received** → Count distinct senders; at `2f+1`, broadcast a
///    signed commit
/// 4. **Commit received** → Count distinct senders; at `f+1`, deliver the
///    payload with a local signature over it
/// 5. **Leader timer** → Suspect the leader after sustained silence
///
/// Thresholds fire on the exact-equality transition, so each slot emits one
/// commit broadcast and one committed notification.
pub struct PbftState {
    // ── Identity ──
    /// This replica's host.
    local: Host,
    /// Logical key name carried inside signed messages.
    crypto_name: String,
    /// Signing key.
    secret: SecretKey,
    /// Verification keys of the whole membership, by logical name.
    truststore: Truststore,

    // ── View and leadership ──
    view: View,
    /// Sequence number of the most recent local proposal; its node field is
    /// the leader this replica currently follows.
    current_seq: SeqN,
    /// Highest sequence number observed making commit progress.
    highest_seq: SeqN,
    max_faulty: u32,

    // ── Slot state ──
    ops: OpsMap,
    slots: SlotLedger,
    /// `(seqN, view)` → operation hash accepted at pre-prepare time.
    /// A second pre-prepare for the same pair with a different hash is
    /// equivocation and is rejected.
    accepted_proposals: HashMap<(SeqN, u32), Hash>,

    // ── Liveness ──
    /// Time of the most recent committed notification (leader progress).
    last_leader_op: Duration,

    // ── Configuration and time ──
    config: PbftConfig,
    /// Current time, set by the runner before each handler invocation.
    now: Duration,
}

impl std::fmt::Debug for PbftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbftState")
            .field("local", &self.local)
            .field("view_number", &self.view.view_number())
            .field("current_seq", &self.current_seq)
            .field("highest_seq", &self.highest_seq)
            .field("open_slots", &self.slots.len())
            .field("stored_ops", &self.ops.len())
            .finish()
    }
}

impl PbftState {
    /// Creates the engine for one replica.
    ///
    /// `members` is the ordered initial membership; member 0 is the initial
    /// leader. The list must be identical on every replica.
    pub fn new(
        local: Host,
        members: Vec<Host>,
        crypto_name: String,
        secret: SecretKey,
        truststore: Truststore,
        config: PbftConfig,
    ) -> Self {
        let view = View::new(members, 1);
        let initial_seq = SeqN::new(0, view.members()[0]);
        let max_faulty = view.max_faulty();

        Self {
            local,
            crypto_name,
            secret,
            truststore,
            view,
            current_seq: initial_seq,
            highest_seq: initial_seq,
            max_faulty,
            ops: OpsMap::new(),
            slots: SlotLedger::new(),
            accepted_proposals: HashMap::new(),
            last_leader_op: Duration::ZERO,
            config,
            now: Duration::ZERO,
        }
    }

    // ── Accessors ──

    /// This replica's host.
    pub fn local(&self) -> Host {
        self.local
    }

    /// The current view.
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Sequence number of the most recent proposal this replica follows.
    pub fn current_seq(&self) -> SeqN {
        self.current_seq
    }

    /// Highest sequence number observed making commit progress.
    pub fn highest_seq(&self) -> SeqN {
        self.highest_seq
    }

    /// Whether this replica currently leads.
    pub fn is_leader(&self) -> bool {
        self.current_seq.node() == self.local
    }

    /// The operation store.
    pub fn ops(&self) -> &OpsMap {
        &self.ops
    }

    /// The slot ledger.
    pub fn slots(&self) -> &SlotLedger {
        &self.slots
    }

    /// Time of the most recent observed leader progress.
    pub fn last_leader_op(&self) -> Duration {
        self.last_leader_op
    }

    /// Installs the first view and arms the leader-liveness timer.
    ///
    /// Call once, after the transport is ready. Emits the `Initial` and
    /// first `ViewInstalled` upcalls.
    pub fn init(&mut self) -> Vec<Action> {
        self.last_leader_op = self.now;
        info!(
            replica = %self.local,
            members = self.view.size(),
            view = self.view.view_number(),
            "installing initial view"
        );
        vec![
            Action::SetTimer {
                id: TimerId::Leader,
                duration: self.config.leader_timeout,
            },
            Action::Notify {
                notification: Notification::Initial {
                    replica: self.local,
                },
            },
            Action::Notify {
                notification: Notification::ViewInstalled {
                    members: self.view.members().to_vec(),
                    view_number: self.view.view_number(),
                },
            },
        ]
    }

    // ── Propose ──

    fn on_propose(&mut self, request: ProposeRequest) -> Vec<Action> {
        info!(
            replica = %self.local,
            bytes = request.block.len(),
            timestamp = request.timestamp,
            "received propose request"
        );

        if !self.is_leader() {
            warn!(
                replica = %self.local,
                leader = %self.current_seq.node(),
                "propose request while not leader; dropping"
            );
            return vec![];
        }

        let ops_key = OpsKey::new(request.timestamp, request.digest());
        let ops_hash = ops_key.digest();
        if self.ops.contains(&ops_hash) {
            warn!(op = ?ops_hash, "duplicate propose request; dropping");
            return vec![];
        }

        self.current_seq = self.current_seq.increment(self.local);
        let key = SlotKey::new(ops_hash, self.current_seq, self.view.view_number());
        let slot = key.digest();

        if let Err(err) = self.slots.open(slot) {
            warn!(%err, key = %key, "cannot open slot for new proposal; dropping");
            return vec![];
        }
        if let Err(err) = self.ops.insert(ops_hash, request.block.clone()) {
            warn!(%err, key = %key, "cannot store proposal payload; dropping");
            return vec![];
        }
        self.accepted_proposals
            .insert((key.seq, key.view), key.ops_hash);

        info!(key = %key, "proposing operation");

        let message = PrePrepareMessage::signed(
            key,
            request.block,
            self.crypto_name.clone(),
            &self.secret,
        );
        self.send_to_peers(WireMessage::PrePrepare(message))
    }

    // ── PrePrepare ──

    fn on_pre_prepare(&mut self, from: Host, message: PrePrepareMessage) -> Vec<Action> {
        if let Err(err) = message.verify(&self.truststore) {
            error!(%from, %err, "dropping pre-prepare with bad signature");
            return vec![];
        }

        let key = message.key;
        if let Some(&accepted) = self.accepted_proposals.get(&(key.seq, key.view)) {
            if accepted == key.ops_hash {
                warn!(%from, key = %key, "duplicate pre-prepare; dropping");
            } else {
                warn!(
                    %from,
                    key = %key,
                    accepted = ?accepted,
                    "equivocating pre-prepare for an already accepted slot; dropping"
                );
            }
            return vec![];
        }

        if let Err(err) = self.ops.insert(key.ops_hash, message.operation) {
            warn!(%from, %err, key = %key, "dropping pre-prepare");
            return vec![];
        }
        let slot = key.digest();
        if let Err(err) = self.slots.open(slot) {
            warn!(%from, %err, key = %key, "dropping duplicate pre-prepare");
            return vec![];
        }
        self.accepted_proposals
            .insert((key.seq, key.view), key.ops_hash);

        debug!(%from, key = %key, "accepted pre-prepare, broadcasting prepare");

        // Count our own endorsement before the broadcast.
        match self.slots.add_prepare(slot, self.local) {
            Ok(count) => trace!(key = %key, prepares = count, "self-counted prepare"),
            Err(err) => warn!(%err, key = %key, "failed to self-count prepare"),
        }
        if let Some(entry) = self.slots.entry_mut(&slot) {
            entry.prepare_sent = true;
        }

        let prepare = PrepareMessage::signed(key, self.crypto_name.clone(), &self.secret);
        self.send_to_peers(WireMessage::Prepare(prepare))
    }

    // ── Prepare ──

    fn on_prepare(&mut self, from: Host, message: PrepareMessage) -> Vec<Action> {
        if let Err(err) = message.verify(&self.truststore) {
            error!(%from, %err, "dropping prepare with bad signature");
            return vec![];
        }

        let key = message.key;
        let slot = key.digest();
        if !self.slots.contains(&slot) {
            warn!(%from, key = %key, "prepare for an unknown slot; dropping");
            return vec![];
        }

        let count = match self.slots.add_prepare(slot, from) {
            Ok(count) => count,
            Err(err) => {
                warn!(%from, %err, key = %key, "dropping prepare");
                return vec![];
            }
        };
        debug!(%from, key = %key, prepares = count, "counted prepare");

        let quorum = 2 * self.max_faulty + 1;
        let Some(entry) = self.slots.entry_mut(&slot) else {
            return vec![];
        };
        if count != quorum || entry.commit_sent {
            return vec![];
        }
        entry.commit_sent = true;

        info!(key = %key, prepares = count, "prepare quorum reached, broadcasting commit");
        let commit = CommitMessage::signed(key, self.crypto_name.clone(), &self.secret);
        self.send_to_peers(WireMessage::Commit(commit))
    }

    // ── Commit ──

    fn on_commit(&mut self, from: Host, message: CommitMessage) -> Vec<Action> {
        if let Err(err) = message.verify(&self.truststore) {
            error!(%from, %err, "dropping commit with bad signature");
            return vec![];
        }

        let key = message.key;
        if self.current_seq < self.highest_seq {
            warn!(
                %from,
                key = %key,
                current = %self.current_seq,
                highest = %self.highest_seq,
                "commit while behind the highest observed sequence; dropping"
            );
            return vec![];
        }
        if self.current_seq > self.highest_seq {
            self.highest_seq = self.current_seq;
        }

        let slot = key.digest();
        if !self.slots.contains(&slot) {
            warn!(%from, key = %key, "commit for an unknown slot; dropping");
            return vec![];
        }

        let count = match self.slots.add_commit(slot, from) {
            Ok(count) => count,
            Err(err) => {
                warn!(%from, %err, key = %key, "dropping commit");
                return vec![];
            }
        };
        debug!(%from, key = %key, commits = count, "counted commit");

        let quorum = self.max_faulty + 1;
        let already_committed = self
            .slots
            .entry(&slot)
            .map(|e| e.committed)
            .unwrap_or(false);
        if count != quorum || already_committed {
            return vec![];
        }

        let payload = match self.ops.get(&key.ops_hash) {
            Ok(payload) => payload.to_vec(),
            Err(err) => {
                warn!(%err, key = %key, "commit quorum without a stored payload; dropping");
                return vec![];
            }
        };
        if let Some(entry) = self.slots.entry_mut(&slot) {
            entry.committed = true;
        }
        self.last_leader_op = self.now;

        info!(key = %key, commits = count, "commit quorum reached, delivering");

        let signature = self.secret.sign(&payload);
        vec![
            Action::CancelTimer { id: TimerId::NoOp },
            Action::Notify {
                notification: Notification::Committed { payload, signature },
            },
            Action::SetTimer {
                id: TimerId::NoOp,
                duration: self.config.noop_interval(),
            },
        ]
    }

    // ── Timers ──

    fn on_leader_timer(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::SetTimer {
            id: TimerId::Leader,
            duration: self.config.leader_check_interval(),
        }];

        let silence = self.now.saturating_sub(self.last_leader_op);
        if !self.is_leader() && silence > self.config.leader_timeout {
            info!(
                replica = %self.local,
                leader = %self.current_seq.node(),
                silence_ms = silence.as_millis() as u64,
                "Leader timeout expired. Triggering view change."
            );
            actions.push(Action::Notify {
                notification: Notification::LeaderSuspected {
                    view_number: self.view.view_number(),
                },
            });
            actions.extend(self.suspect_leader());
        }
        actions
    }

    /// View-change entry point. Detection only: the recovery subprotocol
    /// (new-view construction, prepared-slot carryover) is not implemented.
    fn suspect_leader(&mut self) -> Vec<Action> {
        vec![]
    }

    fn on_noop_timer(&mut self) -> Vec<Action> {
        // The guard is re-checked because a cancellation can race a firing.
        if !self.is_leader() {
            return vec![];
        }
        // The heartbeat never reaches the wire; backups refresh liveness
        // from committed notifications only.
        warn!(replica = %self.local, "sending no-op heartbeat");
        vec![Action::SetTimer {
            id: TimerId::NoOp,
            duration: self.config.noop_interval(),
        }]
    }

    fn on_reconnect_timer(&mut self, host: Host) -> Vec<Action> {
        debug!(%host, "reconnect delay elapsed, re-dialing");
        vec![Action::Connect { host }]
    }

    // ── Connection events ──

    fn on_outbound_lost(&mut self, host: Host, failed: bool) -> Vec<Action> {
        warn!(
            %host,
            failed,
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "outbound connection lost, scheduling reconnect"
        );
        vec![Action::SetTimer {
            id: TimerId::Reconnect(host),
            duration: self.config.reconnect_delay,
        }]
    }

    // ── Helpers ──

    /// One send action per view member other than this replica.
    fn send_to_peers(&self, message: WireMessage) -> Vec<Action> {
        self.view
            .members()
            .iter()
            .filter(|&&member| member != self.local)
            .map(|&member| Action::Send {
                to: member,
                message: message.clone(),
            })
            .collect()
    }
}

impl StateMachine for PbftState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        trace!(replica = %self.local, event = event.type_name(), "handling event");
        match event {
            Event::Propose { request } => self.on_propose(request),
            Event::PrePrepareReceived { from, message } => self.on_pre_prepare(from, message),
            Event::PrepareReceived { from, message } => self.on_prepare(from, message),
            Event::CommitReceived { from, message } => self.on_commit(from, message),
            Event::LeaderTimer => self.on_leader_timer(),
            Event::NoOpTimer => self.on_noop_timer(),
            Event::ReconnectTimer { host } => self.on_reconnect_timer(host),
            Event::OutboundDown { host } => self.on_outbound_lost(host, false),
            Event::OutboundFailed { host } => self.on_outbound_lost(host, true),
            Event::OutboundUp { host } => {
                info!(%host, "outbound connection established");
                vec![]
            }
            Event::InboundUp { host } => {
                info!(%host, "inbound connection established");
                vec![]
            }
            Event::InboundDown { host } => {
                warn!(%host, "inbound connection lost");
                vec![]
            }
            Event::MessageFailed { from } => {
                warn!(%from, "failed to deliver message; discarding");
                vec![]
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }
}

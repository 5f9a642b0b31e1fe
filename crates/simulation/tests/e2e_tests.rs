//! End-to-end scenarios for a four-replica group (`n = 4`, `f = 1`).
//!
//! All scenarios run on the deterministic simulation: simulated time, seeded
//! latency jitter, and inline action execution. Replica 0 is the initial
//! leader; replicas are addressed by index throughout.

use palisade_core::{Event, Notification};
use palisade_messages::{MessageKind, PrePrepareMessage};
use palisade_pbft::PbftConfig;
use palisade_simulation::{derive_secret, NetworkConfig, SimulationRunner};
use palisade_types::{Hash, ProposeRequest, SeqN, Signature, SlotKey};
use std::time::Duration;
use tracing_test::traced_test;

const SEED: u64 = 42;
const LEADER_TIMEOUT: Duration = Duration::from_secs(3);

fn four_replicas() -> SimulationRunner {
    let network = NetworkConfig {
        num_replicas: 4,
        latency: Duration::from_millis(10),
        jitter_fraction: 0.1,
        packet_loss_rate: 0.0,
    };
    let pbft = PbftConfig {
        leader_timeout: LEADER_TIMEOUT,
        reconnect_delay: Duration::from_millis(500),
    };
    SimulationRunner::new(network, pbft, SEED)
}

#[traced_test]
#[test]
fn happy_path_commits_on_every_replica() {
    let mut runner = four_replicas();
    runner.initialize();

    // Every replica installed the first view before any traffic.
    for node in 0..4 {
        let upcalls = runner.notifications(node);
        assert!(upcalls
            .iter()
            .any(|n| matches!(n, Notification::Initial { .. })));
        assert!(upcalls.iter().any(|n| matches!(
            n,
            Notification::ViewInstalled { view_number: 1, .. }
        )));
    }

    runner.submit(0, ProposeRequest::new(b"x".to_vec(), 1));
    runner.run_until(Duration::from_secs(2));

    for node in 0..4 {
        assert_eq!(
            runner.committed_payloads(node),
            vec![b"x".to_vec()],
            "replica {node} must deliver the payload exactly once"
        );
    }
}

#[traced_test]
#[test]
fn duplicate_request_commits_once() {
    let mut runner = four_replicas();
    runner.initialize();

    let request = ProposeRequest::new(b"x".to_vec(), 1);
    runner.submit(0, request.clone());
    runner.submit(0, request);
    runner.run_until(Duration::from_secs(2));

    for node in 0..4 {
        assert_eq!(
            runner.committed_payloads(node).len(),
            1,
            "replica {node} must not deliver the replayed request twice"
        );
    }
    assert!(logs_contain("duplicate propose request"));
}

#[traced_test]
#[test]
fn non_leader_drops_proposals() {
    let mut runner = four_replicas();
    runner.initialize();

    runner.submit(1, ProposeRequest::new(b"x".to_vec(), 1));
    runner.run_until(Duration::from_secs(2));

    assert_eq!(runner.stats().messages_sent, 0, "no pre-prepare broadcast");
    for node in 0..4 {
        assert!(runner.committed_payloads(node).is_empty());
    }
    assert!(logs_contain("propose request while not leader"));
}

#[traced_test]
#[test]
fn quorum_survives_one_cut_off_replica() {
    let mut runner = four_replicas();
    runner.initialize();

    // Replica 3 receives the pre-prepare but none of the quorum phases.
    runner.network_mut().drop_inbound(3, MessageKind::Prepare);
    runner.network_mut().drop_inbound(3, MessageKind::Commit);

    runner.submit(0, ProposeRequest::new(b"x".to_vec(), 1));
    runner.run_until(Duration::from_secs(2));

    for node in 0..3 {
        assert_eq!(
            runner.committed_payloads(node),
            vec![b"x".to_vec()],
            "replica {node} still reaches quorum without replica 3"
        );
    }
    assert!(runner.committed_payloads(3).is_empty());

    // Replica 3 accepted the pre-prepare; the slot is open but undelivered.
    assert_eq!(runner.node(3).slots().len(), 1);
}

#[traced_test]
#[test]
fn forged_pre_prepare_opens_nothing() {
    let mut runner = four_replicas();
    runner.initialize();

    let leader = runner.host(0);
    let mut forged = PrePrepareMessage::signed(
        SlotKey::new(Hash::digest(b"x"), SeqN::new(1, leader), 1),
        b"x".to_vec(),
        "replica-0".into(),
        &derive_secret(SEED, 0),
    );
    forged.signature = Signature::from_bytes(&[0x42; 64]);

    runner.schedule_initial_event(
        1,
        Duration::ZERO,
        Event::PrePrepareReceived {
            from: leader,
            message: forged,
        },
    );
    runner.run_until(Duration::from_secs(1));

    assert!(runner.node(1).slots().is_empty(), "no slot may open");
    assert!(runner.node(1).ops().is_empty());
    assert_eq!(runner.stats().messages_sent, 0, "no prepare broadcast");
    assert!(logs_contain("bad signature"));
}

#[traced_test]
#[test]
fn silent_leader_is_suspected_by_every_backup() {
    let mut runner = four_replicas();
    runner.network_mut().isolate_node(0);
    runner.initialize();

    runner.run_until(Duration::from_secs(10));

    // The liveness check fires at 3s, then every second; silence strictly
    // exceeds the 3s timeout from the 4s firing on. 4s..=10s inclusive.
    for node in 1..4 {
        assert_eq!(
            runner.leader_suspicions(node),
            7,
            "replica {node} fires the suspect-leader hook once per check"
        );
    }
    assert_eq!(runner.leader_suspicions(0), 0, "the leader never suspects itself");
    assert!(logs_contain("Leader timeout expired"));
}

#[test]
fn commits_refresh_leader_liveness() {
    let mut runner = four_replicas();
    runner.initialize();

    // Steady proposals keep last_leader_op fresh on the backups.
    for i in 0..5u64 {
        runner.submit(0, ProposeRequest::new(format!("block-{i}").into_bytes(), i + 1));
        runner.run_until(Duration::from_secs(2 * (i + 1)));
    }

    for node in 1..4 {
        assert_eq!(runner.leader_suspicions(node), 0);
        assert_eq!(runner.committed_payloads(node).len(), 5);
    }
}

#[test]
fn leader_sequence_is_strictly_increasing() {
    let mut runner = four_replicas();
    runner.initialize();

    for i in 0..3u64 {
        runner.submit(0, ProposeRequest::new(format!("block-{i}").into_bytes(), i + 1));
        runner.run_until(Duration::from_millis(500 * (i + 1)));
    }
    runner.run_until(Duration::from_secs(3));

    let leader = runner.node(0);
    assert_eq!(leader.current_seq().counter(), 3);
    assert_eq!(leader.highest_seq(), leader.current_seq());
    for node in 0..4 {
        assert_eq!(runner.committed_payloads(node).len(), 3);
    }
}

#[traced_test]
#[test]
fn equivocating_leader_cannot_open_two_slots() {
    let mut runner = four_replicas();
    runner.initialize();

    let leader = runner.host(0);
    let secret = derive_secret(SEED, 0);
    let seq = SeqN::new(1, leader);
    let first = PrePrepareMessage::signed(
        SlotKey::new(Hash::digest(b"x"), seq, 1),
        b"x".to_vec(),
        "replica-0".into(),
        &secret,
    );
    let conflicting = PrePrepareMessage::signed(
        SlotKey::new(Hash::digest(b"y"), seq, 1),
        b"y".to_vec(),
        "replica-0".into(),
        &secret,
    );

    runner.schedule_initial_event(
        1,
        Duration::ZERO,
        Event::PrePrepareReceived {
            from: leader,
            message: first,
        },
    );
    runner.schedule_initial_event(
        1,
        Duration::from_millis(1),
        Event::PrePrepareReceived {
            from: leader,
            message: conflicting,
        },
    );
    runner.run_until(Duration::from_secs(1));

    assert_eq!(
        runner.node(1).slots().len(),
        1,
        "at most one pre-prepare accepted per (seq, view)"
    );
    assert!(logs_contain("equivocating pre-prepare"));
}

#[test]
fn same_seed_runs_identically() {
    let run = |seed: u64| {
        let network = NetworkConfig {
            num_replicas: 4,
            latency: Duration::from_millis(10),
            jitter_fraction: 0.2,
            packet_loss_rate: 0.05,
        };
        let pbft = PbftConfig {
            leader_timeout: LEADER_TIMEOUT,
            reconnect_delay: Duration::from_millis(500),
        };
        let mut runner = SimulationRunner::new(network, pbft, seed);
        runner.initialize();
        for i in 0..3u64 {
            runner.submit(0, ProposeRequest::new(format!("block-{i}").into_bytes(), i + 1));
        }
        runner.run_until(Duration::from_secs(5));

        let committed: Vec<Vec<Vec<u8>>> =
            (0..4).map(|n| runner.committed_payloads(n)).collect();
        (runner.stats().clone(), committed)
    };

    let (stats_a, committed_a) = run(7);
    let (stats_b, committed_b) = run(7);
    assert_eq!(stats_a, stats_b);
    assert_eq!(committed_a, committed_b);
}

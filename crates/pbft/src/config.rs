//! Engine configuration.

use std::time::Duration;

/// Timing knobs for the agreement engine.
#[derive(Debug, Clone)]
pub struct PbftConfig {
    /// How long a backup tolerates leader silence before suspecting it.
    pub leader_timeout: Duration,

    /// Delay before re-dialing a peer whose connection dropped or failed.
    pub reconnect_delay: Duration,
}

impl PbftConfig {
    /// Interval of the periodic leader-liveness check, a third of the
    /// timeout.
    pub fn leader_check_interval(&self) -> Duration {
        self.leader_timeout / 3
    }

    /// Idle heartbeat interval on the leader, half of the timeout.
    pub fn noop_interval(&self) -> Duration {
        self.leader_timeout / 2
    }
}

impl Default for PbftConfig {
    fn default() -> Self {
        Self {
            leader_timeout: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

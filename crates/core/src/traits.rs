//! State machine trait.

use crate::{Action, Event};
use std::time::Duration;

/// A synchronous, deterministic state machine.
///
/// Implementations mutate themselves and perform no I/O; every effect is
/// expressed as a returned [`Action`] for the runner to execute. A handler
/// invocation runs to completion with exclusive access to the state, so no
/// locking is required around the mutable fields.
pub trait StateMachine {
    /// Process one event, returning the actions it produced.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time. Called by the runner before each `handle`.
    fn set_time(&mut self, now: Duration);
}

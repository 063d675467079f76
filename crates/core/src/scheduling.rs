//! Scheduling-status state machine.
//!
//! The transition set is an explicit, injectable policy value rather than a
//! hard-coded table: the default forbids un-cancelling, but a caller that
//! needs CANCELED -> PUBLISHED can construct a wider policy.

use crate::error::CoreError;
use crate::lesson::SchedulingStatus;

/// Set of allowed scheduling-status transitions.
#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    allowed: Vec<(SchedulingStatus, SchedulingStatus)>,
}

impl Default for TransitionPolicy {
    /// DRAFT -> PUBLISHED -> COMPLETED, with CANCELED reachable from DRAFT
    /// or PUBLISHED. COMPLETED and CANCELED are terminal.
    fn default() -> Self {
        use SchedulingStatus::*;
        Self {
            allowed: vec![
                (Draft, Published),
                (Draft, Canceled),
                (Published, Completed),
                (Published, Canceled),
            ],
        }
    }
}

impl TransitionPolicy {
    pub fn new(allowed: Vec<(SchedulingStatus, SchedulingStatus)>) -> Self {
        Self { allowed }
    }

    /// Widen the policy with one extra transition.
    pub fn allow(mut self, from: SchedulingStatus, to: SchedulingStatus) -> Self {
        if !self.allowed.contains(&(from, to)) {
            self.allowed.push((from, to));
        }
        self
    }

    /// Target statuses reachable from `from`.
    pub fn valid_transitions(&self, from: SchedulingStatus) -> Vec<SchedulingStatus> {
        self.allowed
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn can_transition(&self, from: SchedulingStatus, to: SchedulingStatus) -> bool {
        from == to || self.allowed.contains(&(from, to))
    }

    pub fn validate_transition(
        &self,
        from: SchedulingStatus,
        to: SchedulingStatus,
    ) -> Result<(), CoreError> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            })
        }
    }
}

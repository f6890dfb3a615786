//! Per-request lifecycle.

use tracing::debug;

/// Where a request is in the coordination pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Accepted and validated.
    Received,
    /// Content classifier has run.
    Classified,
    /// Oversight evaluator has run.
    Evaluated,
    /// Rejected before dispatch. Terminal.
    Blocked,
    /// Handed to a handler.
    Dispatched,
    /// Envelope produced. Terminal.
    Completed,
    /// Handler failed or timed out. Terminal.
    Failed,
}

impl RequestState {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Blocked | RequestState::Completed | RequestState::Failed
        )
    }

    /// Returns true if `self → next` is a legal transition.
    ///
    /// `Evaluated → Completed` covers task types with no registered handler.
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Classified)
                | (Classified, Evaluated)
                | (Evaluated, Blocked)
                | (Evaluated, Dispatched)
                | (Evaluated, Completed)
                | (Dispatched, Completed)
                | (Dispatched, Failed)
        )
    }
}

/// Tracks one request's state and traces each transition.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: RequestState,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        debug!(state = ?RequestState::Received, "Request received");
        Self {
            state: RequestState::Received,
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        self.state
    }

    /// Moves to `next`. Illegal transitions are a bug in the coordinator.
    pub(crate) fn advance(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal request transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Request state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let mut lifecycle = Lifecycle::new();
        for next in [
            RequestState::Classified,
            RequestState::Evaluated,
            RequestState::Dispatched,
            RequestState::Completed,
        ] {
            lifecycle.advance(next);
        }
        assert_eq!(lifecycle.state(), RequestState::Completed);
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn handler_cannot_run_before_screening() {
        assert!(!RequestState::Received.can_transition_to(RequestState::Dispatched));
        assert!(!RequestState::Classified.can_transition_to(RequestState::Dispatched));
        assert!(!RequestState::Blocked.can_transition_to(RequestState::Dispatched));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            RequestState::Received,
            RequestState::Classified,
            RequestState::Evaluated,
            RequestState::Blocked,
            RequestState::Dispatched,
            RequestState::Completed,
            RequestState::Failed,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    #[should_panic(expected = "illegal request transition")]
    #[cfg(debug_assertions)]
    fn illegal_advance_panics_in_debug() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(RequestState::Completed);
    }
}

//! The session state machine: enumerates legal transitions and the event
//! name associated with each edge. Every state-changing manager operation
//! consults this table before mutating a session.

use mcpi_protocol::SessionState;

/// The event that names a transition. `Processing -> Active` is the single
/// non-obvious case and is always named `Resume`; every other outbound edge
/// from a non-terminal state is named after its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    WaitUser,
    Process,
    Resume,
    Complete,
    Cancel,
    Error,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Transition::Start => "Start",
            Transition::WaitUser => "WaitUser",
            Transition::Process => "Process",
            Transition::Resume => "Resume",
            Transition::Complete => "Complete",
            Transition::Cancel => "Cancel",
            Transition::Error => "Error",
        };
        write!(f, "{s}")
    }
}

/// Returns the transition event for `(from, to)`, or `None` if the edge is
/// not legal. Terminal states (`Completed`, `Cancelled`, `Error`) have no
/// outgoing edges.
pub fn transition_event(from: SessionState, to: SessionState) -> Option<Transition> {
    use SessionState::*;
    match (from, to) {
        (Idle, Active) => Some(Transition::Start),
        (Active, WaitingUser) => Some(Transition::WaitUser),
        (Active, Processing) => Some(Transition::Process),
        (Active, Completed) => Some(Transition::Complete),
        (Active, Cancelled) => Some(Transition::Cancel),
        (Active, Error) => Some(Transition::Error),
        (WaitingUser, Processing) => Some(Transition::Process),
        (WaitingUser, Cancelled) => Some(Transition::Cancel),
        (WaitingUser, Error) => Some(Transition::Error),
        (Processing, Active) => Some(Transition::Resume),
        (Processing, Completed) => Some(Transition::Complete),
        (Processing, Cancelled) => Some(Transition::Cancel),
        (Processing, Error) => Some(Transition::Error),
        _ => None,
    }
}

pub fn is_legal_transition(from: SessionState, to: SessionState) -> bool {
    transition_event(from, to).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn idle_only_starts() {
        assert!(is_legal_transition(Idle, Active));
        for target in [WaitingUser, Processing, Completed, Cancelled, Error, Idle] {
            assert!(!is_legal_transition(Idle, target), "Idle -> {target:?} should be illegal");
        }
    }

    #[test]
    fn active_fans_out_to_five_targets() {
        for target in [WaitingUser, Processing, Completed, Cancelled, Error] {
            assert!(is_legal_transition(Active, target));
        }
        assert!(!is_legal_transition(Active, Idle));
        assert!(!is_legal_transition(Active, Active));
    }

    #[test]
    fn waiting_user_cannot_go_directly_to_active_or_completed() {
        assert!(!is_legal_transition(WaitingUser, Active));
        assert!(!is_legal_transition(WaitingUser, Completed));
        assert!(is_legal_transition(WaitingUser, Processing));
        assert!(is_legal_transition(WaitingUser, Cancelled));
        assert!(is_legal_transition(WaitingUser, Error));
    }

    #[test]
    fn processing_to_active_is_named_resume() {
        assert_eq!(transition_event(Processing, Active), Some(Transition::Resume));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [Completed, Cancelled, Error] {
            for to in [Idle, Active, WaitingUser, Processing, Completed, Cancelled, Error] {
                assert!(!is_legal_transition(from, to), "{from:?} -> {to:?} should be illegal");
            }
        }
    }
}

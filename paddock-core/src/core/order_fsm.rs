//! Order and trade lifecycle state machines
//!
//! Orders live inside a trade's arena and cycle between `Executable` and the
//! in-flight mutation states, so the machine is checked at runtime: every
//! transition goes through [`OrderStatus::can_transition_to`].
//!
//! # State Diagram
//!
//! ```text
//!                 ┌───────────┐
//!                 │  Pending  │──────────────┐
//!                 └─────┬─────┘              │
//!                       │                    ▼
//!                       │              ┌───────────┐
//!                       │              │ Violation │ (terminal)
//!                       ▼              └───────────┘
//!                 ┌────────────┐
//!         ┌──────▶│ Executable │◀──────┐
//!         │       └─────┬──────┘       │
//!         │     ┌───────┼────────┐     │
//!         │     ▼       ▼        ▼     │
//!    Cancelling    Updating    Replacing
//!         │             │         │
//!         └─────────────┼─────────┘
//!                       ▼
//!      ExecutionComplete | Lapsed | Voided   (terminal)
//! ```
//!
//! `Pending` may also jump straight to a terminal state when placement
//! fills, lapses or voids the whole order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created and queued, not yet acknowledged
    Pending,
    /// Accepted by the exchange with size still working
    Executable,
    Cancelling,
    Updating,
    Replacing,
    /// Nothing left working; some or none of it matched
    ExecutionComplete,
    Lapsed,
    Voided,
    /// Rejected by a trading control before leaving the process
    Violation,
}

impl OrderStatus {
    /// Terminal states never transition again
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::ExecutionComplete
                | OrderStatus::Lapsed
                | OrderStatus::Voided
                | OrderStatus::Violation
        )
    }

    /// A mutation has been sent and its outcome is not yet known
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelling | OrderStatus::Updating | OrderStatus::Replacing
        )
    }

    /// Orders the exchange knows about and may still match
    #[inline]
    pub fn is_working(&self) -> bool {
        matches!(self, OrderStatus::Executable) || self.is_in_flight()
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Executable | ExecutionComplete | Lapsed | Voided | Violation) => true,
            (Executable, Cancelling | Updating | Replacing) => true,
            (Executable, ExecutionComplete | Lapsed | Voided) => true,
            (Cancelling | Updating | Replacing, Executable) => true,
            (Cancelling | Updating | Replacing, ExecutionComplete | Lapsed | Voided) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Executable => "EXECUTABLE",
            OrderStatus::Cancelling => "CANCELLING",
            OrderStatus::Updating => "UPDATING",
            OrderStatus::Replacing => "REPLACING",
            OrderStatus::ExecutionComplete => "EXECUTION_COMPLETE",
            OrderStatus::Lapsed => "LAPSED",
            OrderStatus::Voided => "VOIDED",
            OrderStatus::Violation => "VIOLATION",
        };
        f.write_str(text)
    }
}

/// One entry of an order's status history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    /// Virtual-clock time (ms) of the change
    pub at_ms: u64,
}

/// Trade lifecycle: `Pending → Live → Complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Pending,
    Live,
    Complete,
}

impl TradeStatus {
    pub fn can_transition_to(&self, next: TradeStatus) -> bool {
        matches!(
            (self, next),
            (TradeStatus::Pending, TradeStatus::Live)
                | (TradeStatus::Pending, TradeStatus::Complete)
                | (TradeStatus::Live, TradeStatus::Complete)
        )
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "PENDING"),
            TradeStatus::Live => write!(f, "LIVE"),
            TradeStatus::Complete => write!(f, "COMPLETE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    const ALL: [OrderStatus; 9] = [
        Pending,
        Executable,
        Cancelling,
        Updating,
        Replacing,
        ExecutionComplete,
        Lapsed,
        Voided,
        Violation,
    ];

    #[test]
    fn test_terminal_states_are_sinks() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {} allowed", from, to);
            }
        }
    }

    #[test]
    fn test_violation_only_from_pending() {
        for from in ALL {
            assert_eq!(from.can_transition_to(Violation), from == Pending);
        }
    }

    #[test]
    fn test_mutation_round_trip() {
        assert!(Executable.can_transition_to(Cancelling));
        assert!(Cancelling.can_transition_to(Executable));
        assert!(Executable.can_transition_to(Replacing));
        assert!(Replacing.can_transition_to(ExecutionComplete));
        assert!(!Cancelling.can_transition_to(Updating));
        assert!(!Pending.can_transition_to(Cancelling));
    }

    #[test]
    fn test_pending_resolves_directly() {
        assert!(Pending.can_transition_to(ExecutionComplete));
        assert!(Pending.can_transition_to(Lapsed));
        assert!(Pending.can_transition_to(Voided));
    }

    #[test]
    fn test_working_classification() {
        assert!(Executable.is_working());
        assert!(Replacing.is_working());
        assert!(!Pending.is_working());
        assert!(!Lapsed.is_working());
    }

    #[test]
    fn test_trade_status_transitions() {
        assert!(TradeStatus::Pending.can_transition_to(TradeStatus::Live));
        assert!(TradeStatus::Live.can_transition_to(TradeStatus::Complete));
        assert!(!TradeStatus::Complete.can_transition_to(TradeStatus::Live));
        assert!(!TradeStatus::Live.can_transition_to(TradeStatus::Pending));
    }
}

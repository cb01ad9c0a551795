//! Subscription state machine.
//!
//! A subscriber's state is derived from the stored record and the current
//! time rather than stored, so it can never drift from `joined`,
//! `departed_at` and `expiry_at`.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a subscriber record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Invite issued, not yet used; subscription still valid.
    Pending,

    /// Admitted and currently a member of the group.
    Active,

    /// Was a member, has left or been removed by someone else,
    /// subscription still valid.
    Departed,

    /// `expiry_at` has passed; the sweeper will evict and delete.
    ExpiredPendingRemoval,

    /// Evicted and deleted from the store.
    Removed,
}

impl SubscriptionState {
    /// Whether the subscriber is currently entitled to be in the group.
    pub fn is_entitled(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Pending | SubscriptionState::Active | SubscriptionState::Departed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Pending => "pending",
            SubscriptionState::Active => "active",
            SubscriptionState::Departed => "departed",
            SubscriptionState::ExpiredPendingRemoval => "expired_pending_removal",
            SubscriptionState::Removed => "removed",
        }
    }
}

impl StateMachine for SubscriptionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionState::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, ExpiredPendingRemoval)
            // From ACTIVE
                | (Active, Departed)
                | (Active, ExpiredPendingRemoval)
            // From DEPARTED
                | (Departed, Pending) // Invite reissued
                | (Departed, ExpiredPendingRemoval)
            // From EXPIRED_PENDING_REMOVAL
                | (ExpiredPendingRemoval, Pending) // Extend/resubscribe before sweep
                | (ExpiredPendingRemoval, Active) // Extend while still in group
                | (ExpiredPendingRemoval, Departed)
                | (ExpiredPendingRemoval, Removed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionState::*;
        match self {
            Pending => vec![Active, ExpiredPendingRemoval],
            Active => vec![Departed, ExpiredPendingRemoval],
            Departed => vec![Pending, ExpiredPendingRemoval],
            ExpiredPendingRemoval => vec![Pending, Active, Departed, Removed],
            Removed => vec![],
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubscriptionState::*;

    const ALL: [SubscriptionState; 5] = [Pending, Active, Departed, ExpiredPendingRemoval, Removed];

    #[test]
    fn pending_can_be_admitted() {
        assert_eq!(Pending.transition_to(Active), Ok(Active));
    }

    #[test]
    fn pending_cannot_depart_without_joining() {
        assert!(Pending.transition_to(Departed).is_err());
    }

    #[test]
    fn active_cannot_be_removed_without_expiring() {
        assert!(!Active.can_transition_to(&Removed));
    }

    #[test]
    fn departed_can_receive_new_invite() {
        assert_eq!(Departed.transition_to(Pending), Ok(Pending));
    }

    #[test]
    fn departed_cannot_rejoin_without_invite() {
        assert!(Departed.transition_to(Active).is_err());
    }

    #[test]
    fn expired_can_be_removed() {
        assert_eq!(
            ExpiredPendingRemoval.transition_to(Removed),
            Ok(Removed)
        );
    }

    #[test]
    fn removed_is_terminal() {
        assert!(Removed.is_terminal());
        for state in ALL {
            if state != Removed {
                assert!(!state.is_terminal(), "{:?} should not be terminal", state);
            }
        }
    }

    #[test]
    fn only_unexpired_states_are_entitled() {
        assert!(Pending.is_entitled());
        assert!(Active.is_entitled());
        assert!(Departed.is_entitled());
        assert!(!ExpiredPendingRemoval.is_entitled());
        assert!(!Removed.is_entitled());
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for state in ALL {
            for target in ALL {
                assert_eq!(
                    state.can_transition_to(&target),
                    state.valid_transitions().contains(&target),
                    "mismatch for {:?} -> {:?}",
                    state,
                    target
                );
            }
        }
    }
}

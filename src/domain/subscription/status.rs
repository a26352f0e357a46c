//! Subscription status state machine.
//!
//! Defines all possible subscription states and valid transitions
//! according to the billing lifecycle. "No subscription" is represented
//! by the absence of a row, not by a status value.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Remote subscription created, awaiting out-of-band user approval.
    /// No access until the processor confirms payment.
    Pending,

    /// Paid and current. Full access.
    Active,

    /// Processor reported a failed charge. Grace period is running and
    /// access is preserved until it ends.
    PaymentFailed,

    /// Billing paused at the user's request. Access revoked immediately,
    /// unlike cancellation.
    Suspended,

    /// User requested cancellation. Access continues until the end of the
    /// paid period, then the row becomes Expired.
    Cancelled,

    /// Subscription ended. No access. Resubscribing creates a fresh
    /// remote resource.
    Expired,
}

impl SubscriptionStatus {
    /// Returns true if this status can grant premium access.
    ///
    /// Cancelled rows additionally require `now < expires_at`; that check
    /// lives on the aggregate because it needs the row's dates.
    pub fn may_have_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active
                | SubscriptionStatus::PaymentFailed
                | SubscriptionStatus::Cancelled
        )
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, Pending) // resubscribe replaces an abandoned approval
                | (Pending, Expired)
            // From ACTIVE
                | (Active, Active) // immediate plan change or renewal
                | (Active, PaymentFailed)
                | (Active, Suspended)
                | (Active, Cancelled)
            // From PAYMENT_FAILED
                | (PaymentFailed, Active)
                | (PaymentFailed, Cancelled)
                | (PaymentFailed, Expired)
            // From SUSPENDED
                | (Suspended, Active)
                | (Suspended, Cancelled)
            // From CANCELLED
                | (Cancelled, Active)
                | (Cancelled, Expired)
                | (Cancelled, Pending) // resubscribe when remote is gone
            // From EXPIRED
                | (Expired, Pending)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Pending, Expired],
            Active => vec![Active, PaymentFailed, Suspended, Cancelled],
            PaymentFailed => vec![Active, Cancelled, Expired],
            Suspended => vec![Active, Cancelled],
            Cancelled => vec![Active, Expired, Pending],
            Expired => vec![Pending],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::Active,
        SubscriptionStatus::PaymentFailed,
        SubscriptionStatus::Suspended,
        SubscriptionStatus::Cancelled,
        SubscriptionStatus::Expired,
    ];

    #[test]
    fn pending_can_activate() {
        assert_eq!(
            SubscriptionStatus::Pending.transition_to(SubscriptionStatus::Active),
            Ok(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn pending_cannot_be_cancelled() {
        assert!(SubscriptionStatus::Pending
            .transition_to(SubscriptionStatus::Cancelled)
            .is_err());
    }

    #[test]
    fn active_can_fail_payment() {
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::PaymentFailed));
    }

    #[test]
    fn active_can_be_suspended() {
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Suspended));
    }

    #[test]
    fn active_cannot_expire_directly() {
        assert!(!SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Expired));
    }

    #[test]
    fn active_can_change_plan_in_place() {
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Active));
    }

    #[test]
    fn payment_failed_can_recover_or_expire() {
        assert!(
            SubscriptionStatus::PaymentFailed.can_transition_to(&SubscriptionStatus::Active)
        );
        assert!(
            SubscriptionStatus::PaymentFailed.can_transition_to(&SubscriptionStatus::Expired)
        );
    }

    #[test]
    fn payment_failed_can_be_cancelled() {
        assert!(
            SubscriptionStatus::PaymentFailed.can_transition_to(&SubscriptionStatus::Cancelled)
        );
    }

    #[test]
    fn suspended_can_reactivate_or_cancel() {
        assert!(SubscriptionStatus::Suspended.can_transition_to(&SubscriptionStatus::Active));
        assert!(SubscriptionStatus::Suspended.can_transition_to(&SubscriptionStatus::Cancelled));
    }

    #[test]
    fn suspended_cannot_fail_payment() {
        // A suspended subscription is not being charged.
        assert!(
            !SubscriptionStatus::Suspended.can_transition_to(&SubscriptionStatus::PaymentFailed)
        );
    }

    #[test]
    fn cancelled_can_reactivate_before_expiry() {
        assert!(SubscriptionStatus::Cancelled.can_transition_to(&SubscriptionStatus::Active));
    }

    #[test]
    fn cancelled_can_expire() {
        assert!(SubscriptionStatus::Cancelled.can_transition_to(&SubscriptionStatus::Expired));
    }

    #[test]
    fn expired_can_only_resubscribe() {
        assert_eq!(
            SubscriptionStatus::Expired.valid_transitions(),
            vec![SubscriptionStatus::Pending]
        );
    }

    #[test]
    fn access_statuses_are_correct() {
        assert!(SubscriptionStatus::Active.may_have_access());
        assert!(SubscriptionStatus::PaymentFailed.may_have_access());
        assert!(SubscriptionStatus::Cancelled.may_have_access());

        assert!(!SubscriptionStatus::Pending.may_have_access());
        assert!(!SubscriptionStatus::Suspended.may_have_access());
        assert!(!SubscriptionStatus::Expired.may_have_access());
    }

    #[test]
    fn no_status_is_terminal() {
        // Even Expired allows resubscription.
        for status in ALL {
            assert!(!status.is_terminal(), "{:?} should not be terminal", status);
        }
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for status in ALL {
            for target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&target),
                    "can_transition_to should accept {:?} -> {:?}",
                    status,
                    target
                );
            }
        }
    }
}

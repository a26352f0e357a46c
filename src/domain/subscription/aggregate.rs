//! Subscription aggregate entity.
//!
//! The Subscription aggregate represents a user's recurring-payment
//! relationship with the external processor. Each user has at most one
//! Subscription row; users without one have never subscribed.
//!
//! # Design Decisions
//!
//! - **One per user**: unique constraint on user_id enforced at the
//!   database level.
//! - **Versioned**: every update is a compare-and-swap on `version`;
//!   transitions for the same user are linearized through it.
//! - **Instants are passed in**: transition methods take the processing
//!   instant instead of reading the clock, because period boundaries must
//!   be computed from confirmation time, not request time.
//! - **Status is only mutated here**: handlers call these methods; no
//!   other code assigns `status`.

use crate::domain::foundation::{
    DomainError, ErrorCode, StateMachine, SubscriptionId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use super::{PlanType, SubscriptionStatus};

/// Subscription aggregate - a user's billing relationship.
///
/// # Invariants
///
/// - `user_id` is unique (one subscription per user)
/// - `next_plan_type` is Some iff `next_plan_starts_at` is Some
/// - status transitions follow the state machine rules
/// - a schedule may only be attached while `status = Active`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier for this subscription row.
    pub id: SubscriptionId,

    /// User who owns this subscription. Immutable.
    pub user_id: UserId,

    /// The currently billed plan.
    pub plan_type: PlanType,

    /// Current status in the billing lifecycle.
    pub status: SubscriptionStatus,

    /// Opaque identifier of the remote processor resource. Set when the
    /// remote subscription is created, replaced (never reused) on
    /// resubscription.
    pub remote_subscription_id: Option<String>,

    /// Start of the current paid period.
    pub started_at: Timestamp,

    /// End of the current paid period. Authoritative for when access ends
    /// and when the next charge occurs. None while pending approval.
    pub expires_at: Option<Timestamp>,

    /// False once the user cancels or suspends, even though access may
    /// persist until `expires_at`.
    pub auto_renewal: bool,

    /// Plan to switch to at period end, if a change is scheduled.
    pub next_plan_type: Option<PlanType>,

    /// Instant the scheduled change takes effect. Always aligned to
    /// `expires_at` at the time of scheduling.
    pub next_plan_starts_at: Option<Timestamp>,

    /// When the subscription was suspended, if it was.
    pub suspended_at: Option<Timestamp>,

    /// When cancellation was requested, if it was.
    pub cancelled_at: Option<Timestamp>,

    /// When the row was created.
    pub created_at: Timestamp,

    /// When the row was last updated.
    pub updated_at: Timestamp,

    /// Optimistic-concurrency version. Bumped by the store on every
    /// successful compare-and-swap update.
    pub version: i64,
}

impl Subscription {
    /// Creates a pending subscription awaiting out-of-band approval.
    pub fn create_pending(
        id: SubscriptionId,
        user_id: UserId,
        plan_type: PlanType,
        remote_subscription_id: String,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            plan_type,
            status: SubscriptionStatus::Pending,
            remote_subscription_id: Some(remote_subscription_id),
            started_at: now,
            expires_at: None,
            auto_renewal: false,
            next_plan_type: None,
            next_plan_starts_at: None,
            suspended_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Restarts the lifecycle with a freshly created remote resource.
    ///
    /// Valid from Expired (normal resubscription), Cancelled (remote
    /// resource purged by the processor), and Pending (abandoned
    /// approval replaced by a new attempt).
    pub fn resubscribe(
        &mut self,
        plan_type: PlanType,
        remote_subscription_id: String,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Pending)?;
        self.plan_type = plan_type;
        self.remote_subscription_id = Some(remote_subscription_id);
        self.started_at = now;
        self.expires_at = None;
        self.auto_renewal = false;
        self.next_plan_type = None;
        self.next_plan_starts_at = None;
        self.suspended_at = None;
        self.cancelled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Activates after the processor confirmed payment.
    ///
    /// The paid period starts at the confirmation instant, not the
    /// original request instant, so a slow approval never shortens or
    /// extends the period.
    pub fn activate(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Active)?;
        self.started_at = now;
        self.expires_at = self.plan_type.billing_period_end(now);
        self.auto_renewal = true;
        self.next_plan_type = None;
        self.next_plan_starts_at = None;
        self.suspended_at = None;
        self.cancelled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Applies an immediate plan change within the current billing cycle.
    ///
    /// The processor revise has already succeeded; only the billed plan
    /// changes. Period boundaries stay where they are.
    pub fn change_plan_now(&mut self, new_plan: PlanType, now: Timestamp) -> Result<(), DomainError> {
        if !self.plan_type.allows_immediate_change_to(new_plan) {
            return Err(DomainError::validation(
                "plan_type",
                format!(
                    "Cannot change {} to {} within the current cycle",
                    self.plan_type.display_name(),
                    new_plan.display_name()
                ),
            ));
        }
        self.transition(SubscriptionStatus::Active)?;
        self.plan_type = new_plan;
        self.updated_at = now;
        Ok(())
    }

    /// Attaches a deferred plan change taking effect at period end.
    ///
    /// Does not touch the processor; the reconciler drives the switch
    /// once `next_plan_starts_at` has passed.
    pub fn schedule_plan_change(&mut self, new_plan: PlanType, now: Timestamp) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot schedule a plan change while {:?}",
                    self.status
                ),
            ));
        }
        if self.next_plan_type.is_some() {
            return Err(DomainError::validation(
                "next_plan_type",
                "A plan change is already scheduled",
            ));
        }
        if !self.plan_type.allows_scheduled_change_to(new_plan) {
            return Err(DomainError::validation(
                "plan_type",
                format!(
                    "Cannot schedule a change from {} to {}",
                    self.plan_type.display_name(),
                    new_plan.display_name()
                ),
            ));
        }
        let starts_at = self.expires_at.ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                "Active subscription is missing expires_at",
            )
        })?;
        self.next_plan_type = Some(new_plan);
        self.next_plan_starts_at = Some(starts_at);
        self.updated_at = now;
        Ok(())
    }

    /// Removes a scheduled plan change. Pure local mutation.
    pub fn cancel_scheduled_change(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.next_plan_type.is_none() {
            return Err(DomainError::validation(
                "next_plan_type",
                "No plan change is scheduled",
            ));
        }
        self.next_plan_type = None;
        self.next_plan_starts_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Switches to the scheduled plan and opens a fresh billing period.
    ///
    /// Driven by the reconciler once the schedule is due. The new period
    /// runs from the processing instant.
    pub fn apply_scheduled_change(&mut self, now: Timestamp) -> Result<(), DomainError> {
        let new_plan = self.next_plan_type.ok_or_else(|| {
            DomainError::validation("next_plan_type", "No plan change is scheduled")
        })?;
        let starts_at = self.next_plan_starts_at.ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                "Scheduled change is missing its start instant",
            )
        })?;
        if now.is_before(&starts_at) {
            return Err(DomainError::validation(
                "next_plan_starts_at",
                "Scheduled change is not due yet",
            ));
        }
        self.transition(SubscriptionStatus::Active)?;
        self.plan_type = new_plan;
        self.started_at = now;
        self.expires_at = new_plan.billing_period_end(now);
        self.next_plan_type = None;
        self.next_plan_starts_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels the subscription. Access persists until `expires_at`.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Cancelled)?;
        self.auto_renewal = false;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Suspends billing. Access is revoked immediately.
    pub fn suspend(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Suspended)?;
        self.auto_renewal = false;
        self.suspended_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Resumes an existing remote subscription.
    pub fn reactivate(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Active)?;
        self.auto_renewal = true;
        self.suspended_at = None;
        self.cancelled_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Marks the processor-reported charge failure. Access is preserved
    /// while the grace period runs; the ledger row carries the deadline.
    pub fn record_payment_failure(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::PaymentFailed)?;
        self.updated_at = now;
        Ok(())
    }

    /// Returns to Active after the processor's own retry succeeded.
    ///
    /// The processor has charged for a new period, so the boundary moves
    /// forward from the recovery instant.
    pub fn recover_payment(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Active)?;
        self.started_at = now;
        self.expires_at = self.plan_type.billing_period_end(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the subscription as ended.
    pub fn expire(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(SubscriptionStatus::Expired)?;
        self.auto_renewal = false;
        self.updated_at = now;
        Ok(())
    }

    /// Whether this subscription grants premium access at `now`.
    ///
    /// Active and PaymentFailed (grace window) always grant access.
    /// Cancelled grants access until the paid period ends. Suspended
    /// revokes access immediately.
    pub fn has_access(&self, now: Timestamp) -> bool {
        if !self.status.may_have_access() {
            return false;
        }
        if self.status == SubscriptionStatus::Cancelled {
            return match self.expires_at {
                Some(expires_at) => now.is_before(&expires_at),
                None => false,
            };
        }
        true
    }

    /// Whether a scheduled change exists and is due at `now`.
    pub fn scheduled_change_due(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::Active
            && matches!(self.next_plan_starts_at, Some(starts_at) if !now.is_before(&starts_at))
    }

    fn transition(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscription from {:?} to {:?}",
                    self.status, target
                ),
            )
        })?;
        Ok(())
    }
}

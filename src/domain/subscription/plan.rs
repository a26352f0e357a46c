//! Billing plan definitions.
//!
//! Represents the recurring billing plans available in Fitstride and the
//! policy rules for moving between them.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Recurring billing plan.
///
/// Determines feature access and the billing cadence charged by the
/// payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    /// Free plan - basic tracking only, never billed.
    Free,

    /// Monthly subscription plan.
    Monthly,

    /// Yearly subscription plan - best value.
    Yearly,
}

impl PlanType {
    /// Returns true if this plan is billed by the processor.
    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanType::Free)
    }

    /// Returns the display name for this plan.
    pub fn display_name(&self) -> &'static str {
        match self {
            PlanType::Free => "Free",
            PlanType::Monthly => "Monthly",
            PlanType::Yearly => "Yearly",
        }
    }

    /// Returns the numeric rank of this plan for comparison.
    ///
    /// Higher rank = longer commitment. Used for change-direction policy.
    pub fn rank(&self) -> u8 {
        match self {
            PlanType::Free => 0,
            PlanType::Monthly => 1,
            PlanType::Yearly => 2,
        }
    }

    /// Computes the end of a billing period that starts at `from`.
    ///
    /// Calendar-correct cadence: one month for Monthly, one year for
    /// Yearly. Free is never billed, so it has no period end.
    pub fn billing_period_end(&self, from: Timestamp) -> Option<Timestamp> {
        match self {
            PlanType::Free => None,
            PlanType::Monthly => Some(from.add_months(1)),
            PlanType::Yearly => Some(from.add_years(1)),
        }
    }

    /// Whether an immediate, same-cycle change from `self` to `target` is
    /// allowed by policy.
    ///
    /// Yearly to monthly is refused outright: the user has prepaid a year
    /// and the processor would otherwise issue a mid-term credit. Paid
    /// upgrades (monthly to yearly) go through the processor's revise
    /// operation. Free is never a revise target; dropping to free is a
    /// cancellation, not a plan change.
    pub fn allows_immediate_change_to(&self, target: PlanType) -> bool {
        if !target.is_paid() || *self == target {
            return false;
        }
        target.rank() > self.rank()
    }

    /// Whether a change from `self` to `target` may be scheduled for the
    /// end of the current paid period.
    ///
    /// Any paid-to-paid switch may be deferred, including the downgrade
    /// directions that are refused as immediate changes.
    pub fn allows_scheduled_change_to(&self, target: PlanType) -> bool {
        self.is_paid() && target.is_paid() && *self != target
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

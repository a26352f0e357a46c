//! CheckPremiumAccessHandler - Query handler for premium entitlement.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{PlanType, SubscriptionError, SubscriptionStatus};
use crate::ports::SubscriptionStore;

/// Query for a user's premium entitlement.
#[derive(Debug, Clone)]
pub struct CheckPremiumAccessQuery {
    pub user_id: UserId,
}

/// Snapshot of a user's entitlement at the query instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiumAccess {
    pub has_access: bool,

    /// Plan backing the access, when access is granted.
    pub plan_type: Option<PlanType>,

    /// Lifecycle status, when a subscription row exists.
    pub status: Option<SubscriptionStatus>,

    /// When access ends, for cancelled subscriptions still inside the
    /// paid period.
    pub access_until: Option<Timestamp>,
}

/// Handler answering "does this user have premium right now".
///
/// Read-only; never mutates rows. A user without a subscription row has
/// simply never subscribed.
pub struct CheckPremiumAccessHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl CheckPremiumAccessHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        query: CheckPremiumAccessQuery,
    ) -> Result<PremiumAccess, SubscriptionError> {
        let subscription = match self.store.find_by_user_id(&query.user_id).await? {
            Some(subscription) => subscription,
            None => {
                return Ok(PremiumAccess {
                    has_access: false,
                    plan_type: None,
                    status: None,
                    access_until: None,
                })
            }
        };

        let now = Timestamp::now();
        let has_access = subscription.has_access(now);
        let access_until = if subscription.status == SubscriptionStatus::Cancelled && has_access {
            subscription.expires_at
        } else {
            None
        };

        Ok(PremiumAccess {
            has_access,
            plan_type: has_access.then_some(subscription.plan_type),
            status: Some(subscription.status),
            access_until,
        })
    }
}

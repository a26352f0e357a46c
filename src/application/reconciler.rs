//! Scheduled reconciler for time-driven lifecycle transitions.
//!
//! Three sweeps per tick, each bounded by the configured batch size:
//!
//! 1. Apply scheduled plan changes that are due
//! 2. Expire subscriptions whose payment-failure grace window ran out
//! 3. Expire cancelled subscriptions whose paid period ended
//!
//! Every row goes through its normal command handler, which reloads and
//! re-validates before acting. Per-row failures are logged and the sweep
//! moves on; a `Conflict` just means another writer got there first and
//! the next tick will see the settled state.

use std::sync::Arc;

use crate::config::ReconcilerConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::SubscriptionError;
use crate::ports::{FailureLedger, SubscriptionStore};

use super::handlers::subscription::{
    ApplyScheduledChangeCommand, ApplyScheduledChangeHandler, ExpireGracePeriodCommand,
    ExpireGracePeriodHandler, ExpireLapsedCancellationCommand, ExpireLapsedCancellationHandler,
};

/// Counts from one reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub plan_changes_applied: u64,
    pub grace_periods_expired: u64,
    pub cancellations_expired: u64,
    pub rows_skipped: u64,
    pub rows_failed: u64,
}

/// The reconciler driving all deadline-based transitions.
pub struct Reconciler {
    store: Arc<dyn SubscriptionStore>,
    ledger: Arc<dyn FailureLedger>,
    apply_change: ApplyScheduledChangeHandler,
    expire_grace: ExpireGracePeriodHandler,
    expire_cancellation: ExpireLapsedCancellationHandler,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        ledger: Arc<dyn FailureLedger>,
        apply_change: ApplyScheduledChangeHandler,
        expire_grace: ExpireGracePeriodHandler,
        expire_cancellation: ExpireLapsedCancellationHandler,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            apply_change,
            expire_grace,
            expire_cancellation,
            config,
        }
    }

    /// Runs sweeps forever at the configured interval. Intended as the
    /// daemon's main loop.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(report) => {
                    tracing::info!(
                        plan_changes = report.plan_changes_applied,
                        grace_expired = report.grace_periods_expired,
                        cancellations_expired = report.cancellations_expired,
                        skipped = report.rows_skipped,
                        failed = report.rows_failed,
                        "Reconciliation sweep finished"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation sweep failed");
                }
            }
        }
    }

    /// Runs one full reconciliation tick.
    ///
    /// Only sweep-level failures (the scan queries themselves) propagate;
    /// per-row outcomes land in the report.
    pub async fn run_once(&self) -> Result<SweepReport, SubscriptionError> {
        let mut report = SweepReport::default();
        let now = Timestamp::now();

        self.sweep_due_plan_changes(now, &mut report).await?;
        self.sweep_expired_grace(now, &mut report).await?;
        self.sweep_lapsed_cancellations(now, &mut report).await?;

        Ok(report)
    }

    async fn sweep_due_plan_changes(
        &self,
        now: Timestamp,
        report: &mut SweepReport,
    ) -> Result<(), SubscriptionError> {
        let due = self
            .store
            .find_due_plan_changes(now, self.config.batch_size)
            .await?;

        for subscription in due {
            match self
                .apply_change
                .handle(ApplyScheduledChangeCommand {
                    subscription_id: subscription.id.clone(),
                })
                .await
            {
                Ok(_) => report.plan_changes_applied += 1,
                Err(e) => Self::record_row_error(e, report),
            }
        }
        Ok(())
    }

    async fn sweep_expired_grace(
        &self,
        now: Timestamp,
        report: &mut SweepReport,
    ) -> Result<(), SubscriptionError> {
        let expired = self
            .ledger
            .find_expired_grace(now, self.config.batch_size)
            .await?;

        for failure in expired {
            match self
                .expire_grace
                .handle(ExpireGracePeriodCommand {
                    failure_id: failure.id.clone(),
                })
                .await
            {
                Ok(outcome) if outcome.subscription.is_some() => {
                    report.grace_periods_expired += 1;
                }
                Ok(_) => report.rows_skipped += 1,
                Err(e) => Self::record_row_error(e, report),
            }
        }
        Ok(())
    }

    async fn sweep_lapsed_cancellations(
        &self,
        now: Timestamp,
        report: &mut SweepReport,
    ) -> Result<(), SubscriptionError> {
        let lapsed = self
            .store
            .find_lapsed_cancellations(now, self.config.batch_size)
            .await?;

        for subscription in lapsed {
            match self
                .expire_cancellation
                .handle(ExpireLapsedCancellationCommand {
                    subscription_id: subscription.id.clone(),
                })
                .await
            {
                Ok(_) => report.cancellations_expired += 1,
                Err(e) => Self::record_row_error(e, report),
            }
        }
        Ok(())
    }

    fn record_row_error(error: SubscriptionError, report: &mut SweepReport) {
        match error {
            // Lost a race with a user action or a concurrent sweep; the
            // row will be re-read next tick if anything is left to do.
            SubscriptionError::Conflict { .. }
            | SubscriptionError::InvalidState { .. }
            | SubscriptionError::ValidationFailed { .. } => {
                tracing::debug!(error = %error, "Reconciler row superseded, skipping");
                report.rows_skipped += 1;
            }
            other => {
                tracing::warn!(error = %other, "Reconciler row failed");
                report.rows_failed += 1;
            }
        }
    }
}

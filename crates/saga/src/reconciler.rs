//! Periodic sweep for offers that finalization left behind.
//!
//! Two situations are picked up:
//! - an offer still `paid` after the grace period, because its dispatch was
//!   rejected or the process stopped before the entry guard;
//! - an offer still `booking_started` after the grace period, because the
//!   process stopped mid-booking. The supplier is asked for the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::OfferStatus;
use serde::Serialize;
use store::{EventLog, OfferStore, OrderLedger};
use tokio::task::JoinHandle;

use crate::dispatcher::FinalizationDispatcher;
use crate::error::Result;
use crate::orchestrator::{BookingOrchestrator, FinalizeOutcome};
use crate::services::supplier::SupplierClient;

/// Timing of the reconciliation sweep.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Time between sweeps.
    pub interval: Duration,

    /// How long an offer may sit in `paid` before it is dispatched again.
    pub paid_grace: Duration,

    /// How long an offer may sit in `booking_started` before the supplier is asked.
    pub started_grace: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            paid_grace: Duration::from_secs(120),
            started_grace: Duration::from_secs(300),
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Paid offers handed back to the dispatcher.
    pub redispatched: usize,

    /// Started offers the supplier confirmed.
    pub confirmed: usize,

    /// Started offers the supplier rejected.
    pub failed: usize,

    /// Started offers still undecided.
    pub pending: usize,
}

/// Recovers offers stuck in `paid` or `booking_started`.
pub struct Reconciler<S, C> {
    store: S,
    orchestrator: Arc<BookingOrchestrator<S, C>>,
    dispatcher: FinalizationDispatcher,
    config: ReconcilerConfig,
}

impl<S, C> Reconciler<S, C>
where
    S: OfferStore + EventLog + OrderLedger + Clone + 'static,
    C: SupplierClient + 'static,
{
    /// Creates a reconciler that redispatches through `dispatcher` and
    /// resolves started offers through `orchestrator`.
    pub fn new(
        store: S,
        orchestrator: Arc<BookingOrchestrator<S, C>>,
        dispatcher: FinalizationDispatcher,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            dispatcher,
            config,
        }
    }

    /// Runs one sweep as of `now`.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let stale_paid = self
            .store
            .list_offers_by_status(OfferStatus::Paid, cutoff(now, self.config.paid_grace))
            .await?;
        for offer in stale_paid {
            match self.dispatcher.dispatch(offer.id) {
                Ok(()) => report.redispatched += 1,
                Err(e) => tracing::warn!(offer_id = %offer.id, error = %e, "Redispatch rejected"),
            }
        }

        let stale_started = self
            .store
            .list_offers_by_status(
                OfferStatus::BookingStarted,
                cutoff(now, self.config.started_grace),
            )
            .await?;
        for offer in stale_started {
            match self.orchestrator.resolve_started(&offer).await {
                Ok(FinalizeOutcome::Confirmed { .. }) => report.confirmed += 1,
                Ok(FinalizeOutcome::Failed { .. }) => report.failed += 1,
                Ok(_) => report.pending += 1,
                Err(e) => {
                    tracing::error!(offer_id = %offer.id, error = %e, "Could not resolve started offer");
                    report.pending += 1;
                }
            }
        }

        if report != SweepReport::default() {
            tracing::info!(?report, "Reconciliation sweep finished");
        }
        Ok(report)
    }

    /// Sweeps every `interval` until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(Utc::now()).await {
                    tracing::error!(error = %e, "Reconciliation sweep failed");
                }
            }
        })
    }
}

/// Start of the window an offer must have been idle since, never earlier
/// than the Unix epoch.
fn cutoff(now: DateTime<Utc>, grace: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(grace)
        .ok()
        .and_then(|grace| now.checked_sub_signed(grace))
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |t| t.max(DateTime::<Utc>::UNIX_EPOCH))
}

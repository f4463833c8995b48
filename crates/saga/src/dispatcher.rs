//! Bounded hand-off of finalization work from request handlers.

use std::sync::Arc;

use common::OfferId;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

use crate::error::DispatchError;
use crate::orchestrator::BookingFinalizer;

/// Queue and worker limits.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Finalizations running at the same time.
    pub workers: usize,

    /// Offers waiting for a worker before new ones are rejected.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

/// Hands offers to a fixed pool of finalization workers without waiting.
///
/// Cloning yields another handle to the same queue. The pool drains and
/// stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct FinalizationDispatcher {
    sender: mpsc::Sender<OfferId>,
}

impl FinalizationDispatcher {
    /// Starts the worker pool. The returned handle completes after the last
    /// dispatcher handle is dropped and in-flight work has finished.
    pub fn spawn(
        finalizer: Arc<dyn BookingFinalizer>,
        config: DispatcherConfig,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(run_workers(finalizer, receiver, config.workers.max(1)));
        (Self { sender }, handle)
    }

    /// Queues `offer_id` for finalization. Never waits.
    pub fn dispatch(&self, offer_id: OfferId) -> Result<(), DispatchError> {
        self.sender.try_send(offer_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                metrics::counter!("finalization_queue_rejected_total").increment(1);
                tracing::warn!(%offer_id, "Finalization queue full, offer left for reconciliation");
                DispatchError::QueueFull(offer_id)
            }
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

async fn run_workers(
    finalizer: Arc<dyn BookingFinalizer>,
    mut receiver: mpsc::Receiver<OfferId>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(offer_id) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let finalizer = Arc::clone(&finalizer);
        tokio::spawn(async move {
            match finalizer.finalize(offer_id).await {
                Ok(outcome) => tracing::debug!(%offer_id, ?outcome, "Finalization finished"),
                Err(e) => tracing::error!(%offer_id, error = %e, "Finalization errored"),
            }
            drop(permit);
        });
    }

    // Wait for in-flight finalizations.
    let _ = permits.acquire_many(workers as u32).await;
    tracing::info!("Finalization workers stopped");
}

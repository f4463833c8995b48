//! Start-up replay of the booking event log.

use futures_util::StreamExt;
use store::EventLog;

use crate::Result;
use crate::projection::Projection;

/// Replays the booking event log through registered projections.
///
/// Each projection tracks how far it has read, so repeated catch-ups only
/// deliver events it has not seen yet.
pub struct ProjectionProcessor<S: EventLog> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventLog> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Streams the whole log and delivers each event to every projection
    /// that has not seen it. Returns the number of events read.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut read: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            read += 1;

            for projection in &self.projections {
                if projection.position().await.events_processed >= read {
                    continue;
                }
                projection.handle(&event).await?;
                metrics::counter!("projection_events_replayed_total", "projection" => projection.name())
                    .increment(1);
            }
        }

        tracing::info!(events = read, "Event log replay complete");
        Ok(read)
    }
}

//! Fixed-cadence snapshot publisher
//!
//! Wakes every `period`, drains the store if something changed and hands the
//! formatted document to the sink. Clean ticks do nothing, so the sink keeps
//! its previous content. Ticks missed during a slow write are skipped rather
//! than replayed in a burst.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, trace};

use crate::error::PublisherError;
use crate::shutdown::Shutdown;
use crate::sink::{SinkError, SnapshotDocument, SnapshotSink};
use crate::store::SnapshotStore;

/// Default snapshot cadence
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Shortest accepted period
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Outcome of a publisher run that ended normally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherReport {
    /// Snapshots handed to the sink
    pub published: u64,
}

pub struct Publisher {
    store: Arc<SnapshotStore>,
    sink: Arc<dyn SnapshotSink>,
    period: Duration,
}

impl Publisher {
    /// Create a publisher; periods below 1 ms are raised to 1 ms
    pub fn new(store: Arc<SnapshotStore>, sink: Arc<dyn SnapshotSink>, period: Duration) -> Self {
        Self {
            store,
            sink,
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Drain and publish once. Returns whether a snapshot was published.
    pub async fn publish_pending(&self) -> Result<bool, SinkError> {
        let Some(snapshot) = self.store.drain_if_dirty() else {
            return Ok(false);
        };

        let doc = SnapshotDocument::from(&snapshot);
        self.sink.publish(&doc).await?;
        trace!(sequence = snapshot.sequence(), "Snapshot published");
        Ok(true)
    }

    /// Publish until shutdown, then drain one last time.
    ///
    /// A sink failure ends the loop.
    pub async fn run(self, mut shutdown: Shutdown) -> Result<PublisherReport, PublisherError> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_ms = self.period.as_millis() as u64,
            sink = %self.sink.describe(),
            "Publisher started"
        );

        let mut report = PublisherReport::default();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = interval.tick() => {}
            }
            self.publish_tick(&mut report).await?;
        }

        self.publish_tick(&mut report).await?;
        info!(published = report.published, "Publisher stopped");
        Ok(report)
    }

    async fn publish_tick(&self, report: &mut PublisherReport) -> Result<(), PublisherError> {
        match self.publish_pending().await {
            Ok(true) => {
                report.published += 1;
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                error!(
                    sink = %self.sink.describe(),
                    error = %e,
                    "Sink write failed, publisher stopping"
                );
                Err(PublisherError::Sink {
                    published: report.published,
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use telem_channels::{ChannelDescriptor, ChannelTable};

    fn fixture() -> (Arc<SnapshotStore>, Arc<MemorySink>) {
        let table = ChannelTable::new(vec![
            ChannelDescriptor::new("RPM", 0, 2).with_unit("RPM"),
            ChannelDescriptor::new("BatteryVoltage", 2, 2)
                .with_scale(0.01)
                .with_unit("V"),
        ])
        .unwrap();
        (
            Arc::new(SnapshotStore::new(Arc::new(table))),
            Arc::new(MemorySink::new()),
        )
    }

    #[test]
    fn test_period_is_clamped() {
        let (store, sink) = fixture();
        let publisher = Publisher::new(store, sink, Duration::ZERO);
        assert_eq!(publisher.period(), MIN_PERIOD);
    }

    #[tokio::test]
    async fn test_publish_pending_only_when_dirty() {
        let (store, sink) = fixture();
        let publisher = Publisher::new(store.clone(), sink.clone(), DEFAULT_PERIOD);

        assert!(!publisher.publish_pending().await.unwrap());
        store.record_batch(&[(0, 3000), (1, 1380)]);
        assert!(publisher.publish_pending().await.unwrap());
        assert!(!publisher.publish_pending().await.unwrap());

        let doc = sink.last().unwrap();
        assert_eq!(doc.value("RPM"), Some("3000 RPM"));
        assert_eq!(doc.value("BatteryVoltage"), Some("13.80 V"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_ticks_publish_nothing() {
        let (store, sink) = fixture();
        let shutdown = Shutdown::new();
        let publisher = Publisher::new(store.clone(), sink.clone(), DEFAULT_PERIOD);
        let handle = tokio::spawn(publisher.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(sink.count(), 0);

        store.record_batch(&[(0, 900), (1, 1380)]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sink.count(), 1);

        shutdown.trigger();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.published, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_published_before_every_channel_arrives() {
        let (store, sink) = fixture();
        let shutdown = Shutdown::new();
        let publisher = Publisher::new(store.clone(), sink.clone(), DEFAULT_PERIOD);
        let handle = tokio::spawn(publisher.run(shutdown.clone()));

        store.record(0, 3000);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(sink.count(), 0);

        store.record(1, 1380);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.last().unwrap().value("BatteryVoltage"), Some("13.80 V"));

        shutdown.trigger();
        assert_eq!(handle.await.unwrap().unwrap().published, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_drain_on_shutdown() {
        let (store, sink) = fixture();
        let shutdown = Shutdown::new();
        let publisher = Publisher::new(store.clone(), sink.clone(), Duration::from_secs(3600));
        let handle = tokio::spawn(publisher.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        store.record_batch(&[(0, 800), (1, 1200)]);
        shutdown.trigger();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(sink.last().unwrap().value("BatteryVoltage"), Some("12.00 V"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_error_stops_publisher() {
        let (store, sink) = fixture();
        sink.set_failing(true);
        store.record_batch(&[(0, 1), (1, 1)]);

        let publisher = Publisher::new(store.clone(), sink.clone(), DEFAULT_PERIOD);
        let result = tokio::time::timeout(Duration::from_secs(5), publisher.run(Shutdown::new()))
            .await
            .expect("publisher should stop on its own");

        match result {
            Err(PublisherError::Sink { published, source }) => {
                assert_eq!(published, 0);
                assert!(matches!(source, SinkError::Unavailable(_)));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}

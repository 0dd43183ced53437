//! Acquisition runtime
//!
//! [`Acquisition`] owns everything one acquisition needs: the bus source, the
//! channel table and the snapshot store. `run` drives two tasks until
//! shutdown:
//!
//! - **decoder**: frame-driven, pulls from the source and updates the store
//! - **publisher**: timer-driven, drains the store into the sink
//!
//! The tasks share only the store. A failing sink stops the publisher but
//! the decoder keeps running until shutdown. An exhausted source (end of a
//! replay, closed mock) triggers shutdown so the publisher flushes once more.

use std::sync::Arc;
use std::time::Duration;

use telem_channels::{ChannelTable, M400_SOURCE_ID};
use tracing::{info, warn};

use crate::config::{DecoderConfig, PublisherConfig};
use crate::decoder::{DecoderStats, FrameDecoder};
use crate::error::{ConfigError, PublisherError, RuntimeError};
use crate::publisher::{Publisher, DEFAULT_PERIOD};
use crate::shutdown::Shutdown;
use crate::sink::SnapshotSink;
use crate::source::BusSource;
use crate::store::SnapshotStore;

/// Decoder and publisher settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionSettings {
    pub source_id: u32,
    /// Source frames use the 29-bit id format
    pub extended_id: bool,
    pub wait_for_sync: bool,
    pub period: Duration,
    pub retry_backoff: Duration,
    /// Publish nothing until every channel has been decoded once
    pub require_complete: bool,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            source_id: M400_SOURCE_ID,
            extended_id: false,
            wait_for_sync: false,
            period: DEFAULT_PERIOD,
            retry_backoff: Duration::from_millis(100),
            require_complete: true,
        }
    }
}

impl AcquisitionSettings {
    pub fn from_config(
        decoder: &DecoderConfig,
        publisher: &PublisherConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            source_id: decoder.source_id()?,
            extended_id: decoder.extended_id,
            wait_for_sync: decoder.wait_for_sync,
            period: publisher.period()?,
            retry_backoff: decoder.retry_backoff(),
            require_complete: publisher.require_complete,
        })
    }
}

/// Summary of a finished run
#[derive(Debug)]
pub struct RunReport {
    pub decoder: DecoderStats,
    /// Snapshots published, including those before a sink failure
    pub published: u64,
    /// Set when the sink failed and the publisher stopped early
    pub publisher_error: Option<PublisherError>,
    /// The source ran out of frames before shutdown was requested
    pub source_exhausted: bool,
}

pub struct Acquisition {
    source: Box<dyn BusSource>,
    table: Arc<ChannelTable>,
    store: Arc<SnapshotStore>,
    settings: AcquisitionSettings,
}

impl Acquisition {
    pub fn new(
        source: Box<dyn BusSource>,
        table: Arc<ChannelTable>,
        settings: AcquisitionSettings,
    ) -> Self {
        let store = SnapshotStore::new(table.clone());
        let store = Arc::new(if settings.require_complete {
            store
        } else {
            store.allow_partial()
        });
        Self {
            source,
            table,
            store,
            settings,
        }
    }

    /// Store shared by the decoder and the publisher
    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }

    pub fn table(&self) -> &Arc<ChannelTable> {
        &self.table
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Run until shutdown (or source exhaustion) and both tasks have ended
    pub async fn run(
        self,
        sink: Arc<dyn SnapshotSink>,
        shutdown: Shutdown,
    ) -> Result<RunReport, RuntimeError> {
        let Self {
            source,
            table,
            store,
            settings,
        } = self;

        info!(
            source = %source.describe(),
            can_id = format!("0x{:03X}", settings.source_id),
            channels = table.len(),
            wait_for_sync = settings.wait_for_sync,
            "Acquisition starting"
        );

        let decoder = FrameDecoder::new(settings.source_id, store.clone())
            .extended_id(settings.extended_id)
            .wait_for_sync(settings.wait_for_sync);
        let publisher = Publisher::new(store, sink, settings.period);

        let decode_task = tokio::spawn(decode_loop(
            source,
            decoder,
            shutdown.clone(),
            settings.retry_backoff,
        ));
        let publish_task = tokio::spawn(publisher.run(shutdown));

        let (decoded, published) = tokio::join!(decode_task, publish_task);

        let (stats, source_exhausted) = decoded.map_err(|e| RuntimeError::Join {
            task: "decoder",
            reason: e.to_string(),
        })?;
        let published = published.map_err(|e| RuntimeError::Join {
            task: "publisher",
            reason: e.to_string(),
        })?;

        let report = match published {
            Ok(report) => RunReport {
                decoder: stats,
                published: report.published,
                publisher_error: None,
                source_exhausted,
            },
            Err(e) => RunReport {
                decoder: stats,
                published: e.published(),
                publisher_error: Some(e),
                source_exhausted,
            },
        };

        info!(
            frames = report.decoder.frames,
            ignored = report.decoder.ignored,
            markers = report.decoder.markers,
            truncated = report.decoder.truncated,
            published = report.published,
            "Acquisition stopped"
        );
        Ok(report)
    }
}

async fn decode_loop(
    mut source: Box<dyn BusSource>,
    mut decoder: FrameDecoder,
    mut shutdown: Shutdown,
    retry_backoff: Duration,
) -> (DecoderStats, bool) {
    let mut exhausted = false;

    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            received = source.recv() => received,
        };

        match received {
            Ok(Some(frame)) => {
                decoder.process(&frame);
            }
            Ok(None) => {
                info!(source = %source.describe(), "Bus source exhausted");
                exhausted = true;
                break;
            }
            Err(e) => {
                warn!(
                    source = %source.describe(),
                    error = %e,
                    backoff_ms = retry_backoff.as_millis() as u64,
                    "Bus source error, retrying"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    _ = tokio::time::sleep(retry_backoff) => {}
                }
            }
        }
    }

    if exhausted {
        shutdown.trigger();
    }
    (decoder.stats(), exhausted)
}

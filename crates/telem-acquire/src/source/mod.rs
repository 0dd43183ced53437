//! Bus sources
//!
//! A source yields CAN frames in transmission order:
//! - SocketCAN source for a live bus (Linux only)
//! - candump log replay
//! - Simulated ECU for bench runs
//! - Mock source for testing
//!
//! # Example
//!
//! ```ignore
//! use telem_acquire::config::SourceConfig;
//! use telem_acquire::source::create_source;
//!
//! let mut source = create_source(&SourceConfig::default(), 0x5F0, &table).await?;
//! while let Some(frame) = source.recv().await? {
//!     decoder.process(&frame);
//! }
//! ```

pub mod error;
pub mod mock;
pub mod replay;
pub mod simulated;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use error::TransportError;
pub use mock::{MockSource, MockSourceHandle};
pub use replay::{parse_candump_line, LogRecord, ReplaySource};
pub use simulated::{encode_rotation, SimulatedSource};

use std::sync::Arc;

use async_trait::async_trait;
use telem_channels::ChannelTable;

use crate::config::SourceConfig;
use crate::frame::CanFrame;

/// Frame producer feeding the decoder
#[async_trait]
pub trait BusSource: Send {
    /// Next frame.
    ///
    /// `Ok(None)` when the source is exhausted; `Err` for a transient
    /// transport failure after which the caller may try again.
    async fn recv(&mut self) -> Result<Option<CanFrame>, TransportError>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Create a bus source based on configuration
pub async fn create_source(
    config: &SourceConfig,
    source_id: u32,
    table: &Arc<ChannelTable>,
) -> Result<Box<dyn BusSource>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        SourceConfig::SocketCan(cfg) => {
            let source = socketcan::SocketCanSource::open(cfg)?;
            Ok(Box::new(source))
        }
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        SourceConfig::SocketCan(_) => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        SourceConfig::Replay(cfg) => {
            let source = ReplaySource::open(cfg).await?;
            Ok(Box::new(source))
        }
        SourceConfig::Simulated(cfg) => {
            let source = SimulatedSource::new(source_id, table.clone(), cfg);
            Ok(Box::new(source))
        }
    }
}

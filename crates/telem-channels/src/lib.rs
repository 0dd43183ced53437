//! telem-channels - Channel tables for rotating ECU telemetry streams
//!
//! Some engine ECUs publish their whole data set on a single CAN identifier:
//! successive frames carry successive slices of one long payload, and a
//! marker resets the stream once per rotation. A channel is identified by its
//! byte offset into that rotation.
//!
//! This crate holds the static side of that picture:
//!
//! - **Descriptors** - offset, width, scale, precision, unit, name
//! - **Validated tables** - ordered, non-overlapping, frame-aligned
//! - **Big-endian decoding** with sign extension
//! - **Fixed-precision formatting** - each channel keeps its own decimals
//! - **YAML/TOML definition files**
//!
//! # Quick Start
//!
//! ```rust
//! use telem_channels::{ChannelDescriptor, ChannelTable};
//!
//! let table = ChannelTable::new(vec![
//!     ChannelDescriptor::new("RPM", 0, 2).with_unit("RPM").unsigned(),
//!     ChannelDescriptor::new("ThrottlePosition", 2, 2)
//!         .with_scale(0.1)
//!         .with_unit("%"),
//! ])
//! .unwrap();
//!
//! let throttle = &table.channels()[1];
//! let raw = throttle.decode(&[0x04, 0xD2]).unwrap();
//! assert_eq!(raw, 1234);
//! assert_eq!(throttle.format_reading(raw), "123.4 %");
//! ```
//!
//! # Definition Files
//!
//! ```yaml
//! meta:
//!   name: MoTeC M400
//!   version: "1"
//!
//! channels:
//!   - name: RPM
//!     offset: 0
//!     width: 2
//!     unit: RPM
//!     signed: false
//!   - name: BatteryVoltage
//!     offset: 44
//!     scale: 0.01
//!     precision: 2
//!     unit: V
//! ```

pub mod decode;
pub mod descriptor;
pub mod error;
pub mod precision;
pub mod profile;
pub mod table;

pub use decode::read_be;
pub use descriptor::ChannelDescriptor;
pub use error::{ChannelError, ChannelResult};
pub use precision::{format_fixed, precision_from_scale};
pub use profile::M400_SOURCE_ID;
pub use table::{ChannelTable, TableMeta, FRAME_PAYLOAD_LEN};

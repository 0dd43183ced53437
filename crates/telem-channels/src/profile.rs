//! Built-in ECU profiles

use crate::descriptor::ChannelDescriptor;
use crate::error::ChannelResult;
use crate::table::{ChannelTable, TableMeta};

/// CAN identifier the MoTeC M400 uses for its rotating data set
pub const M400_SOURCE_ID: u32 = 0x5F0;

/// Channel table for the MoTeC M400 default data set.
pub fn m400() -> ChannelResult<ChannelTable> {
    let meta = TableMeta {
        name: Some("MoTeC M400".to_string()),
        version: Some("1".to_string()),
        description: Some("Default rotating data set on CAN id 0x5F0".to_string()),
    };

    ChannelTable::with_meta(
        meta,
        vec![
            ChannelDescriptor::new("RPM", 0, 2)
                .with_precision(0)
                .with_unit("RPM")
                .unsigned(),
            ChannelDescriptor::new("ThrottlePosition", 2, 2)
                .with_scale(0.1)
                .with_precision(1)
                .with_unit("%"),
            ChannelDescriptor::new("ManifoldPressure", 4, 2)
                .with_scale(0.1)
                .with_precision(1)
                .with_unit("kPa"),
            ChannelDescriptor::new("BatteryVoltage", 44, 2)
                .with_scale(0.01)
                .with_precision(2)
                .with_unit("V"),
        ],
    )
}

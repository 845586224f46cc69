/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/
#![cfg_attr(not(test), no_std)]

//! Configuration driver for the ImageDesign MIA1321 CMOS image sensor
//! This imaging sensor has multiple interfaces:
//! - Two-wire i2c for configuration registers (i2c)
//! - MIPI CSI-2 pixel data out, two lanes
//! - xvclk reference clock, reset and power-down lines
//! This driver is concerned only with the i2c interface and the power
//! sequencing around it: mode selection, exposure/gain/orientation
//! controls and the stream on/off state machine.

/// Diagnostic output, routed to RTT when the `rttdebug` feature is enabled
macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "rttdebug")]
        panic_rtt_core::rprintln!($($arg)*);
        #[cfg(not(feature = "rttdebug"))]
        {
            fn sink(_: core::fmt::Arguments) {}
            sink(core::format_args!($($arg)*));
        }
    }};
}

pub mod config;
pub mod controls;
pub mod gain;
pub mod modes;
pub mod platform;
pub mod registers;
pub mod sensor;
pub mod subdev;
pub mod transport;


pub use config::{Config, Facing, ModuleInfo};
pub use controls::{Control, ControlId, ControlRange, Orientation, TestPattern};
pub use modes::{BusFormat, Fraction, HdrMode, Mode, RegVal, SUPPORTED_MODES};
pub use platform::{ControlPins, PinState, Platform, PowerReference, Resource, UsageCount};
pub use sensor::{Mia1321, SensorState};
pub use subdev::{
    Command, CommandResponse, EspMode, FormatTarget, FrameFormat, FrameInterval,
    FrameSize, HdrAeExposure, HdrConfig, MbusConfig, SubdevCore, SubdevPad,
    SubdevVideo,
};

/// Errors in this crate
#[derive(Debug, PartialEq)]
pub enum Error<CommE> {
    /// Sensor communication error: the bus transaction failed or was short
    Comm(CommE),

    /// No mode in the catalog matches the requested geometry and HDR tag
    UnsupportedMode,

    /// Malformed request: bad register width, out-of-range control value,
    /// enumeration index past the end, write to a read-only control
    InvalidArgument,

    /// A platform resource (clock, supplies) could not be brought up
    ResourceUnavailable(Resource),

    /// The part answering at the configured address is not a MIA1321
    WrongChipId(u16),

    /// Mode changes are refused while the sensor is streaming
    Busy,
}

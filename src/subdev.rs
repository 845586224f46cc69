/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Host-facing operation tables: core, video and pad operations, and the
//! private side-channel commands.

use crate::config::ModuleInfo;
use crate::modes::{BusFormat, Fraction, HdrMode, Mode, PAD_MAX, SUPPORTED_MODES};
use crate::platform::{Platform, PowerReference};
use crate::sensor::Mia1321;
use crate::Error;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use embedded_hal::digital::v2::OutputPin;

/// Which format slot a pad format request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatTarget {
    /// Negotiation scratch slot; the active mode is left alone
    Try,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFormat {
    pub code: BusFormat,
    pub width: u32,
    pub height: u32,
    /// CSI-2 virtual channel carrying this pad
    pub vc: u8,
}

impl FrameFormat {
    pub fn for_mode(mode: &Mode, pad: u32) -> Self {
        let pad = pad as usize;
        let vc = if pad < PAD_MAX && mode.hdr_mode != HdrMode::NoHdr {
            mode.vc[pad]
        } else {
            mode.vc[0]
        };
        FrameFormat {
            code: mode.bus_fmt,
            width: mode.width,
            height: mode.height,
            vc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// One (format, size, interval) tuple of the mode catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameInterval {
    pub code: BusFormat,
    pub width: u32,
    pub height: u32,
    pub interval: Fraction,
    pub hdr_mode: HdrMode,
}

/// MIPI CSI-2 D-PHY link description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MbusConfig {
    pub lanes: u32,
    /// Bit n set when virtual channel n carries data
    pub channels: u8,
    pub continuous_clock: bool,
}

impl MbusConfig {
    pub fn csi2(lanes: u32, hdr_mode: HdrMode) -> Self {
        let channels = match hdr_mode {
            HdrMode::NoHdr => 0b001,
            HdrMode::HdrX2 => 0b011,
            HdrMode::HdrX3 => 0b111,
        };
        Self {
            lanes,
            channels,
            continuous_clock: true,
        }
    }
}

/// How exposures of an HDR frame set are told apart on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EspMode {
    NormalVc,
    LineCount,
    IdCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HdrConfig {
    pub esp_mode: EspMode,
    pub hdr_mode: HdrMode,
}

/// Per-exposure register values for HDR auto-exposure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HdrAeExposure {
    pub long_exp_reg: u32,
    pub long_gain_reg: u32,
    pub middle_exp_reg: u32,
    pub middle_gain_reg: u32,
    pub short_exp_reg: u32,
    pub short_gain_reg: u32,
}

/// Private side-channel commands from user space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    GetModuleInfo,
    GetHdrConfig,
    /// Switch to the mode with the current geometry and this HDR tag
    SetHdrConfig(HdrMode),
    SetHdrAeExposure(HdrAeExposure),
    /// Toggle the streaming bit directly, bypassing the stream state machine
    SetQuickStream(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandResponse {
    Done,
    ModuleInfo(ModuleInfo),
    HdrConfig(HdrConfig),
}

pub trait SubdevCore {
    type Error;

    fn set_power(&self, on: bool) -> Result<(), Self::Error>;
    fn command(&self, command: Command) -> Result<CommandResponse, Self::Error>;
}

pub trait SubdevVideo {
    type Error;

    fn set_stream(&self, on: bool) -> Result<(), Self::Error>;
    /// Nominal interval of the active mode, or the tracked one while streaming
    fn frame_interval(&self) -> Fraction;
}

pub trait SubdevPad {
    type Error;

    fn enum_mbus_code(&self, index: u32) -> Result<BusFormat, Self::Error>;
    fn enum_frame_size(&self, index: u32, code: BusFormat) -> Result<FrameSize, Self::Error>;
    fn enum_frame_interval(&self, index: u32) -> Result<FrameInterval, Self::Error>;
    fn get_format(&self, pad: u32, target: FormatTarget) -> Result<FrameFormat, Self::Error>;
    /// Snap the requested size to the best-fitting mode
    fn set_format(
        &self,
        pad: u32,
        target: FormatTarget,
        width: u32,
        height: u32,
    ) -> Result<FrameFormat, Self::Error>;
    fn mbus_config(&self, pad: u32) -> MbusConfig;
}

impl<I2C, CommE, D, P, PM, RST, PWDN> SubdevCore for Mia1321<I2C, D, P, PM, RST, PWDN>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    P: Platform,
    PM: PowerReference,
    RST: OutputPin,
    PWDN: OutputPin,
{
    type Error = Error<CommE>;

    fn set_power(&self, on: bool) -> Result<(), Self::Error> {
        self.inner.lock().set_power(on)
    }

    fn command(&self, command: Command) -> Result<CommandResponse, Self::Error> {
        self.inner.lock().command(command)
    }
}

impl<I2C, CommE, D, P, PM, RST, PWDN> SubdevVideo for Mia1321<I2C, D, P, PM, RST, PWDN>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    P: Platform,
    PM: PowerReference,
    RST: OutputPin,
    PWDN: OutputPin,
{
    type Error = Error<CommE>;

    fn set_stream(&self, on: bool) -> Result<(), Self::Error> {
        self.inner.lock().set_stream(on)
    }

    fn frame_interval(&self) -> Fraction {
        self.inner.lock().frame_interval()
    }
}

impl<I2C, CommE, D, P, PM, RST, PWDN> SubdevPad for Mia1321<I2C, D, P, PM, RST, PWDN>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    P: Platform,
    PM: PowerReference,
    RST: OutputPin,
    PWDN: OutputPin,
{
    type Error = Error<CommE>;

    fn enum_mbus_code(&self, index: u32) -> Result<BusFormat, Self::Error> {
        self.inner
            .lock()
            .enum_mbus_code(index)
            .ok_or(Error::InvalidArgument)
    }

    fn enum_frame_size(&self, index: u32, code: BusFormat) -> Result<FrameSize, Self::Error> {
        SUPPORTED_MODES
            .get(index as usize)
            .filter(|mode| mode.bus_fmt == code)
            .map(|mode| FrameSize {
                width: mode.width,
                height: mode.height,
            })
            .ok_or(Error::InvalidArgument)
    }

    fn enum_frame_interval(&self, index: u32) -> Result<FrameInterval, Self::Error> {
        SUPPORTED_MODES
            .get(index as usize)
            .map(|mode| FrameInterval {
                code: mode.bus_fmt,
                width: mode.width,
                height: mode.height,
                interval: mode.max_fps,
                hdr_mode: mode.hdr_mode,
            })
            .ok_or(Error::InvalidArgument)
    }

    fn get_format(&self, pad: u32, target: FormatTarget) -> Result<FrameFormat, Self::Error> {
        Ok(self.inner.lock().get_format(pad, target))
    }

    fn set_format(
        &self,
        pad: u32,
        target: FormatTarget,
        width: u32,
        height: u32,
    ) -> Result<FrameFormat, Self::Error> {
        self.inner.lock().set_format(pad, target, width, height)
    }

    fn mbus_config(&self, _pad: u32) -> MbusConfig {
        self.inner.lock().mbus_config()
    }
}

/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Register map of the MIA1321: addresses are 16 bits wide, values 8 bits

/// Value read back from `GeneralRegisters::ChipId` on a genuine part
pub const CHIP_ID: u16 = 0x0400;

/// Stream control values for `GeneralRegisters::CtrlMode`
pub const MODE_STREAMING: u8 = 0x00;
pub const MODE_SW_STANDBY: u8 = 0x01;

/// Bit of the combined orientation code that drives the mirror register
pub const MIRROR_BIT_MASK: u8 = 1 << 0;
/// Bit of the combined orientation code that drives the flip register
pub const FLIP_BIT_MASK: u8 = 1 << 1;

/// Vertical total size ceiling; bounds the vertical blanking range
pub const VTS_MAX: u32 = 0xffff;

/// Reference clock the mode programs were tuned for
pub const XVCLK_FREQ: u32 = 26_000_000;

pub const LANES: u32 = 2;
pub const BITS_PER_SAMPLE: u32 = 12;
pub const LINK_FREQ: u32 = 576_000_000;
pub const PIXEL_RATE: u32 = LINK_FREQ / BITS_PER_SAMPLE * 2 * LANES;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralRegisters {
    ChipId = 0x0011,
    /// Analog gain, ramp_gainctrl_1[7:0]
    AnaGainL = 0x0018,
    /// Analog gain, ramp_gainctrl_1[8]
    AnaGainM = 0x0019,
    AnaGainH = 0x001b,
    FlipEnable = 0x0099,
    MirrorEnable = 0x009a,
    ExposureL = 0x00cd,
    ExposureM = 0x00ce,
    ExposureH = 0x00cf,
    /// Software standby / streaming
    CtrlMode = 0x0126,
}

impl GeneralRegisters {
    pub const fn addr(self) -> u16 {
        self as u16
    }
}

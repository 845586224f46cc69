/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Catalog of supported operating modes and their register programs

use crate::transport::RegisterBus;
use crate::Error;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

/// Program address meaning "pause for `val` milliseconds"
pub const REG_DELAY: u16 = 0xfffe;
/// Program address terminating the program
pub const REG_NULL: u16 = 0xffff;

/// Number of source pads a mode can describe virtual channels for
pub const PAD_MAX: usize = 4;

/// One step of a register program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegVal {
    pub addr: u16,
    pub val: u8,
}

impl RegVal {
    pub const END: RegVal = RegVal::new(REG_NULL, 0x00);

    pub const fn new(addr: u16, val: u8) -> Self {
        Self { addr, val }
    }

    pub const fn delay_ms(ms: u8) -> Self {
        Self::new(REG_DELAY, ms)
    }
}

const fn reg(addr: u16, val: u8) -> RegVal {
    RegVal::new(addr, val)
}

/// Media bus pixel codes produced by the sensor
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFormat {
    Sgrbg10 = 0x300a,
    Sgrbg12 = 0x3011,
}

impl BusFormat {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HdrMode {
    NoHdr = 0,
    HdrX2 = 5,
    HdrX3 = 6,
}

/// Rational frame interval, seconds per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Immutable descriptor of one operating point
#[derive(Debug, PartialEq)]
pub struct Mode {
    pub bus_fmt: BusFormat,
    pub width: u32,
    pub height: u32,
    pub max_fps: Fraction,
    pub hts_def: u32,
    pub vts_def: u32,
    pub exp_def: u32,
    pub reg_list: &'static [RegVal],
    pub hdr_mode: HdrMode,
    /// CSI-2 virtual channel per pad
    pub vc: [u8; PAD_MAX],
}

impl Mode {
    /// Fixed horizontal blanking for this mode
    pub const fn hblank(&self) -> u32 {
        self.hts_def - self.width
    }

    /// Vertical blanking at the default frame length
    pub const fn vblank_def(&self) -> u32 {
        self.vts_def - self.height
    }

    fn reso_dist(&self, width: u32, height: u32) -> u32 {
        abs_diff(self.width, width) + abs_diff(self.height, height)
    }
}

fn abs_diff(a: u32, b: u32) -> u32 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Pick the mode closest to the requested size by Manhattan distance.
/// Ties go to the earliest catalog entry.
pub fn find_best_fit(width: u32, height: u32) -> &'static Mode {
    let mut best = &SUPPORTED_MODES[0];
    let mut best_dist = best.reso_dist(width, height);
    for mode in SUPPORTED_MODES.iter().skip(1) {
        let dist = mode.reso_dist(width, height);
        if dist < best_dist {
            best_dist = dist;
            best = mode;
        }
    }
    best
}

/// Exact match on geometry and HDR tag
pub fn find_hdr_mode(width: u32, height: u32, hdr_mode: HdrMode) -> Option<&'static Mode> {
    SUPPORTED_MODES.iter().find(|mode| {
        mode.width == width && mode.height == height && mode.hdr_mode == hdr_mode
    })
}

/// Replay a register program in order, stopping at the first failure
pub fn apply_register_program<I2C, CommE, D>(
    program: &[RegVal],
    bus: &mut RegisterBus<I2C>,
    delay: &mut D,
) -> Result<(), Error<CommE>>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayMs<u32>,
{
    for step in program {
        match step.addr {
            REG_NULL => break,
            REG_DELAY => delay.delay_ms(step.val as u32),
            addr => bus.write_reg_u8(addr, step.val)?,
        }
    }
    Ok(())
}

/// Replayed on power-up before any mode program
pub static GLOBAL_REGS: &[RegVal] = &[RegVal::END];

// xvclk 26MHz, 1280x1080, 60fps, mipi 2 lane
const LINEAR_60_1280X1080_REGS: &[RegVal] = &[
    reg(0x011d, 0x00), // 10 bit
    reg(0x011f, 0x00),
    reg(0x012e, 0x02),
    reg(0x012b, 0x01),
    reg(0x00bd, 0x00),
    reg(0x00bc, 0x01),
    reg(0x00bf, 0x00),
    reg(0x00c0, 0x00),
    reg(0x00cd, 0x01),
    reg(0x00ce, 0x01),
    reg(0x00cf, 0x00),
    reg(0x00e1, 0x00),
    reg(0x011c, 0x00),
    reg(0x0120, 0x00),
    reg(0x0125, 0x00),
    reg(0x003c, 0x01),
    reg(0x003d, 0x03),
    reg(0x1201, 0xf0),
    reg(0x1051, 0x1e),
    reg(0x1202, 0x70),
    reg(0x1203, 0x10),
    reg(0x1070, 0x02),
    reg(0x1205, 0x00),
    reg(0x1208, 0x01),
    reg(0x1000, 0x16),
    reg(0x1024, 0x00),
    reg(0x1025, 0x05),
    reg(0x1026, 0x38),
    reg(0x1027, 0x04),
    reg(0x1020, 0x2a),
    reg(0x1042, 0x03),
    reg(0x0010, 0x05),
    reg(0x0012, 0x01),
    reg(0x0043, 0x03),
    reg(0x003f, 0x3f),
    reg(0x0041, 0xff), // mipi drive strength
    reg(0x009a, 0x01), // mirror
    reg(0x0099, 0x01), // flip
    reg(0x00ca, 0x01),
    reg(0x00e1, 0x00),
    reg(0x00e2, 0x00),
    reg(0x0030, 0xc0),
    reg(0x012c, 0x01),
    reg(0x004a, 0x01), // PLL_OUTDIV
    reg(0x004b, 0x90), // PLL_FBDIV
    reg(0x004c, 0x03), // PLL_DIV_ADC
    reg(0x004e, 0x01), // PLL_DIV_BITCLK
    reg(0x0051, 0x03), // PLL_DIV_PCLK
    reg(0x0053, 0x03), // PLL_DIV_CPCLK
    reg(0x00d0, 0x9a), // fot_num 666
    reg(0x00d1, 0x02),
    reg(0x00df, 0x42), // fot_line
    reg(0x01c9, 0x9a), // col_n 666
    reg(0x01ca, 0x02),
    reg(0x0043, 0x01),
    reg(0x02fd, 0x58),
    reg(0x02fe, 0x42),
    reg(0x031f, 0xb0),
    reg(0x0320, 0x04),
    reg(0x0305, 0x08),
    reg(0x0306, 0x87),
    reg(0x0307, 0xfc),
    reg(0x0308, 0x08),
    reg(0x0317, 0x80),
    reg(0x0318, 0x0c),
    reg(0x030f, 0xfa),
    reg(0x0310, 0x0f),
    reg(0x02ff, 0xfa),
    reg(0x0300, 0x8f),
    reg(0x0309, 0xfa),
    reg(0x030a, 0x8f),
    reg(0x00ce, 0x03),
    reg(0x1000, 0x06),
    reg(0x1018, 0x01),
    reg(0x1018, 0x00),
    reg(0x012a, 0x01),
    reg(0x012a, 0x00),
    reg(0x00ce, 0x00),
    reg(0x00cd, 0x01),
    reg(0x012a, 0x01), // latch
    reg(0x012a, 0x00),
    RegVal::END,
];

// xvclk 26MHz, 1280x1080, 117fps, mipi 2 lane
const LINEAR_120_1280X1080_REGS: &[RegVal] = &[
    reg(0x011d, 0x00), // 10 bit
    reg(0x011f, 0x00),
    reg(0x012e, 0x02),
    reg(0x012b, 0x01),
    reg(0x00bd, 0x00),
    reg(0x00bc, 0x01),
    reg(0x00bf, 0x00),
    reg(0x00c0, 0x00),
    reg(0x00cd, 0x01),
    reg(0x00ce, 0x01),
    reg(0x00cf, 0x00),
    reg(0x00e1, 0x00),
    reg(0x011c, 0x00),
    reg(0x0120, 0x00),
    reg(0x0125, 0x00),
    reg(0x003c, 0x01),
    reg(0x003d, 0x03),
    reg(0x1201, 0xf0),
    reg(0x1051, 0x1e),
    reg(0x1202, 0x70),
    reg(0x1203, 0x10),
    reg(0x1070, 0x02),
    reg(0x1205, 0x00),
    reg(0x1208, 0x01),
    reg(0x1000, 0x16),
    reg(0x1024, 0x00),
    reg(0x1025, 0x05),
    reg(0x1026, 0x38),
    reg(0x1027, 0x04),
    reg(0x1020, 0x2a),
    reg(0x1042, 0x03),
    reg(0x0010, 0x05),
    reg(0x0012, 0x01),
    reg(0x0043, 0x03),
    reg(0x003f, 0x3f),
    reg(0x0041, 0xff), // mipi drive strength
    reg(0x00ca, 0x01),
    reg(0x00e1, 0x00),
    reg(0x00e2, 0x00),
    reg(0x0030, 0xc0),
    reg(0x012c, 0x01),
    reg(0x004a, 0x01), // PLL_OUTDIV
    reg(0x004b, 0xd8), // PLL_FBDIV
    reg(0x004c, 0x02), // PLL_DIV_ADC
    reg(0x004e, 0x01), // PLL_DIV_BITCLK
    reg(0x0051, 0x02), // PLL_DIV_PCLK
    reg(0x0053, 0x02), // PLL_DIV_CPCLK
    reg(0x00d0, 0x9a), // fot_num 666
    reg(0x00d1, 0x02),
    reg(0x00df, 0x42), // fot_line
    reg(0x01c9, 0x9a), // col_n 666
    reg(0x01ca, 0x02),
    reg(0x0043, 0x01),
    reg(0x02fd, 0x58),
    reg(0x02fe, 0x42),
    reg(0x031f, 0xb0),
    reg(0x0320, 0x04),
    reg(0x0305, 0x08),
    reg(0x0306, 0x87),
    reg(0x0307, 0xfc),
    reg(0x0308, 0x08),
    reg(0x0317, 0x80),
    reg(0x0318, 0x0c),
    reg(0x030f, 0xfa),
    reg(0x0310, 0x0f),
    reg(0x02ff, 0xfa),
    reg(0x0300, 0x8f),
    reg(0x0309, 0xfa),
    reg(0x030a, 0x8f),
    reg(0x00ce, 0x03),
    reg(0x1000, 0x06),
    reg(0x1018, 0x01),
    reg(0x1018, 0x00),
    reg(0x012a, 0x01),
    reg(0x012a, 0x00),
    reg(0x00ce, 0x00),
    reg(0x00cd, 0x01),
    reg(0x012a, 0x01), // latch
    reg(0x012a, 0x00),
    RegVal::END,
];

// xvclk 26MHz, 1280x1080, 30fps, 12 bit, mipi 2 lane
const LINEAR_30_1280X1080_REGS: &[RegVal] = &[
    reg(0x011d, 0x01), // 12 bit
    reg(0x011f, 0x00),
    reg(0x012e, 0x02),
    reg(0x012b, 0x01),
    reg(0x00bd, 0x00),
    reg(0x00bc, 0x01),
    reg(0x00bf, 0x05),
    reg(0x00c0, 0x00),
    reg(0x00cd, 0x01),
    reg(0x00ce, 0x01),
    reg(0x00cf, 0x00),
    reg(0x00e1, 0x00),
    reg(0x011c, 0x00),
    reg(0x0120, 0x00),
    reg(0x0125, 0x00),
    reg(0x003c, 0x01),
    reg(0x003d, 0x03),
    reg(0x1201, 0xf0),
    reg(0x1051, 0x1e),
    reg(0x1202, 0x70),
    reg(0x1203, 0x10),
    reg(0x1070, 0x02),
    reg(0x1205, 0x00),
    reg(0x1208, 0x01),
    reg(0x1000, 0x16),
    reg(0x1024, 0x00),
    reg(0x1025, 0x05),
    reg(0x1026, 0x38),
    reg(0x1027, 0x04),
    reg(0x1020, 0x2a),
    reg(0x1042, 0x03),
    reg(0x0010, 0x05),
    reg(0x0012, 0x01),
    reg(0x0043, 0x03),
    reg(0x003f, 0x3f),
    reg(0x0041, 0xff), // mipi drive strength
    reg(0x00ca, 0x01),
    reg(0x00e1, 0x00),
    reg(0x00e2, 0x00),
    reg(0x0030, 0xc0),
    reg(0x012c, 0x01),
    reg(0x004a, 0x01), // PLL_OUTDIV
    reg(0x004b, 0x60), // PLL_FBDIV
    reg(0x00d0, 0x9a), // fot_num 666
    reg(0x00d1, 0x02),
    reg(0x00df, 0x42), // fot_line
    reg(0x01c9, 0x9a), // col_n 666
    reg(0x01ca, 0x02),
    reg(0x0043, 0x01),
    reg(0x02fd, 0x58),
    reg(0x02fe, 0x42),
    reg(0x031f, 0xb0),
    reg(0x0320, 0x04),
    reg(0x0305, 0x08),
    reg(0x0306, 0x87),
    reg(0x0307, 0xfc),
    reg(0x0308, 0x08),
    reg(0x0317, 0x80),
    reg(0x0318, 0x0c),
    reg(0x030f, 0xfa),
    reg(0x0310, 0x0f),
    reg(0x02ff, 0xfa),
    reg(0x0300, 0x8f),
    reg(0x0309, 0xfa),
    reg(0x030a, 0x8f),
    reg(0x00ce, 0x03),
    reg(0x1000, 0x06),
    reg(0x1018, 0x01),
    reg(0x1018, 0x00),
    reg(0x012a, 0x01),
    reg(0x012a, 0x00),
    reg(0x00ce, 0x00),
    reg(0x00cd, 0x01),
    reg(0x012a, 0x01), // latch
    reg(0x012a, 0x00),
    RegVal::END,
];

pub static SUPPORTED_MODES: [Mode; 3] = [
    Mode {
        bus_fmt: BusFormat::Sgrbg10,
        width: 1280,
        height: 1080,
        max_fps: Fraction::new(10000, 600000),
        hts_def: 0x0a68,
        vts_def: 0x04b0,
        exp_def: 0x01f4,
        reg_list: LINEAR_60_1280X1080_REGS,
        hdr_mode: HdrMode::NoHdr,
        vc: [0; PAD_MAX],
    },
    Mode {
        bus_fmt: BusFormat::Sgrbg10,
        width: 1280,
        height: 1080,
        max_fps: Fraction::new(10000, 1170000),
        hts_def: 0x0a68,
        vts_def: 0x04b0,
        exp_def: 0x01f4,
        reg_list: LINEAR_120_1280X1080_REGS,
        hdr_mode: HdrMode::NoHdr,
        vc: [0; PAD_MAX],
    },
    Mode {
        bus_fmt: BusFormat::Sgrbg12,
        width: 1280,
        height: 1080,
        max_fps: Fraction::new(10000, 300000),
        hts_def: 0x0a68,
        vts_def: 0x04b0,
        exp_def: 0x0052,
        reg_list: LINEAR_30_1280X1080_REGS,
        hdr_mode: HdrMode::NoHdr,
        vc: [0; PAD_MAX],
    },
];

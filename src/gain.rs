/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Analog gain mapping.
//!
//! Gain is exposed in linear abstract units where `GAIN_STEP_UNIT` is 1x.
//! The sensor encodes it as total_gain = 2^ramp_gainctrl_1[8:7] *
//! (1 + ramp_gainctrl_1[6:0] / 16), split across three registers, plus a
//! ramp bias register that tracks the gain range. The table below steps
//! through the encodable points; there is no interpolation between them.

/// One abstract gain unit step, 1x analog gain
pub const GAIN_STEP_UNIT: u32 = 0x5dc;
pub const GAIN_MIN: u32 = GAIN_STEP_UNIT;
pub const GAIN_MAX: u32 = GAIN_STEP_UNIT * 32;
pub const GAIN_STEP: u32 = 1;
pub const GAIN_DEFAULT: u32 = GAIN_STEP_UNIT;

/// Register fields for one analog gain setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GainRegisters {
    /// ramp_gainctrl_1[7:0], register 0x0018
    pub coarse: u8,
    /// ramp_gainctrl_1[8], register 0x0019
    pub extension: u8,
    /// ramp bias, register 0x001b
    pub compound: u8,
}

struct GainEntry {
    upper: u32,
    regs: GainRegisters,
}

const fn entry(upper: u32, coarse: u8, extension: u8, compound: u8) -> GainEntry {
    GainEntry {
        upper,
        regs: GainRegisters {
            coarse,
            extension,
            compound,
        },
    }
}

const GAIN_TABLE: [GainEntry; 39] = [
    entry(800, 0x00, 0x0, 0x1f),
    entry(1000, 0x04, 0x0, 0x1f),
    entry(1250, 0x09, 0x0, 0x1f),
    entry(1500, 0x0e, 0x0, 0x1f),
    entry(1750, 0x13, 0x0, 0x2b),
    entry(2200, 0x1c, 0x0, 0x2b),
    entry(2450, 0x21, 0x0, 0x2b),
    entry(2700, 0x26, 0x0, 0x2b),
    entry(2950, 0x2b, 0x0, 0x2b),
    entry(3400, 0x34, 0x0, 0x30),
    entry(3650, 0x39, 0x0, 0x30),
    entry(3900, 0x3e, 0x0, 0x30),
    entry(4150, 0x43, 0x0, 0x30),
    entry(4600, 0x4c, 0x0, 0x30),
    entry(4850, 0x51, 0x0, 0x30),
    entry(5100, 0x56, 0x0, 0x30),
    entry(5350, 0x5b, 0x0, 0x30),
    entry(5800, 0x64, 0x0, 0x30),
    entry(6050, 0x69, 0x0, 0x30),
    entry(6300, 0x6e, 0x0, 0x30),
    entry(6550, 0x73, 0x0, 0x32),
    entry(7000, 0x7c, 0x0, 0x32),
    entry(7800, 0xbe, 0x0, 0x32),
    entry(8800, 0xc8, 0x0, 0x32),
    entry(9800, 0xd2, 0x0, 0x32),
    entry(10800, 0xdc, 0x0, 0x32),
    entry(12600, 0xee, 0x0, 0x32),
    entry(13600, 0xf8, 0x0, 0x32),
    entry(14600, 0x39, 0x1, 0x32),
    entry(15600, 0x3e, 0x1, 0x32),
    entry(17400, 0x47, 0x1, 0x32),
    entry(18400, 0x4c, 0x1, 0x32),
    entry(19400, 0x51, 0x1, 0x32),
    entry(20400, 0x56, 0x1, 0x32),
    entry(22200, 0x5f, 0x1, 0x32),
    entry(23200, 0x64, 0x1, 0x32),
    entry(24200, 0x69, 0x1, 0x32),
    entry(25200, 0x6e, 0x1, 0x32),
    entry(25600, 0x70, 0x1, 0x32),
];

/// Highest encodable setting, used once the input reaches the top of range
const GAIN_CEILING: GainRegisters = GAIN_TABLE[GAIN_TABLE.len() - 1].regs;

/// Translate abstract gain into register fields.
///
/// Input is clamped to `[GAIN_MIN, GAIN_MAX - 1]`, then the first table entry
/// whose upper bound covers it wins. Inputs past the last entry saturate at
/// the highest encodable setting.
pub fn gain_to_registers(gain: u32) -> GainRegisters {
    let gain = gain.max(GAIN_MIN).min(GAIN_MAX - 1);
    for entry in GAIN_TABLE.iter() {
        if gain <= entry.upper {
            return entry.regs;
        }
    }
    GAIN_CEILING
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordinal(regs: GainRegisters) -> u32 {
        ((regs.extension as u32) << 8) | regs.coarse as u32
    }

    #[test]
    fn table_bounds_are_ascending() {
        for pair in GAIN_TABLE.windows(2) {
            assert!(pair[0].upper < pair[1].upper);
        }
    }

    #[test]
    fn below_minimum_clamps_to_unity() {
        assert_eq!(gain_to_registers(0), gain_to_registers(GAIN_MIN));
        assert_eq!(
            gain_to_registers(GAIN_MIN),
            GainRegisters {
                coarse: 0x0e,
                extension: 0x0,
                compound: 0x1f
            }
        );
    }

    #[test]
    fn exact_bound_selects_that_entry() {
        let regs = gain_to_registers(2200);
        assert_eq!(regs.coarse, 0x1c);
        assert_eq!(regs.compound, 0x2b);
        assert_eq!(gain_to_registers(2201).coarse, 0x21);
    }

    #[test]
    fn past_last_entry_saturates() {
        assert_eq!(gain_to_registers(25_601), GAIN_CEILING);
        assert_eq!(gain_to_registers(40_000), GAIN_CEILING);
    }

    #[test]
    fn top_of_range_is_clamped() {
        assert_eq!(gain_to_registers(GAIN_MAX - 1), gain_to_registers(GAIN_MAX));
        assert_eq!(gain_to_registers(u32::MAX), GAIN_CEILING);
        assert_eq!(
            GAIN_CEILING,
            GainRegisters {
                coarse: 0x70,
                extension: 0x1,
                compound: 0x32
            }
        );
    }

    #[test]
    fn encoded_gain_never_decreases() {
        let mut last = 0;
        for gain in (0..=GAIN_MAX + 100).step_by(7) {
            let current = ordinal(gain_to_registers(gain));
            assert!(current >= last, "gain {} went backwards", gain);
            last = current;
        }
    }
}

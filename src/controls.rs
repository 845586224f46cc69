/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Control surface: ranges, current values and the propagation between them

use crate::gain::{GAIN_DEFAULT, GAIN_MAX, GAIN_MIN, GAIN_STEP};
use crate::modes::Mode;
use crate::registers::{FLIP_BIT_MASK, LINK_FREQ, MIRROR_BIT_MASK, PIXEL_RATE, VTS_MAX};

pub const EXPOSURE_MIN: u32 = 1;
pub const EXPOSURE_STEP: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlId {
    Exposure,
    AnalogGain,
    HorizontalBlank,
    VerticalBlank,
    TestPattern,
    HorizontalFlip,
    VerticalFlip,
    LinkFrequency,
    PixelRate,
}

/// A control change requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Integration time in lines
    Exposure(u32),
    /// Abstract linear gain units
    AnalogGain(u32),
    /// Read-only; any write is refused
    HorizontalBlank(u32),
    /// Lines of padding beyond the active height
    VerticalBlank(u32),
    TestPattern(TestPattern),
    HorizontalFlip(bool),
    VerticalFlip(bool),
}

impl Control {
    pub fn id(&self) -> ControlId {
        match self {
            Control::Exposure(_) => ControlId::Exposure,
            Control::AnalogGain(_) => ControlId::AnalogGain,
            Control::HorizontalBlank(_) => ControlId::HorizontalBlank,
            Control::VerticalBlank(_) => ControlId::VerticalBlank,
            Control::TestPattern(_) => ControlId::TestPattern,
            Control::HorizontalFlip(_) => ControlId::HorizontalFlip,
            Control::VerticalFlip(_) => ControlId::VerticalFlip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestPattern {
    Disabled = 0,
    VerticalColorBar1 = 1,
    VerticalColorBar2 = 2,
    VerticalColorBar3 = 3,
    VerticalColorBar4 = 4,
}

impl TestPattern {
    pub const MENU: [&'static str; 5] = [
        "Disabled",
        "Vertical Color Bar Type 1",
        "Vertical Color Bar Type 2",
        "Vertical Color Bar Type 3",
        "Vertical Color Bar Type 4",
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(TestPattern::Disabled),
            1 => Some(TestPattern::VerticalColorBar1),
            2 => Some(TestPattern::VerticalColorBar2),
            3 => Some(TestPattern::VerticalColorBar3),
            4 => Some(TestPattern::VerticalColorBar4),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        Self::MENU[self as usize]
    }
}

/// Mirror (horizontal) and flip (vertical) readout state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Orientation {
    pub mirror: bool,
    pub flip: bool,
}

impl Orientation {
    pub const NORMAL: Orientation = Orientation {
        mirror: false,
        flip: false,
    };

    /// Combined two-bit code: bit0 mirror, bit1 flip
    pub const fn code(self) -> u8 {
        let mut code = 0;
        if self.mirror {
            code |= MIRROR_BIT_MASK;
        }
        if self.flip {
            code |= FLIP_BIT_MASK;
        }
        code
    }

    pub const fn from_code(code: u8) -> Self {
        Orientation {
            mirror: code & MIRROR_BIT_MASK != 0,
            flip: code & FLIP_BIT_MASK != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
    pub default: u32,
}

impl ControlRange {
    pub const fn new(min: u32, max: u32, step: u32, default: u32) -> Self {
        Self {
            min,
            max,
            step,
            default,
        }
    }

    pub const fn fixed(value: u32) -> Self {
        Self::new(value, value, 1, value)
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }

    fn clamp(&self, value: u32) -> u32 {
        value.max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ranged {
    range: ControlRange,
    value: u32,
}

impl Ranged {
    const fn new(range: ControlRange) -> Self {
        Self {
            range,
            value: range.default,
        }
    }

    /// Replace the range, pulling the current value inside it.
    /// Returns true when the value had to move.
    fn modify_range(&mut self, range: ControlRange) -> bool {
        self.range = range;
        let clamped = range.clamp(self.value);
        let changed = clamped != self.value;
        self.value = clamped;
        changed
    }
}

/// Current value and valid range of every control
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSet {
    exposure: Ranged,
    analog_gain: Ranged,
    hblank: Ranged,
    vblank: Ranged,
    test_pattern: TestPattern,
    orientation: Orientation,
}

impl ControlSet {
    pub fn new(mode: &Mode, orientation: Orientation) -> Self {
        Self {
            exposure: Ranged::new(ControlRange::new(
                EXPOSURE_MIN,
                mode.vts_def - 1,
                EXPOSURE_STEP,
                mode.exp_def,
            )),
            analog_gain: Ranged::new(ControlRange::new(
                GAIN_MIN,
                GAIN_MAX,
                GAIN_STEP,
                GAIN_DEFAULT,
            )),
            hblank: Ranged::new(ControlRange::fixed(mode.hblank())),
            vblank: Ranged::new(vblank_range(mode)),
            test_pattern: TestPattern::Disabled,
            orientation,
        }
    }

    pub fn range(&self, id: ControlId) -> ControlRange {
        match id {
            ControlId::Exposure => self.exposure.range,
            ControlId::AnalogGain => self.analog_gain.range,
            ControlId::HorizontalBlank => self.hblank.range,
            ControlId::VerticalBlank => self.vblank.range,
            ControlId::TestPattern => ControlRange::new(
                0,
                TestPattern::MENU.len() as u32 - 1,
                1,
                TestPattern::Disabled as u32,
            ),
            ControlId::HorizontalFlip | ControlId::VerticalFlip => {
                ControlRange::new(0, 1, 1, 0)
            }
            ControlId::LinkFrequency => ControlRange::fixed(LINK_FREQ),
            ControlId::PixelRate => ControlRange::new(0, PIXEL_RATE, 1, PIXEL_RATE),
        }
    }

    pub fn value(&self, id: ControlId) -> u32 {
        match id {
            ControlId::Exposure => self.exposure.value,
            ControlId::AnalogGain => self.analog_gain.value,
            ControlId::HorizontalBlank => self.hblank.value,
            ControlId::VerticalBlank => self.vblank.value,
            ControlId::TestPattern => self.test_pattern as u32,
            ControlId::HorizontalFlip => self.orientation.mirror as u32,
            ControlId::VerticalFlip => self.orientation.flip as u32,
            ControlId::LinkFrequency => LINK_FREQ,
            ControlId::PixelRate => PIXEL_RATE,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn test_pattern(&self) -> TestPattern {
        self.test_pattern
    }

    /// Whether the host may set this value right now
    pub fn accepts(&self, control: &Control) -> bool {
        match *control {
            Control::Exposure(v) => self.exposure.range.contains(v),
            Control::AnalogGain(v) => self.analog_gain.range.contains(v),
            Control::VerticalBlank(v) => self.vblank.range.contains(v),
            Control::HorizontalBlank(_) => false,
            Control::TestPattern(_)
            | Control::HorizontalFlip(_)
            | Control::VerticalFlip(_) => true,
        }
    }

    /// Record an accepted value. A vertical blank change narrows or widens
    /// the exposure limit to `height + vblank - 1` before returning; the
    /// result is true when that pulled the stored exposure down.
    pub fn store(&mut self, control: Control, mode: &Mode) -> bool {
        match control {
            Control::Exposure(v) => self.exposure.value = v,
            Control::AnalogGain(v) => self.analog_gain.value = v,
            Control::HorizontalBlank(_) => {}
            Control::VerticalBlank(v) => {
                self.vblank.value = v;
                return self.propagate_vblank(mode);
            }
            Control::TestPattern(pattern) => self.test_pattern = pattern,
            Control::HorizontalFlip(on) => self.orientation.mirror = on,
            Control::VerticalFlip(on) => self.orientation.flip = on,
        }
        false
    }

    /// Republish the mode-dependent ranges after a mode change.
    /// Returns true when the stored exposure had to move.
    pub fn apply_mode(&mut self, mode: &Mode) -> bool {
        self.hblank.modify_range(ControlRange::fixed(mode.hblank()));
        self.vblank.modify_range(vblank_range(mode));
        self.propagate_vblank(mode)
    }

    fn propagate_vblank(&mut self, mode: &Mode) -> bool {
        let max = mode.height + self.vblank.value - 1;
        let range = ControlRange {
            max,
            ..self.exposure.range
        };
        self.exposure.modify_range(range)
    }

    /// Every value that has to reach the device after a register reload
    pub fn snapshot(&self) -> [Control; 6] {
        [
            Control::Exposure(self.exposure.value),
            Control::AnalogGain(self.analog_gain.value),
            Control::VerticalBlank(self.vblank.value),
            Control::TestPattern(self.test_pattern),
            Control::HorizontalFlip(self.orientation.mirror),
            Control::VerticalFlip(self.orientation.flip),
        ]
    }
}

fn vblank_range(mode: &Mode) -> ControlRange {
    let vblank_def = mode.vblank_def();
    ControlRange::new(vblank_def, VTS_MAX - mode.height, 1, vblank_def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::SUPPORTED_MODES;

    #[test]
    fn initial_ranges_follow_default_mode() {
        let mode = &SUPPORTED_MODES[0];
        let set = ControlSet::new(mode, Orientation::NORMAL);
        assert_eq!(
            set.range(ControlId::Exposure),
            ControlRange::new(1, 0x04b0 - 1, 1, 0x01f4)
        );
        assert_eq!(set.range(ControlId::HorizontalBlank), ControlRange::fixed(0x0a68 - 1280));
        assert_eq!(
            set.range(ControlId::VerticalBlank),
            ControlRange::new(120, 0xffff - 1080, 1, 120)
        );
        assert_eq!(set.value(ControlId::AnalogGain), GAIN_DEFAULT);
    }

    #[test]
    fn vblank_moves_exposure_limit() {
        let mode = &SUPPORTED_MODES[0];
        let mut set = ControlSet::new(mode, Orientation::NORMAL);
        assert!(!set.store(Control::VerticalBlank(400), mode));
        assert_eq!(set.range(ControlId::Exposure).max, 1080 + 400 - 1);
        assert!(set.accepts(&Control::Exposure(1479)));
        assert!(!set.accepts(&Control::Exposure(1480)));

        set.store(Control::Exposure(1400), mode);
        assert!(set.store(Control::VerticalBlank(120), mode));
        assert_eq!(set.value(ControlId::Exposure), 1080 + 120 - 1);
    }

    #[test]
    fn read_only_and_out_of_range_are_refused() {
        let mode = &SUPPORTED_MODES[0];
        let set = ControlSet::new(mode, Orientation::NORMAL);
        assert!(!set.accepts(&Control::HorizontalBlank(1400)));
        assert!(!set.accepts(&Control::Exposure(0)));
        assert!(!set.accepts(&Control::AnalogGain(GAIN_MAX + 1)));
        assert!(!set.accepts(&Control::VerticalBlank(119)));
    }

    #[test]
    fn orientation_code_round_trips_bits() {
        for code in 0..4u8 {
            assert_eq!(Orientation::from_code(code).code(), code);
        }
        assert_eq!(
            Orientation::from_code(FLIP_BIT_MASK),
            Orientation {
                mirror: false,
                flip: true
            }
        );
    }

    #[test]
    fn test_pattern_menu_has_five_entries() {
        assert_eq!(TestPattern::from_index(4), Some(TestPattern::VerticalColorBar4));
        assert_eq!(TestPattern::from_index(5), None);
        assert_eq!(TestPattern::VerticalColorBar2.name(), "Vertical Color Bar Type 2");
    }

    #[test]
    fn link_controls_are_fixed() {
        let set = ControlSet::new(&SUPPORTED_MODES[2], Orientation::NORMAL);
        assert_eq!(set.range(ControlId::LinkFrequency), ControlRange::fixed(576_000_000));
        assert_eq!(set.value(ControlId::PixelRate), 192_000_000);
        assert_eq!(set.value(ControlId::Exposure), 0x52);
        assert_eq!(Control::VerticalFlip(true).id(), ControlId::VerticalFlip);
    }
}

/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Platform resources around the sensor: reference clock, supply rails,
//! pin-mux state and the runtime power reference.

use embedded_hal::digital::v2::OutputPin;

/// A platform resource that could not be brought up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resource {
    Clock,
    Supplies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    Default,
    Sleep,
}

/// Clock, regulator and pin-mux services supplied by the board
pub trait Platform {
    fn set_clock_rate(&mut self, hz: u32) -> Result<(), Resource>;
    fn clock_rate(&self) -> u32;
    fn enable_clock(&mut self) -> Result<(), Resource>;
    fn disable_clock(&mut self);

    /// Bring up avdd, dovdd and dvdd
    fn enable_supplies(&mut self) -> Result<(), Resource>;
    fn disable_supplies(&mut self);

    fn select_pin_state(&mut self, _state: PinState) -> Result<(), Resource> {
        Ok(())
    }

    /// True when the earlier boot stage reported that it did not leave the
    /// sensor configured, so a fast-boot attach must fall back to a full
    /// power-up before streaming.
    fn fast_boot_handoff_failed(&self) -> bool {
        false
    }
}

/// Reference-counted runtime power handle.
///
/// The count lives with the host; the sensor only learns when a reference
/// transition requires it to power up or down.
pub trait PowerReference {
    /// Take a reference. Returns true when the count left zero and the
    /// device must be powered up.
    fn get(&mut self) -> bool;

    /// Take a reference only when one is already held
    fn get_if_in_use(&mut self) -> bool;

    /// Drop a reference. Returns true when the count reached zero and the
    /// device should be powered down.
    fn put(&mut self) -> bool;

    /// Drop a reference without powering down
    fn put_noidle(&mut self);
}

/// Plain usage counter for hosts without their own power-management core
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UsageCount {
    count: u32,
}

impl UsageCount {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl PowerReference for UsageCount {
    fn get(&mut self) -> bool {
        self.count += 1;
        self.count == 1
    }

    fn get_if_in_use(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count += 1;
        true
    }

    fn put(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count -= 1;
        self.count == 0
    }

    fn put_noidle(&mut self) {
        self.count = self.count.saturating_sub(1);
    }
}

/// Optional reset and power-down lines.
///
/// Levels are logical: `assert`ing reset drives it low, releasing drives it
/// high; the power-down line is driven high to let the sensor run.
pub struct ControlPins<RST, PWDN> {
    reset: Option<RST>,
    powerdown: Option<PWDN>,
}

impl<RST, PWDN> ControlPins<RST, PWDN>
where
    RST: OutputPin,
    PWDN: OutputPin,
{
    pub fn new(reset: Option<RST>, powerdown: Option<PWDN>) -> Self {
        Self { reset, powerdown }
    }

    pub fn has_reset(&self) -> bool {
        self.reset.is_some()
    }

    // pin errors are ignored, the sequence carries on regardless
    pub fn assert_reset(&mut self) {
        if let Some(pin) = self.reset.as_mut() {
            pin.set_low().ok();
        }
    }

    pub fn release_reset(&mut self) {
        if let Some(pin) = self.reset.as_mut() {
            pin.set_high().ok();
        }
    }

    pub fn power_down(&mut self) {
        if let Some(pin) = self.powerdown.as_mut() {
            pin.set_low().ok();
        }
    }

    pub fn power_up(&mut self) {
        if let Some(pin) = self.powerdown.as_mut() {
            pin.set_high().ok();
        }
    }
}

/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

use crate::controls::Orientation;
use crate::registers::XVCLK_FREQ;
use core::fmt;

pub const SENSOR_NAME: &str = "mia1321";

/// Default two-wire address of the sensor
pub const DEFAULT_I2C_ADDRESS: u8 = 0x36;

/// Which side of the device the camera module faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Facing {
    Back,
    Front,
}

/// Board-level description of the camera module and its boot environment
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub address: u8,
    /// Rate requested for the xvclk reference clock
    pub xvclk_hz: u32,
    /// An earlier boot stage already powered and programmed the sensor
    pub fast_boot: bool,
    pub module_index: u32,
    pub facing: Facing,
    pub module_name: &'static str,
    pub lens_name: &'static str,
    /// Orientation controls start out with this value
    pub orientation: Orientation,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            xvclk_hz: XVCLK_FREQ,
            fast_boot: false,
            module_index: 0,
            facing: Facing::Back,
            module_name: "",
            lens_name: "",
            orientation: Orientation::NORMAL,
        }
    }

    pub const fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub const fn with_xvclk_hz(mut self, hz: u32) -> Self {
        self.xvclk_hz = hz;
        self
    }

    pub const fn with_fast_boot(mut self, fast_boot: bool) -> Self {
        self.fast_boot = fast_boot;
        self
    }

    pub const fn with_module(
        mut self,
        index: u32,
        facing: Facing,
        module_name: &'static str,
        lens_name: &'static str,
    ) -> Self {
        self.module_index = index;
        self.facing = facing;
        self.module_name = module_name;
        self.lens_name = lens_name;
        self
    }

    pub const fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn module_info(&self) -> ModuleInfo {
        ModuleInfo {
            sensor: SENSOR_NAME,
            module: self.module_name,
            lens: self.lens_name,
        }
    }

    /// Subdevice name in the `m<index>_<b|f>_<sensor> <device>` convention
    pub fn subdev_name<'a>(&'a self, dev_name: &'a str) -> SubdevName<'a> {
        SubdevName {
            config: self,
            dev_name,
        }
    }
}

/// Identification record returned to user space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleInfo {
    pub sensor: &'static str,
    pub module: &'static str,
    pub lens: &'static str,
}

pub struct SubdevName<'a> {
    config: &'a Config,
    dev_name: &'a str,
}

impl fmt::Display for SubdevName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let facing = match self.config.facing {
            Facing::Back => 'b',
            Facing::Front => 'f',
        };
        write!(
            f,
            "m{:02}_{}_{} {}",
            self.config.module_index, facing, SENSOR_NAME, self.dev_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdev_name_follows_module_convention() {
        let config = Config::new().with_module(1, Facing::Front, "CMK-OT2115", "M12");
        assert_eq!(
            config.subdev_name("4-0036").to_string(),
            "m01_f_mia1321 4-0036"
        );
        let config = Config::new().with_module(12, Facing::Back, "CMK", "lens");
        assert_eq!(config.subdev_name("x").to_string(), "m12_b_mia1321 x");
    }

    #[test]
    fn module_info_reports_fixed_sensor_name() {
        let info = Config::new()
            .with_module(0, Facing::Back, "RK-CAM", "default-lens")
            .module_info();
        assert_eq!(
            info,
            ModuleInfo {
                sensor: "mia1321",
                module: "RK-CAM",
                lens: "default-lens"
            }
        );
    }
}

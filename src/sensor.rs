/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

use crate::config::Config;
use crate::controls::{Control, ControlId, ControlRange, ControlSet, Orientation};
use crate::gain::gain_to_registers;
use crate::modes::{
    apply_register_program, find_best_fit, find_hdr_mode, BusFormat, Fraction,
    HdrMode, Mode, GLOBAL_REGS, SUPPORTED_MODES,
};
use crate::platform::{ControlPins, PinState, Platform, PowerReference};
use crate::registers::{GeneralRegisters, CHIP_ID, LANES, MODE_STREAMING, MODE_SW_STANDBY};
use crate::subdev::{
    Command, CommandResponse, EspMode, FormatTarget, FrameFormat, HdrConfig, MbusConfig,
};
use crate::transport::RegisterBus;
use crate::Error;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use embedded_hal::digital::v2::OutputPin;
use spin::Mutex;

/// Clock cycles the sensor needs after power-up before its first bus access
const READY_CYCLES: u32 = 8192;

/// Where the sensor sits in its power/stream life cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorState {
    /// Reference clock stopped, rails down (or never brought up by us)
    Off,
    /// Powered and idle in software standby, no mode program loaded yet
    PoweredDown,
    /// Mode program loaded, sensor in software standby
    Configured(&'static Mode),
    Streaming(&'static Mode),
}

/// Mutable per-device state, only ever touched under the handle's lock
#[derive(Debug)]
struct Session {
    mode: &'static Mode,
    /// Host-requested power (core s_power)
    power_on: bool,
    streaming: bool,
    /// Power sequence has run and not been undone
    active: bool,
    /// The current mode's register program has been replayed
    programmed: bool,
    cur_fps: Fraction,
    cur_vts: u32,
    /// Last orientation written to the device
    orientation: Orientation,
    fast_boot: bool,
    first_stream_off: bool,
    try_format: FrameFormat,
}

pub(crate) struct Sensor<I2C, D, P, PM, RST, PWDN> {
    bus: RegisterBus<I2C>,
    delay: D,
    platform: P,
    pm: PM,
    pins: ControlPins<RST, PWDN>,
    config: Config,
    session: Session,
    controls: ControlSet,
}

/// Driver handle for one MIA1321.
///
/// All state lives behind a single lock: format negotiation, control
/// updates and stream transitions from different callers are serialized
/// and each runs to completion, bus I/O included.
pub struct Mia1321<I2C, D, P, PM, RST, PWDN> {
    pub(crate) inner: Mutex<Sensor<I2C, D, P, PM, RST, PWDN>>,
}

/// Delay in microseconds covering `cycles` of a `hz` clock, rounded up
fn cal_delay(cycles: u32, hz: u32) -> u32 {
    let cycles_per_us = (hz / 1_000_000).max(1);
    (cycles + cycles_per_us - 1) / cycles_per_us
}

impl<I2C, CommE, D, P, PM, RST, PWDN> Sensor<I2C, D, P, PM, RST, PWDN>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    P: Platform,
    PM: PowerReference,
    RST: OutputPin,
    PWDN: OutputPin,
{
    pub(crate) fn state(&self) -> SensorState {
        let session = &self.session;
        if session.streaming {
            SensorState::Streaming(session.mode)
        } else if !session.active {
            SensorState::Off
        } else if session.programmed {
            SensorState::Configured(session.mode)
        } else {
            SensorState::PoweredDown
        }
    }

    pub(crate) fn power_on(&mut self) -> Result<(), Error<CommE>> {
        let hz = self.config.xvclk_hz;
        if self.platform.select_pin_state(PinState::Default).is_err() {
            trace!("mia1321 could not set pins");
        }
        if self.platform.set_clock_rate(hz).is_err() {
            trace!("mia1321 failed to set xvclk rate {}", hz);
        }
        if self.platform.clock_rate() != hz {
            trace!("mia1321 xvclk mismatched, modes are based on {}", hz);
        }
        self.platform.enable_clock().map_err(|res| {
            trace!("mia1321 failed to enable xvclk");
            Error::ResourceUnavailable(res)
        })?;
        if !self.session.fast_boot {
            self.power_up_rails()?;
        }
        self.session.active = true;
        Ok(())
    }

    /// Reset, supplies and power-down line, with xvclk already running.
    /// On failure the clock is stopped again.
    fn power_up_rails(&mut self) -> Result<(), Error<CommE>> {
        self.pins.assert_reset();
        if let Err(res) = self.platform.enable_supplies() {
            trace!("mia1321 failed to enable regulators");
            self.platform.disable_clock();
            return Err(Error::ResourceUnavailable(res));
        }
        self.pins.release_reset();
        self.delay.delay_us(500);
        self.pins.power_up();
        let settle_us = if self.pins.has_reset() { 6000 } else { 12000 };
        self.delay.delay_us(settle_us);
        self.delay.delay_us(cal_delay(READY_CYCLES, self.config.xvclk_hz));
        Ok(())
    }

    /// The boot stage left the sensor unconfigured: bring the rails up
    /// under the clock enabled at attach. Returns true when the attach-time
    /// reference is still held and must be dropped once the caller holds
    /// its own.
    fn take_over_from_boot_stage(&mut self) -> Result<bool, Error<CommE>> {
        trace!("mia1321 boot stage hand-off failed, powering up");
        self.session.fast_boot = false;
        if !self.session.active {
            return Ok(false);
        }
        if let Err(e) = self.power_up_rails() {
            self.session.active = false;
            self.pm.put_noidle();
            return Err(e);
        }
        Ok(true)
    }

    pub(crate) fn power_off(&mut self) {
        self.platform.disable_clock();
        self.session.active = false;
        self.session.programmed = false;
        if self.session.fast_boot {
            if !self.session.first_stream_off {
                // the boot stage powered the part; nothing of ours to undo yet
                return;
            }
            self.session.fast_boot = false;
            self.session.first_stream_off = false;
        }

        self.pins.power_down();
        self.pins.assert_reset();
        if self.platform.select_pin_state(PinState::Sleep).is_err() {
            trace!("mia1321 could not set sleep pins");
        }
        self.platform.disable_supplies();
    }

    fn acquire_power(&mut self) -> Result<(), Error<CommE>> {
        if self.pm.get() {
            if let Err(e) = self.power_on() {
                self.pm.put_noidle();
                return Err(e);
            }
        }
        Ok(())
    }

    fn release_power(&mut self) {
        if self.pm.put() {
            self.power_off();
        }
    }

    fn check_sensor_id(&mut self) -> Result<(), Error<CommE>> {
        if self.session.fast_boot {
            trace!("mia1321 fast boot, skip sensor id check");
            return Ok(());
        }
        let id = self.bus.read_reg_u16(GeneralRegisters::ChipId.addr())?;
        if id != CHIP_ID {
            trace!("mia1321 unexpected sensor id {:04x}", id);
            return Err(Error::WrongChipId(id));
        }
        trace!("mia1321 detected sensor id {:04x}", id);
        Ok(())
    }

    pub(crate) fn set_power(&mut self, on: bool) -> Result<(), Error<CommE>> {
        if self.session.power_on == on {
            return Ok(());
        }
        if on {
            self.acquire_power()?;
            if !self.session.fast_boot {
                let result =
                    apply_register_program(GLOBAL_REGS, &mut self.bus, &mut self.delay);
                if let Err(e) = result {
                    trace!("mia1321 could not set init registers");
                    self.pm.put_noidle();
                    return Err(e);
                }
            }
            self.session.power_on = true;
        } else {
            self.release_power();
            self.session.power_on = false;
        }
        Ok(())
    }

    pub(crate) fn set_stream(&mut self, on: bool) -> Result<(), Error<CommE>> {
        if self.session.streaming == on {
            return Ok(());
        }
        if on {
            let mut attach_ref = false;
            if self.session.fast_boot && self.platform.fast_boot_handoff_failed() {
                attach_ref = self.take_over_from_boot_stage()?;
            }
            self.acquire_power()?;
            if attach_ref {
                self.pm.put_noidle();
            }
            if let Err(e) = self.start_stream() {
                trace!("mia1321 start stream failed while write regs");
                self.release_power();
                return Err(e);
            }
            self.session.streaming = true;
            Ok(())
        } else {
            let result = self.stop_stream();
            self.release_power();
            self.session.streaming = false;
            result
        }
    }

    fn start_stream(&mut self) -> Result<(), Error<CommE>> {
        if !self.session.fast_boot {
            apply_register_program(
                self.session.mode.reg_list,
                &mut self.bus,
                &mut self.delay,
            )?;
            self.session.programmed = true;
            // controls may have been set while the register table was not loaded
            let snapshot = self.controls.snapshot();
            for control in snapshot.iter() {
                self.write_control(*control)?;
            }
        }
        self.bus
            .write_reg_u8(GeneralRegisters::CtrlMode.addr(), MODE_STREAMING)
    }

    fn stop_stream(&mut self) -> Result<(), Error<CommE>> {
        if self.session.fast_boot {
            self.session.first_stream_off = true;
            self.release_power();
        }
        self.bus
            .write_reg_u8(GeneralRegisters::CtrlMode.addr(), MODE_SW_STANDBY)
    }

    fn quick_stream(&mut self, on: bool) -> Result<(), Error<CommE>> {
        let val = if on { MODE_STREAMING } else { MODE_SW_STANDBY };
        self.bus.write_reg_u8(GeneralRegisters::CtrlMode.addr(), val)
    }

    pub(crate) fn select_mode(&mut self, mode: &'static Mode) {
        trace!("mia1321 select mode {}x{}", mode.width, mode.height);
        if !core::ptr::eq(self.session.mode, mode) {
            self.session.programmed = false;
        }
        self.session.mode = mode;
        self.controls.apply_mode(mode);
        self.session.cur_fps = mode.max_fps;
        self.session.cur_vts = mode.vts_def;
    }

    pub(crate) fn set_format(
        &mut self,
        pad: u32,
        target: FormatTarget,
        width: u32,
        height: u32,
    ) -> Result<FrameFormat, Error<CommE>> {
        let mode = find_best_fit(width, height);
        match target {
            FormatTarget::Try => {
                self.session.try_format = FrameFormat::for_mode(mode, pad);
                Ok(self.session.try_format)
            }
            FormatTarget::Active => {
                if self.session.streaming && !core::ptr::eq(self.session.mode, mode) {
                    return Err(Error::Busy);
                }
                self.select_mode(mode);
                Ok(FrameFormat::for_mode(mode, pad))
            }
        }
    }

    pub(crate) fn get_format(&self, pad: u32, target: FormatTarget) -> FrameFormat {
        match target {
            FormatTarget::Try => self.session.try_format,
            FormatTarget::Active => FrameFormat::for_mode(self.session.mode, pad),
        }
    }

    pub(crate) fn enum_mbus_code(&self, index: u32) -> Option<BusFormat> {
        if index != 0 {
            return None;
        }
        Some(self.session.mode.bus_fmt)
    }

    pub(crate) fn mbus_config(&self) -> MbusConfig {
        MbusConfig::csi2(LANES, self.session.mode.hdr_mode)
    }

    pub(crate) fn frame_interval(&self) -> Fraction {
        if self.session.streaming {
            self.session.cur_fps
        } else {
            self.session.mode.max_fps
        }
    }

    pub(crate) fn apply_control(&mut self, control: Control) -> Result<(), Error<CommE>> {
        if !self.controls.accepts(&control) {
            return Err(Error::InvalidArgument);
        }
        let previous = self.controls.clone();
        let exposure_moved = self.controls.store(control, self.session.mode);

        if !self.pm.get_if_in_use() {
            // applied from the stored value at the next stream start
            return Ok(());
        }
        let mut result = self.write_control(control);
        if exposure_moved {
            let exposure = self.controls.value(ControlId::Exposure);
            result = result.and(self.write_control(Control::Exposure(exposure)));
        }
        self.release_power();

        if result.is_err() {
            self.controls = previous;
        }
        result
    }

    /// Push one control value to the device. Every register of the control
    /// is attempted; the first failure is reported.
    fn write_control(&mut self, control: Control) -> Result<(), Error<CommE>> {
        let linear = self.session.mode.hdr_mode == HdrMode::NoHdr;
        match control {
            Control::Exposure(lines) => {
                trace!("mia1321 set exposure 0x{:x}", lines);
                if !linear {
                    return Ok(());
                }
                let bytes = lines.to_be_bytes();
                let mut result = Ok(());
                result = result.and(
                    self.bus.write_reg_u8(GeneralRegisters::ExposureH.addr(), bytes[1]),
                );
                result = result.and(
                    self.bus.write_reg_u8(GeneralRegisters::ExposureM.addr(), bytes[2]),
                );
                result.and(self.bus.write_reg_u8(GeneralRegisters::ExposureL.addr(), bytes[3]))
            }
            Control::AnalogGain(gain) => {
                trace!("mia1321 set gain {}", gain);
                if !linear {
                    return Ok(());
                }
                let regs = gain_to_registers(gain);
                let mut result = Ok(());
                result = result.and(
                    self.bus.write_reg_u8(GeneralRegisters::AnaGainH.addr(), regs.compound),
                );
                result = result.and(
                    self.bus.write_reg_u8(GeneralRegisters::AnaGainM.addr(), regs.extension),
                );
                result.and(self.bus.write_reg_u8(GeneralRegisters::AnaGainL.addr(), regs.coarse))
            }
            Control::VerticalBlank(vblank) => {
                // frame length stays at the mode default; only the exposure
                // limit follows vblank
                trace!("mia1321 set vblank 0x{:x}", vblank);
                self.session.cur_vts = self.session.mode.vts_def;
                Ok(())
            }
            // no register mapping for the pattern generator
            Control::TestPattern(_) => Ok(()),
            Control::HorizontalFlip(on) => {
                let mut orientation = self.read_orientation()?;
                orientation.mirror = on;
                self.set_orientation(orientation.code())
            }
            Control::VerticalFlip(on) => {
                let mut orientation = self.read_orientation()?;
                orientation.flip = on;
                self.set_orientation(orientation.code())
            }
            Control::HorizontalBlank(_) => Ok(()),
        }
    }

    /// Current device orientation, each axis read from its own register
    fn read_orientation(&mut self) -> Result<Orientation, Error<CommE>> {
        let mirror = self.bus.read_reg_u8(GeneralRegisters::MirrorEnable.addr())?;
        let flip = self.bus.read_reg_u8(GeneralRegisters::FlipEnable.addr())?;
        Ok(Orientation {
            mirror: mirror & 0x01 != 0,
            flip: flip & 0x01 != 0,
        })
    }

    /// Write both orientation registers from the combined code
    /// (bit0 mirror, bit1 flip)
    fn set_orientation(&mut self, code: u8) -> Result<(), Error<CommE>> {
        let orientation = Orientation::from_code(code);
        let mut result = Ok(());
        result = result.and(
            self.bus.write_reg_u8(GeneralRegisters::FlipEnable.addr(), orientation.flip as u8),
        );
        result = result.and(
            self.bus.write_reg_u8(GeneralRegisters::MirrorEnable.addr(), orientation.mirror as u8),
        );
        if result.is_ok() {
            self.session.orientation = orientation;
        }
        result
    }

    pub(crate) fn command(&mut self, command: Command) -> Result<CommandResponse, Error<CommE>> {
        match command {
            Command::GetModuleInfo => {
                Ok(CommandResponse::ModuleInfo(self.config.module_info()))
            }
            Command::GetHdrConfig => Ok(CommandResponse::HdrConfig(HdrConfig {
                esp_mode: EspMode::NormalVc,
                hdr_mode: self.session.mode.hdr_mode,
            })),
            Command::SetHdrConfig(hdr_mode) => {
                let current = self.session.mode;
                let mode = find_hdr_mode(current.width, current.height, hdr_mode)
                    .ok_or_else(|| {
                        trace!(
                            "mia1321 no hdr mode {:?} for {}x{}",
                            hdr_mode,
                            current.width,
                            current.height
                        );
                        Error::UnsupportedMode
                    })?;
                if self.session.streaming && !core::ptr::eq(current, mode) {
                    return Err(Error::Busy);
                }
                self.select_mode(mode);
                Ok(CommandResponse::Done)
            }
            // every catalog mode is linear
            Command::SetHdrAeExposure(_) => Ok(CommandResponse::Done),
            Command::SetQuickStream(on) => {
                self.quick_stream(on)?;
                Ok(CommandResponse::Done)
            }
        }
    }
}

impl<I2C, CommE, D, P, PM, RST, PWDN> Mia1321<I2C, D, P, PM, RST, PWDN>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    P: Platform,
    PM: PowerReference,
    RST: OutputPin,
    PWDN: OutputPin,
{
    /// Bring up the sensor and verify its identity.
    ///
    /// Without fast boot the sensor is powered down again once identified,
    /// to be woken by the first power reference. With fast boot the boot
    /// stage's configuration is left untouched and a power reference is held
    /// until the first stream-off.
    pub fn attach(
        i2c: I2C,
        delay: D,
        platform: P,
        pm: PM,
        pins: ControlPins<RST, PWDN>,
        config: Config,
    ) -> Result<Self, Error<CommE>> {
        let mode = &SUPPORTED_MODES[0];
        let mut sensor = Sensor {
            bus: RegisterBus::new(i2c, config.address),
            delay,
            platform,
            pm,
            pins,
            session: Session {
                mode,
                power_on: false,
                streaming: false,
                active: false,
                programmed: false,
                cur_fps: mode.max_fps,
                cur_vts: mode.vts_def,
                orientation: config.orientation,
                fast_boot: config.fast_boot,
                first_stream_off: false,
                try_format: FrameFormat::for_mode(mode, 0),
            },
            controls: ControlSet::new(mode, config.orientation),
            config,
        };

        sensor.power_on()?;
        if let Err(e) = sensor.check_sensor_id() {
            sensor.power_off();
            return Err(e);
        }
        trace!("mia1321 attached, fast boot {}", sensor.session.fast_boot);
        if sensor.session.fast_boot {
            sensor.pm.get();
        } else {
            sensor.power_off();
        }

        Ok(Self {
            inner: Mutex::new(sensor),
        })
    }

    /// Power down if still active and hand back the bus
    pub fn detach(self) -> I2C {
        let mut sensor = self.inner.into_inner();
        if sensor.session.active {
            sensor.power_off();
        }
        sensor.bus.release()
    }

    pub fn state(&self) -> SensorState {
        self.inner.lock().state()
    }

    pub fn is_fast_boot(&self) -> bool {
        self.inner.lock().session.fast_boot
    }

    pub fn current_mode(&self) -> &'static Mode {
        self.inner.lock().session.mode
    }

    /// Frame length the session currently programs, in lines
    pub fn current_vts(&self) -> u32 {
        self.inner.lock().session.cur_vts
    }

    /// Orientation last written to the device
    pub fn orientation(&self) -> Orientation {
        self.inner.lock().session.orientation
    }

    /// Run the power-up sequence; the runtime resume path
    pub fn power_on(&self) -> Result<(), Error<CommE>> {
        self.inner.lock().power_on()
    }

    /// Run the power-down sequence; the runtime suspend path
    pub fn power_off(&self) {
        self.inner.lock().power_off()
    }

    /// Select the best-fitting mode for the requested size
    pub fn set_mode(&self, width: u32, height: u32) -> Result<&'static Mode, Error<CommE>> {
        let mut sensor = self.inner.lock();
        sensor.set_format(0, FormatTarget::Active, width, height)?;
        Ok(sensor.session.mode)
    }

    pub fn apply_control(&self, control: Control) -> Result<(), Error<CommE>> {
        self.inner.lock().apply_control(control)
    }

    pub fn control_value(&self, id: ControlId) -> u32 {
        self.inner.lock().controls.value(id)
    }

    pub fn control_range(&self, id: ControlId) -> ControlRange {
        self.inner.lock().controls.range(id)
    }

    /// Reset the try format to the default mode, as on a fresh file handle
    pub fn open(&self) {
        self.inner.lock().session.try_format = FrameFormat::for_mode(&SUPPORTED_MODES[0], 0);
    }
}

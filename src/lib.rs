//! PCA9685 16-channel, 12-bit PWM Fm+ I2C-bus controller
//!
//! Every output is described by a pair of 12-bit ticks inside a 4096 tick
//! period: the output goes active at the start tick and inactive at the stop
//! tick. On top of the raw timing registers the driver offers duty cycle,
//! perceptually linear LED brightness and servo angle setters.
//!
//! The [`demo`] module sequences these calls into the RGB LED / servo
//! demonstration run by the `pwm_block` binary.

#![no_std]
#![allow(non_upper_case_globals)]

extern crate bitflags;
extern crate embedded_hal as hal;

use core::convert::TryFrom;
use core::fmt;

use bitflags::bitflags;
use hal::blocking::delay::DelayUs;
use hal::blocking::i2c;
use log::{debug, trace};

pub mod demo;
pub mod led;
pub mod servo;

pub use servo::ServoCalibration;

/// Ticks in one PWM period
pub const PERIOD_TICKS: u16 = 4096;

/// Largest start/stop tick
pub const MAX_TICK: u16 = PERIOD_TICKS - 1;

/// Internal oscillator frequency
pub const OSC_CLOCK_HZ: u32 = 25_000_000;

/// Smallest prescaler value the chip accepts
pub const PRESCALE_MIN: u8 = 3;

/// Prescaler used in LED mode, ~407 Hz
pub const LED_PRESCALE: u8 = prescale_for(400);

/// Prescaler used in servo mode, ~50 Hz
pub const SERVO_PRESCALE: u8 = prescale_for(50);

/// Prescaler value giving an output frequency closest to `freq_hz`.
///
/// Clamped to the range the chip accepts (3..=255).
pub const fn prescale_for(freq_hz: u32) -> u8 {
    if freq_hz == 0 {
        return u8::MAX;
    }
    let div = 4096 * freq_hz as u64;
    let rounded = (OSC_CLOCK_HZ as u64 + div / 2) / div;
    if rounded <= PRESCALE_MIN as u64 + 1 {
        PRESCALE_MIN
    } else if rounded > u8::MAX as u64 + 1 {
        u8::MAX
    } else {
        (rounded - 1) as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Address {
    /// All address pins low, 0x40
    Default,
    /// Address set through the A0-A5 pins
    Pins {
        a0: bool,
        a1: bool,
        a2: bool,
        a3: bool,
        a4: bool,
        a5: bool,
    },
    /// Custom address determined programmatically
    Custom(u8),
}

impl Default for Address {
    fn default() -> Self {
        Address::Default
    }
}

impl Address {
    pub fn address(self) -> u8 {
        match self {
            Address::Default => 0x40u8,
            Address::Pins {
                a0,
                a1,
                a2,
                a3,
                a4,
                a5,
            } => {
                0x40 | (a0 as u8)
                    | (a1 as u8) << 1
                    | (a2 as u8) << 2
                    | (a3 as u8) << 3
                    | (a4 as u8) << 4
                    | (a5 as u8) << 5
            }
            Address::Custom(addr) => addr,
        }
    }
}

bitflags! {
    pub struct Mode1: u8 {
        const Restart   = 0b1000_0000;
        const ExtClk    = 0b0100_0000;
        const AutoInc   = 0b0010_0000;
        const Sleep     = 0b0001_0000;
        const Sub1      = 0b0000_1000;
        const Sub2      = 0b0000_0100;
        const Sub3      = 0b0000_0010;
        const AllCall   = 0b0000_0001;
    }
}

bitflags! {
    pub struct Mode2: u8 {
        const Invert    = 0b0001_0000;
        const Och       = 0b0000_1000;
        const OutDrv    = 0b0000_0100;
        const OutNe1    = 0b0000_0010;
        const OutNe0    = 0b0000_0001;
    }
}

/// One of the 16 PWM outputs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    /// Output LED0
    _0 = 0,
    /// Output LED1
    _1 = 1,
    /// Output LED2
    _2 = 2,
    /// Output LED3
    _3 = 3,
    /// Output LED4
    _4 = 4,
    /// Output LED5
    _5 = 5,
    /// Output LED6
    _6 = 6,
    /// Output LED7
    _7 = 7,
    /// Output LED8
    _8 = 8,
    /// Output LED9
    _9 = 9,
    /// Output LED10
    _10 = 10,
    /// Output LED11
    _11 = 11,
    /// Output LED12
    _12 = 12,
    /// Output LED13
    _13 = 13,
    /// Output LED14
    _14 = 14,
    /// Output LED15
    _15 = 15,
}

impl Channel {
    /// Address of the LEDn_ON_L register, the first of the four timing registers
    fn base_register(self) -> u8 {
        LED0_ON_L + 4 * (self as u8)
    }
}

impl TryFrom<u8> for Channel {
    type Error = ();

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        use Channel::*;
        const ALL: [Channel; 16] = [
            _0, _1, _2, _3, _4, _5, _6, _7, _8, _9, _10, _11, _12, _13, _14, _15,
        ];
        ALL.get(index as usize).copied().ok_or(())
    }
}

/// Output change mode
#[derive(Copy, Clone, Debug)]
pub enum Och {
    /// Outputs change on STOP command.
    ChangeOnStop,
    /// Outputs change on ACK.
    ChangeOnAck,
}

/// Output driver structure
#[derive(Copy, Clone, Debug)]
pub enum OutDrv {
    /// The 16 outputs are configured with an open-drain structure.
    OpenDrain,
    /// The 16 outputs are configured with a totem pole structure.
    TotemPole,
}

/// Output state while OE = 1 (output drivers not enabled)
#[derive(Copy, Clone, Debug)]
pub enum OutputDrive {
    /// LEDn = 0
    OutNe00,
    /// LEDn = 1 when OUTDRV = 1, high-impedance when OUTDRV = 0
    OutNe01,
    /// LEDn = high-impedance
    OutNe1x,
}

/// Secondary I2C-bus addresses
#[derive(Copy, Clone, Debug)]
pub enum SubAddress {
    _1,
    _2,
    _3,
}

/// Driver configuration registers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    mode1: Mode1,
    mode2: Mode2,
}

impl Default for Config {
    /// Power-on register state
    fn default() -> Self {
        Config {
            mode1: Mode1::AllCall | Mode1::Sleep,
            mode2: Mode2::OutDrv,
        }
    }
}

impl Config {
    /// Default configs but awake and with register auto-increment
    pub fn new() -> Self {
        Config {
            mode1: Mode1::AllCall | Mode1::AutoInc,
            mode2: Mode2::OutDrv,
        }
    }

    pub fn mode1(&self) -> Mode1 {
        self.mode1
    }

    pub fn mode2(&self) -> Mode2 {
        self.mode2
    }

    /// Enable subaddress 1
    pub fn sub1(mut self, enable: bool) -> Config {
        self.mode1.set(Mode1::Sub1, enable);
        self
    }

    /// Enable subaddress 2
    pub fn sub2(mut self, enable: bool) -> Config {
        self.mode1.set(Mode1::Sub2, enable);
        self
    }

    /// Enable subaddress 3
    pub fn sub3(mut self, enable: bool) -> Config {
        self.mode1.set(Mode1::Sub3, enable);
        self
    }

    /// Enable all call address
    pub fn all_call(mut self, enable: bool) -> Config {
        self.mode1.set(Mode1::AllCall, enable);
        self
    }

    /// Put into sleep mode (default on)
    pub fn sleep(mut self, enable: bool) -> Config {
        self.mode1.set(Mode1::Sleep, enable);
        self
    }

    /// Clock from the EXTCLK pin. Sticky until power cycle once set.
    pub fn ext_clk(mut self, enable: bool) -> Config {
        self.mode1.set(Mode1::ExtClk, enable);
        self
    }

    /// Output logic inverted
    pub fn invert(mut self, enable: bool) -> Config {
        self.mode2.set(Mode2::Invert, enable);
        self
    }

    /// Control when outputs are updated
    pub fn och(mut self, change: Och) -> Config {
        match change {
            Och::ChangeOnStop => self.mode2.set(Mode2::Och, false),
            Och::ChangeOnAck => self.mode2.set(Mode2::Och, true),
        }
        self
    }

    /// Control output driver structure
    pub fn out_drv(mut self, outdrv: OutDrv) -> Config {
        match outdrv {
            OutDrv::OpenDrain => self.mode2.set(Mode2::OutDrv, false),
            OutDrv::TotemPole => self.mode2.set(Mode2::OutDrv, true),
        }
        self
    }

    /// Control output idle behaviour
    pub fn outne(mut self, out: OutputDrive) -> Config {
        match out {
            OutputDrive::OutNe00 => self.mode2.remove(Mode2::OutNe1 | Mode2::OutNe0),
            OutputDrive::OutNe01 => {
                self.mode2.insert(Mode2::OutNe0);
                self.mode2.remove(Mode2::OutNe1);
            }
            OutputDrive::OutNe1x => {
                self.mode2.remove(Mode2::OutNe0);
                self.mode2.insert(Mode2::OutNe1);
            }
        }
        self
    }
}


const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const SUBADR1: u8 = 0x02;
const SUBADR2: u8 = 0x03;
const SUBADR3: u8 = 0x04;
const ALLCALLADR: u8 = 0x05;
const LED0_ON_L: u8 = 0x06;
const ALL_LED_ON_L: u8 = 0xFA;
const PRE_SCALE: u8 = 0xFE;

/// All possible errors in this crate
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// I2C bus error
    I2C(E),
    /// Argument out of range, nothing was written
    InvalidInputData,
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2C(e) => write!(f, "I2C bus error: {:?}", e),
            Error::InvalidInputData => f.write_str("invalid input data"),
        }
    }
}

pub struct Pca9685<I2C> {
    i2c: I2C,
    address: u8,
    servo: ServoCalibration,
}

impl<I2C, E> Pca9685<I2C>
where
    I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
{
    /// New PWM driver
    ///
    /// *Note: Does not take the chip out of __sleep__ mode nor enable
    /// auto-increment, both of which channel access needs. See [`Config::new`].*
    pub fn new(i2c: I2C, address: Address) -> Self {
        Pca9685 {
            i2c,
            address: address.address(),
            servo: ServoCalibration::default(),
        }
    }

    /// New PWM driver
    pub fn new_config(i2c: I2C, address: Address, conf: Config) -> Result<Self, Error<E>> {
        let mut pca = Self::new(i2c, address);
        pca.write_config(conf)?;
        Ok(pca)
    }

    /// Give back the bus
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Read a register
    pub fn read(&mut self, register: u8) -> Result<u8, Error<E>> {
        let mut buf = [0u8];
        self.read_block(register, &mut buf)?;
        Ok(buf[0])
    }

    /// Write a register
    pub fn write(&mut self, register: u8, value: u8) -> Result<(), Error<E>> {
        trace!("pca9685@{:#04x}: [{:#04x}] <- {:#04x}", self.address, register, value);
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::I2C)
    }

    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[register])
            .map_err(Error::I2C)?;
        self.i2c.read(self.address, buf).map_err(Error::I2C)?;
        trace!("pca9685@{:#04x}: [{:#04x}] -> {:02x?}", self.address, register, buf);
        Ok(())
    }

    /// Write config. Auto-increment is always enabled.
    pub fn write_config(&mut self, conf: Config) -> Result<(), Error<E>> {
        let mode1 = conf.mode1 | Mode1::AutoInc;
        debug!("config: mode1 {:#04x}, mode2 {:#04x}", mode1.bits(), conf.mode2.bits());
        self.write(MODE1, mode1.bits())?;
        self.write(MODE2, conf.mode2.bits())
    }

    /// Both mode registers, MODE1 in the high byte
    pub fn read_mode_registers(&mut self) -> Result<u16, Error<E>> {
        let mode1 = self.read(MODE1)?;
        let mode2 = self.read(MODE2)?;
        Ok(u16::from(mode1) << 8 | u16::from(mode2))
    }

    pub fn read_prescaler(&mut self) -> Result<u8, Error<E>> {
        self.read(PRE_SCALE)
    }

    /// Write the clock prescaler.
    ///
    /// PRE_SCALE only latches in sleep mode, so the oscillator is stopped
    /// around the write and MODE1 restored afterwards with RESTART cleared.
    /// Channels that were running stay off until [`restart`](Self::restart)
    /// is called or their PWM registers are written again.
    pub fn write_prescaler(&mut self, value: u8) -> Result<(), Error<E>> {
        if value < PRESCALE_MIN {
            return Err(Error::InvalidInputData);
        }
        let mode1 = Mode1::from_bits_truncate(self.read(MODE1)?) - Mode1::Restart;
        debug!("prescaler <- {}", value);
        self.write(MODE1, (mode1 | Mode1::Sleep).bits())?;
        self.write(PRE_SCALE, value)?;
        self.write(MODE1, mode1.bits())
    }

    /// Resume the channels halted by the last sleep.
    ///
    /// Waits the 500 us the oscillator needs to stabilise, then writes
    /// RESTART if the chip flags it. Returns whether a restart was issued.
    pub fn restart<D: DelayUs<u16>>(&mut self, delay: &mut D) -> Result<bool, Error<E>> {
        let mode1 = Mode1::from_bits_truncate(self.read(MODE1)?);
        if !mode1.contains(Mode1::Restart) || mode1.contains(Mode1::Sleep) {
            return Ok(false);
        }
        delay.delay_us(500);
        debug!("restarting PWM channels");
        self.write(MODE1, mode1.bits())?;
        Ok(true)
    }

    /// Start and stop tick of a channel
    pub fn read_chl_time(&mut self, ch: Channel) -> Result<(u16, u16), Error<E>> {
        let mut buf = [0u8; 4];
        self.read_block(ch.base_register(), &mut buf)?;
        Ok((tick(buf[0], buf[1]), tick(buf[2], buf[3])))
    }

    /// Write start and stop tick of a channel
    pub fn write_chl_time(&mut self, ch: Channel, start: u16, stop: u16) -> Result<(), Error<E>> {
        self.write_time_block(ch.base_register(), start, stop)
    }

    /// Write start and stop tick of every channel at once
    pub fn write_all_chl_time(&mut self, start: u16, stop: u16) -> Result<(), Error<E>> {
        self.write_time_block(ALL_LED_ON_L, start, stop)
    }

    pub fn write_chl_start(&mut self, ch: Channel, start: u16) -> Result<(), Error<E>> {
        self.write_tick(ch.base_register(), start)
    }

    pub fn write_chl_stop(&mut self, ch: Channel, stop: u16) -> Result<(), Error<E>> {
        self.write_tick(ch.base_register() + 2, stop)
    }

    /// Set the duty cycle in percent, keeping the current start tick.
    ///
    /// 0 % puts the stop tick on the start tick.
    pub fn write_chl_duty(&mut self, ch: Channel, percent: u8) -> Result<(), Error<E>> {
        if percent > 100 {
            return Err(Error::InvalidInputData);
        }
        let (start, _) = self.read_chl_time(ch)?;
        let width = u32::from(percent) * u32::from(MAX_TICK) / 100;
        let stop = (u32::from(start) + width) % u32::from(PERIOD_TICKS);
        self.write_chl_stop(ch, stop as u16)
    }

    /// Inverted outputs at ~400 Hz, for common anode LEDs
    pub fn enable_led_mode(&mut self) -> Result<(), Error<E>> {
        debug!("enabling LED mode");
        let mode2 = Mode2::from_bits_truncate(self.read(MODE2)?) | Mode2::Invert | Mode2::OutDrv;
        self.write(MODE2, mode2.bits())?;
        self.write_prescaler(LED_PRESCALE)
    }

    /// LED brightness in percent on a logarithmic curve, see [`led::brightness_ticks`]
    pub fn write_chl_led_percent(&mut self, ch: Channel, percent: u8) -> Result<(), Error<E>> {
        if percent > 100 {
            return Err(Error::InvalidInputData);
        }
        self.write_chl_time(ch, 0, led::brightness_ticks(percent))
    }

    /// Active high outputs at ~50 Hz, for hobby servos
    pub fn enable_servo_mode(&mut self) -> Result<(), Error<E>> {
        debug!("enabling servo mode");
        let mode2 = (Mode2::from_bits_truncate(self.read(MODE2)?) - Mode2::Invert) | Mode2::OutDrv;
        self.write(MODE2, mode2.bits())?;
        self.write_prescaler(SERVO_PRESCALE)
    }

    pub fn servo_angle_limits(&self) -> (i16, i16) {
        (self.servo.min_angle, self.servo.max_angle)
    }

    pub fn set_servo_angle_limits(&mut self, min: i16, max: i16) -> Result<(), Error<E>> {
        self.servo = ServoCalibration::new(min, max, self.servo.min_pulse, self.servo.max_pulse)
            .ok_or(Error::InvalidInputData)?;
        Ok(())
    }

    /// Pulse lengths in ticks for the angle limits, ~4.9 us per tick at 50 Hz
    pub fn servo_pulse_limits(&self) -> (u16, u16) {
        (self.servo.min_pulse, self.servo.max_pulse)
    }

    pub fn set_servo_pulse_limits(&mut self, min: u16, max: u16) -> Result<(), Error<E>> {
        self.servo = ServoCalibration::new(self.servo.min_angle, self.servo.max_angle, min, max)
            .ok_or(Error::InvalidInputData)?;
        Ok(())
    }

    pub fn servo_calibration(&self) -> ServoCalibration {
        self.servo
    }

    pub fn set_servo_calibration(&mut self, calibration: ServoCalibration) {
        self.servo = calibration;
    }

    /// Move a servo. The angle is clamped to the configured limits.
    pub fn write_chl_angle(&mut self, ch: Channel, angle: i16) -> Result<(), Error<E>> {
        let pulse = self.servo.pulse_for(angle);
        self.write_chl_time(ch, 0, pulse)
    }

    /// Write sub address. Requires the matching `Sub` flag in config to be set.
    pub fn write_sub_address(&mut self, sub: SubAddress, addr: u8) -> Result<(), Error<E>> {
        let register = match sub {
            SubAddress::_1 => SUBADR1,
            SubAddress::_2 => SUBADR2,
            SubAddress::_3 => SUBADR3,
        };
        self.write(register, addr << 1)
    }

    /// Write all call address. Requires `AllCall` flag in config to be set.
    pub fn write_all_call_address(&mut self, addr: u8) -> Result<(), Error<E>> {
        self.write(ALLCALLADR, addr << 1)
    }

    fn write_tick(&mut self, register: u8, value: u16) -> Result<(), Error<E>> {
        if value > MAX_TICK {
            return Err(Error::InvalidInputData);
        }
        let [lo, hi] = value.to_le_bytes();
        trace!("pca9685@{:#04x}: [{:#04x}] <- {}", self.address, register, value);
        self.i2c
            .write(self.address, &[register, lo, hi])
            .map_err(Error::I2C)
    }

    fn write_time_block(&mut self, register: u8, start: u16, stop: u16) -> Result<(), Error<E>> {
        if start > MAX_TICK || stop > MAX_TICK {
            return Err(Error::InvalidInputData);
        }
        let [on_l, on_h] = start.to_le_bytes();
        let [off_l, off_h] = stop.to_le_bytes();
        trace!("pca9685@{:#04x}: [{:#04x}] <- ({}, {})", self.address, register, start, stop);
        self.i2c
            .write(self.address, &[register, on_l, on_h, off_l, off_h])
            .map_err(Error::I2C)
    }
}

/// 12-bit tick from a low/high register pair. Bit 4 of the high byte is the
/// full on/off flag and is dropped.
fn tick(low: u8, high: u8) -> u16 {
    u16::from(high & 0x0F) << 8 | u16::from(low)
}

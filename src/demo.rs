//! RGB LED and servo demonstration for the SparkFun PWM Block.
//!
//! A single pass: report the chip configuration, poke the channel timing
//! setters once each, then optionally sweep LED brightness and servo angle.
//! Whatever is written to the chip persists after the pass completes.

use core::fmt::{self, Write};

use hal::blocking::delay::DelayMs;
use hal::blocking::i2c;
use log::info;

use crate::{Channel, Error, Pca9685, ServoCalibration};

/// Channel assignments from the PWM Block hookup guide
pub const SERVO: Channel = Channel::_0;
pub const RED: Channel = Channel::_2;
pub const GREEN: Channel = Channel::_3;
pub const BLUE: Channel = Channel::_4;

/// Prescaler written while demonstrating the raw setters
pub const DEMO_PRESCALE: u8 = 121;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// LEDs and servos want opposite polarity and different frequencies
    ConflictingModes,
    ZeroFrameInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ConflictingModes => {
                f.write_str("LED and servo demos cannot share one PWM block")
            }
            ConfigError::ZeroFrameInterval => f.write_str("frame interval must be non-zero"),
        }
    }
}

/// Which demos run and how they are paced
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    pub led: bool,
    pub servo: bool,
    /// Delay between animation steps
    pub frame_ms: u32,
    /// Delay between the end of the LED sweep and switching the LEDs off
    pub pause_ms: u32,
    pub calibration: ServoCalibration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            led: false,
            servo: true,
            frame_ms: 100,
            pause_ms: 4000,
            calibration: ServoCalibration::sub_micro(),
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.led && self.servo {
            return Err(ConfigError::ConflictingModes);
        }
        if self.frame_ms == 0 {
            return Err(ConfigError::ZeroFrameInterval);
        }
        Ok(())
    }
}

/// Paces animation steps at a fixed interval
pub struct FrameClock<D> {
    delay: D,
    frame_ms: u32,
}

impl<D: DelayMs<u32>> FrameClock<D> {
    pub fn new(delay: D, frame_ms: u32) -> Self {
        FrameClock { delay, frame_ms }
    }

    pub fn frame_ms(&self) -> u32 {
        self.frame_ms
    }

    /// Wait one frame
    pub fn tick(&mut self) {
        self.delay.delay_ms(self.frame_ms);
    }

    pub fn pause(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub fn release(self) -> D {
        self.delay
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DemoError<E> {
    Driver(Error<E>),
    Config(ConfigError),
    /// Writing to the console failed
    Console,
}

impl<E> From<Error<E>> for DemoError<E> {
    fn from(e: Error<E>) -> Self {
        DemoError::Driver(e)
    }
}

impl<E> From<ConfigError> for DemoError<E> {
    fn from(e: ConfigError) -> Self {
        DemoError::Config(e)
    }
}

impl<E> From<fmt::Error> for DemoError<E> {
    fn from(_: fmt::Error) -> Self {
        DemoError::Console
    }
}

impl<E: fmt::Debug> fmt::Display for DemoError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoError::Driver(e) => write!(f, "{}", e),
            DemoError::Config(e) => write!(f, "{}", e),
            DemoError::Console => f.write_str("console write failed"),
        }
    }
}

/// Print the mode registers and prescaler. Reads only.
pub fn report_configuration<I2C, E, W>(
    pwm: &mut Pca9685<I2C>,
    out: &mut W,
) -> Result<(), DemoError<E>>
where
    I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
    W: Write,
{
    let modes = pwm.read_mode_registers()?;
    let prescaler = pwm.read_prescaler()?;
    writeln!(out, "Current mode register values: 0x{:x}", modes)?;
    writeln!(out, "Current prescaler: {}", prescaler)?;
    Ok(())
}

/// Exercise each of the raw timing setters once
pub fn configure_channels<I2C, E>(pwm: &mut Pca9685<I2C>) -> Result<(), DemoError<E>>
where
    I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
{
    pwm.write_prescaler(DEMO_PRESCALE)?;
    pwm.write_chl_time(RED, 0, 0)?;
    pwm.write_chl_duty(BLUE, 0)?;
    pwm.write_chl_start(GREEN, 0)?;
    pwm.write_chl_stop(GREEN, 0)?;
    pwm.write_chl_duty(SERVO, 0)?;
    Ok(())
}

/// Fade the RGB LED from off to full white, hold, then switch it off
pub fn led_sweep<I2C, E, D, W>(
    pwm: &mut Pca9685<I2C>,
    clock: &mut FrameClock<D>,
    out: &mut W,
    pause_ms: u32,
) -> Result<(), DemoError<E>>
where
    I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u32>,
    W: Write,
{
    info!("LED demo");
    pwm.enable_led_mode()?;
    report_configuration(pwm, out)?;

    for percent in 0..=100 {
        // Start stays at 0 while stop climbs logarithmically
        let (start, stop) = pwm.read_chl_time(RED)?;
        writeln!(out, "Start time: {}", start)?;
        writeln!(out, "Stop time: {}", stop)?;
        for &ch in &[BLUE, GREEN, RED] {
            pwm.write_chl_led_percent(ch, percent)?;
        }
        clock.tick();
    }

    clock.pause(pause_ms);
    for &ch in &[RED, GREEN, BLUE] {
        pwm.write_chl_time(ch, 0, 0)?;
    }
    writeln!(out, "LED demo complete!")?;
    Ok(())
}

/// Calibrate the servo and step it through its whole range
pub fn servo_sweep<I2C, E, D, W>(
    pwm: &mut Pca9685<I2C>,
    clock: &mut FrameClock<D>,
    out: &mut W,
    calibration: ServoCalibration,
) -> Result<(), DemoError<E>>
where
    I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u32>,
    W: Write,
{
    info!("servo demo");
    let (min_angle, max_angle) = pwm.servo_angle_limits();
    writeln!(out, "Current servo min angle: {}", min_angle)?;
    writeln!(out, "Current servo max angle: {}", max_angle)?;
    let (min_pulse, max_pulse) = pwm.servo_pulse_limits();
    writeln!(out, "Current servo min pulse length: {}", min_pulse)?;
    writeln!(out, "Current servo max pulse length: {}", max_pulse)?;

    let (min_pulse, max_pulse) = calibration.pulse_limits();
    pwm.set_servo_pulse_limits(min_pulse, max_pulse)?;
    let (min_angle, max_angle) = calibration.angle_limits();
    pwm.set_servo_angle_limits(min_angle, max_angle)?;
    pwm.enable_servo_mode()?;
    report_configuration(pwm, out)?;

    for angle in min_angle..=max_angle {
        let (start, stop) = pwm.read_chl_time(SERVO)?;
        writeln!(out, "Start time: {}", start)?;
        writeln!(out, "Stop time: {}", stop)?;
        pwm.write_chl_angle(SERVO, angle)?;
        clock.tick();
    }
    writeln!(out, "Servo demo complete!")?;
    Ok(())
}

/// The whole demonstration, in order
pub fn run<I2C, E, D, W>(
    pwm: &mut Pca9685<I2C>,
    clock: &mut FrameClock<D>,
    out: &mut W,
    config: &DemoConfig,
) -> Result<(), DemoError<E>>
where
    I2C: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u32>,
    W: Write,
{
    config.validate()?;
    report_configuration(pwm, out)?;
    configure_channels(pwm)?;
    if config.led {
        led_sweep(pwm, clock, out, config.pause_ms)?;
    }
    if config.servo {
        servo_sweep(pwm, clock, out, config.calibration)?;
    }
    info!("demo complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingDelay {
        total_ms: u32,
        calls: u32,
    }

    impl DelayMs<u32> for CountingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
            self.calls += 1;
        }
    }

    #[test]
    fn clock_waits_frame_then_pause() {
        let mut clock = FrameClock::new(
            CountingDelay {
                total_ms: 0,
                calls: 0,
            },
            100,
        );
        clock.tick();
        clock.tick();
        clock.pause(4000);
        let delay = clock.release();
        assert_eq!(delay.calls, 3);
        assert_eq!(delay.total_ms, 4200);
    }

    #[test]
    fn default_config_runs_servo_only() {
        let config = DemoConfig::default();
        assert!(config.servo && !config.led);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.calibration.angle_limits(), (0, 160));
        assert_eq!(config.calibration.pulse_limits(), (108, 450));
    }

    #[test]
    fn both_demos_rejected() {
        let config = DemoConfig {
            led: true,
            ..DemoConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ConflictingModes));
    }

    #[test]
    fn zero_frame_rejected() {
        let config = DemoConfig {
            frame_ms: 0,
            ..DemoConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFrameInterval));
    }

    #[test]
    fn nothing_selected_is_valid() {
        let config = DemoConfig {
            servo: false,
            ..DemoConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }
}

//! Drive an RGB LED and a hobby servo from a PCA9685 on a Linux I2C bus.
//!
//! ```text
//! pwm_block --servo            # sweep the servo on channel 0 (default)
//! pwm_block --led --bus 1      # fade the RGB LED on channels 2-4
//! RUST_LOG=trace pwm_block     # log every register access
//! ```
//!
//! LEDs and servos want different frequencies and polarities, so only one
//! demo runs at a time.

use std::error::Error;
use std::fmt;
use std::io::{self, Write as _};

use clap::Parser;
use linux_embedded_hal::{Delay, I2cdev};
use log::info;
use pca9685_block::demo::{self, DemoConfig, FrameClock};
use pca9685_block::{Address, Config, Pca9685};

/// PCA9685 PWM Block demo: RGB LED fade or servo sweep
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// I2C bus number, opens /dev/i2c-N
    #[arg(long, default_value_t = 1)]
    bus: u8,

    /// 7-bit device address
    #[arg(long, default_value = "0x40", value_parser = parse_address)]
    address: u8,

    /// Run the LED brightness sweep
    #[arg(long)]
    led: bool,

    /// Run the servo angle sweep (default when no demo is chosen)
    #[arg(long)]
    servo: bool,

    /// Delay between animation steps (ms)
    #[arg(long, default_value_t = 100)]
    frame_ms: u32,

    /// Hold time at full brightness before the LEDs are switched off (ms)
    #[arg(long, default_value_t = 4000)]
    pause_ms: u32,
}

impl Args {
    fn demo_config(&self) -> DemoConfig {
        DemoConfig {
            led: self.led,
            servo: self.servo || !self.led,
            frame_ms: self.frame_ms,
            pause_ms: self.pause_ms,
            ..DemoConfig::default()
        }
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let addr = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| e.to_string())?;
    if addr > 0x7F {
        return Err(format!("{:#x} is not a 7-bit address", addr));
    }
    Ok(addr)
}

/// Standard output as a `fmt::Write` sink
struct Console(io::Stdout);

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = args.demo_config();
    config.validate().map_err(|e| e.to_string())?;

    let path = format!("/dev/i2c-{}", args.bus);
    info!("opening {} at {:#04x}", path, args.address);
    let i2c = I2cdev::new(&path)?;

    // The driver owns the bus from here; dropping it closes the device on
    // every return path.
    let mut pwm = Pca9685::new_config(i2c, Address::Custom(args.address), Config::new())
        .map_err(|e| e.to_string())?;
    let mut clock = FrameClock::new(Delay, config.frame_ms);
    let mut console = Console(io::stdout());

    demo::run(&mut pwm, &mut clock, &mut console, &config).map_err(|e| e.to_string())?;
    Ok(())
}

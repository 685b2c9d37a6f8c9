//! In-memory PCA9685: a 256 byte register file behind an I2C interface.
//!
//! Honours the register pointer and MODE1 auto-increment, latches PRE_SCALE
//! only while MODE1 sleep is set and fans ALL_LED writes out to every channel.

#![allow(dead_code)]

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

pub const ADDRESS: u8 = 0x40;

const MODE1: usize = 0x00;
const LED0_ON_L: usize = 0x06;
const ALL_LED_ON_L: u8 = 0xFA;
const PRE_SCALE: u8 = 0xFE;

const AUTO_INC: u8 = 0x20;
const SLEEP: u8 = 0x10;

#[derive(Debug, PartialEq, Eq)]
pub struct Nack(pub u8);

pub struct FakeChip {
    pub regs: [u8; 256],
    pointer: u8,
    /// Transactions that stored at least one byte
    pub data_writes: usize,
}

impl FakeChip {
    /// Power-on register state
    pub fn new() -> Self {
        let mut regs = [0u8; 256];
        regs[0x00] = 0x11;
        regs[0x01] = 0x04;
        regs[PRE_SCALE as usize] = 0x1E;
        for ch in 0..16 {
            regs[LED0_ON_L + 4 * ch + 3] = 0x10;
        }
        regs[0xFD] = 0x10;
        FakeChip {
            regs,
            pointer: 0,
            data_writes: 0,
        }
    }

    pub fn mode1(&self) -> u8 {
        self.regs[MODE1]
    }

    pub fn mode2(&self) -> u8 {
        self.regs[0x01]
    }

    pub fn prescaler(&self) -> u8 {
        self.regs[PRE_SCALE as usize]
    }

    /// (start, stop) of a channel, full on/off flags dropped
    pub fn chl_time(&self, ch: usize) -> (u16, u16) {
        let base = LED0_ON_L + 4 * ch;
        let r = &self.regs[base..base + 4];
        (
            u16::from(r[1] & 0x0F) << 8 | u16::from(r[0]),
            u16::from(r[3] & 0x0F) << 8 | u16::from(r[2]),
        )
    }

    fn store(&mut self, value: u8) {
        match self.pointer {
            PRE_SCALE if self.regs[MODE1] & SLEEP == 0 => {}
            p @ ALL_LED_ON_L..=0xFD => {
                let offset = usize::from(p - ALL_LED_ON_L);
                for ch in 0..16 {
                    self.regs[LED0_ON_L + 4 * ch + offset] = value;
                }
                self.regs[usize::from(p)] = value;
            }
            p => self.regs[usize::from(p)] = value,
        }
    }

    fn advance(&mut self) {
        if self.regs[MODE1] & AUTO_INC != 0 {
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

impl i2c::Write for FakeChip {
    type Error = Nack;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if address != ADDRESS {
            return Err(Nack(address));
        }
        if let Some((&register, data)) = bytes.split_first() {
            self.pointer = register;
            for &b in data {
                self.store(b);
                self.advance();
            }
            if !data.is_empty() {
                self.data_writes += 1;
            }
        }
        Ok(())
    }
}

impl i2c::Read for FakeChip {
    type Error = Nack;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        if address != ADDRESS {
            return Err(Nack(address));
        }
        for b in buffer.iter_mut() {
            *b = self.regs[usize::from(self.pointer)];
            self.advance();
        }
        Ok(())
    }
}

/// Delay that only records what it was asked to wait
#[derive(Default)]
pub struct RecordingDelay {
    pub waits: Vec<u32>,
}

impl DelayMs<u32> for RecordingDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.waits.push(ms);
    }
}

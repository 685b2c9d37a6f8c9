//! Servo angle to pulse length mapping

use crate::MAX_TICK;

/// Two linear mapping endpoints turning an angle into a pulse length in ticks
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServoCalibration {
    pub(crate) min_angle: i16,
    pub(crate) max_angle: i16,
    pub(crate) min_pulse: u16,
    pub(crate) max_pulse: u16,
}

impl Default for ServoCalibration {
    /// -90..90 degrees over 1 ms..2 ms at 50 Hz. Conservative for most hobby servos.
    fn default() -> Self {
        ServoCalibration {
            min_angle: -90,
            max_angle: 90,
            min_pulse: 205,
            max_pulse: 410,
        }
    }
}

impl ServoCalibration {
    /// `None` unless both ranges are non-empty and the pulses fit in a period
    pub fn new(min_angle: i16, max_angle: i16, min_pulse: u16, max_pulse: u16) -> Option<Self> {
        if min_angle >= max_angle || min_pulse >= max_pulse || max_pulse > MAX_TICK {
            return None;
        }
        Some(ServoCalibration {
            min_angle,
            max_angle,
            min_pulse,
            max_pulse,
        })
    }

    /// Calibration for the SparkFun generic sub-micro servo: 0..160 degrees
    /// over 108..450 ticks.
    pub fn sub_micro() -> Self {
        ServoCalibration {
            min_angle: 0,
            max_angle: 160,
            min_pulse: 108,
            max_pulse: 450,
        }
    }

    pub fn angle_limits(&self) -> (i16, i16) {
        (self.min_angle, self.max_angle)
    }

    pub fn pulse_limits(&self) -> (u16, u16) {
        (self.min_pulse, self.max_pulse)
    }

    /// Pulse length for `angle`, clamped to the angle limits
    pub fn pulse_for(&self, angle: i16) -> u16 {
        let angle = i32::from(angle.max(self.min_angle).min(self.max_angle));
        let span = i32::from(self.max_angle) - i32::from(self.min_angle);
        let width = i32::from(self.max_pulse) - i32::from(self.min_pulse);
        let offset = (angle - i32::from(self.min_angle)) * width / span;
        self.min_pulse + offset as u16
    }
}

//! Perceptually linear LED brightness.
//!
//! The eye responds roughly logarithmically to light, so equal brightness
//! steps need exponentially growing duty cycles. `2^(p/10)` is approximated
//! piecewise linearly between whole powers of two so that no floating point
//! support is needed.

use crate::MAX_TICK;

/// `10 * 2^(p/10)`, linear between decades
fn curve(percent: u8) -> u32 {
    let p = u32::from(percent.min(100));
    (1u32 << (p / 10)) * (10 + p % 10)
}

/// Stop tick (with start at 0) for a brightness in percent.
///
/// 0 maps to 0 and 100 to 4095. Values above 100 are treated as 100.
pub fn brightness_ticks(percent: u8) -> u16 {
    let lo = curve(0);
    let hi = curve(100);
    ((curve(percent) - lo) * u32::from(MAX_TICK) / (hi - lo)) as u16
}

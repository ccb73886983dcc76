// src/time.rs
//
// Timeline time is kept in whole microseconds so that split, ripple and undo
// arithmetic is exact. Seconds (f64) only appear at the edges: edit plans,
// the CLI and probe results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

const MICROS_PER_SEC: i64 = 1_000_000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Time = Time(0);
    pub const MAX: Time = Time(i64::MAX);

    pub const fn from_micros(micros: i64) -> Self {
        Time(micros)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Time(millis * 1_000)
    }

    pub const fn from_whole_secs(secs: i64) -> Self {
        Time(secs * MICROS_PER_SEC)
    }

    /// Rounds to the nearest microsecond. `None` for NaN, infinities and
    /// values outside the representable range.
    pub fn try_from_secs(secs: f64) -> Option<Self> {
        let micros = (secs * MICROS_PER_SEC as f64).round();
        if micros.is_finite() && micros.abs() < i64::MAX as f64 {
            Some(Time(micros as i64))
        } else {
            None
        }
    }

    /// Lossy convenience for literals and tests; non-finite input saturates.
    pub fn from_secs(secs: f64) -> Self {
        Self::try_from_secs(secs).unwrap_or(if secs.is_sign_negative() {
            Time(i64::MIN)
        } else {
            Time::MAX
        })
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn as_secs(self) -> f64 {
        self.0 as f64 / MICROS_PER_SEC as f64
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Scales by a rate (e.g. playback speed), rounding to the nearest microsecond.
    pub fn mul_f64(self, factor: f64) -> Self {
        Time::from_secs(self.as_secs() * factor)
    }

    pub fn div_f64(self, divisor: f64) -> Self {
        Time::from_secs(self.as_secs() / divisor)
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, rhs: Time) -> Time {
        Time(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Time {
    type Output = Time;
    fn sub(self, rhs: Time) -> Time {
        Time(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Time {
    type Output = Time;
    fn neg(self) -> Time {
        Time(self.0.saturating_neg())
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs())
    }
}

/// Format as `MM:SS:FF` (minutes, seconds, frames at 30 fps) for listings.
///
/// ```
/// use cutline_lib::time::{format_timecode, Time};
/// assert_eq!(format_timecode(Time::ZERO), "00:00:00");
/// assert_eq!(format_timecode(Time::from_secs(61.5)), "01:01:15");
/// ```
pub fn format_timecode(t: Time) -> String {
    let s = t.as_secs().max(0.0);
    let m = (s / 60.0) as u32;
    let sc = (s % 60.0) as u32;
    let fr = ((s * 30.0) as u32) % 30;
    format!("{m:02}:{sc:02}:{fr:02}")
}

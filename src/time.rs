//! Exact rational time and the length/color primitives built on top of it.
//!
//! Time is never represented as `f64` anywhere inside the canonical document
//! model or the ISD generator: every addition, comparison, and min/max stays
//! an exact rational so that chained frame-derived fractions (e.g. repeated
//! `1001/30000`) never drift. Conversion to frames/clock-time is a one-way
//! operation performed only at a format boundary (a reader or a writer).

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{Error, Result};

/// A non-negative exact rational number of seconds.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(BigRational);

impl Time {
    pub fn zero() -> Self {
        Self(BigRational::from_integer(BigInt::from(0)))
    }

    /// Builds a time from a `numerator/denominator` pair of seconds.
    /// Returns a `domain` error if the result would be negative.
    pub fn from_ratio(numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            return Err(Error::Domain("time denominator must not be zero".into()));
        }
        let r = BigRational::new(BigInt::from(numerator), BigInt::from(denominator));
        if r.is_negative() {
            return Err(Error::Domain(format!("negative time: {}/{}", numerator, denominator)));
        }
        Ok(Self(r))
    }

    /// Builds a time from a frame count and an exact frames-per-second
    /// rational (e.g. 30000/1001 for NTSC drop-frame-derived rates).
    pub fn from_frames(frame: i64, fps_num: i64, fps_den: i64) -> Result<Self> {
        if frame < 0 {
            return Err(Error::Domain(format!("negative frame count: {}", frame)));
        }
        let fps = BigRational::new(BigInt::from(fps_num), BigInt::from(fps_den));
        Ok(Self(BigRational::from_integer(BigInt::from(frame)) / fps))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    /// Converts to a whole frame count at the given fps, truncating toward
    /// zero. A format boundary operation only.
    pub fn to_frames(&self, fps_num: i64, fps_den: i64) -> i64 {
        let fps = BigRational::new(BigInt::from(fps_num), BigInt::from(fps_den));
        let frames = &self.0 * fps;
        frames.to_integer().to_i64().unwrap_or(i64::MAX)
    }

    pub fn min(a: Self, b: Self) -> Self {
        if a <= b {
            a
        } else {
            b
        }
    }

    pub fn max(a: Self, b: Self) -> Self {
        if a >= b {
            a
        } else {
            b
        }
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, rhs: Time) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl Add for &Time {
    type Output = Time;
    fn add(self, rhs: &Time) -> Time {
        Time(&self.0 + &rhs.0)
    }
}

impl Sub for &Time {
    type Output = Time;
    /// Saturates at zero: durations are non-negative by construction.
    fn sub(self, rhs: &Time) -> Time {
        if self.0 >= rhs.0 {
            Time(&self.0 - &rhs.0)
        } else {
            Time::zero()
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// An element's effective interval: `start` is absolute document time,
/// `end` is `None` for "open" (no declared `end`, clipped only by an
/// ancestor, if any).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    pub start: Time,
    pub end: Option<Time>,
}

impl Interval {
    pub fn new(start: Time, end: Option<Time>) -> Self {
        Self { start, end }
    }

    /// `s(E) <= t < e(E)`.
    pub fn contains(&self, t: &Time) -> bool {
        if t < &self.start {
            return false;
        }
        match &self.end {
            Some(end) => t < end,
            None => true,
        }
    }

    /// Intersects with an optional ancestor clip, per sec. 3.5:
    /// `e(E) = min(s(E) + dur, ancestor clip)`.
    pub fn clip(self, ancestor_end: Option<&Time>) -> Self {
        let end = match (self.end, ancestor_end) {
            (Some(e), Some(a)) => Some(Time::min(e, a.clone())),
            (Some(e), None) => Some(e),
            (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        };
        Self { start: self.start, end }
    }

    pub fn is_zero_length(&self) -> bool {
        matches!(&self.end, Some(e) if e == &self.start)
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start.cmp(&other.start)
    }
}
impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Length unit domain from sec. 3.1: cells, percent, pixels, em, and the
/// ISD-normalized root-relative units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Cell,
    Percent,
    Pixel,
    Em,
    RootHeight,
    RootWidth,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Unit::Cell => "c",
            Unit::Percent => "%",
            Unit::Pixel => "px",
            Unit::Em => "em",
            Unit::RootHeight => "rh",
            Unit::RootWidth => "rw",
        };
        write!(f, "{}", s)
    }
}

/// A length: an exact rational magnitude paired with its unit (sec. 3.1),
/// kept exact for the same reason `Time` is: root-relative normalization
/// (`isd::normalize_length`) chains divisions and multiplications over it,
/// and those must not drift any more than timing arithmetic may.
#[derive(Clone, Debug, PartialEq)]
pub struct Length {
    pub value: BigRational,
    pub unit: Unit,
}

impl Length {
    /// Builds a length from a decimal value as parsed from input text (e.g.
    /// TTML's `"10.5%"`), converting it to an exact rational by scaling to a
    /// fixed denominator. A parse-boundary operation only, mirroring
    /// `Time::from_frames`: once constructed, `value` undergoes no further
    /// floating-point arithmetic anywhere in the cascade or ISD generator.
    pub fn new(value: f64, unit: Unit) -> Self {
        let scaled = (value * 1_000_000.0).round() as i64;
        Self { value: BigRational::new(BigInt::from(scaled), BigInt::from(1_000_000)), unit }
    }

    /// Builds a length from an already-exact rational, for callers (the ISD
    /// generator's length normalization) that compute a length
    /// arithmetically rather than parse it from text.
    pub fn from_rational(value: BigRational, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.to_f64(), self.unit)
    }
}

/// RGBA color, each component an 8-bit integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// A resolution in either cells (rows x columns) or pixels (width x height).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub columns: u32,
    pub rows: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        // sec. 3.2 default cell_resolution: 32x15.
        Self { columns: 32, rows: 15 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for PixelResolution {
    fn default() -> Self {
        // sec. 3.2 default px_resolution: 1920x1080.
        Self { width: 1920, height: 1080 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_rational_addition_has_no_drift() {
        let step = Time::from_ratio(1001, 30000).unwrap();
        let mut total = Time::zero();
        for _ in 0..30000 {
            total = total + step.clone();
        }
        assert_eq!(total, Time::from_ratio(1001, 1).unwrap());
    }

    #[test]
    fn interval_contains_is_half_open() {
        let iv = Interval::new(Time::from_ratio(1, 1).unwrap(), Some(Time::from_ratio(3, 1).unwrap()));
        assert!(!iv.contains(&Time::from_ratio(0, 1).unwrap()));
        assert!(iv.contains(&Time::from_ratio(1, 1).unwrap()));
        assert!(iv.contains(&Time::from_ratio(2, 1).unwrap()));
        assert!(!iv.contains(&Time::from_ratio(3, 1).unwrap()));
    }

    #[test]
    fn zero_length_interval_contains_nothing() {
        let t = Time::from_ratio(5, 1).unwrap();
        let iv = Interval::new(t.clone(), Some(t.clone()));
        assert!(iv.is_zero_length());
        assert!(!iv.contains(&t));
    }

    #[test]
    fn clip_takes_the_earlier_end() {
        let iv = Interval::new(Time::zero(), Some(Time::from_ratio(10, 1).unwrap()));
        let clipped = iv.clip(Some(&Time::from_ratio(4, 1).unwrap()));
        assert_eq!(clipped.end, Some(Time::from_ratio(4, 1).unwrap()));
    }

    #[test]
    fn negative_time_is_a_domain_error() {
        assert!(Time::from_ratio(-1, 1).is_err());
    }
}

//! Built-in single value models
//!
//! These are the payloads of the non-primitive [`KnownType`](crate::KnownType)
//! variants. Time values count 100ns ticks from `0001-01-01T00:00:00` and
//! convert to and from `chrono` types.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use std::fmt;

/// Ticks per second (one tick is 100ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Largest valid date/time tick count (9999-12-31T23:59:59.9999999)
pub const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

fn tick_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn duration_to_ticks(delta: Duration) -> Option<i64> {
    let secs = delta.num_seconds();
    let nanos = (delta - Duration::seconds(secs)).num_nanoseconds()?;
    secs.checked_mul(TICKS_PER_SECOND)?.checked_add(nanos / 100)
}

fn ticks_to_duration(ticks: i64) -> Duration {
    Duration::seconds(ticks / TICKS_PER_SECOND)
        + Duration::nanoseconds((ticks % TICKS_PER_SECOND) * 100)
}

/// 96-bit scaled decimal
///
/// Stored as the four 32-bit words of its binary form: low/mid/high mantissa
/// words and a flags word holding the scale (bits 16..24) and sign (bit 31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    lo: u32,
    mid: u32,
    hi: u32,
    flags: u32,
}

impl Decimal {
    /// Largest supported scale
    pub const MAX_SCALE: u8 = 28;

    const SIGN_BIT: u32 = 0x8000_0000;
    const SCALE_MASK: u32 = 0x00FF_0000;

    /// Build from a mantissa and scale; `None` if out of range
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        if scale > Self::MAX_SCALE {
            return None;
        }
        let magnitude = mantissa.unsigned_abs();
        if magnitude >> 96 != 0 {
            return None;
        }
        let mut flags = (scale as u32) << 16;
        if mantissa < 0 {
            flags |= Self::SIGN_BIT;
        }
        Some(Decimal {
            lo: magnitude as u32,
            mid: (magnitude >> 32) as u32,
            hi: (magnitude >> 64) as u32,
            flags,
        })
    }

    /// Build from the four binary words; `None` if the flags word is invalid
    pub fn from_parts(lo: u32, mid: u32, hi: u32, flags: u32) -> Option<Self> {
        let scale = (flags & Self::SCALE_MASK) >> 16;
        if flags & !(Self::SIGN_BIT | Self::SCALE_MASK) != 0 || scale > Self::MAX_SCALE as u32 {
            return None;
        }
        Some(Decimal { lo, mid, hi, flags })
    }

    /// The four binary words `[lo, mid, hi, flags]`
    pub fn parts(&self) -> [u32; 4] {
        [self.lo, self.mid, self.hi, self.flags]
    }

    /// Signed mantissa
    pub fn mantissa(&self) -> i128 {
        let magnitude =
            (self.lo as i128) | ((self.mid as i128) << 32) | ((self.hi as i128) << 64);
        if self.flags & Self::SIGN_BIT != 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Number of digits after the decimal point
    pub fn scale(&self) -> u8 {
        ((self.flags & Self::SCALE_MASK) >> 16) as u8
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mantissa = self.mantissa();
        let digits = mantissa.unsigned_abs().to_string();
        let scale = self.scale() as usize;
        if mantissa < 0 {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}.{}", int_part, frac_part)
    }
}

/// Interpretation of a [`DateTime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateTimeKind {
    /// No time zone information
    #[default]
    Unspecified = 0,
    /// Coordinated universal time
    Utc = 1,
    /// Local time
    Local = 2,
}

impl DateTimeKind {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(DateTimeKind::Unspecified),
            1 => Some(DateTimeKind::Utc),
            2 => Some(DateTimeKind::Local),
            _ => None,
        }
    }
}

/// Tick-precision date and time with a kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    ticks: i64,
    kind: DateTimeKind,
}

impl DateTime {
    /// Earliest representable value
    pub const MIN: DateTime = DateTime {
        ticks: 0,
        kind: DateTimeKind::Unspecified,
    };

    /// Latest representable value
    pub const MAX: DateTime = DateTime {
        ticks: MAX_TICKS,
        kind: DateTimeKind::Unspecified,
    };

    /// Build from ticks; `None` if out of range
    pub fn from_ticks(ticks: i64, kind: DateTimeKind) -> Option<Self> {
        (0..=MAX_TICKS)
            .contains(&ticks)
            .then_some(DateTime { ticks, kind })
    }

    /// Convert from a chrono naive date/time
    pub fn from_naive(dt: NaiveDateTime, kind: DateTimeKind) -> Option<Self> {
        let ticks = duration_to_ticks(dt.signed_duration_since(tick_epoch()?))?;
        Self::from_ticks(ticks, kind)
    }

    /// Convert from a UTC chrono date/time
    pub fn from_utc(dt: chrono::DateTime<chrono::Utc>) -> Option<Self> {
        Self::from_naive(dt.naive_utc(), DateTimeKind::Utc)
    }

    /// Convert to a chrono naive date/time
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        tick_epoch()?.checked_add_signed(ticks_to_duration(self.ticks))
    }

    /// Tick count
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Kind marker
    pub fn kind(&self) -> DateTimeKind {
        self.kind
    }

    /// Packed 64-bit form: ticks in the low 62 bits, kind in the top two
    pub fn to_binary(&self) -> i64 {
        self.ticks | ((self.kind as i64) << 62)
    }

    /// Inverse of [`DateTime::to_binary`]
    pub fn from_binary(raw: i64) -> Option<Self> {
        let kind = DateTimeKind::from_bits(((raw as u64) >> 62) as u8)?;
        Self::from_ticks(raw & 0x3FFF_FFFF_FFFF_FFFF, kind)
    }
}

/// Signed time interval in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TimeSpan {
    /// 100ns ticks
    pub ticks: i64,
}

impl TimeSpan {
    /// Build from ticks
    pub fn from_ticks(ticks: i64) -> Self {
        TimeSpan { ticks }
    }

    /// Convert from a chrono duration; `None` on overflow
    pub fn from_duration(d: Duration) -> Option<Self> {
        duration_to_ticks(d).map(TimeSpan::from_ticks)
    }

    /// Convert to a chrono duration
    pub fn to_duration(&self) -> Duration {
        ticks_to_duration(self.ticks)
    }
}

/// Clock time together with its offset from UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTimeOffset {
    /// Local clock ticks
    pub ticks: i64,
    /// Offset from UTC in minutes
    pub offset_minutes: i16,
}

impl DateTimeOffset {
    /// Convert from a chrono fixed-offset date/time
    pub fn from_chrono(dt: chrono::DateTime<FixedOffset>) -> Option<Self> {
        let local = DateTime::from_naive(dt.naive_local(), DateTimeKind::Unspecified)?;
        let offset_minutes = i16::try_from(dt.offset().local_minus_utc() / 60).ok()?;
        Some(DateTimeOffset {
            ticks: local.ticks(),
            offset_minutes,
        })
    }

    /// Convert to a chrono fixed-offset date/time
    pub fn to_chrono(&self) -> Option<chrono::DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes as i32 * 60)?;
        let local = DateTime::from_ticks(self.ticks, DateTimeKind::Unspecified)?.to_naive()?;
        offset.from_local_datetime(&local).single()
    }
}

/// Four-part version number; `build` and `revision` are -1 when undefined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    /// Major component
    pub major: i32,
    /// Minor component
    pub minor: i32,
    /// Build component or -1
    pub build: i32,
    /// Revision component or -1
    pub revision: i32,
}

impl Version {
    /// Two-part version
    pub fn new(major: i32, minor: i32) -> Self {
        Version {
            major,
            minor,
            build: -1,
            revision: -1,
        }
    }

    /// Set the build component
    pub fn with_build(mut self, build: i32) -> Self {
        self.build = build;
        self
    }

    /// Set the revision component
    pub fn with_revision(mut self, revision: i32) -> Self {
        self.revision = revision;
        self
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.build >= 0 {
            write!(f, ".{}", self.build)?;
            if self.revision >= 0 {
                write!(f, ".{}", self.revision)?;
            }
        }
        Ok(())
    }
}

/// Resource identifier text with its absolute/relative marker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    /// Original text
    pub text: String,
    /// Whether the text is an absolute URI
    pub absolute: bool,
}

impl Uri {
    /// Absolute URI
    pub fn absolute(text: impl Into<String>) -> Self {
        Uri {
            text: text.into(),
            absolute: true,
        }
    }

    /// Relative URI
    pub fn relative(text: impl Into<String>) -> Self {
        Uri {
            text: text.into(),
            absolute: false,
        }
    }
}

/// Section of a 32-bit bit vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitVectorSection {
    /// Bit mask of the section
    pub mask: i16,
    /// Bit offset of the section
    pub offset: i16,
}

/// Growable string buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringBuilder {
    /// Current content
    pub text: String,
    /// Reserved capacity
    pub capacity: i32,
}

impl StringBuilder {
    /// Buffer holding `text` with at least the default capacity
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let capacity = (text.len() as i32).max(16);
        StringBuilder { text, capacity }
    }
}

//! Time values and validity periods.
//!
//! RPKI objects carry their times as GeneralizedTime values with second
//! precision. [`Time`] keeps them as broken-down civil time in UTC so that
//! two times compare field by field, year first.

use std::{error, fmt, io, ops};
use std::time::SystemTime;
use bcder::{encode, Mode, Tag};
use bcder::encode::PrimitiveContent;
use chrono::{
    DateTime, Datelike, NaiveDate, SubsecRound, TimeDelta, TimeZone,
    Timelike, Utc
};


//------------ Time ----------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    /// Returns the current time in whole seconds.
    pub fn now() -> Self {
        Self::new(Utc::now()).truncated()
    }

    /// Returns the time with any fraction of a second dropped.
    pub fn truncated(self) -> Self {
        Time(self.0.trunc_subsecs(0))
    }

    /// Creates a time from its civil parts.
    ///
    /// Returns `None` if any of the parts is out of range.
    pub fn utc(
        year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32
    ) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, min, sec))
            .map(|naive| Time(Utc.from_utc_datetime(&naive)))
    }

    /// Creates a time from seconds since the Unix epoch.
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Time)
    }

    /// Parses the content octets of a GeneralizedTime value.
    ///
    /// RFC 5280 limits the format to `YYYYMMDDHHMMSSZ`. Every field must be
    /// within its range for the given month and year.
    pub fn from_generalized_time(
        content: &[u8]
    ) -> Result<Self, MalformedTime> {
        if content.len() != 15 || content[14] != b'Z' {
            return Err(MalformedTime::format())
        }
        let digits = &content[..14];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(MalformedTime::format())
        }
        Self::utc(
            read_number(&digits[0..4]) as i32,
            read_number(&digits[4..6]),
            read_number(&digits[6..8]),
            read_number(&digits[8..10]),
            read_number(&digits[10..12]),
            read_number(&digits[12..14]),
        ).ok_or_else(MalformedTime::format)
    }

    pub fn encode_generalized_time(self) -> impl encode::Values {
        GeneralizedTime(self).encode()
    }
}


//--- Deref and AsRef

impl ops::Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<DateTime<Utc>> for Time {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}


//--- From

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time(time)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(time: Time) -> Self {
        time.0
    }
}

impl From<SystemTime> for Time {
    fn from(time: SystemTime) -> Self {
        Time(time.into())
    }
}


//--- Add and Sub

impl ops::Add<TimeDelta> for Time {
    type Output = Self;

    fn add(self, duration: TimeDelta) -> Self::Output {
        Self::new(self.0 + duration)
    }
}

impl ops::Sub<TimeDelta> for Time {
    type Output = Self;

    fn sub(self, duration: TimeDelta) -> Self::Output {
        Self::new(self.0 - duration)
    }
}


//--- Display

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}


/// Converts a slice of ASCII digits into a number.
fn read_number(digits: &[u8]) -> u32 {
    digits.iter().fold(0, |res, ch| res * 10 + u32::from(ch - b'0'))
}


//------------ GeneralizedTime -----------------------------------------------

/// A time encoded as a GeneralizedTime.
pub struct GeneralizedTime(Time);

impl PrimitiveContent for GeneralizedTime {
    const TAG: Tag = Tag::GENERALIZED_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        15 // yyyyMMddhhmmssZ
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        write!(
            target, "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            self.0.year(), self.0.month(), self.0.day(),
            self.0.hour(), self.0.minute(), self.0.second()
        )
    }
}


//------------ ValidityOutcome -----------------------------------------------

/// How the validity window of an object relates to the current time.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValidityOutcome {
    /// The window has not started yet.
    TooEarly,

    /// The window has ended.
    Stale,

    /// The current time is inside the window.
    Current,
}


//------------ ValidityWindow ------------------------------------------------

/// The update interval of a manifest.
///
/// The end of the window is never before its start.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidityWindow {
    this_update: Time,
    next_update: Time,
}

impl ValidityWindow {
    /// Creates a window, rejecting one that ends before it starts.
    pub fn new(
        this_update: Time, next_update: Time
    ) -> Result<Self, MalformedTime> {
        if next_update < this_update {
            return Err(MalformedTime::interval())
        }
        Ok(ValidityWindow { this_update, next_update })
    }

    /// Creates a window from the content octets of two GeneralizedTimes.
    pub fn from_generalized_times(
        this_update: &[u8], next_update: &[u8]
    ) -> Result<Self, MalformedTime> {
        Self::new(
            Time::from_generalized_time(this_update)?,
            Time::from_generalized_time(next_update)?,
        )
    }

    pub fn this_update(self) -> Time {
        self.this_update
    }

    pub fn next_update(self) -> Time {
        self.next_update
    }

    /// Classifies the window against the current time.
    pub fn check(self) -> ValidityOutcome {
        self.check_at(Time::now())
    }

    /// Classifies the window against the given time.
    ///
    /// Both ends of the window are inclusive. Since the window has second
    /// precision, so does the comparison.
    pub fn check_at(self, now: Time) -> ValidityOutcome {
        let now = now.truncated();
        if self.this_update > now {
            ValidityOutcome::TooEarly
        }
        else if self.next_update < now {
            ValidityOutcome::Stale
        }
        else {
            ValidityOutcome::Current
        }
    }
}


/// Checks the validity window given by two GeneralizedTime values.
///
/// The arguments are the content octets of the `from` and `until` times.
/// A time that doesn’t parse or a window that ends before it starts is an
/// error no matter what `now` is.
pub fn check_validity(
    from: &[u8], until: &[u8], now: Time
) -> Result<ValidityOutcome, MalformedTime> {
    ValidityWindow::from_generalized_times(from, until).map(|window| {
        window.check_at(now)
    })
}


//------------ MalformedTime -------------------------------------------------

/// A time value or a validity window is malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MalformedTime {
    /// Is this an inverted window rather than a bad time value?
    interval: bool,
}

impl MalformedTime {
    fn format() -> Self {
        MalformedTime { interval: false }
    }

    fn interval() -> Self {
        MalformedTime { interval: true }
    }

    /// Returns whether the error is about an inverted window.
    pub fn is_interval(self) -> bool {
        self.interval
    }
}

impl fmt::Display for MalformedTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(
            if self.interval {
                "bad update interval"
            }
            else {
                "embedded time format invalid"
            }
        )
    }
}

impl error::Error for MalformedTime { }


//============ Tests =========================================================

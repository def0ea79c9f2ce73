//! TLE-style epochs and sidereal time
//!
//! An [`Epoch`] is a calendar year plus a fractional day-of-year, the same
//! representation used in the epoch field of a two-line element set
//! (`YYDDD.DDDDDDDD`). Every other time representation used by the crate
//! (Unix seconds, Julian date, Greenwich sidereal angle, `chrono` and
//! `satkit` instants) is derived from a normalized epoch.

use std::cmp::Ordering;
use std::f64::consts::TAU;
use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Serialize, Serializer};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian date of the Unix epoch (1970-01-01T00:00:00Z)
pub const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Julian date of J2000.0 (2000-01-01T12:00:00 TT)
pub const JD_J2000: f64 = 2_451_545.0;

/// Two-digit TLE years at or above this value belong to the 1900s
const TLE_PIVOT_YEAR: i32 = 57;

/// Point in time as year + fractional day-of-year.
///
/// The day is 1-based: `1.0` is midnight on January 1st. Values built
/// through any constructor are normalized so that
/// `1.0 <= day < days_in_year + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    year: i32,
    day: f64,
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> f64 {
    if is_leap_year(year) {
        366.0
    } else {
        365.0
    }
}

/// Julian date at 00:00 UTC on January 1st of a (proleptic Gregorian) year
fn jd_of_january_first(year: i32) -> f64 {
    let y = (year - 1) as i64;
    let days = 365 * y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400);
    1_721_425.5 + days as f64
}

impl Epoch {
    /// Build an epoch from a year and (possibly out of range) day-of-year.
    pub fn new(year: i32, day: f64) -> Self {
        Self { year, day }.normalize()
    }

    /// Decode the scalar `two_digit_year * 1000 + day` form used in TLEs.
    pub fn from_encoded(value: f64) -> Self {
        let yy = (value / 1000.0).floor();
        let day = value - yy * 1000.0;
        let yy = yy as i32;
        let year = if yy >= TLE_PIVOT_YEAR {
            1900 + yy
        } else {
            2000 + yy
        };
        Self::new(year, day)
    }

    /// Encode back into the scalar TLE form.
    pub fn encoded(&self) -> f64 {
        self.year.rem_euclid(100) as f64 * 1000.0 + self.day
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Fractional, 1-based day of year
    pub fn day_of_year(&self) -> f64 {
        self.day
    }

    /// Roll the day over (or under) year boundaries until it is in range.
    pub fn normalize(self) -> Self {
        let Self { mut year, mut day } = self;
        if !day.is_finite() {
            return self;
        }
        while day >= days_in_year(year) + 1.0 {
            day -= days_in_year(year);
            year += 1;
        }
        while day < 1.0 {
            year -= 1;
            day += days_in_year(year);
        }
        Self { year, day }
    }

    pub fn add_days(self, days: f64) -> Self {
        Self::new(self.year, self.day + days)
    }

    pub fn add_seconds(self, seconds: f64) -> Self {
        self.add_days(seconds / SECONDS_PER_DAY)
    }

    /// Signed number of seconds from `earlier` to `self`
    pub fn seconds_since(&self, earlier: Epoch) -> f64 {
        let mut days = self.day - earlier.day;
        if self.year != earlier.year {
            days += jd_of_january_first(self.year) - jd_of_january_first(earlier.year);
        }
        days * SECONDS_PER_DAY
    }

    /// Seconds since the Unix epoch (leap seconds ignored)
    pub fn to_unix_seconds(&self) -> f64 {
        (jd_of_january_first(self.year) - JD_UNIX_EPOCH) * SECONDS_PER_DAY
            + (self.day - 1.0) * SECONDS_PER_DAY
    }

    pub fn from_unix_seconds(seconds: f64) -> Self {
        let mut year = 1970 + (seconds / (365.2425 * SECONDS_PER_DAY)).floor() as i32;
        let year_start = |y: i32| (jd_of_january_first(y) - JD_UNIX_EPOCH) * SECONDS_PER_DAY;
        while seconds < year_start(year) {
            year -= 1;
        }
        while seconds >= year_start(year + 1) {
            year += 1;
        }
        Self::new(year, 1.0 + (seconds - year_start(year)) / SECONDS_PER_DAY)
    }

    pub fn julian_date(&self) -> f64 {
        jd_of_january_first(self.year) + (self.day - 1.0)
    }

    pub fn from_julian_date(jd: f64) -> Self {
        Self::from_unix_seconds((jd - JD_UNIX_EPOCH) * SECONDS_PER_DAY)
    }

    /// Greenwich mean sidereal angle in radians, in `[0, 2π)` (IAU-82).
    pub fn gmst(&self) -> f64 {
        let t = (self.julian_date() - JD_J2000) / 36_525.0;
        let seconds = -6.2e-6 * t * t * t
            + 0.093_104 * t * t
            + (876_600.0 * 3600.0 + 8_640_184.812_866) * t
            + 67_310.548_41;
        (seconds.to_radians() / 240.0).rem_euclid(TAU)
    }

    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 * 1e-9;
        Self::new(time.year(), time.ordinal() as f64 + seconds / SECONDS_PER_DAY)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let unix = self.to_unix_seconds();
        let secs = unix.floor();
        let nanos = ((unix - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Epoch of a `satkit` instant, such as a parsed TLE epoch
    pub fn from_instant(instant: &satkit::Instant) -> Self {
        Self::from_unix_seconds(instant.as_unixtime())
    }

    /// Convert to a `satkit` instant (UTC).
    pub fn to_instant(&self) -> Option<satkit::Instant> {
        let start = satkit::Instant::from_datetime(self.year, 1, 1, 0, 0, 0.0).ok()?;
        Some(start + satkit::Duration::from_seconds((self.day - 1.0) * SECONDS_PER_DAY))
    }
}

impl PartialOrd for Epoch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.year.cmp(&other.year) {
            Ordering::Equal => self.day.partial_cmp(&other.day),
            ord => Some(ord),
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(time) => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S UTC")),
            None => write!(f, "{:.8}", self.encoded()),
        }
    }
}

impl Serialize for Epoch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_datetime() {
            Some(time) => serializer.serialize_str(&time.to_rfc3339()),
            None => serializer.serialize_f64(self.encoded()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_is_idempotent() {
        for &(year, day) in &[
            (2020, 0.25),
            (2020, 367.5),
            (2021, 365.999),
            (2024, -400.0),
            (1999, 731.0),
        ] {
            let once = Epoch::new(year, day);
            let twice = once.normalize();
            assert_eq!(once, twice);
            assert!(once.day_of_year() >= 1.0);
            assert!(once.day_of_year() < days_in_year(once.year()) + 1.0);
        }
    }

    #[test]
    fn test_leap_year_rollover() {
        // 2024 has 366 days: day 366.5 is still in 2024
        let late = Epoch::new(2024, 366.5);
        assert_eq!(late.year(), 2024);

        let next = late.add_days(1.0);
        assert_eq!(next.year(), 2025);
        assert!((next.day_of_year() - 1.5).abs() < 1e-9);

        // 2023 has only 365 days
        let rolled = Epoch::new(2023, 366.0);
        assert_eq!(rolled.year(), 2024);
        assert!((rolled.day_of_year() - 1.0).abs() < 1e-12);

        let back = Epoch::new(2025, 1.25).add_days(-1.0);
        assert_eq!(back.year(), 2024);
        assert!((back.day_of_year() - 366.25).abs() < 1e-9);
    }

    #[test]
    fn test_unix_round_trip_across_leap_boundary() {
        let mut epoch = Epoch::new(2024, 365.9);
        for _ in 0..48 {
            let back = Epoch::from_unix_seconds(epoch.to_unix_seconds());
            assert_eq!(back.year(), epoch.year());
            let error_s = (back.day_of_year() - epoch.day_of_year()).abs() * SECONDS_PER_DAY;
            assert!(error_s < 1e-3, "round trip error {} s", error_s);
            epoch = epoch.add_seconds(3600.0);
        }
        assert_eq!(epoch.year(), 2025);
    }

    #[test]
    fn test_encoded_round_trip() {
        let epoch = Epoch::from_encoded(20148.21301450);
        assert_eq!(epoch.year(), 2020);
        assert!((epoch.day_of_year() - 148.2130145).abs() < 1e-9);
        assert!((epoch.encoded() - 20148.2130145).abs() < 1e-7);

        let old = Epoch::from_encoded(98_001.5);
        assert_eq!(old.year(), 1998);
    }

    #[test]
    fn test_instant_round_trip() {
        let epoch = Epoch::new(2024, 61.25);
        let instant = epoch.to_instant().unwrap();
        let back = Epoch::from_instant(&instant);
        assert_eq!(back.year(), 2024);
        assert!((back.seconds_since(epoch)).abs() < 1e-3);
    }

    #[test]
    fn test_julian_date_j2000() {
        // 2000-01-01 12:00 is day 1.5
        let epoch = Epoch::new(2000, 1.5);
        assert!((epoch.julian_date() - JD_J2000).abs() < 1e-9);
        let unix = Epoch::new(1970, 1.0);
        assert!(unix.to_unix_seconds().abs() < 1e-6);
    }

    #[test]
    fn test_datetime_conversion() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let epoch = Epoch::from_datetime(time);
        // Jan (31) + Feb (29) + 1 day, plus a quarter day
        assert!((epoch.day_of_year() - 61.25).abs() < 1e-9);
        assert_eq!(epoch.to_datetime().unwrap(), time);
    }

    #[test]
    fn test_gmst_reference_value() {
        // Vallado example 3-5: 1992-08-20 12:14 UT1 -> GMST 152.578788 deg
        let time = Utc.with_ymd_and_hms(1992, 8, 20, 12, 14, 0).unwrap();
        let gmst = Epoch::from_datetime(time).gmst().to_degrees();
        assert!((gmst - 152.578_788).abs() < 1e-3, "gmst {}", gmst);
    }

    #[test]
    fn test_seconds_since_across_years() {
        let a = Epoch::new(2023, 365.5);
        let b = Epoch::new(2024, 1.5);
        assert!((b.seconds_since(a) - SECONDS_PER_DAY).abs() < 1e-6);
        assert!((a.seconds_since(b) + SECONDS_PER_DAY).abs() < 1e-6);
        assert!(a < b);
    }
}

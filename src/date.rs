//! The canonical Subversion timestamp form.
//!
//! `svnserve` exchanges dates as fixed-width UTC strings with six fractional
//! digits (`2026-08-29T12:34:56.123456Z`). Subversion keeps microsecond
//! precision, so this type stores a millisecond base instant plus a residual
//! microsecond count in `0..=999`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::SvnError;

/// An instant with microsecond resolution and a canonical wire string form.
///
/// Ordering and equality are defined by the `(base millis, residual micros)`
/// pair. Values are immutable after construction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SvnDate {
    millis: i64,
    micros: u16,
}

impl SvnDate {
    /// Builds a date from a millisecond base instant and a microsecond count.
    ///
    /// Any microsecond input is accepted; whole milliseconds are carried into
    /// the base instant so the stored residual is always in `0..=999`.
    pub fn from_instant(base_millis: i64, residual_micros: i64) -> Self {
        let carry = residual_micros.div_euclid(1000);
        let micros = residual_micros.rem_euclid(1000) as u16;
        Self {
            millis: base_millis.saturating_add(carry),
            micros,
        }
    }

    /// The current time.
    pub fn now() -> Self {
        let micros = Utc::now().timestamp_micros();
        Self::from_instant(micros.div_euclid(1000), micros.rem_euclid(1000))
    }

    /// The millisecond base instant (milliseconds since the Unix epoch).
    pub fn millis(&self) -> i64 {
        self.millis
    }

    /// The residual microseconds, always in `0..=999`.
    pub fn micros_residual(&self) -> u16 {
        self.micros
    }

    /// Formats this date as `YYYY-MM-DDTHH:MM:SS.mmmuuuZ`.
    ///
    /// The fixed-width form covers years 1 through 9999. Instants outside
    /// that range produce a wider year field that [`SvnDate::parse`] rejects.
    pub fn format(&self) -> String {
        // Out-of-range instants (beyond chrono's ±262k-year span) clamp to
        // the epoch; Subversion dates are well inside the range.
        let dt = DateTime::<Utc>::from_timestamp_millis(self.millis).unwrap_or(DateTime::UNIX_EPOCH);
        format!(
            "{}.{:03}{:03}Z",
            dt.format("%Y-%m-%dT%H:%M:%S"),
            dt.timestamp_subsec_millis(),
            self.micros
        )
    }

    /// Parses the canonical fixed-width form.
    ///
    /// Field widths are fixed (`4-2-2` date, `2-2-2` time, exactly six
    /// fractional digits, literal separators and trailing `Z`); anything else
    /// is an [`SvnError::InvalidDate`], never a partial parse.
    pub fn parse(text: &str) -> Result<Self, SvnError> {
        let bad = || SvnError::InvalidDate(text.to_string());
        let bytes = text.as_bytes();
        if bytes.len() != 27
            || bytes[4] != b'-'
            || bytes[7] != b'-'
            || bytes[10] != b'T'
            || bytes[13] != b':'
            || bytes[16] != b':'
            || bytes[19] != b'.'
            || bytes[26] != b'Z'
        {
            return Err(bad());
        }

        let year = digits(&bytes[0..4]).ok_or_else(bad)?;
        let month = digits(&bytes[5..7]).ok_or_else(bad)?;
        let day = digits(&bytes[8..10]).ok_or_else(bad)?;
        let hour = digits(&bytes[11..13]).ok_or_else(bad)?;
        let minute = digits(&bytes[14..16]).ok_or_else(bad)?;
        let second = digits(&bytes[17..19]).ok_or_else(bad)?;
        let frac = digits(&bytes[20..26]).ok_or_else(bad)?;

        let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).ok_or_else(bad)?;
        let time = date
            .and_hms_opt(hour as u32, minute as u32, second as u32)
            .ok_or_else(bad)?;

        let millis = time.and_utc().timestamp_millis() + (frac / 1000) as i64;
        Ok(Self {
            millis,
            micros: (frac % 1000) as u16,
        })
    }
}

fn digits(bytes: &[u8]) -> Option<u64> {
    let mut n = 0u64;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        n = n * 10 + u64::from(b - b'0');
    }
    Some(n)
}

impl Display for SvnDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl FromStr for SvnDate {
    type Err = SvnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

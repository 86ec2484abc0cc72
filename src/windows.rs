//! Fixed local-time observation windows.
//!
//! Each window is a half-open hour range `[local_start_hour, local_end_hour)` on one local
//! calendar date, expressed against a single fixed UTC offset (no time-zone database).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::errors::StudyConfigError;
use crate::trace::PositionSample;

const SECONDS_PER_HOUR: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationWindow {
    pub name: String,
    pub date: NaiveDate,
    pub local_start_hour: u32,
    /// Exclusive; may be 24 for "until local midnight"
    pub local_end_hour: u32,
    #[serde(serialize_with = "serialize_offset")]
    pub utc_offset: FixedOffset,
}

fn serialize_offset<S: serde::Serializer>(
    offset: &FixedOffset,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&offset.to_string())
}

impl ObservationWindow {
    pub fn new(
        name: &str,
        date: NaiveDate,
        local_start_hour: u32,
        local_end_hour: u32,
        utc_offset: FixedOffset,
    ) -> Result<Self, StudyConfigError> {
        if local_start_hour >= local_end_hour || local_end_hour > 24 {
            return Err(StudyConfigError::InvalidHourRange {
                name: name.to_string(),
                start: local_start_hour,
                end: local_end_hour,
            });
        }
        Ok(Self {
            name: name.to_string(),
            date,
            local_start_hour,
            local_end_hour,
            utc_offset,
        })
    }

    /// Local wall-clock time of an absolute instant
    pub fn local_time(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.utc_offset)
    }

    pub fn matches_time(&self, instant: DateTime<Utc>) -> bool {
        let local = self.local_time(instant);
        if local.date_naive() != self.date {
            return false;
        }
        let second_of_day = local.num_seconds_from_midnight();
        second_of_day >= self.local_start_hour * SECONDS_PER_HOUR
            && second_of_day < self.local_end_hour * SECONDS_PER_HOUR
    }

    pub fn matches(&self, sample: &PositionSample) -> bool {
        self.matches_time(sample.absolute_time)
    }

    /// The window as an absolute UTC interval `[start, end)`
    pub fn utc_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = self.date.and_time(NaiveTime::MIN);
        let local_midnight = self
            .utc_offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc());
        let start = local_midnight + chrono::Duration::hours(i64::from(self.local_start_hour));
        let end = local_midnight + chrono::Duration::hours(i64::from(self.local_end_hour));
        (start, end)
    }

    /// UTC hour-of-day bounds of the window, as the study tables list them
    pub fn utc_hours(&self) -> (u32, u32) {
        let (start, end) = self.utc_range();
        (start.hour(), end.hour())
    }

    /// Reject a window whose listed UTC hours disagree with the converted local hours
    pub fn check_utc_hours(&self, utc_start: u32, utc_end: u32) -> Result<(), StudyConfigError> {
        let (expected_start, expected_end) = self.utc_hours();
        let (start, end) = self.utc_range();
        let whole_hours = start.minute() == 0 && end.minute() == 0;
        if whole_hours && utc_start % 24 == expected_start && utc_end % 24 == expected_end {
            return Ok(());
        }
        Err(StudyConfigError::UtcRangeMismatch {
            name: self.name.clone(),
            given_start: utc_start,
            given_end: utc_end,
            expected_start,
            expected_end,
        })
    }
}

/// Free-function form of `ObservationWindow::matches`
pub fn matches(window: &ObservationWindow, sample: &PositionSample) -> bool {
    window.matches(sample)
}

/// Largest UTC offset in use anywhere (UTC+14)
const MAX_UTC_OFFSET_SECS: i32 = 14 * 3600;

/// Parse `+08:00`, `-0530`, `+8`, `Z` or `UTC`
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, StudyConfigError> {
    let invalid = || StudyConfigError::InvalidUtcOffset(raw.to_string());
    let trimmed = raw.trim();
    let offset = if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        FixedOffset::east_opt(0)
    } else if let Ok(offset) = trimmed.parse::<FixedOffset>() {
        Some(offset)
    } else {
        parse_whole_hours(trimmed)
    }
    .ok_or_else(invalid)?;

    if offset.local_minus_utc().abs() > MAX_UTC_OFFSET_SECS {
        return Err(invalid());
    }
    Ok(offset)
}

/// Signed whole hours with a single digit allowed, e.g. `+8`
fn parse_whole_hours(raw: &str) -> Option<FixedOffset> {
    let (sign, digits) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits.parse().ok()?;
    FixedOffset::east_opt(sign * hours * 3600)
}

/// Parse a study date in `YYYY-MM-DD` or `YYYY.MM.DD` form
pub fn parse_study_date(raw: &str) -> Result<NaiveDate, StudyConfigError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y.%m.%d"))
        .map_err(|_| StudyConfigError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sgt() -> FixedOffset {
        parse_utc_offset("+08:00").unwrap()
    }

    fn morning_window() -> ObservationWindow {
        // 09:00-12:00 SGT == 01:00-04:00 UTC
        let date = NaiveDate::from_ymd_opt(2025, 2, 8).unwrap();
        ObservationWindow::new("morning", date, 9, 12, sgt()).unwrap()
    }

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 8, h, m, s).unwrap()
    }

    #[test]
    fn test_window_is_half_open() {
        let window = morning_window();
        assert!(window.matches_time(utc(1, 0, 0)));
        assert!(window.matches_time(utc(3, 59, 59)));
        assert!(!window.matches_time(utc(4, 0, 0)));
        assert!(!window.matches_time(utc(0, 59, 59)));
    }

    #[test]
    fn test_window_requires_local_date() {
        let window = morning_window();
        // Same UTC wall-clock hour, next day
        let next_day = Utc.with_ymd_and_hms(2025, 2, 9, 2, 0, 0).unwrap();
        assert!(!window.matches_time(next_day));
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 07:00-08:00 SGT on Feb 8 is 23:00-24:00 UTC on Feb 7
        let date = NaiveDate::from_ymd_opt(2025, 2, 8).unwrap();
        let window = ObservationWindow::new("dawn", date, 7, 8, sgt()).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 2, 7, 23, 30, 0).unwrap();
        assert!(window.matches_time(instant));
        assert!(!window.matches_time(utc(23, 30, 0)));
    }

    #[test]
    fn test_utc_conversion() {
        let window = morning_window();
        assert_eq!(window.utc_range(), (utc(1, 0, 0), utc(4, 0, 0)));
        assert_eq!(window.utc_hours(), (1, 4));
        assert!(window.check_utc_hours(1, 4).is_ok());
        assert!(matches!(
            window.check_utc_hours(9, 12),
            Err(StudyConfigError::UtcRangeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_hour_ranges() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 8).unwrap();
        assert!(ObservationWindow::new("x", date, 12, 9, sgt()).is_err());
        assert!(ObservationWindow::new("x", date, 9, 9, sgt()).is_err());
        assert!(ObservationWindow::new("x", date, 20, 25, sgt()).is_err());
        assert!(ObservationWindow::new("x", date, 20, 24, sgt()).is_ok());
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(sgt().local_minus_utc(), 8 * 3600);
        assert_eq!(
            parse_utc_offset("-05:30").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert_eq!(parse_utc_offset("+0800").unwrap(), sgt());
        assert_eq!(parse_utc_offset("+8").unwrap(), sgt());
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(parse_utc_offset("+05:45").unwrap().local_minus_utc(), 5 * 3600 + 45 * 60);
        assert_eq!(parse_utc_offset("-5").unwrap().local_minus_utc(), -5 * 3600);
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("08:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("+15").is_err());
        assert!(parse_utc_offset("+8h").is_err());
    }

    #[test]
    fn test_parse_study_date_accepts_both_forms() {
        let expected = NaiveDate::from_ymd_opt(2025, 2, 8).unwrap();
        assert_eq!(parse_study_date("2025-02-08").unwrap(), expected);
        assert_eq!(parse_study_date("2025.02.08").unwrap(), expected);
        assert!(parse_study_date("08/02/2025").is_err());
    }
}

//! Due-date calculation for recurring rules.
//!
//! Everything here is pure. Monthly and yearly steps clamp to the last valid
//! day of the target month when the day-of-month does not exist there
//! (Jan 31 → Feb 29 in a leap year, Feb 29 → Feb 28 the following year).
//! Rules advance anchored on their start day so a rule started on the 31st
//! returns to the 31st in long months instead of drifting.

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Storage and wire format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How often a recurring rule fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every calendar day
    Daily,
    /// Every seven days
    Weekly,
    /// Same day of month, every month
    Monthly,
    /// Same day and month, every year
    Yearly,
}

impl Frequency {
    /// All supported frequencies
    pub const ALL: [Self; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];

    /// Lowercase name as stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(Error::InvalidFrequency {
                value: s.to_string(),
            }),
        }
    }
}

/// Returns the next occurrence after `date`.
///
/// Equivalent to [`advance_anchored`] with the anchor at `date`'s own day.
pub fn advance(date: NaiveDate, frequency: Frequency) -> Result<NaiveDate> {
    advance_anchored(date, frequency, date.day())
}

/// Returns the next occurrence after `date`, aiming monthly and yearly steps at
/// `anchor_day` and clamping to the end of shorter months.
///
/// # Errors
/// `InvalidDate` when `anchor_day` is not in `1..=31` or the result falls
/// outside the representable calendar.
pub fn advance_anchored(date: NaiveDate, frequency: Frequency, anchor_day: u32) -> Result<NaiveDate> {
    if !(1..=31).contains(&anchor_day) {
        return Err(Error::InvalidDate {
            value: format!("anchor day {anchor_day}"),
        });
    }

    let out_of_range = || Error::InvalidDate {
        value: format!("{} + 1 {frequency} cycle", date.format(DATE_FORMAT)),
    };

    match frequency {
        Frequency::Daily => date.checked_add_days(Days::new(1)).ok_or_else(out_of_range),
        Frequency::Weekly => date.checked_add_days(Days::new(7)).ok_or_else(out_of_range),
        Frequency::Monthly => {
            let first = first_of_month(date).ok_or_else(out_of_range)?;
            let target = first
                .checked_add_months(Months::new(1))
                .ok_or_else(out_of_range)?;
            with_clamped_day(target, anchor_day).ok_or_else(out_of_range)
        }
        Frequency::Yearly => {
            let first = first_of_month(date).ok_or_else(out_of_range)?;
            let target = first
                .checked_add_months(Months::new(12))
                .ok_or_else(out_of_range)?;
            with_clamped_day(target, anchor_day).ok_or_else(out_of_range)
        }
    }
}

/// Number of days in the month containing `date`.
#[must_use]
pub fn days_in_month(date: NaiveDate) -> u32 {
    first_of_month(date)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

fn with_clamped_day(first_of_target: NaiveDate, anchor_day: u32) -> Option<NaiveDate> {
    let day = anchor_day.min(days_in_month(first_of_target));
    first_of_target.with_day(day)
}

/// Parses an ISO calendar date (`YYYY-MM-DD`). Full ISO-8601 timestamps are
/// accepted too; their date part is used.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| Error::InvalidDate {
            value: value.to_string(),
        })
}

/// Parses an ISO-8601 instant. Bare dates are read as midnight UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(start_of_day)
        .map_err(|_| Error::InvalidDate {
            value: value.to_string(),
        })
}

/// Midnight UTC at the start of `date`.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Formats a date for storage.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Formats an instant for storage (RFC 3339, second precision, `Z` suffix).
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// A cycle dated `due` is due at `now` once its start of day has been reached.
#[must_use]
pub fn is_due(due: NaiveDate, now: DateTime<Utc>) -> bool {
    start_of_day(due) <= now
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_daily_and_weekly() {
        assert_eq!(advance(d(2024, 2, 28), Frequency::Daily).unwrap(), d(2024, 2, 29));
        assert_eq!(advance(d(2024, 12, 31), Frequency::Daily).unwrap(), d(2025, 1, 1));
        assert_eq!(advance(d(2024, 12, 28), Frequency::Weekly).unwrap(), d(2025, 1, 4));
    }

    #[test]
    fn test_monthly_same_day() {
        assert_eq!(advance(d(2024, 1, 1), Frequency::Monthly).unwrap(), d(2024, 2, 1));
        assert_eq!(advance(d(2024, 12, 15), Frequency::Monthly).unwrap(), d(2025, 1, 15));
    }

    #[test]
    fn test_monthly_clamps_to_last_day() {
        assert_eq!(advance(d(2024, 1, 31), Frequency::Monthly).unwrap(), d(2024, 2, 29));
        assert_eq!(advance(d(2023, 1, 31), Frequency::Monthly).unwrap(), d(2023, 2, 28));
        assert_eq!(advance(d(2024, 3, 31), Frequency::Monthly).unwrap(), d(2024, 4, 30));
    }

    #[test]
    fn test_anchored_monthly_recovers_day() {
        let feb = advance_anchored(d(2024, 1, 31), Frequency::Monthly, 31).unwrap();
        assert_eq!(feb, d(2024, 2, 29));
        let mar = advance_anchored(feb, Frequency::Monthly, 31).unwrap();
        assert_eq!(mar, d(2024, 3, 31));
    }

    #[test]
    fn test_yearly_leap_day_clamps_to_feb_28() {
        assert_eq!(advance(d(2024, 2, 29), Frequency::Yearly).unwrap(), d(2025, 2, 28));

        let mut date = d(2024, 2, 29);
        let mut seen = Vec::new();
        for _ in 0..4 {
            date = advance_anchored(date, Frequency::Yearly, 29).unwrap();
            seen.push(date);
        }
        assert_eq!(
            seen,
            vec![d(2025, 2, 28), d(2026, 2, 28), d(2027, 2, 28), d(2028, 2, 29)]
        );
    }

    #[test]
    fn test_advance_is_deterministic() {
        let first = advance(d(2024, 2, 29), Frequency::Yearly).unwrap();
        let second = advance(d(2024, 2, 29), Frequency::Yearly).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_range_fails_loudly() {
        assert!(matches!(
            advance(NaiveDate::MAX, Frequency::Daily),
            Err(Error::InvalidDate { .. })
        ));
        assert!(matches!(
            advance_anchored(d(2024, 1, 1), Frequency::Monthly, 0),
            Err(Error::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("Monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!(" weekly ".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!(matches!(
            "fortnightly".parse::<Frequency>(),
            Err(Error::InvalidFrequency { .. })
        ));
        for frequency in Frequency::ALL {
            assert_eq!(frequency.as_str().parse::<Frequency>().unwrap(), frequency);
        }
    }

    #[test]
    fn test_parse_date_and_instant() {
        assert_eq!(parse_date("2024-04-15").unwrap(), d(2024, 4, 15));
        assert_eq!(parse_date("2024-04-15T23:00:00Z").unwrap(), d(2024, 4, 15));
        assert!(parse_date("15/04/2024").is_err());

        let instant = parse_instant("2024-04-15").unwrap();
        assert_eq!(format_instant(instant), "2024-04-15T00:00:00Z");
        let offset = parse_instant("2024-04-15T02:00:00+02:00").unwrap();
        assert_eq!(format_instant(offset), "2024-04-15T00:00:00Z");
    }

    #[test]
    fn test_is_due() {
        let now = parse_instant("2024-04-15T10:00:00Z").unwrap();
        assert!(is_due(d(2024, 4, 15), now));
        assert!(is_due(d(2024, 1, 1), now));
        assert!(!is_due(d(2024, 4, 16), now));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(d(2024, 2, 10)), 29);
        assert_eq!(days_in_month(d(2023, 2, 10)), 28);
        assert_eq!(days_in_month(d(2024, 12, 1)), 31);
    }

    fn date_strategy() -> impl Strategy<Value = NaiveDate> {
        (1900i32..2200, 1u32..=12, 1u32..=31).prop_map(|(y, m, day)| {
            let first = NaiveDate::from_ymd_opt(y, m, 1).unwrap();
            first.with_day(day.min(days_in_month(first))).unwrap()
        })
    }

    fn frequency_strategy() -> impl Strategy<Value = Frequency> {
        prop::sample::select(Frequency::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_double_advance_strictly_postdates(date in date_strategy(), frequency in frequency_strategy()) {
            let once = advance(date, frequency).unwrap();
            let twice = advance(once, frequency).unwrap();
            prop_assert!(once > date);
            prop_assert!(twice > once);
        }

        #[test]
        fn prop_anchored_advance_stays_in_next_period(
            date in date_strategy(),
            frequency in frequency_strategy(),
            anchor in 1u32..=31,
        ) {
            let next = advance_anchored(date, frequency, anchor).unwrap();
            prop_assert!(next > date);
            match frequency {
                Frequency::Daily => prop_assert_eq!((next - date).num_days(), 1),
                Frequency::Weekly => prop_assert_eq!((next - date).num_days(), 7),
                Frequency::Monthly => {
                    let months = (next.year() - date.year()) * 12
                        + i32::try_from(next.month()).unwrap()
                        - i32::try_from(date.month()).unwrap();
                    prop_assert_eq!(months, 1);
                    prop_assert_eq!(next.day(), anchor.min(days_in_month(next)));
                }
                Frequency::Yearly => {
                    prop_assert_eq!(next.year(), date.year() + 1);
                    prop_assert_eq!(next.month(), date.month());
                }
            }
        }

        #[test]
        fn prop_repeated_application_terminates_past_now(
            date in date_strategy(),
            frequency in frequency_strategy(),
            horizon_days in 0u64..2000,
        ) {
            let now = start_of_day(date.checked_add_days(Days::new(horizon_days)).unwrap());
            let mut cursor = date;
            let mut steps = 0u64;
            while is_due(cursor, now) {
                cursor = advance(cursor, frequency).unwrap();
                steps += 1;
                prop_assert!(steps <= horizon_days + 1);
            }
            prop_assert!(!is_due(cursor, now));
        }
    }
}

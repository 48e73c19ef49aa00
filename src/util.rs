use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{AppError, AppResult};

pub const DISPLAY_DATE_FMT: &str = "%d.%m.%Y";
pub const DISPLAY_TIME_FMT: &str = "%H:%M";
const REQUEST_DATE_FMT: &str = "%Y-%m-%d";

/// A school holiday as reported by the session handshake.
///
/// A date is inside the interval only if it lies strictly after `start` and
/// strictly before `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayInterval {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: NaiveDateTime,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: NaiveDateTime,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
}

impl HolidayInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let at = date.and_time(NaiveTime::MIN);
        self.start < at && self.end > at
    }
}

pub fn encode_request_date(date: NaiveDate) -> String {
    date.format(REQUEST_DATE_FMT).to_string()
}

/// Decodes an `HMM`/`HHMM` time code into `HH:MM`.
pub fn decode_time(code: i64) -> AppResult<String> {
    if !(100..=9999).contains(&code) {
        return Err(AppError::InvalidInput(format!("time code {} is not HMM or HHMM", code)));
    }

    let (hour, minute) = (code / 100, code % 100);
    if NaiveTime::from_hms_opt(hour as u32, minute as u32, 0).is_none() {
        return Err(AppError::InvalidInput(format!("time code {} is out of range", code)));
    }

    Ok(format!("{:02}:{:02}", hour, minute))
}

/// Decodes a `YYYYMMDD` date code into `DD.MM.YYYY`.
pub fn decode_date(code: i64) -> AppResult<String> {
    if !(10_000_000..=99_999_999).contains(&code) {
        return Err(AppError::InvalidInput(format!("date code {} is not YYYYMMDD", code)));
    }

    let (year, month, day) = (code / 10_000, (code / 100) % 100, code % 100);
    let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).ok_or_else(|| {
        AppError::InvalidInput(format!("date code {} is not a calendar date", code))
    })?;

    Ok(date.format(DISPLAY_DATE_FMT).to_string())
}

pub fn parse_display_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, DISPLAY_DATE_FMT)
        .map_err(|e| AppError::InvalidInput(format!("date {:?}: {}", date, e)))
}

/// Combines a display date and display time into a comparable instant.
pub fn parse_display_instant(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, DISPLAY_DATE_FMT).ok()?;
    let time = NaiveTime::parse_from_str(time, DISPLAY_TIME_FMT).ok()?;
    Some(date.and_time(time))
}

pub fn is_in_holiday(date: &str, holidays: Option<&[HolidayInterval]>) -> AppResult<bool> {
    let holidays = holidays.ok_or_else(|| AppError::invalid_input("holiday list is missing"))?;
    let date = parse_display_date(date)?;

    Ok(holidays.iter().any(|h| h.contains(date)))
}

/// The current calendar date in the school's timezone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_local());
    }
    NaiveDate::parse_from_str(s, REQUEST_DATE_FMT)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Code(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", s))),
        Raw::Code(code) => {
            let (year, month, day) = (code / 10_000, (code / 100) % 100, code % 100);
            NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                .map(|d| d.and_time(NaiveTime::MIN))
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date code {}", code)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn christmas() -> HolidayInterval {
        serde_json::from_value(json!({ "start": "2024-12-23", "end": "2025-01-06" })).unwrap()
    }

    #[test]
    fn time_codes() {
        assert_eq!(decode_time(800).unwrap(), "08:00");
        assert_eq!(decode_time(1430).unwrap(), "14:30");
        assert_eq!(decode_time(945).unwrap(), "09:45");
    }

    #[test]
    fn malformed_time_codes_are_rejected() {
        assert!(matches!(decode_time(95), Err(AppError::InvalidInput(_))));
        assert!(matches!(decode_time(12345), Err(AppError::InvalidInput(_))));
        assert!(matches!(decode_time(875), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn date_codes() {
        assert_eq!(decode_date(20240115).unwrap(), "15.01.2024");
        assert!(decode_date(2024011).is_err());
        assert!(decode_date(20241341).is_err());
    }

    #[test]
    fn request_date() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(encode_request_date(d), "2024-03-07");
    }

    #[test]
    fn holiday_containment() {
        let holidays = [christmas()];
        assert!(is_in_holiday("25.12.2024", Some(&holidays[..])).unwrap());
        assert!(!is_in_holiday("10.01.2025", Some(&holidays[..])).unwrap());
    }

    #[test]
    fn holiday_bounds_are_exclusive() {
        let holidays = [christmas()];
        assert!(!is_in_holiday("23.12.2024", Some(&holidays[..])).unwrap());
        assert!(!is_in_holiday("06.01.2025", Some(&holidays[..])).unwrap());
    }

    #[test]
    fn missing_holidays_is_an_error() {
        assert!(matches!(
            is_in_holiday("25.12.2024", None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn holiday_timestamp_shapes() {
        let h: HolidayInterval = serde_json::from_value(json!({
            "id": 7,
            "name": "Winter",
            "longName": "Winterferien",
            "start": "2025-02-03T00:00:00",
            "end": 20250207
        }))
        .unwrap();
        assert_eq!(h.long_name.as_deref(), Some("Winterferien"));
        assert!(h.contains(NaiveDate::from_ymd_opt(2025, 2, 5).unwrap()));
    }
}

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::error::AppError;

pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

/// Falls back to the Unix epoch for values chrono cannot represent.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(|| {
        tracing::warn!(millis = ms, "stored timestamp out of range, using epoch");
        DateTime::default()
    })
}

/// UTC midnight of the calendar day containing `date`.
pub fn day_start(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.date_naive().and_time(chrono::NaiveTime::MIN))
}

/// Inclusive bounds `[midnight, midnight + 24h - 1ns]` of the UTC day containing `date`.
///
/// Fails with `BadRequest` when the next midnight is past chrono's last instant.
pub fn day_window(date: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let start = day_start(date);
    let end = start
        .checked_add_signed(Duration::days(1))
        .and_then(|next| next.checked_sub_signed(Duration::nanoseconds(1)))
        .ok_or_else(|| {
            AppError::BadRequest(format!("date {} is out of range", start.date_naive()))
        })?;
    Ok((start, end))
}

pub fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_window_normalizes_to_utc_midnight() {
        let t = Utc.with_ymd_and_hms(2025, 1, 15, 17, 42, 3).unwrap();
        let (start, end) = day_window(t).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0).unwrap() - Duration::nanoseconds(1)
        );
    }

    #[test]
    fn test_day_window_rejects_last_representable_day() {
        let err = day_window(date_to_utc(NaiveDate::MAX)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(day_window(DateTime::<Utc>::MAX_UTC).is_err());
        assert!(day_window(DateTime::<Utc>::MIN_UTC).is_ok());
    }

    #[test]
    fn test_from_millis_out_of_range_falls_back_to_epoch() {
        assert_eq!(from_millis(i64::MAX), DateTime::<Utc>::default());
        assert_eq!(from_millis(i64::MIN).timestamp(), 0);
    }

    #[test]
    fn test_millis_roundtrip_keeps_millisecond_precision() {
        let t = Utc.with_ymd_and_hms(2025, 1, 15, 1, 2, 3).unwrap() + Duration::milliseconds(456);
        assert_eq!(from_millis(to_millis(t)), t);
    }
}

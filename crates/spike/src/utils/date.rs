// Calendar helpers for device binding and entitlement expiry.

use chrono::{DateTime, FixedOffset, Months, NaiveDate, Offset, Utc};

/// The calendar day `now` falls on at a fixed UTC offset.
///
/// Offsets outside ±24h are treated as UTC.
pub fn today_at_offset(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    let offset = offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset).date_naive()
}

/// `from + months` calendar months, clamping to the last day of the target
/// month (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(from: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    from.checked_add_months(Months::new(months))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_today_utc() {
        let now = at(2026, 3, 1, 23);
        assert_eq!(today_at_offset(now, 0), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_today_with_positive_offset_rolls_over() {
        // 23:00 UTC is already the next day at UTC+8.
        let now = at(2026, 3, 1, 23);
        assert_eq!(today_at_offset(now, 8 * 60), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_today_with_negative_offset() {
        let now = at(2026, 3, 1, 2);
        assert_eq!(today_at_offset(now, -5 * 60), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }

    #[test]
    fn test_out_of_range_offset_is_utc() {
        let now = at(2026, 3, 1, 23);
        assert_eq!(today_at_offset(now, 100_000), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months(at(2026, 1, 31, 12), 1), Some(at(2026, 2, 28, 12)));
        assert_eq!(add_months(at(2028, 1, 31, 12), 1), Some(at(2028, 2, 29, 12)));
        assert_eq!(add_months(at(2026, 3, 15, 0), 12), Some(at(2027, 3, 15, 0)));
    }
}

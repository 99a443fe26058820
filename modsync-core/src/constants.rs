use chrono::{NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

/// All schedule times are wall-clock times in this zone.
pub const TIMEZONE: Tz = chrono_tz::Europe::Moscow;

/// The upstream id_token lives for 12 hours.
pub const SESSION_TTL_HOURS: i64 = 12;

/// Appended to logins that were given without a domain.
pub const EMAIL_DOMAIN: &str = "@edu.narfu.ru";

/// How long the service stays offline before trying the network again.
pub const OFFLINE_RETRY_SECS: i64 = 300;

/// Start times of the numbered class slots ("first class", "second class", ...).
pub const STUDY_SLOTS: [(u32, u32); 7] = [
    (8, 20),
    (10, 10),
    (12, 0),
    (14, 30),
    (16, 15),
    (18, 0),
    (19, 40),
];

/// 1-based slot number for a start time, or -1 if it matches no known slot.
pub fn slot_number(start: NaiveTime) -> i32 {
    use chrono::Timelike;

    STUDY_SLOTS
        .iter()
        .position(|&(h, m)| start.hour() == h && start.minute() == m && start.second() == 0)
        .map(|i| i as i32 + 1)
        .unwrap_or(-1)
}

/// Attach the schedule timezone to a wall-clock date and time.
pub fn localize(date: NaiveDate, time: NaiveTime) -> chrono::DateTime<Tz> {
    let naive = date.and_time(time);
    TIMEZONE
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| TIMEZONE.from_utc_datetime(&naive))
}

/// Today's date in the schedule timezone.
pub fn today() -> NaiveDate {
    chrono::Utc::now().with_timezone(&TIMEZONE).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_number_known_and_unknown() {
        assert_eq!(slot_number(NaiveTime::from_hms_opt(8, 20, 0).unwrap()), 1);
        assert_eq!(slot_number(NaiveTime::from_hms_opt(19, 40, 0).unwrap()), 7);
        assert_eq!(slot_number(NaiveTime::from_hms_opt(9, 0, 0).unwrap()), -1);
    }

    #[test]
    fn test_localize_uses_moscow_offset() {
        let dt = localize(
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
            NaiveTime::from_hms_opt(8, 20, 0).unwrap(),
        );
        assert_eq!(dt.to_rfc3339(), "2024-07-02T08:20:00+03:00");
    }
}

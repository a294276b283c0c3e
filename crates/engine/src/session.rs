use crate::error::EngineError;
use analytics::SessionWindow;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use configuration::OrbConfig;

/// Moves a weekend instant back to the preceding Friday (same time of day).
pub fn last_trading_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    match now.weekday() {
        Weekday::Sat => now - Duration::days(1),
        Weekday::Sun => now - Duration::days(2),
        _ => now,
    }
}

/// The regular session containing `latest`, resolved in the configured exchange timezone.
///
/// The trading date is `latest`'s local date; open and close are the configured local
/// times on that date, converted to UTC.
pub fn session_window(latest: DateTime<Utc>, config: &OrbConfig) -> Result<SessionWindow, EngineError> {
    let tz = config.timezone()?;
    let date = latest.with_timezone(&tz).date_naive();
    Ok(SessionWindow {
        open: local_instant(&tz, date, config.session_open)?,
        close: local_instant(&tz, date, config.session_close)?,
    })
}

fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, EngineError> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| EngineError::Session {
            date,
            time,
            timezone: tz.name().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekends_roll_back_to_friday() {
        let saturday = Utc.with_ymd_and_hms(2024, 6, 8, 15, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2024, 6, 9, 15, 0, 0).unwrap();
        let friday = Utc.with_ymd_and_hms(2024, 6, 7, 15, 0, 0).unwrap();
        assert_eq!(last_trading_instant(saturday), friday);
        assert_eq!(last_trading_instant(sunday), friday);
        assert_eq!(last_trading_instant(friday), friday);
    }

    #[test]
    fn new_york_session_tracks_daylight_saving() {
        let config = OrbConfig::default();

        let summer = session_window(Utc.with_ymd_and_hms(2024, 7, 9, 18, 0, 0).unwrap(), &config).unwrap();
        assert_eq!(summer.open, Utc.with_ymd_and_hms(2024, 7, 9, 13, 30, 0).unwrap());
        assert_eq!(summer.close, Utc.with_ymd_and_hms(2024, 7, 9, 20, 0, 0).unwrap());

        let winter = session_window(Utc.with_ymd_and_hms(2024, 1, 9, 18, 0, 0).unwrap(), &config).unwrap();
        assert_eq!(winter.open, Utc.with_ymd_and_hms(2024, 1, 9, 14, 30, 0).unwrap());
    }

    #[test]
    fn trading_date_is_taken_in_exchange_time() {
        // 02:00 UTC on the 10th is still the evening of the 9th in New York.
        let late = Utc.with_ymd_and_hms(2024, 7, 10, 2, 0, 0).unwrap();
        let window = session_window(late, &OrbConfig::default()).unwrap();
        assert_eq!(window.open, Utc.with_ymd_and_hms(2024, 7, 9, 13, 30, 0).unwrap());
    }
}

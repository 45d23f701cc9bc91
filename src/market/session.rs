//! Regular trading sessions per exchange.
//!
//! Static calendar: weekdays only, no holidays.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

use crate::market::Exchange;

/// Session state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Session {
    Regular,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketStatus {
    pub exchange: Exchange,
    pub is_open: bool,
    pub session: Session,
    pub timezone: &'static str,
    pub server_time_utc: DateTime<Utc>,
    pub local_exchange_time: String,
}

struct Hours {
    tz: Tz,
    open: (u32, u32),
    close: (u32, u32),
}

fn hours(exchange: Exchange) -> Hours {
    match exchange {
        Exchange::Nse | Exchange::Bse => Hours {
            tz: chrono_tz::Asia::Kolkata,
            open: (9, 15),
            close: (15, 30),
        },
        Exchange::Nasdaq => Hours {
            tz: chrono_tz::America::New_York,
            open: (9, 30),
            close: (16, 0),
        },
    }
}

fn time_of(hm: (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(hm.0, hm.1, 0).unwrap_or_default()
}

/// Session for `exchange` at `now`. Open and close minutes are inclusive.
pub fn session_at(exchange: Exchange, now: DateTime<Utc>) -> MarketStatus {
    let hours = hours(exchange);
    let local = now.with_timezone(&hours.tz);

    let weekday = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
    let time = local.time();
    let is_open = weekday && time >= time_of(hours.open) && time <= time_of(hours.close);

    MarketStatus {
        exchange,
        is_open,
        session: if is_open { Session::Regular } else { Session::Closed },
        timezone: hours.tz.name(),
        server_time_utc: now,
        local_exchange_time: local.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_nse_open_on_weekday() {
        // 2024-03-04 is a Monday; 05:00 UTC = 10:30 IST
        let status = session_at(Exchange::Nse, utc(2024, 3, 4, 5, 0));
        assert!(status.is_open);
        assert_eq!(status.session, Session::Regular);
        assert_eq!(status.timezone, "Asia/Kolkata");
        assert!(status.local_exchange_time.starts_with("2024-03-04T10:30:00+05:30"));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        // 09:15 IST and 15:30 IST
        assert!(session_at(Exchange::Bse, utc(2024, 3, 4, 3, 45)).is_open);
        assert!(session_at(Exchange::Bse, utc(2024, 3, 4, 10, 0)).is_open);
        assert!(!session_at(Exchange::Bse, utc(2024, 3, 4, 10, 1)).is_open);
    }

    #[test]
    fn test_nasdaq_respects_dst() {
        // July: EDT (UTC-4), 13:30 UTC = 09:30 local
        assert!(session_at(Exchange::Nasdaq, utc(2024, 7, 1, 13, 30)).is_open);
        // January: EST (UTC-5), 14:00 UTC = 09:00 local
        assert!(!session_at(Exchange::Nasdaq, utc(2024, 1, 8, 14, 0)).is_open);
    }

    #[test]
    fn test_closed_on_weekend() {
        // Saturday midday in New York
        let status = session_at(Exchange::Nasdaq, utc(2024, 3, 9, 17, 0));
        assert!(!status.is_open);
        assert_eq!(status.session, Session::Closed);
    }
}

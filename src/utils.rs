use chrono::{DateTime, Duration, NaiveDate, Utc};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses the value of an `<input type="date">` (`YYYY-MM-DD`).
pub fn date_from_input(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Relative-time phrase for the last report of a device, e.g. "hace 5 min".
pub fn hace(since: Duration) -> String {
    let secs = since.num_seconds().max(0);
    if secs < 60 {
        format!("hace {secs} s")
    } else if secs < 3600 {
        format!("hace {} min", secs / 60)
    } else if secs < 86400 {
        format!("hace {} h", secs / 3600)
    } else {
        format!("hace {} d", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_input_parses_iso_dates() {
        assert_eq!(
            date_from_input("2026-02-28"),
            NaiveDate::from_ymd_opt(2026, 2, 28)
        );
        assert_eq!(date_from_input("28/02/2026"), None);
        assert_eq!(date_from_input(""), None);
    }

    #[test]
    fn relative_phrases_pick_the_coarsest_unit() {
        assert_eq!(hace(Duration::seconds(12)), "hace 12 s");
        assert_eq!(hace(Duration::seconds(150)), "hace 2 min");
        assert_eq!(hace(Duration::hours(5)), "hace 5 h");
        assert_eq!(hace(Duration::days(3)), "hace 3 d");
        // negative skew clamps to zero instead of producing nonsense
        assert_eq!(hace(Duration::seconds(-30)), "hace 0 s");
    }
}

use chrono::{DateTime, SecondsFormat, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Timestamps are stored as RFC 3339 text with millisecond precision so that
/// lexical order matches chronological order on both engines.
pub fn to_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    to_iso(Utc::now())
}

pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_reasonable() {
        let a = now_ms();
        assert!(a > 1_500_000_000_000); // after 2017
        assert!(a < 4_100_000_000_000); // before year ~2100
    }

    #[test]
    fn iso_sorts_chronologically() {
        let early = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let late = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert!(to_iso(early) < to_iso(late));
        assert!(to_iso(early).ends_with('Z'));
    }

    #[test]
    fn parse_round_trips() {
        let at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_456).unwrap();
        assert_eq!(parse_iso(&to_iso(at)), Some(at));
        assert_eq!(parse_iso("ontem"), None);
    }
}

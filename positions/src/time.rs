use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

/// Normalizes a timestamp that may arrive as an epoch-seconds number,
/// epoch-milliseconds number, or an ISO-8601 string, to a timezone-aware
/// `DateTime<Utc>` (§4.1 tie-break rule). Epoch magnitudes above
/// 10^12 are treated as milliseconds, otherwise seconds.
pub fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::Number(n) => {
            let raw = n.as_f64()?;
            if raw.abs() >= 1e12 {
                Utc.timestamp_millis_opt(raw as i64).single()
            } else {
                Utc.timestamp_opt(raw as i64, 0).single()
            }
        }
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_epoch_seconds() {
        let ts = parse_timestamp(&json!(1_700_000_000)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_epoch_millis() {
        let ts = parse_timestamp(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_iso8601() {
        let ts = parse_timestamp(&json!("2026-07-28T09:15:00Z")).unwrap();
        assert_eq!(ts.timestamp(), 1785230100);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(&json!("not a date")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }
}

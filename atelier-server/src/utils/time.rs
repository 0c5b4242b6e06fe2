//! Time helpers
//!
//! All timestamps flow through the system as `i64` unix millis; formatting
//! to ISO strings happens only at the edges (audit notes, API payloads).

use chrono::{TimeZone, Utc};

/// Current unix time in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render unix millis as a compact ISO-8601 UTC string
pub fn to_iso(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_iso() {
        assert_eq!(to_iso(0), "1970-01-01T00:00:00Z");
        assert_eq!(to_iso(1_700_000_000_000), "2023-11-14T22:13:20Z");
    }
}

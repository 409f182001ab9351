use chrono::Utc;

/// Current UTC time as a naive ISO-8601 string with microseconds,
/// e.g. `2026-01-02T03:04:05.123456`.
pub fn utc_timestamp() -> String {
    Utc::now()
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an RFC 3339 / ISO 8601 timestamp, tolerating a trailing `Z`.
///
/// Returns `None` for anything unparseable; callers decide the fallback.
/// Posts carry `createdAt` written by arbitrary clients, so garbage here
/// is expected and must not abort a run.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Current time formatted the way AT Protocol records expect it,
/// e.g. `2026-08-29T12:00:00Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fixed sentinel for posts missing both `createdAt` and `indexedAt`.
///
/// Deliberately the Unix epoch rather than "now": a post with no usable
/// timestamp must always sort oldest, and must sort the same way on every
/// run. Deriving a fresh "now" would let such a post jump around in the
/// ordering between runs.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

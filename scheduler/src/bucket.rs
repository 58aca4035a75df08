use chrono::{DateTime, Utc};

/// Truncates a timestamp down to its enclosing second (§4.7 step 1): all ticks
/// sharing a second-bucket drive market-data updates individually, but the
/// strategy graph is traversed at most once per bucket, using the bucket's
/// last tick as the "current" tick.
pub fn bucket_of(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp - chrono::Duration::nanoseconds(timestamp.timestamp_subsec_nanos() as i64)
}

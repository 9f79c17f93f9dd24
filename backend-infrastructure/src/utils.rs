use chrono::{DateTime, Utc};
use time::OffsetDateTime;

pub fn chrono_to_offset(ts: DateTime<Utc>) -> OffsetDateTime {
    let nanos = i128::from(ts.timestamp_millis()).saturating_mul(1_000_000);
    OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn offset_to_chrono(ts: OffsetDateTime) -> DateTime<Utc> {
    let millis = (ts.unix_timestamp_nanos() / 1_000_000) as i64;
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

//! Timestamp codecs shared by every store backend.
//!
//! File mtimes are persisted as whole seconds plus subsecond nanoseconds, so
//! every time the filesystem can report round-trips exactly. Bookkeeping
//! timestamps (`created_at`, `updated_at`) come from the clock and fit in a
//! single nanosecond count.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::error::TypeError;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert a timestamp to nanoseconds since the Unix epoch.
///
/// Only covers 1677-2262; use [`to_unix_parts`] for file mtimes.
pub fn to_unix_nanos(ts: &DateTime<Utc>) -> Result<i64, TypeError> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| TypeError::TimestampOutOfRange(ts.to_rfc3339()))
}

/// Convert nanoseconds since the Unix epoch back to a timestamp.
pub fn from_unix_nanos(nanos: i64) -> Result<DateTime<Utc>, TypeError> {
    let secs = nanos.div_euclid(NANOS_PER_SEC);
    let subsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, subsec)
        .ok_or_else(|| TypeError::TimestampOutOfRange(nanos.to_string()))
}

/// Split a timestamp into seconds since the Unix epoch and subsecond
/// nanoseconds. Total over the whole `DateTime` range.
pub fn to_unix_parts(ts: &DateTime<Utc>) -> (i64, u32) {
    (ts.timestamp(), ts.timestamp_subsec_nanos())
}

/// Inverse of [`to_unix_parts`].
pub fn from_unix_parts(secs: i64, nanos: u32) -> Result<DateTime<Utc>, TypeError> {
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| TypeError::TimestampOutOfRange(format!("{secs}.{nanos:09}")))
}

/// Convert a filesystem timestamp.
pub fn from_system_time(t: SystemTime) -> Result<DateTime<Utc>, TypeError> {
    let converted = match t.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs())
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, after.subsec_nanos())),
        Err(e) => {
            let before = e.duration();
            i64::try_from(before.as_secs()).ok().and_then(|secs| {
                let (secs, nanos) = match before.subsec_nanos() {
                    0 => (-secs, 0),
                    n => (-secs - 1, 1_000_000_000 - n),
                };
                DateTime::from_timestamp(secs, nanos)
            })
        }
    };
    converted.ok_or_else(|| TypeError::TimestampOutOfRange(format!("{t:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn nanos_roundtrip_is_exact() {
        let t = from_system_time(UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789)).unwrap();
        let nanos = to_unix_nanos(&t).unwrap();
        assert_eq!(nanos, 1_700_000_000_123_456_789);
        assert_eq!(from_unix_nanos(nanos).unwrap(), t);
    }

    #[test]
    fn pre_epoch_roundtrip() {
        let t = from_unix_nanos(-1).unwrap();
        assert_eq!(to_unix_nanos(&t).unwrap(), -1);
        let (secs, nanos) = to_unix_parts(&t);
        assert_eq!((secs, nanos), (-1, 999_999_999));
        assert_eq!(from_unix_parts(secs, nanos).unwrap(), t);
    }

    #[test]
    fn far_future_is_out_of_nanosecond_range() {
        // year 3000 does not fit in i64 nanoseconds
        let t = DateTime::from_timestamp(32_503_680_000, 0).unwrap();
        assert!(matches!(
            to_unix_nanos(&t),
            Err(TypeError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn parts_cover_far_future_and_past() {
        for t in [
            DateTime::from_timestamp(32_503_680_000, 5).unwrap(),
            DateTime::from_timestamp(-11_644_473_600, 999_999_999).unwrap(),
        ] {
            let (secs, nanos) = to_unix_parts(&t);
            assert_eq!(from_unix_parts(secs, nanos).unwrap(), t);
        }
    }

    #[test]
    fn system_time_before_epoch() {
        let t = from_system_time(UNIX_EPOCH - Duration::new(1, 250_000_000)).unwrap();
        assert_eq!(to_unix_parts(&t), (-2, 750_000_000));
        assert_eq!(
            from_system_time(UNIX_EPOCH - Duration::from_secs(3)).unwrap().timestamp(),
            -3
        );
    }

    #[test]
    fn system_time_year_2300() {
        let t = from_system_time(UNIX_EPOCH + Duration::from_secs(10_413_792_000)).unwrap();
        assert_eq!(t.to_rfc3339(), "2300-01-01T00:00:00+00:00");
    }
}

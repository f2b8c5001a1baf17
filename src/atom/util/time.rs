use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the QuickTime epoch (1904-01-01T00:00:00Z) and the Unix
/// epoch (1970-01-01T00:00:00Z).
pub const QT_EPOCH_OFFSET_SECS: u64 = 2_082_844_800;

pub fn unscaled_duration(duration: u64, timescale: u64) -> Duration {
    if timescale == 0 {
        return Duration::ZERO;
    }
    const NANOS_PER_SECOND: u128 = 1_000_000_000;
    Duration::from_nanos((duration as u128 * NANOS_PER_SECOND / timescale as u128) as u64)
}

/// Timestamps past the u32 range (year 2040) wrap; that is caller error.
pub fn qt_timestamp(duration: Duration) -> u32 {
    (duration.as_secs() + QT_EPOCH_OFFSET_SECS) as u32
}

pub fn qt_timestamp_now() -> u32 {
    qt_timestamp(now())
}

fn now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qt_epoch_is_zero() {
        // Duration::ZERO is the Unix epoch, which sits exactly at the offset
        assert_eq!(qt_timestamp(Duration::ZERO) as u64, QT_EPOCH_OFFSET_SECS);
    }

    #[test]
    fn test_one_day_is_86400_seconds() {
        let day0 = qt_timestamp(Duration::from_secs(0));
        let day1 = qt_timestamp(Duration::from_secs(86_400));
        assert_eq!(day1 - day0, 86_400);
    }

    #[test]
    fn test_unscaled_duration() {
        assert_eq!(
            unscaled_duration(2_500, 1_000),
            Duration::from_millis(2_500)
        );
        assert_eq!(unscaled_duration(90_000, 90_000), Duration::from_secs(1));
    }

    #[test]
    fn test_unscaled_duration_zero_timescale() {
        assert_eq!(unscaled_duration(90_000, 0), Duration::ZERO);
    }
}

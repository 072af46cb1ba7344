//! Kernel timestamps to wall-clock time.
//!
//! `bpf_ktime_get_ns()` reads `CLOCK_MONOTONIC`. Sampling that clock and the
//! realtime clock together gives the wall-clock instant the monotonic clock
//! started from, which is then added to every event timestamp.

#![allow(unsafe_code)] // clock_gettime() requires unsafe

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

#[derive(Debug, Clone, Copy)]
pub struct BootClock {
    origin: DateTime<Utc>,
}

impl BootClock {
    /// Calibrate against the running system.
    ///
    /// # Errors
    /// Returns an error if `clock_gettime(CLOCK_MONOTONIC)` fails.
    pub fn detect() -> Result<Self> {
        let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } != 0 {
            bail!("clock_gettime(CLOCK_MONOTONIC) failed: {}", std::io::Error::last_os_error());
        }
        let now = Utc::now();
        #[allow(clippy::cast_sign_loss)]
        let monotonic_ns = ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64;
        Ok(Self::from_monotonic(now, monotonic_ns))
    }

    /// Clock whose monotonic reading was `monotonic_ns` at wall time `now`.
    #[must_use]
    pub fn from_monotonic(now: DateTime<Utc>, monotonic_ns: u64) -> Self {
        Self { origin: now - nanos(monotonic_ns) }
    }

    #[must_use]
    pub fn to_wall(&self, ktime_ns: u64) -> DateTime<Utc> {
        self.origin + nanos(ktime_ns)
    }

    /// RFC 3339 with microsecond precision.
    #[must_use]
    pub fn format(&self, ktime_ns: u64) -> String {
        self.to_wall(ktime_ns).to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

fn nanos(ns: u64) -> Duration {
    Duration::nanoseconds(i64::try_from(ns).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_offsets_event_time_from_origin() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        // System booted one hour before `now`
        let clock = BootClock::from_monotonic(now, 3_600 * 1_000_000_000);

        let event = clock.to_wall(3_600 * 1_000_000_000 - 1_500_000);
        assert_eq!(event, now - Duration::microseconds(1_500));
    }

    #[test]
    fn test_format_rfc3339() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = BootClock::from_monotonic(now, 0);
        assert_eq!(clock.format(1_000), "2024-05-01T12:00:00.000001Z");
    }

    #[test]
    fn test_detect() {
        let clock = BootClock::detect().unwrap();
        assert!(clock.to_wall(0) <= Utc::now());
    }
}

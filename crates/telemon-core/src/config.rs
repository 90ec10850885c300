//! Loop timing for [`Monitor`](crate::Monitor).

use std::time::Duration;

use crate::error::CoreError;

/// Render rate used when none is configured.
pub const DEFAULT_FREQUENCY_HZ: f64 = 10.0;
/// Serial poll rate used when none is configured.
pub const DEFAULT_POLL_FREQUENCY_HZ: f64 = 100.0;
/// Pause between closing a lost link and reopening it.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub render_interval: Duration,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            render_interval: Duration::from_secs_f64(1.0 / DEFAULT_FREQUENCY_HZ),
            poll_interval: Duration::from_secs_f64(1.0 / DEFAULT_POLL_FREQUENCY_HZ),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl MonitorConfig {
    /// Build from rates in Hz. Both rates must be positive and finite, and
    /// low enough that the interval is at least one nanosecond.
    pub fn from_rates(
        frequency_hz: f64,
        poll_frequency_hz: f64,
        reconnect_delay: Duration,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            render_interval: interval("frequency", frequency_hz)?,
            poll_interval: interval("poll_frequency", poll_frequency_hz)?,
            reconnect_delay,
        })
    }
}

fn interval(name: &str, hz: f64) -> Result<Duration, CoreError> {
    if !(hz.is_finite() && hz > 0.0) {
        return Err(CoreError::config(format!("{name} must be a positive rate in Hz, got {hz}")));
    }
    let period = Duration::try_from_secs_f64(1.0 / hz)
        .map_err(|e| CoreError::config(format!("{name} of {hz} Hz is out of range: {e}")))?;
    if period.is_zero() {
        return Err(CoreError::config(format!(
            "{name} of {hz} Hz is too high: the interval rounds to zero"
        )));
    }
    Ok(period)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rates_become_intervals() {
        let config = MonitorConfig::from_rates(20.0, 200.0, Duration::from_secs(1)).unwrap();
        assert_eq!(config.render_interval, Duration::from_millis(50));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn non_positive_rates_are_rejected() {
        for hz in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e10] {
            assert!(MonitorConfig::from_rates(hz, 10.0, DEFAULT_RECONNECT_DELAY).is_err());
            assert!(MonitorConfig::from_rates(10.0, hz, DEFAULT_RECONNECT_DELAY).is_err());
        }
    }

    #[test]
    fn fastest_rate_still_ticks() {
        let config = MonitorConfig::from_rates(1e9, 1e9, DEFAULT_RECONNECT_DELAY).unwrap();
        assert_eq!(config.render_interval, Duration::from_nanos(1));
        assert!(!config.poll_interval.is_zero());
    }
}

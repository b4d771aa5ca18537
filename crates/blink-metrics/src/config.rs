use blink_core::ConfigError;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_millis(100);

/// Settings for a [`MetricsAggregator`](crate::MetricsAggregator).
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct AggregatorConfig {
    /// Period between batch writes to the store.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,

    /// Capacity of the visit event queue.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// How long `record` waits for queue space before dropping the visit.
    #[builder(default = DEFAULT_RECORD_TIMEOUT)]
    pub record_timeout: Duration,
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval.is_zero() {
            return Err(ConfigError::invalid(
                "flush_interval",
                "must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "queue_capacity",
                "must be greater than 0",
            ));
        }
        if self.record_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "record_timeout",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AggregatorConfig::default();
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.record_timeout, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let cases = [
            (
                AggregatorConfig::builder().flush_interval(Duration::ZERO).build(),
                "flush_interval",
            ),
            (
                AggregatorConfig::builder().queue_capacity(0).build(),
                "queue_capacity",
            ),
            (
                AggregatorConfig::builder().record_timeout(Duration::ZERO).build(),
                "record_timeout",
            ),
        ];

        for (config, field) in cases {
            let ConfigError::Invalid { field: rejected, .. } = config.validate().unwrap_err();
            assert_eq!(rejected, field);
        }
    }
}

//! Service configuration.

use std::time::Duration;

/// Fraction of the host memory allowance given to the page cache.
///
/// An 8th is deliberately conservative, leaving headroom for everything else
/// the process allocates. A policy choice, not a derived value.
pub const DEFAULT_BUDGET_FRACTION: usize = 8;

/// Configuration for a [`PageCacheService`].
///
/// [`PageCacheService`]: crate::PageCacheService
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Per-process memory allowance reported by the host, in bytes.
    ///
    /// Hosts should always construct through [`ServiceConfig::new`] with the
    /// allowance they actually report; the `Default` value is a conservative
    /// 256 MiB stand-in for tests and hosts with no reported figure, not a
    /// derived number.
    pub host_budget_bytes: usize,

    /// Divisor applied to `host_budget_bytes` to obtain the cache budget.
    /// Default: [`DEFAULT_BUDGET_FRACTION`].
    pub budget_fraction: usize,

    /// Decode worker count. Default: 1 (serialized FIFO decodes).
    pub num_workers: usize,

    /// Idle poll interval for decode workers.
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host_budget_bytes: 256 * 1024 * 1024,
            budget_fraction: DEFAULT_BUDGET_FRACTION,
            num_workers: 1,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ServiceConfig {
    /// Configuration for a host reporting the given memory allowance.
    pub fn new(host_budget_bytes: usize) -> Self {
        Self {
            host_budget_bytes,
            ..Default::default()
        }
    }

    pub fn with_budget_fraction(mut self, fraction: usize) -> Self {
        self.budget_fraction = fraction.max(1);
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Byte budget handed to the cache at construction.
    pub fn cache_budget_bytes(&self) -> usize {
        self.host_budget_bytes / self.budget_fraction.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_an_eighth_of_host_allowance() {
        let config = ServiceConfig::new(64 * 1024 * 1024);
        assert_eq!(config.cache_budget_bytes(), 8 * 1024 * 1024);
    }

    #[test]
    fn default_host_allowance_is_the_documented_stand_in() {
        let config = ServiceConfig::default();
        assert_eq!(config.host_budget_bytes, 256 * 1024 * 1024);
        assert_eq!(config.cache_budget_bytes(), 32 * 1024 * 1024);
    }

    #[test]
    fn budget_fraction_is_configurable() {
        let config = ServiceConfig::new(100).with_budget_fraction(4);
        assert_eq!(config.cache_budget_bytes(), 25);

        // A zero fraction is clamped rather than dividing by zero.
        let clamped = ServiceConfig::new(100).with_budget_fraction(0);
        assert_eq!(clamped.cache_budget_bytes(), 100);
    }

    #[test]
    fn worker_count_defaults_to_serialized_decode() {
        let config = ServiceConfig::default();
        assert_eq!(config.num_workers, 1);

        let pooled = ServiceConfig::default().with_workers(4);
        assert_eq!(pooled.num_workers, 4);
    }
}

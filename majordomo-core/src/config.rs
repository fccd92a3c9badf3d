//! Broker timing configuration.

use std::time::Duration;

/// Heartbeat timing knobs for the broker.
///
/// # Examples
///
/// ```
/// use majordomo_core::config::BrokerConfig;
/// use std::time::Duration;
///
/// let config = BrokerConfig::default()
///     .with_hb_interval(Duration::from_millis(250))
///     .with_hb_liveness(3);
/// ```
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Heartbeat period: outbound beats are emitted and inbound liveness is
    /// decremented once per interval.
    pub hb_interval: Duration,

    /// Consecutive missed intervals tolerated before a worker counts as dead.
    pub hb_liveness: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            hb_interval: Duration::from_millis(1000),
            hb_liveness: 5,
        }
    }
}

impl BrokerConfig {
    /// Set the heartbeat interval (builder-style).
    #[must_use]
    pub const fn with_hb_interval(mut self, interval: Duration) -> Self {
        self.hb_interval = interval;
        self
    }

    /// Set the liveness tolerance (builder-style).
    #[must_use]
    pub const fn with_hb_liveness(mut self, liveness: u32) -> Self {
        self.hb_liveness = liveness;
        self
    }
}

use core::time::Duration;

use serde::Deserialize;

const DEFAULT_BATCH_SIZE: u64 = 1000;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepositIndexerConfig {
    /// Number of execution blocks scanned per finalized batch. 0 means the default.
    pub batch_size: u64,
    #[serde(with = "seconds")]
    pub run_interval: Duration,
    #[serde(with = "seconds")]
    pub batch_pause: Duration,
    #[serde(with = "seconds")]
    pub log_query_timeout: Duration,
    #[serde(with = "seconds")]
    pub request_timeout: Duration,
    pub recent_pass_attempts: usize,
}

impl Default for DepositIndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            run_interval: Duration::from_secs(60),
            batch_pause: Duration::from_secs(1),
            log_query_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            recent_pass_attempts: 3,
        }
    }
}

impl DepositIndexerConfig {
    #[must_use]
    pub const fn effective_batch_size(&self) -> u64 {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }
}

mod seconds {
    use core::time::Duration;

    use serde::{Deserialize as _, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

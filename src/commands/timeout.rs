use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Deadlines for every suspension point of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutStrategy {
    /// Opening the websocket (TCP + upgrade), and each REST call
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Total wait for a pushed answer on the channel
    #[serde(default = "default_channel_timeout")]
    pub channel_timeout_secs: u64,

    /// Total time spent polling for a stored answer
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Pause between two status queries
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_channel_timeout() -> u64 {
    30
}
fn default_poll_timeout() -> u64 {
    60
}
fn default_poll_interval() -> u64 {
    1000
}

impl Default for TimeoutStrategy {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            channel_timeout_secs: default_channel_timeout(),
            poll_timeout_secs: default_poll_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl TimeoutStrategy {
    /// Short deadlines for interactive use and tests.
    pub fn quick_strategy(total_secs: u64) -> Self {
        Self {
            connect_timeout_secs: total_secs.clamp(1, 5),
            channel_timeout_secs: total_secs,
            poll_timeout_secs: total_secs,
            poll_interval_ms: 200,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Tracks one bounded wait.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start_time: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for readers, writers and subscriptions.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use sourced_streams::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{ "long_poll_secs": 30 }"#).unwrap();
/// assert_eq!(config.long_poll_secs, 30);
/// assert_eq!(config.read_page_size, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Events requested per page by the paged readers.
    pub read_page_size: usize,
    /// Events requested per long-poll round by catch-up subscriptions.
    pub catch_up_page_size: usize,
    /// Events requested per fetch by persistent subscriptions.
    pub persistent_batch_size: usize,
    /// Seconds the server may hold a subscription read open.
    pub long_poll_secs: u64,
    /// Pause after an empty subscription round, for servers that answer
    /// long-poll reads immediately. Zero disables the pause.
    pub empty_poll_delay_ms: u64,
    /// Capacity of the hand-off between a subscription task and its consumer.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_page_size: 20,
            catch_up_page_size: 10,
            persistent_batch_size: 10,
            long_poll_secs: 10,
            empty_poll_delay_ms: 1_000,
            channel_capacity: 1,
        }
    }
}

impl ClientConfig {
    pub fn with_read_page_size(mut self, size: usize) -> Self {
        self.read_page_size = size.max(1);
        self
    }

    pub fn with_catch_up_page_size(mut self, size: usize) -> Self {
        self.catch_up_page_size = size.max(1);
        self
    }

    pub fn with_persistent_batch_size(mut self, size: usize) -> Self {
        self.persistent_batch_size = size.max(1);
        self
    }

    pub fn with_long_poll(mut self, wait: Duration) -> Self {
        self.long_poll_secs = wait.as_secs();
        self
    }

    pub fn with_empty_poll_delay(mut self, delay: Duration) -> Self {
        self.empty_poll_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn long_poll(&self) -> Duration {
        Duration::from_secs(self.long_poll_secs)
    }

    pub fn empty_poll_delay(&self) -> Duration {
        Duration::from_millis(self.empty_poll_delay_ms)
    }

    // Page sizes and capacity loaded from JSON may be zero; a zero page
    // would never advance and tokio rejects a zero-capacity channel.
    pub(crate) fn read_page(&self) -> usize {
        self.read_page_size.max(1)
    }

    pub(crate) fn catch_up_page(&self) -> usize {
        self.catch_up_page_size.max(1)
    }

    pub(crate) fn persistent_batch(&self) -> usize {
        self.persistent_batch_size.max(1)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

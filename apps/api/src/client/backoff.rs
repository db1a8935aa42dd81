use std::time::Duration;

/// Bounded exponential backoff for reconnecting the sync channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based)
    ///
    /// Returns `None` once attempts are exhausted.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use chefleague_api::client::ReconnectPolicy;
    ///
    /// let policy = ReconnectPolicy::default();
    /// assert_eq!(policy.delay_for(1), Some(Duration::from_secs(1)));
    /// assert_eq!(policy.delay_for(3), Some(Duration::from_secs(4)));
    /// assert_eq!(policy.delay_for(6), None);
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let multiplier = self.factor.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(multiplier).min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2,
            max_attempts: 5,
        }
    }
}

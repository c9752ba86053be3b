//! Retry policy for transient external-service failures.

use std::time::Duration;

/// How many times to try an external call and how long to wait between
/// attempts. Only transient failures are subject to retry; validation and
/// state-machine errors fail immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub delay:        Duration,
  /// Add up to this much random extra delay per wait, to de-synchronize
  /// concurrent retriers.
  pub jitter:       Duration,
}

impl RetryPolicy {
  /// Policy for blockchain registration calls.
  pub fn registration() -> Self {
    Self {
      max_attempts: 3,
      delay:        Duration::from_secs(2),
      jitter:       Duration::from_millis(250),
    }
  }

  /// The delay to sleep after a failed attempt, jittered. There is no delay
  /// after the final attempt, which the caller enforces by not calling this.
  pub fn next_delay(&self) -> Duration {
    let jitter_ms = self.jitter.as_millis() as u64;
    let extra = if jitter_ms == 0 {
      0
    } else {
      rand::random::<u64>() % jitter_ms
    };
    self.delay + Duration::from_millis(extra)
  }

  pub fn is_last(&self, attempt: u32) -> bool { attempt >= self.max_attempts }
}

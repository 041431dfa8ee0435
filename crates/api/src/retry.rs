use std::time::Duration;

use tracing::debug;

use crate::error::ApiResult;

/// Bounded exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Total attempts, including the first.
    pub steps: u32,
    pub duration: Duration,
    pub factor: f64,
    pub cap: Duration,
}

/// Five attempts 10ms apart.
pub const DEFAULT_RETRY: Backoff =
    Backoff { steps: 5, duration: Duration::from_millis(10), factor: 1.0, cap: Duration::from_secs(1) };

impl Default for Backoff {
    fn default() -> Self {
        DEFAULT_RETRY
    }
}

impl Backoff {
    fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.duration.as_secs_f64() * self.factor.max(1.0).powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.cap)
    }
}

/// Re-run a whole read-modify-write while it fails with a conflict. `f` must
/// re-read the object on each call. Any other error, or the last conflict once
/// attempts run out, is returned as is.
pub fn retry_on_conflict<T, F>(backoff: Backoff, mut f: F) -> ApiResult<T>
where
    F: FnMut() -> ApiResult<T>,
{
    let steps = backoff.steps.max(1);
    let mut attempt = 0;
    loop {
        match f() {
            Err(e) if e.is_conflict() && attempt + 1 < steps => {
                let delay = backoff.delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "conflict, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}

// Bounded narrowing retry for queries the backend rejects as too large.

use serde::Deserialize;

use crate::models::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Narrowing {
    /// Multiply the alignment step by the factor (fewer points, same range).
    WidenStep,
    /// Divide the duration by the factor, keeping the end time.
    ShortenWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. 1 disables narrowing.
    pub max_attempts: u32,
    pub narrowing: Narrowing,
    pub factor: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            narrowing: Narrowing::WidenStep,
            factor: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, narrowing: Narrowing, factor: u64) -> Self {
        Self {
            max_attempts,
            narrowing,
            factor,
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Next, smaller query window. None when the window cannot shrink further.
    pub fn narrow(&self, window: &Window) -> Option<Window> {
        if self.factor < 2 {
            return None;
        }
        match self.narrowing {
            Narrowing::WidenStep => {
                let step = window.step_secs.max(1).checked_mul(self.factor)?;
                if step > window.duration_secs() {
                    return None;
                }
                Some(window.with_step(step))
            }
            Narrowing::ShortenWindow => {
                let duration = window.duration_secs() / self.factor;
                if duration == 0 || duration < window.step_secs {
                    return None;
                }
                window.shortened_to(duration)
            }
        }
    }
}

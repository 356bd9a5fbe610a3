//! What the scheduler does when a cycle fails.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

// Caps the exponent so the backoff cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the scheduler with the first cycle error.
    #[default]
    Crash,
    /// Log the error and carry on with the next scheduled cycle.
    Continue,
    /// Re-run the failed cycle with exponential backoff, then crash.
    Retry {
        max_retries: u32,
        base_delay: Duration,
    },
}

/// Decision for a single failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Stop,
    Skip,
    RetryAfter(Duration),
}

impl FailurePolicy {
    pub fn retry(max_retries: u32) -> Self {
        Self::Retry {
            max_retries,
            base_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// `retries_done` counts retries already spent on the current cycle.
    pub fn on_failure(&self, retries_done: u32) -> FailureAction {
        match *self {
            FailurePolicy::Crash => FailureAction::Stop,
            FailurePolicy::Continue => FailureAction::Skip,
            FailurePolicy::Retry {
                max_retries,
                base_delay,
            } => {
                if retries_done >= max_retries {
                    FailureAction::Stop
                } else {
                    FailureAction::RetryAfter(backoff(base_delay, retries_done))
                }
            }
        }
    }
}

/// `base * 2^attempt` plus up to `base / 2` of random jitter.
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT));
    let jitter_ceiling = (base.as_millis() / 2) as u64;
    let jitter = if jitter_ceiling == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ceiling)
    };
    exponential.saturating_add(Duration::from_millis(jitter))
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Crash => write!(f, "crash"),
            FailurePolicy::Continue => write!(f, "continue"),
            FailurePolicy::Retry { max_retries, .. } => write!(f, "retry (max {})", max_retries),
        }
    }
}

/// Parses `crash`, `continue` or `retry`; `retry` uses the default limits.
impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crash" => Ok(FailurePolicy::Crash),
            "continue" => Ok(FailurePolicy::Continue),
            "retry" => Ok(FailurePolicy::retry(DEFAULT_MAX_RETRIES)),
            other => Err(format!(
                "unknown failure policy `{}` (expected crash, continue or retry)",
                other
            )),
        }
    }
}

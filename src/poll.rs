//! Bounded fixed-interval polling for asynchronous marketplace state.
//!
//! The marketplace populates order and deal ids some time after submission;
//! the workflow re-queries at a fixed interval until the awaited field shows
//! up. The loop is bounded: exhausting the policy fails the run with
//! [`Error::Timeout`] instead of waiting forever.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
        }
    }
}

/// Await `producer` until it yields a value, sleeping `policy.interval`
/// between attempts. Producer errors abort immediately; only an absent value
/// is retried.
pub async fn poll_until_present<T, F, Fut>(policy: &RetryPolicy, mut producer: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = producer().await? {
            return Ok(value);
        }
        tracing::debug!(
            "poll attempt {}/{} found nothing yet",
            attempt,
            policy.max_attempts
        );
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(Error::Timeout {
        attempts: policy.max_attempts,
        waited: policy.interval * policy.max_attempts.saturating_sub(1),
    })
}

//! Bounded retry policy for the startup readiness check.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::VectorStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt; 1.0 keeps it fixed.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 10, delay_ms: 2_000, backoff_factor: 1.0 }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay_ms: delay.as_millis() as u64, backoff_factor: 1.0 }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.delay_ms as f64 * factor) as u64)
    }

    /// Polls `probe` until it reports ready or the attempts run out.
    /// Returns the number of attempts used.
    pub async fn wait_ready<F, Fut>(&self, mut probe: F) -> Result<u32>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for attempt in 1..=self.max_attempts {
            if probe().await {
                return Ok(attempt);
            }
            if attempt < self.max_attempts {
                let delay = self.delay_after(attempt);
                debug!(attempt, max_attempts = self.max_attempts, ?delay, "not ready, retrying");
                tokio::time::sleep(delay).await;
            }
        }
        Err(Error::StoreUnreachable { attempts: self.max_attempts })
    }

    pub async fn wait_for_store(&self, store: &dyn VectorStore) -> Result<u32> {
        info!(max_attempts = self.max_attempts, "connecting to vector store");
        let result = self
            .wait_ready(move || async move {
                match store.ping().await {
                    Ok(ready) => ready,
                    Err(e) => {
                        debug!(error = %e, "ping failed");
                        false
                    }
                }
            })
            .await;
        match &result {
            Ok(attempts) => info!(attempts, "vector store ready"),
            Err(e) => warn!(error = %e, "vector store never became ready"),
        }
        result
    }
}

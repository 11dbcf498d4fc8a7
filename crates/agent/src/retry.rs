use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::llm::LlmError;

/// Bounded retry with a fixed pause, gated on the transient-error predicate.
/// Non-transient failures abort on the first attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, pause: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), pause }
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    info!(
                        event_name = "llm.retry",
                        attempt,
                        max_attempts = self.max_attempts,
                        "transient model failure, retrying"
                    );
                    tokio::time::sleep(self.pause).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

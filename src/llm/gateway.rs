//! Generation gateway: one retry policy for every transient provider failure.

use log::{ error, warn };
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::chat::ChatClient;
use super::LlmError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry schedule: after failed attempt `a` (0-based) wait `(2^a + 1) * unit`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    pub retryable: fn(&LlmError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
            retryable: LlmError::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt).saturating_add(1);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. No sleep follows the final attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, LlmError>
        where F: FnMut() -> Fut, Fut: Future<Output = Result<T, LlmError>>
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    return Ok(value);
                }
                Err(err) if !(self.retryable)(&err) => {
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        error!("LLM call failed after {} attempts: {}", attempt, err);
                        return Err(LlmError::Exhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    let wait = self.backoff(attempt - 1);
                    warn!(
                        "LLM transient failure (attempt {}/{}): {}. Retrying in {:?}",
                        attempt,
                        max_attempts,
                        err,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Mediates every call to the text-generation backend.
#[derive(Clone)]
pub struct LlmGateway {
    client: Arc<dyn ChatClient>,
    policy: RetryPolicy,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn ChatClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn model(&self) -> String {
        self.client.get_model()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system_instruction: Option<&str>
    ) -> Result<String, LlmError> {
        let client = &self.client;
        let result = self.policy.run(|| async move {
            client.complete(prompt, system_instruction).await.map(|r| r.response)
        }).await;

        if let Err(LlmError::ContentBlocked(reason)) = &result {
            warn!("LLM response blocked by content policy: {}", reason);
        }
        result
    }
}

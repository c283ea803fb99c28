use crate::backends::ReasoningClient;
use crate::profile::AgentProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};
use std::sync::Arc;
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Configures retry behaviour for failover across reasoning backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per backend before moving to the next one.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_max_ms: 10_000,
        }
    }
}

/// Computes the backoff delay for a given attempt using exponential backoff
/// capped at `backoff_max_ms`.
fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A `ReasoningClient` that wraps one or more clients and performs
/// automatic failover with exponential-backoff retries.
///
/// Within each backend it retries transient errors up to `max_retries` times,
/// then moves to the next backend. If every backend fails, the last error is
/// returned. The caller's stage timeout still bounds the whole sequence.
pub struct FailoverClient {
    backends: Vec<Arc<dyn ReasoningClient>>,
    policy: RetryPolicy,
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl FailoverClient {
    /// Create a failover client. An empty `backends` list makes every call fail.
    pub fn new(backends: Vec<Arc<dyn ReasoningClient>>, policy: RetryPolicy) -> Self {
        Self {
            backends,
            policy,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl ReasoningClient for FailoverClient {
    async fn call(&self, prompt: &str, agent: &AgentProfile) -> ShiftCrewResult<String> {
        let mut last_err: Option<ShiftCrewError> = None;

        for (backend_idx, backend) in self.backends.iter().enumerate() {
            for attempt in 0..=self.policy.max_retries {
                match backend.call(prompt, agent).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if !e.is_transient() {
                            warn!(
                                backend = backend_idx,
                                attempt,
                                agent = %agent.key,
                                error = %e,
                                "Non-retryable error, moving to next backend"
                            );
                            last_err = Some(e);
                            break;
                        }

                        if attempt < self.policy.max_retries {
                            let delay = compute_backoff(&self.policy, attempt);
                            info!(
                                backend = backend_idx,
                                attempt,
                                delay_ms = delay,
                                agent = %agent.key,
                                error = %e,
                                "Retryable error, backing off"
                            );
                            self.do_sleep(delay).await;
                        }
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ShiftCrewError::Agent("All failover backends exhausted".into())
        }))
    }
}

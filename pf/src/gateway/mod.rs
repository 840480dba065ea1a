//! Reasoning gateway
//!
//! The single choke point for all calls to the external reasoning provider.
//! Builds call payloads, classifies failures, and retries transient ones;
//! what it does not do is validate domain invariants - the payload a call
//! returns is untrusted JSON for the normalizer to make sense of.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub mod client;
mod error;
mod gemini;
mod types;

pub use client::{ClientFactory, ReasoningClient};
pub use error::GatewayError;
pub use gemini::{GeminiClient, GeminiFactory};
pub use types::{Capability, DocumentRef, InvokeRequest, MediaResolution, Tuning, extract_json};

/// Bounded transient-failure retry
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

/// Perform one gateway call with bounded retries.
///
/// Transient failures are retried with exponential backoff, each retry
/// re-sending the identical request; a provider-requested rate-limit wait
/// takes precedence over the computed backoff when it is longer. Permanent
/// failures surface immediately.
pub async fn invoke_with_retry(
    client: &dyn ReasoningClient,
    request: &InvokeRequest,
    policy: &RetryPolicy,
) -> Result<Value, GatewayError> {
    request.validate()?;

    let mut last_error: Option<GatewayError> = None;
    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let mut backoff = policy.initial_backoff * 2u32.pow(attempt - 1);
            if let Some(requested) = last_error.as_ref().and_then(GatewayError::retry_after)
                && requested > backoff
            {
                backoff = requested;
            }
            warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                capability = %request.capability,
                "Retrying provider call after transient failure"
            );
            tokio::time::sleep(backoff).await;
        }

        match client.invoke(request.clone()).await {
            Ok(value) => {
                debug!(attempt, capability = %request.capability, "Provider call succeeded");
                return Ok(value);
            }
            Err(e) if e.is_retryable() => {
                debug!(attempt, error = %e, "Transient provider failure");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        GatewayError::InvalidRequest("retry budget exhausted without an attempt".to_string())
    }))
}

//! Serialized, rate-limited, retrying dispatcher for outbound generation calls.
//!
//! Every request goes through one FIFO queue. A single drain task pops the
//! head, calls the [`Transport`] with exponential backoff between failed
//! attempts, settles the caller, then waits the rate-limit interval before
//! taking the next request. At most one call is in flight per gateway.

use crate::{
    config::LlmConfig,
    error::{CallError, GatewayError},
    message::ChatMessage,
    transport::{Transport, transport_from_config},
};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

pub const MAX_RETRIES: u32 = 3;
pub const RATE_LIMIT_INTERVAL_MS: u64 = 2000;
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Retry and pacing constants for a [`Gateway`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Pause after a request settles before the next one is taken.
    pub rate_limit_interval: Duration,
    /// Backoff before retry `n` is `2^n * backoff_base`.
    pub backoff_base: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            rate_limit_interval: Duration::from_millis(RATE_LIMIT_INTERVAL_MS),
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
        }
    }
}

impl GatewaySettings {
    /// The wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

struct QueuedRequest {
    payload: Vec<ChatMessage>,
    reply: oneshot::Sender<Result<String, GatewayError>>,
}

struct GatewayState {
    queue: VecDeque<QueuedRequest>,
    /// True while a drain task is scheduled or running.
    processing: bool,
}

struct GatewayInner {
    transport: Arc<dyn Transport>,
    settings: GatewaySettings,
    state: Mutex<GatewayState>,
}

/// A cloneable handle to one request queue. Clones share the queue.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, settings: GatewaySettings) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                transport,
                settings,
                state: Mutex::new(GatewayState {
                    queue: VecDeque::new(),
                    processing: false,
                }),
            }),
        }
    }

    /// Builds a gateway for the configured provider with default settings.
    ///
    /// Credential problems are logged here, once, and do not prevent
    /// enqueueing; the affected calls fail at request time.
    pub fn from_config(config: &LlmConfig) -> Self {
        config.log_diagnostics();
        let settings = GatewaySettings::default();
        info!(
            provider = ?config.provider,
            max_attempts = settings.max_attempts,
            rate_limit_ms = settings.rate_limit_interval.as_millis() as u64,
            "Gateway configured"
        );
        Self::new(transport_from_config(config), settings)
    }

    /// Queues a generation request and waits for it to settle.
    ///
    /// Only fails once the retry budget is spent. Dropping the returned
    /// future does not remove the request from the queue.
    pub async fn enqueue(&self, payload: Vec<ChatMessage>) -> Result<String, GatewayError> {
        let (reply, settled) = oneshot::channel();
        {
            let mut state = self.inner.state.lock().await;
            state.queue.push_back(QueuedRequest { payload, reply });
            if !state.processing {
                state.processing = true;
                tokio::spawn(drain(self.inner.clone()));
            }
            debug!(queued = state.queue.len(), "Request enqueued");
        }
        settled.await.unwrap_or(Err(GatewayError::Shutdown))
    }

    /// Whether a drain task is currently scheduled or running.
    pub async fn is_processing(&self) -> bool {
        self.inner.state.lock().await.processing
    }

    /// Number of requests waiting behind the one in flight.
    pub async fn queued_len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }
}

async fn drain(inner: Arc<GatewayInner>) {
    loop {
        let request = {
            let mut state = inner.state.lock().await;
            match state.queue.pop_front() {
                Some(request) => request,
                None => {
                    state.processing = false;
                    return;
                }
            }
        };

        // A panicking transport must not take the drain task down with it.
        let worker = inner.clone();
        let payload = request.payload;
        let call = tokio::spawn(async move { worker.call_with_retry(&payload).await });
        let result = match call.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Generation call aborted");
                Err(GatewayError::Aborted)
            }
        };
        if request.reply.send(result).is_err() {
            debug!("Caller went away before its request settled");
        }

        tokio::time::sleep(inner.settings.rate_limit_interval).await;
    }
}

impl GatewayInner {
    async fn call_with_retry(&self, payload: &[ChatMessage]) -> Result<String, GatewayError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error: CallError = match self.transport.generate(payload).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };
            warn!(attempt, error = %error, "Attempt {} failed", attempt);

            if attempt >= max_attempts {
                error!(attempts = attempt, "API call failed after {} attempts", attempt);
                return Err(GatewayError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }
            tokio::time::sleep(self.settings.backoff_for(attempt)).await;
            attempt += 1;
        }
    }
}

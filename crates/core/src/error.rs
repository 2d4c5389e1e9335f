//! Error types for outbound generation calls.

use reqwest::StatusCode;

/// A failure of a single call attempt. The gateway retries these.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("API request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Could not extract text from response: {0}")]
    MalformedResponse(String),
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A failure surfaced to whoever enqueued the request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Every attempt failed; `last` is the error of the final attempt.
    #[error("API call failed after {attempts} attempts.")]
    Exhausted { attempts: u32, last: CallError },
    /// The call panicked before producing a result. Not retried.
    #[error("API call aborted unexpectedly")]
    Aborted,
    /// The drain task went away without settling the request.
    #[error("Gateway shut down before the request settled")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_code_and_body() {
        let err = CallError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "quota".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API request failed with status 429 Too Many Requests: quota"
        );
    }

    #[test]
    fn test_exhausted_display() {
        let err = GatewayError::Exhausted {
            attempts: 3,
            last: CallError::MalformedResponse("no candidates".into()),
        };
        assert_eq!(err.to_string(), "API call failed after 3 attempts.");
    }
}

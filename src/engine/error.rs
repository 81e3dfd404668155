//! Error taxonomy and upstream error classification
//!
//! `QueryError` is the typed result surfaced to the tool-calling host. Raw AWS
//! SDK errors arrive as `anyhow::Error` from the upstream adapter and are
//! categorized by string pattern into retryable transient failures (throttling,
//! timeouts, network, service unavailable) and fatal ones (permissions,
//! validation, malformed queries). The retry executor consumes the category;
//! the taxonomy is what callers see.

use thiserror::Error;

/// Typed errors returned to the tool-calling host.
///
/// A Historical query that exceeds its deadline is NOT an error: it produces a
/// normal response with `timed_out` set, so callers can retry with a narrower
/// range.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Request failed validation; never sent upstream
    #[error("invalid query: {0}")]
    Validation(String),

    /// Continuation token is malformed, expired, or from a different query
    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    /// Non-blocking admission was requested and the bucket is empty
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Transient upstream failure persisted through every retry attempt
    #[error("upstream failure after {attempts} attempts: {message}")]
    TransientUpstream { attempts: u32, message: String },

    /// Upstream rejected the request outright; detail preserved verbatim
    #[error("upstream rejection ({code}): {message}")]
    UpstreamRejection { code: String, message: String },

    /// Caller-initiated cancellation observed
    #[error("query cancelled")]
    Cancelled,

    /// Unexpected internal fault, degraded to a diagnosable message
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Stable kind discriminator for the wire-level `{kind, message}` shape
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "validation_error",
            QueryError::InvalidToken(_) => "invalid_token",
            QueryError::RateLimitExceeded => "rate_limit_exceeded",
            QueryError::TransientUpstream { .. } => "transient_upstream_error",
            QueryError::UpstreamRejection { .. } => "upstream_rejection",
            QueryError::Cancelled => "cancelled",
            QueryError::Internal(_) => "internal_error",
        }
    }
}

/// Categorized upstream error, driving the retry decision
#[derive(Debug, Clone)]
pub enum ErrorCategory {
    /// Request was throttled due to rate limiting
    Throttled { code: String },
    /// Request timed out
    Timeout { operation: String },
    /// Network connectivity issues
    Network { message: String },
    /// Service temporarily unavailable (5xx-equivalent)
    ServiceUnavailable { message: String },
    /// Non-retryable error (permissions, validation, malformed query)
    Fatal {
        code: String,
        message: String,
        is_permission_error: bool,
    },
}

impl ErrorCategory {
    /// Returns true if this error category is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Fatal { .. })
    }

    /// Short label for tracing output
    pub fn short_label(&self) -> &'static str {
        match self {
            ErrorCategory::Throttled { .. } => "throttled",
            ErrorCategory::Timeout { .. } => "timeout",
            ErrorCategory::Network { .. } => "network",
            ErrorCategory::ServiceUnavailable { .. } => "unavailable",
            ErrorCategory::Fatal { .. } => "fatal",
        }
    }

    /// Convert a fatal category into the caller-facing rejection.
    ///
    /// Retryable categories should never reach this; they surface through
    /// `QueryError::TransientUpstream` after the retry budget is spent.
    pub fn into_rejection(self) -> QueryError {
        match self {
            ErrorCategory::Fatal { code, message, .. } => {
                QueryError::UpstreamRejection { code, message }
            }
            other => QueryError::Internal(format!(
                "retryable error surfaced as rejection: {}",
                other.short_label()
            )),
        }
    }
}

/// Categorize an upstream error for retry classification.
///
/// Examines the error chain's string representation for known AWS error
/// patterns. The debug representation carries service error codes that the
/// display form sometimes elides.
pub fn categorize_error(error: &anyhow::Error, operation: &str) -> ErrorCategory {
    let error_str = error.to_string();
    let error_debug = format!("{:?}", error);

    let detail = if error_str.contains("service error") {
        &error_debug
    } else {
        &error_str
    };

    categorize_error_string(detail, operation)
}

/// Categorize an error based on its string representation
pub fn categorize_error_string(error_str: &str, operation: &str) -> ErrorCategory {
    // Throttling (most common transient error)
    if error_str.contains("ThrottlingException")
        || error_str.contains("Throttling")
        || error_str.contains("TooManyRequestsException")
        || error_str.contains("RequestLimitExceeded")
        || error_str.contains("LimitExceededException")
        || error_str.contains("RateExceeded")
    {
        let code = extract_error_code(error_str).unwrap_or_else(|| "Throttling".to_string());
        return ErrorCategory::Throttled { code };
    }

    if error_str.contains("TimeoutError")
        || error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("deadline exceeded")
    {
        return ErrorCategory::Timeout {
            operation: operation.to_string(),
        };
    }

    // Network/dispatch errors
    if error_str.contains("DispatchFailure")
        || error_str.contains("connection")
        || error_str.contains("Connection")
        || error_str.contains("network")
        || error_str.contains("Network")
        || error_str.contains("DNS")
        || error_str.contains("socket")
    {
        return ErrorCategory::Network {
            message: truncate_message(error_str, 100),
        };
    }

    // Service-side transient errors
    if error_str.contains("ServiceUnavailable")
        || error_str.contains("InternalServerError")
        || error_str.contains("InternalServerException")
        || error_str.contains("Service Unavailable")
        || error_str.contains("503")
        || error_str.contains("500")
    {
        return ErrorCategory::ServiceUnavailable {
            message: truncate_message(error_str, 100),
        };
    }

    let is_permission_error = error_str.contains("AccessDenied")
        || error_str.contains("AccessDeniedException")
        || error_str.contains("UnauthorizedOperation")
        || error_str.contains("AuthFailure")
        || error_str.contains("InvalidClientTokenId")
        || error_str.contains("SignatureDoesNotMatch");

    let code = extract_error_code(error_str).unwrap_or_else(|| {
        if is_permission_error {
            "AccessDenied".to_string()
        } else {
            "Error".to_string()
        }
    });

    ErrorCategory::Fatal {
        code,
        message: truncate_message(error_str, 200),
        is_permission_error,
    }
}

/// Extract an AWS error code from an error message if present
fn extract_error_code(error_str: &str) -> Option<String> {
    // Pattern 1: "ThrottlingException: Rate exceeded"
    if let Some(pos) = error_str.find(':') {
        let prefix = error_str[..pos].trim();
        if prefix.ends_with("Exception")
            || prefix.ends_with("Error")
            || prefix.chars().next().is_some_and(|c| c.is_uppercase())
        {
            let code = prefix.rsplit("::").next().unwrap_or(prefix);
            if !code.is_empty() && code.len() < 50 {
                return Some(code.to_string());
            }
        }
    }

    // Pattern 2: code: "ErrorName" in debug output
    if let Some(start) = error_str.find("code:") {
        let after_code = &error_str[start + 5..];
        if let Some(quote_start) = after_code.find('"') {
            let after_quote = &after_code[quote_start + 1..];
            if let Some(quote_end) = after_quote.find('"') {
                let code = &after_quote[..quote_end];
                if !code.is_empty() && code.len() < 50 {
                    return Some(code.to_string());
                }
            }
        }
    }

    None
}

/// Truncate a message to max length, adding ellipsis if truncated
fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.len() <= max_len {
        msg.to_string()
    } else {
        format!("{}...", &msg[..max_len - 3])
    }
}

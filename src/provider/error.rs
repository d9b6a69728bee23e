//! Provider-level error types.
//!
//! Every call through a [`BillingProvider`](super::BillingProvider) fails with
//! a [`ProviderError`]. Timeouts are a distinct kind so callers can tell a
//! hung provider apart from one that answered with an error.

use std::fmt;

/// Errors reported by the billing provider or the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider API returned an error.
    Api {
        operation: String,
        message: String,
        code: Option<String>,
        http_status: Option<u16>,
    },
    /// The call did not complete within the configured timeout.
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },
    /// The request could not be built (e.g. a malformed identifier).
    InvalidRequest { message: String },
    /// An unexpected client-side failure.
    Internal { message: String },
}

/// Result alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { operation, message, code, http_status } => {
                write!(f, "Stripe API error during '{}': {}", operation, message)?;
                if let Some(code) = code {
                    write!(f, " (code: {})", code)?;
                }
                if let Some(status) = http_status {
                    write!(f, " [HTTP {}]", status)?;
                }
                Ok(())
            }
            Self::Timeout { operation, timeout_seconds } => {
                write!(f, "Stripe call '{}' timed out after {} seconds", operation, timeout_seconds)
            }
            Self::InvalidRequest { message } => {
                write!(f, "Invalid provider request: {}", message)
            }
            Self::Internal { message } => {
                write!(f, "Internal provider error: {}", message)
            }
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Build an API error for tests and mock providers.
    pub fn api(operation: impl Into<String>, message: impl Into<String>, http_status: u16) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
            code: None,
            http_status: Some(http_status),
        }
    }

    /// Build a not-found API error.
    pub fn not_found(operation: impl Into<String>, id: &str) -> Self {
        Self::Api {
            operation: operation.into(),
            message: format!("No such resource: '{}'", id),
            code: Some("resource_missing".to_string()),
            http_status: Some(404),
        }
    }

    /// Check if the provider reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { http_status: Some(404), .. })
    }

    /// Check if the call timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Api { http_status, .. } => {
                // Rate limit (429) and server errors (5xx) are retryable
                matches!(http_status, Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }

    /// Name of the operation that failed, when known.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Api { operation, .. } | Self::Timeout { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Api {
            operation: "get_price".to_string(),
            message: "No such price: 'price_x'".to_string(),
            code: Some("resource_missing".to_string()),
            http_status: Some(404),
        };
        assert_eq!(
            err.to_string(),
            "Stripe API error during 'get_price': No such price: 'price_x' (code: resource_missing) [HTTP 404]"
        );

        let err = ProviderError::Timeout {
            operation: "list_customers".to_string(),
            timeout_seconds: 30,
        };
        assert_eq!(err.to_string(), "Stripe call 'list_customers' timed out after 30 seconds");
    }

    #[test]
    fn test_error_classification() {
        let err = ProviderError::not_found("get_customer", "cus_missing");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(!err.is_timeout());

        let err = ProviderError::api("list_products", "rate limited", 429);
        assert!(err.is_retryable());

        let err = ProviderError::api("list_products", "bad gateway", 502);
        assert!(err.is_retryable());

        let err = ProviderError::Timeout {
            operation: "send_invoice".to_string(),
            timeout_seconds: 5,
        };
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert_eq!(err.operation(), Some("send_invoice"));

        let err = ProviderError::InvalidRequest {
            message: "bad id".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.operation(), None);
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cache::CacheError;
use crate::invoicing::InvoicingError;
use crate::provider::ProviderError;
use crate::refresh::RefreshError;
use crate::settings::SettingsError;

/// The main error type for the billing desk
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Invoicing(#[from] InvoicingError),

    #[error("Failed to create customer: {0}")]
    CustomerCreation(#[source] ProviderError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DeskError>;

/// Error body returned by the HTTP surface.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

/// Status for a failed provider call.
fn provider_status(error: &ProviderError) -> StatusCode {
    match error {
        ProviderError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ProviderError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        ProviderError::Api { .. } => StatusCode::BAD_GATEWAY,
        ProviderError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl DeskError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Cache(CacheError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Invoicing(
                e @ (InvoicingError::CustomerLookup { .. } | InvoicingError::PriceLookup { .. }),
            ) if e.provider_error().is_not_found() => StatusCode::NOT_FOUND,
            Self::Invoicing(e) => provider_status(e.provider_error()),
            Self::CustomerCreation(e) => provider_status(e),
            Self::Refresh(RefreshError::Initial(e)) => provider_status(&e.source),
            Self::BadRequest(_) | Self::Settings(SettingsError::InvalidApiKey(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Settings(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients.
    ///
    /// 500s get a generic message; the full error is only logged.
    pub fn safe_message(&self) -> String {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error_id = %error_id, error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error_id = %error_id, error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });
        (status, body).into_response()
    }
}

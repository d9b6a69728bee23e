use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{CacheStatus, FieldStatus};

/// Health check status
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single cache field
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub ready: bool,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

/// A field is degraded once it has gone this many refresh intervals without
/// a successful replacement.
const STALE_INTERVALS: u32 = 2;

fn field_health(
    name: &str,
    field: &FieldStatus,
    stale_after: chrono::Duration,
    now: DateTime<Utc>,
) -> ComponentHealth {
    let (status, message) = match field.replaced_at {
        None => (HealthStatus::Unhealthy, Some("never populated".to_string())),
        Some(at) if now - at > stale_after => (
            HealthStatus::Degraded,
            Some(format!("last refreshed {}s ago", (now - at).num_seconds())),
        ),
        Some(_) => (HealthStatus::Healthy, None),
    };

    ComponentHealth {
        name: name.to_string(),
        status,
        entries: field.entries,
        replaced_at: field.replaced_at,
        message,
    }
}

/// Health of the cache, judged against the refresh interval.
///
/// Unhealthy until the initial population completes. Degraded when a field
/// has missed refreshes for longer than two intervals.
pub fn cache_health(status: &CacheStatus, refresh_interval: Duration, now: DateTime<Utc>) -> HealthResponse {
    let stale_after = refresh_interval
        .checked_mul(STALE_INTERVALS)
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or(chrono::Duration::MAX);

    let checks = vec![
        field_health("customers", &status.customers, stale_after, now),
        field_health("products", &status.products, stale_after, now),
        field_health("coupons", &status.coupons, stale_after, now),
    ];

    let overall = if !status.ready || checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthResponse {
        status: overall,
        ready: status.ready,
        checks,
    }
}

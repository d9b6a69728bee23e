//! In-process HTTP scenarios for the desk router.
//!
//! Requests go straight through the router with `tower::ServiceExt::oneshot`,
//! no listener involved.
//!
//! ```rust,ignore
//! let body: serde_json::Value = testing::get(app, "/coupons/bulk_tier_1")
//!     .execute()
//!     .await
//!     .assert_ok()
//!     .json()
//!     .await;
//! ```

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde::{Serialize, de::DeserializeOwned};
use tower::ServiceExt;

/// A single request against a router.
pub struct Scenario {
    app: Router,
    method: Method,
    uri: String,
    body: Option<String>,
}

impl Scenario {
    /// Create a GET scenario for `uri`.
    pub fn new(app: Router, uri: &str) -> Self {
        Self {
            app,
            method: Method::GET,
            uri: uri.to_string(),
            body: None,
        }
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Send `body` as JSON.
    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_string(body).expect("serializable body"));
        self
    }

    /// Send a raw string body with a JSON content type.
    pub fn raw_json(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Run the request.
    pub async fn execute(self) -> ScenarioAssert {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        let body = match self.body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");
        let response = self.app.oneshot(request).await.expect("infallible router");
        ScenarioAssert { response }
    }
}

/// Assertions over a response.
pub struct ScenarioAssert {
    response: axum::response::Response,
}

impl ScenarioAssert {
    /// Assert the response status code.
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    /// Assert status is 200 OK.
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    /// Assert status is 201 Created.
    pub fn assert_created(self) -> Self {
        self.assert_status(StatusCode::CREATED)
    }

    /// Assert status is 404 Not Found.
    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Parse the JSON response body.
    pub async fn json<T: DeserializeOwned>(self) -> T {
        let bytes = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }
}

/// Start a GET scenario.
pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app, uri)
}

/// Start a POST scenario.
pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app, uri).method(Method::POST)
}

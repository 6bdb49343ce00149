use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use super::setup::TestSetup;

/// Status and decoded JSON body of a response
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

// ============================================================================
// Action Helpers
// ============================================================================

#[allow(dead_code)]
impl TestSetup {
    /// Send a request through the full router
    pub async fn send(&self, request: Request<Body>) -> ApiResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        ApiResponse { status, body }
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "username": username, "password": password }).to_string(),
            ))
            .unwrap();
        self.send(request).await
    }

    /// Log in and return the issued token, panicking on failure
    pub async fn login_token(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.body["token"].as_str().unwrap().to_string()
    }

    pub async fn authed(&self, method: &str, uri: &str, token: &str) -> ApiResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn session_info(&self, token: &str) -> ApiResponse {
        self.authed("GET", "/api/session", token).await
    }

    pub async fn logout(&self, token: &str) -> ApiResponse {
        self.authed("POST", "/api/logout", token).await
    }

    pub async fn logout_everywhere(&self, token: &str) -> ApiResponse {
        self.authed("DELETE", "/api/sessions", token).await
    }
}

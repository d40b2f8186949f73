//! Token validation against the external identity service.

use crate::ports::auth::{AuthError, TokenValidator};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id: Option<f64>,
}

/// Asks the identity service who owns a token and compares it with `owner_id`.
#[derive(Debug, Clone)]
pub struct HttpTokenValidator {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenValidator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str, owner_id: &str) -> Result<bool, AuthError> {
        let owner: f64 = owner_id
            .trim()
            .parse()
            .map_err(|_| AuthError::InvalidOwnerId(owner_id.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            debug!(%status, "identity service rejected token");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "identity service answered {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        match body.id {
            Some(id) => Ok(id == owner),
            None => Err(AuthError::InvalidResponse("missing id".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn identity_service() -> String {
        async fn token(headers: HeaderMap) -> (axum::http::StatusCode, Json<Value>) {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer user-7") => (axum::http::StatusCode::OK, Json(json!({ "id": 7 }))),
                Some("Bearer broken") => (axum::http::StatusCode::OK, Json(json!({}))),
                _ => (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "invalid token" })),
                ),
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/token", post(token)))
                .await
                .unwrap();
        });
        format!("http://{}/token", addr)
    }

    #[tokio::test]
    async fn test_token_matches_owner() {
        let validator = HttpTokenValidator::new(identity_service().await, Duration::from_secs(5))
            .unwrap();
        assert!(validator.validate("Bearer user-7", "7").await.unwrap());
        assert!(!validator.validate("Bearer user-7", "8").await.unwrap());
        assert!(!validator.validate("Bearer nobody", "7").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_owner_and_response() {
        let validator = HttpTokenValidator::new(identity_service().await, Duration::from_secs(5))
            .unwrap();
        assert!(matches!(
            validator.validate("Bearer user-7", "seven").await,
            Err(AuthError::InvalidOwnerId(_))
        ));
        assert!(matches!(
            validator.validate("Bearer broken", "7").await,
            Err(AuthError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let validator =
            HttpTokenValidator::new("http://127.0.0.1:9/token", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            validator.validate("Bearer user-7", "7").await,
            Err(AuthError::Unreachable(_))
        ));
    }
}

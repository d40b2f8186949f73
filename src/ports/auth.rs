use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity service unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected identity response: {0}")]
    InvalidResponse(String),

    #[error("invalid owner id: {0}")]
    InvalidOwnerId(String),
}

/// Checks that a bearer token belongs to the given owner.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str, owner_id: &str) -> Result<bool, AuthError>;
}

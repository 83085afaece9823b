//! Authentication error taxonomy

use thiserror::Error;

use crate::common::ApiError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider profile lacked a field we cannot sign in without.
    #[error("Malformed provider profile: {0}")]
    MalformedProfile(String),

    /// Bad signature, expired token, or missing identity claims.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The access token is stale and there is no refresh token to renew it.
    #[error("Access token expired and no refresh token is available")]
    RefreshImpossible,

    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Short machine-readable code, used in sign-in redirects.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedProfile(_) => "MalformedProfile",
            AuthError::InvalidSession(_) => "InvalidSession",
            AuthError::RefreshImpossible => "RefreshImpossible",
            AuthError::Signing(_) => "SessionSigningFailed",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MalformedProfile(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidSession(_) | AuthError::RefreshImpossible => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Signing(msg) => ApiError::InternalServer(msg),
        }
    }
}

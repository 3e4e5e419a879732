//! Error taxonomy for the authorization flows.
//!
//! Internal variants carry detail for logging; the HTTP boundary collapses
//! them into the small OAuth2 error vocabulary (`invalid_grant`,
//! `invalid_request`, `server_error`) so callers cannot distinguish
//! not-found from expired from reused credentials.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::encryption::aes_cbc::CipherError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Code or refresh token not found, expired, or superseded.
    #[error("invalid or expired grant")]
    InvalidGrant,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The external verifier rejected the signed callback.
    #[error("signer could not be verified")]
    SignatureInvalid,
    /// A session's connection link was already established with a different id.
    #[error("connection already associated with session")]
    SessionLinkConflict,
    #[error("storage failure: {0}")]
    Storage(#[from] sea_orm::DbErr),
    /// Connection-token decryption failed its integrity check. Reported to
    /// callers as a plain invalid_request so decryption cannot be used as an
    /// oracle.
    #[error("cryptographic failure")]
    Cryptographic(#[from] CipherError),
    #[error("token signing failed: {0}")]
    Signing(#[from] crate::jwt::JwtError),
    #[error("signature verification unavailable: {0}")]
    Verifier(#[from] crate::cirrus::VerifierError),
}

/// OAuth2-style error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct OAuth2ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthError {
    fn oauth2_code(&self) -> &'static str {
        match self {
            AuthError::InvalidGrant => "invalid_grant",
            AuthError::InvalidRequest(_)
            | AuthError::SignatureInvalid
            | AuthError::SessionLinkConflict
            | AuthError::Cryptographic(_) => "invalid_request",
            AuthError::Storage(_) | AuthError::Signing(_) | AuthError::Verifier(_) => {
                "server_error"
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::Storage(_) | AuthError::Signing(_) | AuthError::Verifier(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn description(&self) -> Option<String> {
        match self {
            // No detail on why a grant was rejected.
            AuthError::InvalidGrant => Some("Invalid or expired grant".to_string()),
            AuthError::InvalidRequest(detail) => Some(detail.clone()),
            AuthError::SignatureInvalid => Some("Signer could not be verified".to_string()),
            AuthError::SessionLinkConflict => {
                Some("Session is already linked to a connection".to_string())
            }
            // Never surface that decryption specifically failed.
            AuthError::Cryptographic(_) => Some("Malformed request".to_string()),
            AuthError::Storage(_) | AuthError::Signing(_) | AuthError::Verifier(_) => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::Storage(e) => {
                tracing::error!("storage failure in auth flow: {e}");
            }
            AuthError::Signing(e) => {
                tracing::error!("token signing failure: {e}");
            }
            AuthError::Verifier(e) => {
                tracing::error!("wallet verifier unavailable: {e}");
            }
            _ => {}
        }
        let body = OAuth2ErrorBody {
            error: self.oauth2_code().to_string(),
            error_description: self.description(),
        };
        (self.status(), Json(body)).into_response()
    }
}

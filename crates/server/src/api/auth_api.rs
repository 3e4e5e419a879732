//! Authorization, token and key endpoints.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::api::{ApiState, AUTH_TAG};
use crate::error::{AuthError, OAuth2ErrorBody};
use crate::flow::TokenPair;
use crate::jwt::JwkSet;
use crate::pkce::CodeChallengeMethod;

pub(crate) fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(token))
        .routes(routes!(keys))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuthorizeParams {
    /// `code` for the PKCE flow, `sid` for the wallet connection-token flow.
    pub response_type: String,
    pub redirect_uri: Option<String>,
    pub code_challenge: Option<String>,
    /// `S256` or `plain`.
    pub code_challenge_method: Option<String>,
    /// Opaque CSRF value, returned unchanged on the redirect.
    pub state: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub uid: Option<String>,
    pub exp: Option<i64>,
    #[serde(alias = "publicKey")]
    pub public_key: Option<String>,
    pub signature: Option<String>,
    pub refresh_token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/authorize",
    tag = AUTH_TAG,
    operation_id = "Authorize",
    summary = "Start a sign-in",
    params(AuthorizeParams),
    responses(
        (status = 303, description = "Redirect to the sign-in prompt (code flow)"),
        (status = 200, description = "Connection token URI (sid flow)", body = str, content_type = "text/plain"),
        (status = 400, description = "Invalid request parameters", body = OAuth2ErrorBody),
    )
)]
#[tracing::instrument(skip(state))]
async fn authorize(
    State(state): State<ApiState>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, AuthError> {
    match params.response_type.as_str() {
        "code" => {
            let redirect_uri = params
                .redirect_uri
                .ok_or_else(|| AuthError::InvalidRequest("redirect_uri is required".into()))?;
            let challenge = params
                .code_challenge
                .ok_or_else(|| AuthError::InvalidRequest("code_challenge is required".into()))?;
            let method = params
                .code_challenge_method
                .as_deref()
                .and_then(CodeChallengeMethod::from_stored)
                .ok_or_else(|| {
                    AuthError::InvalidRequest("code_challenge_method must be S256 or plain".into())
                })?;
            let (_, mut prompt_uri) = state
                .flow
                .begin_code_session(&redirect_uri, &challenge, method)
                .await?;
            if let Some(csrf) = params.state {
                prompt_uri.push_str("&state=");
                prompt_uri.push_str(&urlencoding::encode(&csrf));
            }
            Ok(Redirect::to(&prompt_uri).into_response())
        }
        "sid" => {
            let sid = state.flow.begin_sid_session().await?;
            Ok(sid.to_string().into_response())
        }
        _ => Err(AuthError::InvalidRequest(
            "response_type must be code or sid".into(),
        )),
    }
}

#[utoipa::path(
    post,
    path = "/token",
    tag = AUTH_TAG,
    operation_id = "Token",
    summary = "Exchange a grant for tokens",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Invalid grant or request", body = OAuth2ErrorBody),
        (status = 500, description = "Internal server error", body = OAuth2ErrorBody),
    )
)]
#[tracing::instrument(skip(state, request), fields(grant_type = %request.grant_type))]
async fn token(
    State(state): State<ApiState>,
    axum::Form(request): axum::Form<TokenRequest>,
) -> Result<Response, AuthError> {
    let pair = match request.grant_type.as_str() {
        "authorization_code" => {
            let code = request
                .code
                .as_deref()
                .and_then(|c| Uuid::parse_str(c).ok())
                .ok_or(AuthError::InvalidGrant)?;
            let verifier = request
                .code_verifier
                .ok_or_else(|| AuthError::InvalidRequest("code_verifier is required".into()))?;
            state.flow.redeem_code(code, &verifier).await?
        }
        "sid" => {
            let (uid, exp, public_key, signature) = sid_grant_fields(&request)?;
            state.flow.redeem_sid(uid, exp, public_key, signature).await?
        }
        "refresh_token" => {
            let refresh = request
                .refresh_token
                .ok_or_else(|| AuthError::InvalidRequest("refresh_token is required".into()))?;
            state.flow.refresh(&refresh).await?
        }
        _ => {
            return Err(AuthError::InvalidRequest(
                "grant_type must be authorization_code, sid or refresh_token".into(),
            ));
        }
    };

    Ok((no_store_headers(), Json(pair)).into_response())
}

#[utoipa::path(
    get,
    path = "/keys",
    tag = AUTH_TAG,
    operation_id = "Keys",
    summary = "Published signing keys",
    responses(
        (status = 200, description = "JWKS document", body = JwkSet),
    )
)]
async fn keys(State(state): State<ApiState>) -> (StatusCode, Json<JwkSet>) {
    (StatusCode::OK, Json(state.flow.public_keys()))
}

fn sid_grant_fields(request: &TokenRequest) -> Result<(&str, i64, &str, &str), AuthError> {
    match (
        request.uid.as_deref(),
        request.exp,
        request.public_key.as_deref(),
        request.signature.as_deref(),
    ) {
        (Some(uid), Some(exp), Some(public_key), Some(signature)) => {
            Ok((uid, exp, public_key, signature))
        }
        _ => Err(AuthError::InvalidRequest(
            "uid, exp, public_key and signature are required".into(),
        )),
    }
}

/// Token responses must never be cached (RFC 6749 §5.1).
fn no_store_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

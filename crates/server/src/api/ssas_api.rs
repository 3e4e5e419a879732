//! Wallet signature callback.
//!
//! Wallets post here after the user signs a connection token shown by the
//! prompt page. The uid/exp pair comes from the token's own query string;
//! the body carries the signature material.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{ApiState, SSAS_TAG};
use crate::error::{AuthError, OAuth2ErrorBody};

pub(crate) fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new().routes(routes!(callback))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackParams {
    pub uid: String,
    pub exp: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackBody {
    /// Wallet address that produced the signature.
    pub public_key: String,
    pub signature: String,
}

#[utoipa::path(
    post,
    path = "/callback",
    tag = SSAS_TAG,
    operation_id = "SSAS Callback",
    summary = "Accept a signed connection token",
    params(CallbackParams),
    request_body = CallbackBody,
    responses(
        (status = 204, description = "Signature accepted, code pushed to the waiting client"),
        (status = 400, description = "Invalid or expired token, or bad signature", body = OAuth2ErrorBody),
        (status = 500, description = "Internal server error", body = OAuth2ErrorBody),
    )
)]
#[tracing::instrument(skip(state, body))]
async fn callback(
    State(state): State<ApiState>,
    Query(params): Query<CallbackParams>,
    Json(body): Json<CallbackBody>,
) -> Result<StatusCode, AuthError> {
    state
        .flow
        .wallet_callback(&params.uid, params.exp, &body.public_key, &body.signature)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

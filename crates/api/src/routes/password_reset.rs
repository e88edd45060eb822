//! Password-reset routes

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use super::auth::MessageResponse;
use crate::{auth::RequestContext, error::ApiResult, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// Username or email
    pub identity: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResetRequest {
    pub token_id: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResetRequest {
    pub token_id: String,
    pub secret: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResetResponse {
    pub valid: bool,
}

/// Always answers the same way, whether or not the identity exists
pub async fn request_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ResetRequest>,
) -> Json<MessageResponse> {
    let ctx = RequestContext::from_headers(&headers);

    if let Err(e) = state.resets.issue(&req.identity, &ctx).await {
        tracing::warn!(error = %e, "Password reset request not processed");
    }

    Json(MessageResponse {
        message: "If an account matches, a password reset link has been sent.".to_string(),
    })
}

pub async fn verify_reset(
    State(state): State<AppState>,
    Json(req): Json<VerifyResetRequest>,
) -> ApiResult<Json<VerifyResetResponse>> {
    state.resets.verify_only(&req.token_id, &req.secret).await?;
    Ok(Json(VerifyResetResponse { valid: true }))
}

pub async fn consume_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConsumeResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let ctx = RequestContext::from_headers(&headers);
    state
        .resets
        .consume(&req.token_id, &req.secret, &req.new_password, &ctx)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated. Sign in with your new password.".to_string(),
    }))
}

//! Administrative session inventory

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{
    audit_constants::{admin_action, event_type},
    auth::{AuthSession, SessionView},
    error::ApiResult,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

/// List every tracked session, most recently active first
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
) -> ApiResult<Json<SessionListResponse>> {
    let sessions = state.inventory.list().await?;

    tracing::info!(
        event = admin_action::SESSIONS_LISTED,
        event_type = event_type::ADMIN_ACTION,
        user_id = %auth.principal_id,
        count = sessions.len(),
        "Session inventory listed"
    );

    Ok(Json(SessionListResponse { sessions }))
}

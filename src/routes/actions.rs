use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::{error::AppResult, routes::AppState, services::LoggedAction};

#[derive(Debug, Deserialize)]
pub struct ActionsRequest {
    pub user_id: String,
    pub actions: Vec<LoggedAction>,
}

pub async fn log(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActionsRequest>,
) -> AppResult<StatusCode> {
    state
        .service
        .log_actions(&request.user_id, request.actions)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

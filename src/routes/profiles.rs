use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult, middleware::request_id::RequestId, models::UserProfile, routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    #[serde(default)]
    pub experiment_group: Option<u8>,
}

/// Creates a profile, or returns the existing one with 200
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        "Creating profile"
    );

    let (profile, created) = state
        .service
        .create_profile(&request.user_id, request.experiment_group)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(profile)))
}

pub async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.service.complete_onboarding(&user_id).await?;
    Ok(Json(profile))
}

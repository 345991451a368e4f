use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::{
    error::AppResult, middleware::request_id::RequestId, routes::AppState,
    services::RatingTarget,
};

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub user_id: String,
    /// Parsed by the service so unknown names surface as `UnknownDimension`
    pub dimension: String,
    pub target: RatingTarget,
    pub ratings: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub applied: usize,
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RatingRequest>,
) -> AppResult<Json<RatingResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        dimension = %request.dimension,
        target = ?request.target,
        count = request.ratings.len(),
        "Submitting ratings"
    );

    let applied = state
        .service
        .submit(
            &request.user_id,
            &request.dimension,
            request.target,
            request.ratings,
        )
        .await?;

    Ok(Json(RatingResponse { applied }))
}

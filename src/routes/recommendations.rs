use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    routes::AppState,
    services::{ranker::Combination, RecommendationBatch},
};

fn default_num_wanted() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(default = "default_num_wanted")]
    pub num_wanted: usize,
    /// Manual override of the experiment routing
    #[serde(default)]
    pub strategy: Option<Combination>,
}

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationBatch>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        num_wanted = request.num_wanted,
        "Processing recommendation request"
    );

    let batch = state
        .service
        .rank(&request.user_id, request.num_wanted, request.strategy)
        .await?;

    tracing::info!(
        request_id = %request_id,
        returned = batch.recipes.len(),
        strategy = ?batch.strategy,
        "Recommendations returned"
    );

    Ok(Json(batch))
}

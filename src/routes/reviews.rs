use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::{error::AppResult, models::RecipeReview, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct ReviewsRequest {
    pub user_id: String,
    /// Recipe id to review
    pub reviews: HashMap<String, RecipeReview>,
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub applied: usize,
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReviewsRequest>,
) -> AppResult<Json<ReviewsResponse>> {
    let applied = state
        .service
        .submit_reviews(&request.user_id, request.reviews)
        .await?;
    Ok(Json(ReviewsResponse { applied }))
}

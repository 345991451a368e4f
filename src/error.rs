use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures raised by the rating and ranking engine
///
/// Per-ingredient and per-candidate variants are normally recovered by the
/// caller skipping the affected item. Only per-user variants reach the client.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("No rating available for item {0}")]
    NoRatingAvailable(String),

    #[error("No ingredient of recipe {0} could be rated")]
    NoIngredientRatings(String),

    #[error("Onboarding incomplete: {rated} of {required} required ratings")]
    OnboardingIncomplete { rated: usize, required: usize },

    #[error("Unknown rating dimension: {0}")]
    UnknownDimension(String),

    #[error("No candidate recipes could be scored")]
    NoCandidatesAvailable,

    #[error("Recipe {0} has no precomputed surprise data")]
    MissingSurpriseData(String),

    #[error("Surprise model error: {0}")]
    Model(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lock error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(engine) => match engine {
                EngineError::UnknownDimension(_) => StatusCode::BAD_REQUEST,
                EngineError::OnboardingIncomplete { .. } => StatusCode::CONFLICT,
                EngineError::NoCandidatesAvailable => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::NoRatingAvailable(_)
                | EngineError::NoIngredientRatings(_)
                | EngineError::MissingSurpriseData(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::StoreUnavailable(_) | AppError::Database(_) | AppError::Cache(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

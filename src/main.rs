use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;

use qchef_api::{
    catalog::Catalog,
    config::Config,
    db::{
        create_pool, create_redis_client, InMemoryProfileStore, NoopProfileLock, PgProfileStore,
        ProfileLock, ProfileStore, RedisProfileLock,
    },
    routes::{create_router, AppState},
    services::{classifier::ClassifierEnsemble, RecommendationService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qchef_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let catalog = Catalog::load_from_dir(&config.catalog_dir)
        .with_context(|| format!("Failed to load catalog from {}", config.catalog_dir))?;

    let models = match &config.surprise_model_path {
        Some(path) => {
            let ensemble = ClassifierEnsemble::from_file(path)?;
            tracing::info!(path = %path, features = ensemble.feature_len(), "Surprise classifiers loaded");
            Some(Arc::new(ensemble))
        }
        None => {
            tracing::info!("No surprise classifiers configured, using the simple model");
            None
        }
    };

    let (profiles, lock): (Arc<dyn ProfileStore>, Arc<dyn ProfileLock>) = if config.use_memory_store {
        tracing::warn!("Using in-memory profile store; profiles are lost on restart");
        (Arc::new(InMemoryProfileStore::new()), Arc::new(NoopProfileLock))
    } else {
        let pool = create_pool(&config.database_url).await?;
        tracing::info!("Connected to PostgreSQL");
        let client = create_redis_client(&config.redis_url)?;
        (
            Arc::new(PgProfileStore::new(pool)),
            Arc::new(RedisProfileLock::new(client)),
        )
    };

    let service = RecommendationService::new(
        profiles,
        lock,
        Arc::new(catalog),
        models,
        config.server_flags(),
    )
    .with_onboarding_excluded(config.exclude_onboarding_recipes)
    .with_experiment_groups(config.num_experiment_groups);

    let app = create_router(AppState::new(service)).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Q-Chef API listening");

    axum::serve(listener, app).await?;
    Ok(())
}

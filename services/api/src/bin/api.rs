//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{AnkiConnectAdapter, ChatCompletionAdapter, JsonFileStore},
    config::Config,
    error::ApiError,
    web::{cors::cors_layer, router, rest::ApiDoc, state::AppState},
};
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open Storage ---
    info!("Opening storage at {}", config.storage_path.display());
    let storage = Arc::new(JsonFileStore::open(&config.storage_path).await?);

    // --- 3. Initialize Service Adapters ---
    let model = Arc::new(ChatCompletionAdapter::new(config.model_api_base.clone()));
    let sink = Arc::new(AnkiConnectAdapter::new(
        config.anki_connect_url.clone(),
        config.anki_min_version,
    )?);
    info!(
        "Model endpoint {}, flashcard app at {}",
        config.model_api_base, config.anki_connect_url
    );

    // --- 4. Build the Shared AppState (migrates the highlight store) ---
    let app_state = Arc::new(AppState::new(config.clone(), storage, model, sink).await?);

    // --- 5. CORS ---
    let cors = cors_layer(config.allowed_origin.as_deref())?;

    // --- 6. Create the Web Router ---
    let api_router = router(app_state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

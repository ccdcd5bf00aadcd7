//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    messages,
    protocol::{ActionEnvelope, ReplyEnvelope},
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use study_cards_core::ports::PortError;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        badge_handler,
        messages::message_handler,
    ),
    components(
        schemas(HealthResponse, BadgeResponse, ActionEnvelope, ReplyEnvelope)
    ),
    tags(
        (name = "Study Cards API", description = "Companion service for the study-cards browser extension.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// The toolbar badge for the active tab. An empty `text` means no badge.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BadgeResponse {
    text: String,
    color: Option<String>,
    active_url: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is running", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// The badge currently shown for the active tab.
#[utoipa::path(
    get,
    path = "/badge",
    responses(
        (status = 200, description = "Current badge", body = BadgeResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn badge_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = async {
        let badge = app_state.badge.current()?;
        let active_url = app_state.badge.active_url()?;
        Ok::<_, PortError>(BadgeResponse {
            text: badge.text,
            color: badge.color.map(str::to_string),
            active_url,
        })
    }
    .await;

    match result {
        Ok(badge) => Ok(Json(badge)),
        Err(e) => {
            error!("Failed to read badge: {:?}", e);
            Err((status_for(&e), e.to_string()))
        }
    }
}

/// Maps a port error onto the closest HTTP status.
pub fn status_for(e: &PortError) -> StatusCode {
    match e {
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Network(_) | PortError::Rejected(_) | PortError::MalformedResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
        PortError::Storage(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

//! REST API server for the roadmap pipeline
//!
//! Thin collaborator surface: it calls `run_pipeline` and returns the
//! result. No auth or persistence lives here.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::models::Profile;
use crate::pipeline::Pipeline;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapRequest {
    pub zip_code: String,
    pub ownership_status: String,
    pub home_type: String,
    pub income_range: String,
    pub heating_system: String,
    pub home_age_year: Option<i32>,
    #[serde(default)]
    pub monthly_electric_bill: Option<f64>,
    #[serde(default)]
    pub monthly_gas_bill: Option<f64>,
}

impl From<RoadmapRequest> for Profile {
    fn from(req: RoadmapRequest) -> Self {
        Profile {
            zip_code: req.zip_code,
            ownership_status: req.ownership_status,
            home_type: req.home_type,
            income_range: req.income_range,
            heating_system: req.heating_system,
            home_age_year: req.home_age_year,
            monthly_electric_bill: req.monthly_electric_bill,
            monthly_gas_bill: req.monthly_gas_bill,
        }
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Roadmap Endpoint
/// =============================

async fn generate_roadmap(
    State(state): State<ApiState>,
    Json(req): Json<RoadmapRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(zip = %req.zip_code, "Received roadmap request");

    let profile: Profile = req.into();

    match state.pipeline.run_pipeline(profile).await {
        Ok(Some(roadmap)) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "roadmap": roadmap,
            }))),
        ),
        // "No roadmap" is a valid, expected outcome, not an exception.
        Ok(None) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "roadmap": serde_json::Value::Null,
                "message": "No roadmap could be generated for this profile.",
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Pipeline failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(pipeline: Arc<Pipeline>) -> Router {
    let state = ApiState { pipeline };

    Router::new()
        .route("/health", get(health))
        .route("/api/roadmap", post(generate_roadmap))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    pipeline: Arc<Pipeline>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

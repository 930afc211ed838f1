use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::router::appointment_routes;
use clinic_cell::router::clinic_routes;
use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/doctors", doctor_routes(state.clone()))
        .nest("/api/clinics", clinic_routes(state.clone()))
        .nest("/api/appointments", appointment_routes(state.clone()))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "MediBook API is running",
    }))
}

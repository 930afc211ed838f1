// libs/clinic-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::pagination::{PageMeta, PageParams};

use crate::models::{ClinicError, ClinicSearchFilters, CreateClinicRequest, UpdateClinicRequest};
use crate::services::clinic::ClinicService;

fn map_clinic_error(e: ClinicError) -> AppError {
    match e {
        ClinicError::NotFound => AppError::NotFound("Clinic not found".to_string()),
        ClinicError::ValidationError(msg) => AppError::ValidationError(msg),
        ClinicError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_clinics(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<ClinicSearchFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let (clinics, total) = service
        .search_clinics(&filters, &page)
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({
        "success": true,
        "items": clinics,
        "pagination": PageMeta::new(&page, total),
    })))
}

#[axum::debug_handler]
pub async fn get_clinic(
    State(state): State<Arc<AppConfig>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let clinic = service.get_clinic(clinic_id).await.map_err(map_clinic_error)?;

    Ok(Json(json!({
        "success": true,
        "clinic": clinic,
    })))
}

#[axum::debug_handler]
pub async fn create_clinic(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateClinicRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can create clinics".to_string(),
        ));
    }

    let service = ClinicService::new(&state);

    let clinic = service
        .create_clinic(request, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "clinic": clinic,
            "message": "Clinic created"
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_clinic(
    State(state): State<Arc<AppConfig>>,
    Path(clinic_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateClinicRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() && !user.is_clinic_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to update this clinic".to_string(),
        ));
    }

    let service = ClinicService::new(&state);

    let clinic = service
        .update_clinic(clinic_id, request, auth.token())
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({
        "success": true,
        "clinic": clinic,
        "message": "Clinic updated"
    })))
}

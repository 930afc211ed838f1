// libs/doctor-cell/src/handlers.rs
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

use crate::models::{CreateDoctorRequest, DirectoryError, DoctorSearchFilters, UpdateDoctorRequest};
use crate::services::directory::DoctorService;

fn map_directory_error(e: DirectoryError) -> AppError {
    match e {
        DirectoryError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DirectoryError::EmailTaken(email) => {
            AppError::Conflict(format!("Doctor with email {} already exists", email))
        }
        DirectoryError::ValidationError(msg) => AppError::ValidationError(msg),
        DirectoryError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Public directory listing with filters and pagination.
#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(filters): Query<DoctorSearchFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let (doctors, total) = service
        .search_doctors(&filters, &page)
        .await
        .map_err(map_directory_error)?;

    Ok(Json(json!({
        "success": true,
        "items": doctors,
        "pagination": PageMeta::new(&page, total),
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service
        .get_doctor(doctor_id, None)
        .await
        .map_err(map_directory_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
    })))
}

/// Admin only: register a new doctor profile.
#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can create doctor profiles".to_string(),
        ));
    }

    let service = DoctorService::new(&state);

    let doctor = service
        .create_doctor(request, auth.token())
        .await
        .map_err(map_directory_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "doctor": doctor,
            "message": "Doctor profile created"
        })),
    ))
}

/// Admin or the doctor themself. Verification flips are admin only.
#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let is_self = user.is_doctor() && user.id == doctor_id.to_string();

    if !user.is_admin() && !is_self {
        return Err(AppError::Forbidden(
            "Not authorized to update this doctor profile".to_string(),
        ));
    }

    let service = DoctorService::new(&state);

    let doctor = service
        .update_doctor(doctor_id, request, user.is_admin(), auth.token())
        .await
        .map_err(map_directory_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile updated"
    })))
}

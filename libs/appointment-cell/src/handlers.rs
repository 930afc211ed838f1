// libs/appointment-cell/src/handlers.rs
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

use crate::models::{
    AppointmentError, AppointmentListQuery, CreateAppointmentRequest, RateAppointmentRequest,
    TransitionStatusRequest, UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::policy;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::DoctorNotBookable => {
            AppError::ValidationError("Doctor is not accepting appointments".to_string())
        }
        AppointmentError::SlotTaken => {
            AppError::Conflict("Appointment slot is already taken".to_string())
        }
        AppointmentError::InvalidTime(msg) => AppError::ValidationError(msg),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::InvalidStatusTransition { from, to } => {
            AppError::InvalidState(format!("Appointment cannot change from {} to {}", from, to))
        }
        AppointmentError::TerminalState(status) => {
            AppError::InvalidState(format!("Appointment in status {} can no longer be modified", status))
        }
        AppointmentError::NotAuthorized => {
            AppError::Forbidden("Not authorized to perform this action on the appointment".to_string())
        }
        AppointmentError::RatingNotAllowed => {
            AppError::InvalidState("Only completed appointments can be rated".to_string())
        }
        AppointmentError::AlreadyRated => {
            AppError::AlreadyRated("Appointment has already been rated".to_string())
        }
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn parse_principal_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Principal id is not a valid identifier".to_string()))
}

/// Book a slot. The patient is always the authenticated principal.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !user.is_patient() && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only patients can book appointments".to_string(),
        ));
    }

    let patient_id = parse_principal_id(&user)?;
    let service = AppointmentBookingService::new(&state);

    let appointment = service
        .create_appointment(patient_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let (appointments, total) = service
        .list_appointments(&user, &query, &page, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "items": appointments,
        "pagination": PageMeta::new(&page, total),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    if !policy::can_view(&user, &appointment) {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service
        .update_appointment(appointment_id, request, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service
        .cancel_appointment(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

/// Clinical status transitions (confirm / complete / missed) and admin
/// cancellations.
#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<TransitionStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let appointment = service
        .transition_status(appointment_id, request.status, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment status updated"
    })))
}

/// Rate a completed appointment. The doctor's summary refresh happens
/// before the response; if it fails the rating still stands and the
/// response carries a null summary.
#[axum::debug_handler]
pub async fn rate_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);

    let (appointment, summary) = service
        .rate_appointment(appointment_id, request, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "doctor_rating": summary,
        "message": "Appointment rated successfully"
    })))
}

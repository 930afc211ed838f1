// libs/appointment-cell/src/services/booking.rs
use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::RatingSummary;
use doctor_cell::services::directory::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_models::auth::User;
use shared_utils::pagination::PageParams;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, RateAppointmentRequest, Reminder, UpdateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy;
use crate::services::rating::RatingAggregator;

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 180;
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

fn time_format() -> &'static Regex {
    static TIME_FORMAT: OnceLock<Regex> = OnceLock::new();
    TIME_FORMAT.get_or_init(|| {
        Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex")
    })
}

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    lifecycle: AppointmentLifecycleService,
    doctors: DoctorService,
    aggregator: RatingAggregator,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            doctors: DoctorService::new(config),
            aggregator: RatingAggregator::new(config),
        }
    }

    /// Book a slot for a patient.
    ///
    /// The conflict pre-check below only exists to return a friendly error
    /// in the common case. The store's partial unique index on
    /// (doctor_id, date, time) over non-cancelled/non-missed rows is the
    /// authoritative guard: a concurrent booker losing that race gets the
    /// same `SlotTaken` via the 409 translation.
    pub async fn create_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} {}",
            patient_id, request.doctor_id, request.date, request.time
        );

        validate_time(&request.time)?;
        let duration = validate_duration(request.duration_minutes)?;
        validate_online_link(request.is_online, request.online_link.as_deref())?;
        validate_future_date(request.date)?;

        let doctor = self
            .doctors
            .get_doctor(request.doctor_id, Some(auth_token))
            .await
            .map_err(|e| match e {
                doctor_cell::models::DirectoryError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        if !doctor.is_bookable() {
            return Err(AppointmentError::DoctorNotBookable);
        }

        if self
            .find_slot_conflict(request.doctor_id, request.date, &request.time, None, auth_token)
            .await?
            .is_some()
        {
            warn!(
                "Slot conflict for doctor {} at {} {}",
                request.doctor_id, request.date, request.time
            );
            return Err(AppointmentError::SlotTaken);
        }

        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "date": request.date,
            "time": request.time,
            "duration_minutes": duration,
            "specialty": request.specialty,
            "reason": request.reason,
            "notes": null,
            "status": AppointmentStatus::Scheduled,
            // Fee snapshot: later directory fee changes never touch this row.
            "price": doctor.consultation_fee,
            "is_online": request.is_online,
            "online_link": request.online_link,
            "payment_method": request.payment_method,
            "paid": false,
            "reminder": Reminder::default(),
            "rating": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                return_representation(),
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => AppointmentError::SlotTaken,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let appointment = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| match e {
                DbError::NotFound(_) => AppointmentError::NotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Role-scoped listing: patients see their own appointments, doctors
    /// their own schedule, admins everything (optionally narrowed).
    pub async fn list_appointments(
        &self,
        user: &User,
        query: &AppointmentListQuery,
        page: &PageParams,
        auth_token: &str,
    ) -> Result<(Vec<Appointment>, i64), AppointmentError> {
        let mut path = String::from("/rest/v1/appointments?");

        if user.is_admin() {
            if let Some(patient_id) = query.patient_id {
                path.push_str(&format!("patient_id=eq.{}&", patient_id));
            }
            if let Some(doctor_id) = query.doctor_id {
                path.push_str(&format!("doctor_id=eq.{}&", doctor_id));
            }
        } else if user.is_doctor() {
            path.push_str(&format!("doctor_id=eq.{}&", urlencoding::encode(&user.id)));
        } else {
            path.push_str(&format!("patient_id=eq.{}&", urlencoding::encode(&user.id)));
        }

        if let Some(status) = query.status {
            path.push_str(&format!("status=eq.{}&", status));
        }
        if let Some(from) = query.from {
            path.push_str(&format!("date=gte.{}&", from));
        }
        if let Some(to) = query.to {
            path.push_str(&format!("date=lte.{}&", to));
        }

        path.push_str(&format!(
            "order=date.asc,time.asc&limit={}&offset={}",
            page.limit(),
            page.offset()
        ));

        self.supabase
            .request_counted(&path, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// Reschedule and bookkeeping updates by the owning patient or admin.
    /// A date/time move re-runs the slot conflict check, excluding the
    /// appointment itself so a no-op move stays legal.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !policy::can_update(user, &current) {
            return Err(AppointmentError::NotAuthorized);
        }
        if current.status.is_terminal() {
            return Err(AppointmentError::TerminalState(current.status));
        }

        let mut update_data = serde_json::Map::new();

        if request.reschedules() {
            let new_date = request.date.unwrap_or(current.date);
            let new_time = request.time.clone().unwrap_or_else(|| current.time.clone());

            validate_time(&new_time)?;
            validate_future_date(new_date)?;

            if self
                .find_slot_conflict(
                    current.doctor_id,
                    new_date,
                    &new_time,
                    Some(appointment_id),
                    auth_token,
                )
                .await?
                .is_some()
            {
                return Err(AppointmentError::SlotTaken);
            }

            update_data.insert("date".to_string(), json!(new_date));
            update_data.insert("time".to_string(), json!(new_time));
        }

        if let Some(duration) = request.duration_minutes {
            let duration = validate_duration(Some(duration))?;
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(reason) = request.reason {
            update_data.insert("reason".to_string(), json!(reason));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(paid) = request.paid {
            update_data.insert("paid".to_string(), json!(paid));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_appointment(appointment_id, Value::Object(update_data), auth_token)
            .await
    }

    /// Move an appointment through its lifecycle. Authorization is decided
    /// by the capability policy, then the state machine has the last word.
    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !policy::can_transition(user, &current, &new_status) {
            return Err(AppointmentError::NotAuthorized);
        }

        self.lifecycle
            .validate_status_transition(&current.status, &new_status)?;

        info!(
            "Appointment {} transitioning {} -> {}",
            appointment_id, current.status, new_status
        );

        let body = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_appointment(appointment_id, body, auth_token).await
    }

    /// Cancellation is just a status transition; the slot frees implicitly
    /// because the conflict predicate skips cancelled rows.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.transition_status(appointment_id, AppointmentStatus::Cancelled, user, auth_token)
            .await
    }

    /// Attach a rating and synchronously refresh the doctor's summary.
    ///
    /// Returns the updated appointment and the refreshed summary. If the
    /// recompute fails after the rating write landed, the rating is kept,
    /// the failure is logged, and `None` is returned for the summary - the
    /// aggregate stays stale until the next successful recompute.
    pub async fn rate_appointment(
        &self,
        appointment_id: Uuid,
        request: RateAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<(Appointment, Option<RatingSummary>), AppointmentError> {
        if !(1..=5).contains(&request.value) {
            return Err(AppointmentError::ValidationError(
                "Rating value must be between 1 and 5".to_string(),
            ));
        }

        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !policy::can_rate(user, &current) {
            return Err(AppointmentError::NotAuthorized);
        }
        if current.status != AppointmentStatus::Completed {
            return Err(AppointmentError::RatingNotAllowed);
        }
        if current.rating.is_some() {
            return Err(AppointmentError::AlreadyRated);
        }

        let body = json!({
            "rating": {
                "value": request.value,
                "comment": request.comment,
                "rated_at": Utc::now().to_rfc3339()
            },
            "updated_at": Utc::now().to_rfc3339()
        });

        let appointment = self.patch_appointment(appointment_id, body, auth_token).await?;

        let summary = match self
            .aggregator
            .recompute_doctor_rating(appointment.doctor_id, auth_token)
            .await
        {
            Ok(summary) => Some(summary),
            Err(e) => {
                // The rating itself is committed; surface the stale
                // aggregate instead of failing the request.
                warn!(
                    "Rating stored for appointment {} but summary recompute failed for doctor {}: {}",
                    appointment_id, appointment.doctor_id, e
                );
                None
            }
        };

        Ok((appointment, summary))
    }

    /// Used by the out-of-process reminder job; no HTTP route.
    pub async fn mark_reminder_sent(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let body = json!({
            "reminder": { "sent": true, "sent_at": Utc::now().to_rfc3339() },
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_appointment(appointment_id, body, auth_token).await
    }

    /// Look for another live appointment occupying the same slot.
    async fn find_slot_conflict(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&time=eq.{}&status=not.in.(cancelled,missed)",
            doctor_id,
            date,
            urlencoding::encode(time)
        );
        if let Some(exclude) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }
        path.push_str("&limit=1");

        let result: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(result.into_iter().find(|a| a.occupies_slot()))
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                return_representation(),
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => AppointmentError::SlotTaken,
                DbError::NotFound(_) => AppointmentError::NotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }
}

// ==============================================================================
// VALIDATION HELPERS
// ==============================================================================

fn validate_time(time: &str) -> Result<(), AppointmentError> {
    if !time_format().is_match(time) {
        return Err(AppointmentError::InvalidTime(format!(
            "Time must be in 24-hour HH:MM format, got '{}'",
            time
        )));
    }
    Ok(())
}

fn validate_duration(duration: Option<i32>) -> Result<i32, AppointmentError> {
    let duration = duration.unwrap_or(DEFAULT_DURATION_MINUTES);
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
        return Err(AppointmentError::ValidationError(format!(
            "Duration must be between {} and {} minutes",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(duration)
}

fn validate_online_link(is_online: bool, online_link: Option<&str>) -> Result<(), AppointmentError> {
    if is_online && online_link.map_or(true, |link| link.trim().is_empty()) {
        return Err(AppointmentError::ValidationError(
            "Online appointments require a meeting link".to_string(),
        ));
    }
    Ok(())
}

fn validate_future_date(date: NaiveDate) -> Result<(), AppointmentError> {
    if date <= Utc::now().date_naive() {
        return Err(AppointmentError::InvalidTime(
            "Appointment date must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_times() {
        for time in ["00:00", "9:30", "09:30", "23:59", "12:05"] {
            assert!(validate_time(time).is_ok(), "expected {} to be valid", time);
        }
    }

    #[test]
    fn rejects_malformed_times() {
        for time in ["24:00", "12:60", "9.30", "0900", "noon", ""] {
            assert!(validate_time(time).is_err(), "expected {} to be invalid", time);
        }
    }

    #[test]
    fn duration_defaults_to_thirty() {
        assert_eq!(validate_duration(None).unwrap(), 30);
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        assert_eq!(validate_duration(Some(15)).unwrap(), 15);
        assert_eq!(validate_duration(Some(180)).unwrap(), 180);
        assert!(validate_duration(Some(14)).is_err());
        assert!(validate_duration(Some(181)).is_err());
    }

    #[test]
    fn online_booking_requires_link() {
        assert!(validate_online_link(true, None).is_err());
        assert!(validate_online_link(true, Some("  ")).is_err());
        assert!(validate_online_link(true, Some("https://meet.example.com/a")).is_ok());
        assert!(validate_online_link(false, None).is_ok());
    }

    #[test]
    fn past_and_today_dates_are_rejected() {
        let today = Utc::now().date_naive();
        assert!(validate_future_date(today).is_err());
        assert!(validate_future_date(today.pred_opt().unwrap()).is_err());
        assert!(validate_future_date(today.succ_opt().unwrap()).is_ok());
    }
}

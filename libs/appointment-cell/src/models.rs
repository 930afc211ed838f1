// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// Time of day in 24-hour "HH:MM" form; part of the slot key.
    pub time: String,
    pub duration_minutes: i32,
    pub specialty: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    /// Snapshot of the doctor's consultation fee at booking time. Never
    /// re-read from the directory after creation.
    pub price: f64,
    pub is_online: bool,
    pub online_link: Option<String>,
    pub payment_method: PaymentMethod,
    pub paid: bool,
    #[serde(default)]
    pub reminder: Reminder,
    pub rating: Option<AppointmentRating>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this row occupies its (doctor, date, time) slot for the
    /// purposes of the uniqueness invariant.
    pub fn occupies_slot(&self) -> bool {
        self.status.counts_for_slot()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Missed,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Missed
        )
    }

    /// Cancelled and missed appointments release their slot; everything
    /// else holds it.
    pub fn counts_for_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Missed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Missed => write!(f, "missed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

/// Flipped by the out-of-process reminder job; carried on every row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reminder {
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Attached at most once, by the owning patient, on a completed
/// appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRating {
    pub value: i32,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub specialty: String,
    pub reason: Option<String>,
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub is_online: bool,
    pub online_link: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub paid: Option<bool>,
}

impl UpdateAppointmentRequest {
    pub fn reschedules(&self) -> bool {
        self.date.is_some() || self.time.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateAppointmentRequest {
    pub value: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting appointments")]
    DoctorNotBookable,

    #[error("Appointment slot is already taken")]
    SlotTaken,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment cannot change from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment in status {0} can no longer be modified")]
    TerminalState(AppointmentStatus),

    #[error("Not authorized to perform this action on the appointment")]
    NotAuthorized,

    #[error("Only completed appointments can be rated")]
    RatingNotAllowed,

    #[error("Appointment has already been rated")]
    AlreadyRated,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// libs/doctor-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialties: Vec<String>,
    pub clinic_name: String,
    pub bio: Option<String>,
    pub years_experience: i32,
    #[serde(default)]
    pub languages: Vec<String>,
    pub consultation_fee: f64,
    #[serde(default)]
    pub rating: RatingSummary,
    /// Weekday name ("monday"..) to working window, both ends "HH:MM".
    #[serde(default)]
    pub working_hours: HashMap<String, WorkingHours>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    /// Whether the doctor may be referenced by a new appointment.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.is_verified
    }
}

/// Derived aggregate owned by the doctor row; recomputed by the rating
/// aggregator in appointment-cell, never edited directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub full_name: String,
    pub email: String,
    pub specialties: Vec<String>,
    pub clinic_name: String,
    pub bio: Option<String>,
    pub years_experience: i32,
    #[serde(default)]
    pub languages: Vec<String>,
    pub consultation_fee: f64,
    #[serde(default)]
    pub working_hours: HashMap<String, WorkingHours>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub clinic_name: Option<String>,
    pub years_experience: Option<i32>,
    pub languages: Option<Vec<String>>,
    pub consultation_fee: Option<f64>,
    pub working_hours: Option<HashMap<String, WorkingHours>>,
    pub is_active: Option<bool>,
    /// Admin only; ignored for other actors.
    pub is_verified: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchFilters {
    pub specialty: Option<String>,
    pub language: Option<String>,
    pub min_rating: Option<f64>,
    pub max_fee: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor with email {0} already exists")]
    EmailTaken(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

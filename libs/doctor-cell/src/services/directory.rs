// libs/doctor-cell/src/services/directory.rs
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_utils::pagination::PageParams;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorSearchFilters, DirectoryError, RatingSummary,
    UpdateDoctorRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a new doctor profile. New profiles start unverified with a
    /// zeroed rating summary.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DirectoryError> {
        debug!("Creating new doctor profile for: {}", request.email);

        if request.consultation_fee < 0.0 {
            return Err(DirectoryError::ValidationError(
                "Consultation fee cannot be negative".to_string(),
            ));
        }
        if request.specialties.is_empty() {
            return Err(DirectoryError::ValidationError(
                "At least one specialty is required".to_string(),
            ));
        }

        let existing_check_path = format!(
            "/rest/v1/doctors?email=eq.{}",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await
            .map_err(|e| DirectoryError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(DirectoryError::EmailTaken(request.email));
        }

        let doctor_data = json!({
            "full_name": request.full_name,
            "email": request.email,
            "specialties": request.specialties,
            "clinic_name": request.clinic_name,
            "bio": request.bio,
            "years_experience": request.years_experience,
            "languages": request.languages,
            "consultation_fee": request.consultation_fee,
            "working_hours": request.working_hours,
            "rating": RatingSummary::default(),
            "is_verified": false,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Doctor> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(auth_token),
                Some(doctor_data),
                return_representation(),
            )
            .await
            .map_err(|e| DirectoryError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::DatabaseError("Failed to create doctor profile".to_string()))
    }

    /// Get doctor by ID. The booking engine reads `consultation_fee`,
    /// `is_active` and `is_verified` from the returned profile.
    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DirectoryError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| match e {
                DbError::NotFound(_) => DirectoryError::NotFound,
                other => DirectoryError::DatabaseError(other.to_string()),
            })?;

        result.into_iter().next().ok_or(DirectoryError::NotFound)
    }

    /// Public directory search: active + verified doctors only, sorted by
    /// average rating descending unless told otherwise.
    pub async fn search_doctors(
        &self,
        filters: &DoctorSearchFilters,
        page: &PageParams,
    ) -> Result<(Vec<Doctor>, i64), DirectoryError> {
        let mut path = String::from("/rest/v1/doctors?is_active=eq.true&is_verified=eq.true");

        if let Some(specialty) = &filters.specialty {
            path.push_str(&format!(
                "&specialties=cs.{{{}}}",
                urlencoding::encode(specialty)
            ));
        }
        if let Some(language) = &filters.language {
            path.push_str(&format!(
                "&languages=cs.{{{}}}",
                urlencoding::encode(language)
            ));
        }
        if let Some(min_rating) = filters.min_rating {
            path.push_str(&format!("&rating->>average=gte.{}", min_rating));
        }
        if let Some(max_fee) = filters.max_fee {
            path.push_str(&format!("&consultation_fee=lte.{}", max_fee));
        }

        let order_column = match filters.sort_by.as_deref() {
            Some("fee") => "consultation_fee",
            Some("experience") => "years_experience",
            _ => "rating->>average",
        };
        let order_direction = match filters.sort_order.as_deref() {
            Some("asc") => "asc",
            _ => "desc",
        };
        path.push_str(&format!("&order={}.{}", order_column, order_direction));
        path.push_str(&format!("&limit={}&offset={}", page.limit(), page.offset()));

        self.supabase
            .request_counted(&path, None)
            .await
            .map_err(|e| DirectoryError::DatabaseError(e.to_string()))
    }

    /// Partial profile update. The handler decides which actors may call
    /// this and whether `is_verified` survives into the patch.
    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        allow_verification_change: bool,
        auth_token: &str,
    ) -> Result<Doctor, DirectoryError> {
        debug!("Updating doctor profile: {}", doctor_id);

        if let Some(fee) = request.consultation_fee {
            if fee < 0.0 {
                return Err(DirectoryError::ValidationError(
                    "Consultation fee cannot be negative".to_string(),
                ));
            }
        }

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(name));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(specialties) = request.specialties {
            update_data.insert("specialties".to_string(), json!(specialties));
        }
        if let Some(clinic_name) = request.clinic_name {
            update_data.insert("clinic_name".to_string(), json!(clinic_name));
        }
        if let Some(experience) = request.years_experience {
            update_data.insert("years_experience".to_string(), json!(experience));
        }
        if let Some(languages) = request.languages {
            update_data.insert("languages".to_string(), json!(languages));
        }
        if let Some(fee) = request.consultation_fee {
            update_data.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(hours) = request.working_hours {
            update_data.insert("working_hours".to_string(), json!(hours));
        }
        if let Some(active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(active));
        }
        if allow_verification_change {
            if let Some(verified) = request.is_verified {
                update_data.insert("is_verified".to_string(), json!(verified));
            }
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                return_representation(),
            )
            .await
            .map_err(|e| DirectoryError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(DirectoryError::NotFound)
    }

    /// Overwrite the derived rating summary. Called by the rating
    /// aggregator after a new rating lands; last writer wins.
    pub async fn update_rating(
        &self,
        doctor_id: Uuid,
        summary: RatingSummary,
        auth_token: &str,
    ) -> Result<(), DirectoryError> {
        debug!(
            "Updating rating summary for doctor {}: {:.1} over {} ratings",
            doctor_id, summary.average, summary.count
        );

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let body = json!({
            "rating": summary,
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                return_representation(),
            )
            .await
            .map_err(|e| DirectoryError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DirectoryError::NotFound);
        }

        Ok(())
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

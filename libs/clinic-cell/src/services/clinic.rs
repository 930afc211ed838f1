// libs/clinic-cell/src/services/clinic.rs
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_utils::pagination::PageParams;

use crate::models::{Clinic, ClinicError, ClinicSearchFilters, CreateClinicRequest, UpdateClinicRequest};

pub struct ClinicService {
    supabase: SupabaseClient,
}

impl ClinicService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_clinic(
        &self,
        request: CreateClinicRequest,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        debug!("Creating clinic: {}", request.name);

        if request.name.trim().is_empty() {
            return Err(ClinicError::ValidationError(
                "Clinic name is required".to_string(),
            ));
        }

        let clinic_data = json!({
            "name": request.name,
            "address": request.address,
            "city": request.city,
            "phone": request.phone,
            "email": request.email,
            "description": request.description,
            "services": request.services,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Clinic> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/clinics",
                Some(auth_token),
                Some(clinic_data),
                return_representation(),
            )
            .await
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| ClinicError::DatabaseError("Failed to create clinic".to_string()))
    }

    pub async fn get_clinic(&self, clinic_id: Uuid) -> Result<Clinic, ClinicError> {
        debug!("Fetching clinic: {}", clinic_id);

        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let result: Vec<Clinic> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| match e {
                DbError::NotFound(_) => ClinicError::NotFound,
                other => ClinicError::DatabaseError(other.to_string()),
            })?;

        result.into_iter().next().ok_or(ClinicError::NotFound)
    }

    pub async fn search_clinics(
        &self,
        filters: &ClinicSearchFilters,
        page: &PageParams,
    ) -> Result<(Vec<Clinic>, i64), ClinicError> {
        let mut path = String::from("/rest/v1/clinics?is_active=eq.true");

        if let Some(city) = &filters.city {
            path.push_str(&format!("&city=ilike.{}", urlencoding::encode(city)));
        }
        if let Some(service) = &filters.service {
            path.push_str(&format!("&services=cs.{{{}}}", urlencoding::encode(service)));
        }

        path.push_str("&order=name.asc");
        path.push_str(&format!("&limit={}&offset={}", page.limit(), page.offset()));

        self.supabase
            .request_counted(&path, None)
            .await
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))
    }

    pub async fn update_clinic(
        &self,
        clinic_id: Uuid,
        request: UpdateClinicRequest,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        debug!("Updating clinic: {}", clinic_id);

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(city) = request.city {
            update_data.insert("city".to_string(), json!(city));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(description) = request.description {
            update_data.insert("description".to_string(), json!(description));
        }
        if let Some(services) = request.services {
            update_data.insert("services".to_string(), json!(services));
        }
        if let Some(active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let result: Vec<Clinic> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                return_representation(),
            )
            .await
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(ClinicError::NotFound)
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

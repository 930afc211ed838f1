use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_store_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(id: Uuid, email: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn clinic_admin(email: &str) -> Self {
        Self::new(email, "clinic_admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST row payloads matching the cell model shapes. Kept in one
/// place so wiremock-based tests across cells stay in sync with the models.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn doctor_response(doctor_id: &str, full_name: &str, consultation_fee: f64) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "full_name": full_name,
            "email": "doctor@example.com",
            "specialties": ["Cardiology"],
            "clinic_name": "Central Clinic",
            "bio": null,
            "years_experience": 10,
            "languages": ["English"],
            "consultation_fee": consultation_fee,
            "rating": { "average": 0.0, "count": 0 },
            "working_hours": {},
            "is_verified": true,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn unverified_doctor_response(doctor_id: &str) -> serde_json::Value {
        let mut doctor = Self::doctor_response(doctor_id, "Dr. Pending", 50.0);
        doctor["is_verified"] = json!(false);
        doctor
    }

    pub fn clinic_response(clinic_id: &str, name: &str, city: &str) -> serde_json::Value {
        json!({
            "id": clinic_id,
            "name": name,
            "address": "1 Main Street",
            "city": city,
            "phone": "+38761000000",
            "email": "clinic@example.com",
            "description": null,
            "services": ["Cardiology", "Dermatology"],
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": date,
            "time": time,
            "duration_minutes": 30,
            "specialty": "Cardiology",
            "reason": null,
            "notes": null,
            "status": status,
            "price": 80.0,
            "is_online": false,
            "online_link": null,
            "payment_method": "cash",
            "paid": false,
            "reminder": { "sent": false, "sent_at": null },
            "rating": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn rated_appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        value: i32,
    ) -> serde_json::Value {
        let mut appointment = Self::appointment_response(
            appointment_id,
            patient_id,
            doctor_id,
            "2024-01-10",
            "09:00",
            "completed",
        );
        appointment["rating"] = json!({
            "value": value,
            "comment": null,
            "rated_at": "2024-01-11T00:00:00Z"
        });
        appointment
    }
}

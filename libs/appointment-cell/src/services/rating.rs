// libs/appointment-cell/src/services/rating.rs
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::models::RatingSummary;
use doctor_cell::services::directory::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, AppointmentRating};

/// Derive a rating summary from the current set of rating values.
///
/// Full recompute rather than incremental update: ratings are append-only,
/// so rescanning keeps the average exact (no accumulated float drift) at
/// the cost of one read per rated appointment. Average is rounded half-up
/// to one decimal; an empty set yields a zeroed summary.
pub fn recompute(values: &[i32]) -> RatingSummary {
    if values.is_empty() {
        return RatingSummary::default();
    }

    let sum: i64 = values.iter().map(|v| *v as i64).sum();
    let mean = sum as f64 / values.len() as f64;

    RatingSummary {
        average: (mean * 10.0).round() / 10.0,
        count: values.len() as i32,
    }
}

#[derive(Debug, Deserialize)]
struct RatedRow {
    rating: AppointmentRating,
}

pub struct RatingAggregator {
    supabase: SupabaseClient,
    doctors: DoctorService,
}

impl RatingAggregator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    /// Recompute and store the doctor's rating summary from every rated
    /// appointment currently on record. Concurrent callers race on the
    /// doctor row; last writer wins, and each write is consistent with
    /// some snapshot of the rated set.
    pub async fn recompute_doctor_rating(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<RatingSummary, AppointmentError> {
        debug!("Recomputing rating summary for doctor {}", doctor_id);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&rating=not.is.null&select=rating",
            doctor_id
        );
        let rated: Vec<RatedRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let values: Vec<i32> = rated.iter().map(|row| row.rating.value).collect();
        let summary = recompute(&values);

        self.doctors
            .update_rating(doctor_id, summary.clone(), auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Doctor {} rating updated: average {:.1} over {} ratings",
            doctor_id, summary.average, summary.count
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_yields_zeroes() {
        let summary = recompute(&[]);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn single_rating_is_its_own_average() {
        let summary = recompute(&[5]);
        assert_eq!(summary.average, 5.0);
        assert_eq!(summary.count, 1);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        // (5 + 4 + 4) / 3 = 4.333... -> 4.3
        assert_eq!(recompute(&[5, 4, 4]).average, 4.3);
        // (5 + 4) / 2 = 4.5 stays exact
        assert_eq!(recompute(&[5, 4]).average, 4.5);
        // (3 + 4 + 5 + 5 + 4 + 1) / 6 = 3.666... -> 3.7
        assert_eq!(recompute(&[3, 4, 5, 5, 4, 1]).average, 3.7);
    }

    #[test]
    fn count_tracks_rated_appointments() {
        assert_eq!(recompute(&[1, 2, 3, 4, 5]).count, 5);
    }
}

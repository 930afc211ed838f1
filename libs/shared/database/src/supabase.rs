use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Typed store-layer errors. `Conflict` is load-bearing: the appointments
/// table carries a partial unique index on (doctor_id, date, time) for
/// non-cancelled/non-missed rows, and PostgREST reports a violation as
/// HTTP 409. Callers translate that into the same user-facing conflict as
/// their own pre-checks.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, DbError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    DbError::Unauthorized(error_text)
                }
                StatusCode::NOT_FOUND => DbError::NotFound(error_text),
                StatusCode::CONFLICT => DbError::Conflict(error_text),
                _ => DbError::Api {
                    status: status.as_u16(),
                    message: error_text,
                },
            });
        }

        Ok(response)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, auth_token, body, None).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DbError::Decode(e.to_string()))
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: HeaderMap,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(method, path, auth_token, body, Some(extra_headers))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DbError::Decode(e.to_string()))
    }

    /// GET a page of rows together with the exact total row count.
    /// PostgREST reports the total in the `Content-Range` header when the
    /// request carries `Prefer: count=exact`.
    pub async fn request_counted<T>(
        &self,
        path: &str,
        auth_token: Option<&str>,
    ) -> Result<(Vec<T>, i64), DbError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self
            .send(Method::GET, path, auth_token, None, Some(headers))
            .await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0);

        let items = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| DbError::Decode(e.to_string()))?;

        Ok((items, total))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// Parse the total from a PostgREST `Content-Range` value, e.g. `0-9/57`
/// or `*/0` for an empty result set.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(parse_content_range_total("0-9/57"), Some(57));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}

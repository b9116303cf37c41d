use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response from hospital API: {0}")]
    Decode(String),
}

/// Thin client for the hospital REST API.
///
/// Successful responses are wrapped as `{ "success": true, "data": ... }`;
/// failures carry `message`, `error`, or an `errors` array.
pub struct HospitalApiClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HospitalApiClient {
    /// A caller-supplied token takes precedence over the configured service token.
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.hospital_api_url.trim_end_matches('/').to_string(),
            auth_token: auth_token
                .map(str::to_string)
                .or_else(|| config.hospital_api_token.clone()),
        }
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    /// Path for a single resource, with the id percent-encoded.
    pub fn resource_path(collection: &str, id: &str) -> String {
        format!("{}/{}", collection, urlencoding::encode(id))
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.auth_token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Ignoring auth token that is not a valid header value"),
            }
        }

        headers
    }

    pub async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                if status.is_success() {
                    ApiError::Decode(e.to_string())
                } else {
                    classify_failure(status, text.clone())
                }
            })?
        };

        let rejected = payload.get("success").and_then(Value::as_bool) == Some(false);
        if !status.is_success() || rejected {
            let message = error_message(&payload)
                .unwrap_or_else(|| format!("Request failed (Status: {})", status.as_u16()));
            error!("Hospital API error ({}): {}", status, message);
            return Err(classify_failure(status, message));
        }

        let data = match payload {
            Value::Object(mut envelope) if envelope.contains_key("data") => {
                envelope.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };

        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn classify_failure(status: StatusCode, message: String) -> ApiError {
    match status.as_u16() {
        // A 2xx carrying `success: false` is a business rejection.
        200..=299 | 400 | 422 => ApiError::Validation(message),
        401 | 403 => ApiError::Auth(message),
        404 => ApiError::NotFound(message),
        409 => ApiError::Conflict(message),
        other => ApiError::Status { status: other, message },
    }
}

/// Picks the most specific human-readable message out of an error body.
fn error_message(payload: &Value) -> Option<String> {
    let non_empty = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    non_empty(payload.get("message"))
        .or_else(|| non_empty(payload.get("error")))
        .or_else(|| non_empty(payload.get("error").and_then(|e| e.get("message"))))
        .or_else(|| {
            let errors: Vec<String> = payload
                .get("errors")?
                .as_array()?
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(text) => Some(text.clone()),
                    other => non_empty(other.get("msg")).or_else(|| non_empty(other.get("message"))),
                })
                .collect();
            (!errors.is_empty()).then(|| errors.join(", "))
        })
}

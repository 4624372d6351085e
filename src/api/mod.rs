use crate::onboarding::{EmployeeRecord, OnboardReceipt};
use crate::policies::{PolicyDraft, PolicySection, PolicyUpdate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const ENV_BASE_URL: &str = "HRVA_API_BASE_URL";
const DEV_BASE_URL: &str = "http://localhost:8000/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("session rejected by server")]
    Unauthorized,
    #[error("server returned HTTP {status}")]
    Status { status: u16, detail: Option<Value> },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's `detail` payload rendered as plain text, if any.
    pub fn detail_text(&self) -> Option<String> {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => match detail {
                Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AskResponse {
    pub scope: String,
    pub answer: String,
    #[serde(default)]
    pub mode_used: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutationReceipt {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsedOrders {
    used_orders: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct UsedSectionIds {
    used_section_ids: Vec<String>,
}

/// Resolves the backend base URL from the environment value. Debug builds
/// fall back to the local development endpoint; release builds treat a
/// missing value as a fatal configuration error.
pub fn resolve_base_url(env_value: Option<String>) -> Result<String, ApiError> {
    match env_value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(url) => Ok(url.trim_end_matches('/').to_string()),
        None if cfg!(debug_assertions) => Ok(DEV_BASE_URL.to_string()),
        None => Err(ApiError::Config(format!(
            "{ENV_BASE_URL} is not set for a production build"
        ))),
    }
}

/// The sole network boundary. Every outbound request goes through one
/// configured `reqwest::Client` with a fixed 30 second ceiling; the current
/// session id is passed in explicitly by the caller rather than read out of
/// persisted state.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ApiError::Config(err.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(resolve_base_url(std::env::var(ENV_BASE_URL).ok())?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        session: Option<&str>,
    ) -> Result<T, ApiError> {
        let request = match session {
            Some(id) => request.header("X-Session-ID", id),
            None => request,
        };
        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|mut body| body.get_mut("detail").map(Value::take));
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    pub async fn health(&self, session: Option<&str>) -> Result<HealthStatus, ApiError> {
        self.send(self.http.get(self.url("/health")), session).await
    }

    pub async fn onboard_employee(
        &self,
        employee: &EmployeeRecord,
        session: Option<&str>,
    ) -> Result<OnboardReceipt, ApiError> {
        self.send(self.http.post(self.url("/onboard")).json(employee), session)
            .await
    }

    pub async fn get_policies(&self, session: Option<&str>) -> Result<Vec<PolicySection>, ApiError> {
        self.send(self.http.get(self.url("/policies")), session).await
    }

    pub async fn create_policy(
        &self,
        draft: &PolicyDraft,
        session: Option<&str>,
    ) -> Result<MutationReceipt, ApiError> {
        self.send(self.http.post(self.url("/policies")).json(draft), session)
            .await
    }

    pub async fn update_policy(
        &self,
        section_id: &str,
        update: &PolicyUpdate,
        session: Option<&str>,
    ) -> Result<MutationReceipt, ApiError> {
        self.send(
            self.http
                .put(self.url(&format!("/policies/{section_id}")))
                .json(update),
            session,
        )
        .await
    }

    pub async fn delete_policy(
        &self,
        section_id: &str,
        session: Option<&str>,
    ) -> Result<MutationReceipt, ApiError> {
        self.send(
            self.http.delete(self.url(&format!("/policies/{section_id}"))),
            session,
        )
        .await
    }

    pub async fn get_used_orders(&self, session: Option<&str>) -> Result<Vec<u32>, ApiError> {
        let envelope: UsedOrders = self
            .send(
                self.http.get(self.url("/policies/validation/used-orders")),
                session,
            )
            .await?;
        Ok(envelope.used_orders)
    }

    pub async fn get_used_section_ids(
        &self,
        session: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let envelope: UsedSectionIds = self
            .send(
                self.http
                    .get(self.url("/policies/validation/used-section-ids")),
                session,
            )
            .await?;
        Ok(envelope.used_section_ids)
    }

    pub async fn get_employees(&self, session: Option<&str>) -> Result<Vec<Value>, ApiError> {
        self.send(self.http.get(self.url("/employees")), session).await
    }

    pub async fn get_employee_by_id(
        &self,
        id: &str,
        session: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.send(self.http.get(self.url(&format!("/employees/{id}"))), session)
            .await
    }

    pub async fn ask(
        &self,
        request: &crate::chat::AskRequest,
        session: Option<&str>,
    ) -> Result<AskResponse, ApiError> {
        self.send(self.http.post(self.url("/ask")).json(request), session)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_base_url, ApiError};
    use serde_json::json;

    #[test]
    fn explicit_base_url_wins_and_loses_trailing_slash() {
        let url = resolve_base_url(Some("https://hr.example.com/api/".to_string()))
            .expect("explicit url should resolve");
        assert_eq!(url, "https://hr.example.com/api");
    }

    #[test]
    fn blank_base_url_counts_as_absent() {
        let result = resolve_base_url(Some("   ".to_string()));
        if cfg!(debug_assertions) {
            assert_eq!(
                result.expect("debug builds fall back to localhost"),
                "http://localhost:8000/api"
            );
        } else {
            assert!(matches!(result, Err(ApiError::Config(_))));
        }
    }

    #[test]
    fn detail_text_flattens_string_and_structured_payloads() {
        let plain = ApiError::Status {
            status: 400,
            detail: Some(json!("step out of range")),
        };
        assert_eq!(plain.detail_text().as_deref(), Some("step out of range"));

        let structured = ApiError::Status {
            status: 409,
            detail: Some(json!({"error": "duplicate", "field": "order"})),
        };
        let text = structured.detail_text().expect("structured detail should render");
        assert!(text.contains("duplicate"));

        assert_eq!(ApiError::Timeout.detail_text(), None);
    }
}

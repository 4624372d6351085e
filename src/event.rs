use crate::api::{ApiError, AskResponse};
use crate::onboarding::OnboardReceipt;
use crate::policies::{PolicyAction, PolicySection, ValidationSnapshot};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Checking,
    Connected,
    Unreachable,
}

/// Results of async work, delivered back to the UI thread over the app
/// channel and drained once per frame.
#[derive(Debug)]
pub enum AppEvent {
    HealthChanged(BackendState),
    PoliciesLoaded(Vec<PolicySection>),
    PoliciesLoadFailed(String),
    ValidationLoaded(ValidationSnapshot),
    AnswerReceived(AskResponse),
    AskFailed(ApiError),
    PolicyMutationSucceeded(PolicyAction),
    PolicyMutationFailed(PolicyAction, ApiError),
    OnboardSucceeded(OnboardReceipt),
    OnboardFailed(ApiError),
    EmployeesLoaded(Vec<Value>),
    EmployeeRecordLoaded(Value),
    SessionExpired,
}

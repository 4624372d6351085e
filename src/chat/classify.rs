use crate::api::ApiError;

/// Maps a failed ask exchange to the text rendered as the bot's reply.
/// Pure so the classification table is testable without any transport.
pub fn error_reply(error: &ApiError) -> String {
    match error {
        ApiError::Status { status: 404, .. } => {
            "The chat service is not available. Please check if the backend is running."
                .to_string()
        }
        ApiError::Status { status: 422, .. } => {
            let detail = error
                .detail_text()
                .unwrap_or_else(|| "Unknown validation error".to_string());
            format!(
                "Validation error (422). Please check your question format.\n\nDetails: {detail}"
            )
        }
        ApiError::Status { status: 500, .. } => {
            "Server error occurred. Please try again in a moment.".to_string()
        }
        ApiError::Timeout | ApiError::Network(_) => {
            "Network error. Please check your connection and try again.".to_string()
        }
        _ => "Sorry, I encountered an error. Please try again or contact support.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::error_reply;
    use crate::api::ApiError;
    use serde_json::json;

    #[test]
    fn validation_error_includes_server_detail() {
        let error = ApiError::Status {
            status: 422,
            detail: Some(json!("bad field")),
        };
        let reply = error_reply(&error);
        assert!(reply.contains("Validation error"));
        assert!(reply.contains("bad field"));
    }

    #[test]
    fn validation_error_without_detail_still_reads_as_validation() {
        let error = ApiError::Status {
            status: 422,
            detail: None,
        };
        assert!(error_reply(&error).contains("Unknown validation error"));
    }

    #[test]
    fn missing_response_classifies_as_connectivity_not_validation() {
        let reply = error_reply(&ApiError::Network("connection refused".to_string()));
        assert!(reply.contains("Network error"));
        assert!(!reply.contains("Validation"));

        let reply = error_reply(&ApiError::Timeout);
        assert!(reply.contains("Network error"));
    }

    #[test]
    fn service_missing_and_server_fault_have_distinct_replies() {
        let missing = error_reply(&ApiError::Status {
            status: 404,
            detail: None,
        });
        assert!(missing.contains("not available"));

        let fault = error_reply(&ApiError::Status {
            status: 500,
            detail: None,
        });
        assert!(fault.contains("try again in a moment"));
    }

    #[test]
    fn unknown_failures_get_the_generic_reply() {
        let reply = error_reply(&ApiError::Status {
            status: 418,
            detail: None,
        });
        assert!(reply.contains("contact support"));
    }
}

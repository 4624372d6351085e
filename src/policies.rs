use crate::api::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    pub section_id: String,
    pub title: String,
    pub content: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDraft {
    pub section_id: String,
    pub title: String,
    pub content: String,
    pub order: u32,
}

/// Update payload: `section_id` is immutable once created and is carried in
/// the URL, never in the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyUpdate {
    pub title: String,
    pub content: String,
    pub order: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSnapshot {
    pub used_orders: BTreeSet<u32>,
    pub used_section_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Create,
    Update,
    Delete,
}

impl PolicyAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyForm {
    pub mode: FormMode,
    pub section_id: String,
    pub title: String,
    pub content: String,
    pub order: u32,
}

/// List/filter/create/update/delete state for policy sections. The server is
/// the source of truth: after every successful mutation the app shell reloads
/// both the policy list and the validation snapshot; this panel never patches
/// the derived sets locally.
#[derive(Default)]
pub struct PolicyPanel {
    pub policies: Vec<PolicySection>,
    pub search_query: String,
    pub selected: Option<String>,
    pub form: Option<PolicyForm>,
    pub validation: ValidationSnapshot,
    pub field_errors: BTreeMap<String, String>,
    pub form_error: Option<String>,
    pub success_message: Option<String>,
    pub pending_delete: Option<String>,
    pub loading: bool,
}

impl PolicyPanel {
    pub fn new() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn set_policies(&mut self, policies: Vec<PolicySection>) {
        self.policies = policies;
        self.loading = false;
    }

    pub fn filtered(&self) -> Vec<&PolicySection> {
        let query = self.search_query.trim().to_lowercase();
        if query.is_empty() {
            return self.policies.iter().collect();
        }
        self.policies
            .iter()
            .filter(|policy| {
                policy.title.to_lowercase().contains(&query)
                    || policy.content.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn next_available_order(&self) -> u32 {
        self.validation
            .used_orders
            .iter()
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }

    fn clear_feedback(&mut self) {
        self.field_errors.clear();
        self.form_error = None;
        self.success_message = None;
    }

    /// Only one of the create/edit forms may be open; opening one closes the
    /// other and clears all validation feedback.
    pub fn open_create(&mut self) {
        self.clear_feedback();
        self.form = Some(PolicyForm {
            mode: FormMode::Create,
            section_id: String::new(),
            title: String::new(),
            content: String::new(),
            order: self.next_available_order(),
        });
    }

    pub fn open_edit(&mut self, section: &PolicySection) {
        self.clear_feedback();
        self.form = Some(PolicyForm {
            mode: FormMode::Edit,
            section_id: section.section_id.clone(),
            title: section.title.clone(),
            content: section.content.clone(),
            order: section.order,
        });
    }

    pub fn cancel_form(&mut self) {
        self.clear_feedback();
        self.form = None;
    }

    /// Client-side pre-check before a create/update is dispatched. Returns
    /// the outgoing action on success; on failure the form-level error is set.
    pub fn prepare_submit(&mut self) -> Option<PolicyAction> {
        self.field_errors.clear();
        self.form_error = None;
        let form = self.form.as_ref()?;
        let missing = match form.mode {
            FormMode::Create => {
                form.section_id.trim().is_empty()
                    || form.title.trim().is_empty()
                    || form.content.trim().is_empty()
            }
            FormMode::Edit => form.title.trim().is_empty() || form.content.trim().is_empty(),
        };
        if missing {
            self.form_error = Some("Please fill in all required fields".to_string());
            return None;
        }
        Some(match form.mode {
            FormMode::Create => PolicyAction::Create,
            FormMode::Edit => PolicyAction::Update,
        })
    }

    pub fn draft(&self) -> Option<PolicyDraft> {
        let form = self.form.as_ref()?;
        Some(PolicyDraft {
            section_id: form.section_id.trim().to_string(),
            title: form.title.clone(),
            content: form.content.clone(),
            order: form.order,
        })
    }

    pub fn update_payload(&self) -> Option<(String, PolicyUpdate)> {
        let form = self.form.as_ref()?;
        Some((
            form.section_id.clone(),
            PolicyUpdate {
                title: form.title.clone(),
                content: form.content.clone(),
                order: form.order,
            },
        ))
    }

    pub fn request_delete(&mut self, section_id: &str) {
        self.pending_delete = Some(section_id.to_string());
    }

    pub fn confirm_delete(&mut self) -> Option<String> {
        self.pending_delete.take()
    }

    pub fn decline_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn apply_mutation_success(&mut self, action: PolicyAction) {
        self.clear_feedback();
        self.form = None;
        self.success_message = Some(format!("Policy {} successfully!", action.past()));
        self.loading = true;
    }

    pub fn apply_mutation_failure(&mut self, action: PolicyAction, error: &ApiError) {
        self.success_message = None;
        self.field_errors.clear();
        self.form_error = None;
        match error.status_code() {
            Some(409) => self.apply_conflict(error),
            Some(422) => self.apply_validation(error),
            Some(404) if matches!(action, PolicyAction::Update | PolicyAction::Delete) => {
                self.form_error = Some(match action {
                    PolicyAction::Update => {
                        "Policy not found. It may have been deleted.".to_string()
                    }
                    _ => "Policy not found. It may have already been deleted.".to_string(),
                });
            }
            _ => {
                self.form_error = Some(error.detail_text().unwrap_or_else(|| {
                    format!("Failed to {} policy. Please try again.", action.verb())
                }));
            }
        }
    }

    fn apply_conflict(&mut self, error: &ApiError) {
        let detail = match error {
            ApiError::Status { detail, .. } => detail.as_ref(),
            _ => None,
        };
        let tagged_duplicate = detail
            .and_then(|d| d.get("error"))
            .and_then(Value::as_str)
            .map(|tag| tag == "duplicate")
            .unwrap_or(false);
        if tagged_duplicate {
            let field = detail
                .and_then(|d| d.get("field"))
                .and_then(Value::as_str)
                .unwrap_or("section_id");
            let message = detail
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Already in use")
                .to_string();
            self.field_errors.insert(field.to_string(), message);
        } else {
            self.form_error = Some(
                detail
                    .and_then(|d| d.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Duplicate entry detected")
                    .to_string(),
            );
        }
    }

    fn apply_validation(&mut self, error: &ApiError) {
        let detail = match error {
            ApiError::Status { detail, .. } => detail.as_ref(),
            _ => None,
        };
        if let Some(entries) = detail.and_then(Value::as_array) {
            for entry in entries {
                let field = entry
                    .get("loc")
                    .and_then(Value::as_array)
                    .and_then(|loc| loc.get(1))
                    .and_then(Value::as_str);
                let message = entry.get("msg").and_then(Value::as_str);
                if let (Some(field), Some(message)) = (field, message) {
                    self.field_errors
                        .insert(field.to_string(), message.to_string());
                }
            }
            if !self.field_errors.is_empty() {
                return;
            }
        }
        self.form_error = Some("Validation error occurred".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::{FormMode, PolicyAction, PolicyPanel, PolicySection};
    use crate::api::ApiError;
    use serde_json::json;

    fn section(id: &str, title: &str, content: &str, order: u32) -> PolicySection {
        PolicySection {
            section_id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            order,
            updated_at: None,
        }
    }

    fn panel_with_sections() -> PolicyPanel {
        let mut panel = PolicyPanel::new();
        panel.set_policies(vec![
            section("leave_policy", "Leave Policy", "Annual leave entitlement", 1),
            section("dress_code", "Dress Code", "Business casual on weekdays", 2),
        ]);
        panel
    }

    #[test]
    fn filter_matches_title_and_content_case_insensitively() {
        let mut panel = panel_with_sections();

        panel.search_query = "LEAVE".to_string();
        assert_eq!(panel.filtered().len(), 1);

        panel.search_query = "casual".to_string();
        let matched = panel.filtered();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].section_id, "dress_code");

        panel.search_query = "  ".to_string();
        assert_eq!(panel.filtered().len(), 2);
    }

    #[test]
    fn create_form_defaults_to_next_free_order() {
        let mut panel = PolicyPanel::new();
        panel.open_create();
        assert_eq!(panel.form.as_ref().map(|f| f.order), Some(1));

        panel.validation.used_orders = [1, 2, 7].into_iter().collect();
        panel.open_create();
        assert_eq!(panel.form.as_ref().map(|f| f.order), Some(8));
    }

    #[test]
    fn opening_edit_closes_create_and_clears_errors() {
        let mut panel = panel_with_sections();
        panel.open_create();
        panel.form_error = Some("Please fill in all required fields".to_string());
        panel
            .field_errors
            .insert("section_id".to_string(), "taken".to_string());

        let existing = panel.policies[0].clone();
        panel.open_edit(&existing);

        let form = panel.form.as_ref().expect("edit form should be open");
        assert_eq!(form.mode, FormMode::Edit);
        assert_eq!(form.section_id, "leave_policy");
        assert!(panel.field_errors.is_empty());
        assert_eq!(panel.form_error, None);
    }

    #[test]
    fn duplicate_conflict_maps_to_field_error() {
        let mut panel = PolicyPanel::new();
        panel.open_create();
        let error = ApiError::Status {
            status: 409,
            detail: Some(json!({
                "error": "duplicate",
                "field": "section_id",
                "message": "Section ID 'leave_policy' already exists"
            })),
        };

        panel.apply_mutation_failure(PolicyAction::Create, &error);
        assert_eq!(
            panel.field_errors.get("section_id").map(String::as_str),
            Some("Section ID 'leave_policy' already exists")
        );
        assert_eq!(panel.form_error, None);
        assert_eq!(panel.success_message, None);
    }

    #[test]
    fn validation_list_maps_each_field() {
        let mut panel = PolicyPanel::new();
        let error = ApiError::Status {
            status: 422,
            detail: Some(json!([
                {"loc": ["body", "title"], "msg": "field required"},
                {"loc": ["body", "order"], "msg": "must be >= 1"}
            ])),
        };

        panel.apply_mutation_failure(PolicyAction::Create, &error);
        assert_eq!(panel.field_errors.len(), 2);
        assert_eq!(
            panel.field_errors.get("order").map(String::as_str),
            Some("must be >= 1")
        );
    }

    #[test]
    fn not_found_on_delete_reads_as_stale_data() {
        let mut panel = PolicyPanel::new();
        let error = ApiError::Status {
            status: 404,
            detail: None,
        };

        panel.apply_mutation_failure(PolicyAction::Delete, &error);
        assert_eq!(
            panel.form_error.as_deref(),
            Some("Policy not found. It may have already been deleted.")
        );
    }

    #[test]
    fn other_failures_surface_at_form_level() {
        let mut panel = PolicyPanel::new();
        let error = ApiError::Status {
            status: 500,
            detail: Some(json!("Failed to create policy section. Please try again.")),
        };

        panel.apply_mutation_failure(PolicyAction::Create, &error);
        assert!(panel.field_errors.is_empty());
        assert_eq!(
            panel.form_error.as_deref(),
            Some("Failed to create policy section. Please try again.")
        );
    }

    #[test]
    fn create_requires_all_fields() {
        let mut panel = PolicyPanel::new();
        panel.open_create();
        assert_eq!(panel.prepare_submit(), None);
        assert_eq!(
            panel.form_error.as_deref(),
            Some("Please fill in all required fields")
        );

        if let Some(form) = panel.form.as_mut() {
            form.section_id = "remote_work".to_string();
            form.title = "Remote Work".to_string();
            form.content = "Two days a week".to_string();
        }
        assert_eq!(panel.prepare_submit(), Some(PolicyAction::Create));
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut panel = panel_with_sections();
        panel.request_delete("dress_code");
        assert_eq!(panel.pending_delete.as_deref(), Some("dress_code"));

        panel.decline_delete();
        assert_eq!(panel.confirm_delete(), None);

        panel.request_delete("dress_code");
        assert_eq!(panel.confirm_delete().as_deref(), Some("dress_code"));
        assert_eq!(panel.pending_delete, None);
    }

    #[test]
    fn mutation_success_closes_form_and_sets_banner() {
        let mut panel = PolicyPanel::new();
        panel.open_create();
        panel.apply_mutation_success(PolicyAction::Create);
        assert_eq!(panel.form, None);
        assert_eq!(
            panel.success_message.as_deref(),
            Some("Policy created successfully!")
        );
        assert!(panel.loading);
    }
}

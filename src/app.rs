use crate::api::{ApiClient, ApiError};
use crate::chat::{ChatEngine, Mode, Scope, Sender, SubmitOutcome};
use crate::event::{AppEvent, BackendState};
use crate::onboarding::{sanitize_ctc_input, EmployeeForm, EmployeeRecord};
use crate::policies::{
    FormMode, PolicyAction, PolicyDraft, PolicyPanel, PolicySection, PolicyUpdate,
    ValidationSnapshot,
};
use crate::store::{AppStore, StepStatus, Tab, TOTAL_STEPS};
use crate::theme::Theme;
use chrono::TimeZone;
use eframe::egui::{self, RichText, ScrollArea};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;

const ONBOARDING_PROMPTS: &[&str] = &[
    "Tell me about company policies",
    "How many leaves do we get in a year?",
    "What are the working hours?",
    "What is the dress code?",
    "What is the notice period for resignation?",
    "Is transportation provided?",
];

const HELPDESK_PROMPTS: &[&str] = &[
    "What should I do if I forget to clock in?",
    "How do I report if I'm going to be absent?",
    "Can exceptions be made if I was late due to transport problems?",
    "What happens if I don't inform anyone and miss 3 days?",
];

fn now_ms() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

fn clock_label(ms: u64) -> String {
    chrono::Local
        .timestamp_millis_opt(ms as i64)
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

fn json_str<'a>(value: &'a serde_json::Value, key: &str) -> &'a str {
    value.get(key).and_then(serde_json::Value::as_str).unwrap_or("-")
}

fn json_id(value: &serde_json::Value) -> Option<String> {
    value
        .get("id")
        .or_else(|| value.get("_id"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Converts a gateway result to the event the UI thread should see. A 401
/// always collapses into `SessionExpired`, whatever the operation was.
fn dispatch<T>(
    tx: &mpsc::Sender<AppEvent>,
    result: Result<T, ApiError>,
    ok: impl FnOnce(T) -> AppEvent,
    err: impl FnOnce(ApiError) -> AppEvent,
) {
    let event = match result {
        Ok(value) => ok(value),
        Err(ApiError::Unauthorized) => AppEvent::SessionExpired,
        Err(error) => err(error),
    };
    let _ = tx.send(event);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PolicyView {
    Browse,
    Manage,
}

pub struct HrvaApp {
    rx: mpsc::Receiver<AppEvent>,
    tx: mpsc::Sender<AppEvent>,
    gateway: ApiClient,
    runtime: Handle,
    store: AppStore,
    chat: ChatEngine,
    policies: PolicyPanel,
    policy_view: PolicyView,
    onboarding_form: EmployeeForm,
    onboarding_errors: BTreeMap<String, String>,
    onboarding_submitting: bool,
    onboard_success: Option<String>,
    onboard_error: Option<String>,
    employees: Vec<serde_json::Value>,
    employees_loaded: bool,
    employee_detail: Option<serde_json::Value>,
    backend: BackendState,
    theme: Theme,
    theme_applied_dark: Option<bool>,
    chat_input: String,
    home_input: String,
    pending_clear_chat: bool,
}

impl HrvaApp {
    pub fn new(
        rx: mpsc::Receiver<AppEvent>,
        tx: mpsc::Sender<AppEvent>,
        gateway: ApiClient,
        runtime: Handle,
        store: AppStore,
    ) -> Self {
        let theme = Theme::for_mode(store.is_dark_mode());
        let app = Self {
            rx,
            tx,
            gateway,
            runtime,
            store,
            chat: ChatEngine::new(now_ms()),
            policies: PolicyPanel::new(),
            policy_view: PolicyView::Browse,
            onboarding_form: EmployeeForm::default(),
            onboarding_errors: BTreeMap::new(),
            onboarding_submitting: false,
            onboard_success: None,
            onboard_error: None,
            employees: Vec::new(),
            employees_loaded: false,
            employee_detail: None,
            backend: BackendState::Checking,
            theme,
            theme_applied_dark: None,
            chat_input: String::new(),
            home_input: String::new(),
            pending_clear_chat: false,
        };
        app.spawn_health();
        app.spawn_load_policies();
        app.spawn_load_validation();
        app
    }

    fn session(&self) -> Option<String> {
        self.store.session_id().map(str::to_string)
    }

    fn spawn_health(&self) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            let state = match gateway.health(session.as_deref()).await {
                Ok(health) => {
                    tracing::debug!("backend health: {}", health.status);
                    BackendState::Connected
                }
                Err(ApiError::Unauthorized) => {
                    let _ = tx.send(AppEvent::SessionExpired);
                    return;
                }
                Err(err) => {
                    tracing::warn!("health probe failed: {err}");
                    BackendState::Unreachable
                }
            };
            let _ = tx.send(AppEvent::HealthChanged(state));
        });
    }

    fn spawn_load_policies(&self) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            dispatch(
                &tx,
                gateway.get_policies(session.as_deref()).await,
                AppEvent::PoliciesLoaded,
                |err| AppEvent::PoliciesLoadFailed(err.to_string()),
            );
        });
    }

    /// Snapshot load failures are non-fatal and only logged; the order picker
    /// simply stays on its defaults until the next reload.
    fn spawn_load_validation(&self) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            let orders = gateway.get_used_orders(session.as_deref());
            let ids = gateway.get_used_section_ids(session.as_deref());
            match tokio::try_join!(orders, ids) {
                Ok((used_orders, used_section_ids)) => {
                    let _ = tx.send(AppEvent::ValidationLoaded(ValidationSnapshot {
                        used_orders: used_orders.into_iter().collect(),
                        used_section_ids: used_section_ids.into_iter().collect(),
                    }));
                }
                Err(ApiError::Unauthorized) => {
                    let _ = tx.send(AppEvent::SessionExpired);
                }
                Err(err) => tracing::warn!("validation snapshot load failed: {err}"),
            }
        });
    }

    fn spawn_ask(&self, request: crate::chat::AskRequest) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            dispatch(
                &tx,
                gateway.ask(&request, session.as_deref()).await,
                AppEvent::AnswerReceived,
                AppEvent::AskFailed,
            );
        });
    }

    fn spawn_policy_create(&self, draft: PolicyDraft) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            dispatch(
                &tx,
                gateway.create_policy(&draft, session.as_deref()).await,
                |receipt| {
                    if let Some(message) = receipt.message {
                        tracing::debug!("create acknowledged: {message}");
                    }
                    AppEvent::PolicyMutationSucceeded(PolicyAction::Create)
                },
                |err| AppEvent::PolicyMutationFailed(PolicyAction::Create, err),
            );
        });
    }

    fn spawn_policy_update(&self, section_id: String, update: PolicyUpdate) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            dispatch(
                &tx,
                gateway
                    .update_policy(&section_id, &update, session.as_deref())
                    .await,
                |_| AppEvent::PolicyMutationSucceeded(PolicyAction::Update),
                |err| AppEvent::PolicyMutationFailed(PolicyAction::Update, err),
            );
        });
    }

    fn spawn_policy_delete(&self, section_id: String) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            dispatch(
                &tx,
                gateway.delete_policy(&section_id, session.as_deref()).await,
                |receipt| {
                    tracing::debug!("delete acknowledged: {}", receipt.status);
                    AppEvent::PolicyMutationSucceeded(PolicyAction::Delete)
                },
                |err| AppEvent::PolicyMutationFailed(PolicyAction::Delete, err),
            );
        });
    }

    fn spawn_load_employees(&self) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            match gateway.get_employees(session.as_deref()).await {
                Ok(employees) => {
                    let _ = tx.send(AppEvent::EmployeesLoaded(employees));
                }
                Err(ApiError::Unauthorized) => {
                    let _ = tx.send(AppEvent::SessionExpired);
                }
                Err(err) => tracing::warn!("employee list load failed: {err}"),
            }
        });
    }

    fn spawn_load_employee(&self, id: String) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            match gateway.get_employee_by_id(&id, session.as_deref()).await {
                Ok(record) => {
                    let _ = tx.send(AppEvent::EmployeeRecordLoaded(record));
                }
                Err(ApiError::Unauthorized) => {
                    let _ = tx.send(AppEvent::SessionExpired);
                }
                Err(err) => tracing::warn!("employee record load failed: {err}"),
            }
        });
    }

    fn spawn_onboard(&self, record: EmployeeRecord) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let session = self.session();
        self.runtime.spawn(async move {
            dispatch(
                &tx,
                gateway.onboard_employee(&record, session.as_deref()).await,
                AppEvent::OnboardSucceeded,
                AppEvent::OnboardFailed,
            );
        });
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.apply_event(event);
                    ctx.request_repaint();
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    tracing::warn!("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        let now = now_ms().unwrap_or(0);
        match event {
            AppEvent::HealthChanged(state) => {
                self.backend = state;
            }
            AppEvent::PoliciesLoaded(mut sections) => {
                sections.sort_by_key(|section| section.order);
                self.chat.sections = sections.clone();
                self.policies.set_policies(sections);
                if !self.chat.is_ready() {
                    self.chat.mark_ready();
                }
                self.consume_initial_message();
            }
            AppEvent::PoliciesLoadFailed(reason) => {
                // Guided mode stays selectable with an empty section list.
                tracing::warn!("failed to preload policy sections: {reason}");
                self.policies.loading = false;
                if !self.chat.is_ready() {
                    self.chat.mark_ready();
                }
                self.consume_initial_message();
            }
            AppEvent::ValidationLoaded(snapshot) => {
                self.policies.validation = snapshot;
            }
            AppEvent::AnswerReceived(response) => {
                self.chat.resolve(&response, now);
            }
            AppEvent::AskFailed(error) => {
                self.chat.fail(&error, now);
            }
            AppEvent::PolicyMutationSucceeded(action) => {
                self.policies.apply_mutation_success(action);
                self.spawn_load_policies();
                self.spawn_load_validation();
            }
            AppEvent::PolicyMutationFailed(action, error) => {
                self.policies.apply_mutation_failure(action, &error);
            }
            AppEvent::OnboardSucceeded(receipt) => {
                self.onboarding_submitting = false;
                if receipt.status == "success" {
                    if receipt.excel_export != "success" {
                        tracing::warn!("excel export reported: {}", receipt.excel_export);
                    }
                    self.store.set_employee_id(Some(receipt.id));
                    if self.store.session_id().is_none() {
                        self.store
                            .set_session_id(Some(self.chat.session_token().to_string()));
                    }
                    self.onboard_success =
                        Some("Employee onboarded successfully!".to_string());
                    self.onboard_error = None;
                    self.onboarding_form = EmployeeForm::default();
                    self.onboarding_errors.clear();
                    if self.employees_loaded {
                        self.spawn_load_employees();
                    }
                } else {
                    self.onboard_error =
                        Some("Failed to onboard employee. Please try again.".to_string());
                    self.onboard_success = None;
                }
            }
            AppEvent::OnboardFailed(error) => {
                self.onboarding_submitting = false;
                self.onboard_success = None;
                self.onboard_error = Some(error.detail_text().unwrap_or_else(|| {
                    "Failed to onboard employee. Please try again.".to_string()
                }));
            }
            AppEvent::EmployeesLoaded(employees) => {
                self.employees = employees;
                self.employees_loaded = true;
            }
            AppEvent::EmployeeRecordLoaded(record) => {
                self.employee_detail = Some(record);
            }
            AppEvent::SessionExpired => {
                self.store.expire_session();
                self.chat.reset(now);
                self.chat.mark_ready();
                self.employees.clear();
                self.employees_loaded = false;
                self.employee_detail = None;
            }
        }
    }

    fn consume_initial_message(&mut self) {
        if let Some(text) = self.chat.take_initial() {
            self.send_chat(&text, false);
        }
    }

    fn send_chat(&mut self, text: &str, from_live_input: bool) {
        match self.chat.submit(text, now_ms().unwrap_or(0)) {
            SubmitOutcome::Send(request) => {
                if from_live_input {
                    self.chat_input.clear();
                }
                if self.store.session_id().is_none() {
                    self.store
                        .set_session_id(Some(self.chat.session_token().to_string()));
                }
                self.spawn_ask(request);
            }
            SubmitOutcome::Rejected(reason) => {
                tracing::debug!("chat submit rejected: {reason:?}");
            }
        }
    }

    /// Session sign-out: session ids, step progress, and chat history go in
    /// one synchronous step; persisted preferences survive.
    fn sign_out(&mut self) {
        self.store.clear_session();
        self.chat.reset(now_ms().unwrap_or(0));
        self.chat.mark_ready();
        self.employees.clear();
        self.employees_loaded = false;
        self.employee_detail = None;
        self.store.set_current_tab(Tab::Home);
    }

    fn backend_label(&self) -> (&'static str, egui::Color32) {
        match self.backend {
            BackendState::Connected => ("Backend Connected", self.theme.success),
            BackendState::Checking => ("Checking...", self.theme.warning),
            BackendState::Unreachable => ("Backend Unreachable", self.theme.danger),
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_label, status_color) = self.backend_label();
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("HR VA");
                ui.separator();
                for (tab, label) in [
                    (Tab::Home, "Home"),
                    (Tab::Chat, "Chat"),
                    (Tab::Policies, "Policies"),
                    (Tab::Onboarding, "Onboarding"),
                    (Tab::Settings, "Settings"),
                ] {
                    if ui
                        .selectable_label(self.store.current_tab() == tab, label)
                        .clicked()
                    {
                        self.store.set_current_tab(tab);
                    }
                }
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Sign Out").clicked() {
                        self.sign_out();
                    }
                    let sidebar_toggle = if self.store.sidebar_open() {
                        "Hide Panel"
                    } else {
                        "Show Panel"
                    };
                    if ui.button(sidebar_toggle).clicked() {
                        let open = !self.store.sidebar_open();
                        self.store.set_sidebar_open(open);
                    }
                });
            });
        });
    }

    fn render_sidebar(&mut self, ctx: &egui::Context) {
        if !self.store.sidebar_open() {
            return;
        }
        egui::SidePanel::left("info_panel").resizable(true).show(ctx, |ui| {
            ui.heading("Session");
            match self.store.session_id() {
                Some(id) => ui.label(id.to_string()),
                None => ui.label(RichText::new("No active session").color(self.theme.text_muted)),
            };
            if let Some(employee) = self.store.employee_id() {
                ui.label(format!("Employee: {employee}"));
            }

            ui.separator();
            ui.heading("Onboarding Progress");
            let progress = self.store.get_progress();
            ui.add(
                egui::ProgressBar::new(progress as f32 / 100.0)
                    .text(format!("{progress}% complete")),
            );
            ui.label(format!(
                "{} of {} steps complete",
                self.store.completed_count(),
                TOTAL_STEPS
            ));

            ui.separator();
            ui.heading("Policy Sections");
            if self.chat.sections.is_empty() {
                ui.label(RichText::new("None loaded").color(self.theme.text_muted));
            } else {
                for section in &self.chat.sections {
                    ui.label(format!("Step {}: {}", section.order, section.title));
                }
            }
        });
    }

    fn render_home(&mut self, ui: &mut egui::Ui) {
        ui.heading("AI HR Assistant");
        ui.label(
            "Your smart HR companion for day-to-day support, company procedures, and \
             general company information. Switch to Onboarding mode for policy-specific \
             guidance.",
        );
        ui.add_space(self.theme.spacing_16);

        let mut ask_now = false;
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.home_input)
                    .desired_width(360.0)
                    .hint_text("Ask anything about HR..."),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                ask_now = true;
            }
            if ui
                .add_enabled(
                    !self.home_input.trim().is_empty(),
                    egui::Button::new("Ask HR VA"),
                )
                .clicked()
            {
                ask_now = true;
            }
        });
        if ask_now && !self.home_input.trim().is_empty() {
            let text = std::mem::take(&mut self.home_input);
            self.chat.queue_initial(text);
            self.store.set_current_tab(Tab::Chat);
            self.consume_initial_message();
        }

        ui.add_space(self.theme.spacing_16);
        ui.horizontal(|ui| {
            if ui.button("Browse Policies").clicked() {
                self.store.set_current_tab(Tab::Policies);
            }
            if ui.button("Onboard an Employee").clicked() {
                self.store.set_current_tab(Tab::Onboarding);
            }
        });
    }

    fn render_chat(&mut self, ui: &mut egui::Ui) {
        let transcript_height = (ui.available_height() - 280.0).max(140.0);
        ScrollArea::vertical()
            .id_salt("chat_transcript")
            .max_height(transcript_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in self.chat.messages() {
                    let label = match message.sender {
                        Sender::User => format!("[You] {}", message.content),
                        Sender::Bot => format!("[HR VA] {}", message.content),
                    };
                    ui.label(label);
                    if message.sent_at_ms > 0 {
                        ui.label(
                            RichText::new(clock_label(message.sent_at_ms))
                                .color(self.theme.text_muted)
                                .small(),
                        );
                    }
                }
                if self.chat.is_sending() {
                    ui.label(
                        RichText::new("HR VA is typing...").color(self.theme.text_muted),
                    );
                }
            });

        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Scope:");
            ui.selectable_value(&mut self.chat.scope, Scope::Onboarding, "Onboarding");
            ui.selectable_value(&mut self.chat.scope, Scope::Helpdesk, "Helpdesk");
            ui.separator();
            if ui.button("New chat").clicked() {
                self.chat.new_chat(now_ms().unwrap_or(0));
                self.chat_input.clear();
                self.pending_clear_chat = false;
            }
            if ui.button("Clear chat").clicked() {
                self.pending_clear_chat = true;
            }
        });
        if self.pending_clear_chat {
            ui.horizontal(|ui| {
                ui.label("Are you sure you want to clear the chat history?");
                if ui.button("Clear").clicked() {
                    self.chat.new_chat(now_ms().unwrap_or(0));
                    self.chat_input.clear();
                    self.pending_clear_chat = false;
                }
                if ui.button("Cancel").clicked() {
                    self.pending_clear_chat = false;
                }
            });
        }

        if self.chat.scope == Scope::Onboarding {
            ui.horizontal(|ui| {
                ui.label("Mode:");
                ui.selectable_value(&mut self.chat.mode, Mode::Global, "Global");
                ui.selectable_value(&mut self.chat.mode, Mode::Guided, "Guided");
            });
            if self.chat.mode == Mode::Guided {
                let options: Vec<(String, String)> = self
                    .chat
                    .sections
                    .iter()
                    .map(|s| {
                        (
                            s.section_id.clone(),
                            format!("Step {}: {}", s.order, s.title),
                        )
                    })
                    .collect();
                let selected_label = options
                    .iter()
                    .find(|(id, _)| *id == self.chat.selected_section)
                    .map(|(_, label)| label.clone())
                    .unwrap_or_else(|| "Select a policy section...".to_string());
                ui.horizontal(|ui| {
                    ui.label("Policy Section:");
                    egui::ComboBox::from_id_salt("guided_section")
                        .selected_text(selected_label)
                        .show_ui(ui, |ui| {
                            for (id, label) in &options {
                                ui.selectable_value(
                                    &mut self.chat.selected_section,
                                    id.clone(),
                                    label,
                                );
                            }
                        });
                });
            }
        }

        let mut clicked_prompt: Option<&str> = None;
        let prompts = if self.chat.scope == Scope::Onboarding {
            ONBOARDING_PROMPTS
        } else {
            HELPDESK_PROMPTS
        };
        ui.horizontal_wrapped(|ui| {
            for prompt in prompts {
                if ui.small_button(*prompt).clicked() {
                    clicked_prompt = Some(prompt);
                }
            }
        });
        if let Some(prompt) = clicked_prompt {
            let text = prompt.to_string();
            self.send_chat(&text, false);
        }

        ui.add_space(self.theme.spacing_8);
        let hint = if self.chat.is_sending() {
            "Waiting for response..."
        } else if self.chat.scope == Scope::Onboarding {
            match self.chat.mode {
                Mode::Global => "Ask about any HR policy (all sections are searched)...",
                Mode::Guided => "Ask about the selected policy section...",
            }
        } else {
            "Ask about insurance, payroll, holidays, IT, or any HR support question..."
        };
        let input_enabled = !self.chat.is_sending();
        let mut send_now = false;
        let composer = self.theme.composer_frame();
        composer.show(ui, |ui| {
            ui.horizontal(|ui| {
                let response = ui.add_enabled(
                    input_enabled,
                    egui::TextEdit::singleline(&mut self.chat_input)
                        .desired_width(ui.available_width() - 80.0)
                        .hint_text(hint),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    send_now = true;
                }
                let can_send = input_enabled
                    && !self.chat_input.trim().is_empty()
                    && !self.chat.needs_section();
                send_now |= ui.add_enabled(can_send, egui::Button::new("Send")).clicked();
            });
        });
        if send_now && input_enabled && !self.chat.needs_section() {
            let text = self.chat_input.clone();
            self.send_chat(&text, true);
        }
    }

    fn render_policies(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.policy_view, PolicyView::Browse, "Browse Policies");
            ui.selectable_value(&mut self.policy_view, PolicyView::Manage, "Manage Policies");
        });
        ui.separator();

        if let Some(target) = self.policies.pending_delete.clone() {
            ui.horizontal(|ui| {
                ui.label(format!(
                    "Delete policy section '{target}'? This action cannot be undone."
                ));
                if ui.button("Delete").clicked() {
                    if let Some(section_id) = self.policies.confirm_delete() {
                        self.spawn_policy_delete(section_id);
                    }
                }
                if ui.button("Cancel").clicked() {
                    self.policies.decline_delete();
                }
            });
            ui.separator();
        }

        match self.policy_view {
            PolicyView::Browse => self.render_policy_browse(ui),
            PolicyView::Manage => self.render_policy_manage(ui),
        }
    }

    fn render_policy_browse(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Search:");
            ui.add(
                egui::TextEdit::singleline(&mut self.policies.search_query)
                    .desired_width(320.0)
                    .hint_text("Search policies by title or content..."),
            );
        });

        if self.policies.loading {
            ui.label("Loading policies...");
            return;
        }

        let mut view_clicked: Option<String> = None;
        let mut edit_clicked: Option<PolicySection> = None;
        let mut delete_clicked: Option<String> = None;
        ScrollArea::vertical()
            .id_salt("policy_list")
            .max_height((ui.available_height() - 40.0).max(120.0))
            .show(ui, |ui| {
                for policy in self.policies.filtered() {
                    self.theme.card_frame().show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.strong(&policy.title);
                            ui.label(
                                RichText::new(format!("Step {}", policy.order))
                                    .color(self.theme.text_muted),
                            );
                        });
                        let preview: String = policy.content.chars().take(150).collect();
                        ui.label(preview);
                        ui.horizontal(|ui| {
                            if ui.button("View").clicked() {
                                view_clicked = Some(policy.section_id.clone());
                            }
                            if ui.button("Edit").clicked() {
                                edit_clicked = Some(policy.clone());
                            }
                            if ui.button("Delete").clicked() {
                                delete_clicked = Some(policy.section_id.clone());
                            }
                        });
                    });
                }
            });
        if let Some(section_id) = view_clicked {
            self.policies.selected = Some(section_id);
        }
        if let Some(policy) = edit_clicked {
            self.policies.open_edit(&policy);
            self.policy_view = PolicyView::Manage;
        }
        if let Some(section_id) = delete_clicked {
            self.policies.request_delete(&section_id);
        }

        let selected = self.policies.selected.clone().and_then(|id| {
            self.policies
                .policies
                .iter()
                .find(|p| p.section_id == id)
                .cloned()
        });
        if let Some(policy) = selected {
            ui.separator();
            self.theme.card_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.strong(&policy.title);
                    ui.label(
                        RichText::new(format!("Step {} of {}", policy.order, TOTAL_STEPS))
                            .color(self.theme.text_muted),
                    );
                    if ui.button("Close").clicked() {
                        self.policies.selected = None;
                    }
                });
                if let Some(updated) = &policy.updated_at {
                    ui.label(
                        RichText::new(format!("Last updated: {updated}"))
                            .color(self.theme.text_muted)
                            .small(),
                    );
                }
                ui.label(&policy.content);
            });
        }
    }

    fn render_policy_manage(&mut self, ui: &mut egui::Ui) {
        if let Some(message) = &self.policies.success_message {
            ui.label(RichText::new(message).color(self.theme.success));
        }
        if let Some(error) = &self.policies.form_error {
            ui.label(RichText::new(error).color(self.theme.danger));
        }

        if self.policies.form.is_none() {
            if ui.button("Create New Policy").clicked() {
                self.policies.open_create();
            }
            return;
        }

        let field_errors = self.policies.field_errors.clone();
        let used_orders_hint = if self.policies.validation.used_orders.is_empty() {
            String::new()
        } else {
            format!(
                "Used orders: {}",
                self.policies
                    .validation
                    .used_orders
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let danger = self.theme.danger;
        let muted = self.theme.text_muted;

        let mut save_clicked = false;
        let mut cancel_clicked = false;
        if let Some(form) = self.policies.form.as_mut() {
            let creating = form.mode == FormMode::Create;
            ui.heading(if creating { "Create New Policy" } else { "Edit Policy" });

            ui.label("Section ID *");
            ui.add_enabled(
                creating,
                egui::TextEdit::singleline(&mut form.section_id)
                    .hint_text("e.g., company_overview"),
            );
            if let Some(error) = field_errors.get("section_id") {
                ui.label(RichText::new(error).color(danger).small());
            }
            ui.label(
                RichText::new("Only alphanumeric characters and underscores. Max 100 characters.")
                    .color(muted)
                    .small(),
            );

            ui.label("Step Order *");
            ui.add(egui::DragValue::new(&mut form.order).range(1..=999));
            if let Some(error) = field_errors.get("order") {
                ui.label(RichText::new(error).color(danger).small());
            }
            if !used_orders_hint.is_empty() {
                ui.label(RichText::new(used_orders_hint).color(muted).small());
            }

            ui.label("Title *");
            ui.add(
                egui::TextEdit::singleline(&mut form.title)
                    .hint_text("e.g., Company Overview and Mission"),
            );
            if let Some(error) = field_errors.get("title") {
                ui.label(RichText::new(error).color(danger).small());
            }

            ui.label("Content *");
            ui.add(
                egui::TextEdit::multiline(&mut form.content)
                    .desired_rows(6)
                    .hint_text("Enter the full policy content..."),
            );
            if let Some(error) = field_errors.get("content") {
                ui.label(RichText::new(error).color(danger).small());
            }

            ui.horizontal(|ui| {
                let save_label = if creating { "Create Policy" } else { "Update Policy" };
                save_clicked = ui.button(save_label).clicked();
                cancel_clicked = ui.button("Cancel").clicked();
            });
        }

        if cancel_clicked {
            self.policies.cancel_form();
        } else if save_clicked {
            match self.policies.prepare_submit() {
                Some(PolicyAction::Create) => {
                    if let Some(draft) = self.policies.draft() {
                        self.spawn_policy_create(draft);
                    }
                }
                Some(PolicyAction::Update) => {
                    if let Some((section_id, update)) = self.policies.update_payload() {
                        self.spawn_policy_update(section_id, update);
                    }
                }
                _ => {}
            }
        }
    }

    fn render_onboarding(&mut self, ui: &mut egui::Ui) {
        ui.heading("Employee Onboarding");

        let progress = self.store.get_progress();
        ui.add(
            egui::ProgressBar::new(progress as f32 / 100.0).text(format!("{progress}% complete")),
        );
        ui.horizontal_wrapped(|ui| {
            for step in 1..=TOTAL_STEPS {
                let (marker, color) = match self.store.get_step_status(step) {
                    StepStatus::Completed => ("done", self.theme.success),
                    StepStatus::Skipped => ("skipped", self.theme.warning),
                    StepStatus::Current => ("current", self.theme.accent_primary),
                    StepStatus::Pending => ("pending", self.theme.text_muted),
                };
                if ui
                    .selectable_label(
                        self.store.current_step() == step,
                        RichText::new(format!("{step} ({marker})")).color(color),
                    )
                    .clicked()
                {
                    self.store.set_current_step(step);
                }
            }
        });
        ui.horizontal(|ui| {
            let current = self.store.current_step();
            if ui.button("Mark Step Complete").clicked() {
                self.store.add_completed_step(current);
            }
            if ui.button("Skip Step").clicked() {
                self.store.add_skipped_step(current);
            }
        });

        ui.separator();
        if let Some(message) = &self.onboard_success {
            ui.label(RichText::new(message).color(self.theme.success));
        }
        if let Some(error) = &self.onboard_error {
            ui.label(RichText::new(error).color(self.theme.danger));
        }

        let errors = self.onboarding_errors.clone();
        let danger = self.theme.danger;
        let field = |ui: &mut egui::Ui, label: &str, value: &mut String, key: &str| {
            ui.label(label);
            ui.text_edit_singleline(value);
            if let Some(error) = errors.get(key) {
                ui.label(RichText::new(error).color(danger).small());
            }
        };

        let form = &mut self.onboarding_form;
        ScrollArea::vertical()
            .id_salt("onboarding_form")
            .max_height((ui.available_height() - 60.0).max(160.0))
            .show(ui, |ui| {
                field(ui, "Employee Code *", &mut form.employee_code, "employee_code");
                field(ui, "Employee Name *", &mut form.employee_name, "employee_name");
                field(ui, "Gender *", &mut form.gender, "gender");
                field(ui, "Date of Birth (YYYY-MM-DD) *", &mut form.date_of_birth, "date_of_birth");
                field(
                    ui,
                    "Date of Joining (YYYY-MM-DD) *",
                    &mut form.date_of_joining,
                    "date_of_joining",
                );
                field(ui, "Designation *", &mut form.designation, "designation");

                ui.label("CTC at Joining *");
                let response = ui.text_edit_singleline(&mut form.ctc_at_joining);
                if response.changed() {
                    form.ctc_at_joining = sanitize_ctc_input(&form.ctc_at_joining);
                }
                if let Some(error) = errors.get("ctc_at_joining") {
                    ui.label(RichText::new(error).color(danger).small());
                }

                field(ui, "Aadhaar Number *", &mut form.aadhaar_number, "aadhaar_number");
                field(ui, "UAN", &mut form.uan, "uan");
                field(
                    ui,
                    "Personal Email *",
                    &mut form.personal_email_id,
                    "personal_email_id",
                );
                field(
                    ui,
                    "Official Email *",
                    &mut form.official_email_id,
                    "official_email_id",
                );
                field(ui, "Contact Number *", &mut form.contact_number, "contact_number");
                field(
                    ui,
                    "Emergency Contact Name *",
                    &mut form.emergency_contact_name,
                    "emergency_contact_name",
                );
                field(
                    ui,
                    "Emergency Contact Number *",
                    &mut form.emergency_contact_number,
                    "emergency_contact_number",
                );
            });

        let submit_label = if self.onboarding_submitting {
            "Submitting..."
        } else {
            "Onboard Employee"
        };
        if ui
            .add_enabled(!self.onboarding_submitting, egui::Button::new(submit_label))
            .clicked()
        {
            match self.onboarding_form.to_record() {
                Ok(record) => {
                    self.onboarding_errors.clear();
                    self.onboard_success = None;
                    self.onboard_error = None;
                    self.onboarding_submitting = true;
                    self.spawn_onboard(record);
                }
                Err(validation_errors) => {
                    self.onboarding_errors = validation_errors;
                }
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.heading("Onboarded Employees");
            let load_label = if self.employees_loaded { "Refresh" } else { "Load" };
            if ui.button(load_label).clicked() {
                self.spawn_load_employees();
            }
        });
        if self.employees_loaded {
            if self.employees.is_empty() {
                ui.label(RichText::new("No employees onboarded yet.").color(self.theme.text_muted));
            }
            let mut detail_clicked: Option<String> = None;
            for employee in &self.employees {
                ui.horizontal(|ui| {
                    ui.label(format!(
                        "{} - {} ({})",
                        json_str(employee, "employee_code"),
                        json_str(employee, "employee_name"),
                        json_str(employee, "designation"),
                    ));
                    if let Some(id) = json_id(employee) {
                        if ui.small_button("Details").clicked() {
                            detail_clicked = Some(id);
                        }
                    }
                });
            }
            if let Some(id) = detail_clicked {
                self.spawn_load_employee(id);
            }
        }
        let mut close_detail = false;
        if let Some(record) = &self.employee_detail {
            self.theme.card_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.strong(json_str(record, "employee_name"));
                    if ui.button("Close").clicked() {
                        close_detail = true;
                    }
                });
                ui.label(format!("Code: {}", json_str(record, "employee_code")));
                ui.label(format!("Designation: {}", json_str(record, "designation")));
                ui.label(format!("Joined: {}", json_str(record, "date_of_joining")));
                ui.label(format!("Official email: {}", json_str(record, "official_email_id")));
                ui.label(format!("Contact: {}", json_str(record, "contact_number")));
            });
        }
        if close_detail {
            self.employee_detail = None;
        }
    }

    fn render_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");

        let mode_label = if self.store.is_dark_mode() {
            "Switch to light mode"
        } else {
            "Switch to dark mode"
        };
        if ui.button(mode_label).clicked() {
            self.store.toggle_dark_mode();
        }

        let mut sidebar = self.store.sidebar_open();
        if ui.checkbox(&mut sidebar, "Show side panel").changed() {
            self.store.set_sidebar_open(sidebar);
        }

        ui.separator();
        ui.label(format!("Backend: {}", self.gateway.base_url()));
        let (status_label, status_color) = self.backend_label();
        ui.label(RichText::new(status_label).color(status_color));
        if ui.button("Re-check backend").clicked() {
            self.backend = BackendState::Checking;
            self.spawn_health();
        }

        ui.separator();
        ui.label(format!("Chat session token: {}", self.chat.session_token()));
        if ui.button("Clear session").clicked() {
            self.sign_out();
        }
    }

    fn render_center(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| match self.store.current_tab() {
            Tab::Home => self.render_home(ui),
            Tab::Chat => self.render_chat(ui),
            Tab::Policies => self.render_policies(ui),
            Tab::Onboarding => self.render_onboarding(ui),
            Tab::Settings => self.render_settings(ui),
        });
    }
}

impl eframe::App for HrvaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);

        let dark = self.store.is_dark_mode();
        if self.theme_applied_dark != Some(dark) {
            self.theme = Theme::for_mode(dark);
            self.theme.apply_visuals(ctx);
            self.theme_applied_dark = Some(dark);
        }

        self.render_top_bar(ctx);
        self.render_sidebar(ctx);
        self.render_center(ctx);
    }
}

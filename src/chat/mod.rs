use crate::api::{ApiError, AskResponse};
use crate::policies::PolicySection;
use serde::Serialize;
use std::mem;

pub mod classify;

/// An identical user message re-submitted within this window is treated as an
/// accidental double-send and silently dropped.
pub const DUPLICATE_WINDOW_MS: u64 = 5_000;

const WELCOME: &str = "Welcome to HR VA! I'm your AI HR assistant, here to help you with \
day-to-day HR questions and support. I can answer questions about company procedures, \
benefits, policies, and provide helpful guidance on company culture, workplace practices, \
and general HR topics. You can also switch to Onboarding mode for policy-specific questions.";

const FALLBACK_WARNING: &str =
    "Note: Using fallback chat mode. Some features may be limited.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    pub sent_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Global,
    Guided,
}

impl Mode {
    fn wire(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Guided => "guided",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Onboarding,
    Helpdesk,
}

/// The outgoing `/ask` body. The scope is the serde tag, so each variant can
/// only ever serialize the fields its server contract allows: helpdesk
/// requests carry no `mode` or `section_id` at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum AskRequest {
    Onboarding {
        message: String,
        mode: Mode,
        #[serde(skip_serializing_if = "Option::is_none")]
        section_id: Option<String>,
    },
    #[serde(rename = "employee")]
    Helpdesk { message: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    /// Snapshot taken at submit time; the reply is formatted against it even
    /// if the user flips scope or mode while the request is in flight.
    Sending {
        question: String,
        scope: Scope,
        mode: Mode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    Busy,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Send(AskRequest),
    Rejected(RejectReason),
}

/// Chat state machine. Pure: every transition is a synchronous method taking
/// the current time, and the single network effect per exchange is returned
/// to the caller as an `AskRequest` to dispatch.
pub struct ChatEngine {
    messages: Vec<ChatMessage>,
    phase: Phase,
    pub scope: Scope,
    pub mode: Mode,
    pub selected_section: String,
    pub sections: Vec<PolicySection>,
    session_token: String,
    ready: bool,
    initial: Option<String>,
    initial_consumed: bool,
}

impl ChatEngine {
    /// `now_ms` is `None` when the clock read failed; the conversation still
    /// works under a fallback token, with a one-time warning in history.
    pub fn new(now_ms: Option<u64>) -> Self {
        let mut messages = vec![ChatMessage {
            sender: Sender::Bot,
            content: WELCOME.to_string(),
            sent_at_ms: now_ms.unwrap_or(0),
        }];
        let session_token = match now_ms {
            Some(now) => format!("chat_{now}"),
            None => {
                messages.push(ChatMessage {
                    sender: Sender::Bot,
                    content: FALLBACK_WARNING.to_string(),
                    sent_at_ms: 0,
                });
                "chat_fallback".to_string()
            }
        };
        Self {
            messages,
            phase: Phase::Idle,
            scope: Scope::Helpdesk,
            mode: Mode::Global,
            selected_section: String::new(),
            sections: Vec::new(),
            session_token,
            ready: false,
            initial: None,
            initial_consumed: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.phase, Phase::Sending { .. })
    }

    /// Guided mode needs a section before the send control is enabled.
    pub fn needs_section(&self) -> bool {
        self.scope == Scope::Onboarding
            && self.mode == Mode::Guided
            && self.selected_section.is_empty()
    }

    /// Preload finished, successfully or not; queued initial messages may now
    /// be consumed.
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Stores one message to auto-submit. Ignored once the latch has fired;
    /// only a full conversation teardown re-arms it.
    pub fn queue_initial(&mut self, text: impl Into<String>) {
        if !self.initial_consumed && self.initial.is_none() {
            self.initial = Some(text.into());
        }
    }

    pub fn take_initial(&mut self) -> Option<String> {
        if !self.ready {
            return None;
        }
        let pending = self.initial.take()?;
        self.initial_consumed = true;
        Some(pending)
    }

    pub fn submit(&mut self, text: &str, now_ms: u64) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Empty);
        }
        if self.is_sending() {
            return SubmitOutcome::Rejected(RejectReason::Busy);
        }
        if let Some(last) = self.messages.last() {
            if last.sender == Sender::User
                && last.content == text
                && now_ms.saturating_sub(last.sent_at_ms) < DUPLICATE_WINDOW_MS
            {
                return SubmitOutcome::Rejected(RejectReason::Duplicate);
            }
        }

        // Optimistic append: the user message lands in history before the
        // network call, whatever its outcome.
        self.messages.push(ChatMessage {
            sender: Sender::User,
            content: text.to_string(),
            sent_at_ms: now_ms,
        });

        let request = match self.scope {
            Scope::Onboarding => AskRequest::Onboarding {
                message: text.to_string(),
                mode: self.mode,
                section_id: (self.mode == Mode::Guided && !self.selected_section.is_empty())
                    .then(|| self.selected_section.clone()),
            },
            Scope::Helpdesk => AskRequest::Helpdesk {
                message: text.to_string(),
            },
        };
        self.phase = Phase::Sending {
            question: text.to_string(),
            scope: self.scope,
            mode: self.mode,
        };
        SubmitOutcome::Send(request)
    }

    pub fn resolve(&mut self, response: &AskResponse, now_ms: u64) {
        let Phase::Sending {
            question,
            scope,
            mode,
        } = mem::replace(&mut self.phase, Phase::Idle)
        else {
            return;
        };
        let content = match scope {
            Scope::Onboarding => {
                let used = response.mode_used.as_deref().unwrap_or(mode.wire());
                let label = if used == "guided" { "Guided" } else { "Global" };
                format!(
                    "**{label} Mode Answer**\n\n**Question:** {question}\n\n**Answer:** {}\n\n**Mode Used:** {used}",
                    response.answer
                )
            }
            Scope::Helpdesk => format!(
                "**Employee Helpdesk Answer**\n\n**Question:** {question}\n\n**Answer:** {}",
                response.answer
            ),
        };
        self.messages.push(ChatMessage {
            sender: Sender::Bot,
            content,
            sent_at_ms: now_ms,
        });
    }

    /// No automatic retry; the classified error is rendered as the reply and
    /// the user may resend manually.
    pub fn fail(&mut self, error: &ApiError, now_ms: u64) {
        if !self.is_sending() {
            return;
        }
        self.phase = Phase::Idle;
        self.messages.push(ChatMessage {
            sender: Sender::Bot,
            content: classify::error_reply(error),
            sent_at_ms: now_ms,
        });
    }

    pub fn new_chat(&mut self, now_ms: u64) {
        self.phase = Phase::Idle;
        self.messages = vec![ChatMessage {
            sender: Sender::Bot,
            content: WELCOME.to_string(),
            sent_at_ms: now_ms,
        }];
    }

    /// Full teardown: history, phase, and the one-shot latch.
    pub fn reset(&mut self, now_ms: u64) {
        self.new_chat(now_ms);
        self.initial = None;
        self.initial_consumed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChatEngine, Mode, RejectReason, Scope, Sender, SubmitOutcome, DUPLICATE_WINDOW_MS,
    };
    use crate::api::{ApiError, AskResponse};

    fn engine() -> ChatEngine {
        ChatEngine::new(Some(1_000))
    }

    fn answer(mode_used: Option<&str>) -> AskResponse {
        AskResponse {
            scope: "onboarding".to_string(),
            answer: "All details are in the handbook.".to_string(),
            mode_used: mode_used.map(str::to_string),
        }
    }

    fn user_messages(engine: &ChatEngine) -> usize {
        engine
            .messages()
            .iter()
            .filter(|m| m.sender == Sender::User)
            .count()
    }

    #[test]
    fn identical_resend_within_window_lands_a_single_user_entry() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit("Hello", 10_000),
            SubmitOutcome::Send(_)
        ));

        // An accidental double-send within the window is rejected; exactly
        // one user entry reaches history.
        assert!(matches!(
            engine.submit("Hello", 12_000),
            SubmitOutcome::Rejected(_)
        ));
        assert_eq!(user_messages(&engine), 1);

        engine.resolve(&answer(None), 12_500);

        // Past the window the same text is a fresh question.
        assert!(matches!(
            engine.submit("Hello", 10_000 + DUPLICATE_WINDOW_MS + 1_000),
            SubmitOutcome::Send(_)
        ));
        assert_eq!(user_messages(&engine), 2);
    }

    #[test]
    fn duplicate_check_only_looks_at_the_most_recent_message() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit("Hello", 10_000),
            SubmitOutcome::Send(_)
        ));
        engine.resolve(&answer(None), 10_100);

        // A bot reply sits between the two identical sends.
        assert!(matches!(
            engine.submit("Hello", 10_200),
            SubmitOutcome::Send(_)
        ));
        assert_eq!(user_messages(&engine), 2);
    }

    #[test]
    fn submit_while_sending_is_a_no_op() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit("first question", 10_000),
            SubmitOutcome::Send(_)
        ));
        let before = engine.messages().len();

        assert_eq!(
            engine.submit("second question", 10_100),
            SubmitOutcome::Rejected(RejectReason::Busy)
        );
        assert_eq!(engine.messages().len(), before);
        assert!(engine.is_sending());
    }

    #[test]
    fn empty_or_whitespace_text_is_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.submit("   ", 10_000),
            SubmitOutcome::Rejected(RejectReason::Empty)
        );
        assert_eq!(user_messages(&engine), 0);
    }

    #[test]
    fn onboarding_guided_request_carries_mode_and_section() {
        let mut engine = engine();
        engine.scope = Scope::Onboarding;
        engine.mode = Mode::Guided;
        engine.selected_section = "leave_policy".to_string();

        let SubmitOutcome::Send(request) = engine.submit("What is the leave policy?", 10_000)
        else {
            panic!("submit should dispatch");
        };
        assert_eq!(
            serde_json::to_value(&request).expect("request should serialize"),
            serde_json::json!({
                "scope": "onboarding",
                "message": "What is the leave policy?",
                "mode": "guided",
                "section_id": "leave_policy"
            })
        );
    }

    #[test]
    fn onboarding_global_request_omits_section() {
        let mut engine = engine();
        engine.scope = Scope::Onboarding;
        engine.mode = Mode::Global;
        engine.selected_section = "leave_policy".to_string();

        let SubmitOutcome::Send(request) = engine.submit("Working hours?", 10_000) else {
            panic!("submit should dispatch");
        };
        assert_eq!(
            serde_json::to_value(&request).expect("request should serialize"),
            serde_json::json!({
                "scope": "onboarding",
                "message": "Working hours?",
                "mode": "global"
            })
        );
    }

    #[test]
    fn helpdesk_request_has_no_mode_or_section() {
        let mut engine = engine();
        engine.scope = Scope::Helpdesk;

        let SubmitOutcome::Send(request) = engine.submit("Forgot to clock in", 10_000) else {
            panic!("submit should dispatch");
        };
        assert_eq!(
            serde_json::to_value(&request).expect("request should serialize"),
            serde_json::json!({
                "scope": "employee",
                "message": "Forgot to clock in"
            })
        );
    }

    #[test]
    fn onboarding_reply_is_annotated_with_the_mode_the_server_used() {
        let mut engine = engine();
        engine.scope = Scope::Onboarding;
        engine.mode = Mode::Global;
        assert!(matches!(
            engine.submit("Dress code?", 10_000),
            SubmitOutcome::Send(_)
        ));

        engine.resolve(&answer(Some("guided")), 11_000);
        let reply = engine.messages().last().expect("reply should be appended");
        assert_eq!(reply.sender, Sender::Bot);
        assert!(reply.content.contains("**Guided Mode Answer**"));
        assert!(reply.content.contains("**Mode Used:** guided"));
        assert!(reply.content.contains("Dress code?"));
        assert!(!engine.is_sending());
    }

    #[test]
    fn helpdesk_reply_is_unannotated() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit("Payroll date?", 10_000),
            SubmitOutcome::Send(_)
        ));

        engine.resolve(
            &AskResponse {
                scope: "employee".to_string(),
                answer: "Last working day of the month.".to_string(),
                mode_used: None,
            },
            11_000,
        );
        let reply = engine.messages().last().expect("reply should be appended");
        assert!(reply.content.contains("**Employee Helpdesk Answer**"));
        assert!(!reply.content.contains("Mode Used"));
    }

    #[test]
    fn failure_appends_classified_reply_and_returns_to_idle() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit("Hello", 10_000),
            SubmitOutcome::Send(_)
        ));

        engine.fail(&ApiError::Timeout, 11_000);
        assert!(!engine.is_sending());
        let reply = engine.messages().last().expect("error reply should land");
        assert_eq!(reply.sender, Sender::Bot);
        assert!(reply.content.contains("Network error"));

        // The user can immediately resend the same text: the failure reply is
        // now the last message, so duplicate suppression does not apply.
        assert!(matches!(
            engine.submit("Hello", 11_500),
            SubmitOutcome::Send(_)
        ));
    }

    #[test]
    fn initial_message_latch_fires_exactly_once() {
        let mut engine = engine();
        engine.queue_initial("Tell me about company policies");

        // Not ready yet: repeated takes (re-renders) yield nothing and do not
        // consume the latch.
        assert_eq!(engine.take_initial(), None);
        assert_eq!(engine.take_initial(), None);

        engine.mark_ready();
        assert_eq!(
            engine.take_initial().as_deref(),
            Some("Tell me about company policies")
        );
        assert_eq!(engine.take_initial(), None);

        // Re-queueing after consumption is ignored until teardown.
        engine.queue_initial("again");
        assert_eq!(engine.take_initial(), None);

        engine.reset(20_000);
        engine.mark_ready();
        engine.queue_initial("after teardown");
        assert_eq!(engine.take_initial().as_deref(), Some("after teardown"));
    }

    #[test]
    fn clock_failure_falls_back_with_a_single_warning() {
        let engine = ChatEngine::new(None);
        assert_eq!(engine.session_token(), "chat_fallback");
        let warnings = engine
            .messages()
            .iter()
            .filter(|m| m.content.contains("fallback chat mode"))
            .count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn generated_token_tags_the_conversation() {
        let engine = ChatEngine::new(Some(1_234_567));
        assert_eq!(engine.session_token(), "chat_1234567");
    }

    #[test]
    fn guided_mode_without_section_blocks_the_send_control() {
        let mut engine = engine();
        engine.scope = Scope::Onboarding;
        engine.mode = Mode::Guided;
        assert!(engine.needs_section());

        engine.selected_section = "leave_policy".to_string();
        assert!(!engine.needs_section());

        engine.scope = Scope::Helpdesk;
        engine.selected_section.clear();
        assert!(!engine.needs_section());
    }

    #[test]
    fn new_chat_resets_history_to_the_welcome_message() {
        let mut engine = engine();
        assert!(matches!(
            engine.submit("Hello", 10_000),
            SubmitOutcome::Send(_)
        ));
        engine.resolve(&answer(None), 10_500);

        engine.new_chat(11_000);
        assert_eq!(engine.messages().len(), 1);
        assert_eq!(engine.messages()[0].sender, Sender::Bot);
        assert!(!engine.is_sending());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod prefs;

use prefs::{PrefsSnapshot, PrefsStore};

pub const TOTAL_STEPS: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Home,
    Chat,
    Policies,
    Onboarding,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Skipped,
    Current,
    Pending,
}

/// Process-wide UI state container. Constructed once in `main` with an
/// injected persistence backend; only the preference subset is saved, on
/// every mutation of a persisted field. Session ids, step progress, and chat
/// history never touch disk.
pub struct AppStore {
    session_id: Option<String>,
    employee_id: Option<String>,
    is_dark_mode: bool,
    sidebar_open: bool,
    current_tab: Tab,
    current_step: u32,
    completed_steps: BTreeSet<u32>,
    skipped_steps: BTreeSet<u32>,
    prefs: Box<dyn PrefsStore>,
}

impl AppStore {
    pub fn new(prefs: Box<dyn PrefsStore>) -> Self {
        let snapshot = prefs.load().unwrap_or_default();
        Self {
            session_id: None,
            employee_id: None,
            is_dark_mode: snapshot.state.is_dark_mode,
            sidebar_open: snapshot.state.sidebar_open,
            current_tab: snapshot.state.current_tab,
            current_step: 1,
            completed_steps: BTreeSet::new(),
            skipped_steps: BTreeSet::new(),
            prefs,
        }
    }

    fn persist(&self) {
        let mut snapshot = PrefsSnapshot::default();
        snapshot.state.is_dark_mode = self.is_dark_mode;
        snapshot.state.sidebar_open = self.sidebar_open;
        snapshot.state.current_tab = self.current_tab;
        self.prefs.save(&snapshot);
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn employee_id(&self) -> Option<&str> {
        self.employee_id.as_deref()
    }

    pub fn set_session_id(&mut self, session_id: Option<String>) {
        self.session_id = session_id;
    }

    pub fn set_employee_id(&mut self, employee_id: Option<String>) {
        self.employee_id = employee_id;
    }

    /// Resets session identifiers and step progress. Chat history lives in
    /// the chat engine; the app shell resets it in the same synchronous step
    /// so callers observe the clear as one operation.
    pub fn clear_session(&mut self) {
        self.session_id = None;
        self.employee_id = None;
        self.current_step = 1;
        self.completed_steps.clear();
        self.skipped_steps.clear();
    }

    /// Server-side session rejection: reset session state, return to the
    /// home tab, and remove the persisted preference entry. The tab change
    /// must not write through `persist`, or it would recreate the entry in
    /// the same step.
    pub fn expire_session(&mut self) {
        self.clear_session();
        self.current_tab = Tab::Home;
        self.prefs.clear();
    }

    pub fn is_dark_mode(&self) -> bool {
        self.is_dark_mode
    }

    pub fn toggle_dark_mode(&mut self) {
        self.is_dark_mode = !self.is_dark_mode;
        self.persist();
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn set_sidebar_open(&mut self, open: bool) {
        self.sidebar_open = open;
        self.persist();
    }

    pub fn current_tab(&self) -> Tab {
        self.current_tab
    }

    pub fn set_current_tab(&mut self, tab: Tab) {
        self.current_tab = tab;
        self.persist();
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn set_current_step(&mut self, step: u32) {
        self.current_step = step;
    }

    /// Idempotent insert. A step is never both completed and skipped: marking
    /// one removes it from the other set.
    pub fn add_completed_step(&mut self, step: u32) {
        self.skipped_steps.remove(&step);
        self.completed_steps.insert(step);
    }

    pub fn add_skipped_step(&mut self, step: u32) {
        self.completed_steps.remove(&step);
        self.skipped_steps.insert(step);
    }

    pub fn completed_count(&self) -> usize {
        self.completed_steps.len()
    }

    pub fn get_progress(&self) -> u32 {
        let completed = self.completed_steps.len() as f64;
        ((completed / TOTAL_STEPS as f64) * 100.0).round() as u32
    }

    pub fn get_step_status(&self, step: u32) -> StepStatus {
        if self.completed_steps.contains(&step) {
            StepStatus::Completed
        } else if self.skipped_steps.contains(&step) {
            StepStatus::Skipped
        } else if self.current_step == step {
            StepStatus::Current
        } else {
            StepStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::prefs::{MemoryPrefs, PrefsStore};
    use super::{AppStore, StepStatus, Tab};
    use std::rc::Rc;

    fn store() -> AppStore {
        AppStore::new(Box::new(MemoryPrefs::new()))
    }

    struct Shared(Rc<MemoryPrefs>);

    impl PrefsStore for Shared {
        fn load(&self) -> Option<super::prefs::PrefsSnapshot> {
            self.0.load()
        }
        fn save(&self, snapshot: &super::prefs::PrefsSnapshot) {
            self.0.save(snapshot)
        }
        fn clear(&self) {
            self.0.clear()
        }
    }

    #[test]
    fn repeated_completed_adds_are_idempotent() {
        let mut store = store();
        for _ in 0..4 {
            store.add_completed_step(3);
        }
        store.add_completed_step(5);
        assert_eq!(store.completed_count(), 2);
    }

    #[test]
    fn progress_rounds_to_nearest_percent() {
        let mut store = store();
        assert_eq!(store.get_progress(), 0);

        store.add_completed_step(1);
        assert_eq!(store.get_progress(), 6); // 5.88 rounds up

        for step in 2..=17 {
            store.add_completed_step(step);
        }
        assert_eq!(store.get_progress(), 100);
    }

    #[test]
    fn step_status_resolution_order() {
        let mut store = store();
        store.add_completed_step(1);
        store.add_completed_step(2);
        store.set_current_step(3);

        assert_eq!(store.get_step_status(1), StepStatus::Completed);
        assert_eq!(store.get_step_status(3), StepStatus::Current);
        assert_eq!(store.get_step_status(5), StepStatus::Pending);
    }

    #[test]
    fn completed_and_skipped_are_mutually_exclusive() {
        let mut store = store();
        store.add_skipped_step(4);
        store.add_completed_step(4);
        assert_eq!(store.get_step_status(4), StepStatus::Completed);

        store.add_skipped_step(4);
        assert_eq!(store.get_step_status(4), StepStatus::Skipped);
        assert_eq!(store.completed_count(), 0);
    }

    #[test]
    fn clear_session_resets_progress_but_not_prefs() {
        let mut store = store();
        store.set_session_id(Some("chat_1".to_string()));
        store.set_employee_id(Some("emp_1".to_string()));
        store.add_completed_step(2);
        store.toggle_dark_mode();

        store.clear_session();
        assert_eq!(store.session_id(), None);
        assert_eq!(store.employee_id(), None);
        assert_eq!(store.current_step(), 1);
        assert_eq!(store.completed_count(), 0);
        assert!(store.is_dark_mode());
    }

    #[test]
    fn only_preference_subset_is_persisted() {
        let prefs = Rc::new(MemoryPrefs::new());
        let mut store = AppStore::new(Box::new(Shared(Rc::clone(&prefs))));
        store.set_session_id(Some("chat_9".to_string()));
        assert_eq!(prefs.load(), None); // session mutation does not persist

        store.set_current_tab(Tab::Policies);
        let snapshot = prefs.load().expect("tab change should persist");
        assert_eq!(snapshot.state.current_tab, Tab::Policies);

        let reloaded = AppStore::new(Box::new(Shared(prefs)));
        assert_eq!(reloaded.current_tab(), Tab::Policies);
        assert_eq!(reloaded.session_id(), None);
    }

    #[test]
    fn session_expiry_removes_the_persisted_entry_and_goes_home() {
        let prefs = Rc::new(MemoryPrefs::new());
        let mut store = AppStore::new(Box::new(Shared(Rc::clone(&prefs))));
        store.set_session_id(Some("chat_7".to_string()));
        store.add_completed_step(2);
        store.set_current_tab(Tab::Policies);
        assert!(prefs.load().is_some());

        store.expire_session();
        assert_eq!(store.session_id(), None);
        assert_eq!(store.completed_count(), 0);
        assert_eq!(store.current_tab(), Tab::Home);
        // The tab change inside expiry must not write the entry back.
        assert_eq!(prefs.load(), None);
    }
}

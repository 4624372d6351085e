use crate::store::Tab;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The serialized shape on disk: `{"state": {...}}`. The wrapper key is part
/// of the format; tools reading the file rely on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefsSnapshot {
    pub state: PrefsState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefsState {
    pub is_dark_mode: bool,
    pub sidebar_open: bool,
    pub current_tab: Tab,
}

impl Default for PrefsSnapshot {
    fn default() -> Self {
        Self {
            state: PrefsState {
                is_dark_mode: false,
                sidebar_open: false,
                current_tab: Tab::Home,
            },
        }
    }
}

/// Persistence boundary for the UI preference subset. Only
/// `{is_dark_mode, sidebar_open, current_tab}` survive a restart; session
/// and progress state are ephemeral per run.
pub trait PrefsStore {
    fn load(&self) -> Option<PrefsSnapshot>;
    fn save(&self, snapshot: &PrefsSnapshot);
    fn clear(&self);
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// File-backed store under `~/.hrva/prefs.json`, written atomically.
pub struct FilePrefs {
    path: PathBuf,
}

impl FilePrefs {
    pub fn new() -> Self {
        Self {
            path: home_dir().join(".hrva").join("prefs.json"),
        }
    }

    #[cfg(test)]
    fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        match fs::rename(&tmp_path, &self.path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if self.path.exists() {
                    fs::remove_file(&self.path)?;
                    fs::rename(&tmp_path, &self.path)?;
                    Ok(())
                } else {
                    Err(rename_err)
                }
            }
        }
    }
}

impl PrefsStore for FilePrefs {
    fn load(&self) -> Option<PrefsSnapshot> {
        let data = fs::read(&self.path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!("failed to parse {}: {err}", self.path.display());
                None
            }
        }
    }

    fn save(&self, snapshot: &PrefsSnapshot) {
        let bytes = match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("failed to serialize prefs: {err}");
                return;
            }
        };
        if let Err(err) = self.write_atomic(&bytes) {
            tracing::warn!("failed to persist prefs to {}: {err}", self.path.display());
        }
    }

    fn clear(&self) {
        if self.path.exists() {
            if let Err(err) = fs::remove_file(&self.path) {
                tracing::warn!("failed to remove {}: {err}", self.path.display());
            }
        }
    }
}

/// In-memory store for tests and for running without a writable home.
#[derive(Default)]
pub struct MemoryPrefs {
    slot: RefCell<Option<PrefsSnapshot>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsStore for MemoryPrefs {
    fn load(&self) -> Option<PrefsSnapshot> {
        self.slot.borrow().clone()
    }

    fn save(&self, snapshot: &PrefsSnapshot) {
        *self.slot.borrow_mut() = Some(snapshot.clone());
    }

    fn clear(&self) {
        *self.slot.borrow_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{FilePrefs, MemoryPrefs, PrefsSnapshot, PrefsStore};
    use crate::store::Tab;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "hrva_prefs_{prefix}_{}_{}.json",
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn snapshot_serializes_under_state_key() {
        let mut snapshot = PrefsSnapshot::default();
        snapshot.state.is_dark_mode = true;
        snapshot.state.current_tab = Tab::Chat;

        let value = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "state": {
                    "is_dark_mode": true,
                    "sidebar_open": false,
                    "current_tab": "chat"
                }
            })
        );
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let prefs = FilePrefs::at(temp_path("roundtrip"));
        let mut snapshot = PrefsSnapshot::default();
        snapshot.state.sidebar_open = true;

        prefs.save(&snapshot);
        assert_eq!(prefs.load(), Some(snapshot));

        prefs.clear();
        assert_eq!(prefs.load(), None);
    }

    #[test]
    fn file_store_treats_garbage_as_absent() {
        let path = temp_path("garbage");
        fs::write(&path, b"not json at all").expect("garbage fixture should write");

        let prefs = FilePrefs::at(path.clone());
        assert_eq!(prefs.load(), None);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn memory_store_round_trips() {
        let prefs = MemoryPrefs::new();
        assert_eq!(prefs.load(), None);

        let snapshot = PrefsSnapshot::default();
        prefs.save(&snapshot);
        assert_eq!(prefs.load(), Some(snapshot));

        prefs.clear();
        assert_eq!(prefs.load(), None);
    }
}

//! Local transcript history cache.
//!
//! Chat history is cached per session as a convenience for reloads. The
//! cache is never authoritative: corrupt or stale files are ignored and
//! every write is best-effort.

use crate::transcript::TranscriptEntry;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk shape of one session's cached transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryFile {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// ISO 8601 timestamp when the history was saved.
    pub saved_at: String,
    pub session_id: String,
    pub entries: Vec<TranscriptEntry>,
}

impl HistoryFile {
    pub const CURRENT_SCHEMA_VERSION: u32 = 1;

    /// Maximum age in hours before a cached transcript is considered
    /// stale.
    pub const MAX_AGE_HOURS: i64 = 24;
}

fn history_dir() -> PathBuf {
    // Allow override for testing
    if let Ok(dir) = std::env::var("LAB_HISTORY_DIR") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lab-playground")
        .join("history")
}

fn history_path(session_id: &str) -> PathBuf {
    history_dir().join(format!("{session_id}.json"))
}

/// Save the transcript for a session.
pub fn save(session_id: &str, entries: &[TranscriptEntry]) -> Result<(), String> {
    let history = HistoryFile {
        schema_version: HistoryFile::CURRENT_SCHEMA_VERSION,
        saved_at: chrono::Utc::now().to_rfc3339(),
        session_id: session_id.to_string(),
        entries: entries.to_vec(),
    };

    let path = history_path(session_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let json = serde_json::to_string_pretty(&history).map_err(|e| e.to_string())?;
    std::fs::write(&path, format!("{json}\n")).map_err(|e| e.to_string())?;

    info!(
        "[history] saved {} entries for session {session_id}",
        history.entries.len()
    );
    Ok(())
}

/// Load the cached transcript for a session.
///
/// Returns None if:
/// - no cache file exists
/// - the file is corrupted
/// - the cache is too old (> 24 hours)
pub fn load(session_id: &str) -> Option<Vec<TranscriptEntry>> {
    let path = history_path(session_id);
    if !path.exists() {
        return None;
    }

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("[history] failed to read cache file: {e}");
            return None;
        }
    };

    let history: HistoryFile = match serde_json::from_str(&contents) {
        Ok(h) => h,
        Err(e) => {
            warn!("[history] failed to parse cache file: {e}");
            return None;
        }
    };

    if let Ok(saved_at) = chrono::DateTime::parse_from_rfc3339(&history.saved_at) {
        let age = chrono::Utc::now().signed_duration_since(saved_at);
        if age.num_seconds() > HistoryFile::MAX_AGE_HOURS * 3600 {
            info!(
                "[history] cache for session {session_id} too old ({}h), ignoring",
                age.num_seconds() / 3600
            );
            return None;
        }
    }

    info!(
        "[history] loaded {} entries for session {session_id}",
        history.entries.len()
    );
    Some(history.entries)
}

/// Delete the cached transcript for a session, if any.
pub fn clear(session_id: &str) {
    let path = history_path(session_id);
    if path.exists() {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("[history] failed to remove cache file: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{ChatMessage, Transcript};
    use serial_test::serial;

    fn sample_entries() -> Vec<TranscriptEntry> {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::User {
            text: "hello".to_string(),
        });
        transcript.entries().to_vec()
    }

    #[test]
    #[serial]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LAB_HISTORY_DIR", dir.path());

        let entries = sample_entries();
        save("sess-1", &entries).unwrap();
        let loaded = load("sess-1").expect("cache should load");
        assert_eq!(loaded, entries);

        std::env::remove_var("LAB_HISTORY_DIR");
    }

    #[test]
    #[serial]
    fn test_load_missing_session_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LAB_HISTORY_DIR", dir.path());

        assert!(load("no-such-session").is_none());

        std::env::remove_var("LAB_HISTORY_DIR");
    }

    #[test]
    #[serial]
    fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LAB_HISTORY_DIR", dir.path());

        std::fs::write(dir.path().join("sess-2.json"), "{not json").unwrap();
        assert!(load("sess-2").is_none());

        std::env::remove_var("LAB_HISTORY_DIR");
    }

    #[test]
    #[serial]
    fn test_load_rejects_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LAB_HISTORY_DIR", dir.path());

        let old = chrono::Utc::now() - chrono::Duration::hours(48);
        let history = HistoryFile {
            schema_version: HistoryFile::CURRENT_SCHEMA_VERSION,
            saved_at: old.to_rfc3339(),
            session_id: "sess-3".to_string(),
            entries: sample_entries(),
        };
        std::fs::write(
            dir.path().join("sess-3.json"),
            serde_json::to_string(&history).unwrap(),
        )
        .unwrap();

        assert!(load("sess-3").is_none());

        std::env::remove_var("LAB_HISTORY_DIR");
    }

    #[test]
    #[serial]
    fn test_clear_removes_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LAB_HISTORY_DIR", dir.path());

        save("sess-4", &sample_entries()).unwrap();
        assert!(load("sess-4").is_some());
        clear("sess-4");
        assert!(load("sess-4").is_none());

        std::env::remove_var("LAB_HISTORY_DIR");
    }
}

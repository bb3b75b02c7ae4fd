//! Dialogue history: one record per answered phrase, in arrival order.
//!
//! Exported as a JSON array whose records use the keys
//! `id, timestamp, userMidi, aiMidi, userStartTime, aiStartTime`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::midi::NoteList;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write history: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise history: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// DialogueRecord
// ---------------------------------------------------------------------------

/// A user phrase's notes paired with the reply they triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueRecord {
    pub id: Uuid,
    /// Milliseconds since the Unix epoch at which the reply landed.
    pub timestamp: i64,
    pub user_midi: NoteList,
    pub ai_midi: NoteList,
    pub user_start_time: f64,
    pub ai_start_time: f64,
}

impl DialogueRecord {
    pub fn new(
        user_midi: NoteList,
        ai_midi: NoteList,
        user_start_time: f64,
        ai_start_time: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            user_midi,
            ai_midi,
            user_start_time,
            ai_start_time,
        }
    }
}

// ---------------------------------------------------------------------------
// DialogueHistory
// ---------------------------------------------------------------------------

/// Append-only list of [`DialogueRecord`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogueHistory(Vec<DialogueRecord>);

impl DialogueHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new history with `record` appended.
    pub fn with_record(&self, record: DialogueRecord) -> Self {
        let mut records = self.0.clone();
        records.push(record);
        Self(records)
    }

    pub fn records(&self) -> &[DialogueRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<String, HistoryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the history as JSON to `path`, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

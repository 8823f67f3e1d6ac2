// In-process recording library (tests and --no-library runs)

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{RecordingStore, RecordingSummary};
use crate::error::StoreError;
use crate::recording::Timeline;

struct Entry {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    timeline: Timeline,
}

/// Recording library held entirely in memory, insertion ordered
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordingStore for MemoryStore {
    fn list(&self) -> Result<Vec<RecordingSummary>, StoreError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|e| RecordingSummary::describe(&e.name, &e.timeline, e.created_at, e.updated_at))
            .collect())
    }

    fn load(&self, name: &str) -> Result<Option<Timeline>, StoreError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.timeline.clone()))
    }

    fn save(&self, name: &str, timeline: &Timeline) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.timeline = timeline.clone();
                entry.updated_at = now;
            }
            None => entries.push(Entry {
                name: name.to_string(),
                created_at: now,
                updated_at: now,
                timeline: timeline.clone(),
            }),
        }
        Ok(())
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        if old_name == new_name {
            return Ok(());
        }
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.name == new_name) {
            return Err(StoreError::NameConflict(new_name.to_string()));
        }
        let entry = entries
            .iter_mut()
            .find(|e| e.name == old_name)
            .ok_or_else(|| StoreError::NotFound(old_name.to_string()))?;
        entry.name = new_name.to_string();
        entry.updated_at = Utc::now();
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.name != name);
        Ok(entries.len() != before)
    }
}

// Recording library: named timelines and their storage

pub mod database;
pub mod memory;
pub mod metadata;

pub use database::SqliteStore;
pub use memory::MemoryStore;
pub use metadata::*;

use crate::error::StoreError;
use crate::recording::Timeline;

/// Named collection of saved timelines
pub trait RecordingStore {
    /// All recordings, oldest first
    fn list(&self) -> Result<Vec<RecordingSummary>, StoreError>;

    fn load(&self, name: &str) -> Result<Option<Timeline>, StoreError>;

    /// Insert or overwrite the recording called `name`
    fn save(&self, name: &str, timeline: &Timeline) -> Result<(), StoreError>;

    /// Fails with `NameConflict` when `new_name` is taken, `NotFound` when
    /// `old_name` does not exist. Renaming to the same name is a no-op.
    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError>;

    /// Returns false when nothing by that name existed
    fn delete(&self, name: &str) -> Result<bool, StoreError>;
}

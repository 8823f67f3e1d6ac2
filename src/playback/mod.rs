// Playback modules

pub mod remap;
pub mod scheduler;

pub use remap::{remap, OutputChannel};
pub use scheduler::{
    chunk_step, ChunkStep, PlaybackContext, PlaybackCursor, PlaybackReport, PlaybackScheduler,
    PlaybackStatus, Progress, DEFAULT_CHUNK_THRESHOLD_MS, DEFAULT_PROGRESS_INTERVAL_MS,
};

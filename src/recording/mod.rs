// Recording modules

pub mod capture;
pub mod midi;
pub mod preroll;
pub mod silence;
pub mod timeline;

pub use capture::{CaptureSession, CaptureSummary};
pub use midi::{MessageKind, Payload, TimestampedMidiEvent};
pub use preroll::{MidiPrerollBuffer, DEFAULT_PRE_ROLL_MS, MAX_PRE_ROLL_MS};
pub use silence::{SilenceDetector, DEFAULT_QUIET_INTERVAL_MS};
pub use timeline::Timeline;

use serde::{Deserialize, Serialize};

/// Current recording state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Ready to record
    #[default]
    Idle,
    /// Currently recording
    Recording,
}

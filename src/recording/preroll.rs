// Pre-roll buffer management
// Maintains a rolling window of recent MIDI events to include when recording starts

use std::collections::VecDeque;

use super::midi::TimestampedMidiEvent;

/// Default pre-roll window in milliseconds
pub const DEFAULT_PRE_ROLL_MS: f64 = 500.0;

/// Maximum pre-roll window accepted from configuration
pub const MAX_PRE_ROLL_MS: f64 = 5_000.0;

/// Rolling buffer for MIDI events, bounded by time rather than count.
///
/// Pushing trims against the newest event, so a quiet input keeps its last
/// burst around. Readers pass the moment capture starts to `window_before`,
/// which only returns what falls inside the window ending there.
pub struct MidiPrerollBuffer {
    events: VecDeque<TimestampedMidiEvent>,
    window_ms: f64,
}

impl MidiPrerollBuffer {
    pub fn new(window_ms: f64) -> Self {
        Self {
            events: VecDeque::new(),
            window_ms: window_ms.clamp(0.0, MAX_PRE_ROLL_MS),
        }
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }

    pub fn push(&mut self, event: TimestampedMidiEvent) {
        self.events.push_back(event);
        self.trim();
        log::trace!("Buffered pre-roll MIDI event, buffer size: {}", self.events.len());
    }

    fn trim(&mut self) {
        let Some(newest) = self.events.back().map(|e| e.timestamp_ms) else {
            return;
        };
        while let Some(front) = self.events.front() {
            if newest - front.timestamp_ms > self.window_ms {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Events no older than the window measured back from `until_ms`, oldest
    /// first. The buffer is not cleared: it keeps accumulating regardless of
    /// capture state.
    pub fn window_before(&self, until_ms: f64) -> Vec<TimestampedMidiEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp_ms <= until_ms && until_ms - e.timestamp_ms <= self.window_ms)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for MidiPrerollBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_PRE_ROLL_MS)
    }
}

// Ordered, timestamped event buffer shared by capture and playback

use serde::{Deserialize, Serialize};

use super::midi::TimestampedMidiEvent;

/// An ordered sequence of events, kept in non-decreasing timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    events: Vec<TimestampedMidiEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from events in any order. The sort is stable, so events with equal
    /// timestamps keep their relative order.
    pub fn from_unsorted(mut events: Vec<TimestampedMidiEvent>) -> Self {
        events.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
        Self { events }
    }

    /// Append an event. An event older than the current tail is inserted after
    /// every event with a timestamp not greater than its own.
    pub fn push(&mut self, event: TimestampedMidiEvent) {
        match self.events.last() {
            Some(last) if event.timestamp_ms < last.timestamp_ms => {
                let at = self
                    .events
                    .partition_point(|e| e.timestamp_ms <= event.timestamp_ms);
                self.events.insert(at, event);
            }
            _ => self.events.push(event),
        }
    }

    /// Insert a batch ahead of the current contents. Events in the batch that are
    /// newer than the current head are merged into place.
    pub fn prepend<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = TimestampedMidiEvent>,
    {
        let mut merged: Vec<TimestampedMidiEvent> = batch.into_iter().collect();
        if merged.is_empty() {
            return;
        }
        merged.append(&mut self.events);
        *self = Self::from_unsorted(merged);
    }

    /// Shift all timestamps so the first event is at exactly 0.
    pub fn normalize(&mut self) {
        let Some(first) = self.events.first().map(|e| e.timestamp_ms) else {
            return;
        };
        if first == 0.0 {
            return;
        }
        for event in &mut self.events {
            event.timestamp_ms -= first;
        }
        // Guard against rounding leaving the head a hair off zero
        self.events[0].timestamp_ms = 0.0;
    }

    /// Timestamp of the last event, in milliseconds (0 when empty)
    pub fn duration_ms(&self) -> f64 {
        self.events.last().map(|e| e.timestamp_ms).unwrap_or(0.0)
    }

    /// True when the buffer holds at least one note-on.
    /// A buffer of only controller messages has nothing worth saving or playing.
    pub fn has_content(&self) -> bool {
        self.events.iter().any(|e| e.is_note_on())
    }

    pub fn events(&self) -> &[TimestampedMidiEvent] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&TimestampedMidiEvent> {
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

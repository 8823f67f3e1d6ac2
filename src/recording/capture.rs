// Capture session: owns the timeline while a take is being recorded

use super::midi::TimestampedMidiEvent;
use super::preroll::MidiPrerollBuffer;
use super::timeline::Timeline;
use super::RecordingStatus;

/// Result of finishing a take
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSummary {
    pub event_count: usize,
    pub duration_ms: f64,
}

/// Recording state machine. The timeline itself belongs to the coordinator and
/// is lent to each call, so capture and playback never hold it at the same time.
#[derive(Debug, Default)]
pub struct CaptureSession {
    status: RecordingStatus,
    started_at_ms: Option<f64>,
    duration_ms: f64,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }

    pub fn started_at_ms(&self) -> Option<f64> {
        self.started_at_ms
    }

    /// Duration of the last finished take
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Begin a take. Returns false (and changes nothing) if already recording
    /// or no input is selected.
    pub fn start(&mut self, timeline: &mut Timeline, now_ms: f64, input_selected: bool) -> bool {
        if self.is_recording() {
            log::debug!("Capture start ignored: already recording");
            return false;
        }
        if !input_selected {
            log::debug!("Capture start ignored: no input selected");
            return false;
        }

        timeline.clear();
        self.status = RecordingStatus::Recording;
        self.started_at_ms = Some(now_ms);
        self.duration_ms = 0.0;
        log::info!("Capture started at {:.1}ms", now_ms);
        true
    }

    /// Record one live event. On the first event of a take the pre-roll window
    /// ending at that event is spliced in ahead of it, so the attack that
    /// triggered an auto-record is kept. Must be called before the event itself
    /// is pushed to the pre-roll.
    pub fn ingest(
        &mut self,
        timeline: &mut Timeline,
        event: TimestampedMidiEvent,
        preroll: &MidiPrerollBuffer,
    ) -> bool {
        if !self.is_recording() || event.is_system() {
            return false;
        }

        if timeline.is_empty() {
            let recovered = preroll.window_before(event.timestamp_ms);
            if !recovered.is_empty() {
                log::debug!(
                    "Splicing {} pre-roll events ({:.0}ms window) into take",
                    recovered.len(),
                    preroll.window_ms()
                );
                timeline.prepend(recovered);
            }
        }
        timeline.push(event);
        true
    }

    /// Finish the take: normalize timestamps and record the duration.
    pub fn stop(&mut self, timeline: &mut Timeline) -> Option<CaptureSummary> {
        if !self.is_recording() {
            log::debug!("Capture stop ignored: not recording");
            return None;
        }

        timeline.normalize();
        self.duration_ms = timeline.duration_ms();
        self.status = RecordingStatus::Idle;
        self.started_at_ms = None;

        let summary = CaptureSummary {
            event_count: timeline.len(),
            duration_ms: self.duration_ms,
        };
        log::info!(
            "Capture stopped, collected {} events ({:.1}s)",
            summary.event_count,
            summary.duration_ms / 1000.0
        );
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(data: &[u8], ts: f64) -> TimestampedMidiEvent {
        TimestampedMidiEvent::new(data, ts).unwrap()
    }

    #[test]
    fn test_start_requires_input() {
        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        assert!(!session.start(&mut timeline, 0.0, false));
        assert!(!session.is_recording());
        assert!(session.start(&mut timeline, 0.0, true));
        assert!(!session.start(&mut timeline, 5.0, true));
        assert_eq!(session.started_at_ms(), Some(0.0));
    }

    #[test]
    fn test_start_clears_previous_take() {
        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        timeline.push(ev(&[0x90, 60, 100], 0.0));
        session.start(&mut timeline, 10.0, true);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_first_ingest_splices_preroll() {
        let mut preroll = MidiPrerollBuffer::new(500.0);
        preroll.push(ev(&[0xB0, 64, 127], 1000.0));
        preroll.push(ev(&[0x90, 60, 90], 1200.0));

        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        session.start(&mut timeline, 1300.0, true);

        assert!(session.ingest(&mut timeline, ev(&[0x90, 62, 90], 1300.0), &preroll));
        assert!(session.ingest(&mut timeline, ev(&[0x80, 62, 0], 1400.0), &preroll));

        let data: Vec<&[u8]> = timeline.events().iter().map(|e| e.data()).collect();
        assert_eq!(
            data,
            vec![&[0xB0, 64, 127][..], &[0x90, 60, 90], &[0x90, 62, 90], &[0x80, 62, 0]]
        );
    }

    #[test]
    fn test_splice_ignores_burst_older_than_window() {
        let mut preroll = MidiPrerollBuffer::new(500.0);
        preroll.push(ev(&[0x90, 60, 90], 0.0));
        preroll.push(ev(&[0x80, 60, 0], 100.0));
        preroll.push(ev(&[0xB0, 64, 127], 59_800.0));

        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        session.start(&mut timeline, 60_000.0, true);
        session.ingest(&mut timeline, ev(&[0x90, 62, 90], 60_000.0), &preroll);
        session.stop(&mut timeline);

        let stamps: Vec<f64> = timeline.events().iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, vec![0.0, 200.0]);
        assert_eq!(timeline.events()[0].data(), &[0xB0, 64, 127]);
    }

    #[test]
    fn test_system_events_are_not_ingested() {
        let preroll = MidiPrerollBuffer::default();
        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        session.start(&mut timeline, 0.0, true);
        assert!(!session.ingest(&mut timeline, ev(&[0xF8], 1.0), &preroll));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_ingest_while_idle_is_ignored() {
        let preroll = MidiPrerollBuffer::default();
        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        assert!(!session.ingest(&mut timeline, ev(&[0x90, 60, 100], 1.0), &preroll));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_stop_normalizes() {
        let preroll = MidiPrerollBuffer::default();
        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        session.start(&mut timeline, 0.0, true);
        session.ingest(&mut timeline, ev(&[0x90, 60, 100], 2500.0), &preroll);
        session.ingest(&mut timeline, ev(&[0x80, 60, 0], 3250.0), &preroll);

        let summary = session.stop(&mut timeline).unwrap();
        assert_eq!(summary, CaptureSummary { event_count: 2, duration_ms: 750.0 });
        assert_eq!(timeline.events()[0].timestamp_ms, 0.0);
        assert_eq!(session.status(), RecordingStatus::Idle);
        assert!(session.stop(&mut timeline).is_none());
    }

    #[test]
    fn test_stop_with_no_events_is_valid() {
        let mut session = CaptureSession::new();
        let mut timeline = Timeline::new();
        session.start(&mut timeline, 0.0, true);
        let summary = session.stop(&mut timeline).unwrap();
        assert_eq!(summary.duration_ms, 0.0);
        assert_eq!(summary.event_count, 0);
        assert!(timeline.is_empty());
    }
}

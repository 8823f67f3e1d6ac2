// User-facing notifications emitted by the engine

/// Something the front end should show
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// One-line status text
    Status(String),
    /// A live message arrived (drives the activity indicator)
    ActivityPulse,
    RecordingStarted,
    RecordingStopped { duration_ms: f64, event_count: usize },
    PlaybackStarted { name: Option<String> },
    PlaybackStopped,
    Progress { position_ms: f64, total_ms: f64 },
}

impl Notification {
    /// Text for a console front end. Pulses have none.
    pub fn describe(&self) -> Option<String> {
        match self {
            Notification::Status(text) => Some(text.clone()),
            Notification::ActivityPulse => None,
            Notification::RecordingStarted => Some("Recording...".to_string()),
            Notification::RecordingStopped { duration_ms, .. } => Some(format!(
                "Recording finished. Length: {:.1}s.",
                duration_ms / 1000.0
            )),
            Notification::PlaybackStarted { name } => Some(format!(
                "Playing back recording: {}",
                name.as_deref().unwrap_or("Current Recording")
            )),
            Notification::PlaybackStopped => Some("Playback stopped.".to_string()),
            Notification::Progress { position_ms, total_ms } => Some(format!(
                "{} / {}",
                format_duration(position_ms / 1000.0),
                format_duration(total_ms / 1000.0)
            )),
        }
    }
}

/// Format duration as zero-padded mm:ss
pub fn format_duration(secs: f64) -> String {
    let total_secs = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    let mins = total_secs / 60;
    let secs = total_secs % 60;

    format!("{:02}:{:02}", mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(61.9), "01:01");
        assert_eq!(format_duration(-3.0), "00:00");
        assert_eq!(format_duration(3725.0), "62:05");
    }

    #[test]
    fn test_describe() {
        let stopped = Notification::RecordingStopped { duration_ms: 2340.0, event_count: 8 };
        assert_eq!(stopped.describe().unwrap(), "Recording finished. Length: 2.3s.");
        assert!(Notification::ActivityPulse.describe().is_none());
        let progress = Notification::Progress { position_ms: 1500.0, total_ms: 65_000.0 };
        assert_eq!(progress.describe().unwrap(), "00:01 / 01:05");
    }
}

// Recording metadata structures

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::recording::Timeline;

/// Sanitize a recording name for use as a file stem.
/// Replaces path separators, colons and other characters most filesystems reject.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "recording".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Strip a `.mid`/`.midi` extension (any case) to get a recording name
pub fn name_from_file_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    for ext in [".midi", ".mid"] {
        if lower.ends_with(ext) && file_name.len() > ext.len() {
            return file_name[..file_name.len() - ext.len()].to_string();
        }
    }
    file_name.to_string()
}

/// Default file name when exporting a recording without an explicit path
pub fn export_file_name(name: &str) -> String {
    format!("{}.mid", sanitize_file_stem(name))
}

/// Name given to takes saved automatically after silence
pub fn auto_recording_name(at: DateTime<Local>) -> String {
    format!("Auto-recording {}", at.format("%Y-%m-%d %H:%M:%S"))
}

/// `base`, or `base (2)`, `base (3)`... when the library already holds it
pub fn unique_name(base: &str, existing: &[RecordingSummary]) -> String {
    let taken = |candidate: &str| existing.iter().any(|s| s.name == candidate);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{} ({})", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Library entry for list display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub event_count: usize,
    /// At least one note-on; controller-only takes are kept but flagged
    pub has_content: bool,
}

impl RecordingSummary {
    pub fn describe(name: &str, timeline: &Timeline, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            created_at,
            updated_at,
            duration_ms: timeline.duration_ms(),
            event_count: timeline.len(),
            has_content: timeline.has_content(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Take 1: verse/chorus"), "Take 1_ verse_chorus");
        assert_eq!(sanitize_file_stem("  ..  "), "recording");
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("Auto-recording 2026-03-14 09:26:53"), "Auto-recording 2026-03-14 09_26_53.mid");
    }

    #[test]
    fn test_unique_name_appends_counter() {
        let now = Utc::now();
        let summary = |name: &str| RecordingSummary::describe(name, &Timeline::new(), now, now);

        assert_eq!(unique_name("take", &[]), "take");
        assert_eq!(unique_name("take", &[summary("other")]), "take");
        assert_eq!(unique_name("take", &[summary("take")]), "take (2)");
        assert_eq!(unique_name("take", &[summary("take"), summary("take (2)")]), "take (3)");
    }

    #[test]
    fn test_name_from_file_name() {
        assert_eq!(name_from_file_name("song.mid"), "song");
        assert_eq!(name_from_file_name("Song.MIDI"), "Song");
        assert_eq!(name_from_file_name("notes.txt"), "notes.txt");
        assert_eq!(name_from_file_name(".mid"), ".mid");
    }

    #[test]
    fn test_auto_recording_name() {
        let at = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(auto_recording_name(at), "Auto-recording 2026-03-14 09:26:53");
    }
}

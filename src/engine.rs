// Engine: the single coordinator that owns every piece of session state
//
// Device input, user commands and timer expiries are all delivered here and
// each runs to completion. Nothing in here returns an error to the caller:
// adapter failures are logged and turned into status notifications.

use std::path::Path;

use chrono::Local;
use crossbeam_channel::Sender;

use crate::clock::Clock;
use crate::config::Config;
use crate::devices::OutputSink;
use crate::encoding;
use crate::error::{CodecError, StoreError};
use crate::notifications::Notification;
use crate::playback::{remap, OutputChannel, PlaybackContext, PlaybackReport, PlaybackScheduler, Progress};
use crate::recording::{
    CaptureSession, CaptureSummary, MessageKind, MidiPrerollBuffer, SilenceDetector, Timeline,
    TimestampedMidiEvent,
};
use crate::session::{auto_recording_name, name_from_file_name, unique_name, RecordingStore, RecordingSummary};
use crate::timers::{TimerKind, TimerQueue};

/// Build a playback context from disjoint engine fields
fn playback_ctx<'a, O: OutputSink>(
    timeline: &'a Timeline,
    timers: &'a mut TimerQueue,
    output: &'a mut Option<O>,
    channel: OutputChannel,
    now_ms: f64,
) -> PlaybackContext<'a> {
    PlaybackContext {
        timeline,
        timers,
        sink: output.as_mut().map(|o| o as &mut dyn OutputSink),
        channel,
        now_ms,
    }
}

pub struct Engine<C: Clock, O: OutputSink> {
    clock: C,
    config: Config,
    timers: TimerQueue,
    preroll: MidiPrerollBuffer,
    capture: CaptureSession,
    silence: SilenceDetector,
    playback: PlaybackScheduler,
    timeline: Timeline,
    /// Library name of what is in the buffer, if it came from (or went to) the library
    current_name: Option<String>,
    input: Option<String>,
    output: Option<O>,
    store: Box<dyn RecordingStore + Send>,
    notifier: Sender<Notification>,
}

impl<C: Clock, O: OutputSink> Engine<C, O> {
    pub fn new(
        clock: C,
        config: Config,
        store: Box<dyn RecordingStore + Send>,
        notifier: Sender<Notification>,
    ) -> Self {
        let config = config.sanitized();
        Self {
            preroll: MidiPrerollBuffer::new(config.pre_roll_ms),
            silence: SilenceDetector::new(config.silence_timeout_ms),
            playback: PlaybackScheduler::new(config.chunk_threshold_ms, config.progress_interval_ms),
            clock,
            config,
            timers: TimerQueue::new(),
            capture: CaptureSession::new(),
            timeline: Timeline::new(),
            current_name: None,
            input: None,
            output: None,
            store,
            notifier,
        }
    }

    // --- Queries ---

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// True when the buffer holds at least one note-on (gates play/save/export)
    pub fn has_content(&self) -> bool {
        self.timeline.has_content()
    }

    pub fn selected_input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn position(&self) -> Progress {
        Progress {
            position_ms: self.playback.position(self.clock.now_ms()),
            total_ms: self.timeline.duration_ms(),
        }
    }

    /// Earliest pending timer deadline, in clock milliseconds
    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.next_deadline()
    }

    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    // --- Device input ---

    /// Handle one raw message from the selected input, stamped on arrival.
    pub fn on_device_message(&mut self, data: &[u8]) {
        let now = self.clock.now_ms();
        let Some(event) = TimestampedMidiEvent::new(data, now) else {
            log::debug!("Ignoring empty MIDI message");
            return;
        };
        let kind = event.kind();

        self.pass_through(data, &event);

        if kind.is_note_on() {
            self.notify(Notification::ActivityPulse);
        }

        if self.config.auto_record && kind.is_note_on() && !self.capture.is_recording() {
            if self.playback.is_playing() {
                log::debug!("Auto-record trigger ignored during playback");
            } else {
                self.begin_capture(now);
            }
        }

        if self.config.auto_record && self.capture.is_recording() && kind.is_note() {
            self.silence.notify_activity(&mut self.timers, now);
        }

        if !kind.is_system() {
            self.capture.ingest(&mut self.timeline, event.clone(), &self.preroll);
            self.preroll.push(event);
        }
    }

    /// Live passthrough to the output. System messages go out unchanged (and
    /// in full, for sysex); channel messages go through the remapper.
    fn pass_through(&mut self, raw: &[u8], event: &TimestampedMidiEvent) {
        if self.playback.is_playing() && !self.config.passthrough_during_playback {
            return;
        }
        let Some(output) = self.output.as_mut() else {
            return;
        };

        let result = match event.kind() {
            MessageKind::System => output.send(raw),
            _ => output.send(remap(event.payload(), self.config.output_channel).as_bytes()),
        };
        if let Err(e) = result {
            log::warn!("Passthrough failed: {}", e);
        }
    }

    // --- Capture ---

    /// Manual record. Rejected while playing or in auto-record mode.
    pub fn start_recording(&mut self) -> bool {
        if self.playback.is_playing() {
            log::debug!("Record ignored: playback in progress");
            return false;
        }
        if self.config.auto_record {
            log::debug!("Record ignored: auto-record is on");
            self.status("Auto-record is on: play a note to start recording.");
            return false;
        }
        let now = self.clock.now_ms();
        self.begin_capture(now)
    }

    fn begin_capture(&mut self, now: f64) -> bool {
        if !self.capture.start(&mut self.timeline, now, self.input.is_some()) {
            return false;
        }
        self.current_name = None;
        self.playback.rewind(&self.timeline);
        self.notify(Notification::RecordingStarted);
        true
    }

    pub fn stop_recording(&mut self) -> Option<CaptureSummary> {
        let summary = self.capture.stop(&mut self.timeline)?;
        self.silence.reset(&mut self.timers);
        self.playback.rewind(&self.timeline);
        self.notify(Notification::RecordingStopped {
            duration_ms: summary.duration_ms,
            event_count: summary.event_count,
        });
        Some(summary)
    }

    pub fn toggle_recording(&mut self) {
        if self.capture.is_recording() {
            self.stop_recording();
        } else {
            self.start_recording();
        }
    }

    fn on_silence(&mut self) {
        if !self.capture.is_recording() {
            return;
        }
        log::info!("Silence detected after {:.0}ms", self.silence.quiet_ms());
        self.status("Silence detected, stopping auto-record.");
        self.stop_recording();
        self.auto_save();
    }

    fn auto_save(&mut self) {
        if !self.timeline.has_content() {
            log::debug!("Auto-save skipped: take has no notes");
            return;
        }
        let existing = self.store.list().unwrap_or_else(|e| {
            log::warn!("Could not list recordings before auto-save: {}", e);
            Vec::new()
        });
        // Takes ending within the same second would otherwise overwrite each other
        let name = unique_name(&auto_recording_name(Local::now()), &existing);
        match self.store.save(&name, &self.timeline) {
            Ok(()) => {
                self.status(format!("Recording auto-saved as \"{}\".", name));
                self.current_name = Some(name);
            }
            Err(e) => {
                log::error!("Auto-save failed: {}", e);
                self.status(format!("Error: Could not auto-save recording: {}", e));
            }
        }
    }

    pub fn set_auto_record(&mut self, enabled: bool) {
        if self.config.auto_record == enabled {
            return;
        }
        self.config.auto_record = enabled;
        if !enabled {
            self.silence.reset(&mut self.timers);
        }
        log::info!("Auto-record {}", if enabled { "enabled" } else { "disabled" });
        self.status(format!("Auto-record {}.", if enabled { "on" } else { "off" }));
    }

    // --- Playback ---

    pub fn play(&mut self) -> bool {
        if self.capture.is_recording() {
            log::debug!("Play ignored: recording in progress");
            return false;
        }
        if self.playback.is_playing() {
            return false;
        }
        if !self.timeline.has_content() {
            log::debug!("Play ignored: nothing to play");
            return false;
        }
        if self.output.is_none() {
            self.status("Error: No output device selected for playback.");
            return false;
        }

        let now = self.clock.now_ms();
        let mut ctx = playback_ctx(
            &self.timeline,
            &mut self.timers,
            &mut self.output,
            self.config.output_channel,
            now,
        );
        let Some(report) = self.playback.play(&mut ctx) else {
            return false;
        };

        self.notify(Notification::PlaybackStarted {
            name: self.current_name.clone(),
        });
        self.publish(report);
        true
    }

    pub fn stop_playback(&mut self) -> bool {
        let stopped = self
            .playback
            .stop(&mut self.timers, self.output.as_mut().map(|o| o as &mut dyn OutputSink));
        if stopped {
            self.announce_stopped();
        }
        stopped
    }

    /// Pausing forgets the position, exactly like stop
    pub fn pause(&mut self) -> bool {
        let paused = self
            .playback
            .pause(&mut self.timers, self.output.as_mut().map(|o| o as &mut dyn OutputSink));
        if paused {
            self.announce_stopped();
        }
        paused
    }

    pub fn seek(&mut self, percent: f64) {
        if self.capture.is_recording() {
            return;
        }
        let now = self.clock.now_ms();
        let mut ctx = playback_ctx(
            &self.timeline,
            &mut self.timers,
            &mut self.output,
            self.config.output_channel,
            now,
        );
        if let Some(report) = self.playback.seek(percent, &mut ctx) {
            self.publish(report);
        }
    }

    fn announce_stopped(&mut self) {
        self.notify(Notification::PlaybackStopped);
        self.notify(Notification::Progress {
            position_ms: 0.0,
            total_ms: self.timeline.duration_ms(),
        });
    }

    fn publish(&mut self, report: PlaybackReport) {
        for _ in 0..report.note_ons {
            self.notify(Notification::ActivityPulse);
        }
        if let Some(progress) = report.progress {
            self.notify(Notification::Progress {
                position_ms: progress.position_ms,
                total_ms: progress.total_ms,
            });
        }
        if report.finished {
            self.notify(Notification::PlaybackStopped);
        }
    }

    pub fn set_output_channel(&mut self, channel: OutputChannel) {
        self.config.output_channel = channel;
        log::info!("Output channel set to {}", channel);
    }

    // --- Timers ---

    /// Fire every timer whose deadline has passed. Returns how many fired.
    pub fn run_due_timers(&mut self) -> usize {
        let mut fired_count = 0;
        while let Some(fired) = self.timers.pop_due(self.clock.now_ms()) {
            fired_count += 1;
            match fired.kind {
                TimerKind::SilenceTimeout => {
                    if self.silence.on_timer(&fired) {
                        self.on_silence();
                    }
                }
                TimerKind::PlaybackChunk { .. } | TimerKind::PlaybackProgress => {
                    let now = self.clock.now_ms();
                    let mut ctx = playback_ctx(
                        &self.timeline,
                        &mut self.timers,
                        &mut self.output,
                        self.config.output_channel,
                        now,
                    );
                    if let Some(report) = self.playback.on_timer(&fired, &mut ctx) {
                        self.publish(report);
                    }
                }
            }
        }
        fired_count
    }

    // --- Devices ---

    /// Select (or clear) the input port. Losing the input ends any take.
    pub fn select_input(&mut self, port_id: Option<String>) {
        if port_id.is_none() && self.capture.is_recording() {
            log::warn!("Input removed while recording");
            self.stop_recording();
        }
        match &port_id {
            Some(id) => self.status(format!("Listening to {}...", id)),
            None => self.status("No input device selected."),
        }
        self.input = port_id;
    }

    /// Replace (or remove) the output. Playback stops first since it was
    /// started against the previous sink.
    pub fn set_output(&mut self, output: Option<O>) {
        if self.playback.is_playing() {
            self.stop_playback();
        }
        self.output = output;
    }

    // --- Library ---

    pub fn save_as(&mut self, name: &str) -> bool {
        let name = name.trim();
        if self.capture.is_recording() {
            log::debug!("Save ignored: recording in progress");
            return false;
        }
        if !self.timeline.has_content() {
            self.status("Nothing to save.");
            return false;
        }
        if name.is_empty() {
            return false;
        }

        match self.store.save(name, &self.timeline) {
            Ok(()) => {
                self.current_name = Some(name.to_string());
                self.status(format!("Recording saved as \"{}\".", name));
                true
            }
            Err(e) => {
                log::error!("Failed to save recording '{}': {}", name, e);
                self.status(format!("Error: Could not save recording: {}", e));
                false
            }
        }
    }

    pub fn load(&mut self, name: &str) -> bool {
        if self.capture.is_recording() {
            log::debug!("Load ignored: recording in progress");
            return false;
        }
        match self.store.load(name) {
            Ok(Some(timeline)) => {
                self.replace_timeline(timeline, Some(name.to_string()));
                self.status(format!("Loaded recording: \"{}\".", name));
                true
            }
            Ok(None) => {
                self.status(format!("No recording named \"{}\".", name));
                false
            }
            Err(e) => {
                log::error!("Failed to load recording '{}': {}", name, e);
                self.status(format!("Error: Could not load recording: {}", e));
                false
            }
        }
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name == old_name {
            return false;
        }

        match self.store.rename(old_name, new_name) {
            Ok(()) => {
                if self.current_name.as_deref() == Some(old_name) {
                    self.current_name = Some(new_name.to_string());
                }
                self.status(format!("Renamed \"{}\" to \"{}\".", old_name, new_name));
                true
            }
            Err(StoreError::NameConflict(taken)) => {
                self.status(format!("Error: A recording named \"{}\" already exists.", taken));
                false
            }
            Err(StoreError::NotFound(_)) => {
                self.status("No recording selected to rename.");
                false
            }
            Err(e) => {
                log::error!("Failed to rename '{}': {}", old_name, e);
                self.status(format!("Error: Could not rename recording: {}", e));
                false
            }
        }
    }

    pub fn delete(&mut self, name: &str) -> bool {
        match self.store.delete(name) {
            Ok(true) => {
                self.status(format!("Deleted recording: \"{}\".", name));
                if self.current_name.as_deref() == Some(name) && !self.capture.is_recording() {
                    self.replace_timeline(Timeline::new(), None);
                }
                true
            }
            Ok(false) => {
                self.status(format!("No recording named \"{}\".", name));
                false
            }
            Err(e) => {
                log::error!("Failed to delete '{}': {}", name, e);
                self.status(format!("Error: Could not delete recording: {}", e));
                false
            }
        }
    }

    pub fn list(&mut self) -> Vec<RecordingSummary> {
        match self.store.list() {
            Ok(list) => list,
            Err(e) => {
                log::error!("Failed to list recordings: {}", e);
                self.status(format!("Error: Could not read the recording library: {}", e));
                Vec::new()
            }
        }
    }

    // --- Interchange ---

    pub fn export_to(&mut self, path: &Path) -> bool {
        if self.capture.is_recording() || !self.timeline.has_content() {
            self.status("No recording to export.");
            return false;
        }
        match encoding::export_to_file(&self.timeline, path) {
            Ok(()) => {
                self.status(format!("Exported as {}", display_file_name(path)));
                true
            }
            Err(e) => {
                log::error!("Failed to export MIDI to {}: {}", path.display(), e);
                self.status("Error: Failed to export MIDI file.");
                false
            }
        }
    }

    pub fn import_from(&mut self, path: &Path) -> bool {
        if self.capture.is_recording() {
            log::debug!("Import ignored: recording in progress");
            return false;
        }
        match encoding::import_from_file(path) {
            Ok(timeline) => {
                let file_name = display_file_name(path);
                self.replace_timeline(timeline, Some(name_from_file_name(&file_name)));
                self.status(format!("Imported: {}", file_name));
                true
            }
            Err(CodecError::NoTracks) => {
                self.status("Error: MIDI file has no tracks.");
                false
            }
            Err(e) => {
                log::error!("Failed to import MIDI from {}: {}", path.display(), e);
                self.status("Error: Could not parse MIDI file.");
                false
            }
        }
    }

    /// Swap the buffer: stop playback, rewind the cursor, adopt the new name
    fn replace_timeline(&mut self, timeline: Timeline, name: Option<String>) {
        self.stop_playback();
        self.timeline = timeline;
        self.current_name = name;
        self.playback.rewind(&self.timeline);
        self.notify(Notification::Progress {
            position_ms: 0.0,
            total_ms: self.timeline.duration_ms(),
        });
    }

    // --- Notifications ---

    fn status(&self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.notify(Notification::Status(text));
    }

    fn notify(&self, notification: Notification) {
        // A dropped receiver just means nobody is listening
        let _ = self.notifier.send(notification);
    }
}

fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

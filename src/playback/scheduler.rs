// Real-time playback of a finished timeline
//
// Dispatch runs as a self-rescheduling chunk loop rather than one timer per
// event: each pass walks forward from an index, sends everything that is due
// (or due within the threshold), and parks a single continuation on the first
// event that is still too far away. Every pass recomputes lateness against the
// clock, so late or coalesced timers never accumulate drift.

use crate::devices::OutputSink;
use crate::recording::Timeline;
use crate::timers::{FiredTimer, TimerKind, TimerQueue, TimerToken};

use super::remap::{remap, OutputChannel};

/// Events due within this many milliseconds are sent immediately
pub const DEFAULT_CHUNK_THRESHOLD_MS: f64 = 20.0;

/// Interval of the position-reporting tick
pub const DEFAULT_PROGRESS_INTERVAL_MS: f64 = 100.0;

/// Control change number for "All Notes Off"
const ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
}

/// Where playback is, relative to the timeline
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackCursor {
    /// Timeline offset playback (re)started from
    pub elapsed_before_seek_ms: f64,
    /// Clock reading when playback (re)started
    pub wall_clock_start_ms: f64,
    pub total_duration_ms: f64,
}

impl PlaybackCursor {
    /// Timeline position at `now_ms`, not clamped
    pub fn elapsed(&self, now_ms: f64) -> f64 {
        self.elapsed_before_seek_ms + (now_ms - self.wall_clock_start_ms)
    }

    /// Timeline position at `now_ms`, clamped to `[0, total]`
    pub fn position(&self, now_ms: f64) -> f64 {
        self.elapsed(now_ms).clamp(0.0, self.total_duration_ms.max(0.0))
    }
}

/// What the chunk loop should do with the next event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkStep {
    /// Behind the seek point: already played, never send
    Skip,
    /// Due now (or within the threshold)
    Dispatch,
    /// Too early: come back after this many milliseconds
    Wait { delay_ms: f64 },
}

/// Decide the fate of an event at `event_ms` given the cursor and the clock.
pub fn chunk_step(cursor: &PlaybackCursor, now_ms: f64, event_ms: f64, threshold_ms: f64) -> ChunkStep {
    if event_ms < cursor.elapsed_before_seek_ms {
        return ChunkStep::Skip;
    }
    let delay_ms = event_ms - cursor.elapsed(now_ms);
    if delay_ms > threshold_ms {
        ChunkStep::Wait { delay_ms }
    } else {
        ChunkStep::Dispatch
    }
}

/// Everything a scheduler call needs from the coordinator
pub struct PlaybackContext<'a> {
    pub timeline: &'a Timeline,
    pub timers: &'a mut TimerQueue,
    pub sink: Option<&'a mut dyn OutputSink>,
    pub channel: OutputChannel,
    pub now_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub position_ms: f64,
    pub total_ms: f64,
}

/// What a scheduler call did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    /// Messages sent to the output (excluding all-notes-off)
    pub dispatched: usize,
    /// How many of them were note-ons
    pub note_ons: usize,
    pub progress: Option<Progress>,
    /// Playback reached the end and stopped itself
    pub finished: bool,
}

struct PendingChunk {
    token: TimerToken,
    index: usize,
}

pub struct PlaybackScheduler {
    status: PlaybackStatus,
    cursor: PlaybackCursor,
    threshold_ms: f64,
    progress_interval_ms: f64,
    chunk: Option<PendingChunk>,
    progress: Option<TimerToken>,
}

impl PlaybackScheduler {
    pub fn new(threshold_ms: f64, progress_interval_ms: f64) -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            cursor: PlaybackCursor::default(),
            threshold_ms: threshold_ms.max(0.0),
            progress_interval_ms: progress_interval_ms.max(1.0),
            chunk: None,
            progress: None,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn seek_offset_ms(&self) -> f64 {
        self.cursor.elapsed_before_seek_ms
    }

    pub fn has_pending_chunk(&self) -> bool {
        self.chunk.is_some()
    }

    /// Current position: live while playing, the seek offset otherwise
    pub fn position(&self, now_ms: f64) -> f64 {
        if self.is_playing() {
            self.cursor.position(now_ms)
        } else {
            self.cursor
                .elapsed_before_seek_ms
                .clamp(0.0, self.cursor.total_duration_ms.max(0.0))
        }
    }

    /// Forget the seek offset and adopt a new timeline's length. Only valid
    /// while stopped; the coordinator calls this when the buffer is replaced.
    pub fn rewind(&mut self, timeline: &Timeline) {
        if self.is_playing() {
            return;
        }
        self.cursor = PlaybackCursor {
            total_duration_ms: timeline.duration_ms(),
            ..PlaybackCursor::default()
        };
    }

    /// Start playing from the current seek offset. Returns None when it is a
    /// no-op: already playing, empty timeline, or no output.
    pub fn play(&mut self, ctx: &mut PlaybackContext<'_>) -> Option<PlaybackReport> {
        if self.is_playing() {
            log::debug!("Play ignored: already playing");
            return None;
        }
        if ctx.timeline.is_empty() {
            log::debug!("Play ignored: timeline is empty");
            return None;
        }
        if ctx.sink.is_none() {
            log::debug!("Play ignored: no output selected");
            return None;
        }

        self.status = PlaybackStatus::Playing;
        self.cursor.wall_clock_start_ms = ctx.now_ms;
        self.cursor.total_duration_ms = ctx.timeline.duration_ms();
        self.progress = Some(
            ctx.timers
                .schedule_at(ctx.now_ms + self.progress_interval_ms, TimerKind::PlaybackProgress),
        );

        log::info!(
            "Playback started at {:.0}ms of {:.0}ms",
            self.cursor.elapsed_before_seek_ms,
            self.cursor.total_duration_ms
        );

        let mut report = self.run_chunk(0, ctx);
        report.progress = Some(self.progress_at(ctx.now_ms));
        Some(report)
    }

    /// Walk the timeline from `start`, sending whatever is due and parking a
    /// continuation on the first event that is not.
    fn run_chunk(&mut self, start: usize, ctx: &mut PlaybackContext<'_>) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        if !self.is_playing() {
            return report;
        }

        let timeline = ctx.timeline;
        for (index, event) in timeline.events().iter().enumerate().skip(start) {
            match chunk_step(&self.cursor, ctx.now_ms, event.timestamp_ms, self.threshold_ms) {
                ChunkStep::Skip => continue,
                ChunkStep::Wait { delay_ms } => {
                    let token = ctx
                        .timers
                        .schedule_at(ctx.now_ms + delay_ms, TimerKind::PlaybackChunk { index });
                    self.chunk = Some(PendingChunk { token, index });
                    return report;
                }
                ChunkStep::Dispatch => {
                    if event.is_system() {
                        continue;
                    }
                    let message = remap(event.payload(), ctx.channel);
                    if let Some(sink) = ctx.sink.as_deref_mut() {
                        if let Err(e) = sink.send(message.as_bytes()) {
                            log::warn!("Playback send failed: {}", e);
                        }
                    }
                    report.dispatched += 1;
                    if event.is_note_on() {
                        report.note_ons += 1;
                    }
                }
            }
        }

        log::debug!("Playback chunk loop reached end of timeline");
        report
    }

    /// Handle a fired timer. Returns None if the timer is not ours (stale or
    /// belonging to another component).
    pub fn on_timer(&mut self, fired: &FiredTimer, ctx: &mut PlaybackContext<'_>) -> Option<PlaybackReport> {
        match fired.kind {
            TimerKind::PlaybackChunk { .. } => {
                if !self.chunk.as_ref().is_some_and(|c| c.token.matches(fired)) {
                    return None;
                }
                let pending = self.chunk.take()?;
                Some(self.run_chunk(pending.index, ctx))
            }
            TimerKind::PlaybackProgress => {
                if !self.progress.as_ref().is_some_and(|t| t.matches(fired)) {
                    return None;
                }
                self.progress = None;
                Some(self.on_progress(fired, ctx))
            }
            TimerKind::SilenceTimeout => None,
        }
    }

    fn on_progress(&mut self, fired: &FiredTimer, ctx: &mut PlaybackContext<'_>) -> PlaybackReport {
        let position_ms = self.cursor.position(ctx.now_ms);

        if position_ms >= self.cursor.total_duration_ms {
            // Flush whatever the chunk loop still holds; all of it is due by now
            let mut report = match self.chunk.take() {
                Some(pending) => {
                    ctx.timers.cancel(pending.token);
                    self.run_chunk(pending.index, ctx)
                }
                None => PlaybackReport::default(),
            };
            self.halt(false, ctx.timers, ctx.sink.as_deref_mut());
            log::info!("Playback reached the end");
            report.finished = true;
            report.progress = Some(self.progress_at(ctx.now_ms));
            return report;
        }

        let mut next = fired.deadline_ms + self.progress_interval_ms;
        if next <= ctx.now_ms {
            next = ctx.now_ms + self.progress_interval_ms;
        }
        self.progress = Some(ctx.timers.schedule_at(next, TimerKind::PlaybackProgress));

        PlaybackReport {
            progress: Some(Progress {
                position_ms,
                total_ms: self.cursor.total_duration_ms,
            }),
            ..PlaybackReport::default()
        }
    }

    /// Stop playback and rewind to the start. Returns false if not playing.
    pub fn stop(&mut self, timers: &mut TimerQueue, sink: Option<&mut (dyn OutputSink + '_)>) -> bool {
        self.halt(false, timers, sink)
    }

    /// Same as [`stop`](Self::stop): playback always resumes from the seek
    /// point, never from where it was paused.
    pub fn pause(&mut self, timers: &mut TimerQueue, sink: Option<&mut (dyn OutputSink + '_)>) -> bool {
        self.halt(false, timers, sink)
    }

    /// Move to `percent` of the timeline. If playing, playback restarts from
    /// the new point without re-sending anything before it.
    pub fn seek(&mut self, percent: f64, ctx: &mut PlaybackContext<'_>) -> Option<PlaybackReport> {
        if ctx.timeline.is_empty() {
            return None;
        }
        let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };

        let was_playing = self.is_playing();
        if was_playing {
            self.halt(true, ctx.timers, ctx.sink.as_deref_mut());
        }

        self.cursor.total_duration_ms = ctx.timeline.duration_ms();
        self.cursor.elapsed_before_seek_ms = self.cursor.total_duration_ms * percent / 100.0;
        log::debug!("Seek to {:.1}% ({:.0}ms)", percent, self.cursor.elapsed_before_seek_ms);

        if was_playing {
            self.play(ctx)
        } else {
            Some(PlaybackReport {
                progress: Some(self.progress_at(ctx.now_ms)),
                ..PlaybackReport::default()
            })
        }
    }

    /// Leave the playing state: cancel timers and silence every channel.
    fn halt(&mut self, preserve_offset: bool, timers: &mut TimerQueue, sink: Option<&mut (dyn OutputSink + '_)>) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.status = PlaybackStatus::Stopped;

        if let Some(pending) = self.chunk.take() {
            timers.cancel(pending.token);
        }
        if let Some(token) = self.progress.take() {
            timers.cancel(token);
        }

        if let Some(sink) = sink {
            for channel in 0..16u8 {
                if let Err(e) = sink.send(&[0xB0 | channel, ALL_NOTES_OFF, 0]) {
                    log::warn!("All-notes-off failed on channel {}: {}", channel, e);
                }
            }
        }

        if !preserve_offset {
            self.cursor.elapsed_before_seek_ms = 0.0;
        }
        log::info!("Playback stopped");
        true
    }

    fn progress_at(&self, now_ms: f64) -> Progress {
        Progress {
            position_ms: self.position(now_ms),
            total_ms: self.cursor.total_duration_ms,
        }
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_THRESHOLD_MS, DEFAULT_PROGRESS_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::devices::MemorySink;
    use crate::recording::TimestampedMidiEvent;

    fn timeline(stamps: &[f64]) -> Timeline {
        let mut timeline = Timeline::new();
        for (i, ts) in stamps.iter().enumerate() {
            timeline.push(TimestampedMidiEvent::new(&[0x90, 60 + i as u8, 100], *ts).unwrap());
        }
        timeline
    }

    /// Drive the scheduler until `until_ms`, firing timers at their deadlines
    fn run_until(
        scheduler: &mut PlaybackScheduler,
        timeline: &Timeline,
        timers: &mut TimerQueue,
        sink: &mut MemorySink<ManualClock>,
        clock: &ManualClock,
        until_ms: f64,
    ) -> Vec<PlaybackReport> {
        let mut reports = Vec::new();
        while let Some(deadline) = timers.next_deadline() {
            if deadline > until_ms {
                break;
            }
            clock.set(deadline.max(clock.now_ms()));
            while let Some(fired) = timers.pop_due(clock.now_ms()) {
                let mut ctx = PlaybackContext {
                    timeline,
                    timers: &mut *timers,
                    sink: Some(&mut *sink),
                    channel: OutputChannel::Default,
                    now_ms: clock.now_ms(),
                };
                if let Some(report) = scheduler.on_timer(&fired, &mut ctx) {
                    reports.push(report);
                }
            }
        }
        clock.set(until_ms.max(clock.now_ms()));
        reports
    }

    #[test]
    fn test_chunk_step_decisions() {
        let cursor = PlaybackCursor {
            elapsed_before_seek_ms: 1000.0,
            wall_clock_start_ms: 5000.0,
            total_duration_ms: 2000.0,
        };
        assert_eq!(chunk_step(&cursor, 5000.0, 999.0, 20.0), ChunkStep::Skip);
        assert_eq!(chunk_step(&cursor, 5000.0, 1000.0, 20.0), ChunkStep::Dispatch);
        assert_eq!(chunk_step(&cursor, 5000.0, 1020.0, 20.0), ChunkStep::Dispatch);
        assert_eq!(chunk_step(&cursor, 5000.0, 1500.0, 20.0), ChunkStep::Wait { delay_ms: 500.0 });
        // A late clock shrinks the wait
        assert_eq!(chunk_step(&cursor, 5300.0, 1500.0, 20.0), ChunkStep::Wait { delay_ms: 200.0 });
    }

    #[test]
    fn test_cursor_position_is_clamped() {
        let cursor = PlaybackCursor {
            elapsed_before_seek_ms: 0.0,
            wall_clock_start_ms: 100.0,
            total_duration_ms: 1000.0,
        };
        assert_eq!(cursor.position(50.0), 0.0);
        assert_eq!(cursor.position(600.0), 500.0);
        assert_eq!(cursor.position(5000.0), 1000.0);
    }

    #[test]
    fn test_play_dispatches_on_time() {
        let clock = ManualClock::new(10_000.0);
        let mut sink = MemorySink::new(clock.clone());
        let mut timers = TimerQueue::new();
        let timeline = timeline(&[0.0, 500.0, 1000.0]);
        let mut scheduler = PlaybackScheduler::default();

        let mut ctx = PlaybackContext {
            timeline: &timeline,
            timers: &mut timers,
            sink: Some(&mut sink),
            channel: OutputChannel::Default,
            now_ms: clock.now_ms(),
        };
        let report = scheduler.play(&mut ctx).unwrap();
        assert_eq!(report.dispatched, 1);
        assert!(scheduler.has_pending_chunk());

        run_until(&mut scheduler, &timeline, &mut timers, &mut sink, &clock, 12_000.0);

        let notes: Vec<_> = sink.sent().into_iter().filter(|m| m.data[0] == 0x90).collect();
        assert_eq!(notes.len(), 3);
        for (sent, expected) in notes.iter().zip([10_000.0, 10_500.0, 11_000.0]) {
            assert!((sent.at_ms - expected).abs() <= DEFAULT_CHUNK_THRESHOLD_MS);
        }
        assert!(!scheduler.is_playing());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_stop_sends_all_notes_off_on_every_channel() {
        let clock = ManualClock::new(0.0);
        let mut sink = MemorySink::new(clock.clone());
        let mut timers = TimerQueue::new();
        let timeline = timeline(&[0.0, 5000.0]);
        let mut scheduler = PlaybackScheduler::default();

        let mut ctx = PlaybackContext {
            timeline: &timeline,
            timers: &mut timers,
            sink: Some(&mut sink),
            channel: OutputChannel::Default,
            now_ms: 0.0,
        };
        scheduler.play(&mut ctx).unwrap();
        sink.take();

        assert!(scheduler.stop(&mut timers, Some(&mut sink)));
        let sent = sink.take();
        assert_eq!(sent.len(), 16);
        for (channel, message) in sent.iter().enumerate() {
            assert_eq!(message.data, vec![0xB0 | channel as u8, 123, 0]);
        }
        assert!(timers.is_empty());

        // Stopping again is a no-op
        assert!(!scheduler.stop(&mut timers, Some(&mut sink)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_play_without_output_is_noop() {
        let mut timers = TimerQueue::new();
        let timeline = timeline(&[0.0]);
        let mut scheduler = PlaybackScheduler::default();
        let mut ctx = PlaybackContext {
            timeline: &timeline,
            timers: &mut timers,
            sink: None,
            channel: OutputChannel::Default,
            now_ms: 0.0,
        };
        assert!(scheduler.play(&mut ctx).is_none());
        assert!(!scheduler.is_playing());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_seek_while_stopped_sets_offset() {
        let mut timers = TimerQueue::new();
        let timeline = timeline(&[0.0, 2000.0]);
        let mut scheduler = PlaybackScheduler::default();
        let mut ctx = PlaybackContext {
            timeline: &timeline,
            timers: &mut timers,
            sink: None,
            channel: OutputChannel::Default,
            now_ms: 0.0,
        };
        let report = scheduler.seek(25.0, &mut ctx).unwrap();
        assert_eq!(scheduler.seek_offset_ms(), 500.0);
        assert_eq!(report.progress.unwrap().position_ms, 500.0);
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_single_event_timeline_stops_on_first_tick() {
        let clock = ManualClock::new(0.0);
        let mut sink = MemorySink::new(clock.clone());
        let mut timers = TimerQueue::new();
        let timeline = timeline(&[0.0]);
        let mut scheduler = PlaybackScheduler::default();

        let mut ctx = PlaybackContext {
            timeline: &timeline,
            timers: &mut timers,
            sink: Some(&mut sink),
            channel: OutputChannel::Default,
            now_ms: 0.0,
        };
        scheduler.play(&mut ctx).unwrap();
        let reports = run_until(&mut scheduler, &timeline, &mut timers, &mut sink, &clock, 1000.0);

        assert!(reports.iter().any(|r| r.finished));
        assert!(!scheduler.is_playing());
    }
}

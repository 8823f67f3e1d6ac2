// Timeline <-> Standard MIDI File conversion using midly

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::CodecError;
use crate::recording::{MessageKind, Timeline, TimestampedMidiEvent};

/// Resolution written on export
pub const EXPORT_TICKS_PER_BEAT: u16 = 480;

/// Tempo written on export (120 BPM)
pub const EXPORT_TEMPO_US: u32 = 500_000;

// Delta times are 28-bit variable-length quantities
const MAX_DELTA_TICKS: u64 = 0x0FFF_FFFF;

#[derive(Debug, Clone, Copy)]
struct TempoEvent {
    tick: u64,
    microseconds_per_beat: u32,
}

/// Convert a tick position to milliseconds using the tempo map
fn tick_to_ms(tick: u64, ticks_per_beat: u16, tempo_map: &[TempoEvent]) -> f64 {
    let tpb = ticks_per_beat.max(1) as f64;
    let mut ms = 0.0;
    let mut last_tick = 0u64;
    let mut usec_per_beat = EXPORT_TEMPO_US as f64;

    for te in tempo_map {
        if te.tick >= tick {
            break;
        }
        let delta_ticks = te.tick - last_tick;
        ms += (delta_ticks as f64 / tpb) * (usec_per_beat / 1_000.0);
        last_tick = te.tick;
        usec_per_beat = te.microseconds_per_beat as f64;
    }

    let delta_ticks = tick - last_tick;
    ms += (delta_ticks as f64 / tpb) * (usec_per_beat / 1_000.0);
    ms
}

fn ms_to_ticks(ms: f64) -> u64 {
    let ticks_per_ms = EXPORT_TICKS_PER_BEAT as f64 / (EXPORT_TEMPO_US as f64 / 1_000.0);
    (ms.max(0.0) * ticks_per_ms).round() as u64
}

/// Encode a timeline as a format-0 file. Only notes and controller changes
/// are written; everything else is dropped.
pub fn export_smf(timeline: &Timeline) -> Result<Vec<u8>, CodecError> {
    let mut track: Vec<TrackEvent<'static>> = vec![TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(EXPORT_TEMPO_US.into())),
    }];

    let mut last_tick = 0u64;
    for event in timeline.events() {
        let (channel, message) = match event.kind() {
            MessageKind::NoteOn { channel, key, velocity } => {
                (channel, MidiMessage::NoteOn { key: key.into(), vel: velocity.into() })
            }
            MessageKind::NoteOff { channel, key, velocity } => {
                (channel, MidiMessage::NoteOff { key: key.into(), vel: velocity.into() })
            }
            MessageKind::ControlChange { channel, controller, value } => {
                (channel, MidiMessage::Controller { controller: controller.into(), value: value.into() })
            }
            _ => continue,
        };

        let tick = ms_to_ticks(event.timestamp_ms).max(last_tick);
        let delta = (tick - last_tick).min(MAX_DELTA_TICKS) as u32;
        last_tick = tick;

        track.push(TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi { channel: channel.into(), message },
        });
    }

    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(EXPORT_TICKS_PER_BEAT.into())),
        tracks: vec![track],
    };

    let mut buffer = Vec::new();
    smf.write_std(&mut buffer)?;
    Ok(buffer)
}

/// Decode a Standard MIDI File into a normalized timeline of note events.
///
/// Notes are paired per (channel, key) in arrival order and re-emitted as
/// `[0x90|ch, key, vel]` / `[0x80|ch, key, 0]`. A note left open at the end of
/// its track is closed at the track's last tick.
pub fn import_smf(data: &[u8]) -> Result<Timeline, CodecError> {
    let smf = Smf::parse(data)?;
    if smf.tracks.is_empty() {
        return Err(CodecError::NoTracks);
    }

    // (channel, key, velocity, start_tick, end_tick)
    let mut notes: Vec<(u8, u8, u8, u64, u64)> = Vec::new();
    let mut tempo_map: Vec<TempoEvent> = Vec::new();

    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        let mut open: HashMap<(u8, u8), VecDeque<(u8, u64)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => tempo_map.push(TempoEvent {
                    tick: current_tick,
                    microseconds_per_beat: t.as_int(),
                }),
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry((ch, key.as_int()))
                                .or_default()
                                .push_back((vel.as_int(), current_tick));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let key = key.as_int();
                            if let Some((vel, start)) = open.get_mut(&(ch, key)).and_then(|q| q.pop_front()) {
                                notes.push((ch, key, vel, start, current_tick));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        for ((ch, key), queue) in open {
            for (vel, start) in queue {
                notes.push((ch, key, vel, start, current_tick));
            }
        }
    }

    notes.sort_by_key(|n| n.3);
    tempo_map.sort_by_key(|t| t.tick);

    let to_ms: Box<dyn Fn(u64) -> f64> = match smf.header.timing {
        Timing::Metrical(tpb) => {
            let tpb = tpb.as_int();
            Box::new(move |tick| tick_to_ms(tick, tpb, &tempo_map))
        }
        Timing::Timecode(fps, ticks_per_frame) => {
            let ticks_per_second = fps.as_f32() as f64 * ticks_per_frame.max(1) as f64;
            Box::new(move |tick| tick as f64 * 1_000.0 / ticks_per_second)
        }
    };

    let mut events = Vec::with_capacity(notes.len() * 2);
    for (ch, key, vel, start, end) in notes {
        let on = TimestampedMidiEvent::new(&[0x90 | ch, key, vel], to_ms(start));
        let off = TimestampedMidiEvent::new(&[0x80 | ch, key, 0], to_ms(end));
        events.extend(on);
        events.extend(off);
    }

    let mut timeline = Timeline::from_unsorted(events);
    timeline.normalize();

    log::debug!(
        "Imported MIDI file: {} tracks, {} events, {:.0} ms",
        smf.tracks.len(),
        timeline.len(),
        timeline.duration_ms()
    );
    Ok(timeline)
}

pub fn export_to_file(timeline: &Timeline, path: &Path) -> Result<(), CodecError> {
    let bytes = export_smf(timeline)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn import_from_file(path: &Path) -> Result<Timeline, CodecError> {
    let data = std::fs::read(path)?;
    import_smf(&data)
}

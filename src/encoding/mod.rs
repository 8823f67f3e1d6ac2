// Standard MIDI File interchange

pub mod midi_file;

pub use midi_file::{export_smf, export_to_file, import_from_file, import_smf, EXPORT_TEMPO_US, EXPORT_TICKS_PER_BEAT};

// MIDI port enumeration and connection using midir

use crossbeam_channel::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput};

use super::{MidiPortInfo, MidirOutput};
use crate::error::DeviceError;

/// Enumerate all available MIDI input ports
pub fn enumerate_midi_inputs() -> Vec<MidiPortInfo> {
    let mut devices = Vec::new();

    match MidiInput::new("encore-probe") {
        Ok(midi_in) => {
            for (index, port) in midi_in.ports().iter().enumerate() {
                if let Ok(name) = midi_in.port_name(port) {
                    devices.push(MidiPortInfo {
                        id: name.clone(),
                        name,
                        port_index: index,
                    });
                }
            }
        }
        Err(e) => log::warn!("Failed to probe MIDI inputs: {}", e),
    }

    devices
}

/// Enumerate all available MIDI output ports
pub fn enumerate_midi_outputs() -> Vec<MidiPortInfo> {
    let mut devices = Vec::new();

    match MidiOutput::new("encore-probe") {
        Ok(midi_out) => {
            for (index, port) in midi_out.ports().iter().enumerate() {
                if let Ok(name) = midi_out.port_name(port) {
                    devices.push(MidiPortInfo {
                        id: name.clone(),
                        name,
                        port_index: index,
                    });
                }
            }
        }
        Err(e) => log::warn!("Failed to probe MIDI outputs: {}", e),
    }

    devices
}

/// Connect to an input port by id. Every message received is forwarded to
/// `sink` as raw bytes; the connection stays open until the handle is dropped.
pub fn connect_input<T, F>(
    port_id: &str,
    sink: Sender<T>,
    wrap: F,
) -> Result<MidiInputConnection<()>, DeviceError>
where
    T: Send + 'static,
    F: Fn(Vec<u8>) -> T + Send + 'static,
{
    let mut midi_in = MidiInput::new("encore-input").map_err(|e| DeviceError::Init(e.to_string()))?;
    midi_in.ignore(Ignore::None);

    let ports = midi_in.ports();
    let port = ports
        .iter()
        .find(|p| midi_in.port_name(p).map(|n| n == port_id).unwrap_or(false))
        .ok_or_else(|| DeviceError::PortNotFound(port_id.to_string()))?
        .clone();

    let connection = midi_in
        .connect(
            &port,
            "encore-in",
            move |_timestamp_us, message, _| {
                // A closed receiver means the engine is shutting down
                let _ = sink.send(wrap(message.to_vec()));
            },
            (),
        )
        .map_err(|e| DeviceError::Connect(format!("{}: {}", port_id, e)))?;

    log::info!("Connected to MIDI input: {}", port_id);
    Ok(connection)
}

/// Connect to an output port by id
pub fn connect_output(port_id: &str) -> Result<MidirOutput, DeviceError> {
    let midi_out = MidiOutput::new("encore-output").map_err(|e| DeviceError::Init(e.to_string()))?;

    let ports = midi_out.ports();
    let port = ports
        .iter()
        .find(|p| midi_out.port_name(p).map(|n| n == port_id).unwrap_or(false))
        .ok_or_else(|| DeviceError::PortNotFound(port_id.to_string()))?
        .clone();

    let connection = midi_out
        .connect(&port, "encore-out")
        .map_err(|e| DeviceError::Connect(format!("{}: {}", port_id, e)))?;

    log::info!("Connected to MIDI output: {}", port_id);
    Ok(MidirOutput::new(port_id.to_string(), connection))
}

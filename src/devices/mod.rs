// Device discovery, selection and output sinks

pub mod enumeration;
pub mod output;

pub use enumeration::*;
pub use output::{MemorySink, MidirOutput, OutputSink, SentMessage};

use serde::{Deserialize, Serialize};

/// Represents a MIDI input or output port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiPortInfo {
    /// Stable identifier (the port name, which survives re-enumeration)
    pub id: String,
    pub name: String,
    pub port_index: usize,
}

/// Manages MIDI port discovery
#[derive(Debug, Default)]
pub struct DeviceManager {
    /// Cached MIDI inputs
    pub inputs: Vec<MidiPortInfo>,
    /// Cached MIDI outputs
    pub outputs: Vec<MidiPortInfo>,
}

impl DeviceManager {
    pub fn new() -> Self {
        let mut manager = Self::default();
        manager.refresh();
        manager
    }

    /// Re-enumerate all ports. Returns true if either list changed.
    pub fn refresh(&mut self) -> bool {
        let inputs = enumeration::enumerate_midi_inputs();
        let outputs = enumeration::enumerate_midi_outputs();
        self.apply(inputs, outputs)
    }

    /// Replace the cached lists, reporting whether anything changed
    pub fn apply(&mut self, inputs: Vec<MidiPortInfo>, outputs: Vec<MidiPortInfo>) -> bool {
        let changed = inputs != self.inputs || outputs != self.outputs;
        if changed {
            log::info!(
                "MIDI ports changed: {} inputs, {} outputs",
                inputs.len(),
                outputs.len()
            );
        }
        self.inputs = inputs;
        self.outputs = outputs;
        changed
    }
}

/// Keep `current` if that port still exists, otherwise fall back to the first
/// available port (or nothing when there are none).
pub fn resolve_selection(current: Option<&str>, ports: &[MidiPortInfo]) -> Option<String> {
    current
        .filter(|id| ports.iter().any(|p| p.id == *id))
        .map(str::to_string)
        .or_else(|| ports.first().map(|p| p.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, index: usize) -> MidiPortInfo {
        MidiPortInfo {
            id: name.to_string(),
            name: name.to_string(),
            port_index: index,
        }
    }

    #[test]
    fn test_resolve_keeps_existing_selection() {
        let ports = vec![port("Keys", 0), port("Pads", 1)];
        assert_eq!(resolve_selection(Some("Pads"), &ports), Some("Pads".to_string()));
    }

    #[test]
    fn test_resolve_drops_unplugged_selection() {
        let ports = vec![port("Keys", 0)];
        assert_eq!(resolve_selection(Some("Pads"), &ports), Some("Keys".to_string()));
        assert_eq!(resolve_selection(None, &ports), Some("Keys".to_string()));
        assert_eq!(resolve_selection(Some("Pads"), &[]), None);
    }

    #[test]
    fn test_apply_reports_changes() {
        let mut manager = DeviceManager::default();
        assert!(manager.apply(vec![port("Keys", 0)], vec![]));
        assert!(!manager.apply(vec![port("Keys", 0)], vec![]));
        assert!(manager.apply(vec![], vec![]));
        assert!(manager.inputs.is_empty());
    }
}

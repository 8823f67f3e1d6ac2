// Error types for the adapter seams (devices, library, MIDI files)

/// Error type for MIDI device operations
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("MIDI initialization failed: {0}")]
    Init(String),

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    Connect(String),
}

/// Error type for sending to a MIDI output
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}

/// Error type for the recording library
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A recording named \"{0}\" already exists")]
    NameConflict(String),

    #[error("No recording named \"{0}\"")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt recording data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for Standard MIDI File import/export
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Could not parse MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("MIDI file has no tracks")]
    NoTracks,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// MIDI output sinks

use std::sync::Arc;

use midir::MidiOutputConnection;
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::OutputError;

/// Anything that can transmit a 1-3 byte MIDI message immediately
pub trait OutputSink {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError>;
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        (**self).send(message)
    }
}

/// Output backed by a midir connection
pub struct MidirOutput {
    port_name: String,
    connection: MidiOutputConnection,
}

impl MidirOutput {
    pub fn new(port_name: String, connection: MidiOutputConnection) -> Self {
        Self { port_name, connection }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl OutputSink for MidirOutput {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        self.connection
            .send(message)
            .map_err(|e| OutputError::Send(format!("{}: {}", self.port_name, e)))
    }
}

/// A message captured by [`MemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub at_ms: f64,
    pub data: Vec<u8>,
}

/// Sink that records everything it is sent, stamped with a clock reading.
/// Clones share the same log.
#[derive(Clone)]
pub struct MemorySink<C: Clock> {
    clock: C,
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl<C: Clock> MemorySink<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn take(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl<C: Clock> OutputSink for MemorySink<C> {
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        self.sent.lock().push(SentMessage {
            at_ms: self.clock.now_ms(),
            data: message.to_vec(),
        });
        Ok(())
    }
}

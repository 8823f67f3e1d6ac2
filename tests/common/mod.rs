//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use crossbeam_channel::Receiver;
use encore_lib::clock::{Clock, ManualClock};
use encore_lib::config::Config;
use encore_lib::devices::MemorySink;
use encore_lib::engine::Engine;
use encore_lib::notifications::Notification;
use encore_lib::session::MemoryStore;

pub type TestEngine = Engine<ManualClock, MemorySink<ManualClock>>;

/// Engine wired to a manual clock, an in-memory output and an in-memory library
pub struct Harness {
    pub engine: TestEngine,
    pub clock: ManualClock,
    pub sink: MemorySink<ManualClock>,
    pub notifications: Receiver<Notification>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let clock = ManualClock::new(10_000.0);
        let sink = MemorySink::new(clock.clone());
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = Engine::new(clock.clone(), config, Box::new(MemoryStore::new()), tx);
        engine.select_input(Some("Test Keys".to_string()));
        engine.set_output(Some(sink.clone()));
        rx.try_iter().count();

        Self {
            engine,
            clock,
            sink,
            notifications: rx,
        }
    }

    pub fn auto() -> Self {
        Self::new(Config::default())
    }

    pub fn manual() -> Self {
        Self::new(Config {
            auto_record: false,
            ..Config::default()
        })
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Move the clock forward by `ms`, firing every timer at its own deadline
    pub fn advance(&mut self, ms: f64) {
        let target = self.clock.now_ms() + ms;
        while let Some(deadline) = self.engine.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.set(deadline.max(self.clock.now_ms()));
            self.engine.run_due_timers();
        }
        self.clock.set(target);
        self.engine.run_due_timers();
    }

    /// Deliver a device message at the current clock reading
    pub fn send(&mut self, data: &[u8]) {
        self.engine.on_device_message(data);
    }

    /// Record a simple take in manual mode: notes at the given offsets
    pub fn record_notes(&mut self, offsets_ms: &[f64]) {
        assert!(self.engine.start_recording());
        let mut last = 0.0;
        for (i, offset) in offsets_ms.iter().enumerate() {
            self.advance(offset - last);
            last = *offset;
            self.send(&[0x90, 60 + i as u8, 100]);
        }
        self.engine.stop_recording().expect("recording was running");
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.notifications.try_iter().collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

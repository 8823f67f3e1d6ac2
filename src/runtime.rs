// Engine thread: serializes device input, user commands and timer expiries

use std::path::PathBuf;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::clock::SystemClock;
use crate::devices::OutputSink;
use crate::engine::Engine;
use crate::playback::OutputChannel;
use crate::session::RecordingSummary;

/// Everything that can be asked of the engine thread
pub enum Command<O> {
    /// Raw message from the selected input
    Midi(Vec<u8>),
    Record,
    StopRecording,
    ToggleRecording,
    Play,
    Stop,
    Pause,
    Seek(f64),
    SetAutoRecord(bool),
    SetOutputChannel(OutputChannel),
    SelectInput(Option<String>),
    SetOutput(Option<O>),
    Save(String),
    Load(String),
    Rename { from: String, to: String },
    Delete(String),
    List(Sender<Vec<RecordingSummary>>),
    Export(PathBuf),
    Import(PathBuf),
    Shutdown,
}

/// Handle to a running engine thread
pub struct EngineHandle<O> {
    commands: Sender<Command<O>>,
    thread: Option<JoinHandle<()>>,
}

impl<O> EngineHandle<O> {
    pub fn sender(&self) -> Sender<Command<O>> {
        self.commands.clone()
    }

    /// Queue a command. Returns false once the engine thread has exited.
    pub fn send(&self, command: Command<O>) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Ask the engine to finish and wait for it
    pub fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Engine thread panicked");
            }
        }
    }
}

/// Move the engine onto its own thread. `clock` must be the clock the engine
/// was built with so timer deadlines map back onto real instants.
pub fn spawn<O>(engine: Engine<SystemClock, O>, clock: SystemClock) -> std::io::Result<EngineHandle<O>>
where
    O: OutputSink + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let thread = std::thread::Builder::new()
        .name("encore-engine".to_string())
        .spawn(move || run_loop(engine, clock, rx))?;

    Ok(EngineHandle {
        commands: tx,
        thread: Some(thread),
    })
}

fn run_loop<O: OutputSink>(mut engine: Engine<SystemClock, O>, clock: SystemClock, rx: Receiver<Command<O>>) {
    log::debug!("Engine thread started");

    loop {
        let received = match engine.next_deadline() {
            Some(deadline) => match rx.recv_deadline(clock.instant_at(deadline)) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        if let Some(command) = received {
            if !apply(&mut engine, command) {
                break;
            }
        }
        engine.run_due_timers();
    }

    // Leave the output quiet and keep whatever was being captured
    engine.stop_playback();
    engine.stop_recording();
    log::debug!("Engine thread finished");
}

/// Apply one command. Returns false when the loop should exit.
pub fn apply<C, O>(engine: &mut Engine<C, O>, command: Command<O>) -> bool
where
    C: crate::clock::Clock,
    O: OutputSink,
{
    match command {
        Command::Midi(data) => engine.on_device_message(&data),
        Command::Record => {
            engine.start_recording();
        }
        Command::StopRecording => {
            engine.stop_recording();
        }
        Command::ToggleRecording => engine.toggle_recording(),
        Command::Play => {
            engine.play();
        }
        Command::Stop => {
            engine.stop_playback();
        }
        Command::Pause => {
            engine.pause();
        }
        Command::Seek(percent) => engine.seek(percent),
        Command::SetAutoRecord(enabled) => engine.set_auto_record(enabled),
        Command::SetOutputChannel(channel) => engine.set_output_channel(channel),
        Command::SelectInput(port) => engine.select_input(port),
        Command::SetOutput(output) => engine.set_output(output),
        Command::Save(name) => {
            engine.save_as(&name);
        }
        Command::Load(name) => {
            engine.load(&name);
        }
        Command::Rename { from, to } => {
            engine.rename(&from, &to);
        }
        Command::Delete(name) => {
            engine.delete(&name);
        }
        Command::List(reply) => {
            let _ = reply.send(engine.list());
        }
        Command::Export(path) => {
            engine.export_to(&path);
        }
        Command::Import(path) => {
            engine.import_from(&path);
        }
        Command::Shutdown => return false,
    }
    true
}

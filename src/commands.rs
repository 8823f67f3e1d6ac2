// Command-line front end: one-shot library commands and the live monitor

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use midir::MidiInputConnection;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::devices::{self, DeviceManager, MidiPortInfo, MidirOutput};
use crate::encoding;
use crate::engine::Engine;
use crate::notifications::{format_duration, Notification};
use crate::playback::OutputChannel;
use crate::runtime::{self, Command, EngineHandle};
use crate::session::{export_file_name, name_from_file_name, RecordingStore, RecordingSummary, SqliteStore};

/// How often the monitor re-enumerates ports to notice hot-plugging
const HOTPLUG_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Open the library at the configured path, falling back to an in-memory one
pub fn open_store(path: &Path) -> Box<dyn RecordingStore + Send> {
    match SqliteStore::open(path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            log::error!("Failed to open recording library {}: {}", path.display(), e);
            match SqliteStore::open_in_memory() {
                Ok(store) => Box::new(store),
                Err(e) => {
                    log::error!("Failed to open in-memory library: {}", e);
                    Box::new(crate::session::MemoryStore::new())
                }
            }
        }
    }
}

// ============================================================================
// Library Commands
// ============================================================================

pub fn list_devices() {
    let manager = DeviceManager::new();
    print_ports("Inputs", &manager.inputs);
    print_ports("Outputs", &manager.outputs);
}

fn print_ports(title: &str, ports: &[MidiPortInfo]) {
    println!("{}:", title);
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        println!("  [{}] {}", port.port_index, port.name);
    }
}

pub fn list_recordings(store: &dyn RecordingStore) -> Result<()> {
    let recordings = store.list().context("Failed to read the recording library")?;
    if recordings.is_empty() {
        println!("No saved recordings.");
    }
    for summary in &recordings {
        println!("{}", format_summary(summary));
    }
    Ok(())
}

/// One line per library entry: name, length, event count and creation time
pub fn format_summary(summary: &RecordingSummary) -> String {
    let mut line = format!(
        "{}  {}  {} events  {}",
        summary.name,
        format_duration(summary.duration_ms / 1000.0),
        summary.event_count,
        summary.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    if !summary.has_content {
        line.push_str("  (no notes)");
    }
    line
}

pub fn rename_recording(store: &dyn RecordingStore, from: &str, to: &str) -> Result<()> {
    store.rename(from, to)?;
    println!("Renamed \"{}\" to \"{}\".", from, to);
    Ok(())
}

pub fn delete_recording(store: &dyn RecordingStore, name: &str) -> Result<()> {
    if !store.delete(name)? {
        bail!("No recording named \"{}\"", name);
    }
    println!("Deleted recording: \"{}\".", name);
    Ok(())
}

/// Export `name` to `path`, or to `<name>.mid` in the working directory
pub fn export_recording(store: &dyn RecordingStore, name: &str, path: Option<&Path>) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(export_file_name(name)));
    let timeline = store
        .load(name)?
        .with_context(|| format!("No recording named \"{}\"", name))?;
    if !timeline.has_content() {
        bail!("\"{}\" has no notes to export", name);
    }
    encoding::export_to_file(&timeline, &path)
        .with_context(|| format!("Failed to export MIDI file {}", path.display()))?;
    println!("Exported as {}", path.display());
    Ok(())
}

pub fn import_recording(store: &dyn RecordingStore, path: &Path, name: Option<String>) -> Result<()> {
    let timeline = encoding::import_from_file(path)
        .with_context(|| format!("Could not import {}", path.display()))?;

    let name = name.unwrap_or_else(|| {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name_from_file_name(&file_name)
    });
    store.save(&name, &timeline)?;
    println!(
        "Imported {} as \"{}\" ({} events, {})",
        path.display(),
        name,
        timeline.len(),
        format_duration(timeline.duration_ms() / 1000.0)
    );
    Ok(())
}

/// Play one saved recording to an output and return when it finishes
pub fn play_recording(config: Config, store: Box<dyn RecordingStore + Send>, name: &str) -> Result<()> {
    let manager = DeviceManager::new();
    let output_id = devices::resolve_selection(config.selected_output.as_deref(), &manager.outputs)
        .context("No MIDI output available")?;
    let output = devices::connect_output(&output_id)?;

    let clock = SystemClock::new();
    let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
    let mut engine: Engine<SystemClock, MidirOutput> = Engine::new(clock, config, store, notify_tx);
    engine.set_output(Some(output));

    if !engine.load(name) {
        print_pending(&notify_rx);
        bail!("Could not load \"{}\"", name);
    }
    if !engine.play() {
        print_pending(&notify_rx);
        bail!("\"{}\" has nothing to play", name);
    }

    let handle = runtime::spawn(engine, clock)?;
    let mut printer = NotificationPrinter::default();
    for notification in notify_rx.iter() {
        printer.print(&notification);
        if notification == Notification::PlaybackStopped {
            break;
        }
    }
    handle.shutdown();
    Ok(())
}

fn print_pending(rx: &Receiver<Notification>) {
    let mut printer = NotificationPrinter::default();
    for notification in rx.try_iter() {
        printer.print(&notification);
    }
}

// ============================================================================
// Live Monitor
// ============================================================================

/// A line typed at the monitor prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Record,
    Toggle,
    Stop,
    Play,
    Pause,
    Seek(f64),
    Auto(bool),
    Channel(OutputChannel),
    Save(String),
    Load(String),
    Rename { from: String, to: String },
    Delete(String),
    List,
    Export(PathBuf),
    Import(PathBuf),
    Help,
    Quit,
}

pub const CONSOLE_HELP: &str = "\
Commands:
  record            start recording (manual mode)
  toggle            start or stop recording
  stop              stop recording or playback
  play | pause      start or pause playback
  seek <0-100>      jump to a percentage of the recording
  auto on|off       toggle auto-record
  channel <ch>      output channel: default or 0-15
  save <name>       save the current recording
  load <name>       load a saved recording
  rename <a> -> <b> rename a saved recording
  delete <name>     delete a saved recording
  list              list saved recordings
  export <path>     write the current recording as a MIDI file
  import <path>     load a MIDI file
  quit";

/// Parse one console line. Blank lines parse to `Ok(None)`.
pub fn parse_console_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let require = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("'{}' needs {}", word, what))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "record" | "rec" | "r" => ConsoleCommand::Record,
        "toggle" | "t" => ConsoleCommand::Toggle,
        "stop" | "s" => ConsoleCommand::Stop,
        "play" | "p" => ConsoleCommand::Play,
        "pause" => ConsoleCommand::Pause,
        "seek" => {
            let value = require("a percentage")?;
            let percent: f64 = value
                .trim_end_matches('%')
                .parse()
                .map_err(|_| format!("Invalid seek position '{}'", value))?;
            ConsoleCommand::Seek(percent)
        }
        "auto" => match require("on or off")?.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => ConsoleCommand::Auto(true),
            "off" | "false" | "0" => ConsoleCommand::Auto(false),
            other => return Err(format!("Expected on or off, got '{}'", other)),
        },
        "channel" | "ch" => ConsoleCommand::Channel(require("a channel")?.parse()?),
        "save" => ConsoleCommand::Save(require("a name")?),
        "load" => ConsoleCommand::Load(require("a name")?),
        "rename" => {
            let names = require("'<old> -> <new>'")?;
            match names.split_once("->") {
                Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => ConsoleCommand::Rename {
                    from: from.trim().to_string(),
                    to: to.trim().to_string(),
                },
                _ => return Err("Usage: rename <old> -> <new>".to_string()),
            }
        }
        "delete" => ConsoleCommand::Delete(require("a name")?),
        "list" | "ls" => ConsoleCommand::List,
        "export" => ConsoleCommand::Export(PathBuf::from(require("a file path")?)),
        "import" => ConsoleCommand::Import(PathBuf::from(require("a file path")?)),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command '{}' (type 'help')", other)),
    };
    Ok(Some(command))
}

/// Prints notifications, throttling progress to one line per second
#[derive(Default)]
struct NotificationPrinter {
    last_second: Option<u64>,
}

impl NotificationPrinter {
    fn print(&mut self, notification: &Notification) {
        if let Notification::Progress { position_ms, .. } = notification {
            let second = (position_ms.max(0.0) / 1000.0) as u64;
            if self.last_second == Some(second) {
                return;
            }
            self.last_second = Some(second);
        }
        if let Some(text) = notification.describe() {
            println!("[Encore] {}", text);
        }
    }
}

/// Connections the monitor holds on the main thread
struct MonitorPorts {
    manager: DeviceManager,
    input_id: Option<String>,
    output_id: Option<String>,
    input_connection: Option<MidiInputConnection<()>>,
    output_connected: bool,
}

impl MonitorPorts {
    /// Re-resolve both selections against the current port lists and
    /// reconnect whatever changed.
    fn sync(&mut self, engine: &EngineHandle<MidirOutput>, config: &mut Config) {
        let wanted_input = devices::resolve_selection(self.input_id.as_deref(), &self.manager.inputs);
        if wanted_input != self.input_id || (wanted_input.is_some() && self.input_connection.is_none()) {
            // Drop the old connection before opening a new one
            self.input_connection = None;
            self.input_id = None;
            if let Some(id) = &wanted_input {
                match devices::connect_input(id, engine.sender(), Command::Midi) {
                    Ok(connection) => {
                        self.input_connection = Some(connection);
                        self.input_id = Some(id.clone());
                    }
                    Err(e) => log::warn!("Could not open MIDI input: {}", e),
                }
            }
            engine.send(Command::SelectInput(self.input_id.clone()));
            config.selected_input = self.input_id.clone();
        }

        let wanted_output = devices::resolve_selection(self.output_id.as_deref(), &self.manager.outputs);
        if wanted_output != self.output_id || (wanted_output.is_some() && !self.output_connected) {
            let output = wanted_output.as_deref().and_then(|id| match devices::connect_output(id) {
                Ok(output) => Some(output),
                Err(e) => {
                    log::warn!("Could not open MIDI output: {}", e);
                    None
                }
            });
            self.output_connected = output.is_some();
            self.output_id = if self.output_connected { wanted_output } else { None };
            engine.send(Command::SetOutput(output));
            config.selected_output = self.output_id.clone();
        }
    }
}

/// Run the interactive monitor until `quit` or end of input
pub fn monitor(mut config: Config, config_path: &Path, store: Box<dyn RecordingStore + Send>) -> Result<()> {
    let clock = SystemClock::new();
    let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
    let engine: Engine<SystemClock, MidirOutput> = Engine::new(clock, config.clone(), store, notify_tx);
    let handle = runtime::spawn(engine, clock)?;

    let printer = std::thread::Builder::new()
        .name("encore-notify".to_string())
        .spawn(move || {
            let mut printer = NotificationPrinter::default();
            for notification in notify_rx.iter() {
                printer.print(&notification);
            }
        })?;

    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    std::thread::Builder::new()
        .name("encore-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
        })?;

    let mut ports = MonitorPorts {
        manager: DeviceManager::new(),
        input_id: config.selected_input.clone(),
        output_id: config.selected_output.clone(),
        input_connection: None,
        output_connected: false,
    };
    ports.sync(&handle, &mut config);
    save_config(&config, config_path);

    println!("[Encore] Type 'help' for commands.");

    let mut last_poll = Instant::now();
    loop {
        match line_rx.recv_timeout(HOTPLUG_POLL_INTERVAL) {
            Ok(line) => match parse_console_command(&line) {
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => {
                    if !dispatch(command, &handle, &mut config, config_path) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(message) => println!("[Encore] {}", message),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_poll.elapsed() >= HOTPLUG_POLL_INTERVAL {
            last_poll = Instant::now();
            if ports.manager.refresh() {
                ports.sync(&handle, &mut config);
                save_config(&config, config_path);
            }
        }
    }

    // Close the input first so no callback races the shutdown
    ports.input_connection = None;
    handle.shutdown();
    if printer.join().is_err() {
        log::error!("Notification printer panicked");
    }
    Ok(())
}

/// Forward a console command to the engine. Returns false if the engine is gone.
fn dispatch(
    command: ConsoleCommand,
    engine: &EngineHandle<MidirOutput>,
    config: &mut Config,
    config_path: &Path,
) -> bool {
    match command {
        ConsoleCommand::Record => engine.send(Command::Record),
        ConsoleCommand::Toggle => engine.send(Command::ToggleRecording),
        ConsoleCommand::Stop => engine.send(Command::StopRecording) && engine.send(Command::Stop),
        ConsoleCommand::Play => engine.send(Command::Play),
        ConsoleCommand::Pause => engine.send(Command::Pause),
        ConsoleCommand::Seek(percent) => engine.send(Command::Seek(percent)),
        ConsoleCommand::Auto(enabled) => {
            config.auto_record = enabled;
            save_config(config, config_path);
            engine.send(Command::SetAutoRecord(enabled))
        }
        ConsoleCommand::Channel(channel) => {
            config.output_channel = channel;
            save_config(config, config_path);
            println!("[Encore] Output channel: {}", channel);
            engine.send(Command::SetOutputChannel(channel))
        }
        ConsoleCommand::Save(name) => engine.send(Command::Save(name)),
        ConsoleCommand::Load(name) => engine.send(Command::Load(name)),
        ConsoleCommand::Rename { from, to } => engine.send(Command::Rename { from, to }),
        ConsoleCommand::Delete(name) => engine.send(Command::Delete(name)),
        ConsoleCommand::List => {
            let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
            if !engine.send(Command::List(reply_tx)) {
                return false;
            }
            match reply_rx.recv_timeout(Duration::from_secs(5)) {
                Ok(recordings) if recordings.is_empty() => println!("No saved recordings."),
                Ok(recordings) => {
                    for summary in &recordings {
                        println!("  {}", format_summary(summary));
                    }
                }
                Err(e) => log::warn!("No reply to list request: {}", e),
            }
            true
        }
        ConsoleCommand::Export(path) => engine.send(Command::Export(path)),
        ConsoleCommand::Import(path) => engine.send(Command::Import(path)),
        ConsoleCommand::Help => {
            println!("{}", CONSOLE_HELP);
            true
        }
        ConsoleCommand::Quit => false,
    }
}

fn save_config(config: &Config, config_path: &Path) {
    if let Err(e) = config.save(config_path) {
        log::warn!("Failed to save config: {}", e);
    }
}

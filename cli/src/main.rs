//! Parley CLI - binary entry point and line-oriented front end.
//!
//! # Event Loop
//!
//! A fixed tick drives the engine; stdin lines arrive from a reader thread.
//!
//! 1. Wait for the next tick or input line
//! 2. Dispatch the line (message or slash command)
//! 3. Advance engine state (`app.tick()`): response events, warning, watchdog
//! 4. Print new answer text and drained notifications

mod commands;
mod loopback;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::{BufRead, Write, stdout},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant, SystemTime},
};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{Command, HELP, LimitKind};
use loopback::LoopbackProducer;
use parley_config::{ParleyConfig, Settings};
use parley_engine::{App, EngineError, MessageId, NewPrompt, SendOutcome, Surface};
use parley_store::SqliteStore;

const TICK_DURATION: Duration = Duration::from_millis(50);

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Stdout belongs to the conversation; no log file means no logs.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in data_file_candidates(&["logs", "parley.log"]) {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

/// `~/.parley/<parts>` first, then `./.parley/<parts>`.
fn data_file_candidates(parts: &[&str]) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(config_path) = ParleyConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(parts.iter().fold(config_dir.to_path_buf(), |p, s| p.join(s)));
    }

    candidates.push(parts.iter().fold(PathBuf::from(".parley"), |p, s| p.join(s)));
    candidates
}

fn open_store() -> Result<SqliteStore> {
    let mut last_error = None;
    for candidate in data_file_candidates(&["parley.db"]) {
        match SqliteStore::open(&candidate) {
            Ok(store) => {
                tracing::info!(path = %candidate.display(), "Opened chat database");
                return Ok(store);
            }
            Err(e) => {
                tracing::warn!(path = %candidate.display(), "Failed to open database: {e}");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) => Err(e).context("failed to open chat database"),
        None => anyhow::bail!("no location available for the chat database"),
    }
}

fn load_settings() -> Settings {
    let config = match ParleyConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ignoring config at {}: {e}", e.path().display());
            None
        }
    };
    let mut settings = Settings::from_config(config.as_ref());
    settings.apply_env();
    settings
}

/// Forward stdin lines to the async loop. The channel closes on EOF.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = load_settings();
    let store = open_store()?;
    let producer = LoopbackProducer::new(settings.stream_enable);
    let mut app = App::new(settings, Box::new(store), Box::new(producer));
    if let Err(e) = app.refresh_prompts() {
        tracing::warn!("Failed to load prompts: {e}");
    }

    println!("parley - type a message, or /help");
    let mut lines = spawn_stdin_reader();
    let mut ticks = tokio::time::interval(TICK_DURATION);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut view = View::default();

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            line = lines.recv() => {
                let Some(line) = line else { break };
                if handle_line(&mut app, &line, &mut view) == Flow::Quit {
                    break;
                }
            }
        }

        app.tick(Instant::now());
        view.render(&mut app);
    }

    app.cancel_response();
    tracing::info!("Exiting");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Tracks what of the in-flight answer has been printed.
#[derive(Debug, Default)]
struct View {
    printed: usize,
    streaming: Option<Surface>,
}

impl View {
    fn render(&mut self, app: &mut App) {
        let turn = app.turn();
        if turn.is_responding() {
            let answer = turn.answer();
            if self.streaming.is_none() {
                self.streaming = turn.action_id();
                self.printed = 0;
                print!("< ");
            }
            if answer.len() < self.printed {
                // Replace mode restarted the text.
                print!("\n< ");
                self.printed = 0;
            }
            if let Some(new) = answer.get(self.printed..) {
                print!("{new}");
                self.printed = answer.len();
            }
        } else if let Some(surface) = self.streaming.take() {
            if let Some(rest) = turn.answer().get(self.printed..) {
                print!("{rest}");
            }
            println!();
            if surface == Surface::ChatAction {
                println!("draft: {}", app.main_input().text());
            }
        }

        for notice in app.take_notifications() {
            println!("! {notice}");
        }
        let _ = stdout().flush();
    }

    fn reset(&mut self) {
        self.streaming = None;
        self.printed = 0;
    }
}

fn handle_line(app: &mut App, line: &str, view: &mut View) -> Flow {
    let command = match commands::parse(line) {
        None => {
            send_message(app, line);
            return Flow::Continue;
        }
        Some(Ok(command)) => command,
        Some(Err(message)) => {
            println!("{message}");
            return Flow::Continue;
        }
    };

    match command {
        Command::Quit => return Flow::Quit,
        Command::Help => println!("{HELP}"),
        Command::New => {
            report(app.select_chat(None));
            println!("new chat");
        }
        Command::Chats => {
            for chat in app.chat().chats() {
                println!("{:>4}  {}  {}", chat.id, format_time(chat.timestamp), chat.name);
            }
        }
        Command::Open(id) => {
            if report(app.select_chat(Some(id))) {
                show_chat(app);
            }
        }
        Command::Show => show_chat(app),
        Command::Cancel => {
            if app.cancel_response() {
                view.render(app);
                view.reset();
            }
        }
        Command::Draft(text) => {
            if !app.set_draft(text) {
                println!("input is waiting for a prompt action");
            }
        }
        Command::Prompt(id) => match app.handle_prompt_action(id) {
            Ok(true) => {}
            Ok(false) => println!("busy"),
            Err(e) => println!("error: {e}"),
        },
        Command::Undo => {
            if app.undo_prompt_action() {
                println!("draft: {}", app.main_input().text());
            }
        }
        Command::Prompts => {
            for prompt in app.prompt_panel().prompts() {
                println!("{:>4}  {}  {}", prompt.id, prompt.name, prompt.declare);
            }
        }
        Command::AddPrompt { name, prompt } => {
            let created = app.create_prompt(NewPrompt {
                name,
                declare: String::new(),
                prompt,
            });
            match created {
                Ok(prompt) => println!("saved prompt {}", prompt.id),
                Err(e) => println!("error: {e}"),
            }
        }
        Command::Panel(id) => match app.select_prompt(id) {
            Ok(_) => {
                if let Some(prompt) = app.prompt_panel().selected() {
                    println!("panel: {} ({})", prompt.name, prompt.prompt);
                }
            }
            Err(e) => println!("error: {e}"),
        },
        Command::Ask(text) => {
            app.prompt_input_mut().set_text(text);
            let tokens = app.prompt_panel_tokens();
            if app.send_prompt_panel() {
                println!("({tokens} tokens)");
            } else {
                println!("open a prompt with /panel first");
            }
        }
        Command::Limit(kind, value) => {
            let result = match kind {
                LimitKind::Tokens => app.set_tokens_limit(value),
                LimitKind::Messages => app.set_messages_limit(value),
            };
            if report(result) {
                print_stats(app);
            }
        }
        Command::Temperature(value) => {
            report(app.set_temperature(value));
        }
        Command::Model(model) => {
            report(app.set_model(model));
        }
        Command::Pin(index) => update_message(app, index, |app, id| app.toggle_pinned(id)),
        Command::Exclude(index) => {
            update_message(app, index, |app, id| app.set_in_prompts(id, false));
        }
        Command::Include(index) => {
            update_message(app, index, |app, id| app.set_in_prompts(id, true));
        }
        Command::Stats => print_stats(app),
        Command::Export => export_chat(app),
    }
    Flow::Continue
}

fn send_message(app: &mut App, line: &str) {
    if !app.set_draft(line) {
        println!("input is waiting for a prompt action");
        return;
    }
    match app.handle_send_message() {
        SendOutcome::Sent | SendOutcome::PersistFailed => {}
        SendOutcome::Ignored => {
            if app.main_input_busy() {
                println!("still responding; /cancel to stop");
            }
        }
        SendOutcome::TokensLimitExceeded => {
            if let Some(text) = app.warning_text() {
                println!("! {text}");
            }
            print_stats(app);
        }
    }
}

fn update_message(
    app: &mut App,
    index: usize,
    action: impl FnOnce(&mut App, MessageId) -> Result<bool, EngineError>,
) {
    let Some(id) = app.chat().messages().get(index).map(|m| m.id) else {
        println!("no message {}", index + 1);
        return;
    };
    match action(app, id) {
        Ok(true) => show_chat(app),
        Ok(false) => {
            if let Some(text) = app.warning_text() {
                println!("! {text}");
            }
        }
        Err(e) => println!("error: {e}"),
    }
}

fn report<T>(result: Result<T, EngineError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            println!("error: {e}");
            false
        }
    }
}

fn show_chat(app: &App) {
    let Some(chat) = app.chat().selected_chat() else {
        println!("(new chat)");
        return;
    };
    println!("# {} ({})", chat.name, format_time(chat.timestamp));
    for (n, message) in app.chat().messages().iter().enumerate() {
        let marker = match (message.fixed_in_prompt, message.in_prompts) {
            (true, _) => '*',
            (false, true) => '+',
            (false, false) => ' ',
        };
        println!("{:>3}{marker} {}: {}", n + 1, message.sender.as_str(), message.text);
    }
}

fn print_stats(app: &App) {
    let stats = app.statistics();
    println!(
        "tokens in prompt: {} (max: {}), messages in prompt: {} (max: {})",
        stats.total_tokens(),
        stats.tokens_limit,
        stats.included_count,
        stats.messages_limit
    );
}

fn export_chat(app: &App) {
    let Some(chat) = app.chat().selected_chat() else {
        println!("nothing to export");
        return;
    };
    let export = serde_json::json!({
        "chat": chat,
        "messages": app.chat().messages(),
    });
    match serde_json::to_string_pretty(&export) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("error: {e}"),
    }
}

fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

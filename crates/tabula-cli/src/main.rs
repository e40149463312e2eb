//! Tabula - page through text files in one or two terminal panes
//!
//! Every file becomes a view on the primary pane's stack. Keys and mouse
//! chords run commands against the active view; `Z` moves the view
//! underneath into a second pane.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tabula_core::driver::restore_terminal;
use tabula_core::error::panic_is_guarded;
use tabula_core::{
    constants, CommandRegistry, CrosstermDriver, Scheduler, SessionConfig, SessionContext,
    SessionOutcome,
};

mod commands;
mod paths;
mod views;

use views::TextView;

/// Tabula - terminal text pager
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(about = "Page through text files in one or two terminal panes", long_about = None)]
struct Cli {
    /// Files to open; the first one is shown on top
    files: Vec<PathBuf>,

    /// Height of the second pane as a percentage of the screen.
    /// Negative puts it on top; 0 shows a single pane.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    split: i32,

    /// Read timeout while background work is running
    #[arg(long, default_value_t = constants::input::BUSY_TIMEOUT.as_millis() as u64)]
    busy_timeout_ms: u64,

    /// Quiet iterations before waiting indefinitely for input (negative: never)
    #[arg(long, default_value_t = i64::from(constants::input::IDLE_ITERATIONS), allow_negative_numbers = true)]
    idle_iterations: i64,

    /// Errors kept for ^E / g^E
    #[arg(long, default_value_t = constants::report::ERROR_HISTORY)]
    error_history: usize,

    /// Leave the mouse to the terminal emulator
    #[arg(long)]
    no_mouse: bool,

    /// Commands to run before reading the keyboard, e.g. "go-bottom Z"
    #[arg(long)]
    replay: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            busy_timeout_ms: self.busy_timeout_ms,
            idle_iterations: u32::try_from(self.idle_iterations).ok(),
            split_percent: self.split,
            error_history: self.error_history,
            mouse: !self.no_mouse,
            ..SessionConfig::default()
        }
    }

    fn replay_entries(&self) -> Result<Vec<String>> {
        match &self.replay {
            Some(replay) => shell_words::split(replay).context("parsing --replay"),
            None => Ok(Vec::new()),
        }
    }
}

/// Log to a file; stdout and stderr belong to the terminal UI
fn init_logging(level: &str) -> Option<PathBuf> {
    let log_dir = paths::logs_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let log_path = log_dir.join("tabula.log");

    let (log_file, path) = match std::fs::File::create(&log_path) {
        Ok(file) => (file, Some(log_path)),
        Err(_) => (std::fs::File::create(paths::NULL_DEVICE).ok()?, None),
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    path
}

/// Panics inside commands, drawing and background jobs are caught and
/// shown in the session; only log those. Anything else is about to end
/// the process, so give the shell its terminal back first.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("{}", panic_info);
        if panic_is_guarded() {
            return;
        }
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

/// Help text listing every command and its keys
fn help_lines(registry: &CommandRegistry) -> Vec<String> {
    let mut lines = vec![
        "tabula: no files given".to_string(),
        String::new(),
        format!("{:<16} {:<20} {}", "command", "keys", "description"),
    ];
    for command in registry.commands() {
        let keys = registry.keys_for(&command.id).join(" ");
        lines.push(format!("{:<16} {:<20} {}", command.id, keys, command.help));
    }
    lines.push(String::new());
    lines.push(format!("{} quits immediately", constants::input::QUIT_KEY));
    lines
}

fn open_views(ctx: &mut SessionContext, files: &[PathBuf], help: Vec<String>) {
    if files.is_empty() {
        ctx.push(Box::new(TextView::from_lines("help", help)));
        return;
    }
    for file in files.iter().rev() {
        ctx.push(Box::new(TextView::from_file(file)));
    }
}

/// Process status for a finished session: 1 when quit was forced past an error
fn exit_status(outcome: SessionOutcome) -> u8 {
    match outcome {
        SessionOutcome::Finished => 0,
        SessionOutcome::Returned(value) => {
            println!("{value}");
            0
        }
        SessionOutcome::ForcedQuit {
            last_error: Some(error),
        } => {
            eprintln!("{error}");
            1
        }
        SessionOutcome::ForcedQuit { last_error: None } => 0,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_path = init_logging(&cli.log_level);
    install_panic_hook();
    tracing::info!(log = ?log_path, files = cli.files.len(), "Starting tabula");

    let config = cli.session_config();
    let replay = cli.replay_entries()?;
    let registry = commands::builtin_registry();
    let help = help_lines(&registry);

    let driver = CrosstermDriver::new(config.mouse).context("starting terminal session")?;
    let mut scheduler = Scheduler::new(driver, registry, config);
    open_views(scheduler.context_mut(), &cli.files, help);
    for entry in replay {
        scheduler.context_mut().queue_replay(entry);
    }

    let result = scheduler.run().await;
    if let Err(e) = scheduler.into_driver().shutdown() {
        tracing::warn!("Failed to restore terminal: {}", e);
    }

    let outcome = result.context("terminal session failed")?;
    Ok(ExitCode::from(exit_status(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::Pane;

    #[test]
    fn test_cli_builds_session_config() {
        let cli = Cli::try_parse_from([
            "tabula",
            "--split",
            "-30",
            "--idle-iterations",
            "-1",
            "--no-mouse",
            "notes.txt",
        ])
        .unwrap();
        let config = cli.session_config();
        assert_eq!(config.split_percent, -30);
        assert_eq!(config.idle_iterations, None);
        assert!(!config.mouse);
        assert_eq!(cli.files, vec![PathBuf::from("notes.txt")]);
    }

    #[test]
    fn test_cli_defaults_match_session_defaults() {
        let cli = Cli::try_parse_from(["tabula"]).unwrap();
        assert_eq!(cli.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_replay_is_split_like_a_shell() {
        let cli = Cli::try_parse_from(["tabula", "--replay", "go-bottom 'errors-all'"]).unwrap();
        assert_eq!(cli.replay_entries().unwrap(), vec!["go-bottom", "errors-all"]);

        let bad = Cli::try_parse_from(["tabula", "--replay", "'unterminated"]).unwrap();
        assert!(bad.replay_entries().is_err());
    }

    #[test]
    fn test_first_file_is_on_top() {
        let mut ctx = SessionContext::new(&SessionConfig::default());
        open_views(
            &mut ctx,
            &[PathBuf::from("a.txt"), PathBuf::from("b.txt")],
            Vec::new(),
        );
        assert_eq!(ctx.stack(Pane::Primary).len(), 2);
        let top = ctx.active_view_mut().map(|view| view.name().to_string());
        assert_eq!(top.as_deref(), Some("a.txt"));
    }

    #[test]
    fn test_help_lists_bound_keys() {
        let registry = commands::builtin_registry();
        let help = help_lines(&registry);
        assert!(help
            .iter()
            .any(|line| line.starts_with("quit-view") && line.contains(" q ")));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_status(SessionOutcome::Finished), 0);
        assert_eq!(
            exit_status(SessionOutcome::ForcedQuit {
                last_error: Some("boom".into())
            }),
            1
        );
        assert_eq!(
            exit_status(SessionOutcome::ForcedQuit { last_error: None }),
            0
        );
    }
}

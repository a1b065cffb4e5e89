//! Shutter CLI
//!
//! Hardware privacy monitor for the camera and microphone.

use clap::{Parser, Subcommand};
use crossbeam_channel::{select, Receiver};
use shutter::{
    audit::{stats::read_persisted, EventJournal, MonitorStats},
    autostart,
    config::Config,
    core::{classify, MonitorState, StateHandle},
    logging,
    mitigation::{CommandKiller, Mitigator},
    monitor::{Monitor, PollLoop},
    notify::{dashboard_text, ConsoleIndicator, DesktopNotifier, Notifier, SilentNotifier},
    platform::Platform,
    scanner::{platform_scanner, CommandQuery},
    shutdown::{Shutdown, ShutdownSignal},
    ABOUT, VERSION,
};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "shutter")]
#[command(version = VERSION)]
#[command(about = "Hardware privacy monitor for the camera and microphone", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring in the foreground
    Start {
        /// Seconds between scans (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// Do not send desktop notifications
        #[arg(long)]
        no_notify: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run one scan and print what is using the hardware
    Scan,

    /// Show recorded alerts and clears
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
    },

    /// Show platform support and cumulative statistics
    Status,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file for editing
        #[arg(long)]
        init: bool,
    },

    /// Start Shutter automatically at login
    Autostart,

    /// Describe what Shutter watches and its limits
    About,
}

/// Commands accepted on stdin while monitoring.
enum UiCommand {
    Dashboard,
    Panic,
    Quit,
}

impl UiCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "d" | "dashboard" => Some(UiCommand::Dashboard),
            "k" | "kill" | "panic" => Some(UiCommand::Panic),
            "q" | "quit" => Some(UiCommand::Quit),
            _ => None,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            interval,
            no_notify,
            verbose,
        } => {
            cmd_start(interval, no_notify, verbose);
        }
        Commands::Scan => {
            cmd_scan();
        }
        Commands::History { count } => {
            cmd_history(count);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config { init } => {
            cmd_config(init);
        }
        Commands::Autostart => {
            cmd_autostart();
        }
        Commands::About => {
            println!("{ABOUT}");
        }
    }
}

fn cmd_start(interval: Option<u64>, no_notify: bool, verbose: bool) {
    let mut config = Config::load().unwrap_or_default();
    if let Some(secs) = interval {
        config.poll_interval = Duration::from_secs(secs.max(1));
    }
    if no_notify {
        config.notifications = false;
    }

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    if let Err(e) = logging::init(Some(config.log_path.as_path()), verbose) {
        eprintln!("Warning: {e}");
    }

    let platform = Platform::current();
    if !platform.is_supported() {
        eprintln!("Warning: no detection backend for {platform}; nothing will be reported.");
    }

    let shutdown = Arc::new(Shutdown::new());
    if let Err(e) = ctrlc_handler(shutdown.clone()) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }
    let signal = shutdown.signal();

    let notifier: Arc<dyn Notifier> = if config.notifications {
        Arc::new(DesktopNotifier::new(
            CommandQuery::new(config.query_timeout, signal.clone()),
            platform,
        ))
    } else {
        Arc::new(SilentNotifier)
    };
    let journal = EventJournal::new(config.journal_path());
    let stats = Arc::new(MonitorStats::with_persistence(config.stats_path()));
    let state = StateHandle::new(MonitorState::new(config.history_capacity));

    let poll = PollLoop::new(
        platform_scanner(&config, signal.clone()),
        state.clone(),
        notifier.clone(),
        Arc::new(ConsoleIndicator::new()),
    )
    .with_journal(journal.clone())
    .with_stats(stats.clone());

    let mitigator = Mitigator::new(
        CommandKiller::new(CommandQuery::new(config.query_timeout, signal.clone()), platform),
        config.mitigation.clone(),
    )
    .with_journal(journal.clone())
    .with_stats(stats.clone());

    let mut monitor = Monitor::new(poll, config.poll_interval, signal.clone());
    if let Err(e) = monitor.start() {
        eprintln!("Error starting monitor: {e}");
        std::process::exit(1);
    }

    println!("Shutter v{VERSION} monitoring ({platform})");
    println!("Scanning every {}s.", config.poll_interval.as_secs());
    println!("Commands: d = dashboard, k = panic kill, q = quit");
    println!();

    let mut commands = spawn_command_reader();
    loop {
        let mut stdin_closed = false;
        select! {
            recv(commands) -> msg => match msg {
                Ok(UiCommand::Dashboard) => {
                    let snapshot = state.snapshot(config.dashboard_entries);
                    println!("{}", dashboard_text(&snapshot, journal.host(), &config.log_path));
                    println!();
                }
                Ok(UiCommand::Panic) => {
                    let report = mitigator.panic(&state.threats(), notifier.as_ref());
                    for (name, reason) in &report.failed {
                        eprintln!("Could not terminate {name}: {reason}");
                    }
                }
                Ok(UiCommand::Quit) => shutdown.trigger(),
                Err(_) => stdin_closed = true,
            },
            recv(signal.receiver()) -> _ => break,
        }
        // Keep monitoring until Ctrl+C.
        if stdin_closed {
            commands = crossbeam_channel::never();
        }
    }

    println!();
    println!("Stopping...");
    monitor.join();

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }
    println!();
    println!("{}", stats.summary());
}

/// Read UI commands from stdin on a separate thread.
fn spawn_command_reader() -> Receiver<UiCommand> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new()
        .name("shutter-ui".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match UiCommand::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command: {} (d, k or q)", line.trim()),
                }
            }
        });
    if let Err(e) = spawned {
        eprintln!("Warning: Could not read commands from stdin: {e}");
    }
    rx
}

fn cmd_scan() {
    let config = Config::load().unwrap_or_default();
    let scanner = platform_scanner(&config, ShutdownSignal::never());
    let threats = scanner.scan();
    let classification = classify(&threats);

    println!("Scanner: {}", scanner.name());
    println!("Status: {}", classification.verdict.status_text());
    if threats.is_empty() {
        println!("Nothing is using the camera or microphone.");
    } else {
        for label in threats.labels() {
            println!("  - {label}");
        }
    }
}

fn cmd_history(count: usize) {
    let config = Config::load().unwrap_or_default();
    let journal = EventJournal::new(config.journal_path());

    match journal.recent_transitions(count) {
        Ok(entries) if entries.is_empty() => println!("No events yet."),
        Ok(entries) => {
            for entry in entries {
                println!("{}", entry.display_line());
            }
        }
        Err(e) => {
            eprintln!("Error reading {}: {e}", journal.path().display());
            std::process::exit(1);
        }
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();
    let platform = Platform::current();

    println!("Shutter Status");
    println!("==============");
    println!();
    println!(
        "Platform: {platform} ({})",
        if platform.is_supported() {
            "supported ✓"
        } else {
            "no detection backend ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Poll interval: {}s", config.poll_interval.as_secs());
    println!("  Query timeout: {}ms", config.query_timeout.as_millis());
    println!(
        "  Notifications: {}",
        if config.notifications {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Security log: {}", config.log_path.display());
    println!();

    match read_persisted(&config.stats_path()) {
        Ok(stats) => {
            println!("Cumulative Statistics:");
            println!("  Poll cycles: {}", stats.polls);
            println!("  Alerts raised: {}", stats.alerts);
            println!("  Returns to safe: {}", stats.clears);
            println!("  Termination requests: {}", stats.kill_requests);
            println!("  Last updated: {}", stats.last_updated.to_rfc3339());
        }
        Err(_) => println!("No previous session data found."),
    }
}

fn cmd_config(init: bool) {
    let config = Config::load().unwrap_or_default();

    if init {
        if let Err(e) = config.save() {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
        println!("Wrote {:?}", Config::config_path());
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_autostart() {
    let config = Config::load().unwrap_or_default();
    let platform = Platform::current();
    let query = CommandQuery::new(config.query_timeout, ShutdownSignal::never());
    let notifier = DesktopNotifier::new(query.clone(), platform);

    let result = std::env::current_exe()
        .map_err(|e| autostart::AutostartError::Io(e.to_string()))
        .and_then(|exe| autostart::install(platform, &exe, &query));

    match result {
        Ok(message) => {
            println!("{message}");
            notifier.notify("Success", &message);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            notifier.notify("Error", &e.to_string());
            std::process::exit(1);
        }
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(shutdown: Arc<Shutdown>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || shutdown.trigger())
}

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use medlog_core::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tokio::sync::broadcast;
use uuid::Uuid;

type CliTracker = Tracker<FileStorage, SystemClock>;

#[derive(Parser)]
#[command(name = "medlog")]
#[command(about = "Medication intake log with daily reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a medication intake
    Add {
        /// Medication name
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        dosage: String,

        #[arg(long, default_value = "")]
        frequency: String,

        #[arg(long, default_value = "")]
        notes: String,

        /// Daily reminder time (HH:MM, 24-hour)
        #[arg(long)]
        remind: Option<String>,
    },

    /// Remove an entry and its reminders
    Remove { id: Uuid },

    /// List entries, newest first, optionally filtered
    List {
        /// Case-insensitive text to search for
        query: Option<String>,
    },

    /// Show reminders and when they fire next
    Reminders,

    /// Enable or disable a reminder
    Reminder {
        #[command(subcommand)]
        action: ReminderAction,
    },

    /// Export the log as a backup or CSV
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Backup)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Merge a backup file into the log
    Import { path: PathBuf },

    /// Deliver reminders until interrupted
    Watch,
}

#[derive(Subcommand)]
enum ReminderAction {
    Enable { id: Uuid },
    Disable { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Backup,
    Csv,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = medlog_core::logging::init();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    log_level.set_level(&config.logging.level);

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    // Reminder fires run as local tasks on this single thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli.command, data_dir, config))
}

async fn run(command: Commands, data_dir: PathBuf, config: Config) -> Result<()> {
    let notifier = Rc::new(ConsoleNotifier::new(config.notifications.enabled));
    let mut tracker = Tracker::open(FileStorage::new(&data_dir), Rc::new(SystemClock), notifier);
    let mut changes = tracker.subscribe();

    let result = match command {
        Commands::Add {
            name,
            dosage,
            frequency,
            notes,
            remind,
        } => cmd_add(
            &mut tracker,
            NewEntry {
                name,
                dosage,
                frequency,
                notes,
                remind_at: remind,
            },
        ),
        Commands::Remove { id } => cmd_remove(&mut tracker, id),
        Commands::List { query } => cmd_list(&tracker, query.as_deref().unwrap_or("")),
        Commands::Reminders => cmd_reminders(&tracker),
        Commands::Reminder { action } => match action {
            ReminderAction::Enable { id } => cmd_toggle(&mut tracker, id, true),
            ReminderAction::Disable { id } => cmd_toggle(&mut tracker, id, false),
        },
        Commands::Export { format, output } => cmd_export(&tracker, format, output.as_deref()),
        Commands::Import { path } => cmd_import(&mut tracker, &path),
        Commands::Watch => cmd_watch(&tracker).await,
    };

    report_persistence_failures(&mut changes);
    result
}

fn cmd_add(tracker: &mut CliTracker, input: NewEntry) -> Result<()> {
    let added = tracker.add(input)?;

    println!("✓ Logged {} ({})", added.entry.name, added.entry.id);
    if let Some(reminder) = added.reminder {
        println!(
            "  Daily reminder at {} ({})",
            reminder.time_of_day, reminder.id
        );
        if let Err(e) = tracker.notification_status() {
            eprintln!("warning: {}; the reminder is saved but will not fire", e);
        }
    }
    Ok(())
}

fn cmd_remove(tracker: &mut CliTracker, id: Uuid) -> Result<()> {
    match tracker.remove(id) {
        Some(removal) => {
            println!("✓ Removed {}", removal.entry.name);
            if !removal.reminders.is_empty() {
                println!("  Cancelled {} reminder(s)", removal.reminders.len());
            }
        }
        None => println!("No entry with id {}", id),
    }
    Ok(())
}

fn cmd_list(tracker: &CliTracker, query: &str) -> Result<()> {
    let entries = tracker.filter(query);
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    for entry in entries {
        let logged_at = entry.logged_at.with_timezone(&Local);
        let details: Vec<&str> = [&entry.dosage, &entry.frequency, &entry.notes]
            .into_iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();

        println!(
            "{}  {}  {}",
            entry.id,
            logged_at.format("%Y-%m-%d %H:%M"),
            entry.name
        );
        if !details.is_empty() {
            println!("    {}", details.join(" · "));
        }
    }
    Ok(())
}

fn cmd_reminders(tracker: &CliTracker) -> Result<()> {
    let upcoming = tracker.upcoming();
    if upcoming.is_empty() {
        println!("No reminders.");
        return Ok(());
    }

    for item in upcoming {
        let when = match &item.next {
            Some(next) => format!("next {}", next.at.format("%Y-%m-%d %H:%M")),
            None => "disabled".to_string(),
        };
        println!(
            "{}  {}  {}  ({})",
            item.reminder.id, item.reminder.time_of_day, item.medication_name, when
        );
    }
    Ok(())
}

fn cmd_toggle(tracker: &mut CliTracker, id: Uuid, active: bool) -> Result<()> {
    let reminder = tracker.set_reminder_active(id, active)?;
    println!(
        "✓ Reminder at {} {}",
        reminder.time_of_day,
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn cmd_export(tracker: &CliTracker, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let text = match format {
        ExportFormat::Backup => tracker.export_backup()?,
        ExportFormat::Csv => tracker.export_tabular()?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("✓ Exported {} entries to {}", tracker.entries().len(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn cmd_import(tracker: &mut CliTracker, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let outcome = tracker.import_backup(&text)?;

    println!(
        "✓ Imported {} entries and {} reminders",
        outcome.entries_added,
        outcome.reminders_added.len()
    );
    Ok(())
}

async fn cmd_watch(tracker: &CliTracker) -> Result<()> {
    if let Err(e) = tracker.notification_status() {
        eprintln!("warning: {}; reminders will not be shown", e);
    }

    let armed = tracker.resume_reminders();
    println!("Watching {} reminder(s). Press Ctrl-C to stop.", armed);

    tracker.run_until(tokio::signal::ctrl_c()).await?;
    tracker.scheduler().disarm_all();
    println!("\nStopped.");
    Ok(())
}

fn report_persistence_failures(changes: &mut broadcast::Receiver<StateChange>) {
    while let Ok(change) = changes.try_recv() {
        if let StateChange::PersistenceFailed(message) = change {
            eprintln!("warning: {} (changes kept for this session only)", message);
        }
    }
}

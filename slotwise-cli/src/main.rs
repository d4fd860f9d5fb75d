use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slotwise_core::{Event, ScheduleResult, Task};
use std::path::PathBuf;

mod app;
mod auth;
mod calendar;
mod config;
mod llm;
mod state;

use app::{Acceptance, App, EventDraft, TaskDraft};

/// Log filter, e.g. `SLOTWISE_LOG=slotwise_core=debug`.
const LOG_ENV: &str = "SLOTWISE_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "slotwise",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SLOTWISE_BUILD_SHA"), ")"),
    about = "Places deadline-task work sessions into free calendar time"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write ~/.slotwise/config.toml with defaults
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Store an API key for the AI tier
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    Event {
        #[command(subcommand)]
        command: EventCommand,
    },

    /// Per-user scheduling preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },

    /// Show free time in the next N days
    FreeSlots {
        #[arg(long, default_value_t = 4)]
        days: i64,
    },

    /// Propose sessions for the next cycle of a task (nothing is written)
    Propose {
        #[arg(long)]
        task: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Skip the AI tier and use the heuristic only
        #[arg(long)]
        no_ai: bool,
    },

    /// Commit proposals from the last `propose` run
    Accept {
        /// 1-based proposal numbers (default: all)
        #[arg(long = "index", num_args = 1..)]
        indices: Vec<usize>,
    },

    /// Recount completed sessions from past calendar events
    Sync {
        #[arg(long)]
        task: String,
    },

    /// Mark a task completed
    Complete {
        #[arg(long)]
        task: String,
    },

    /// Deadline tasks still waiting for a first cycle
    Pending,

    /// Model fallback chain and cooldowns
    Models {
        /// Send one probe request through the chain first
        #[arg(long)]
        ping: bool,
    },

    /// Export committed sessions as an .ics calendar
    ExportIcs {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Paste a key for the given provider (gemini, openai, anthropic)
    PasteKey {
        #[arg(long, default_value = "gemini")]
        provider: String,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    Add {
        #[arg(long)]
        title: String,

        /// Local deadline, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        due: String,

        /// Total effort in minutes
        #[arg(long)]
        effort: Option<i32>,

        /// Session length in minutes
        #[arg(long)]
        session: Option<i32>,

        #[arg(long)]
        max_sessions: Option<i32>,

        /// high, medium or low
        #[arg(long)]
        priority: Option<String>,

        /// quick, regular or project
        #[arg(long)]
        scale: Option<String>,

        /// A plain to-do with no sessions
        #[arg(long)]
        simple: bool,

        #[arg(long)]
        description: Option<String>,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum EventCommand {
    Add {
        #[arg(long)]
        title: String,

        /// Local start, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Immovable (class, meeting)
        #[arg(long)]
        fixed: bool,

        /// daily, weekly, weekdays, monthly, ...
        #[arg(long)]
        recurrence: Option<String>,
    },
    List {
        /// Only events in the next N days
        #[arg(long)]
        days: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    Set {
        #[arg(long)]
        horizon_days: Option<i64>,

        /// Free-text rules passed to the AI tier ("" clears them)
        #[arg(long)]
        rules: Option<String>,
    },
    Show,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Config {
            command: ConfigCommand::Init,
        } => return config::init_config(),
        Command::Auth {
            command: AuthCommand::PasteKey { provider },
        } => return auth::paste_api_key(provider.parse()?),
        _ => {}
    }

    let app = App::new(state::StateDir::open()?, config::load_config()?);

    match cli.command {
        Command::Config { .. } | Command::Auth { .. } => {}

        Command::Task { command } => match command {
            TaskCommand::Add {
                title,
                due,
                effort,
                session,
                max_sessions,
                priority,
                scale,
                simple,
                description,
            } => {
                let task = app.add_task(TaskDraft {
                    title,
                    due,
                    effort,
                    session,
                    max_sessions,
                    priority,
                    scale,
                    simple,
                    description,
                })?;
                println!(
                    "Added {}: {} (due {}, {} session(s) of {}m)",
                    task.id,
                    task.title,
                    task.due_date.format("%Y-%m-%d %H:%M"),
                    task.required_sessions(),
                    task.effective_session_duration()
                );
            }
            TaskCommand::List => {
                let tasks = app.list_tasks()?;
                if tasks.is_empty() {
                    println!("No tasks.");
                }
                for t in &tasks {
                    print_task(t);
                }
            }
        },

        Command::Event { command } => match command {
            EventCommand::Add {
                title,
                start,
                end,
                fixed,
                recurrence,
            } => {
                let e = app.add_event(EventDraft {
                    title,
                    start,
                    end,
                    fixed,
                    recurrence,
                })?;
                println!("Added {}", event_line(&e));
            }
            EventCommand::List { days } => {
                let events = app.list_events(days)?;
                if events.is_empty() {
                    println!("No events.");
                }
                for e in &events {
                    println!("{}", event_line(e));
                }
            }
        },

        Command::Prefs { command } => {
            let prefs = match command {
                PrefsCommand::Set {
                    horizon_days,
                    rules,
                } => app.set_prefs(horizon_days, rules)?,
                PrefsCommand::Show => app.prefs()?,
            };
            println!("horizon_days: {}", prefs.effective_horizon_days());
            println!(
                "rules: {}",
                prefs.custom_rules.as_deref().unwrap_or("(none)")
            );
        }

        Command::FreeSlots { days } => {
            let slots = app.free_slots(days)?;
            if slots.is_empty() {
                println!("No free time in the next {days} day(s).");
            }
            for s in &slots {
                println!(
                    "{} - {}  ({}m)",
                    s.start().format("%a %d/%m %H:%M"),
                    s.end().format("%H:%M"),
                    s.duration_minutes()
                );
            }
        }

        Command::Propose { task, json, no_ai } => {
            let result = app.propose(&task, !no_ai)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }

        Command::Accept { indices } => {
            let accepted = app.accept(&indices)?;
            print_acceptance(&accepted);
        }

        Command::Sync { task } => {
            let t = app.sync(&task)?;
            println!(
                "{}: {}/{} session(s) done, {} on the calendar ({}%)",
                t.id,
                t.completed_sessions,
                t.required_sessions(),
                t.scheduled_sessions,
                t.progress_percent()
            );
        }

        Command::Complete { task } => {
            let t = app.complete(&task)?;
            println!("{}: {}", t.id, t.status.as_str());
        }

        Command::Pending => {
            let tasks = app.pending()?;
            if tasks.is_empty() {
                println!("Nothing pending.");
            }
            for t in &tasks {
                print_task(t);
            }
        }

        Command::Models { ping } => {
            let (answered, statuses) = app.models(ping)?;
            if let Some(ok) = answered {
                println!("ping: {}", if ok { "ok" } else { "no model answered" });
            }
            for s in &statuses {
                if s.available {
                    println!("{:<28} available", s.model);
                } else {
                    println!(
                        "{:<28} cooling down ({}s left)",
                        s.model, s.cooldown_remaining_secs
                    );
                }
            }
        }

        Command::ExportIcs { output } => {
            let ics = app.export_ics()?;
            match output {
                Some(p) => {
                    std::fs::write(&p, ics).with_context(|| format!("write {}", p.display()))?;
                    println!("Wrote {}", p.display());
                }
                None => print!("{ics}"),
            }
        }
    }

    Ok(())
}

fn print_task(t: &Task) {
    println!(
        "- [{}] {} {} (due {}, {}/{} done, {} scheduled, {})",
        t.priority.code(),
        t.id,
        t.title,
        t.due_date.format("%Y-%m-%d %H:%M"),
        t.completed_sessions,
        t.required_sessions(),
        t.scheduled_sessions,
        t.status.as_str()
    );
}

fn event_line(e: &Event) -> String {
    let mut line = format!(
        "{} {} {} - {}",
        e.id,
        e.title,
        e.start.format("%a %d/%m %H:%M"),
        e.end.format("%H:%M")
    );
    if e.recurrence.is_recurring() {
        line.push_str(&format!(" [{}]", e.recurrence.as_str()));
    }
    line
}

fn print_result(result: &ScheduleResult) {
    println!("{}", result.message);
    if let Some(strategy) = result.strategy.as_deref() {
        println!("\n(strategy: {strategy})");
    }
    if let Some(next) = result.next_cycle_date {
        println!("Next cycle: {}", next.format("%Y-%m-%d"));
    }
    if !result.proposals.is_empty() {
        println!("Accept with: slotwise accept [--index N ...]");
    }
}

fn print_acceptance(accepted: &Acceptance) {
    for e in &accepted.batch.committed {
        println!("Committed {}", event_line(e));
    }
    if let (Some(failure), Some(number)) = (&accepted.batch.failure, accepted.failed_number) {
        println!("Stopped at proposal {number}: {}", failure.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn version_carries_build_hash() {
        let cmd = Cli::command();
        let version = cmd.get_version().unwrap_or_default();
        assert!(version.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(version.ends_with(&format!("({})", env!("SLOTWISE_BUILD_SHA"))));
    }

    #[test]
    fn accept_keeps_index_order() {
        let cli = Cli::try_parse_from(["slotwise", "accept", "--index", "3", "1"]).unwrap();
        match cli.command {
            Command::Accept { indices } => assert_eq!(indices, vec![3, 1]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

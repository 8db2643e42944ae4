use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use jiff::civil::Date;

use triage::{
    classifier::linear::LinearModel,
    clock::{Clock, SystemClock},
    config::{Config, SmtpConfig},
    models::priority::Priority,
    notify::{DisabledNotifier, NotificationError, Notifier, smtp::SmtpNotifier},
    services::{
        records::{ListFilter, TaskRecordStore},
        tasks::{
            Analysis, CreateTaskParameters, NotificationOutcome, TaskOutcome, TaskService,
            UpdateTaskParameters,
        },
    },
    storage::csv_file::CsvFileStorage,
};

mod ui;

#[derive(Parser)]
#[command(
    name = "triage",
    about = "A small task manager that predicts task priority and sends email reminders"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task (its priority is predicted from the description)
    Add {
        /// What needs to be done
        description: String,

        /// Short title
        #[arg(short, long)]
        title: Option<String>,

        /// Due date, YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        due: Option<Date>,

        /// Send a reminder to this address
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Predict the priority of a description without saving it
    Analyze {
        description: String,

        /// Due date, YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        due: Option<Date>,
    },

    /// Show the task dashboard
    List {
        /// Only show tasks with this priority (High, Medium, Low)
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Print tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one task
    Show { id: String },

    /// Edit a task. Priority and remaining days are always recomputed.
    Edit {
        /// Task id or unique id prefix
        id: String,

        /// New title (empty string removes it)
        #[arg(short, long)]
        title: Option<String>,

        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// New due date, YYYY-MM-DD
        #[arg(short, long)]
        due: Option<Date>,

        /// New reminder address (empty string removes it)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Delete a task
    Delete {
        /// Task id or unique id prefix
        id: String,
    },

    /// Delete every task
    Clear {
        /// Confirm deleting all tasks
        #[arg(long)]
        yes: bool,
    },
}

fn exit_with_error(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    std::process::exit(1);
}

fn build_notifier(config: &SmtpConfig) -> Box<dyn Notifier> {
    match SmtpNotifier::from_config(config) {
        Ok(notifier) => Box::new(notifier),
        Err(NotificationError::NotConfigured) => Box::new(DisabledNotifier),
        Err(e) => {
            log::warn!("Email reminders disabled: {}", e);
            Box::new(DisabledNotifier)
        }
    }
}

fn report_outcome(outcome: &TaskOutcome, verb: &str) {
    ui::render_success(&format!("Task {} {}", outcome.record.short_id(), verb));
    match &outcome.notification {
        NotificationOutcome::Sent { address } => {
            ui::render_success(&format!("Reminder sent to {}", address));
        }
        NotificationOutcome::Failed { .. } => {
            if let Some(warning) = outcome.warning() {
                ui::render_warning(&warning);
            }
        }
        NotificationOutcome::NotRequested => {}
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .unwrap_or_else(|e| exit_with_error(format!("Failed to load configuration: {}", e)));

    // Create parent directory if it doesn't exist
    if let Some(parent) = config.data_path.parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            exit_with_error(format!("Failed to create data directory: {}", e))
        });
    }

    let classifier = if config.uses_default_model_path() {
        LinearModel::load_or_bundled(&config.model_path)
    } else {
        LinearModel::load(&config.model_path)
    };
    let classifier = classifier.unwrap_or_else(|e| {
        exit_with_error(format!(
            "Failed to load priority model (set model_path or TRIAGE_MODEL_PATH): {}",
            e
        ))
    });

    let service = TaskService::new(
        TaskRecordStore::new(CsvFileStorage::new(config.data_path.clone())),
        classifier,
        build_notifier(&config.smtp),
        SystemClock,
    );
    let today = SystemClock.today();

    let command = cli.command.unwrap_or(Commands::List {
        priority: None,
        json: false,
    });

    match command {
        Commands::Add {
            description,
            title,
            due,
            email,
        } => {
            let outcome = service
                .create_task(CreateTaskParameters {
                    title,
                    description,
                    due_date: due.unwrap_or(today),
                    email,
                })
                .unwrap_or_else(|e| exit_with_error(e));

            let record = &outcome.record;
            let analysis = Analysis {
                due_date: record.due_date,
                derived: record.derived(),
            };
            ui::render_analysis(&record.description, &analysis);
            report_outcome(&outcome, "saved");
        }
        Commands::Analyze { description, due } => {
            let analysis = service
                .analyze(&description, due.unwrap_or(today))
                .unwrap_or_else(|e| exit_with_error(e));
            ui::render_analysis(&description, &analysis);
        }
        Commands::List { priority, json } => {
            let filter = ListFilter { priority };
            let tasks = service
                .list_tasks(filter)
                .unwrap_or_else(|e| exit_with_error(e));

            if json {
                let output = serde_json::to_string_pretty(&tasks)
                    .unwrap_or_else(|e| exit_with_error(e));
                println!("{}", output);
            } else if tasks.is_empty() {
                match priority {
                    Some(p) => println!("No {} priority tasks", p),
                    None => println!("No tasks added yet"),
                }
            } else {
                let title = match priority {
                    Some(p) => format!("{} Priority", p),
                    None => "Task Dashboard".to_string(),
                };
                ui::render_dashboard(&title, &tasks, today);
            }
        }
        Commands::Show { id } => {
            let task = service
                .records()
                .resolve(&id)
                .unwrap_or_else(|e| exit_with_error(e));
            ui::render_task_detail(&task, today);
        }
        Commands::Edit {
            id,
            title,
            description,
            due,
            email,
        } => {
            let existing = service
                .records()
                .resolve(&id)
                .unwrap_or_else(|e| exit_with_error(e));

            let outcome = service
                .update_task(
                    existing.id,
                    UpdateTaskParameters {
                        title: title.or(existing.title),
                        description: description.unwrap_or(existing.description),
                        due_date: due.unwrap_or(existing.due_date),
                        email: email.or(existing.notify_email),
                    },
                )
                .unwrap_or_else(|e| exit_with_error(e));

            let record = &outcome.record;
            if existing.priority != record.priority {
                println!(
                    "Priority changed: {} → {}",
                    ui::colored_priority(existing.priority),
                    ui::colored_priority(record.priority)
                );
            }
            ui::render_task_detail(record, today);
            report_outcome(&outcome, "updated");
        }
        Commands::Delete { id } => {
            let task = service
                .records()
                .resolve(&id)
                .unwrap_or_else(|e| exit_with_error(e));
            let removed = service
                .delete_task(task.id)
                .unwrap_or_else(|e| exit_with_error(e));
            ui::render_success(&format!(
                "Deleted task {} ({})",
                removed.short_id(),
                removed.label()
            ));
        }
        Commands::Clear { yes } => {
            if !yes {
                exit_with_error("This deletes every task. Re-run with --yes to confirm.");
            }
            let removed = service.clear_tasks().unwrap_or_else(|e| exit_with_error(e));
            ui::render_success(&format!(
                "Deleted {} {}",
                removed,
                if removed == 1 { "task" } else { "tasks" }
            ));
        }
    }
}

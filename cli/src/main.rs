//! Command-line front end for the Habitica session manager.
//!
//! Builds one `SessionManager` from the environment, logs in, runs a single
//! command, and closes the session before exiting.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use habitica_core::{Config, SessionManager, TaskItem, TaskType, DEFAULT_TASK_FILTER};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "habitica", about = "Relay commands to the Habitica API", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and print the derived client id.
    Login,
    /// List tasks of the authenticated user.
    Todos {
        /// Task filter: todos, dailys, habits, rewards, completedTodos.
        #[arg(long = "type", default_value = DEFAULT_TASK_FILTER)]
        task_type: String,
    },
    /// Create a task.
    Create {
        text: String,
        #[arg(long = "type", value_enum, default_value_t = Kind::Todo)]
        kind: Kind,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        priority: f64,
        /// Tag UUID; repeat for several tags.
        #[arg(long = "tag")]
        tags: Vec<Uuid>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Habit,
    Daily,
    Todo,
    Reward,
}

impl From<Kind> for TaskType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Habit => TaskType::Habit,
            Kind::Daily => TaskType::Daily,
            Kind::Todo => TaskType::Todo,
            Kind::Reward => TaskType::Reward,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    habitica_core::logging::init(env!("CARGO_PKG_NAME"))?;

    let config = Config::from_env().context("loading Habitica configuration")?;
    let manager = SessionManager::new(config);

    let outcome = run(&manager, cli.command).await;
    manager.close_session();
    let value = outcome?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run(manager: &SessionManager, command: Command) -> Result<Value> {
    manager.fetch_credentials().await?;
    tracing::debug!(client_id = ?manager.client_id(), "credentials ready");

    let value = match command {
        Command::Login => serde_json::json!({
            "username": manager.username(),
            "clientId": manager.client_id(),
        }),
        Command::Todos { task_type } => manager.get_todos(&task_type).await?,
        Command::Create {
            text,
            kind,
            notes,
            priority,
            tags,
        } => {
            let mut task = TaskItem::new(text, kind.into());
            task.notes = notes;
            task.priority = priority;
            task.tags = tags;
            manager.create_todo(&task).await?
        }
    };
    Ok(value)
}

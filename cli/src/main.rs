//! Approval CLI - operate the letter approval workflow from a terminal

mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use approval::models::Action;
use approval::store::{self, Store};
use approval::workflow::{Notifier, RejectionNotice, Role, Workflow};

#[derive(Parser)]
#[command(name = "approval-cli")]
#[command(about = "Route letters through the approval chain")]
#[command(version)]
struct Cli {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:approval.db")]
    database_url: String,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// List recognized roles and the approval route
    Roles,

    /// Register an actor
    CreateActor {
        /// Display name
        name: String,
        /// Role, e.g. "Faculty Association" or "HOD"
        role: String,
    },

    /// List registered actors
    ListActors,

    /// Send a new letter along the approval route
    Send {
        /// ID of the sending actor
        sender_id: i64,
        title: String,
        body: String,
    },

    /// List steps waiting on a role
    ListPending {
        role: String,
    },

    /// List letters, newest first
    ListAll {
        /// Only letters this actor sent or acted on
        #[arg(long)]
        user_id: Option<i64>,
    },

    /// Approve, reject or comment on a letter
    Act {
        letter_id: i64,
        actor_id: i64,
        /// approve, reject or comment
        action: String,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long)]
        recommendations: Option<String>,
    },

    /// Show a letter and its steps
    Show {
        letter_id: i64,
    },

    /// Show the step-by-step history of a letter
    History {
        letter_id: i64,
    },

    /// Edit and resubmit a rejected letter
    Resend {
        letter_id: i64,
        sender_id: i64,
        title: String,
        body: String,
    },
}

/// Reports rejections on stderr so stdout stays parseable
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn on_reject(&self, notice: RejectionNotice) {
        eprintln!(
            "Notification: letter {} rejected; notifying user {}. Reason: {}",
            notice.letter_id, notice.sender_id, notice.reason
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "approval=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let pool = store::connect(&cli.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", cli.database_url))?;
    store::migrate(&pool).await?;
    tracing::debug!(database = %cli.database_url, "Schema up to date");

    let workflow = Workflow::new(Store::new(pool), Arc::new(ConsoleNotifier));
    let json = cli.json;

    match cli.command {
        Commands::Init => output(
            json,
            &init_report(&cli.database_url, workflow.default_route().roles()),
            || render::init(&cli.database_url, workflow.default_route().roles()),
        )?,
        Commands::Roles => output(
            json,
            &serde_json::json!({ "roles": Role::ALL, "route": workflow.default_route().roles() }),
            || render::roles(workflow.default_route().roles()),
        )?,
        Commands::CreateActor { name, role } => {
            let actor = workflow.create_actor(&name, &role).await?;
            output(json, &actor, || format!("Actor created with ID: {}", actor.id))?;
        }
        Commands::ListActors => {
            let actors = workflow.store().list_actors().await?;
            output(json, &actors, || render::actors(&actors))?;
        }
        Commands::Send {
            sender_id,
            title,
            body,
        } => {
            let id = workflow.send_letter(sender_id, &title, &body, None).await?;
            output(json, &serde_json::json!({ "id": id }), || {
                format!(
                    "Letter created with ID: {}\n\n{}",
                    id,
                    render::route(workflow.default_route().roles())
                )
            })?;
        }
        Commands::ListPending { role } => {
            let steps = workflow.list_pending_for_role(&role).await?;
            output(json, &steps, || render::pending(&role, &steps))?;
        }
        Commands::ListAll { user_id } => {
            let letters = workflow.list_all_letters(user_id).await?;
            output(json, &letters, || render::letters(&letters))?;
        }
        Commands::Act {
            letter_id,
            actor_id,
            action,
            comments,
            recommendations,
        } => {
            let action: Action = action.parse()?;
            let view = workflow
                .act_on_letter(
                    letter_id,
                    actor_id,
                    action,
                    comments.as_deref(),
                    recommendations.as_deref(),
                )
                .await?;
            output(json, &view, || render::act_outcome(&view))?;
        }
        Commands::Show { letter_id } => {
            let view = workflow.get_letter(letter_id).await?;
            output(json, &view, || render::letter(&view))?;
        }
        Commands::History { letter_id } => {
            let history = workflow.get_letter_history(letter_id).await?;
            output(json, &history, || render::history(letter_id, &history))?;
        }
        Commands::Resend {
            letter_id,
            sender_id,
            title,
            body,
        } => {
            workflow
                .resend_letter(letter_id, sender_id, &title, &body)
                .await?;
            output(
                json,
                &serde_json::json!({ "status": "resent", "letter_id": letter_id }),
                || format!("Letter {} resent for approval", letter_id),
            )?;
        }
    }

    Ok(())
}

fn init_report(database_url: &str, route: &[Role]) -> serde_json::Value {
    serde_json::json!({
        "status": "initialized",
        "database_url": database_url,
        "route": route,
    })
}

fn output<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

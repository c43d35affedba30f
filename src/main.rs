use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use flat_notify::db::{self, SqliteStore, UserStatus};
use flat_notify::dispatch::Notifier;
use flat_notify::model::{Category, ChannelSelection, NotificationPayload};
use flat_notify::transport::{HttpEmailTransport, HttpPushTransport};
use flat_notify::config;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deliver one notification to one user.
    Send {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        building: Option<i64>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "announcement")]
        category: String,
        #[arg(long)]
        urgent: bool,
        #[arg(long)]
        email: bool,
        #[arg(long)]
        push: bool,
    },
    /// Deliver one notification to every approved occupant of a building.
    Broadcast {
        #[arg(long)]
        building: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "announcement")]
        category: String,
        #[arg(long)]
        urgent: bool,
        #[arg(long)]
        email: bool,
        #[arg(long)]
        push: bool,
    },
    /// Print the unread record count for a user.
    Unread {
        #[arg(long)]
        user: i64,
    },
    /// Mark all of a user's records read; prints how many changed.
    MarkAllRead {
        #[arg(long)]
        user: i64,
    },
    /// Insert a user row (for local setup and demos).
    SeedUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        building: Option<i64>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        push_token: Option<String>,
        #[arg(long)]
        approved: bool,
    },
}

fn payload_from_args(
    title: String,
    message: String,
    category: &str,
    urgent: bool,
) -> Result<NotificationPayload> {
    let category =
        Category::parse(category).ok_or_else(|| anyhow!("unknown category: {category}"))?;
    let mut payload = NotificationPayload::new(title, message, category);
    if urgent {
        payload = payload.urgent();
    }
    Ok(payload)
}

fn selection(email: bool, push: bool) -> ChannelSelection {
    ChannelSelection {
        in_app: true,
        email,
        push,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/notify.db?mode=rwc", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let email = HttpEmailTransport::new(
        Url::parse(&cfg.email.endpoint).context("invalid email.endpoint")?,
        cfg.email.token.clone(),
        cfg.email.from.clone(),
    );
    let push = HttpPushTransport::new(
        Url::parse(&cfg.push.endpoint).context("invalid push.endpoint")?,
        cfg.push.token.clone(),
    );
    let notifier = Notifier::new(
        Arc::new(SqliteStore::new(pool.clone())),
        Arc::new(email),
        Arc::new(push),
    )
    .with_retry_policy(cfg.retry_policy())
    .with_broadcast_concurrency(cfg.app.broadcast_concurrency);

    match args.command {
        Command::Send {
            user,
            building,
            title,
            message,
            category,
            urgent,
            email,
            push,
        } => {
            let payload = payload_from_args(title, message, &category, urgent)?;
            let result = notifier
                .dispatch(user, building, &payload, selection(email, push))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Broadcast {
            building,
            title,
            message,
            category,
            urgent,
            email,
            push,
        } => {
            let payload = payload_from_args(title, message, &category, urgent)?;
            let result = notifier
                .broadcast(building, &payload, selection(email, push))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Unread { user } => {
            let count = notifier.unread_count(user).await?;
            println!("{count}");
        }
        Command::MarkAllRead { user } => {
            let changed = notifier.mark_all_as_read(user).await?;
            println!("{changed}");
        }
        Command::SeedUser {
            name,
            building,
            email,
            push_token,
            approved,
        } => {
            let status = if approved {
                UserStatus::Approved
            } else {
                UserStatus::Pending
            };
            let id = db::create_user(
                &pool,
                &name,
                building,
                email.as_deref(),
                push_token.as_deref(),
                status,
            )
            .await?;
            info!(id, "user created");
            println!("{id}");
        }
    }

    Ok(())
}

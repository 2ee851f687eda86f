//! Mindwatch CLI - Terminal front end for the monitoring dashboards.
//!
//! # Usage
//!
//! ```bash
//! # Log in (password from -p or MINDWATCH_PASSWORD)
//! mw login -u DR-001
//!
//! # Follow the psychiatrist dashboard until Ctrl-C
//! mw watch psychiatrist
//!
//! # Print the admin overview once, filtered by name or ID
//! mw watch admin --search somchai --once
//!
//! # Post a message as the logged-in patient
//! mw analyze -m "วันนี้รู้สึกดีขึ้นมาก"
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` / `register` - Session management
//! - `watch` - Live dashboard summaries
//! - `analyze` / `simulate` / `history` - Posting and analysis history
//! - `patients add`, `users delete`, `notifications read` - Management actions
//! - `report red-cases` - Red-case table with average and critical count
//! - `health` - Backend status

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mindwatch_console::ConsoleConfig;
use mindwatch_core::Role;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Context;

#[derive(Parser)]
#[command(name = "mw")]
#[command(author, version, about = "Mindwatch monitoring console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// User ID (its prefix decides the dashboard)
        #[arg(short, long)]
        user: String,

        /// Password
        #[arg(short, long, env = "MINDWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user, role and dashboard route
    Whoami,
    /// Register a new patient account
    Register {
        #[command(flatten)]
        account: AccountArgs,

        /// Password
        #[arg(short, long, env = "MINDWATCH_PASSWORD", hide_env_values = true)]
        password: String,

        /// Log in straight after registering
        #[arg(long)]
        login: bool,
    },
    /// Manage the patient roster (therapist)
    Patients {
        #[command(subcommand)]
        action: PatientAction,
    },
    /// Follow a dashboard and print its summary on every update
    Watch {
        /// Dashboard to open
        dashboard: DashboardArg,

        /// Filter the user or patient list by name or ID
        #[arg(short, long)]
        search: Option<String>,

        /// Fetch once, print and exit
        #[arg(long)]
        once: bool,
    },
    /// Analyse a message and/or an image
    Analyze {
        /// Message text
        #[arg(short, long)]
        message: Option<String>,

        /// Image file
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Post sample messages to the patient feed
    Simulate {
        /// Number of posts
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
    /// Show a user's analysis history
    History {
        /// User ID
        user: String,
    },
    /// Manage user accounts (admin)
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage notifications (psychiatrist)
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
    /// Print reports
    Report {
        #[command(subcommand)]
        target: ReportTarget,
    },
    /// Check backend status
    Health,
}

/// Profile fields shared by `register` and `patients add`.
#[derive(clap::Args)]
struct AccountArgs {
    /// User ID
    #[arg(short, long)]
    user: String,

    /// Display name
    #[arg(short, long)]
    name: String,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    medical_history: Option<String>,

    #[arg(long)]
    social_media_handle: Option<String>,
}

#[derive(Subcommand)]
enum PatientAction {
    /// Enrol a patient
    Add {
        #[command(flatten)]
        account: AccountArgs,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Delete a user account
    Delete {
        /// User ID
        id: String,
    },
}

#[derive(Subcommand)]
enum NotificationAction {
    /// Mark a notification read
    Read {
        /// Notification ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum ReportTarget {
    /// Current red cases with average score and critical count
    RedCases,
}

#[derive(Clone, Copy, ValueEnum)]
enum DashboardArg {
    Admin,
    Patient,
    Therapist,
    Psychiatrist,
}

impl From<DashboardArg> for Role {
    fn from(arg: DashboardArg) -> Self {
        match arg {
            DashboardArg::Admin => Self::Admin,
            DashboardArg::Patient => Self::Patient,
            DashboardArg::Therapist => Self::Therapist,
            DashboardArg::Psychiatrist => Self::Psychiatrist,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ConsoleConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            // Posts and histories carry health data
            send_default_pii: false,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing levels to Sentry events and breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mindwatch=info,mw=info".into());

    // Logs go to stderr so command output stays pipeable
    let json = std::env::var_os("MINDWATCH_LOG_JSON").is_some();
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = ConsoleConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ConsoleConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::from_config(config)?;

    match cli.command {
        Commands::Login { user, password } => {
            commands::auth::login(&ctx, &user, password).await?;
        }
        Commands::Logout => commands::auth::logout(&ctx)?,
        Commands::Whoami => commands::auth::whoami(&ctx)?,
        Commands::Register {
            account,
            password,
            login,
        } => {
            commands::auth::register(&ctx, account.into_profile(), password, login).await?;
        }
        Commands::Patients { action } => match action {
            PatientAction::Add { account } => {
                commands::manage::add_patient(&ctx, account.into_profile()).await?;
            }
        },
        Commands::Watch {
            dashboard,
            search,
            once,
        } => {
            commands::watch::run(&ctx, dashboard.into(), search.as_deref(), once).await?;
        }
        Commands::Analyze { message, image } => {
            commands::feed::analyze(&ctx, message.as_deref(), image.as_deref()).await?;
        }
        Commands::Simulate { count } => commands::feed::simulate(&ctx, count).await?,
        Commands::History { user } => commands::feed::history(&ctx, &user).await?,
        Commands::Users { action } => match action {
            UserAction::Delete { id } => commands::manage::delete_user(&ctx, &id).await?,
        },
        Commands::Notifications { action } => match action {
            NotificationAction::Read { id } => {
                commands::manage::mark_read(&ctx, id).await?;
            }
        },
        Commands::Report { target } => match target {
            ReportTarget::RedCases => commands::manage::red_case_report(&ctx).await?,
        },
        Commands::Health => commands::manage::health(&ctx).await?,
    }
    Ok(())
}

impl AccountArgs {
    fn into_profile(self) -> commands::Account {
        commands::Account {
            user_id: self.user,
            profile: mindwatch_console::api::PatientProfile {
                name: self.name,
                age: self.age,
                gender: self.gender,
                medical_history: self.medical_history,
                social_media_handle: self.social_media_handle,
            },
        }
    }
}

//! AutoHome authorization admin tool
//!
//! Prepares the database the broker plugin reads and runs the same checks the
//! broker would, without a broker.

use anyhow::{bail, Context as _, Result};
use autohome_auth::acl::AccessKind;
use autohome_auth::config::{OPT_DB_FILE, OPT_GUEST_SECRET, OPT_SUPERUSER};
use autohome_auth::{AuthConfig, AuthPlugin};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// AutoHome authorization plugin admin tool
#[derive(Parser, Debug)]
#[command(name = "autohome-auth")]
#[command(version)]
#[command(about = "Manage and test the AutoHome MQTT authorization database", long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long)]
    db_file: Option<PathBuf>,

    /// Superuser name
    #[arg(long)]
    superuser: Option<String>,

    /// Guest secret
    #[arg(long)]
    guest_secret: Option<String>,

    /// Configuration file path (JSON), used instead of the options above
    #[arg(short, long, conflicts_with = "db_file")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create missing tables
    Init,

    /// Add or update the superuser's profile and credentials
    SetSuperuser {
        /// Superuser password
        #[arg(long)]
        password: String,
    },

    /// Check a username/password pair
    CheckPassword {
        #[arg(long)]
        username: String,

        /// Omit to check a connection without password
        #[arg(long)]
        password: Option<String>,
    },

    /// Check topic access
    CheckAcl {
        #[arg(long)]
        client_id: String,

        #[arg(long)]
        username: String,

        #[arg(long)]
        topic: String,

        /// Check write access instead of read access
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    let config = load_config(&args)?;
    let mut plugin = AuthPlugin::new();
    plugin
        .init(options(&config))
        .with_context(|| format!("Failed to open {}", config.db_file.display()))?;

    let result = run(&plugin, &config, &args.command);

    if let Err(e) = plugin.cleanup() {
        tracing::warn!(error = %e, "Cleanup failed");
    }

    result
}

fn run(plugin: &AuthPlugin, config: &AuthConfig, command: &Command) -> Result<ExitCode> {
    let Some(context) = plugin.context() else {
        bail!("plugin is not ready");
    };

    match command {
        Command::Init => {
            info!(outcome = ?context.schema_outcome(), "Database ready");
            Ok(ExitCode::SUCCESS)
        }
        Command::SetSuperuser { password } => {
            let Some(superuser) = config.superuser.as_deref() else {
                bail!("--superuser (or \"superuser\" in the config file) is required");
            };
            let written = context.store().ensure_superuser(superuser, password)?;
            info!(superuser = %superuser, updated = written, "Superuser credentials checked");
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckPassword { username, password } => {
            let result = plugin.unpwd_check(
                Some(username.as_str()),
                password.as_deref().map(str::as_bytes),
            )?;
            println!(
                "{}: {}",
                if result.authenticated { "allow" } else { "deny" },
                result.reason.unwrap_or(if result.guest { "guest" } else { "registered user" })
            );
            Ok(exit_code(result.authenticated))
        }
        Command::CheckAcl {
            client_id,
            username,
            topic,
            write,
        } => {
            let access = if *write { AccessKind::Write } else { AccessKind::Read };
            let decision = plugin.acl_check(
                Some(client_id.as_str()),
                Some(username.as_str()),
                Some(topic.as_str()),
                access,
            )?;
            println!(
                "{}: {}",
                if decision.allowed { "allow" } else { "deny" },
                decision.reason
            );
            Ok(exit_code(decision.allowed))
        }
    }
}

fn load_config(args: &Args) -> Result<AuthConfig> {
    if let Some(config_path) = &args.config {
        info!(path = %config_path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(config_path)?;
        return Ok(serde_json::from_str(&content)?);
    }

    let Some(db_file) = &args.db_file else {
        bail!("either --db-file or --config is required");
    };

    Ok(AuthConfig {
        db_file: db_file.clone(),
        superuser: args.superuser.clone(),
        guest_secret: args.guest_secret.clone(),
    })
}

/// The same key/value list the broker would pass.
fn options(config: &AuthConfig) -> Vec<(&'static str, String)> {
    let mut options = vec![(OPT_DB_FILE, config.db_file.display().to_string())];
    if let Some(superuser) = &config.superuser {
        options.push((OPT_SUPERUSER, superuser.clone()));
    }
    if let Some(secret) = &config.guest_secret {
        options.push((OPT_GUEST_SECRET, secret.clone()));
    }
    options
}

fn exit_code(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

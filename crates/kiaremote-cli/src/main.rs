//! kiaremote - issue remote commands to a Kia vehicle through the owners
//! portal, reusing cached sessions and enforcing a per-account quota.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kiaremote_core::{
    CommandDispatcher, CommandParams, Config, Credentials, CredentialStore, FileBackend,
    HttpTransport, Keychain, Outcome,
};

/// Environment variable consulted when `--password` is not given
const ENV_PASSWORD: &str = "KIAREMOTE_PASSWORD";

const LOG_FILE_PREFIX: &str = "kiaremote.log";

// Exit codes
const EXIT_RATE_LIMITED: u8 = 2;
const EXIT_DAILY_LIMIT: u8 = 3;

#[derive(Parser)]
#[command(name = "kiaremote", version, about = "Remote commands for Kia vehicles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one command: 1 lock, 2 unlock, 3 climate, 5 status, 6 location
    Run {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long = "command")]
        code: String,
        /// Target cabin temperature (climate only)
        #[arg(long)]
        temp: Option<String>,
        /// Defrost on/off (climate only)
        #[arg(long)]
        defrost: Option<String>,
    },
    /// List cached sessions (no secrets)
    Sessions,
    /// Drop sessions idle for more than the given number of days
    Prune {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Store the session-store encryption secret in the OS keychain
    SetKey {
        /// Remove the stored secret instead
        #[arg(long)]
        delete: bool,
    },
    /// Write a default config file if none exists and print its path
    Config,
}

/// Initialize the tracing subscriber: stderr plus a daily log file.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(config: &Config) -> Result<WorkerGuard> {
    // RUST_LOG overrides, e.g. RUST_LOG=kiaremote_core=debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kiaremote=info,kiaremote_core=info"));

    let log_dir = config.log_dir().context("Failed to resolve log directory")?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let _guard = init_tracing(&config)?;

    match cli.command {
        Commands::Run {
            username,
            password,
            code,
            temp,
            defrost,
        } => {
            let password = resolve_password(password)?;
            let params = CommandParams { temp, defrost };
            run(&config, Credentials::new(username, password), &code, &params).await
        }
        Commands::Sessions => list_sessions(&config).map(|_| ExitCode::SUCCESS),
        Commands::Prune { days } => prune(&config, days).map(|_| ExitCode::SUCCESS),
        Commands::SetKey { delete } => set_key(delete).map(|_| ExitCode::SUCCESS),
        Commands::Config => write_config().map(|_| ExitCode::SUCCESS),
    }
}

fn resolve_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

fn open_store(config: &Config) -> Result<Arc<CredentialStore>> {
    let cipher = config.cipher().context("Failed to initialize store encryption")?;
    let path = config.store_path().context("Failed to resolve store path")?;
    let backend = FileBackend::new(path);
    debug!(path = %backend.path().display(), "Opening session store");
    Ok(Arc::new(CredentialStore::new(Box::new(backend), cipher)))
}

async fn run(
    config: &Config,
    credentials: Credentials,
    code: &str,
    params: &CommandParams,
) -> Result<ExitCode> {
    let store = open_store(config)?;
    let transport = Arc::new(
        HttpTransport::new(config.request_timeout()).context("Failed to build HTTP client")?,
    );
    let dispatcher = CommandDispatcher::new(transport, store, config);

    let outcome = match dispatcher.dispatch_code(&credentials, code, params).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Dispatch failed");
            return Err(e).context("Command failed");
        }
    };

    let code = match outcome {
        Outcome::Successful | Outcome::Location(_) => {
            println!("{}", outcome);
            ExitCode::SUCCESS
        }
        Outcome::RateLimited => {
            println!("{}", outcome);
            ExitCode::from(EXIT_RATE_LIMITED)
        }
        Outcome::DailyLimitReached => ExitCode::from(EXIT_DAILY_LIMIT),
        Outcome::Failed => ExitCode::FAILURE,
    };
    Ok(code)
}

fn list_sessions(config: &Config) -> Result<()> {
    let summaries = open_store(config)?
        .summaries()
        .context("Failed to read session store")?;

    if summaries.is_empty() {
        println!("No cached sessions");
        return Ok(());
    }

    println!(
        "{:<14} {:<8} {:>7} {:>8}  {:<20} {:<20}",
        "IDENTITY", "SESSION", "COOKIES", "COMMANDS", "AUTHENTICATED", "LAST COMMAND"
    );
    for summary in summaries {
        println!(
            "{:<14} {:<8} {:>7} {:>8}  {:<20} {:<20}",
            summary.identity,
            if summary.has_session { "yes" } else { "no" },
            summary.cookie_count,
            summary.command_count,
            format_time(summary.authenticated_at),
            format_time(summary.last_command_at),
        );
    }
    Ok(())
}

fn format_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn prune(config: &Config, days: u32) -> Result<()> {
    let removed = open_store(config)?
        .prune_idle(chrono::Duration::days(i64::from(days)), chrono::Utc::now())
        .context("Failed to prune session store")?;
    info!(removed, days, "Pruned idle sessions");
    println!("Removed {} idle session(s)", removed);
    Ok(())
}

fn set_key(delete: bool) -> Result<()> {
    if delete {
        Keychain::delete_secret().context("Failed to delete secret")?;
        println!("Encryption secret removed from the OS keychain");
        return Ok(());
    }
    let secret = rpassword::prompt_password("Encryption secret: ")
        .context("Failed to read secret")?;
    if secret.is_empty() {
        bail!("Encryption secret must not be empty");
    }
    let confirm = rpassword::prompt_password("Confirm secret: ")
        .context("Failed to read secret")?;
    if secret != confirm {
        bail!("Secrets do not match");
    }
    Keychain::store_secret(&secret).context("Failed to store secret")?;
    println!("Encryption secret stored in the OS keychain");
    Ok(())
}

/// Environment overrides are not persisted; the file gets plain defaults.
fn write_config() -> Result<()> {
    let path = Config::config_path().context("Failed to resolve config path")?;
    if !path.exists() {
        Config::default().save().context("Failed to write config file")?;
        info!(path = %path.display(), "Wrote default config");
    }
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "kiaremote", "run", "--username", "alice", "--command", "3", "--temp", "72",
            "--defrost", "true",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                username,
                password,
                code,
                temp,
                defrost,
            } => {
                assert_eq!(username, "alice");
                assert!(password.is_none());
                assert_eq!(code, "3");
                assert_eq!(temp.as_deref(), Some("72"));
                assert_eq!(defrost.as_deref(), Some("true"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_prune_default() {
        let cli = Cli::try_parse_from(["kiaremote", "prune"]).unwrap();
        assert!(matches!(cli.command, Commands::Prune { days: 30 }));
    }

    #[test]
    fn test_parse_set_key_delete() {
        let cli = Cli::try_parse_from(["kiaremote", "set-key", "--delete"]).unwrap();
        assert!(matches!(cli.command, Commands::SetKey { delete: true }));
    }

    #[test]
    fn test_run_requires_username() {
        assert!(Cli::try_parse_from(["kiaremote", "run", "--command", "1"]).is_err());
    }

    #[test]
    fn test_password_flag_wins() {
        assert_eq!(resolve_password(Some("pw".into())).unwrap(), "pw");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "-");
        let t = chrono::DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(format_time(Some(t)), "2024-05-01 08:30:00");
    }
}

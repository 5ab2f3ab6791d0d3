use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use namecom_ddns::config::Settings;
use namecom_ddns::daemon::{self, build_reconcilers};
use namecom_ddns::ip::{IpLookup, MirrorResolver};
use namecom_ddns::secrets::CredentialStore;

#[derive(Parser)]
#[command(name = "namecom-ddns")]
#[command(about = "Keeps Name.com A records pointed at this host's public IPv4 address")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append log output to this file instead of stdout
    #[arg(short, long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update worker per configured domain until stopped
    Daemon,

    /// Show the external IP and which records are out of date, without changing anything
    Check,

    /// Store Name.com API credentials for a domain
    SetKey {
        /// Domain the credentials belong to (e.g., example.com)
        domain: String,
    },

    /// Delete stored Name.com API credentials for a domain
    DeleteKey {
        /// Domain the credentials belong to (e.g., example.com)
        domain: String,
    },

    /// Show configuration file location and effective settings
    Config,
}

fn init_logging(log_level: &str, log_file: Option<File>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let (stdout_layer, file_layer) = match log_file {
        Some(file) => (
            None,
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        ),
        None => (Some(fmt::layer()), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file: {}", path.display()))
}

/// Credentials live next to the config file.
fn config_dir(cli_path: Option<&Path>) -> PathBuf {
    match cli_path.and_then(Path::parent) {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
        Some(parent) => parent.to_path_buf(),
        None => Settings::config_dir(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = cli.log.as_deref().map(open_log).transpose()?;
    let settings = Settings::load(cli.config.as_deref());

    // Initialize logging with config level or default
    let log_level = settings
        .as_ref()
        .map(|s| s.daemon.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&log_level, log_file);

    let config_dir = config_dir(cli.config.as_deref());
    let store = CredentialStore::new(config_dir.join("credentials.toml"));

    match cli.command {
        Commands::Daemon => {
            let settings = settings?;
            info!("Starting namecom-ddns daemon");
            daemon::run(settings, &config_dir).await?;
        }

        Commands::Check => {
            check_status(settings?, &store).await?;
        }

        Commands::SetKey { domain } => {
            use std::io::{self, Write};

            print!("Username: ");
            io::stdout().flush()?;
            let mut username = String::new();
            io::stdin().read_line(&mut username)?;
            let username = username.trim();

            let token = rpassword::prompt_password("API Token: ")?;

            store.store(&domain, username, token.trim())?;
            println!("Credentials stored for domain: {}", domain);
        }

        Commands::DeleteKey { domain } => {
            store.delete(&domain)?;
            println!("Credentials deleted for domain: {}", domain);
        }

        Commands::Config => {
            show_config(cli.config.as_deref(), settings.ok())?;
        }
    }

    Ok(())
}

async fn check_status(settings: Settings, store: &CredentialStore) -> Result<()> {
    let ip: Arc<dyn IpLookup> = Arc::new(MirrorResolver::new(settings.daemon.ip_mirrors.clone())?);
    let reconcilers = build_reconcilers(&settings, store, ip)?;

    for reconciler in &reconcilers {
        println!("{}:", reconciler.domain());

        match reconciler.preview().await {
            Ok((ip, plan)) => {
                println!("  External IP: {}", ip);
                println!("  Up to date: {}", plan.converged);
                for record in &plan.stale {
                    println!(
                        "  Stale: {} (id {}) -> {}",
                        record.fqdn,
                        record.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
                        record.answer
                    );
                }
                for record in &plan.missing {
                    println!("  Missing: {} -> {}", record.fqdn, record.answer);
                }
                if plan.is_converged() {
                    println!("  Nothing to do");
                }
            }
            Err(e) => println!("  Error - {}", e),
        }
    }

    Ok(())
}

fn show_config(cli_path: Option<&Path>, settings: Option<Settings>) -> Result<()> {
    let config_path = cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::config_path);

    println!("Configuration file location: {}\n", config_path.display());

    match settings {
        Some(mut s) => {
            for entry in &mut s.domains {
                if entry.token.is_some() {
                    entry.token = Some("********".to_string());
                }
            }
            println!("Current configuration:\n");
            println!("{}", toml::to_string_pretty(&s)?);
        }
        None => {
            println!("Configuration could not be loaded.");
            println!("\nCreate a configuration file at the location above, or set NAME_DOMAIN,");
            println!("NAME_HOSTNAMES, NAME_INTERVAL, NAME_USER, NAME_TOKEN and NAME_DEV_MODE.");
            println!("Example configuration:\n");
            println!(
                r#"[daemon]
interval_seconds = 300
log_level = "info"
ip_mirrors = ["http://myexternalip.com/raw", "https://api.ipify.org"]

[daemon.retry]
strategy = "exponential"
max_seconds = 3600

[[domains]]
domain = "example.com"
hostnames = ["", "www"]
"#
            );
        }
    }

    Ok(())
}

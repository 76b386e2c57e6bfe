use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use play_publisher::api::Track;
use play_publisher::config::{self, Config};
use play_publisher::types::{AccountConfig, PublishError};
use play_publisher::auth::credential_source;
use play_publisher::{build_client, session_from_config};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "PLAY_PUBLISHER_LOG";

#[derive(Parser, Debug)]
#[command(name = "play-publisher", version)]
#[command(about = "Service account checks and edit transactions for the Google Play Developer API")]
struct Cli {
    /// Path to a config file (default: nearest .play-publisher.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Application package name, e.g. com.example.app
    #[arg(long, global = true)]
    app_id: Option<String>,

    /// Service account JSON key. Takes precedence over --pk12-file.
    #[arg(long, global = true)]
    json_file: Option<PathBuf>,

    /// Service account PKCS12 key archive (requires --service-account-email)
    #[arg(long, global = true)]
    pk12_file: Option<PathBuf>,

    /// Service account email used with --pk12-file
    #[arg(long, global = true)]
    service_account_email: Option<String>,

    /// Publishing API base URL (default: https://androidpublisher.googleapis.com)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// OAuth2 token endpoint override
    #[arg(long, global = true)]
    token_uri: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve credentials without contacting Google and print what was found.
    Doctor,
    /// Open an edit, validate it, then discard it.
    Validate,
    /// List tracks and their releases.
    Tracks,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = effective_config(&cli)?;

    match cli.cmd {
        Commands::Doctor => run_doctor(&config)?,
        Commands::Validate => run_validate(&config)?,
        Commands::Tracks => run_tracks(&config)?,
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// File configuration with command-line flags layered on top.
fn effective_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().context("failed to determine current directory")?;
            config::find_config(&cwd)
        }
    };
    let file_config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            config::load_config_from_file(&path)?
        }
        None => Config::default(),
    };

    let mut overrides = Config::new().with_account(cli_account(cli));
    if let Some(app_id) = &cli.app_id {
        overrides = overrides.with_application_id(app_id.clone());
    }
    if let Some(api_base) = &cli.api_base {
        overrides = overrides.with_api_base(api_base.clone());
    }
    if let Some(token_uri) = &cli.token_uri {
        overrides = overrides.with_token_uri(token_uri.clone());
    }

    Ok(file_config.merge(&overrides))
}

fn cli_account(cli: &Cli) -> AccountConfig {
    let mut account = AccountConfig::default();
    if let Some(path) = &cli.json_file {
        account = account.with_json_file(path.clone());
    }
    if let Some(path) = &cli.pk12_file {
        account = account.with_pk12_file(path.clone());
    }
    if let Some(email) = &cli.service_account_email {
        account = account.with_service_account_email(email.clone());
    }
    account
}

fn run_doctor(config: &Config) -> Result<()> {
    let endpoints = config.endpoints();
    println!("application_id: {}", config.application_id().unwrap_or("<unset>"));
    println!("api_base: {}", endpoints.api_base);
    println!("abandon_policy: {}", config.abandon_policy());
    match credential_source(config.account()) {
        Some(source) => println!("credential_source: {source}"),
        None => println!("credential_source: <none>"),
    }

    let client = build_client(config.account(), &endpoints)?;
    let credential = client.credential();
    println!("client_email: {}", credential.client_email());
    println!("key_id: {}", credential.key_id().unwrap_or("<none>"));
    println!("token_uri: {}", credential.token_uri());
    println!("scopes: {}", credential.scopes().join(" "));

    Ok(())
}

fn run_validate(config: &Config) -> Result<()> {
    let session = session_from_config(config)?;
    let edit = session.open_and_read(|edit| edit.api().validate_edit(edit.application_id(), edit.id()))?;

    println!("application_id: {}", session.application_id());
    println!("edit {}: valid", edit.id);

    Ok(())
}

fn run_tracks(config: &Config) -> Result<()> {
    let session = session_from_config(config)?;
    let tracks = session.open_and_read(|edit| -> Result<Vec<Track>, PublishError> {
        edit.api().list_tracks(edit.application_id(), edit.id())
    })?;

    println!("application_id: {}", session.application_id());
    println!();
    print_tracks(&tracks);

    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    for track in tracks {
        println!("{}", track.track);
        if track.releases.is_empty() {
            println!("  (no releases)");
        }
        for release in &track.releases {
            let name = release.name.as_deref().unwrap_or("<unnamed>");
            let status = release.status.as_deref().unwrap_or("unknown");
            let codes = if release.version_codes.is_empty() {
                "-".to_string()
            } else {
                release.version_codes.join(",")
            };
            match release.user_fraction {
                Some(fraction) => println!("  {name}: {status} (versions={codes}, fraction={fraction})"),
                None => println!("  {name}: {status} (versions={codes})"),
            }
        }
    }
}

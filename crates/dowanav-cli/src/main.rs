//! dowanav - command-line host for the DOWA navigation session.
//!
//! Logs in against the navigation backend, keeps the session on disk (or in
//! the OS keychain) and issues authenticated calls with automatic token
//! refresh.

mod app;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dowanav_core::{Config, StorageKind};
use reqwest::Method;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AuthStatus};

#[derive(Parser)]
#[command(name = "dowanav", version, about = "DOWA navigation session client")]
struct Cli {
    /// Backend origin, e.g. http://127.0.0.1:8188
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Keep the session in memory only and do not write the config
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long, short)]
        username: Option<String>,
    },
    /// Close the session on the server and forget it locally
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show the navigation extension status
    Status,
    /// GET an endpoint under /api/navigation
    Get { endpoint: String },
    /// POST a JSON body to an endpoint under /api/navigation
    Post { endpoint: String, body: String },
    /// PUT a JSON body to an endpoint under /api/navigation
    Put { endpoint: String, body: String },
    /// DELETE an endpoint under /api/navigation
    Delete { endpoint: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "dowanav.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (mut config, config_err) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env();
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if cli.ephemeral {
        config.storage = StorageKind::Memory;
    }

    let _guard = init_tracing(config.log_dir.as_deref());
    if let Some(e) = config_err {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(base_url = %config.base_url, "dowanav starting");

    let mut app = if cli.ephemeral {
        App::ephemeral(config)?
    } else {
        App::new(config)?
    };

    match cli.command {
        Command::Login { username } => {
            if app.is_authenticated() {
                info!("Replacing existing session");
            }
            let user = app.login_interactive(username).await?;
            println!("Logged in as {}", user.name());
        }
        Command::Logout => {
            app.logout().await;
            println!("Logged out");
        }
        Command::Whoami => match app.check_auth_status().await {
            AuthStatus::Authenticated(user) => {
                println!("{}", user.name());
                if let Some(ref email) = user.email {
                    println!("  email: {}", email);
                }
                if let Some(ref role) = user.role {
                    println!("  role:  {}", role);
                }
            }
            AuthStatus::Unauthenticated => {
                anyhow::bail!("Not logged in");
            }
        },
        Command::Status => {
            let status = app.navigation_status().await?;
            println!("{} (version {})", status.status, status.version);
            for feature in &status.features {
                println!("  - {}", feature);
            }
        }
        Command::Get { endpoint } => call(&app, Method::GET, &endpoint, None).await?,
        Command::Post { endpoint, body } => call(&app, Method::POST, &endpoint, Some(&body)).await?,
        Command::Put { endpoint, body } => call(&app, Method::PUT, &endpoint, Some(&body)).await?,
        Command::Delete { endpoint } => call(&app, Method::DELETE, &endpoint, None).await?,
    }

    Ok(())
}

async fn call(app: &App, method: Method, endpoint: &str, body: Option<&str>) -> Result<()> {
    let body: Option<serde_json::Value> = body
        .map(serde_json::from_str)
        .transpose()
        .context("Request body is not valid JSON")?;

    let (status, text) = app.call(method, endpoint, body.as_ref()).await?;
    eprintln!("{}", status);

    // Pretty-print JSON bodies, pass anything else through
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) if text.is_empty() => {}
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        anyhow::bail!("Request failed with status {}", status);
    }
    Ok(())
}

//! Poll server entrypoint.

use quickpoll_server::{
    auth, config::Config, db::Database, serve_router, AppState, TokenService, DEFAULT_PORT,
};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
    rotate_key: bool,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" => flags.help = true,
            "--rotate-key" => flags.rotate_key = true,
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

fn runs_maintenance_mode(flags: CliFlags) -> bool {
    flags.rotate_key
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickpoll=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_flags = parse_cli_flags(&args)?;

    if cli_flags.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let key_dir = Path::new(&config.key_path);

    if cli_flags.rotate_key {
        auth::rotate_key(key_dir, &config.key_name)?;
        println!(
            "Signing key rotated at {}; existing sessions must log in again",
            auth::key_file_path(key_dir, &config.key_name).display()
        );
    }

    if runs_maintenance_mode(cli_flags) {
        return Ok(());
    }

    let database = Database::with_options(&config.db_path, config.store_options())?;
    let key = auth::load_or_create_key(key_dir, &config.key_name)?;
    let state = AppState::new(config.clone(), database, TokenService::new(&key));

    let allow_public = quickpoll_server::config::env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }
    if config.signup_secret.is_none() {
        tracing::warn!("SIGNUP_SECRET is not set - anyone can create an account");
    }

    let bind_addr = quickpoll_server::resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("quickpoll running at http://{}", actual_addr);

    serve_router(listener, state, allow_public, shutdown_signal()).await?;
    tracing::info!("quickpoll stopped");

    Ok(())
}

fn print_help() {
    println!("quickpoll server\n");
    println!("Usage: quickpoll [OPTIONS]\n");
    println!("Options:");
    println!("  --rotate-key      Replace the token signing key and exit");
    println!("  --help            Show this help message");
    println!("\nEnvironment variables:");
    println!("  DB_PATH           Store file path (default: ~/.cache/quickpoll/polls.redb)");
    println!(
        "  PORT              Server port (default: {})",
        DEFAULT_PORT
    );
    println!("  MAX_BODY_SIZE     Maximum poll request body in bytes (default: 4096)");
    println!("  KEY_PATH          Signing key directory (default: ./.keys)");
    println!("  KEY_NAME          Signing key base name (default: quickpoll)");
    println!("  SIGNUP_SECRET     Secret required to sign up (default: open signup)");
    println!("  REQUIRE_POLL_OPTIONS  Reject polls created without options");
    println!("  BCRYPT_COST       Password hash cost, 4-31 (default: 13)");
    println!("  ALLOW_PUBLIC_ACCESS  Allow CORS from any origin");
    println!(
        "  BIND              Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

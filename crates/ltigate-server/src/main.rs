use std::{env, path::PathBuf, sync::Arc, time::Duration};

use ltigate_auth::{InMemoryNonceStore, LaunchValidator};
use ltigate_server::hooks::LoggingLaunchHandler;
use ltigate_server::{AppState, load_config, router};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From LTIGATE_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (ltigate.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (LTIGATE_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Interval between background nonce-expiry sweeps.
const NONCE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present; it is optional.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    ltigate_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(
        path = %config_path
            .as_deref()
            .map_or_else(|| "ltigate.toml".to_string(), |p| p.display().to_string()),
        source = %source,
        consumers = cfg.consumers.len(),
        "Configuration loaded"
    );

    let nonces = Arc::new(InMemoryNonceStore::new());
    let validator = Arc::new(
        LaunchValidator::new(
            Arc::new(cfg.consumer_store()),
            nonces,
            Arc::new(LoggingLaunchHandler),
        )
        .with_config(cfg.validation.validator_config()),
    );

    // Periodic nonce-expiry sweep; foreground validations never wait on it.
    let sweeper = Arc::clone(&validator);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(NONCE_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            match sweeper.sweep_nonces().await {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(removed, "swept expired nonces");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "nonce sweep failed"),
            }
        }
    });

    let app = router(AppState::new(validator));
    let addr = format!("{}:{}", cfg.http.host, cfg.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "ltigate listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Resolves the configuration path from CLI args, the environment, or the
/// default file.
fn resolve_config_path() -> (Option<PathBuf>, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (Some(PathBuf::from(path)), ConfigSource::CliArgument);
            }
        }
    }
    if let Ok(path) = env::var("LTIGATE_CONFIG") {
        return (Some(PathBuf::from(path)), ConfigSource::EnvironmentVariable);
    }
    (None, ConfigSource::Default)
}

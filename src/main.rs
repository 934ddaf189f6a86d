use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yt_scout::adapters::{FilePublisher, GistPublisher, Publisher};
use yt_scout::cli::{self, Cli, Commands};
use yt_scout::config::{AppConfig, LoggingConfig};
use yt_scout::error::{Result, ScoutError};
use yt_scout::services::PipelineService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Extract {
            source,
            snapshot,
            last_updated,
            fee_rate,
        }) => {
            init_logging_simple();
            cli::extract_snapshot(*source, snapshot, *last_updated, *fee_rate).await?;
        }
        Some(Commands::Xsol { output }) => {
            init_logging_simple();
            let config = load_config(&cli)?;
            let output = output
                .as_deref()
                .or_else(|| config.publish.xsol_output_path.as_deref().map(Path::new));
            cli::show_xsol_metrics(&config.xsol, output).await?;
        }
        Some(Commands::Once) => {
            let config = load_config(&cli)?;
            init_logging(&config.logging);
            let service = build_pipeline(&config);
            let result = service.run_once().await?;
            info!("Pass complete: {} assets", result.assets_count);
        }
        Some(Commands::Run) | None => {
            let config = load_config(&cli)?;
            init_logging(&config.logging);
            run_pipeline(&config).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config = AppConfig::load_from(&cli.config)?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("config: {e}");
        }
        return Err(ScoutError::InvalidConfig(errors.join("; ")));
    }
    Ok(config)
}

fn build_pipeline(config: &AppConfig) -> PipelineService {
    let mut publishers: Vec<Arc<dyn Publisher>> = vec![Arc::new(FilePublisher::new(&config.publish.output_path))];
    if let Some(gist) = GistPublisher::from_env(config.publish.gist_id.as_deref(), &config.publish.gist_filename) {
        publishers.push(Arc::new(gist));
    } else if config.publish.gist_id.is_some() {
        warn!("publish.gist_id is set but GITHUB_TOKEN is not; gist publishing disabled");
    }

    PipelineService::new(config.sources.clone(), config.pipeline.clone(), publishers)
}

async fn run_pipeline(config: &AppConfig) -> Result<()> {
    let service = build_pipeline(config);
    info!("yt-scout running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = service.run_forever() => {},
        _ = shutdown_signal() => {},
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},yt_scout=debug", cfg.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubetrace::extractors::youtube::YoutubeExtractor;
use tubetrace::recognition::acrcloud::AcrCloudClient;
use tubetrace::recognition::RecognitionClient;
use tubetrace::storage::ScratchSpace;
use tubetrace::{build_router, utils, AppState, Cli, Commands, Config, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tubetrace=debug,tower_http=debug"
    } else {
        "tubetrace=info,tower_http=info"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { host, port, config } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            serve(config).await
        }
        Commands::Config { show, config } => {
            let config = Config::resolve(config.as_deref())?;
            if show {
                config.display();
            } else {
                println!(
                    "Configuration is read from tubetrace.yaml, the user config directory \
                     and the environment."
                );
                println!("Run `tubetrace config --show` to print the resolved values.");
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    // Missing tools only matter once a request needs them
    let missing_deps =
        utils::check_dependencies(&config.extraction.yt_dlp_path, &config.recognition.ffmpeg_path)
            .await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let extractor = YoutubeExtractor::new(
        config.extraction.yt_dlp_path.clone(),
        config.extraction_timeout(),
        config.download_timeout(),
    );

    let recognizer: Option<Arc<dyn RecognitionClient>> = match config.recognition.credentials()? {
        Some(credentials) => {
            let client = AcrCloudClient::new(&credentials, config.recognition.ffmpeg_path.clone())
                .context("Failed to create recognition client")?;
            tracing::info!("Music recognition enabled ({})", client.endpoint());
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("ACRCloud credentials not set; /api/process-youtube-url will answer 503");
            None
        }
    };

    let scratch = match &config.storage.temp_dir {
        Some(dir) => ScratchSpace::new(dir),
        None => ScratchSpace::system(),
    };
    tracing::info!("Scratch files go under {}", scratch.root().display());

    let orchestrator = Orchestrator::new(Arc::new(extractor), recognizer, scratch);
    let addr = config.bind_address();
    let app = build_router(AppState::new(orchestrator, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}

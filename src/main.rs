//! Image Tier Cache - HTTP front-end for the two-tier image cache
//!
//! Serves images through memory, disk and network tiers and accepts cache
//! settings changes at runtime.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_tier_cache::api::{create_router, AppState};
use image_tier_cache::cache::{DiskImageCache, MemoryImageCache};
use image_tier_cache::config::Config;
use image_tier_cache::fetch::HttpFetcher;
use image_tier_cache::loader::{ui_channel, Loader};
use image_tier_cache::storage::{FsStorage, StorageLocator};
use image_tier_cache::tasks::{spawn_reconfigure_task, CacheSettings, SETTINGS_CHANNEL_CAPACITY};

/// Main entry point for the image cache server.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing subscriber for logging
/// 3. Open the enabled cache tiers
/// 4. Start the UI loop and the reconfiguration task
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // RUST_LOG wins over the trace toggles
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Image Tier Cache Server");
    info!(
        "Configuration loaded: memory={} ({:?}), disk={} ({} bytes), port={}",
        config.memory_cache_enabled,
        config.memory_budget(),
        config.disk_cache_enabled,
        config.disk_cache_bytes,
        config.server_port
    );

    let storage: Arc<dyn StorageLocator> = Arc::new(FsStorage::new(
        config.cache_dir_internal.clone(),
        config.cache_dir_external.clone(),
    ));

    let disk = if config.disk_cache_enabled {
        let disk = DiskImageCache::open(&config.disk_cache_config(), storage.as_ref())
            .context("failed to open disk cache")?;
        info!("Disk cache opened at {}", disk.directory().display());
        Some(Arc::new(disk))
    } else {
        None
    };

    let fetcher = HttpFetcher::new(config.connect_timeout(), config.read_timeout())
        .context("failed to build HTTP client")?;

    let (ui, ui_loop) = ui_channel();
    let ui_handle = tokio::spawn(ui_loop.run());

    let mut builder = Loader::builder(Arc::new(fetcher), ui)
        .max_dimensions(config.image_max_width, config.image_max_height);
    if config.memory_cache_enabled {
        builder = builder.memory_cache(Arc::new(MemoryImageCache::from_budget(
            config.memory_budget(),
        )));
    }
    if let Some(disk) = &disk {
        builder = builder.disk_cache(Arc::clone(disk));
    }
    let loader = builder.build().context("failed to build loader")?;
    info!("Loader initialized");

    let settings = CacheSettings::new(
        config.memory_cache_enabled,
        config.memory_budget(),
        config.disk_cache_enabled,
        config.disk_cache_config(),
        disk,
        storage,
    );
    let (settings_tx, settings_rx) = mpsc::channel(SETTINGS_CHANNEL_CAPACITY);
    let reconfigure_handle = spawn_reconfigure_task(loader.clone(), settings, settings_rx);
    info!("Background reconfiguration task started");

    let app = create_router(AppState::new(loader, settings_tx));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(vec![reconfigure_handle, ui_handle]))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}

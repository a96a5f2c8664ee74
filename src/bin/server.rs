//! buscrop HTTP server binary.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT` — bind address (default: 0.0.0.0:8000)
//! - `CROP_BOX` — fixed crop box `x,y,width,height` (default: 100,50,120,60)
//! - `MAX_UPLOAD_BYTES` — request body limit (default: 10 MiB)
//! - `DOWNLOAD_FILENAME` — filename hint for the download (default: bus_line.png)
//! - `MAX_DECODE_BYTES` / `MAX_IMAGE_DIMENSION` — decoder limits (default: 128 MiB / 16384)
//! - `CORS_ALLOWED_ORIGINS` / `CORS_ALLOWED_METHODS` / `CORS_ALLOWED_HEADERS` — `*` or a list
//! - `CORS_ALLOW_CREDENTIALS` — `true`/`false` (default: true)
//! - `RUST_LOG` — Tracing filter (default: "info,buscrop=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use anyhow::Context;
use buscrop::{app_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,buscrop=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr;

    if config.cors.allowed_origins.is_any() && config.cors.allow_credentials {
        tracing::warn!("CORS allows any origin with credentials; use only for local development");
    }
    tracing::info!(
        crop_box = %config.crop_box,
        max_upload_bytes = config.max_upload_bytes,
        max_decode_bytes = config.max_decode_bytes,
        max_image_dimension = config.max_image_dimension,
        download_filename = %config.download_filename,
        "configuration loaded"
    );

    let app = app_router(AppState::new(config));

    tracing::info!("buscrop server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health         — liveness probe");
    tracing::info!("  POST /process-image/ — crop uploaded image");

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, draining connections");
}

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_store::{Config, ImageCrateCodec, ImageService, LocalFileStorage, web};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let storage = LocalFileStorage::new(config.storage_dir.clone())
        .context("image storage could not be initialized")?;
    let service = ImageService::new(Arc::new(storage), Arc::new(ImageCrateCodec));
    let router = web::router(service, config.max_upload_bytes);

    let bind_address = config.bind_address();
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!(
        address = %bind_address,
        storage = %config.storage_dir.display(),
        "image store listening"
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

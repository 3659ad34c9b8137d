use anyhow::Context;
use camstream_server::{DirectoryCamera, HostConfig, StreamServer, STREAM_ROUTE};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Optional config file, looked up in the working directory.
const CONFIG_FILE: &str = "camstream.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,camstream_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("camstream server starting...");

    let config = HostConfig::load_or_default(CONFIG_FILE)?;
    let camera = DirectoryCamera::open(&config.frames_dir, config.frame_interval())
        .with_context(|| format!("Cannot open frame source {}", config.frames_dir.display()))?;
    tracing::info!(
        "Playing back {} frames from {} every {} ms",
        camera.frame_count(),
        config.frames_dir.display(),
        config.frame_interval_ms
    );

    let server = StreamServer::new(config.bind_addr, camera);
    let server_handle = tokio::spawn(server.run());

    tracing::info!("   Stream: http://{}{}", config.bind_addr, STREAM_ROUTE);
    tracing::info!("   Try:    ffplay http://localhost:{}{}", config.bind_addr.port(), STREAM_ROUTE);

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => tracing::warn!("Stream server stopped"),
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Serve command implementation.

use logpull_server::{ConfigFile, FeedServer};
use std::path::Path;

/// Loads `config_path` and serves until Ctrl-C.
pub fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::load(config_path)?.into_server_config()?;
    tracing::info!(
        listen_address = %config.listen_address,
        data = %config.data_path.display(),
        "starting logpull"
    );

    let server = FeedServer::bind(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve_with_shutdown(shutdown_signal(tokio::signal::ctrl_c())))?;

    Ok(())
}

/// Resolves once `signal` fires. A signal that cannot be installed never
/// resolves, so the server keeps running instead of draining at startup.
async fn shutdown_signal<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "could not listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
}

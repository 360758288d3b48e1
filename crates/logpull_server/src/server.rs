//! The mutual-TLS feed server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::FeedService;
use crate::routes;
use crate::tls;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use logpull_core::FeedStore;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// In-flight requests get this long to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A configured server: store open, certificates loaded, address resolved.
///
/// # Example
///
/// ```rust,ignore
/// use logpull_server::{ConfigFile, FeedServer};
///
/// let config = ConfigFile::load("logpull.toml".as_ref())?.into_server_config()?;
/// let server = FeedServer::bind(config)?;
/// server.serve_with_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// ```
#[derive(Debug)]
pub struct FeedServer {
    addr: SocketAddr,
    service: FeedService,
    tls: Arc<rustls::ServerConfig>,
}

impl FeedServer {
    /// Loads TLS material, resolves the listen address and opens the store.
    ///
    /// # Errors
    ///
    /// TLS, address resolution or store errors.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        let tls = tls::load_server_tls(&config.tls)?;
        let addr = resolve(&config.listen_address)?;
        let store = FeedStore::open(&config.data_path, config.store)?;

        Ok(Self {
            addr,
            service: FeedService::new(Arc::new(store)),
            tls: Arc::new(tls),
        })
    }

    /// Address the server listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The facade every route calls into.
    #[must_use]
    pub fn service(&self) -> &FeedService {
        &self.service
    }

    /// The HTTP router, without TLS.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.service.clone())
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot be bound or the server stops on an I/O
    /// error.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown.await;
                tracing::info!("shutting down");
                handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            }
        });
        self.serve(handle).await
    }

    /// Serves under `handle`, which reports the bound address through
    /// [`Handle::listening`] and stops the server on shutdown.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot be bound or the server stops on an I/O
    /// error.
    pub async fn serve(self, handle: Handle) -> ServerResult<()> {
        tracing::info!(addr = %self.addr, "listening");
        let app = self.router();
        axum_server::bind_rustls(self.addr, RustlsConfig::from_config(self.tls))
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        tracing::info!("server stopped");
        Ok(())
    }
}

fn resolve(listen_address: &str) -> ServerResult<SocketAddr> {
    listen_address
        .to_socket_addrs()
        .map_err(|e| ServerError::Config(format!("invalid listen address {listen_address}: {e}")))?
        .next()
        .ok_or_else(|| {
            ServerError::Config(format!("listen address {listen_address} resolved to nothing"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    #[test]
    fn resolves_literal_and_named_addresses() {
        assert_eq!(
            resolve("127.0.0.1:10000").unwrap(),
            "127.0.0.1:10000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(resolve("localhost:10000").unwrap().port(), 10000);
        assert!(matches!(resolve("no-port"), Err(ServerError::Config(_))));
    }

    #[test]
    fn bind_fails_before_touching_the_store_without_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let config = ServerConfig::new(
            "127.0.0.1:0",
            &data,
            TlsConfig {
                cert_path: dir.path().join("missing.crt"),
                key_path: dir.path().join("missing.key"),
                client_ca_path: dir.path().join("missing-ca.crt"),
            },
        );

        assert!(matches!(FeedServer::bind(config), Err(ServerError::Tls(_))));
        assert!(!data.exists());
    }
}

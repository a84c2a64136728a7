pub mod api;

use crate::agent::AIAgent;
use crate::cli::Args;
use log::{ info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<AIAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<AIAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    /// Serves the HTTP API until the listener fails. TLS is used when enabled and both PEM paths are set.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr: SocketAddr = self.addr.parse()?;
        let app = api::router(self.agent.clone());

        match (self.args.enable_tls, &self.args.tls_cert_path, &self.args.tls_key_path) {
            (true, Some(cert_path), Some(key_path)) => {
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    cert_path,
                    key_path
                ).await?;
                info!("Starting HTTPS API server on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
            }
            (enable_tls, _, _) => {
                if enable_tls {
                    warn!("ENABLE_TLS is set but TLS_CERT_PATH or TLS_KEY_PATH is missing; serving plain HTTP");
                }
                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!("Starting HTTP API server on: http://{}", addr);
                axum::serve(listener, app.into_make_service()).await?;
            }
        }

        Ok(())
    }
}

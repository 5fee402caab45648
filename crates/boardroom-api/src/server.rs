// Boardroom
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! HTTP server implementation using Hyper

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::router::Router;
use crate::state::AppState;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// API server using Hyper
pub struct ApiServer {
    bind_address: SocketAddr,
    request_timeout: Duration,
    router: Arc<Router>,
}

impl ApiServer {
    pub fn new(config: &Config, state: AppState) -> ApiResult<Self> {
        let bind_address: SocketAddr = config.bind_address.parse().map_err(|e| ApiError::BadRequest {
            message: format!("Invalid bind address: {}", e),
        })?;
        let router = Arc::new(Router::new(state)?);

        Ok(Self {
            bind_address,
            request_timeout: config.request_timeout(),
            router,
        })
    }

    /// Get the bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> ApiResult<()> {
        let listener = TcpListener::bind(self.bind_address).await?;
        info!("Boardroom governance API listening on http://{}", self.bind_address);
        info!("OpenAPI specification available at http://{}/openapi.json", self.bind_address);

        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();
            let timeout = self.request_timeout;

            // Spawn a task to handle the connection
            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let router = router.clone();
                    async move {
                        let path = req.uri().path().to_string();
                        match tokio::time::timeout(timeout, router.handle(req)).await {
                            Ok(response) => Ok::<_, Infallible>(response),
                            Err(_) => {
                                warn!(path = %path, timeout_secs = timeout.as_secs(), "Request timed out");
                                Ok(ApiError::GatewayTimeout {
                                    message: "request did not complete in time, retry later".to_string(),
                                }
                                .into_response(&path))
                            }
                        }
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

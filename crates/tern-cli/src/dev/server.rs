//! HTTP surface of the development server.

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::State, http::Uri};
use tower_http::cors::{Any, CorsLayer};

use crate::dev::pipeline::Served;
use crate::dev::{SharedState, router};
use crate::error::{CliError, Result};

/// Development server.
pub struct DevServer {
    state: SharedState,
}

impl DevServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Address of the main listener.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.state.config.port))
    }

    /// Bind and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns error if the server cannot bind to the configured port.
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = self.addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        crate::ui::success(&format!(
            "tern listening on http://localhost:{}",
            self.state.config.port
        ));

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| CliError::Server(format!("Server error: {}", e)))
    }

    /// Every path goes through the request router; CORS allows any origin.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(handle_request)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }
}

async fn handle_request(State(state): State<SharedState>, uri: Uri) -> Served {
    router::dispatch(&state, uri.path()).await
}

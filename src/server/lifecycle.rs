//! Listener lifecycle: start, stop, scoped release

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::endpoint::RecordingHandler;
use crate::{HttptrapError, Result};

use super::limiter::ConnectionLimiter;
use super::MAX_CONNECTIONS;

/// Options for starting a server
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: 0,
            max_connections: MAX_CONNECTIONS,
        }
    }
}

impl From<&ServerConfig> for ServerOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            port: config.port,
            max_connections: config.max_connections,
        }
    }
}

/// Start an HTTP server hosting `handler`.
///
/// # Errors
///
/// Returns error if the listener cannot be bound.
pub async fn start(handler: RecordingHandler, options: &ServerOptions) -> Result<ServerHandle> {
    let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let limiter = ConnectionLimiter::new(options.max_connections);

    let task = tokio::spawn(accept_loop(listener, handler, limiter, shutdown_rx));

    info!("Recording endpoint listening on {}", addr);

    Ok(ServerHandle {
        addr,
        shutdown_tx,
        task: Some(task),
    })
}

async fn accept_loop(
    listener: TcpListener,
    handler: RecordingHandler,
    limiter: ConnectionLimiter,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let addr = listener.local_addr().ok();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        let Some(guard) = limiter.try_acquire() else {
                            warn!("Connection limit reached, rejecting {}", peer_addr);
                            drop(stream);
                            continue;
                        };

                        let handler = handler.clone();

                        tokio::spawn(async move {
                            let _guard = guard;
                            serve_connection(stream, peer_addr, handler).await;
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                if let Some(addr) = addr {
                    info!("Endpoint {} shutting down", addr);
                }
                break;
            }
        }
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: RecordingHandler,
) {
    let io = TokioIo::new(stream);

    let service = service_fn(move |request| {
        let handler = handler.clone();
        async move {
            match handler.handle(request).await {
                Ok(response) => Ok::<_, Infallible>(response),
                Err(e) => {
                    error!("Handler error: {}", e);
                    Ok(error_response(&e))
                }
            }
        }
    });

    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        error!("Connection error from {}: {}", peer_addr, e);
    }
}

/// Map a handler error onto an HTTP response
fn error_response(error: &HttptrapError) -> Response<Full<Bytes>> {
    let status = match error {
        HttptrapError::BodyRead(_) | HttptrapError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(format!("Error: {error}"))))
        .expect("Failed to build response")
}

/// Handle to a running server.
///
/// Dropping the handle stops the server: the accept loop is signalled and
/// the task aborted, so a handle bound in a test scope is released on every
/// exit path, including panics. [`ServerHandle::stop`] waits for the orderly
/// variant of the same shutdown.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Local address the server is bound to
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL for `path` on this server
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the server and wait for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns error if the accept task panicked.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown_tx.send(()).ok();

        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| HttptrapError::Other(format!("Server task failed: {e}")))?;
        }

        Ok(())
    }

    /// Wait for the accept loop to exit without initiating shutdown.
    ///
    /// Used by standalone mode; returns when the server is stopped from
    /// elsewhere (signal handler, another handle clone of the channel).
    ///
    /// # Errors
    ///
    /// Returns error if the accept task panicked.
    pub async fn wait(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| HttptrapError::Other(format!("Server task failed: {e}")))?;
        }

        Ok(())
    }

    /// Sender that stops the server when signalled
    #[must_use]
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown_tx.send(()).ok();

        // The accept task may never get polled again if the runtime is
        // winding down; abort is the backstop that frees the port.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::recording_endpoint;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn raw_get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let (_sequence, handler) = recording_endpoint();
        let server = start(handler, &ServerOptions::default()).await.unwrap();

        assert_ne!(server.addr().port(), 0);
        assert!(server.url("/ping").starts_with("http://127.0.0.1:"));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_serves_default_response() {
        let (sequence, handler) = recording_endpoint();
        let server = start(handler, &ServerOptions::default()).await.unwrap();

        let response = raw_get(server.addr(), "/ping?x=1").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        let record = sequence.elements().next().unwrap();
        assert_eq!(record.path, "/ping");
        assert_eq!(record.query["x"], "1");

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_frees_port() {
        let (_sequence, handler) = recording_endpoint();
        let server = start(handler, &ServerOptions::default()).await.unwrap();
        let addr = server.addr();

        server.stop().await.unwrap();

        let result = TcpStream::connect(addr).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_drop_stops_server() {
        let (_sequence, handler) = recording_endpoint();
        let addr = {
            let server = start(handler, &ServerOptions::default()).await.unwrap();
            server.addr()
        };

        // Drop-based shutdown is asynchronous; give the abort a moment.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = TcpStream::connect(addr).await;
        assert!(result.is_err());
    }
}

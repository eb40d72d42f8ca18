//! Keep-alive HTTP endpoint.
//!
//! Hosting platforms that idle out silent processes poll `GET /`.

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, routing::get};
use tracing::info;

/// Body returned by the liveness route.
pub const ALIVE: &str = "I'm alive!";

/// Builds the keep-alive router.
pub fn router() -> Router {
    Router::new().route("/", get(liveness))
}

async fn liveness() -> &'static str {
    ALIVE
}

/// Serves the keep-alive router on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {}", listener.local_addr()?);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_liveness_handler() {
        assert_eq!(liveness().await, ALIVE);
    }

    #[tokio::test]
    async fn test_serve_answers_and_shuts_down() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(addr, async {
            let _ = rx.await;
        }));

        let mut stream = loop {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        };
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with(ALIVE));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}

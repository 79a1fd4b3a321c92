// Server loop module
// Accepts connections until a shutdown is requested

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept connections until `shutdown` is notified, then stop accepting and return.
///
/// In-flight connection tasks are not awaited; they end with the runtime.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                logger::log_shutdown(state.active_connections.load(Ordering::SeqCst));
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::predictor::MandiPredictor;
    use crate::server::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn state() -> Arc<AppState> {
        let mut config = Config::load_from("/nonexistent/mandi-config").unwrap();
        config.logging.access_log = false;
        config.performance.keep_alive = false;
        let predictor = MandiPredictor::load(None).unwrap();
        Arc::new(AppState::new(config, Arc::new(predictor)))
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(listener, state(), Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /commodities/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"), "unexpected response: {raw}");
        assert!(raw.ends_with(
            r#"{"commodities":["wheat","rice","onion","tomato","potato"]}"#
        ));

        shutdown.notify_one();
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_idle_connection_closed_after_timeout() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut config = Config::load_from("/nonexistent/mandi-config").unwrap();
        config.logging.access_log = false;
        config.performance.keep_alive = true;
        config.performance.connection_timeout = 1;
        let state = Arc::new(AppState::new(config, Arc::new(MandiPredictor::load(None).unwrap())));
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(listener, Arc::clone(&state), Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        // Keep-alive: the response arrives and the socket stays open
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        while !raw.ends_with(br#"{"message":"Mandi ML API running"}"#) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the response completed");
            raw.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(state.active_connections.load(Ordering::SeqCst), 1);

        // Idle until the timeout drops the connection
        let mut rest = Vec::new();
        let closed = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            stream.read_to_end(&mut rest),
        )
        .await;
        assert!(closed.is_ok(), "connection outlived its timeout");
        assert!(rest.is_empty());

        tokio::task::yield_now().await;
        assert_eq!(state.active_connections.load(Ordering::SeqCst), 0);

        shutdown.notify_one();
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_rejects_over_connection_limit() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut config = Config::load_from("/nonexistent/mandi-config").unwrap();
        config.performance.max_connections = Some(0);
        let state = Arc::new(AppState::new(config, Arc::new(MandiPredictor::load(None).unwrap())));
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(listener, Arc::clone(&state), Arc::clone(&shutdown)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut buf = Vec::new();
        // Rejected connections are closed without a response
        let read = stream.read_to_end(&mut buf).await;
        assert!(read.map(|n| n == 0).unwrap_or(true));
        assert_eq!(state.active_connections.load(Ordering::SeqCst), 0);

        shutdown.notify_one();
        assert!(server.await.unwrap().is_ok());
    }
}

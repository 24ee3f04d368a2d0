//! Database connection pool setup and startup readiness wait.

use crate::error::{AppError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Block until `host:port` accepts TCP connections or `timeout` elapses.
///
/// Probes are spaced by a fixed `interval`; no single probe or sleep runs
/// past the deadline. Returns the time spent waiting.
pub async fn wait_for_port(
    host: &str,
    port: u16,
    timeout: Duration,
    interval: Duration,
) -> Result<Duration> {
    let addr = format!("{host}:{port}");
    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => {
                let elapsed = start.elapsed();
                tracing::info!(
                    addr = %addr,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Database port is accepting connections"
                );
                return Ok(elapsed);
            }
            Ok(Err(e)) => {
                tracing::debug!(addr = %addr, attempts, error = %e, "Database not reachable yet");
            }
            Err(_) => {
                tracing::debug!(addr = %addr, attempts, "Database probe timed out");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }

    Err(AppError::Startup(format!(
        "database at {} not reachable after {}s ({} attempts)",
        addr,
        timeout.as_secs(),
        attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_wait_returns_when_port_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let elapsed = wait_for_port(
            "127.0.0.1",
            port,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_fails_after_timeout() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let start = std::time::Instant::now();
        let err = wait_for_port(
            "127.0.0.1",
            port,
            Duration::from_millis(300),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Startup(_)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_picks_up_late_listener() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let opener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            // Keep the listener alive long enough for the probe to land.
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(listener);
        });

        let elapsed = wait_for_port(
            "127.0.0.1",
            port,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        assert!(elapsed >= Duration::from_millis(150));

        opener.abort();
    }
}

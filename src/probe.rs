//! TCP readiness probing for the render server.
//!
//! The render server exposes no readiness handshake, so the only signal
//! that it is up is its port accepting connections. The prober sleeps one
//! interval, attempts a connection bounded by a per-attempt timeout, and
//! repeats until the connection succeeds or a bound trips. Connections are
//! closed as soon as they are established; only reachability matters.
//!
//! Unlike a plain retry-forever loop, both the attempt count and the total
//! elapsed time are bounded, and the caller can cancel the wait through a
//! shutdown signal.

use crate::debug;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::{net::TcpStream, sync::watch, time};

/// Readiness probing errors.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("server at {addr} not reachable after {attempts} attempt(s) ({elapsed_ms} ms)")]
    Unreachable {
        addr: SocketAddr,
        attempts: u32,
        elapsed_ms: u128,
    },

    #[error("interrupted while waiting for the server")]
    Interrupted,
}

/// Probe timing and bounds.
///
/// Defaults mirror the constants this tool grew up with: 300 ms between
/// attempts, 300 ms per connection attempt.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Delay before each connection attempt.
    pub interval: Duration,
    /// Per-attempt connection timeout.
    pub connect_timeout: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Maximum total time spent waiting.
    pub max_wait: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            connect_timeout: Duration::from_millis(300),
            max_attempts: 200,
            max_wait: Duration::from_secs(60),
        }
    }
}

/// Wait until `addr` accepts a TCP connection.
///
/// Returns the number of attempts made. A listener that starts during the
/// Nth delay is observed on the (N+1)-th attempt, never before it exists.
/// Exhausting either bound yields [`ProbeError::Unreachable`]; a shutdown
/// signal yields [`ProbeError::Interrupted`] at the next suspension point.
pub async fn wait_until_ready(
    addr: SocketAddr,
    settings: &ProbeSettings,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<u32, ProbeError> {
    let started = Instant::now();

    for attempt in 1..=settings.max_attempts.max(1) {
        tokio::select! {
            _ = time::sleep(settings.interval) => {}
            _ = shutdown.wait_for(|&stop| stop) => return Err(ProbeError::Interrupted),
        }

        debug!("probe"; "attempt {attempt}: connecting to {addr}");

        let connect = time::timeout(settings.connect_timeout, TcpStream::connect(addr));
        tokio::select! {
            result = connect => match result {
                // Reachable: close immediately, the connection itself is
                // not wanted.
                Ok(Ok(stream)) => {
                    drop(stream);
                    return Ok(attempt);
                }
                // Refused or timed out: retry on the next interval.
                Ok(Err(_)) | Err(_) => {}
            },
            _ = shutdown.wait_for(|&stop| stop) => return Err(ProbeError::Interrupted),
        }

        if started.elapsed() >= settings.max_wait {
            return Err(ProbeError::Unreachable {
                addr,
                attempts: attempt,
                elapsed_ms: started.elapsed().as_millis(),
            });
        }
    }

    Err(ProbeError::Unreachable {
        addr,
        attempts: settings.max_attempts.max(1),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn fast_settings(max_attempts: u32) -> ProbeSettings {
        ProbeSettings {
            interval: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(50),
            max_attempts,
            max_wait: Duration::from_secs(5),
        }
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the test's duration.
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let attempts = wait_until_ready(addr, &fast_settings(10), &mut no_shutdown())
            .await
            .unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_resolves_only_after_listener_exists() {
        // Reserve a port, then release it and listen again after a delay
        // long enough for several probe intervals to pass.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            TcpListener::bind(addr).unwrap()
        });

        let attempts = wait_until_ready(addr, &fast_settings(100), &mut no_shutdown())
            .await
            .unwrap();
        // At 10 ms per interval the listener cannot exist on attempt 1.
        assert!(attempts > 1);
        drop(handle.join().unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_after_max_attempts() {
        // Bind then drop to get a port that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = wait_until_ready(addr, &fast_settings(3), &mut no_shutdown())
            .await
            .unwrap_err();
        match err {
            ProbeError::Unreachable { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Unreachable, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_max_wait_bound() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let settings = ProbeSettings {
            interval: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(10),
            max_attempts: u32::MAX,
            max_wait: Duration::from_millis(50),
        };

        let started = Instant::now();
        let err = wait_until_ready(addr, &settings, &mut no_shutdown())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            let _ = tx.send(true);
        });

        let settings = ProbeSettings {
            interval: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(10),
            max_attempts: u32::MAX,
            max_wait: Duration::from_secs(60),
        };
        let err = wait_until_ready(addr, &settings, &mut rx).await.unwrap_err();
        assert!(matches!(err, ProbeError::Interrupted));
    }
}

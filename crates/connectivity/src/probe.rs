//! Periodic HTTP reachability probe feeding a [`ConnectivityMonitor`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::monitor::ConnectivityMonitor;
use crate::types::ProbeConfig;

/// Sends a `HEAD` request to `url` and reports whether any HTTP response
/// came back within `timeout`. The status code is irrelevant.
pub async fn check_reachability(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "failed to build probe client");
            return false;
        }
    };

    match client.head(url).send().await {
        Ok(resp) => {
            trace!(url, status = %resp.status(), "probe reached host");
            true
        }
        Err(e) => {
            trace!(url, error = %e, "probe failed");
            false
        }
    }
}

/// Running probe task. Dropping the handle stops the probe.
#[derive(Debug)]
pub struct ProbeHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stops the probe loop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns a probe that checks `config.url` every `config.interval` and
/// reports the result to `monitor`.
pub fn spawn_probe(monitor: Arc<ConnectivityMonitor>, config: ProbeConfig) -> ProbeHandle {
    let ProbeConfig {
        url,
        interval,
        timeout,
    } = config;
    let url: Arc<str> = url.into();
    spawn_probe_with(monitor, interval, move || {
        let url = url.clone();
        async move { check_reachability(&url, timeout).await }
    })
}

/// Spawns a probe loop driven by an arbitrary reachability check.
///
/// The first check runs immediately; subsequent checks run every `interval`.
pub fn spawn_probe_with<F, Fut>(
    monitor: Arc<ConnectivityMonitor>,
    interval: Duration,
    check: F,
) -> ProbeHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let online = tokio::select! {
                _ = token.cancelled() => break,
                online = check() => online,
            };
            monitor.set_online(online);
        }
        debug!("connectivity probe stopped");
    });

    ProbeHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn mock_server(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!("{status_line}\r\nContent-Length: 0\r\n\r\n");
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn reachable_host_is_online() {
        let url = mock_server("HTTP/1.1 200 OK").await;
        assert!(check_reachability(&url, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn error_status_still_counts_as_online() {
        let url = mock_server("HTTP/1.1 503 Service Unavailable").await;
        assert!(check_reachability(&url, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn closed_port_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/");
        assert!(!check_reachability(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn invalid_url_is_offline() {
        assert!(!check_reachability("not a url", Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_updates_monitor() {
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_check = calls.clone();

        // Offline on the first check, online afterwards.
        let handle = spawn_probe_with(monitor.clone(), Duration::from_secs(10), move || {
            let n = calls_check.fetch_add(1, Ordering::SeqCst);
            async move { n > 0 }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_online());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(monitor.is_online());

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_probe_does_not_check_again() {
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_check = calls.clone();

        let handle = spawn_probe_with(monitor, Duration::from_secs(10), move || {
            calls_check.fetch_add(1, Ordering::SeqCst);
            async { true }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_running());
    }
}

//! Network reachability signal.

use std::sync::Arc;
use std::time::Duration;

use citycast_core::ConnectivityConfig;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::observable::{Observable, Subscription};

/// Continuously updated reachability. Reads never suspend.
pub trait ConnectivityMonitor: Send + Sync {
    /// Latest known state.
    fn is_connected(&self) -> bool;

    /// Current state first, then every change. Never ends while the monitor lives.
    fn subscribe(&self) -> Subscription<bool>;
}

/// Reachability pushed in from outside (platform callbacks, tests, `--offline`).
#[derive(Debug)]
pub struct SharedConnectivity {
    state: Observable<bool>,
}

impl SharedConnectivity {
    pub fn new(connected: bool) -> Self {
        Self {
            state: Observable::new(connected),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        if self.state.set_if_changed(connected) {
            tracing::info!("Connectivity changed: {}", if connected { "online" } else { "offline" });
        }
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    fn is_connected(&self) -> bool {
        self.state.get()
    }

    fn subscribe(&self) -> Subscription<bool> {
        self.state.subscribe()
    }
}

/// Reachability decided by periodically opening a TCP connection to a known host.
///
/// Probe failures of any kind count as "disconnected"; nothing is propagated.
/// The background probe loop stops when the monitor is dropped.
#[derive(Debug)]
pub struct ProbeConnectivityMonitor {
    state: Arc<Observable<bool>>,
    cancel: CancellationToken,
}

impl ProbeConnectivityMonitor {
    /// Probe once, then keep probing in the background. Must run inside a tokio runtime.
    pub async fn start(config: &ConnectivityConfig) -> Self {
        Self::with_target(
            config.probe_host.clone(),
            config.probe_port,
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.probe_timeout_secs),
        )
        .await
    }

    pub async fn with_target(
        host: String,
        port: u16,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        let initial = probe(&host, port, probe_timeout).await;
        tracing::info!(
            "Initial connectivity via {}:{}: {}",
            host,
            port,
            if initial { "online" } else { "offline" }
        );

        let state = Arc::new(Observable::new(initial));
        let cancel = CancellationToken::new();

        tokio::spawn(probe_loop(
            host,
            port,
            interval,
            probe_timeout,
            state.clone(),
            cancel.clone(),
        ));

        Self { state, cancel }
    }
}

impl ConnectivityMonitor for ProbeConnectivityMonitor {
    fn is_connected(&self) -> bool {
        self.state.get()
    }

    fn subscribe(&self) -> Subscription<bool> {
        self.state.subscribe()
    }
}

impl Drop for ProbeConnectivityMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn probe(host: &str, port: u16, probe_timeout: Duration) -> bool {
    match tokio::time::timeout(probe_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!("Connectivity probe to {}:{} failed: {}", host, port, e);
            false
        }
        Err(_) => {
            tracing::debug!("Connectivity probe to {}:{} timed out", host, port);
            false
        }
    }
}

async fn probe_loop(
    host: String,
    port: u16,
    interval: Duration,
    probe_timeout: Duration,
    state: Arc<Observable<bool>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately and the initial probe already ran.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let connected = probe(&host, port, probe_timeout).await;
                if state.set_if_changed(connected) {
                    tracing::info!(
                        "Connectivity changed: {}",
                        if connected { "online" } else { "offline" }
                    );
                }
            }
        }
    }

    tracing::debug!("Connectivity probe loop stopped");
}

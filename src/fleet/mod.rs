//! Device fleet coordination
//!
//! The fleet owns one [`CameraConnection`] task per configured device and
//! the single shared event queue they all feed.
//!
//! ```text
//!                         CameraFleet
//!                ┌────────────────────────────┐
//!   camera A ───►│ connection task ─┐         │
//!   camera B ───►│ connection task ─┼─► queue │──► drain() ──► consumer
//!   camera C ───►│ connection task ─┘         │
//!                └────────────────────────────┘
//!                        probe(address) ◄────────── consumer
//! ```
//!
//! The queue is unbounded: producers never wait on the consumer's pace. A
//! slow consumer grows memory instead of stalling capture, the accepted
//! tradeoff for single-digit device counts. Within one camera, events stay
//! in emission order; across cameras there is no ordering guarantee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::camera::alarm;
use crate::camera::config::CameraConfig;
use crate::camera::connection::CameraConnection;
use crate::event::DetectionEvent;
use crate::protocol::constants::DEFAULT_STOP_TIMEOUT;

/// Bookkeeping for one camera's connection task
struct CameraHandle {
    /// Config copy kept for probe routing
    config: CameraConfig,

    /// True from start until the task reaches `Stopped`
    alive: Arc<AtomicBool>,

    /// The spawned task, present once started
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Coordinator for all camera connections and the shared event queue
pub struct CameraFleet {
    handles: Vec<CameraHandle>,
    event_tx: mpsc::UnboundedSender<DetectionEvent>,
    event_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<DetectionEvent>>,
    cancel: CancellationToken,
    stop_timeout: Duration,
}

impl CameraFleet {
    /// Create a fleet for the given device configs (not yet started)
    pub fn new(configs: impl IntoIterator<Item = CameraConfig>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handles = configs
            .into_iter()
            .map(|config| CameraHandle {
                config,
                alive: Arc::new(AtomicBool::new(false)),
                task: std::sync::Mutex::new(None),
            })
            .collect();

        Self {
            handles,
            event_tx,
            event_rx: tokio::sync::Mutex::new(event_rx),
            cancel: CancellationToken::new(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Set how long [`stop`](Self::stop) waits per connection
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Number of configured cameras
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the fleet has no cameras
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Launch every connection's lifecycle
    ///
    /// Must be called from within a tokio runtime. Calling twice is a
    /// no-op for connections already running.
    pub fn start(&self) {
        for handle in &self.handles {
            let mut task = handle.task.lock().unwrap();
            if task.is_some() {
                continue;
            }

            handle.alive.store(true, Ordering::Release);
            let connection = CameraConnection::new(
                handle.config.clone(),
                self.event_tx.clone(),
                self.cancel.child_token(),
                handle.alive.clone(),
            );
            *task = Some(tokio::spawn(connection.run()));
        }

        tracing::info!(cameras = self.handles.len(), "camera fleet started");
    }

    /// Signal every connection, then wait (bounded) for each to stop
    ///
    /// Best-effort join: a connection that misses the bound is logged and
    /// left to the runtime, never force-killed.
    pub async fn stop(&self) {
        tracing::info!("stopping camera fleet");
        self.cancel.cancel();

        for handle in &self.handles {
            let task = handle.task.lock().unwrap().take();
            let Some(task) = task else {
                continue;
            };

            match tokio::time::timeout(self.stop_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        camera = %handle.config.address,
                        error = %e,
                        "connection task failed during shutdown"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        camera = %handle.config.address,
                        timeout_secs = self.stop_timeout.as_secs(),
                        "connection did not stop within the bound"
                    );
                }
            }
        }

        tracing::info!("camera fleet stopped");
    }

    /// Collect queued events
    ///
    /// Blocks up to `wait` for the first event, then opportunistically
    /// takes up to `max_items - 1` more that are already queued, without
    /// blocking further. May return an empty vec.
    pub async fn drain(&self, max_items: usize, wait: Duration) -> Vec<DetectionEvent> {
        let mut collected = Vec::new();
        if max_items == 0 {
            return collected;
        }

        let mut rx = self.event_rx.lock().await;

        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(event)) => collected.push(event),
            Ok(None) | Err(_) => return collected,
        }

        while collected.len() < max_items {
            match rx.try_recv() {
                Ok(event) => collected.push(event),
                Err(_) => break,
            }
        }

        collected
    }

    /// Single-shot alarm probe for the camera at `address`
    ///
    /// False when no live connection matches; otherwise the fail-closed
    /// probe of [`alarm::probe`].
    pub async fn probe(&self, address: &str) -> bool {
        match self.route(address) {
            Some(config) => alarm::probe(config).await,
            None => false,
        }
    }

    /// Polling alarm probe using the camera's configured window/interval
    pub async fn probe_within(&self, address: &str) -> bool {
        match self.route(address) {
            Some(config) => {
                alarm::probe_within(config, config.probe_window, config.probe_interval).await
            }
            None => false,
        }
    }

    /// Number of connection tasks currently alive
    pub fn connections_alive(&self) -> usize {
        self.handles
            .iter()
            .filter(|h| h.alive.load(Ordering::Acquire))
            .count()
    }

    fn route(&self, address: &str) -> Option<&CameraConfig> {
        let Some(handle) = self.handles.iter().find(|h| h.config.address == address) else {
            tracing::warn!(camera = %address, "no connection configured for address");
            return None;
        };
        if !handle.alive.load(Ordering::Acquire) {
            tracing::warn!(camera = %address, "connection for address is not running");
            return None;
        }
        Some(&handle.config)
    }
}

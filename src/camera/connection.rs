//! Camera stream connection
//!
//! One connection per device. The connection owns a persistent streaming
//! GET against the device's event endpoint, feeds every received chunk to
//! its multipart parser, drives its correlator, and pushes finished
//! detections into the fleet's shared queue. It reconnects forever until
//! stopped.
//!
//! # Lifecycle
//!
//! ```text
//!  Init ──start──► Connecting ──connected──► Streaming ──clean end──┐
//!                      │  ▲                     │                   │
//!              failure │  └────── timer ──┐     │ network error     │
//!                      ▼                  │     ▼                   │
//!                  BackoffWait ───────────┴◄────┘                   │
//!                      │                  ▲                         │
//!                 stop │        reconnect └─────────────────────────┘
//!                      ▼
//!                   Stopped    (stop is honored at every wait point)
//! ```
//!
//! Transient network failures take the short backoff; an unclassified
//! internal fault takes the long one. Neither ends the task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::camera::config::CameraConfig;
use crate::camera::correlator::EventCorrelator;
use crate::error::{Error, ProtocolError, Result};
use crate::event::DetectionEvent;
use crate::protocol::digest::get_with_digest;
use crate::protocol::multipart::{boundary_from_content_type, MultipartParser, Step};

/// Connection lifecycle states
///
/// Owned exclusively by the connection; other components observe only the
/// liveness flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet started
    Init,
    /// Establishing the streaming request
    Connecting,
    /// Receiving and parsing the event stream
    Streaming,
    /// Waiting out a backoff period after a failure
    BackoffWait,
    /// Terminal: stop requested and honored
    Stopped,
}

/// How one streaming session ended
enum StreamEnd {
    /// Server finished the stream (terminal marker or connection close)
    Clean,
    /// Stop was requested while streaming
    Stopped,
}

/// A single device's streaming connection
pub struct CameraConnection {
    config: CameraConfig,
    events: mpsc::UnboundedSender<DetectionEvent>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
    state: ConnectionState,
}

impl CameraConnection {
    /// Create a connection; it does nothing until [`run`](Self::run)
    pub fn new(
        config: CameraConfig,
        events: mpsc::UnboundedSender<DetectionEvent>,
        cancel: CancellationToken,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            events,
            cancel,
            alive,
            state: ConnectionState::Init,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the connection until stop is requested
    ///
    /// Never returns early on error: failures are converted to backoff and
    /// the loop keeps going. Clears the liveness flag on exit.
    pub async fn run(mut self) {
        tracing::info!(camera = %self.config.address, "connection task started");

        while !self.cancel.is_cancelled() {
            self.state = ConnectionState::Connecting;

            match self.stream_once().await {
                Ok(StreamEnd::Stopped) => break,
                Ok(StreamEnd::Clean) => {
                    tracing::info!(camera = %self.config.address, "stream ended, reconnecting");
                }
                Err(e) => {
                    let backoff = if e.is_transient() {
                        tracing::warn!(
                            camera = %self.config.address,
                            error = %e,
                            backoff_secs = self.config.short_backoff.as_secs(),
                            "stream attempt failed"
                        );
                        self.config.short_backoff
                    } else {
                        tracing::error!(
                            camera = %self.config.address,
                            error = %e,
                            backoff_secs = self.config.long_backoff.as_secs(),
                            "unexpected fault in connection loop"
                        );
                        self.config.long_backoff
                    };

                    self.state = ConnectionState::BackoffWait;
                    if self.backoff_or_stop(backoff).await {
                        break;
                    }
                }
            }
        }

        self.state = ConnectionState::Stopped;
        self.alive.store(false, Ordering::Release);
        tracing::info!(camera = %self.config.address, "connection task stopped");
    }

    /// Sleep out a backoff period; returns true if stop arrived first
    async fn backoff_or_stop(&self, backoff: std::time::Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(backoff) => false,
        }
    }

    /// One full streaming session: connect, resolve boundary, read parts
    async fn stream_once(&mut self) -> Result<StreamEnd> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .build()
            .map_err(|e| Error::Protocol(ProtocolError::Internal(e.to_string())))?;

        let url = self.config.stream_url();
        tracing::info!(camera = %self.config.address, url = %url, "connecting");

        let resp = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(StreamEnd::Stopped),
            resp = get_with_digest(&client, &url, self.config.credential_pair()) => resp?,
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(ProtocolError::BadStatus(status.as_u16()).into());
        }

        let boundary = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .ok_or(ProtocolError::MissingBoundary)?;

        tracing::info!(
            camera = %self.config.address,
            boundary = %boundary,
            "connected, streaming events"
        );
        self.state = ConnectionState::Streaming;

        let mut parser = MultipartParser::new(&boundary);
        let mut correlator =
            EventCorrelator::new(self.config.address.as_str(), self.config.event_code.as_str());
        let mut stream = resp.bytes_stream();

        let outcome = loop {
            // Bounded read so a stalled stream still observes stop.
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break Ok(StreamEnd::Stopped),
                next = tokio::time::timeout(self.config.read_timeout, stream.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    break Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "event stream read timeout",
                    )))
                }
                Ok(None) => break Ok(StreamEnd::Clean),
                Ok(Some(Err(e))) => break Err(e.into()),
                Ok(Some(Ok(chunk))) => chunk,
            };

            parser.push(&chunk);

            let mut ended = false;
            loop {
                match parser.next_part() {
                    Step::NeedMore => break,
                    Step::EndOfStream => {
                        ended = true;
                        break;
                    }
                    Step::Part(part) => {
                        if let Some(event) = correlator.ingest(&part) {
                            if self.events.send(event).is_err() {
                                tracing::warn!(
                                    camera = %self.config.address,
                                    "event queue closed, stopping connection"
                                );
                                break;
                            }
                        }
                    }
                }
            }

            if ended {
                break Ok(StreamEnd::Clean);
            }
            if self.events.is_closed() {
                break Ok(StreamEnd::Stopped);
            }
        };

        tracing::info!(
            camera = %self.config.address,
            events = correlator.events_emitted(),
            orphaned_images = correlator.orphaned_images(),
            heartbeats = correlator.heartbeats(),
            "stream session ended"
        );

        outcome
    }
}

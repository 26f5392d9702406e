//! # plategate
//!
//! Ingestion core for fixed-position license-plate cameras. Each device
//! exposes an endless `multipart/x-mixed-replace` HTTP stream of detection
//! metadata and capture images; this crate keeps one resilient connection
//! per device, reassembles the stream into correlated [`DetectionEvent`]s,
//! and hands them to the application through a shared queue. A separate
//! on-demand probe reports whether a device's digital alarm output is
//! currently energized.
//!
//! # Architecture
//!
//! ```text
//!   camera ──HTTP chunks──► MultipartParser ──parts──► EventCorrelator
//!                                 │                          │
//!                        CameraConnection            DetectionEvent
//!                        (reconnect/backoff)                 │
//!                                 │                          ▼
//!                           CameraFleet ────────────► shared queue
//!                                 │                          │
//!                          probe(address)                 drain()
//!                                 ▼                          ▼
//!                           alarm output                 consumer
//! ```
//!
//! Bytes flow one direction: network → parser → correlator → queue →
//! consumer. The alarm probe is an independent request/response path
//! routed through the fleet. Producers never block on the consumer; the
//! queue is unbounded.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use plategate::{CameraConfig, CameraFleet};
//!
//! # async fn example() {
//! let fleet = CameraFleet::new([
//!     CameraConfig::new("192.168.1.106")
//!         .credentials("admin", "secret")
//!         .alarm_channel(0),
//! ]);
//! fleet.start();
//!
//! loop {
//!     for event in fleet.drain(10, Duration::from_millis(500)).await {
//!         println!("{} seen by {}", event.plate, event.device_address);
//!     }
//! }
//! # }
//! ```

pub mod camera;
pub mod error;
pub mod event;
pub mod fleet;
pub mod notify;
pub mod protocol;
pub mod vip;
pub mod watermark;

pub use camera::{CameraConfig, CameraConnection, ConnectionState, Credentials};
pub use error::{Error, Result};
pub use event::DetectionEvent;
pub use fleet::CameraFleet;
pub use notify::TelegramNotifier;
pub use vip::{VipRecord, VipRegistry};

//! Per-camera configuration

use std::time::Duration;

use crate::protocol::constants::*;

/// Credential pair for the device's digest challenge
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account name on the device
    pub username: String,
    /// Account password
    pub password: String,
}

/// Configuration for one camera connection
///
/// Immutable after construction; the connection task owns a copy and the
/// fleet keeps another for probe routing.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Device address (host or host:port), the stable key for this camera
    pub address: String,

    /// Credentials for the per-request digest challenge (None = no auth)
    pub credentials: Option<Credentials>,

    /// Bit index of the digital alarm output to probe (None = unconfigured)
    pub alarm_channel: Option<u32>,

    /// Event code that qualifies a metadata part as a plate detection
    pub event_code: String,

    /// Video channel requested from the device
    pub channel: u32,

    /// Heartbeat interval requested from the device, in seconds
    pub heartbeat_secs: u32,

    /// TCP connect timeout for the streaming request
    pub connect_timeout: Duration,

    /// Per-chunk read timeout on the event stream
    pub read_timeout: Duration,

    /// Total timeout for one alarm probe request
    pub probe_timeout: Duration,

    /// Window for the polling probe variant
    pub probe_window: Duration,

    /// Pause between attempts for the polling probe variant
    pub probe_interval: Duration,

    /// Backoff after a transient network failure
    pub short_backoff: Duration,

    /// Backoff after an unclassified internal fault
    pub long_backoff: Duration,
}

impl CameraConfig {
    /// Create a config for the given device address with protocol defaults
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credentials: None,
            alarm_channel: None,
            event_code: DEFAULT_EVENT_CODE.to_string(),
            channel: DEFAULT_CHANNEL,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_window: DEFAULT_PROBE_WINDOW,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            short_backoff: SHORT_BACKOFF,
            long_backoff: LONG_BACKOFF,
        }
    }

    /// Set the credential pair
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Set the alarm output channel index
    pub fn alarm_channel(mut self, index: u32) -> Self {
        self.alarm_channel = Some(index);
        self
    }

    /// Set the qualifying event code
    pub fn event_code(mut self, code: impl Into<String>) -> Self {
        self.event_code = code.into();
        self
    }

    /// Set the video channel
    pub fn channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    /// Set the requested heartbeat interval
    pub fn heartbeat_secs(mut self, secs: u32) -> Self {
        self.heartbeat_secs = secs;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-chunk read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the alarm probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the polling probe window and interval
    pub fn probe_window(mut self, window: Duration, interval: Duration) -> Self {
        self.probe_window = window;
        self.probe_interval = interval;
        self
    }

    /// Set both backoff durations
    pub fn backoff(mut self, short: Duration, long: Duration) -> Self {
        self.short_backoff = short;
        self.long_backoff = long;
        self
    }

    /// URL of the streaming event endpoint
    ///
    /// The bracket characters in the `Events` filter are pre-encoded; the
    /// firmware rejects the request otherwise.
    pub fn stream_url(&self) -> String {
        format!(
            "http://{}{}?action=attachFileProc&channel={}&heartbeat={}&Flags[0]=Event&Events=%5B{}%5D",
            self.address, SNAP_MANAGER_PATH, self.channel, self.heartbeat_secs, self.event_code
        )
    }

    /// URL of the alarm output status endpoint
    pub fn alarm_url(&self) -> String {
        format!("http://{}{}", self.address, ALARM_STATE_PATH)
    }

    /// Credentials as a borrowed pair, the form the protocol layer takes
    pub(crate) fn credential_pair(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|c| (c.username.as_str(), c.password.as_str()))
    }
}

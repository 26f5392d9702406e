//! Alarm output probe
//!
//! Asks the device which digital alarm outputs are currently energized.
//! The endpoint answers `result=<integer>`, a bitmask with one bit per
//! output channel.
//!
//! The probe is fail-closed: a network failure, a bad status, or a body
//! that does not parse all report "inactive". Callers treat "active" as
//! permission to act, so the probe must never report it on ambiguous
//! input.

use std::time::Duration;

use tokio::time::Instant;

use crate::camera::config::CameraConfig;
use crate::protocol::digest::get_with_digest;

/// Single-shot probe of the configured alarm output
///
/// Returns false without a network call when no alarm channel is
/// configured.
pub async fn probe(config: &CameraConfig) -> bool {
    let Some(channel) = config.alarm_channel else {
        tracing::debug!(camera = %config.address, "alarm probe skipped, channel unconfigured");
        return false;
    };
    single_shot(config, channel).await
}

/// Polling probe: repeat until the first active reading or `window` ends
///
/// Sleeps `interval` between attempts. Same fail-closed semantics per
/// attempt as [`probe`].
pub async fn probe_within(config: &CameraConfig, window: Duration, interval: Duration) -> bool {
    let Some(channel) = config.alarm_channel else {
        tracing::debug!(camera = %config.address, "alarm probe skipped, channel unconfigured");
        return false;
    };

    let start = Instant::now();
    let mut attempt = 0u32;
    while start.elapsed() < window {
        attempt += 1;
        if single_shot(config, channel).await {
            tracing::info!(
                camera = %config.address,
                channel = channel,
                attempt = attempt,
                "alarm output active"
            );
            return true;
        }
        // Only sleep if another attempt still fits in the window.
        if start.elapsed() + interval < window {
            tokio::time::sleep(interval).await;
        } else {
            break;
        }
    }

    tracing::info!(
        camera = %config.address,
        channel = channel,
        attempts = attempt,
        window_ms = window.as_millis() as u64,
        "alarm output stayed inactive through polling window"
    );
    false
}

async fn single_shot(config: &CameraConfig, channel: u32) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(config.probe_timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(camera = %config.address, error = %e, "probe client build failed");
            return false;
        }
    };

    let url = config.alarm_url();
    let resp = match get_with_digest(&client, &url, config.credential_pair()).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(camera = %config.address, error = %e, "alarm probe request failed");
            return false;
        }
    };

    if !resp.status().is_success() {
        tracing::warn!(
            camera = %config.address,
            status = resp.status().as_u16(),
            "alarm probe got non-success status"
        );
        return false;
    }

    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(camera = %config.address, error = %e, "alarm probe body read failed");
            return false;
        }
    };

    match parse_out_state(&body) {
        Some(value) => {
            let active = channel_active(value, channel);
            tracing::debug!(
                camera = %config.address,
                raw = value,
                channel = channel,
                active = active,
                "alarm output state"
            );
            active
        }
        None => {
            tracing::warn!(
                camera = %config.address,
                body = %body.trim(),
                "unexpected alarm state response"
            );
            false
        }
    }
}

/// Parse a `result=<integer>` body; anything else is `None`
fn parse_out_state(body: &str) -> Option<u64> {
    let content = body.trim();
    let value = content.strip_prefix("result=")?;
    value.trim().parse::<u64>().ok()
}

/// Test the given bit of the output-state bitmask
fn channel_active(value: u64, channel: u32) -> bool {
    value.checked_shr(channel).is_some_and(|v| v & 1 == 1)
}

//! Outbound notification delivery
//!
//! Sends detection notifications through the Telegram Bot API: a caption
//! plus the captured JPEG when one is available. Delivery is best-effort
//! and never raises: every failure path logs and reports `false` so the
//! capture pipeline keeps moving.
//!
//! A notifier constructed with a missing or placeholder token is
//! *disabled*: sends log a warning and report `true`, so callers do not
//! keep retrying a delivery that can never work.

use std::time::Duration;

use crate::event::DetectionEvent;
use crate::vip::VipRecord;

/// Production API origin; overridable for tests
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Well-known placeholder left in unconfigured deployments
const PLACEHOLDER_TOKEN: &str = "YOUR_TELEGRAM_BOT_TOKEN_HERE";

/// Total timeout per delivery attempt
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters MarkdownV2 reserves
const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape text for a MarkdownV2 message body
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render the standard detection caption for a VIP match
pub fn format_caption(event: &DetectionEvent, vip: &VipRecord) -> String {
    format!(
        "🟢 Gate notification: {}\n\
         ------------------------\n\
         🚗 Plate: {}\n\
         👤 Owner: {}\n\
         🏠 House: {}\n\
         🏗 Land: {}\n\
         ⏰ Time: {}\n\
         📷 Camera: {}",
        vip.kind,
        event.plate,
        vip.owner_name,
        vip.house_number,
        vip.land_number,
        event.captured_at.format("%Y-%m-%d %H:%M:%S"),
        event.device_address,
    )
}

/// Telegram Bot API notifier
pub struct TelegramNotifier {
    /// None when delivery is disabled
    token: Option<String>,
    api_base: String,
}

impl TelegramNotifier {
    /// Create a notifier; a missing or placeholder token disables it
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = if token.is_empty()
            || token == PLACEHOLDER_TOKEN
            || token.ends_with("_PLACEHOLDER")
        {
            tracing::warn!("bot token missing or placeholder, notifications disabled");
            None
        } else {
            Some(token)
        };

        Self {
            token,
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    /// Point the notifier at a different API origin (tests)
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Whether deliveries will actually go out
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Send a text-only notification
    pub async fn send_text(&self, chat_id: &str, text: &str) -> bool {
        let Some(token) = &self.token else {
            tracing::warn!(chat_id = %chat_id, "notifier disabled, dropping text message");
            return true;
        };
        if chat_id.trim().is_empty() {
            tracing::warn!("empty chat id, cannot deliver message");
            return false;
        }

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.trim().to_string())
            .text("text", escape_markdown(text))
            .text("parse_mode", "MarkdownV2");

        self.post(token, "sendMessage", form, chat_id).await
    }

    /// Send a detection notification, with the capture attached if present
    ///
    /// Falls back to a text-only message when no image bytes are given.
    pub async fn send_detection(
        &self,
        chat_id: &str,
        caption: &str,
        image: Option<&[u8]>,
    ) -> bool {
        let Some(image) = image else {
            tracing::warn!(chat_id = %chat_id, "no image for detection, sending text only");
            return self.send_text(chat_id, caption).await;
        };
        let Some(token) = &self.token else {
            tracing::warn!(chat_id = %chat_id, "notifier disabled, dropping detection");
            return true;
        };
        if chat_id.trim().is_empty() {
            tracing::warn!("empty chat id, cannot deliver detection");
            return false;
        }

        let photo = match reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("plate.jpg")
            .mime_str("image/jpeg")
        {
            Ok(part) => part,
            Err(e) => {
                tracing::error!(error = %e, "building photo part failed");
                return false;
            }
        };

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.trim().to_string())
            .text("caption", escape_markdown(caption))
            .text("parse_mode", "MarkdownV2")
            .part("photo", photo);

        self.post(token, "sendPhoto", form, chat_id).await
    }

    async fn post(
        &self,
        token: &str,
        method: &str,
        form: reqwest::multipart::Form,
        chat_id: &str,
    ) -> bool {
        let client = match reqwest::Client::builder().timeout(SEND_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "notifier client build failed");
                return false;
            }
        };

        let url = format!("{}/bot{}/{}", self.api_base, token, method);
        match client.post(&url).multipart(form).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(chat_id = %chat_id, method = method, "notification delivered");
                true
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(
                    chat_id = %chat_id,
                    method = method,
                    status = status,
                    body = %body,
                    "notification rejected"
                );
                false
            }
            Err(e) => {
                tracing::error!(chat_id = %chat_id, method = method, error = %e, "notification send failed");
                false
            }
        }
    }
}

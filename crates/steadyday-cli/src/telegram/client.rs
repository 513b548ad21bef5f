//! Bot API client implementing the core [`Messenger`] contract.
//!
//! Every Bot API failure is folded into a [`DeliveryError`] so the core's
//! retry policy can tell transient faults from permanent ones.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use steadyday_core::error::DeliveryError;
use steadyday_core::messenger::{EditOutcome, Keyboard, Messenger};

use super::types::{ApiResponse, InlineKeyboardMarkup, Update};

/// Extra time on top of the long-poll timeout before the HTTP call gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TelegramMessenger {
    client: Client,
    base: String,
}

impl TelegramMessenger {
    /// `api_base` is e.g. `https://api.telegram.org`; tests point it at a mock server.
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, DeliveryError> {
        let response = self
            .client
            .post(self.url(method))
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, DeliveryError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let response = self
            .client
            .post(self.url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    /// Acknowledge a button press, optionally with a short toast.
    pub async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), DeliveryError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
            body["show_alert"] = json!(true);
        }
        self.call::<Value>("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Bot username, used to check the token at startup.
    pub async fn get_me(&self) -> Result<String, DeliveryError> {
        let me: Value = self.call("getMe", &json!({})).await?;
        Ok(me["username"].as_str().unwrap_or_default().to_string())
    }
}

fn with_markup(mut body: Value, keyboard: Option<&Keyboard>) -> Value {
    if let Some(keyboard) = keyboard.filter(|k| !k.is_empty()) {
        body["reply_markup"] = json!(InlineKeyboardMarkup::from(keyboard));
    }
    body
}

fn network(err: reqwest::Error) -> DeliveryError {
    DeliveryError::Network(err.to_string())
}

/// Unwrap the Bot API envelope, mapping failures by status code.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DeliveryError> {
    let status = response.status();
    let raw = response.text().await.map_err(network)?;
    let envelope: ApiResponse<T> = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(DeliveryError::Other(format!("malformed response: {e}")))
        }
        Err(_) => return Err(classify(status, raw, None)),
    };
    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| DeliveryError::Other("response without result".into()));
    }
    let description = envelope.description.unwrap_or_default();
    let status = envelope
        .error_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(status);
    let retry_after = envelope.parameters.and_then(|p| p.retry_after);
    Err(classify(status, description, retry_after))
}

pub(crate) fn classify(status: StatusCode, description: String, retry_after: Option<u64>) -> DeliveryError {
    match status.as_u16() {
        429 => DeliveryError::RateLimited {
            retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
        },
        403 => DeliveryError::Forbidden(description),
        400 => DeliveryError::BadRequest(description),
        500..=599 => DeliveryError::Network(format!("HTTP {status}: {description}")),
        _ => DeliveryError::Other(format!("HTTP {status}: {description}")),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, user_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<(), DeliveryError> {
        let body = with_markup(json!({ "chat_id": user_id, "text": text }), keyboard);
        self.call::<Value>("sendMessage", &body).await?;
        Ok(())
    }

    async fn edit_previous_message(
        &self,
        user_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<EditOutcome, DeliveryError> {
        let body = with_markup(
            json!({ "chat_id": user_id, "message_id": message_id, "text": text }),
            keyboard,
        );
        match self.call::<Value>("editMessageText", &body).await {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(DeliveryError::BadRequest(desc)) if desc.contains("message is not modified") => {
                Ok(EditOutcome::Unchanged)
            }
            Err(DeliveryError::BadRequest(desc))
                if desc.contains("message to edit not found")
                    || desc.contains("message can't be edited") =>
            {
                debug!(user_id, message_id, "message no longer editable");
                Ok(EditOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    async fn send_document(
        &self,
        user_id: i64,
        filename: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let form = Form::new()
            .text("chat_id", user_id.to_string())
            .text("caption", caption.to_string())
            .part("document", Part::bytes(content).file_name(filename.to_string()));
        let response = self
            .client
            .post(self.url("sendDocument"))
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        decode::<Value>(response).await?;
        Ok(())
    }
}

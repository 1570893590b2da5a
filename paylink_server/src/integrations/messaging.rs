use std::time::Duration;

use log::*;
use paylink_engine::traits::{MessageReceipt, MessagingChannel, MessagingError};
use plg_common::Secret;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::{config::MessagingConfig, errors::ServerError};

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    message: &'a str,
}

/// Delivers reminders by POSTing `{"to", "message"}` to a messaging relay (an SMS or WhatsApp gateway, typically).
///
/// The relay answers with a JSON object carrying the provider's `message_id` (or `id`).
#[derive(Clone)]
pub struct HttpMessenger {
    url: Option<String>,
    token: Secret<String>,
    client: Client,
}

impl HttpMessenger {
    pub fn new(config: &MessagingConfig) -> Result<Self, ServerError> {
        let timeout = if config.timeout.is_zero() { Duration::from_secs(20) } else { config.timeout };
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not build the messaging client. {e}")))?;
        Ok(Self { url: config.url.clone(), token: config.token.clone(), client })
    }
}

impl MessagingChannel for HttpMessenger {
    async fn send_message(&self, contact: &str, text: &str) -> Result<MessageReceipt, MessagingError> {
        let url = self.url.as_deref().ok_or(MessagingError::Unavailable)?;
        let mut req = self.client.post(url).json(&OutboundMessage { to: contact, message: text });
        if !self.token.is_blank() {
            req = req.bearer_auth(self.token.reveal());
        }
        let res = req.send().await.map_err(|e| {
            if e.is_timeout() {
                MessagingError::Timeout
            } else {
                MessagingError::Transport(e.to_string())
            }
        })?;
        let status = res.status();
        let body = res.text().await.map_err(|e| MessagingError::Transport(e.to_string()))?;
        match status {
            s if s.is_success() => {
                let message_id = message_id_from(&body).unwrap_or_else(|| {
                    debug!("⏰️ Messaging relay did not return a message id");
                    String::from("unknown")
                });
                Ok(MessageReceipt { message_id })
            },
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(MessagingError::Transport(format!("{s}. {body}")))
            },
            s => Err(MessagingError::Rejected(format!("{s}. {body}"))),
        }
    }
}

fn message_id_from(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    let id = value.get("message_id").or_else(|| value.get("id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

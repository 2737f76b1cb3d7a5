use chrono::Utc;
use reqwest;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

use crate::models::{DeliveryReport, Lead, NotificationOutcome};

/// Business number that receives lead notifications by default.
pub const DEFAULT_TARGET_NUMBER: &str = "5518996392316";

/// How lead notifications leave the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// No API credentials configured. Messages are logged and reported as
    /// sent so that demo and development environments never block on it.
    Offline,
    /// Messages are posted to `{base_url}/messages` with bearer auth.
    Api { base_url: String, api_key: String },
}

impl DeliveryMode {
    /// `Api` only when both values are present and non-blank.
    pub fn from_credentials(base_url: Option<String>, api_key: Option<String>) -> Self {
        match (
            base_url.filter(|s| !s.trim().is_empty()),
            api_key.filter(|s| !s.trim().is_empty()),
        ) {
            (Some(base_url), Some(api_key)) => DeliveryMode::Api {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            },
            _ => DeliveryMode::Offline,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, DeliveryMode::Offline)
    }
}

/// Anything that can tell the business about a new lead.
///
/// Implementations report failure through [`DeliveryReport`]; they do not
/// return errors.
pub trait LeadNotifier: Send + Sync + 'static {
    fn send_lead_notification(&self, lead: &Lead) -> impl Future<Output = DeliveryReport> + Send;
}

/// Renders the WhatsApp message for a lead.
///
/// The message section only appears when the lead carries one.
pub fn format_lead_message(lead: &Lead) -> String {
    let message_section = match lead.message.as_deref() {
        Some(message) if !message.trim().is_empty() => {
            format!("\n💬 *Mensagem:*\n{}\n", message)
        }
        _ => String::new(),
    };

    format!(
        "📋 *Novo Lead - ID3N*\n\
         \n\
         👤 *Nome:* {}\n\
         📧 *Email:* {}\n\
         📱 *Telefone:* {}\n\
         🆔 *CPF:* {}\n\
         🏢 *Empresa:* {}\n\
         💼 *Serviço:* {}\n\
         {}\n\
         _Mensagem enviada automaticamente pelo sistema ID3N_",
        lead.name,
        lead.email,
        lead.phone,
        lead.cpf,
        lead.company,
        lead.service,
        message_section
    )
}

/// Builds a `wa.me` link that opens WhatsApp with `message` prefilled.
pub fn web_link(message: &str, phone_number: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    format!("https://wa.me/{}?text={}", phone_number, encoded)
}

/// Sends lead notifications through the WhatsApp messaging API.
#[derive(Clone)]
pub struct WhatsAppNotifier {
    client: reqwest::Client,
    mode: DeliveryMode,
    target_number: String,
}

impl WhatsAppNotifier {
    /// Creates a new `WhatsAppNotifier`.
    ///
    /// # Arguments
    ///
    /// * `mode` - Offline or API delivery.
    /// * `target_number` - Number that receives lead notifications.
    pub fn new(mode: DeliveryMode, target_number: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create WhatsApp client: {}", e))?;

        Ok(Self {
            client,
            mode,
            target_number: target_number.into(),
        })
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    pub fn target_number(&self) -> &str {
        &self.target_number
    }

    /// Makes a single delivery attempt of `message` to `destination`.
    ///
    /// Never fails: offline mode reports success with a local id, and every
    /// API or transport problem becomes a failed [`NotificationOutcome`].
    pub async fn dispatch(&self, message: &str, destination: &str) -> NotificationOutcome {
        let (base_url, api_key) = match &self.mode {
            DeliveryMode::Offline => {
                tracing::warn!(
                    "[WhatsApp] API credentials not configured. Message will be logged but not sent."
                );
                tracing::info!("[WhatsApp] Message for {}:\n{}", destination, message);
                tracing::debug!("[WhatsApp] Web link: {}", web_link(message, destination));
                return NotificationOutcome::delivered(Some(format!(
                    "local-{}",
                    Utc::now().timestamp_millis()
                )));
            }
            DeliveryMode::Api { base_url, api_key } => (base_url, api_key),
        };

        let url = format!("{}/messages", base_url);
        tracing::info!("Sending WhatsApp message to {}", destination);

        let body = json!({
            "to": destination,
            "body": message
        });

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("[WhatsApp] Error sending message: {}", e);
                return NotificationOutcome::failed(e.to_string());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("[WhatsApp] API returned {}: {}", status, error_text);
            return NotificationOutcome::failed(format!("WhatsApp API error: {}", status));
        }

        // The id is informational; a 2xx without a parseable body still counts as sent
        let message_id = match response.json::<Value>().await {
            Ok(data) => data
                .get("messageId")
                .or_else(|| data.get("sid"))
                .and_then(|id| match id {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
            Err(e) => {
                tracing::debug!("[WhatsApp] Response body not JSON: {}", e);
                None
            }
        };

        tracing::info!("✓ WhatsApp message sent ({:?})", message_id);
        NotificationOutcome::delivered(message_id)
    }

    /// Formats and dispatches the notification for `lead` to the target number.
    pub async fn send_lead_notification(&self, lead: &Lead) -> DeliveryReport {
        let message = format_lead_message(lead);
        let outcome = self.dispatch(&message, &self.target_number).await;
        DeliveryReport::from(outcome)
    }
}

impl LeadNotifier for WhatsAppNotifier {
    async fn send_lead_notification(&self, lead: &Lead) -> DeliveryReport {
        WhatsAppNotifier::send_lead_notification(self, lead).await
    }
}

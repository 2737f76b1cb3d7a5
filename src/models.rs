use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::{is_valid_cpf, is_valid_email, is_valid_phone};

// ============ Stored Records ============

/// A contact request submitted through the site's contact form.
///
/// Every field except `notification_sent` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Generated identifier, `lead-<unix-millis>-<random suffix>`.
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// CPF exactly as submitted (formatted or bare).
    pub cpf: String,
    pub company: String,
    /// Service category picked in the form (e.g. "Desenvolvimento Web").
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether the WhatsApp notification for this lead was delivered.
    #[serde(default)]
    pub notification_sent: bool,
    /// Creation time, millisecond precision.
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Builds a fresh record from validated fields with a new id and timestamp.
    pub fn from_new(fields: NewLead) -> Self {
        Self {
            id: generate_lead_id(),
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            cpf: fields.cpf,
            company: fields.company,
            service: fields.service,
            message: fields.message,
            notification_sent: false,
            created_at: Utc::now().trunc_subsecs(3),
        }
    }
}

/// Generates a lead id: creation time in milliseconds plus a 9-character random suffix.
pub fn generate_lead_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("lead-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// Validated fields of a lead that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub company: String,
    pub service: String,
    pub message: Option<String>,
}

// ============ Intake Payloads ============

/// Raw contact-form payload as received over the wire.
///
/// Missing fields deserialize as empty strings so every required-field
/// violation is reported the same way by [`NewLead::try_from`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeadSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub company: String,
    pub service: String,
    pub message: Option<String>,
}

/// Reasons a submission is rejected before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Invalid input: payload must be a JSON object")]
    NotAnObject,
    #[error("Invalid input: {0}")]
    Malformed(String),
    #[error("Field '{0}' is required")]
    MissingField(&'static str),
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Invalid phone number")]
    InvalidPhone,
    #[error("Invalid CPF")]
    InvalidCpf,
}

fn required(value: String, field: &'static str) -> Result<String, SubmissionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SubmissionError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

impl LeadSubmission {
    /// Parses an arbitrary JSON value into a submission.
    ///
    /// Anything other than a JSON object is rejected outright.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SubmissionError> {
        if !value.is_object() {
            return Err(SubmissionError::NotAnObject);
        }
        serde_json::from_value(value).map_err(|e| SubmissionError::Malformed(e.to_string()))
    }
}

impl TryFrom<LeadSubmission> for NewLead {
    type Error = SubmissionError;

    fn try_from(raw: LeadSubmission) -> Result<Self, Self::Error> {
        let lead = NewLead {
            name: required(raw.name, "name")?,
            email: required(raw.email, "email")?,
            phone: required(raw.phone, "phone")?,
            cpf: required(raw.cpf, "cpf")?,
            company: required(raw.company, "company")?,
            service: required(raw.service, "service")?,
            message: raw
                .message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        };

        if !is_valid_email(&lead.email) {
            return Err(SubmissionError::InvalidEmail);
        }
        if !is_valid_phone(&lead.phone) {
            return Err(SubmissionError::InvalidPhone);
        }
        if !is_valid_cpf(&lead.cpf) {
            return Err(SubmissionError::InvalidCpf);
        }

        Ok(lead)
    }
}

// ============ Notification Results ============

/// Result of a single dispatch attempt to the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Simplified outcome of notifying about a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<NotificationOutcome> for DeliveryReport {
    fn from(outcome: NotificationOutcome) -> Self {
        if outcome.success {
            return Self {
                success: true,
                error: None,
            };
        }
        Self {
            success: false,
            error: Some(
                outcome
                    .error
                    .unwrap_or_else(|| "Failed to send message".to_string()),
            ),
        }
    }
}

/// Response of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub success: bool,
    pub lead: Lead,
}

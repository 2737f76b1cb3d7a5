/// Lead intake pipeline shared by every entry point.
///
/// A submission goes through, in order:
/// 1. Coerce the raw payload into a typed, validated [`NewLead`]
/// 2. Persist it (hard failure if this does not commit)
/// 3. Notify the business (best-effort, failures only logged)
/// 4. Return the stored lead
use serde_json::Value;
use std::sync::Arc;

use crate::models::{Lead, LeadSubmission, NewLead, SubmissionError, SubmitResult};
use crate::notification::LeadNotifier;
use crate::storage::{LeadStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The payload was rejected; nothing was stored.
    #[error(transparent)]
    Input(#[from] SubmissionError),
    /// The lead could not be stored.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Orchestrates validation, persistence, and notification for new leads.
pub struct IntakeService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> Clone for IntakeService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S: LeadStore, N: LeadNotifier> IntakeService<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Accepts a raw JSON payload from the contact form.
    pub async fn submit(&self, payload: Value) -> Result<SubmitResult, IntakeError> {
        let fields = LeadSubmission::from_value(payload).and_then(NewLead::try_from);
        let fields = match fields {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Rejected lead submission: {}", e);
                return Err(e.into());
            }
        };

        self.submit_lead(fields).await
    }

    /// Stores an already validated lead, then notifies about it.
    pub async fn submit_lead(&self, fields: NewLead) -> Result<SubmitResult, IntakeError> {
        let mut lead = self.store.add(fields).await.map_err(|e| {
            tracing::error!("Failed to persist lead: {}", e);
            e
        })?;
        tracing::info!("✓ Lead {} stored ({} / {})", lead.id, lead.company, lead.service);

        if self.notify(&lead).await {
            lead.notification_sent = true;
        }

        Ok(SubmitResult {
            success: true,
            lead,
        })
    }

    /// Runs the notifier on its own task so that a panic inside it is contained.
    ///
    /// Returns whether the delivery was recorded on the stored lead.
    async fn notify(&self, lead: &Lead) -> bool {
        let notifier = self.notifier.clone();
        let payload = lead.clone();
        let task = tokio::spawn(async move { notifier.send_lead_notification(&payload).await });

        let report = match task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Error sending WhatsApp notification for {}: {}", lead.id, e);
                return false;
            }
        };

        if !report.success {
            tracing::warn!(
                "WhatsApp notification for {} failed: {}",
                lead.id,
                report.error.as_deref().unwrap_or("unknown error")
            );
            return false;
        }

        match self.store.mark_notified(&lead.id).await {
            Ok(marked) => marked,
            Err(e) => {
                tracing::warn!("Could not record notification for {}: {}", lead.id, e);
                false
            }
        }
    }
}

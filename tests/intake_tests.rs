/// Tests for the lead intake pipeline
/// Covers persistence-first ordering and isolation of notification failures
use lead_intake_api::intake::{IntakeError, IntakeService};
use lead_intake_api::models::{DeliveryReport, Lead, NewLead, SubmissionError};
use lead_intake_api::notification::LeadNotifier;
use lead_intake_api::storage::{JsonFileStore, LeadStore, StoreError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn joao_payload() -> serde_json::Value {
    json!({
        "name": "João Silva",
        "email": "joao@example.com",
        "phone": "(11) 99999-9999",
        "cpf": "123.456.789-09",
        "company": "Tech Co",
        "service": "Desenvolvimento Web"
    })
}

/// Notifier that panics mid-delivery
struct PanickingNotifier;

impl LeadNotifier for PanickingNotifier {
    async fn send_lead_notification(&self, _lead: &Lead) -> DeliveryReport {
        panic!("WhatsApp client exploded");
    }
}

/// Notifier that always succeeds and counts calls
#[derive(Default)]
struct RecordingNotifier {
    calls: AtomicUsize,
}

impl LeadNotifier for RecordingNotifier {
    async fn send_lead_notification(&self, _lead: &Lead) -> DeliveryReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DeliveryReport {
            success: true,
            error: None,
        }
    }
}

/// Store whose writes always fail
#[derive(Default)]
struct BrokenStore {
    add_attempts: AtomicUsize,
}

impl LeadStore for BrokenStore {
    async fn add(&self, _fields: NewLead) -> Result<Lead, StoreError> {
        self.add_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Write("disk full".to_string()))
    }

    async fn get_by_id(&self, _id: &str) -> Result<Option<Lead>, StoreError> {
        Ok(None)
    }

    async fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(Vec::new())
    }

    async fn delete_by_id(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn mark_notified(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[cfg(test)]
mod submission_tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_succeeds_even_if_notifier_panics() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let service = IntakeService::new(store.clone(), Arc::new(PanickingNotifier));

        let result = service.submit(joao_payload()).await.unwrap();

        assert!(result.success);
        assert!(result.lead.id.starts_with("lead-"));
        assert!(!result.lead.notification_sent);

        let stored = store.list_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "João Silva");
        assert_eq!(stored[0].cpf, "123.456.789-09");
    }

    #[tokio::test]
    async fn test_non_object_payload_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let notifier = Arc::new(RecordingNotifier::default());
        let service = IntakeService::new(store.clone(), notifier.clone());

        for payload in [json!("João Silva"), json!(null), json!(7), json!([joao_payload()])] {
            let err = service.submit(payload).await.unwrap_err();
            assert!(matches!(err, IntakeError::Input(SubmissionError::NotAnObject)));
        }

        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_required_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let service = IntakeService::new(store.clone(), Arc::new(RecordingNotifier::default()));

        let empty = json!({
            "name": "",
            "email": "",
            "phone": "",
            "cpf": "",
            "company": "",
            "service": ""
        });
        let err = service.submit(empty).await.unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Input(SubmissionError::MissingField("name"))
        ));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cpf_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let service = IntakeService::new(store.clone(), Arc::new(RecordingNotifier::default()));

        let mut payload = joao_payload();
        payload["cpf"] = json!("111.111.111-11");

        let err = service.submit(payload).await.unwrap_err();
        assert!(matches!(err, IntakeError::Input(SubmissionError::InvalidCpf)));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_surfaced_and_skips_notification() {
        let store = Arc::new(BrokenStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = IntakeService::new(store.clone(), notifier.clone());

        let err = service.submit(joao_payload()).await.unwrap_err();

        assert!(matches!(err, IntakeError::Persistence(StoreError::Write(_))));
        assert_eq!(store.add_attempts.load(Ordering::SeqCst), 1);
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_optional_message_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let service = IntakeService::new(store.clone(), Arc::new(RecordingNotifier::default()));

        let payload = json!({
            "name": "Maria Santos",
            "email": "maria@example.com",
            "phone": "(21) 98888-8888",
            "cpf": "111.444.777-35",
            "company": "Digital Agency",
            "service": "Design UI/UX",
            "message": "Gostaria de um orçamento"
        });

        let result = service.submit(payload).await.unwrap();
        assert_eq!(result.lead.message.as_deref(), Some("Gostaria de um orçamento"));
        assert!(result.lead.notification_sent);
    }

    #[tokio::test]
    async fn test_identical_submissions_create_distinct_leads() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::in_dir(dir.path()));
        let service = IntakeService::new(store.clone(), Arc::new(RecordingNotifier::default()));

        let first = service.submit(joao_payload()).await.unwrap();
        let second = service.submit(joao_payload()).await.unwrap();

        assert_ne!(first.lead.id, second.lead.id);
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.lead.id);
        assert_eq!(all[1].id, second.lead.id);
    }
}

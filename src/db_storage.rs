use sqlx::PgPool;
use tokio::sync::{Mutex, OnceCell};

use crate::models::{generate_lead_id, Lead, NewLead};
use crate::storage::{LeadStore, StoreError};

const CREATE_LEADS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS leads (
    seq BIGSERIAL PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    cpf TEXT NOT NULL,
    company TEXT NOT NULL,
    service TEXT NOT NULL,
    message TEXT,
    notification_sent BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const LEAD_COLUMNS: &str =
    "id, name, email, phone, cpf, company, service, message, notification_sent, created_at";

/// Lead storage in a PostgreSQL `leads` table.
///
/// `seq` keeps insertion order; `id` is the public identifier. The table is
/// created on first use, and a failed attempt is retried on the next call.
pub struct PgLeadStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
    insert_lock: Mutex<()>,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
            insert_lock: Mutex::new(()),
        }
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(CREATE_LEADS_TABLE).execute(&self.pool).await?;
                tracing::info!("[Database] leads table ready");
                Ok::<(), sqlx::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn ready(&self) -> Result<(), StoreError> {
        self.ensure_schema().await.map_err(|e| {
            tracing::warn!("[Database] Lead storage not available: {}", e);
            StoreError::Unavailable(e.to_string())
        })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    tracing::warn!("[Database] Lead query failed: {}", e);
    StoreError::Unavailable(e.to_string())
}

impl LeadStore for PgLeadStore {
    async fn add(&self, fields: NewLead) -> Result<Lead, StoreError> {
        self.ensure_schema().await.map_err(|e| {
            tracing::error!("[Database] Cannot store lead: {}", e);
            StoreError::Write(e.to_string())
        })?;

        let _guard = self.insert_lock.lock().await;
        let mut lead = Lead::from_new(fields);

        loop {
            let inserted = sqlx::query(
                r#"
                INSERT INTO leads (id, name, email, phone, cpf, company, service, message, notification_sent, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&lead.id)
            .bind(&lead.name)
            .bind(&lead.email)
            .bind(&lead.phone)
            .bind(&lead.cpf)
            .bind(&lead.company)
            .bind(&lead.service)
            .bind(&lead.message)
            .bind(lead.notification_sent)
            .bind(lead.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("[Database] Failed to insert lead: {}", e);
                StoreError::Write(e.to_string())
            })?;

            if inserted.rows_affected() == 1 {
                break;
            }
            lead.id = generate_lead_id();
        }

        tracing::info!("[Database] Stored lead {}", lead.id);
        Ok(lead)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lead>, StoreError> {
        self.ready().await?;

        sqlx::query_as::<_, Lead>(&format!("SELECT {} FROM leads WHERE id = $1", LEAD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        self.ready().await?;

        sqlx::query_as::<_, Lead>(&format!("SELECT {} FROM leads ORDER BY seq ASC", LEAD_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        self.ready().await?;

        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_notified(&self, id: &str) -> Result<bool, StoreError> {
        self.ready().await?;

        let result = sqlx::query("UPDATE leads SET notification_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected() > 0)
    }
}

//! History Recorder: projects run outcomes into durable per-user records.
//!
//! Records are append-only. Queries only ever return the owner's own rows.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::apply::outcome::{ApplicationResult, MatchOutcome};
use crate::models::application::ApplicationRequest;
use crate::models::history::{ApplicationHistoryRecord, TrackApplicationRequest};

const MANUAL_TRACK_REASON: &str = "Tracked manually";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn persist(&self, record: &ApplicationHistoryRecord) -> Result<(), HistoryError>;

    /// Newest first.
    async fn list_for_owner(
        &self,
        owner_identity: &str,
    ) -> Result<Vec<ApplicationHistoryRecord>, HistoryError>;

    async fn persist_all(&self, records: &[ApplicationHistoryRecord]) -> Result<(), HistoryError> {
        for record in records {
            self.persist(record).await?;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Projection
// ────────────────────────────────────────────────────────────────────────────

/// One record per outcome, in the order the outcomes were decided.
pub fn project_run(
    request: &ApplicationRequest,
    result: &ApplicationResult,
) -> Vec<ApplicationHistoryRecord> {
    result
        .matches
        .iter()
        .map(|outcome| project_outcome(request, outcome))
        .collect()
}

fn project_outcome(request: &ApplicationRequest, outcome: &MatchOutcome) -> ApplicationHistoryRecord {
    ApplicationHistoryRecord {
        id: Uuid::new_v4(),
        owner_identity: request.requester_identity.clone(),
        job_title: request.job_title.clone(),
        company_name: company_from_display_text(&outcome.display_text),
        job_url: outcome.url.clone(),
        status: outcome.status.label().to_string(),
        match_score: outcome.status.score(),
        match_reason: outcome.status.reason().to_string(),
        applied_at: outcome.decided_at,
        resume_id: request.candidate_profile.resume_id.clone(),
    }
}

/// Record for an application the user made outside the pipeline.
pub fn tracked_record(owner_identity: &str, req: TrackApplicationRequest) -> ApplicationHistoryRecord {
    ApplicationHistoryRecord {
        id: Uuid::new_v4(),
        owner_identity: owner_identity.to_string(),
        job_title: req.job_title.trim().to_string(),
        company_name: req
            .company_name
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        job_url: req.job_url.trim().to_string(),
        status: req.status,
        match_score: None,
        match_reason: MANUAL_TRACK_REASON.to_string(),
        applied_at: Utc::now(),
        resume_id: None,
    }
}

/// Listing links usually read "<title> at <company>" or "<title> - <company>".
fn company_from_display_text(text: &str) -> Option<String> {
    text.rsplit_once(" at ")
        .or_else(|| text.rsplit_once(" - "))
        .map(|(_, company)| company.trim().to_string())
        .filter(|company| !company.is_empty())
}

/// Persists every outcome of a finished run for the requester.
pub async fn record_run(
    store: &dyn HistoryStore,
    request: &ApplicationRequest,
    result: &ApplicationResult,
) -> Result<usize, HistoryError> {
    let records = project_run(request, result);
    store.persist_all(&records).await?;
    info!(
        "Recorded {} history entries for {}",
        records.len(),
        request.requester_identity
    );
    Ok(records.len())
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL store
// ────────────────────────────────────────────────────────────────────────────

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_RECORD: &str = r#"
    INSERT INTO job_applications
        (id, owner_identity, job_title, company_name, job_url, status,
         match_score, match_reason, applied_at, resume_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

fn bind_record<'q>(
    record: &'q ApplicationHistoryRecord,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_RECORD)
        .bind(record.id)
        .bind(&record.owner_identity)
        .bind(&record.job_title)
        .bind(&record.company_name)
        .bind(&record.job_url)
        .bind(&record.status)
        .bind(record.match_score)
        .bind(&record.match_reason)
        .bind(record.applied_at)
        .bind(&record.resume_id)
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn persist(&self, record: &ApplicationHistoryRecord) -> Result<(), HistoryError> {
        bind_record(record).execute(&self.pool).await?;
        Ok(())
    }

    async fn persist_all(&self, records: &[ApplicationHistoryRecord]) -> Result<(), HistoryError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            bind_record(record).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_for_owner(
        &self,
        owner_identity: &str,
    ) -> Result<Vec<ApplicationHistoryRecord>, HistoryError> {
        Ok(sqlx::query_as::<_, ApplicationHistoryRecord>(
            r#"
            SELECT id, owner_identity, job_title, company_name, job_url, status,
                   match_score, match_reason, applied_at, resume_id
            FROM job_applications
            WHERE owner_identity = $1
            ORDER BY applied_at DESC, seq DESC
            "#,
        )
        .bind(owner_identity)
        .fetch_all(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store keyed by owner.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: tokio::sync::RwLock<std::collections::HashMap<String, Vec<ApplicationHistoryRecord>>>,
}

#[cfg(test)]
#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn persist(&self, record: &ApplicationHistoryRecord) -> Result<(), HistoryError> {
        self.records
            .write()
            .await
            .entry(record.owner_identity.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_for_owner(
        &self,
        owner_identity: &str,
    ) -> Result<Vec<ApplicationHistoryRecord>, HistoryError> {
        Ok(self
            .records
            .read()
            .await
            .get(owner_identity)
            .map(|records| records.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}

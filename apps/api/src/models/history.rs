use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable projection of one posting decision (or a manually tracked application).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ApplicationHistoryRecord {
    pub id: Uuid,
    pub owner_identity: String,
    pub job_title: String,
    pub company_name: Option<String>,
    pub job_url: String,
    pub status: String,
    pub match_score: Option<f64>,
    pub match_reason: String,
    pub applied_at: DateTime<Utc>,
    pub resume_id: Option<String>,
}

/// Request body for recording an application made outside the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackApplicationRequest {
    pub job_title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub job_url: String,
    #[serde(default = "default_track_status")]
    pub status: String,
}

fn default_track_status() -> String {
    "applied".to_string()
}

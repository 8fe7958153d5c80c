use serde::{Deserialize, Serialize};

/// An uploaded resume: file name plus base64-encoded bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeFile {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub resume_summary: String,
    #[serde(default)]
    pub resume_file: Option<ResumeFile>,
    /// Identifier of a stored resume, carried into history records.
    #[serde(default)]
    pub resume_id: Option<String>,
    #[serde(default)]
    pub preferred_companies: Vec<String>,
    #[serde(default)]
    /// Free-form preference such as "full_time", "remote" or "contract".
    pub job_preference: String,
    #[serde(default)]
    pub salary_range: String,
    #[serde(default)]
    pub looking_for_internships: bool,
}

/// One "apply to this board" run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRequest {
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_board_url: String,
    /// Cap on successful applications.
    pub application_count: u32,
    #[serde(default)]
    pub candidate_profile: CandidateProfile,
    /// Set by the inbound layer from the authenticated caller, never read from the payload.
    #[serde(skip_deserializing, default)]
    pub requester_identity: String,
}

// LLM prompt constants for fit scoring.
// Reuses the JSON-only fragment from llm_client::prompts.

/// System prompt for fit scoring.
pub const FIT_SCORE_SYSTEM: &str = "You are an experienced technical recruiter. \
    You judge how well a candidate fits a single job posting. \
    You MUST respond with valid JSON only.";

/// Fit scoring prompt template. Replace every `{placeholder}` before sending.
pub const FIT_SCORE_PROMPT_TEMPLATE: &str = r#"Rate how well this candidate fits the job posting.

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 0.72,
  "reasoning": "One or two sentences explaining the score."
}

Rules:
- "score" is a number between 0.0 (no fit) and 1.0 (perfect fit).
- Base the score on the candidate's experience, the target role and their stated preferences.
- Treat preferred companies as a mild positive signal, not a requirement.
- If the candidate is not looking for internships, internship postings are a poor fit.

Target role: {job_title}
Job preference: {job_preference}
Salary range: {salary_range}
Looking for internships: {looking_for_internships}
Preferred companies: {preferred_companies}

Candidate resume summary:
{resume_summary}

Job posting:
{posting_text}
"#;

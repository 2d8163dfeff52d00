use serde::{Deserialize, Serialize};

/// Structured applicant fields extracted from one resume.
///
/// Mirrors the JSON contract of the extraction prompt: every field is
/// best-effort, and absence means the backend did not find it. The `projects`
/// field is spelled `"Projects"` on the wire — that capitalization is part of
/// the contract with existing consumers, so it is preserved via serde rename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_portfolio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_details: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Vec<String>>,
    #[serde(default, rename = "Projects", skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
}

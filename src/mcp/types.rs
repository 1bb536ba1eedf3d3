//! Request and response types for MCP tools.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{Exam, Topic};

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetDashboardRequest {
    #[schemars(
        description = "Local date-time to evaluate the dashboard at, e.g. '2024-12-01T09:00:00'. Defaults to the current time."
    )]
    #[serde(default)]
    pub now: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListSubjectsRequest {
    #[schemars(description = "Only show this subject. Omit to list all subjects.")]
    #[serde(default)]
    pub subject_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddTopicRequest {
    #[schemars(description = "Id of the subject the topic belongs to")]
    pub subject_id: String,
    #[schemars(description = "Short name of the topic, e.g. 'Balance sheet'")]
    pub name: String,
    #[schemars(description = "Optional priority: 'High', 'Medium' or 'Low'")]
    #[serde(default)]
    pub priority: Option<String>,
    #[schemars(description = "Optional deadline as YYYY-MM-DD")]
    #[serde(default)]
    pub deadline: Option<String>,
    #[schemars(description = "Optional study link URL")]
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TopicRef {
    #[schemars(description = "Id of the subject")]
    pub subject_id: String,
    #[schemars(description = "Id of the topic within the subject")]
    pub topic_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetTopicNoteRequest {
    pub subject_id: String,
    pub topic_id: String,
    #[schemars(description = "Markdown note. Omit or pass an empty string to remove the note.")]
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddExamRequest {
    #[schemars(description = "Subject label shown for the exam, e.g. 'Microeconomics'")]
    pub subject: String,
    #[schemars(description = "Exam date as YYYY-MM-DD")]
    pub date: String,
    #[schemars(description = "Optional start time or range, e.g. '1:00 PM - 4:00 PM' or '09:30'")]
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteExamRequest {
    #[schemars(description = "Id of the exam to delete")]
    pub exam_id: String,
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicResponse {
    pub subject_id: String,
    pub topic: Topic,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExamResponse {
    pub exam: Exam,
    /// How far away the exam is, when it is still ahead.
    pub countdown: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedResponse {
    pub seeded: bool,
    pub message: String,
}

//! MCP server exposing the tracker to AI assistants over stdio.

mod client;
mod types;

pub use client::{ClientError, TrackerClient, DEFAULT_PORT};
pub use types::*;

use chrono::{Local, NaiveDate, NaiveDateTime};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};

use crate::error::Error;
use crate::models::*;
use crate::render;
use crate::stats::{self, Dashboard};
use crate::tracker::Tracker;

#[derive(Clone)]
pub struct McpServer {
    tracker: Tracker,
    tool_router: ToolRouter<Self>,
}

fn to_mcp_error(e: Error) -> McpError {
    match e {
        Error::Validation(_) | Error::NotFound(_) => McpError::invalid_params(e.to_string(), None),
        other => {
            tracing::error!("Tool failed: {}", other);
            let message = match other.remediation() {
                Some(hint) => format!("{} {}", other, hint),
                None => other.to_string(),
            };
            McpError::internal_error(message, None)
        }
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, McpError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        McpError::invalid_params(format!("Invalid {} '{}'. Use YYYY-MM-DD", field, raw), None)
    })
}

fn parse_now(raw: Option<&str>) -> Result<NaiveDateTime, McpError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Local::now().naive_local()),
        Some(s) => s.parse::<NaiveDateTime>().map_err(|_| {
            McpError::invalid_params(
                format!("Invalid now '{}'. Use YYYY-MM-DDTHH:MM:SS", s),
                None,
            )
        }),
    }
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

impl McpServer {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            tool_router: Self::tool_router(),
        }
    }

    // ============================================================
    // Tool logic, shared by the tools and by tests
    // ============================================================

    pub fn test_get_dashboard(&self, now: Option<&str>) -> Result<Dashboard, McpError> {
        let now = parse_now(now)?;
        self.tracker.dashboard(now).map_err(to_mcp_error)
    }

    pub fn test_list_subjects(&self, subject_id: Option<&str>) -> Result<Vec<Subject>, McpError> {
        match subject_id {
            Some(id) => Ok(vec![self.tracker.subject(id).map_err(to_mcp_error)?]),
            None => self.tracker.subjects().map_err(to_mcp_error),
        }
    }

    pub fn test_add_topic(&self, req: AddTopicRequest) -> Result<TopicResponse, McpError> {
        let priority = req
            .priority
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                p.parse::<Priority>().map_err(|_| {
                    McpError::invalid_params(
                        format!("Invalid priority '{}'. Must be: High, Medium, or Low", p),
                        None,
                    )
                })
            })
            .transpose()?;
        let deadline = req
            .deadline
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| parse_date(d, "deadline"))
            .transpose()?;

        let topic = self
            .tracker
            .add_topic(
                &req.subject_id,
                NewTopicInput {
                    name: req.name,
                    priority,
                    deadline,
                    link: req.link,
                },
            )
            .map_err(to_mcp_error)?;

        Ok(TopicResponse {
            subject_id: req.subject_id,
            topic,
        })
    }

    pub fn test_toggle_topic(&self, subject_id: &str, topic_id: &str) -> Result<TopicResponse, McpError> {
        let topic = self
            .tracker
            .toggle_topic_completion(subject_id, topic_id)
            .map_err(to_mcp_error)?;
        Ok(TopicResponse {
            subject_id: subject_id.to_string(),
            topic,
        })
    }

    pub fn test_add_exam(&self, req: AddExamRequest) -> Result<ExamResponse, McpError> {
        let date = parse_date(&req.date, "date")?;
        let exam = self
            .tracker
            .create_exam(CreateExamInput {
                subject: req.subject,
                date,
                time: req.time,
            })
            .map_err(to_mcp_error)?;

        let now = Local::now().naive_local();
        let countdown = exam
            .starts_at()
            .filter(|at| *at > now)
            .map(|at| {
                let c = stats::countdown(now, at);
                format!("{} {}", c.value, c.unit.label())
            });
        Ok(ExamResponse { exam, countdown })
    }

    pub fn test_seed(&self) -> Result<SeedResponse, McpError> {
        let seeded = self
            .tracker
            .seed(Local::now().date_naive())
            .map_err(to_mcp_error)?;
        Ok(SeedResponse {
            seeded,
            message: if seeded {
                "Loaded the starter subjects and exams".to_string()
            } else {
                "Store already holds data; nothing was loaded".to_string()
            },
        })
    }
}

#[tool_router]
impl McpServer {
    // ============================================================
    // Read tools
    // ============================================================

    #[tool(
        description = "Get the study dashboard: overall completion, pending and high-priority counts, overdue topics, per-subject progress, the pending-work priority mix, the next upcoming exam with a countdown, the exam schedule, and insights. Pass 'now' to evaluate at a specific local time."
    )]
    async fn get_dashboard(
        &self,
        params: Parameters<GetDashboardRequest>,
    ) -> Result<CallToolResult, McpError> {
        let dashboard = self.test_get_dashboard(params.0.now.as_deref())?;
        let summary = render::render_dashboard(&dashboard);
        let json = serde_json::to_string_pretty(&dashboard)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![
            Content::text(summary),
            Content::text(json),
        ]))
    }

    #[tool(
        description = "List subjects with their topics as a tree. Completed topics are marked ●, pending ○, with priority and deadline status. Use the ids from the JSON block when calling add_topic or toggle_topic."
    )]
    async fn list_subjects(
        &self,
        params: Parameters<ListSubjectsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let subjects = self.test_list_subjects(params.0.subject_id.as_deref())?;
        let tree = render::render_subjects(&subjects, Local::now().date_naive());
        let json = serde_json::to_string_pretty(&subjects)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![
            Content::text(tree),
            Content::text(json),
        ]))
    }

    #[tool(description = "List all exams in the order they were added.")]
    async fn list_exams(&self) -> Result<CallToolResult, McpError> {
        let exams = self.tracker.exams().map_err(to_mcp_error)?;
        json_result(&exams)
    }

    // ============================================================
    // Mutation tools
    // ============================================================

    #[tool(
        description = "Add a pending topic to a subject. Priority is 'High', 'Medium' or 'Low'; deadline is YYYY-MM-DD. Returns the created topic with its id."
    )]
    async fn add_topic(
        &self,
        params: Parameters<AddTopicRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.test_add_topic(params.0)?)
    }

    #[tool(
        description = "Flip a topic between completed and pending. Side effect: rewrites the subject's topic list."
    )]
    async fn toggle_topic(&self, params: Parameters<TopicRef>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        json_result(&self.test_toggle_topic(&req.subject_id, &req.topic_id)?)
    }

    #[tool(description = "Remove a topic from a subject. Removing an unknown topic is a no-op.")]
    async fn delete_topic(&self, params: Parameters<TopicRef>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let removed = self
            .tracker
            .delete_topic(&req.subject_id, &req.topic_id)
            .map_err(to_mcp_error)?;
        json_result(&serde_json::json!({ "removed": removed }))
    }

    #[tool(description = "Set or clear the markdown note attached to a topic.")]
    async fn set_topic_note(
        &self,
        params: Parameters<SetTopicNoteRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let topic = self
            .tracker
            .set_topic_note(&req.subject_id, &req.topic_id, req.note)
            .map_err(to_mcp_error)?;
        json_result(&TopicResponse {
            subject_id: req.subject_id,
            topic,
        })
    }

    #[tool(
        description = "Schedule an exam. Date is YYYY-MM-DD; time is optional and may be a range like '1:00 PM - 4:00 PM' (the start counts)."
    )]
    async fn add_exam(&self, params: Parameters<AddExamRequest>) -> Result<CallToolResult, McpError> {
        json_result(&self.test_add_exam(params.0)?)
    }

    #[tool(description = "Delete an exam by id.")]
    async fn delete_exam(
        &self,
        params: Parameters<DeleteExamRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.tracker
            .delete_exam(&params.0.exam_id)
            .map_err(to_mcp_error)?;
        json_result(&serde_json::json!({ "deleted": params.0.exam_id }))
    }

    #[tool(
        description = "Load the starter subjects and exams. Only works while the store holds no subjects and no exams."
    )]
    async fn seed_data(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.test_seed()?)
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "syllabus-track".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"syllabus-track keeps a student's subjects, topics and exams.

DATA:
- A subject has a title, a color and an ordered list of topics.
- A topic has a name, a completion flag, and optionally a priority (High, Medium, Low), a deadline, links, images and a note.
- Exams have a subject label, a date and an optional time such as "1:00 PM - 4:00 PM".

READING:
- get_dashboard: overall progress, overdue topics, next exam countdown and insights.
- list_subjects: the topic tree with ids for follow-up calls.
- list_exams: every scheduled exam.

CHANGING:
- add_topic, toggle_topic, delete_topic, set_topic_note act on one topic of one subject.
- add_exam, delete_exam manage the exam list.
- seed_data loads a starter dataset into an empty store.

A topic is overdue when it is pending and its deadline is before today."#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(tracker: Tracker) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(tracker);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;

use crate::error::Error;
use crate::models::*;
use crate::stats::Dashboard;
use crate::tracker::Tracker;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Maps a tracker error to a status and a message safe to show the client.
///
/// Internal failures are logged in full and answered with a generic body.
fn api_error(e: Error) -> (StatusCode, String) {
    match &e {
        Error::Validation(_) => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        Error::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        Error::RemoteConnection { .. } | Error::RemoteWrite { .. } => {
            tracing::error!("Store error: {}", e);
            let message = match e.remediation() {
                Some(hint) => format!("{} {}", e, hint),
                None => e.to_string(),
            };
            (StatusCode::SERVICE_UNAVAILABLE, message)
        }
        Error::Internal(inner) => {
            tracing::error!("Internal error: {:#}", inner);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Subjects
// ============================================================

pub async fn list_subjects(State(tracker): State<Tracker>) -> ApiResult<Json<Vec<Subject>>> {
    tracker.subjects().map(Json).map_err(api_error)
}

pub async fn get_subject(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
) -> ApiResult<Json<Subject>> {
    tracker.subject(&id).map(Json).map_err(api_error)
}

pub async fn create_subject(
    State(tracker): State<Tracker>,
    Json(input): Json<CreateSubjectInput>,
) -> ApiResult<(StatusCode, Json<Subject>)> {
    tracker
        .create_subject(input)
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(api_error)
}

pub async fn delete_subject(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    tracker.delete_subject(&id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Topics
// ============================================================

pub async fn add_topic(
    State(tracker): State<Tracker>,
    Path(subject_id): Path<String>,
    Json(input): Json<NewTopicInput>,
) -> ApiResult<(StatusCode, Json<Topic>)> {
    tracker
        .add_topic(&subject_id, input)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(api_error)
}

/// Replaces a topic. The id in the path wins over any id in the body.
pub async fn edit_topic(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
    Json(mut topic): Json<Topic>,
) -> ApiResult<Json<Topic>> {
    topic.id = topic_id;
    tracker
        .edit_topic(&subject_id, topic)
        .map(Json)
        .map_err(api_error)
}

pub async fn delete_topic(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    tracker
        .delete_topic(&subject_id, &topic_id)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_topic(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
) -> ApiResult<Json<Topic>> {
    tracker
        .toggle_topic_completion(&subject_id, &topic_id)
        .map(Json)
        .map_err(api_error)
}

pub async fn set_topic_note(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
    Json(input): Json<SetNoteInput>,
) -> ApiResult<Json<Topic>> {
    tracker
        .set_topic_note(&subject_id, &topic_id, input.note)
        .map(Json)
        .map_err(api_error)
}

pub async fn add_topic_link(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
    Json(input): Json<AddLinkInput>,
) -> ApiResult<(StatusCode, Json<LinkItem>)> {
    tracker
        .add_topic_link(&subject_id, &topic_id, input)
        .map(|l| (StatusCode::CREATED, Json(l)))
        .map_err(api_error)
}

pub async fn remove_topic_link(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id, link_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Topic>> {
    tracker
        .remove_topic_link(&subject_id, &topic_id, &link_id)
        .map(Json)
        .map_err(api_error)
}

/// Images with deferred references resolved.
pub async fn list_topic_images(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ImageItem>>> {
    tracker
        .resolve_topic_images(&subject_id, &topic_id)
        .map(Json)
        .map_err(api_error)
}

pub async fn add_topic_image(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id)): Path<(String, String)>,
    Json(input): Json<AddImageInput>,
) -> ApiResult<(StatusCode, Json<ImageItem>)> {
    tracker
        .add_topic_image(&subject_id, &topic_id, input)
        .map(|i| (StatusCode::CREATED, Json(i)))
        .map_err(api_error)
}

pub async fn remove_topic_image(
    State(tracker): State<Tracker>,
    Path((subject_id, topic_id, image_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Topic>> {
    tracker
        .remove_topic_image(&subject_id, &topic_id, &image_id)
        .map(Json)
        .map_err(api_error)
}

// ============================================================
// Exams
// ============================================================

pub async fn list_exams(State(tracker): State<Tracker>) -> ApiResult<Json<Vec<Exam>>> {
    tracker.exams().map(Json).map_err(api_error)
}

pub async fn create_exam(
    State(tracker): State<Tracker>,
    Json(input): Json<CreateExamInput>,
) -> ApiResult<(StatusCode, Json<Exam>)> {
    tracker
        .create_exam(input)
        .map(|e| (StatusCode::CREATED, Json(e)))
        .map_err(api_error)
}

pub async fn delete_exam(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    tracker.delete_exam(&id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Dashboard and dataset
// ============================================================

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Local wall-clock time to evaluate at, e.g. `2024-12-01T09:00:00`.
    pub now: Option<NaiveDateTime>,
}

pub async fn get_dashboard(
    State(tracker): State<Tracker>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Dashboard>> {
    let now = query.now.unwrap_or_else(|| Local::now().naive_local());
    tracker.dashboard(now).map(Json).map_err(api_error)
}

pub async fn seed(
    State(tracker): State<Tracker>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let today = Local::now().date_naive();
    if tracker.seed(today).map_err(api_error)? {
        Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({ "seeded": true })),
        ))
    } else {
        Err((
            StatusCode::CONFLICT,
            "Store already holds subjects or exams".to_string(),
        ))
    }
}

pub async fn clear_all(State(tracker): State<Tracker>) -> ApiResult<StatusCode> {
    tracker.clear_all().map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Resources and notes
// ============================================================

pub async fn get_resource(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
) -> ApiResult<Json<Resource>> {
    tracker
        .get_resource(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Resource not found".to_string()))
}

pub async fn save_resource(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
    Json(input): Json<SaveContentInput>,
) -> ApiResult<Json<Resource>> {
    tracker
        .save_resource(&id, input.content)
        .map(Json)
        .map_err(api_error)
}

pub async fn get_note(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
) -> ApiResult<Json<Note>> {
    tracker
        .get_note(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Note not found".to_string()))
}

pub async fn save_note(
    State(tracker): State<Tracker>,
    Path(id): Path<String>,
    Json(input): Json<SaveContentInput>,
) -> ApiResult<Json<Note>> {
    tracker
        .save_note(&id, input.content)
        .map(Json)
        .map_err(api_error)
}

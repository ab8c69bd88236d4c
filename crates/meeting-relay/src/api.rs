//! Meetings HTTP API.
//!
//! Thin routes over the lifecycle manager and store for everything that
//! happens outside a live socket: creating a meeting, fetching documents,
//! toggling recording, and reading relay status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::model::{Meeting, MeetingDraft, MeetingStatus, ParticipantStatus};
use serde::{Deserialize, Serialize};

use crate::errors::RelayError;
use crate::store::MeetingStore;
use crate::AppState;

/// Request body for `POST /api/meetings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    #[serde(flatten)]
    pub draft: MeetingDraft,
    /// Plaintext join password; hashed before anything is persisted.
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for `POST /api/meetings/{id}/recording`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRequest {
    pub is_recording: bool,
}

/// Error envelope returned by every API route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: i32,
}

/// Wrapper so `RelayError` maps onto HTTP responses.
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.client_message(),
            code: self.0.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Roster-derived meeting status view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStatusBody {
    pub meeting_id: String,
    pub status: MeetingStatus,
    pub joined_count: usize,
    pub waiting_count: usize,
}

/// Relay-wide status view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatusBody {
    pub live_meetings: usize,
    pub live_connections: u64,
    pub is_draining: bool,
}

/// Build the `/api` router.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/meetings", post(create_meeting).get(get_active_meetings))
        .route(
            "/api/meetings/:meeting_id",
            get(get_meeting).delete(delete_meeting),
        )
        .route("/api/meetings/:meeting_id/status", get(get_meeting_status))
        .route("/api/meetings/:meeting_id/recording", post(set_recording))
        .route("/api/users/:user_id/meetings", get(get_user_meetings))
        .route("/api/status", get(get_relay_status))
        .with_state(state)
}

async fn create_meeting(
    State(state): State<AppState>,
    Json(request): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<Meeting>), ApiError> {
    let meeting = state
        .lifecycle
        .create_meeting(request.draft, request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

async fn get_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> Result<Json<Meeting>, ApiError> {
    let meeting = state
        .lifecycle
        .store()
        .find_by_id(&meeting_id)
        .await?
        .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;
    Ok(Json(meeting))
}

async fn get_active_meetings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Meeting>>, ApiError> {
    let meetings = state.lifecycle.store().get_active_meetings().await?;
    Ok(Json(meetings))
}

async fn get_user_meetings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Meeting>>, ApiError> {
    let meetings = state.lifecycle.store().find_user_meetings(&user_id).await?;
    Ok(Json(meetings))
}

async fn delete_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.lifecycle.store().delete(&meeting_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RelayError::NotFound("Meeting not found".to_string()).into())
    }
}

async fn set_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    Json(request): Json<RecordingRequest>,
) -> Result<Json<Meeting>, ApiError> {
    let meeting = state
        .lifecycle
        .set_recording(&meeting_id, request.is_recording)
        .await?;
    Ok(Json(meeting))
}

async fn get_meeting_status(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingStatusBody>, ApiError> {
    let meeting = state
        .lifecycle
        .store()
        .find_by_id(&meeting_id)
        .await?
        .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;

    let waiting_count = meeting
        .participants
        .iter()
        .filter(|p| p.status == ParticipantStatus::Waiting)
        .count();

    Ok(Json(MeetingStatusBody {
        meeting_id: meeting.meeting_id.clone(),
        status: meeting.status,
        joined_count: meeting.joined_count(),
        waiting_count,
    }))
}

async fn get_relay_status(
    State(state): State<AppState>,
) -> Result<Json<RelayStatusBody>, ApiError> {
    let status = state.supervisor.status().await?;
    Ok(Json(RelayStatusBody {
        live_meetings: status.meeting_count,
        live_connections: status.connection_count,
        is_draining: status.is_draining,
    }))
}

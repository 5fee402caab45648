// Boardroom
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Meeting handlers

use super::{json_response, parse_json};
use crate::error::ApiResult;
use crate::models::{MeetingListResponse, MeetingStatusRequest, MeetingView, NewMeeting, RespondRequest};
use crate::rbac::roles::Principal;
use crate::state::AppState;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};

/// Schedule a meeting
/// POST /meetings
#[utoipa::path(
    post,
    path = "/meetings",
    request_body = NewMeeting,
    responses(
        (status = 201, description = "Meeting scheduled", body = MeetingView),
        (status = 400, description = "Invalid meeting"),
        (status = 403, description = "Missing meetings.create")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn create_meeting(state: &AppState, principal: &Principal, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: NewMeeting = parse_json(&body)?;
    let meeting = state.meetings.create(principal, request).await?;
    json_response(StatusCode::CREATED, &MeetingView::from(meeting))
}

/// GET /meetings
#[utoipa::path(
    get,
    path = "/meetings",
    responses(
        (status = 200, description = "Meetings by scheduled time", body = MeetingListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn list_meetings(state: &AppState, principal: &Principal) -> ApiResult<Response<Full<Bytes>>> {
    let meetings = state.meetings.list(principal).await?.into_iter().map(MeetingView::from).collect();
    json_response(StatusCode::OK, &MeetingListResponse { meetings })
}

/// GET /meetings/{id}
#[utoipa::path(
    get,
    path = "/meetings/{id}",
    params(("id" = String, Path, description = "Meeting id")),
    responses(
        (status = 200, description = "Meeting", body = MeetingView),
        (status = 404, description = "Meeting not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn get_meeting(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let meeting = state.meetings.get(principal, id).await?;
    json_response(StatusCode::OK, &MeetingView::from(meeting))
}

/// Accept, decline or tentatively accept an invitation
/// POST /meetings/{id}/respond
#[utoipa::path(
    post,
    path = "/meetings/{id}/respond",
    params(("id" = String, Path, description = "Meeting id")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Updated meeting", body = MeetingView),
        (status = 403, description = "Not invited")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn respond(state: &AppState, principal: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: RespondRequest = parse_json(&body)?;
    let meeting = state.meetings.respond(principal, id, request.status).await?;
    json_response(StatusCode::OK, &MeetingView::from(meeting))
}

/// POST /meetings/{id}/join
#[utoipa::path(
    post,
    path = "/meetings/{id}/join",
    params(("id" = String, Path, description = "Meeting id")),
    responses(
        (status = 200, description = "Updated meeting", body = MeetingView),
        (status = 403, description = "Not authorized"),
        (status = 409, description = "Meeting is not in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn join(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let meeting = state.meetings.join(principal, id).await?;
    json_response(StatusCode::OK, &MeetingView::from(meeting))
}

/// POST /meetings/{id}/leave
#[utoipa::path(
    post,
    path = "/meetings/{id}/leave",
    params(("id" = String, Path, description = "Meeting id")),
    responses(
        (status = 200, description = "Updated meeting", body = MeetingView)
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn leave(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let meeting = state.meetings.leave(principal, id).await?;
    json_response(StatusCode::OK, &MeetingView::from(meeting))
}

/// POST /meetings/{id}/status
#[utoipa::path(
    post,
    path = "/meetings/{id}/status",
    params(("id" = String, Path, description = "Meeting id")),
    request_body = MeetingStatusRequest,
    responses(
        (status = 200, description = "Updated meeting", body = MeetingView),
        (status = 403, description = "Organizer or admin only"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "Meetings"
)]
pub async fn set_meeting_status(state: &AppState, principal: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: MeetingStatusRequest = parse_json(&body)?;
    let meeting = state.meetings.set_status(principal, id, request.status).await?;
    json_response(StatusCode::OK, &MeetingView::from(meeting))
}

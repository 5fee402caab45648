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

//! Request and response models for the governance API

use crate::governance::SystemStats;
use crate::policy::documents::{Confidentiality, Document, DocumentStatus};
use crate::policy::meetings::{AttendeeStatus, Meeting, MeetingStatus};
use crate::rbac::audit::AuditRecord;
use crate::rbac::roles::Role;
use crate::voting::ballot::BallotOptionInput;
use crate::voting::engine::BallotView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Access check result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessCheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub selected_option_ids: Vec<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBallotResponse {
    pub success: bool,
    pub ballot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReplaceOptionsRequest {
    pub options: Vec<BallotOptionInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyReceiptRequest {
    pub receipt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyReceiptResponse {
    pub recorded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BallotListResponse {
    pub ballots: Vec<BallotView>,
}

/// Document upload metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_confidentiality")]
    pub confidentiality: Confidentiality,
    #[serde(default)]
    pub access_list: Vec<String>,
}

fn default_confidentiality() -> Confidentiality {
    Confidentiality::Confidential
}

/// Partial document update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidentiality: Option<Confidentiality>,
    #[serde(default)]
    pub access_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentStatusRequest {
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    /// Principal ids to invite
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Defaults to a strict majority of the invitees
    #[serde(default)]
    pub required_quorum: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeetingStatusRequest {
    pub status: MeetingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RespondRequest {
    pub status: AttendeeStatus,
}

/// Meeting with derived attendance state
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeetingView {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub quorum_met: bool,
}

impl From<Meeting> for MeetingView {
    fn from(meeting: Meeting) -> Self {
        Self {
            quorum_met: meeting.quorum_met(),
            meeting,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeetingListResponse {
    pub meetings: Vec<MeetingView>,
}

/// Principal provisioning request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPrincipal {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleChangeRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    pub logs: Vec<AuditRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemStatsResponse {
    pub stats: SystemStats,
}

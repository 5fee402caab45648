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

//! Access check handler

use super::json_response;
use crate::error::{ApiError, ApiResult};
use crate::models::AccessCheckResponse;
use crate::policy::Decision;
use crate::rbac::permissions::Capability;
use crate::rbac::roles::{PermissionModel, Principal};
use crate::state::AppState;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use std::collections::HashMap;
use tracing::debug;

/// Resource named by an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    Document(&'a str),
    Meeting(&'a str),
    Ballot(&'a str),
    /// Bare capability category such as `reports`
    Category(&'a str),
}

impl<'a> ResourceRef<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        match raw.split_once(':') {
            Some(("document", id)) if !id.is_empty() => Some(ResourceRef::Document(id)),
            Some(("meeting", id)) if !id.is_empty() => Some(ResourceRef::Meeting(id)),
            Some(("ballot", id)) if !id.is_empty() => Some(ResourceRef::Ballot(id)),
            Some(_) => None,
            None if !raw.is_empty() => Some(ResourceRef::Category(raw)),
            None => None,
        }
    }
}

async fn decide(state: &AppState, subject: &Principal, resource: ResourceRef<'_>, action: &str) -> ApiResult<Decision> {
    let decision = match resource {
        ResourceRef::Document(id) => state.documents.evaluate(subject, id, action).await?,
        ResourceRef::Meeting(id) => state.meetings.evaluate(subject, id, action).await?,
        ResourceRef::Ballot(id) => match action {
            "vote" => state.voting.evaluate_vote(subject, id).await?,
            other => {
                return Err(ApiError::BadRequest {
                    message: format!("unsupported ballot action: {}", other),
                });
            }
        },
        ResourceRef::Category(category) => {
            let capability = PermissionModel::capability_for(category, action).ok_or_else(|| ApiError::BadRequest {
                message: format!("unknown capability: {}.{}", category, action),
            })?;
            state.access.check_capability(subject, capability)
        }
    };
    Ok(decision)
}

/// Check whether a principal may perform an action
/// GET /access/check
#[utoipa::path(
    get,
    path = "/access/check",
    params(
        ("principal" = Option<String>, Query, description = "Principal to check, defaults to the caller"),
        ("resource" = String, Query, description = "document:{id}, meeting:{id}, ballot:{id} or a capability category"),
        ("action" = String, Query, description = "read, edit, join, vote or a capability action")
    ),
    responses(
        (status = 200, description = "Access decision", body = AccessCheckResponse),
        (status = 400, description = "Malformed resource or action"),
        (status = 403, description = "Checking another principal requires users.read"),
        (status = 404, description = "Resource or principal not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Access"
)]
pub async fn check_access(state: &AppState, caller: &Principal, params: &HashMap<String, String>) -> ApiResult<Response<Full<Bytes>>> {
    let required = |key: &str| {
        params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()).ok_or_else(|| ApiError::BadRequest {
            message: format!("Missing query parameter: {}", key),
        })
    };
    let raw_resource = required("resource")?;
    let action = required("action")?;
    let resource = ResourceRef::parse(raw_resource).ok_or_else(|| ApiError::BadRequest {
        message: format!("Invalid resource: {}", raw_resource),
    })?;

    let target_id = params.get("principal").map(|v| v.trim()).filter(|v| !v.is_empty() && *v != caller.id);
    let subject = match target_id {
        Some(id) => {
            state.access.require(caller, Capability::UsersRead, "principal", Some(id)).await?;
            state.principals.effective(id).await?
        }
        None => Some(caller.clone()),
    };

    let decision = match &subject {
        Some(subject) => decide(state, subject, resource, action).await?,
        // deactivated principals may do nothing
        None => Decision::Deny(crate::policy::DenialReason::MissingCapability),
    };
    debug!(caller = %caller.id, subject = ?subject.as_ref().map(|s| &s.id), resource = raw_resource, action, allowed = decision.is_allowed(), "Access check");

    let response = AccessCheckResponse {
        allowed: decision.is_allowed(),
        reason: (!decision.is_allowed()).then(|| "not_authorized".to_string()),
    };
    json_response(StatusCode::OK, &response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_parsing() {
        assert_eq!(ResourceRef::parse("document:d1"), Some(ResourceRef::Document("d1")));
        assert_eq!(ResourceRef::parse("ballot:b-9"), Some(ResourceRef::Ballot("b-9")));
        assert_eq!(ResourceRef::parse("reports"), Some(ResourceRef::Category("reports")));
        assert_eq!(ResourceRef::parse("document:"), None);
        assert_eq!(ResourceRef::parse("vault:1"), None);
        assert_eq!(ResourceRef::parse(""), None);
    }
}

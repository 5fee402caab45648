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

//! Audit log query handler

use super::json_response;
use crate::error::{ApiError, ApiResult};
use crate::models::AuditLogResponse;
use crate::rbac::audit::{AuditAction, AuditQuery};
use crate::rbac::permissions::Capability;
use crate::rbac::roles::Principal;
use crate::state::AppState;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use std::collections::HashMap;

/// Build an audit query from request parameters, capping the limit at `max_limit`
pub fn audit_query_from_params(params: &HashMap<String, String>, max_limit: usize) -> ApiResult<AuditQuery> {
    let text = |key: &str| params.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let action = match text("action") {
        Some(raw) => Some(raw.parse::<AuditAction>().map_err(|e| ApiError::BadRequest { message: e })?),
        None => None,
    };
    let limit = match text("limit") {
        Some(raw) => raw.parse::<usize>().map_err(|_| ApiError::BadRequest {
            message: format!("Invalid limit: {}", raw),
        })?,
        None => AuditQuery::DEFAULT_LIMIT,
    };

    Ok(AuditQuery {
        actor_id: text("actor"),
        action,
        resource_type: text("resourceType"),
        resource_id: text("resourceId"),
        limit: limit.clamp(1, max_limit.clamp(1, AuditQuery::MAX_LIMIT)),
    })
}

/// Query the audit trail
/// GET /audit/logs
#[utoipa::path(
    get,
    path = "/audit/logs",
    params(
        ("actor" = Option<String>, Query, description = "Acting principal id"),
        ("action" = Option<String>, Query, description = "Audited action, e.g. vote.cast"),
        ("resourceType" = Option<String>, Query, description = "Resource type"),
        ("resourceId" = Option<String>, Query, description = "Resource id"),
        ("limit" = Option<usize>, Query, description = "Maximum records, newest first")
    ),
    responses(
        (status = 200, description = "Matching audit records", body = AuditLogResponse),
        (status = 400, description = "Invalid filter"),
        (status = 403, description = "Missing audit.read")
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn get_audit_logs(state: &AppState, principal: &Principal, params: &HashMap<String, String>) -> ApiResult<Response<Full<Bytes>>> {
    state.access.require(principal, Capability::AuditRead, "audit", None).await?;
    let query = audit_query_from_params(params, state.config.audit_query_limit)?;
    let logs = state.access.audit().query(&query).await.map_err(crate::error::CoreError::from)?;
    json_response(StatusCode::OK, &AuditLogResponse { logs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_query_filters_and_limit_cap() {
        let query = audit_query_from_params(&params(&[("actor", "bm1"), ("action", "vote.cast"), ("limit", "5000")]), 250).unwrap();
        assert_eq!(query.actor_id.as_deref(), Some("bm1"));
        assert_eq!(query.action, Some(AuditAction::VoteCast));
        assert_eq!(query.limit, 250);
    }

    #[test]
    fn test_bad_action_is_rejected() {
        assert!(matches!(audit_query_from_params(&params(&[("action", "vote.stuffed")]), 100), Err(ApiError::BadRequest { .. })));
        assert!(matches!(audit_query_from_params(&params(&[("limit", "-1")]), 100), Err(ApiError::BadRequest { .. })));
    }
}

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

//! Principal administration handlers

use super::{json_response, parse_json};
use crate::error::ApiResult;
use crate::models::{NewPrincipal, RoleChangeRequest};
use crate::rbac::roles::{Principal, PrincipalRecord};
use crate::state::AppState;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};

/// Provision a principal
/// POST /principals
#[utoipa::path(
    post,
    path = "/principals",
    request_body = NewPrincipal,
    responses(
        (status = 201, description = "Principal provisioned", body = PrincipalRecord),
        (status = 400, description = "Invalid or duplicate principal"),
        (status = 403, description = "Missing users.create")
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
pub async fn create_principal(state: &AppState, actor: &Principal, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: NewPrincipal = parse_json(&body)?;
    let record = state.principals.create(actor, request).await?;
    json_response(StatusCode::CREATED, &record)
}

/// GET /principals
#[utoipa::path(
    get,
    path = "/principals",
    responses(
        (status = 200, description = "All principals", body = [PrincipalRecord]),
        (status = 403, description = "Missing users.read")
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
pub async fn list_principals(state: &AppState, actor: &Principal) -> ApiResult<Response<Full<Bytes>>> {
    let records = state.principals.list(actor).await?;
    json_response(StatusCode::OK, &records)
}

/// GET /principals/{id}
#[utoipa::path(
    get,
    path = "/principals/{id}",
    params(("id" = String, Path, description = "Principal id")),
    responses(
        (status = 200, description = "Principal", body = PrincipalRecord),
        (status = 404, description = "Principal not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
pub async fn get_principal(state: &AppState, actor: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let record = state.principals.get(actor, id).await?;
    json_response(StatusCode::OK, &record)
}

/// Change a principal's role, resetting its grants to the role defaults
/// PUT /principals/{id}/role
#[utoipa::path(
    put,
    path = "/principals/{id}/role",
    params(("id" = String, Path, description = "Principal id")),
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Updated principal", body = PrincipalRecord),
        (status = 403, description = "Missing users.edit")
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
pub async fn change_role(state: &AppState, actor: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: RoleChangeRequest = parse_json(&body)?;
    let record = state.principals.change_role(actor, id, request.role).await?;
    json_response(StatusCode::OK, &record)
}

/// POST /principals/{id}/deactivate
#[utoipa::path(
    post,
    path = "/principals/{id}/deactivate",
    params(("id" = String, Path, description = "Principal id")),
    responses(
        (status = 200, description = "Deactivated principal", body = PrincipalRecord),
        (status = 403, description = "Missing users.edit")
    ),
    security(("bearer_auth" = [])),
    tag = "Principals"
)]
pub async fn deactivate(state: &AppState, actor: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let record = state.principals.deactivate(actor, id).await?;
    json_response(StatusCode::OK, &record)
}

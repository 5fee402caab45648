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

//! Administrative handlers

use super::json_response;
use crate::error::ApiResult;
use crate::models::SystemStatsResponse;
use crate::rbac::roles::Principal;
use crate::state::AppState;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};

/// Record counts across principals, documents, meetings and ballots
/// GET /admin/system-stats
#[utoipa::path(
    get,
    path = "/admin/system-stats",
    responses(
        (status = 200, description = "Record counts", body = SystemStatsResponse),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_system_stats(state: &AppState, principal: &Principal) -> ApiResult<Response<Full<Bytes>>> {
    let stats = state.stats.collect(principal).await?;
    json_response(StatusCode::OK, &SystemStatsResponse { stats })
}

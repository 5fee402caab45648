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

//! Ballot and vote handlers

use super::{json_response, no_content, parse_json};
use crate::error::ApiResult;
use crate::models::{BallotListResponse, CastVoteRequest, CastVoteResponse, CreateBallotResponse, ReplaceOptionsRequest, VerifyReceiptRequest, VerifyReceiptResponse};
use crate::rbac::roles::Principal;
use crate::state::AppState;
use crate::voting::{Ballot, BallotView, NewBallot, Tally};
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use tracing::info;

/// Create a ballot
/// POST /ballots
#[utoipa::path(
    post,
    path = "/ballots",
    request_body = NewBallot,
    responses(
        (status = 201, description = "Ballot created", body = CreateBallotResponse),
        (status = 400, description = "Invalid ballot"),
        (status = 403, description = "Missing votes.create")
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn create_ballot(state: &AppState, principal: &Principal, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: NewBallot = parse_json(&body)?;
    let ballot = state.voting.create_ballot(principal, request).await?;
    json_response(
        StatusCode::CREATED,
        &CreateBallotResponse {
            success: true,
            ballot_id: ballot.id,
        },
    )
}

/// List ballots, newest first
/// GET /ballots
#[utoipa::path(
    get,
    path = "/ballots",
    responses(
        (status = 200, description = "Ballots with status and participation", body = BallotListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn list_ballots(state: &AppState, principal: &Principal) -> ApiResult<Response<Full<Bytes>>> {
    let ballots = state.voting.list_ballots(principal).await?;
    json_response(StatusCode::OK, &BallotListResponse { ballots })
}

/// GET /ballots/{id}
#[utoipa::path(
    get,
    path = "/ballots/{id}",
    params(("id" = String, Path, description = "Ballot id")),
    responses(
        (status = 200, description = "Ballot", body = BallotView),
        (status = 404, description = "Ballot not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn get_ballot(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let view = state.voting.get_ballot(principal, id).await?;
    json_response(StatusCode::OK, &view)
}

/// Cast a vote
/// POST /ballots/{id}/vote
#[utoipa::path(
    post,
    path = "/ballots/{id}/vote",
    params(("id" = String, Path, description = "Ballot id")),
    request_body = CastVoteRequest,
    responses(
        (status = 201, description = "Vote recorded", body = CastVoteResponse),
        (status = 400, description = "DuplicateVote, NotEligible, BallotNotActive or an invalid selection"),
        (status = 404, description = "Ballot not found"),
        (status = 503, description = "Storage unavailable, safe to retry")
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn cast_vote(state: &AppState, principal: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: CastVoteRequest = parse_json(&body)?;
    let outcome = state.voting.cast_vote(principal, id, request.selected_option_ids, request.comments).await?;
    json_response(
        StatusCode::CREATED,
        &CastVoteResponse {
            success: true,
            receipt: outcome.receipt,
            submitted_at: outcome.submitted_at,
        },
    )
}

/// Replace ballot options before any vote is cast
/// PUT /ballots/{id}/options
#[utoipa::path(
    put,
    path = "/ballots/{id}/options",
    params(("id" = String, Path, description = "Ballot id")),
    request_body = ReplaceOptionsRequest,
    responses(
        (status = 200, description = "Updated ballot", body = Ballot),
        (status = 409, description = "Options are frozen once a vote exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn replace_options(state: &AppState, principal: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: ReplaceOptionsRequest = parse_json(&body)?;
    let ballot = state.voting.replace_options(principal, id, request.options).await?;
    json_response(StatusCode::OK, &ballot)
}

/// DELETE /ballots/{id}
#[utoipa::path(
    delete,
    path = "/ballots/{id}",
    params(("id" = String, Path, description = "Ballot id")),
    responses(
        (status = 204, description = "Ballot deleted"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn delete_ballot(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    state.voting.delete_ballot(principal, id).await?;
    info!(ballot_id = %id, "Ballot removed via API");
    no_content()
}

/// Verified tally; voter ids are withheld on anonymous ballots
/// GET /ballots/{id}/results
#[utoipa::path(
    get,
    path = "/ballots/{id}/results",
    params(("id" = String, Path, description = "Ballot id")),
    responses(
        (status = 200, description = "Tally", body = Tally),
        (status = 500, description = "Tally failed verification")
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn get_results(state: &AppState, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let tally = state.voting.results(id).await?;
    json_response(StatusCode::OK, &tally)
}

/// POST /ballots/{id}/receipts/verify
#[utoipa::path(
    post,
    path = "/ballots/{id}/receipts/verify",
    params(("id" = String, Path, description = "Ballot id")),
    request_body = VerifyReceiptRequest,
    responses(
        (status = 200, description = "Whether the receipt matches a recorded vote", body = VerifyReceiptResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Voting"
)]
pub async fn verify_receipt(state: &AppState, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: VerifyReceiptRequest = parse_json(&body)?;
    let recorded = state.voting.verify_receipt(id, request.receipt.trim()).await?;
    json_response(StatusCode::OK, &VerifyReceiptResponse { recorded })
}

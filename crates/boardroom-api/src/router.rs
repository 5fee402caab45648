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

//! HTTP routing for the governance API

use crate::error::{ApiError, ApiResult};
use crate::handlers::{access, admin, audit, ballots, documents, health, meetings, principals};
use crate::state::AppState;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use tracing::{debug, warn};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    OpenApi,
    AccessCheck,
    Ballots,
    Ballot,
    BallotVote,
    BallotOptions,
    BallotResults,
    BallotReceipt,
    Documents,
    Document,
    DocumentStatus,
    Meetings,
    Meeting,
    MeetingRespond,
    MeetingJoin,
    MeetingLeave,
    MeetingStatus,
    Principals,
    Principal,
    PrincipalRole,
    PrincipalDeactivate,
    AuditLogs,
    SystemStats,
}

impl Route {
    fn is_public(&self) -> bool {
        matches!(self, Route::Health | Route::OpenApi)
    }
}

const ROUTES: &[(&str, Route)] = &[
    ("/health", Route::Health),
    ("/openapi.json", Route::OpenApi),
    ("/access/check", Route::AccessCheck),
    ("/ballots", Route::Ballots),
    ("/ballots/{id}", Route::Ballot),
    ("/ballots/{id}/vote", Route::BallotVote),
    ("/ballots/{id}/options", Route::BallotOptions),
    ("/ballots/{id}/results", Route::BallotResults),
    ("/ballots/{id}/receipts/verify", Route::BallotReceipt),
    ("/documents", Route::Documents),
    ("/documents/{id}", Route::Document),
    ("/documents/{id}/status", Route::DocumentStatus),
    ("/meetings", Route::Meetings),
    ("/meetings/{id}", Route::Meeting),
    ("/meetings/{id}/respond", Route::MeetingRespond),
    ("/meetings/{id}/join", Route::MeetingJoin),
    ("/meetings/{id}/leave", Route::MeetingLeave),
    ("/meetings/{id}/status", Route::MeetingStatus),
    ("/principals", Route::Principals),
    ("/principals/{id}", Route::Principal),
    ("/principals/{id}/role", Route::PrincipalRole),
    ("/principals/{id}/deactivate", Route::PrincipalDeactivate),
    ("/audit/logs", Route::AuditLogs),
    ("/admin/system-stats", Route::SystemStats),
];

/// HTTP router for the governance API
pub struct Router {
    state: AppState,
    routes: matchit::Router<Route>,
    openapi_spec: String,
}

impl Router {
    pub fn new(state: AppState) -> ApiResult<Self> {
        let mut routes = matchit::Router::new();
        for (path, route) in ROUTES {
            routes.insert(*path, *route)?;
        }

        Ok(Self {
            state,
            routes,
            openapi_spec: generate_openapi_spec(),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Route a request, rendering failures as problem details
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        match self.route(req).await {
            Ok(response) => response,
            Err(e) => {
                if !e.status_code().is_server_error() {
                    debug!(path = %path, status = %e.status_code(), error = %e, "Request failed");
                }
                e.into_response(&path)
            }
        }
    }

    /// Route a request to the appropriate handler
    pub async fn route<B>(&self, req: Request<B>) -> ApiResult<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        let method = req.method().clone();
        let query = parse_query_params(req.uri().query().unwrap_or(""));

        debug!("Routing request: {} {}", method, path);

        let (route, id) = match self.routes.at(&path) {
            Ok(matched) => (*matched.value, matched.params.get("id").map(str::to_string)),
            Err(_) => {
                warn!("Route not found: {} {}", method, path);
                return Err(ApiError::NotFound {
                    message: format!("Route not found: {} {}", method, path),
                });
            }
        };
        let id = id.unwrap_or_default();

        if route.is_public() {
            return match (route, &method) {
                (Route::Health, &Method::GET) => health::health_check().await,
                (Route::OpenApi, &Method::GET) => self.serve_openapi_spec(),
                _ => Err(method_not_allowed(&method, &path)),
            };
        }

        let authorization = req.headers().get(hyper::header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
        let principal = self.state.auth.authenticate(authorization.as_deref()).await?;
        let body = read_body(req, self.state.config.max_body_size).await?;
        let state = &self.state;
        let principal = &principal;

        match (route, &method) {
            (Route::AccessCheck, &Method::GET) => access::check_access(state, principal, &query).await,

            // Voting
            (Route::Ballots, &Method::GET) => ballots::list_ballots(state, principal).await,
            (Route::Ballots, &Method::POST) => ballots::create_ballot(state, principal, body).await,
            (Route::Ballot, &Method::GET) => ballots::get_ballot(state, principal, &id).await,
            (Route::Ballot, &Method::DELETE) => ballots::delete_ballot(state, principal, &id).await,
            (Route::BallotVote, &Method::POST) => ballots::cast_vote(state, principal, &id, body).await,
            (Route::BallotOptions, &Method::PUT) => ballots::replace_options(state, principal, &id, body).await,
            (Route::BallotResults, &Method::GET) => ballots::get_results(state, &id).await,
            (Route::BallotReceipt, &Method::POST) => ballots::verify_receipt(state, &id, body).await,

            // Documents
            (Route::Documents, &Method::GET) => documents::list_documents(state, principal).await,
            (Route::Documents, &Method::POST) => documents::create_document(state, principal, body).await,
            (Route::Document, &Method::GET) => documents::get_document(state, principal, &id).await,
            (Route::Document, &Method::PUT) => documents::update_document(state, principal, &id, body).await,
            (Route::Document, &Method::DELETE) => documents::delete_document(state, principal, &id).await,
            (Route::DocumentStatus, &Method::POST) => documents::set_document_status(state, principal, &id, body).await,

            // Meetings
            (Route::Meetings, &Method::GET) => meetings::list_meetings(state, principal).await,
            (Route::Meetings, &Method::POST) => meetings::create_meeting(state, principal, body).await,
            (Route::Meeting, &Method::GET) => meetings::get_meeting(state, principal, &id).await,
            (Route::MeetingRespond, &Method::POST) => meetings::respond(state, principal, &id, body).await,
            (Route::MeetingJoin, &Method::POST) => meetings::join(state, principal, &id).await,
            (Route::MeetingLeave, &Method::POST) => meetings::leave(state, principal, &id).await,
            (Route::MeetingStatus, &Method::POST) => meetings::set_meeting_status(state, principal, &id, body).await,

            // Principals
            (Route::Principals, &Method::GET) => principals::list_principals(state, principal).await,
            (Route::Principals, &Method::POST) => principals::create_principal(state, principal, body).await,
            (Route::Principal, &Method::GET) => principals::get_principal(state, principal, &id).await,
            (Route::PrincipalRole, &Method::PUT) => principals::change_role(state, principal, &id, body).await,
            (Route::PrincipalDeactivate, &Method::POST) => principals::deactivate(state, principal, &id).await,

            (Route::AuditLogs, &Method::GET) => audit::get_audit_logs(state, principal, &query).await,
            (Route::SystemStats, &Method::GET) => admin::get_system_stats(state, principal).await,

            _ => Err(method_not_allowed(&method, &path)),
        }
    }

    /// Serve OpenAPI specification
    fn serve_openapi_spec(&self) -> ApiResult<Response<Full<Bytes>>> {
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(self.openapi_spec.clone())))?)
    }
}

fn method_not_allowed(method: &Method, path: &str) -> ApiError {
    ApiError::MethodNotAllowed {
        message: format!("{} is not supported on {}", method, path),
    }
}

/// Collect the request body, refusing anything over `limit` bytes
async fn read_body<B>(req: Request<B>, limit: usize) -> ApiResult<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ApiError::PayloadTooLarge {
            message: format!("Request body exceeds {} bytes", limit),
        }),
        Err(e) => Err(ApiError::BadRequest {
            message: format!("Failed to read request body: {}", e),
        }),
    }
}

/// Parse query parameters from a query string
fn parse_query_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let key = percent_encoding::percent_decode_str(&key.replace('+', " ")).decode_utf8().unwrap_or_default().to_string();
            let value = percent_encoding::percent_decode_str(&value.replace('+', " ")).decode_utf8().unwrap_or_default().to_string();
            params.insert(key, value);
        }
    }

    params
}

/// Generate OpenAPI specification
fn generate_openapi_spec() -> String {
    #[derive(OpenApi)]
    #[openapi(
        paths(
            health::health_check,
            access::check_access,

            // Voting
            ballots::create_ballot,
            ballots::list_ballots,
            ballots::get_ballot,
            ballots::cast_vote,
            ballots::replace_options,
            ballots::delete_ballot,
            ballots::get_results,
            ballots::verify_receipt,

            // Documents
            documents::create_document,
            documents::list_documents,
            documents::get_document,
            documents::update_document,
            documents::set_document_status,
            documents::delete_document,

            // Meetings
            meetings::create_meeting,
            meetings::list_meetings,
            meetings::get_meeting,
            meetings::respond,
            meetings::join,
            meetings::leave,
            meetings::set_meeting_status,

            // Principals
            principals::create_principal,
            principals::list_principals,
            principals::get_principal,
            principals::change_role,
            principals::deactivate,

            audit::get_audit_logs,
            admin::get_system_stats,
        ),
        components(
            schemas(
                crate::models::HealthResponse,
                crate::models::AccessCheckResponse,
                crate::models::CastVoteRequest,
                crate::models::CastVoteResponse,
                crate::models::CreateBallotResponse,
                crate::models::ReplaceOptionsRequest,
                crate::models::VerifyReceiptRequest,
                crate::models::VerifyReceiptResponse,
                crate::models::BallotListResponse,
                crate::models::NewDocument,
                crate::models::UpdateDocumentRequest,
                crate::models::DocumentStatusRequest,
                crate::models::DocumentListResponse,
                crate::models::NewMeeting,
                crate::models::MeetingStatusRequest,
                crate::models::RespondRequest,
                crate::models::MeetingView,
                crate::models::MeetingListResponse,
                crate::models::NewPrincipal,
                crate::models::RoleChangeRequest,
                crate::models::AuditLogResponse,
                crate::models::SystemStatsResponse,
                crate::governance::SystemStats,
                crate::voting::Ballot,
                crate::voting::BallotOption,
                crate::voting::BallotOptionInput,
                crate::voting::BallotStatus,
                crate::voting::BallotView,
                crate::voting::NewBallot,
                crate::voting::OptionTally,
                crate::voting::Tally,
                crate::policy::documents::Document,
                crate::policy::documents::Confidentiality,
                crate::policy::documents::DocumentStatus,
                crate::policy::meetings::Meeting,
                crate::policy::meetings::Attendee,
                crate::policy::meetings::MeetingStatus,
                crate::policy::meetings::AttendeeStatus,
                crate::rbac::roles::PrincipalRecord,
                crate::rbac::roles::Role,
                crate::rbac::audit::AuditRecord,
                crate::rbac::audit::AuditAction,
                crate::rbac::audit::AuditOutcome,
            )
        ),
        tags(
            (name = "Health", description = "Health check endpoint"),
            (name = "Access", description = "Access decisions"),
            (name = "Voting", description = "Ballots, votes and tallies"),
            (name = "Documents", description = "Board document governance"),
            (name = "Meetings", description = "Meeting scheduling and attendance"),
            (name = "Principals", description = "Principal administration"),
            (name = "Audit", description = "Audit trail queries"),
            (name = "Admin", description = "Operator views")
        ),
        modifiers(&SecurityAddon)
    )]
    struct ApiDoc;

    struct SecurityAddon;

    impl Modify for SecurityAddon {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(components) = openapi.components.as_mut() {
                components.add_security_scheme("bearer_auth", SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()))
            }
        }
    }

    ApiDoc::openapi().to_pretty_json().unwrap_or_else(|_| "{}".to_string())
}

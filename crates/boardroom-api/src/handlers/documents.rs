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

//! Document handlers

use super::{json_response, no_content, parse_json};
use crate::error::ApiResult;
use crate::models::{DocumentListResponse, DocumentStatusRequest, NewDocument, UpdateDocumentRequest};
use crate::policy::documents::Document;
use crate::rbac::roles::Principal;
use crate::state::AppState;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};

/// Upload document metadata
/// POST /documents
#[utoipa::path(
    post,
    path = "/documents",
    request_body = NewDocument,
    responses(
        (status = 201, description = "Document created", body = Document),
        (status = 400, description = "Invalid document"),
        (status = 403, description = "Missing documents.create")
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn create_document(state: &AppState, principal: &Principal, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: NewDocument = parse_json(&body)?;
    let document = state.documents.create(principal, request).await?;
    json_response(StatusCode::CREATED, &document)
}

/// Documents visible to the caller
/// GET /documents
#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Visible documents", body = DocumentListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn list_documents(state: &AppState, principal: &Principal) -> ApiResult<Response<Full<Bytes>>> {
    let documents = state.documents.list(principal).await?;
    json_response(StatusCode::OK, &DocumentListResponse { documents })
}

/// GET /documents/{id}
#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document", body = Document),
        (status = 404, description = "Document not found or not visible to the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn get_document(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    let document = state.documents.get(principal, id).await?;
    json_response(StatusCode::OK, &document)
}

/// PUT /documents/{id}
#[utoipa::path(
    put,
    path = "/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Updated document", body = Document),
        (status = 403, description = "Visible but not editable by the caller"),
        (status = 404, description = "Document not found or not visible to the caller"),
        (status = 409, description = "Document changed concurrently")
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn update_document(state: &AppState, principal: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: UpdateDocumentRequest = parse_json(&body)?;
    let document = state.documents.update(principal, id, request).await?;
    json_response(StatusCode::OK, &document)
}

/// Move a document through draft, review, approved and archived
/// POST /documents/{id}/status
#[utoipa::path(
    post,
    path = "/documents/{id}/status",
    params(("id" = String, Path, description = "Document id")),
    request_body = DocumentStatusRequest,
    responses(
        (status = 200, description = "Updated document", body = Document),
        (status = 404, description = "Document not found or not visible to the caller"),
        (status = 409, description = "Transition not allowed or document changed concurrently")
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn set_document_status(state: &AppState, principal: &Principal, id: &str, body: Bytes) -> ApiResult<Response<Full<Bytes>>> {
    let request: DocumentStatusRequest = parse_json(&body)?;
    let document = state.documents.set_status(principal, id, request.status).await?;
    json_response(StatusCode::OK, &document)
}

/// DELETE /documents/{id}
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 409, description = "Only archived documents can be deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn delete_document(state: &AppState, principal: &Principal, id: &str) -> ApiResult<Response<Full<Bytes>>> {
    state.documents.delete(principal, id).await?;
    no_content()
}

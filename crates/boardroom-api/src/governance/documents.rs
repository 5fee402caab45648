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

//! Document governance: upload, view, edit, status and deletion

use crate::error::{CoreError, CoreResult};
use crate::models::{NewDocument, UpdateDocumentRequest};
use crate::policy::{Decision, DenialReason};
use crate::policy::documents::{Document, DocumentStatus, can_access_document, evaluate_document_access, evaluate_document_edit, max_confidentiality};
use crate::rbac::audit::{AuditAction, AuditOutcome, AuditRecord};
use crate::rbac::permissions::Capability;
use crate::rbac::roles::Principal;
use crate::rbac::system::AccessControl;
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    access: Arc<AccessControl>,
    retry: RetryPolicy,
}

fn dedup(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in ids.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>, access: Arc<AccessControl>, retry: RetryPolicy) -> Self {
        Self { store, access, retry }
    }

    async fn load(&self, id: &str) -> CoreResult<Document> {
        self.retry
            .run("document.get", |_| self.store.get_document(id))
            .await?
            .ok_or_else(|| CoreError::not_found(format!("document {}", id)))
    }

    /// Load a document the principal may read. Hidden documents answer exactly like missing ones.
    async fn load_visible(&self, principal: &Principal, id: &str) -> CoreResult<Document> {
        let document = self.load(id).await?;
        match self.access.authorize_document_read(principal, &document).await {
            Ok(()) => Ok(document),
            Err(CoreError::Forbidden) => Err(CoreError::not_found(format!("document {}", id))),
            Err(e) => Err(e),
        }
    }

    /// Optimistic write; losing to a concurrent edit leaves the caller with a stale version
    async fn save(&self, document: &Document) -> CoreResult<()> {
        match self.retry.run("document.put", |_| self.store.put_document(document.clone())).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(detail)) => {
                warn!(document_id = %document.id, version = document.version, detail = %detail, "Rejected stale document write");
                Err(CoreError::stale_write("document", document.version.saturating_sub(1), document.version))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Policy decision for `subject` without enforcing or auditing it
    pub async fn evaluate(&self, subject: &Principal, id: &str, action: &str) -> CoreResult<Decision> {
        let evaluate: fn(&Principal, &Document) -> Decision = match action {
            "read" | "view" => evaluate_document_access,
            "edit" => evaluate_document_edit,
            other => return Err(CoreError::validation(format!("unsupported document action: {}", other))),
        };
        // a missing document is denied rather than reported, so checks cannot discover ids
        let document = self.retry.run("document.get", |_| self.store.get_document(id)).await?;
        Ok(document.map_or(Decision::Deny(DenialReason::NotOnAccessList), |d| evaluate(subject, &d)))
    }

    /// Upload metadata. The uploader owns the document and is always on its access list.
    pub async fn create(&self, principal: &Principal, request: NewDocument) -> CoreResult<Document> {
        self.access.require(principal, Capability::DocumentsCreate, "document", None).await?;

        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if request.confidentiality > max_confidentiality(principal.role) {
            return Err(CoreError::validation(format!("role {} cannot classify documents as {}", principal.role, request.confidentiality)));
        }

        let now = Utc::now();
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            description: request.description.filter(|d| !d.trim().is_empty()),
            confidentiality: request.confidentiality,
            access_list: dedup(std::iter::once(principal.id.clone()).chain(request.access_list)),
            owner: principal.id.clone(),
            version: 1,
            status: DocumentStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.retry.run("document.insert", |_| self.store.insert_document(document.clone())).await?;

        info!(document_id = %document.id, owner = %principal.id, confidentiality = %document.confidentiality, "Document uploaded");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::DocumentUpload, principal.id.as_str(), "document", AuditOutcome::Success)
                    .with_resource_id(document.id.as_str())
                    .with_change::<Document, Document>(None, Some(&document)),
            )
            .await;
        Ok(document)
    }

    pub async fn get(&self, principal: &Principal, id: &str) -> CoreResult<Document> {
        let document = self.load_visible(principal, id).await?;
        self.access
            .audit()
            .record(AuditRecord::new(AuditAction::DocumentView, principal.id.as_str(), "document", AuditOutcome::Success).with_resource_id(id))
            .await;
        Ok(document)
    }

    /// Documents the principal may read, most recently updated first
    pub async fn list(&self, principal: &Principal) -> CoreResult<Vec<Document>> {
        let all = self.retry.run("document.list", |_| self.store.list_documents()).await?;
        Ok(all.into_iter().filter(|d| can_access_document(principal, d)).collect())
    }

    pub async fn update(&self, principal: &Principal, id: &str, request: UpdateDocumentRequest) -> CoreResult<Document> {
        let before = self.load_visible(principal, id).await?;
        self.access.authorize_document_edit(principal, &before).await?;

        let mut after = before.clone();
        if let Some(title) = request.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(CoreError::validation("title cannot be empty"));
            }
            after.title = title;
        }
        if let Some(description) = request.description {
            after.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(confidentiality) = request.confidentiality {
            if confidentiality > max_confidentiality(principal.role) {
                return Err(CoreError::validation(format!("role {} cannot classify documents as {}", principal.role, confidentiality)));
            }
            after.confidentiality = confidentiality;
        }
        if let Some(access_list) = request.access_list {
            after.access_list = dedup(std::iter::once(after.owner.clone()).chain(access_list));
        }
        if after == before {
            return Ok(before);
        }
        after.touch(Utc::now());
        self.save(&after).await?;

        info!(document_id = %id, editor = %principal.id, version = after.version, "Document edited");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::DocumentEdit, principal.id.as_str(), "document", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_change(Some(&before), Some(&after)),
            )
            .await;
        Ok(after)
    }

    pub async fn set_status(&self, principal: &Principal, id: &str, status: DocumentStatus) -> CoreResult<Document> {
        let before = self.load_visible(principal, id).await?;
        self.access.authorize_document_edit(principal, &before).await?;

        let mut after = before.clone();
        after.transition(status, Utc::now())?;
        self.save(&after).await?;

        info!(document_id = %id, from = before.status.as_str(), to = after.status.as_str(), "Document status changed");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::DocumentStatus, principal.id.as_str(), "document", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_detail("from", before.status.as_str())
                    .with_detail("to", after.status.as_str()),
            )
            .await;
        Ok(after)
    }

    /// Only archived documents may be deleted, except by an admin
    pub async fn delete(&self, principal: &Principal, id: &str) -> CoreResult<()> {
        self.access.require(principal, Capability::DocumentsDelete, "document", Some(id)).await?;
        let before = self.load_visible(principal, id).await?;
        self.access.authorize_document_edit(principal, &before).await?;
        if before.status != DocumentStatus::Archived && !principal.is_admin() {
            return Err(CoreError::InvalidTransition {
                entity: "document",
                from: before.status.as_str().to_string(),
                to: "deleted".to_string(),
            });
        }
        self.retry.run("document.delete", |_| self.store.delete_document(id)).await?;

        info!(document_id = %id, deleted_by = %principal.id, "Document deleted");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::DocumentDelete, principal.id.as_str(), "document", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_change::<Document, Document>(Some(&before), None),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::documents::Confidentiality;
    use crate::rbac::audit::{AuditQuery, AuditRecorder, DenialAlert};
    use crate::rbac::roles::{PermissionModel, Role, RoleTable};
    use crate::store::MemoryStore;

    fn service() -> (DocumentService, Arc<AccessControl>) {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(AuditRecorder::new(store.clone(), RetryPolicy::immediate(1), DenialAlert::default()));
        let access = Arc::new(AccessControl::new(PermissionModel::new(Arc::new(RoleTable::builtin())), audit));
        (DocumentService::new(store, access.clone(), RetryPolicy::immediate(1)), access)
    }

    fn new_doc(confidentiality: Confidentiality, access_list: &[&str]) -> NewDocument {
        NewDocument {
            title: "Board minutes".to_string(),
            description: None,
            confidentiality,
            access_list: access_list.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_upload_and_read_with_access_list() {
        let (service, access) = service();
        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        let member = access.model().principal_for_role("bm1", Role::BoardMember);
        let stranger = access.model().principal_for_role("bm2", Role::BoardMember);

        let doc = service.create(&secretary, new_doc(Confidentiality::Restricted, &["bm1", "bm1", " "])).await.unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.access_list, vec!["sec".to_string(), "bm1".to_string()]);

        assert!(service.get(&member, &doc.id).await.is_ok());
        assert_eq!(service.get(&stranger, &doc.id).await, Err(CoreError::not_found(format!("document {}", doc.id))));
        assert_eq!(service.list(&stranger).await.unwrap().len(), 0);
        assert_eq!(service.list(&member).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hidden_documents_look_missing() {
        let (service, access) = service();
        let admin = access.model().principal_for_role("root", Role::Admin);
        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        let doc = service.create(&admin, new_doc(Confidentiality::TopSecret, &["sec"])).await.unwrap();

        assert!(matches!(service.get(&secretary, &doc.id).await, Err(CoreError::NotFound { .. })));
        assert!(matches!(service.get(&secretary, "no-such-doc").await, Err(CoreError::NotFound { .. })));
        assert!(matches!(service.set_status(&secretary, &doc.id, DocumentStatus::Review).await, Err(CoreError::NotFound { .. })));

        assert!(!service.evaluate(&secretary, &doc.id, "read").await.unwrap().is_allowed());
        assert!(!service.evaluate(&admin, "no-such-doc", "read").await.unwrap().is_allowed());
        assert!(service.evaluate(&admin, &doc.id, "edit").await.unwrap().is_allowed());

        let denials = access
            .audit()
            .query(&AuditQuery {
                action: Some(AuditAction::AccessDenied),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(denials.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_above_clearance_is_rejected() {
        let (service, access) = service();
        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        let result = service.create(&secretary, new_doc(Confidentiality::TopSecret, &[])).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let viewer = access.model().principal_for_role("v", Role::Viewer);
        assert_eq!(service.create(&viewer, new_doc(Confidentiality::Public, &[])).await, Err(CoreError::Forbidden));
    }

    #[tokio::test]
    async fn test_edit_bumps_version_and_audits_change() {
        let (service, access) = service();
        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        let doc = service.create(&secretary, new_doc(Confidentiality::Confidential, &[])).await.unwrap();

        let edited = service
            .update(
                &secretary,
                &doc.id,
                UpdateDocumentRequest {
                    title: Some("Board minutes (final)".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.version, 2);

        let reviewed = service.set_status(&secretary, &doc.id, DocumentStatus::Review).await.unwrap();
        assert_eq!(reviewed.version, 3);
        assert!(matches!(service.set_status(&secretary, &doc.id, DocumentStatus::Review).await, Err(CoreError::InvalidTransition { .. })));

        let edits = access
            .audit()
            .query(&AuditQuery {
                action: Some(AuditAction::DocumentEdit),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].before.as_ref().and_then(|b| b.get("version")), Some(&serde_json::json!(1)));
        assert_eq!(edits[0].after.as_ref().and_then(|a| a.get("version")), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_concurrent_edits_from_same_version_conflict() {
        let (service, access) = service();
        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        let doc = service.create(&secretary, new_doc(Confidentiality::Confidential, &[])).await.unwrap();

        let base = service.load(&doc.id).await.unwrap();
        let (mut first, mut second) = (base.clone(), base);
        first.title = "Minutes, first pass".to_string();
        second.title = "Minutes, second pass".to_string();
        first.touch(Utc::now());
        second.touch(Utc::now());

        service.save(&first).await.unwrap();
        let err = service.save(&second).await.unwrap_err();
        assert_eq!(err, CoreError::stale_write("document", 1, 2));
        assert_eq!(crate::error::ApiError::from(err).status_code(), hyper::StatusCode::CONFLICT);
        assert_eq!(service.load(&doc.id).await.unwrap().title, "Minutes, first pass");
    }

    #[tokio::test]
    async fn test_delete_requires_archive_unless_admin() {
        let (service, access) = service();
        let admin = access.model().principal_for_role("root", Role::Admin);
        let doc = service.create(&admin, new_doc(Confidentiality::TopSecret, &[])).await.unwrap();
        let other = service.create(&admin, new_doc(Confidentiality::Public, &[])).await.unwrap();

        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        assert_eq!(service.delete(&secretary, &doc.id).await, Err(CoreError::Forbidden));

        service.delete(&admin, &doc.id).await.unwrap();
        assert!(matches!(service.get(&admin, &doc.id).await, Err(CoreError::NotFound { .. })));

        let owner = access.model().principal_for_role("root", Role::Admin);
        service.set_status(&owner, &other.id, DocumentStatus::Archived).await.unwrap();
        service.delete(&owner, &other.id).await.unwrap();
    }
}

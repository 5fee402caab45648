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

//! Access control facade: evaluates policies and audits every denial

use super::audit::{AuditAction, AuditOutcome, AuditRecord, AuditRecorder};
use super::permissions::Capability;
use super::roles::{PermissionModel, Principal, PrincipalRecord};
use crate::error::CoreError;
use crate::policy::Decision;
use crate::policy::documents::{Document, evaluate_document_access, evaluate_document_edit};
use crate::policy::meetings::{Meeting, evaluate_join, evaluate_vote_in_meeting};
use std::sync::Arc;
use tracing::{debug, warn};

/// Main access-control entry point shared by the services
#[derive(Debug, Clone)]
pub struct AccessControl {
    model: PermissionModel,
    audit: Arc<AuditRecorder>,
}

impl AccessControl {
    pub fn new(model: PermissionModel, audit: Arc<AuditRecorder>) -> Self {
        Self { model, audit }
    }

    pub fn model(&self) -> &PermissionModel {
        &self.model
    }

    pub fn audit(&self) -> &Arc<AuditRecorder> {
        &self.audit
    }

    /// Resolve a persisted record, flagging unknown roles and dropped grants
    pub async fn resolve_principal(&self, record: &PrincipalRecord) -> Principal {
        let resolution = self.model.resolve(record);

        if let Some(raw) = &resolution.unknown_role {
            warn!(principal = %record.id, role = %raw, "Unknown role on principal record, resolving as viewer");
            self.audit
                .record(
                    AuditRecord::new(AuditAction::UnknownRole, record.id.as_str(), "principal", AuditOutcome::Failure)
                        .with_resource_id(record.id.as_str())
                        .with_reason("unknown_role")
                        .with_detail("role", raw.as_str()),
                )
                .await;
        }
        if !resolution.rejected_grants.is_empty() {
            warn!(principal = %record.id, grants = ?resolution.rejected_grants, "Dropping unparseable grants");
            self.audit
                .record(
                    AuditRecord::new(AuditAction::InvalidGrant, record.id.as_str(), "principal", AuditOutcome::Failure)
                        .with_resource_id(record.id.as_str())
                        .with_reason("invalid_grant")
                        .with_detail("grants", resolution.rejected_grants.join(",")),
                )
                .await;
        }

        resolution.principal
    }

    /// Turn a policy decision into a result, auditing denials
    pub async fn enforce(&self, principal: &Principal, decision: Decision, attempted: &str, resource_type: &str, resource_id: Option<&str>) -> Result<(), CoreError> {
        match decision {
            Decision::Allow => {
                debug!(principal = %principal.id, attempted, resource_type, resource_id = ?resource_id, "Access granted");
                Ok(())
            }
            Decision::Deny(reason) => {
                self.audit.record_denial(&principal.id, resource_type, resource_id, attempted, reason.code()).await;
                Err(CoreError::Forbidden)
            }
        }
    }

    /// Capability check. Admins pass regardless of their stored grants.
    pub fn check_capability(&self, principal: &Principal, capability: Capability) -> Decision {
        if principal.is_admin() || self.model.has_capability(&principal.capabilities, capability) {
            Decision::Allow
        } else {
            Decision::Deny(crate::policy::DenialReason::MissingCapability)
        }
    }

    pub async fn require(&self, principal: &Principal, capability: Capability, resource_type: &str, resource_id: Option<&str>) -> Result<(), CoreError> {
        let decision = self.check_capability(principal, capability);
        self.enforce(principal, decision, capability.as_str(), resource_type, resource_id).await
    }

    /// Admin-only operations
    pub async fn require_admin(&self, principal: &Principal, attempted: &str, resource_type: &str, resource_id: Option<&str>) -> Result<(), CoreError> {
        let decision = if principal.is_admin() {
            Decision::Allow
        } else {
            Decision::Deny(crate::policy::DenialReason::MissingCapability)
        };
        self.enforce(principal, decision, attempted, resource_type, resource_id).await
    }

    pub async fn authorize_document_read(&self, principal: &Principal, document: &Document) -> Result<(), CoreError> {
        self.enforce(principal, evaluate_document_access(principal, document), "read", "document", Some(&document.id)).await
    }

    pub async fn authorize_document_edit(&self, principal: &Principal, document: &Document) -> Result<(), CoreError> {
        self.enforce(principal, evaluate_document_edit(principal, document), "edit", "document", Some(&document.id)).await
    }

    pub async fn authorize_meeting_join(&self, principal: &Principal, meeting: &Meeting) -> Result<(), CoreError> {
        self.enforce(principal, evaluate_join(principal, meeting), "join", "meeting", Some(&meeting.id)).await
    }

    pub async fn authorize_meeting_vote(&self, principal: &Principal, meeting: &Meeting) -> Result<(), CoreError> {
        self.enforce(principal, evaluate_vote_in_meeting(principal, meeting), "vote", "meeting", Some(&meeting.id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::audit::{AuditQuery, DenialAlert};
    use crate::rbac::roles::{Role, RoleTable};
    use crate::retry::RetryPolicy;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn access() -> (AccessControl, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(AuditRecorder::new(store.clone(), RetryPolicy::immediate(1), DenialAlert::default()));
        (AccessControl::new(PermissionModel::new(Arc::new(RoleTable::builtin())), audit), store)
    }

    fn record(id: &str, role: &str) -> PrincipalRecord {
        let now = Utc::now();
        PrincipalRecord {
            id: id.to_string(),
            display_name: id.to_string(),
            email: None,
            role: role.to_string(),
            permissions: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_unknown_role_is_audited() {
        let (access, _store) = access();
        let principal = access.resolve_principal(&record("p1", "overlord")).await;
        assert_eq!(principal.role, Role::Viewer);

        let flagged = access
            .audit()
            .query(&AuditQuery {
                action: Some(AuditAction::UnknownRole),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].details.get("role").map(String::as_str), Some("overlord"));
    }

    #[tokio::test]
    async fn test_missing_capability_is_denied_and_audited() {
        let (access, store) = access();
        let viewer = access.model().principal_for_role("v1", Role::Viewer);
        let result = access.require(&viewer, Capability::VotesCast, "ballot", Some("b1")).await;
        assert_eq!(result, Err(CoreError::Forbidden));
        assert_eq!(store.audit_len(), 1);

        let denied = access.audit().query(&AuditQuery::default()).await.unwrap();
        assert_eq!(denied[0].action, AuditAction::AccessDenied);
        assert_eq!(denied[0].reason.as_deref(), Some("missing_capability"));
        assert_eq!(denied[0].details.get("attempted").map(String::as_str), Some("votes.cast"));
    }

    #[tokio::test]
    async fn test_admin_passes_capability_checks() {
        let (access, store) = access();
        let admin = crate::rbac::roles::Principal::new("root", Role::Admin, Default::default());
        for capability in Capability::ALL {
            assert!(access.require(&admin, capability, "any", None).await.is_ok());
        }
        assert!(access.require_admin(&admin, "ballot.delete", "ballot", Some("b1")).await.is_ok());
        assert_eq!(store.audit_len(), 0);
    }
}

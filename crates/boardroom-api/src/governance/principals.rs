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

//! Principal provisioning, role changes and deactivation

use crate::error::{CoreError, CoreResult};
use crate::models::NewPrincipal;
use crate::rbac::audit::{AuditAction, AuditOutcome, AuditRecord};
use crate::rbac::permissions::Capability;
use crate::rbac::roles::{Principal, PrincipalRecord, Role};
use crate::rbac::system::AccessControl;
use crate::retry::RetryPolicy;
use crate::store::{PrincipalStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Actor id used for records written by the service itself
pub const SYSTEM_ACTOR: &str = "system";

pub struct PrincipalService {
    store: Arc<dyn PrincipalStore>,
    access: Arc<AccessControl>,
    retry: RetryPolicy,
}

impl PrincipalService {
    pub fn new(store: Arc<dyn PrincipalStore>, access: Arc<AccessControl>, retry: RetryPolicy) -> Self {
        Self { store, access, retry }
    }

    async fn load(&self, id: &str) -> CoreResult<PrincipalRecord> {
        self.retry
            .run("principal.get", |_| self.store.get_principal(id))
            .await?
            .ok_or_else(|| CoreError::not_found(format!("principal {}", id)))
    }

    fn record_for(&self, request: NewPrincipal) -> CoreResult<PrincipalRecord> {
        let id = request.id.trim().to_string();
        if id.is_empty() {
            return Err(CoreError::validation("principal id is required"));
        }
        let display_name = request.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(CoreError::validation("displayName is required"));
        }
        let now = Utc::now();
        Ok(PrincipalRecord {
            id,
            display_name,
            email: request.email.filter(|e| !e.trim().is_empty()),
            role: request.role.as_str().to_string(),
            permissions: self.access.model().resolve_capabilities(request.role).to_strings(),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    async fn insert(&self, actor_id: &str, record: PrincipalRecord) -> CoreResult<PrincipalRecord> {
        self.retry
            .run("principal.insert", |attempt| {
                let record = record.clone();
                async move {
                    match self.store.insert_principal(record).await {
                        Err(StoreError::AlreadyExists { .. }) if attempt > 1 => Ok(()),
                        other => other,
                    }
                }
            })
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists { id, .. } => CoreError::validation(format!("principal {} already exists", id)),
                other => other.into(),
            })?;

        info!(principal = %record.id, role = %record.role, provisioned_by = %actor_id, "Principal provisioned");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::PrincipalCreate, actor_id, "principal", AuditOutcome::Success)
                    .with_resource_id(record.id.as_str())
                    .with_change::<PrincipalRecord, PrincipalRecord>(None, Some(&record)),
            )
            .await;
        Ok(record)
    }

    /// Provision a principal with its role's default grants
    pub async fn create(&self, actor: &Principal, request: NewPrincipal) -> CoreResult<PrincipalRecord> {
        self.access.require(actor, Capability::UsersCreate, "principal", None).await?;
        let record = self.record_for(request)?;
        self.insert(&actor.id, record).await
    }

    /// Replace the role and reset the explicit grants to the new role's set
    pub async fn change_role(&self, actor: &Principal, id: &str, role: Role) -> CoreResult<PrincipalRecord> {
        self.access.require(actor, Capability::UsersEdit, "principal", Some(id)).await?;
        let before = self.load(id).await?;
        if actor.id == id && role != actor.role {
            return Err(CoreError::validation("principals cannot change their own role"));
        }

        let mut after = before.clone();
        after.role = role.as_str().to_string();
        after.permissions = self.access.model().resolve_capabilities(role).to_strings();
        after.updated_at = Utc::now();
        self.retry.run("principal.put", |_| self.store.put_principal(after.clone())).await?;

        info!(principal = %id, from = %before.role, to = %after.role, changed_by = %actor.id, "Principal role changed");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::PrincipalRoleChange, actor.id.as_str(), "principal", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_change(Some(&before), Some(&after)),
            )
            .await;
        Ok(after)
    }

    /// Principals are never deleted, only deactivated
    pub async fn deactivate(&self, actor: &Principal, id: &str) -> CoreResult<PrincipalRecord> {
        self.access.require(actor, Capability::UsersEdit, "principal", Some(id)).await?;
        if actor.id == id {
            return Err(CoreError::validation("principals cannot deactivate themselves"));
        }
        let before = self.load(id).await?;
        if !before.active {
            return Ok(before);
        }
        let mut after = before.clone();
        after.active = false;
        after.updated_at = Utc::now();
        self.retry.run("principal.put", |_| self.store.put_principal(after.clone())).await?;

        info!(principal = %id, deactivated_by = %actor.id, "Principal deactivated");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::PrincipalDeactivate, actor.id.as_str(), "principal", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_change(Some(&before), Some(&after)),
            )
            .await;
        Ok(after)
    }

    /// Any principal may read its own record
    pub async fn get(&self, actor: &Principal, id: &str) -> CoreResult<PrincipalRecord> {
        if actor.id != id {
            self.access.require(actor, Capability::UsersRead, "principal", Some(id)).await?;
        }
        self.load(id).await
    }

    /// Resolved capabilities of a stored principal; `None` once deactivated
    pub async fn effective(&self, id: &str) -> CoreResult<Option<Principal>> {
        let record = self.load(id).await?;
        if !record.active {
            return Ok(None);
        }
        Ok(Some(self.access.resolve_principal(&record).await))
    }

    pub async fn list(&self, actor: &Principal) -> CoreResult<Vec<PrincipalRecord>> {
        self.access.require(actor, Capability::UsersRead, "principal", None).await?;
        Ok(self.retry.run("principal.list", |_| self.store.list_principals()).await?)
    }

    /// Make sure the configured admin exists so a fresh deployment can be administered
    pub async fn bootstrap_admin(&self, id: &str) -> CoreResult<()> {
        if let Some(existing) = self.retry.run("principal.get", |_| self.store.get_principal(id)).await? {
            info!(principal = %existing.id, role = %existing.role, active = existing.active, "Bootstrap principal already provisioned");
            return Ok(());
        }
        let record = self.record_for(NewPrincipal {
            id: id.to_string(),
            display_name: "Administrator".to_string(),
            email: None,
            role: Role::Admin,
        })?;
        self.insert(SYSTEM_ACTOR, record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::audit::{AuditQuery, AuditRecorder, DenialAlert};
    use crate::rbac::roles::{PermissionModel, RoleTable};
    use crate::store::MemoryStore;

    fn service() -> (PrincipalService, Arc<AccessControl>) {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(AuditRecorder::new(store.clone(), RetryPolicy::immediate(1), DenialAlert::default()));
        let access = Arc::new(AccessControl::new(PermissionModel::new(Arc::new(RoleTable::builtin())), audit));
        (PrincipalService::new(store, access.clone(), RetryPolicy::immediate(1)), access)
    }

    fn new_principal(id: &str, role: Role) -> NewPrincipal {
        NewPrincipal {
            id: id.to_string(),
            display_name: format!("User {}", id),
            email: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_provision_and_change_role() {
        let (service, access) = service();
        let admin = access.model().principal_for_role("root", Role::Admin);

        let created = service.create(&admin, new_principal("bm1", Role::BoardMember)).await.unwrap();
        assert_eq!(created.role, "board_member");
        assert!(created.permissions.contains(&"votes.cast".to_string()));

        let changed = service.change_role(&admin, "bm1", Role::Secretary).await.unwrap();
        assert_eq!(changed.role, "secretary");
        assert!(!changed.permissions.contains(&"votes.cast".to_string()));
        assert!(changed.permissions.contains(&"votes.create".to_string()));

        let changes = access
            .audit()
            .query(&AuditQuery {
                action: Some(AuditAction::PrincipalRoleChange),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].before.is_some() && changes[0].after.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let (service, access) = service();
        let admin = access.model().principal_for_role("root", Role::Admin);
        service.create(&admin, new_principal("bm1", Role::BoardMember)).await.unwrap();
        assert!(matches!(service.create(&admin, new_principal("bm1", Role::Viewer)).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_secretary_cannot_provision() {
        let (service, access) = service();
        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        assert_eq!(service.create(&secretary, new_principal("x", Role::Admin)).await, Err(CoreError::Forbidden));
    }

    #[tokio::test]
    async fn test_deactivate_keeps_record() {
        let (service, access) = service();
        let admin = access.model().principal_for_role("root", Role::Admin);
        service.create(&admin, new_principal("v1", Role::Viewer)).await.unwrap();

        let deactivated = service.deactivate(&admin, "v1").await.unwrap();
        assert!(!deactivated.active);
        assert!(matches!(service.deactivate(&admin, "root").await, Err(CoreError::Validation(_))));
        assert_eq!(service.list(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let (service, access) = service();
        service.bootstrap_admin("root").await.unwrap();
        service.bootstrap_admin("root").await.unwrap();

        let admin = access.model().principal_for_role("root", Role::Admin);
        let all = service.list(&admin).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].permissions, vec!["*".to_string()]);
    }
}

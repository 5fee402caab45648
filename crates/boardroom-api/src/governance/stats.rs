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

//! Administrative record counts

use crate::error::CoreResult;
use crate::rbac::roles::Principal;
use crate::rbac::system::AccessControl;
use crate::retry::RetryPolicy;
use crate::store::GovernanceStore;
use crate::voting::ballot::BallotStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

/// Snapshot of how many records the store holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_principals: usize,
    pub active_principals: usize,
    pub total_documents: usize,
    pub total_meetings: usize,
    /// Deleted ballots are not counted
    pub total_ballots: usize,
    pub open_ballots: usize,
    pub generated_at: DateTime<Utc>,
}

pub struct StatsService {
    store: Arc<dyn GovernanceStore>,
    access: Arc<AccessControl>,
    retry: RetryPolicy,
}

impl StatsService {
    pub fn new(store: Arc<dyn GovernanceStore>, access: Arc<AccessControl>, retry: RetryPolicy) -> Self {
        Self { store, access, retry }
    }

    /// Admin only
    pub async fn collect(&self, principal: &Principal) -> CoreResult<SystemStats> {
        self.access.require_admin(principal, "system.stats", "system", None).await?;

        let (principals, documents, meetings, ballots) = tokio::try_join!(
            self.retry.run("principal.list", |_| self.store.list_principals()),
            self.retry.run("document.list", |_| self.store.list_documents()),
            self.retry.run("meeting.list", |_| self.store.list_meetings()),
            self.retry.run("ballot.list", |_| self.store.list_ballots()),
        )?;

        let now = Utc::now();
        let stats = SystemStats {
            total_principals: principals.len(),
            active_principals: principals.iter().filter(|p| p.active).count(),
            total_documents: documents.len(),
            total_meetings: meetings.len(),
            total_ballots: ballots.len(),
            open_ballots: ballots.iter().filter(|b| b.status_at(now) == BallotStatus::Active).count(),
            generated_at: now,
        };
        debug!(requested_by = %principal.id, principals = stats.total_principals, ballots = stats.total_ballots, "System stats collected");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::rbac::audit::{AuditRecorder, DenialAlert};
    use crate::rbac::roles::{PermissionModel, PrincipalRecord, Role, RoleTable};
    use crate::store::{BallotStore, MemoryStore, PrincipalStore};
    use crate::voting::ballot::{Ballot, NewBallot};
    use chrono::Duration;

    fn service(store: Arc<MemoryStore>) -> (StatsService, Arc<AccessControl>) {
        let audit = Arc::new(AuditRecorder::new(store.clone(), RetryPolicy::immediate(1), DenialAlert::default()));
        let access = Arc::new(AccessControl::new(PermissionModel::new(Arc::new(RoleTable::builtin())), audit));
        (StatsService::new(store, access.clone(), RetryPolicy::immediate(1)), access)
    }

    fn principal(id: &str, active: bool) -> PrincipalRecord {
        let now = Utc::now();
        PrincipalRecord {
            id: id.to_string(),
            display_name: id.to_string(),
            email: None,
            role: "board_member".to_string(),
            permissions: vec![],
            active,
            created_at: now,
            updated_at: now,
        }
    }

    fn ballot(id: &str, starts_in: Duration) -> Ballot {
        let now = Utc::now();
        let request: NewBallot = serde_json::from_value(serde_json::json!({
            "title": "Motion",
            "options": ["Yes", "No"],
            "startDate": now + starts_in,
            "endDate": now + starts_in + Duration::hours(2),
        }))
        .unwrap();
        Ballot::from_request(request, id.to_string(), "sec", now).unwrap()
    }

    #[tokio::test]
    async fn test_counts_records_for_admin_only() {
        let store = Arc::new(MemoryStore::new());
        store.insert_principal(principal("bm1", true)).await.unwrap();
        store.insert_principal(principal("bm2", false)).await.unwrap();
        store.insert_ballot(ballot("open", -Duration::hours(1))).await.unwrap();
        store.insert_ballot(ballot("later", Duration::days(1))).await.unwrap();
        store.insert_ballot(ballot("gone", -Duration::hours(1))).await.unwrap();
        store.delete_ballot("gone", Utc::now()).await.unwrap();

        let (service, access) = service(store);
        let stats = service.collect(&access.model().principal_for_role("root", Role::Admin)).await.unwrap();
        assert_eq!((stats.total_principals, stats.active_principals), (2, 1));
        assert_eq!((stats.total_ballots, stats.open_ballots), (2, 1));
        assert_eq!((stats.total_documents, stats.total_meetings), (0, 0));

        let secretary = access.model().principal_for_role("sec", Role::Secretary);
        assert_eq!(service.collect(&secretary).await, Err(CoreError::Forbidden));
    }
}

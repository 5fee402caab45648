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

//! Shared application state wired from one backing store

use crate::auth::{Authenticator, JwtManager};
use crate::config::Config;
use crate::governance::{DocumentService, MeetingService, PrincipalService, StatsService};
use crate::rbac::audit::AuditRecorder;
use crate::rbac::roles::{PermissionModel, RoleTable};
use crate::rbac::system::AccessControl;
use crate::store::GovernanceStore;
use crate::voting::{ReceiptSigner, VotingEngine};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub access: Arc<AccessControl>,
    pub auth: Arc<Authenticator>,
    pub voting: Arc<VotingEngine>,
    pub documents: Arc<DocumentService>,
    pub meetings: Arc<MeetingService>,
    pub principals: Arc<PrincipalService>,
    pub stats: Arc<StatsService>,
}

impl AppState {
    pub fn new<S: GovernanceStore + 'static>(config: Config, table: RoleTable, store: Arc<S>) -> Self {
        let retry = config.retry_policy();
        let audit = Arc::new(AuditRecorder::new(store.clone(), retry, config.denial_alert()));
        let access = Arc::new(AccessControl::new(PermissionModel::new(Arc::new(table)), audit));

        let jwt = JwtManager::new(&config.jwt_secret, &config.jwt_issuer, &config.jwt_audience);
        let auth = Arc::new(Authenticator::new(jwt, store.clone(), access.clone(), retry));
        let signer = ReceiptSigner::new(config.receipt_secret.as_bytes());

        Self {
            voting: Arc::new(VotingEngine::new(store.clone(), store.clone(), access.clone(), signer, retry)),
            documents: Arc::new(DocumentService::new(store.clone(), access.clone(), retry)),
            meetings: Arc::new(MeetingService::new(store.clone(), access.clone(), retry)),
            stats: Arc::new(StatsService::new(store.clone(), access.clone(), retry)),
            principals: Arc::new(PrincipalService::new(store, access.clone(), retry)),
            auth,
            access,
            config: Arc::new(config),
        }
    }
}

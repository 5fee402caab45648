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

//! Roles, the role table and principal resolution

use super::permissions::{Capability, CapabilitySet, Category, Grant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

/// Governance role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Secretary,
    BoardMember,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Secretary, Role::BoardMember, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Secretary => "secretary",
            Role::BoardMember => "board_member",
            Role::Viewer => "viewer",
        }
    }

    fn index(&self) -> usize {
        match self {
            Role::Admin => 0,
            Role::Secretary => 1,
            Role::BoardMember => 2,
            Role::Viewer => 3,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL.into_iter().find(|r| r.as_str() == s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum RoleTableError {
    #[error("failed to read role table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid role table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("role table has no entry for {0}")]
    MissingRole(Role),
}

/// Immutable role to capability mapping, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTable {
    roles: [CapabilitySet; 4],
}

impl RoleTable {
    /// The standard board governance table
    pub fn builtin() -> Self {
        use Capability::*;

        let secretary = [
            DocumentsRead,
            DocumentsCreate,
            DocumentsEdit,
            MeetingsRead,
            MeetingsCreate,
            MeetingsEdit,
            VotesCreate,
            ReportsRead,
            ReportsCreate,
        ];
        let board_member = [DocumentsRead, MeetingsRead, VotesCast, ReportsRead];
        let viewer = [DocumentsRead, MeetingsRead, ReportsRead];

        Self {
            roles: [
                CapabilitySet::new([Grant::Everything]),
                secretary.into_iter().map(Grant::Exact).collect(),
                board_member.into_iter().map(Grant::Exact).collect(),
                viewer.into_iter().map(Grant::Exact).collect(),
            ],
        }
    }

    /// Parse a table of the form `{"admin": ["*"], "viewer": ["documents.read"], ...}`
    pub fn from_json(json: &str) -> Result<Self, RoleTableError> {
        let mut parsed: HashMap<Role, CapabilitySet> = serde_json::from_str(json)?;
        let mut take = |role: Role| parsed.remove(&role).ok_or(RoleTableError::MissingRole(role));
        Ok(Self {
            roles: [take(Role::Admin)?, take(Role::Secretary)?, take(Role::BoardMember)?, take(Role::Viewer)?],
        })
    }

    pub fn load(path: &Path) -> Result<Self, RoleTableError> {
        let json = std::fs::read_to_string(path).map_err(|source| RoleTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn capabilities(&self, role: Role) -> &CapabilitySet {
        &self.roles[role.index()]
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Principal as persisted by account provisioning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalRecord {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Stored as a free string; unknown values resolve to viewer
    pub role: String,
    pub permissions: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authenticated actor with a resolved role and capability set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub capabilities: CapabilitySet,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role, capabilities: CapabilitySet) -> Self {
        Self { id: id.into(), role, capabilities }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }
}

/// Result of resolving a persisted record into a principal
#[derive(Debug, Clone)]
pub struct Resolution {
    pub principal: Principal,
    pub unknown_role: Option<String>,
    pub rejected_grants: Vec<String>,
}

/// Pure role and capability resolution over an injected table
#[derive(Debug, Clone)]
pub struct PermissionModel {
    table: Arc<RoleTable>,
}

impl PermissionModel {
    pub fn new(table: Arc<RoleTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RoleTable {
        &self.table
    }

    pub fn resolve_capabilities(&self, role: Role) -> CapabilitySet {
        self.table.capabilities(role).clone()
    }

    pub fn has_capability(&self, set: &CapabilitySet, required: Capability) -> bool {
        set.has(required)
    }

    /// Principal carrying exactly the role table's grants
    pub fn principal_for_role(&self, id: impl Into<String>, role: Role) -> Principal {
        Principal::new(id, role, self.resolve_capabilities(role))
    }

    /// Resolve a stored record. An unknown role never escalates: it falls
    /// back to viewer grants and ignores any stored explicit set.
    pub fn resolve(&self, record: &PrincipalRecord) -> Resolution {
        match record.role.parse::<Role>() {
            Ok(role) => {
                let (capabilities, rejected_grants) = if record.permissions.is_empty() {
                    (self.resolve_capabilities(role), Vec::new())
                } else {
                    CapabilitySet::parse_lenient(&record.permissions)
                };
                Resolution {
                    principal: Principal::new(record.id.clone(), role, capabilities),
                    unknown_role: None,
                    rejected_grants,
                }
            }
            Err(UnknownRole(raw)) => Resolution {
                principal: self.principal_for_role(record.id.clone(), Role::Viewer),
                unknown_role: Some(raw),
                rejected_grants: Vec::new(),
            },
        }
    }

    /// Resolve a bare resource/action pair to a capability
    pub fn capability_for(category: &str, action: &str) -> Option<Capability> {
        let category: Category = category.parse().ok()?;
        Capability::from_parts(category, action)
    }
}

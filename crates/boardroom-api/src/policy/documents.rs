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

//! Document access policy

use super::{Decision, DenialReason};
use crate::error::CoreError;
use crate::rbac::permissions::Capability;
use crate::rbac::roles::{Principal, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Confidentiality tier, ordered from least to most sensitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Confidentiality {
    Public,
    #[serde(alias = "internal")]
    Confidential,
    Restricted,
    TopSecret,
}

impl Confidentiality {
    pub const ALL: [Confidentiality; 4] = [Confidentiality::Public, Confidentiality::Confidential, Confidentiality::Restricted, Confidentiality::TopSecret];

    /// Role gate for this tier
    pub fn permits(&self, role: Role) -> bool {
        match self {
            Confidentiality::TopSecret => matches!(role, Role::Admin | Role::BoardMember),
            Confidentiality::Restricted => matches!(role, Role::Admin | Role::BoardMember | Role::Secretary),
            Confidentiality::Confidential | Confidentiality::Public => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidentiality::Public => "public",
            Confidentiality::Confidential => "confidential",
            Confidentiality::Restricted => "restricted",
            Confidentiality::TopSecret => "top-secret",
        }
    }
}

impl fmt::Display for Confidentiality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest tier a role may hold or upload
pub fn max_confidentiality(role: Role) -> Confidentiality {
    match role {
        Role::Admin | Role::BoardMember => Confidentiality::TopSecret,
        Role::Secretary => Confidentiality::Restricted,
        Role::Viewer => Confidentiality::Confidential,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Review,
    Approved,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Review => "review",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Archived => "archived",
        }
    }

    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!((*self, next), (Draft, Review) | (Review, Draft) | (Review, Approved) | (Draft | Review | Approved, Archived))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub confidentiality: Confidentiality,
    pub access_list: Vec<String>,
    pub owner: String,
    pub version: u64,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_listed(&self, principal_id: &str) -> bool {
        self.access_list.iter().any(|id| id == principal_id)
    }

    /// Move to `next`, bumping the version
    pub fn transition(&mut self, next: DocumentStatus, now: DateTime<Utc>) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                entity: "document",
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.touch(now);
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Read access. All gates must pass unless the principal is an admin.
pub fn evaluate_document_access(principal: &Principal, document: &Document) -> Decision {
    if principal.is_admin() {
        return Decision::Allow;
    }
    if !document.is_listed(&principal.id) {
        return Decision::Deny(DenialReason::NotOnAccessList);
    }
    if !principal.has(Capability::DocumentsRead) {
        return Decision::Deny(DenialReason::MissingCapability);
    }
    if !document.confidentiality.permits(principal.role) {
        return Decision::Deny(DenialReason::ConfidentialityTier);
    }
    Decision::Allow
}

pub fn can_access_document(principal: &Principal, document: &Document) -> bool {
    evaluate_document_access(principal, document).is_allowed()
}

/// Edit access: `documents.edit`, owner or listed, and the tier gate
pub fn evaluate_document_edit(principal: &Principal, document: &Document) -> Decision {
    if principal.is_admin() {
        return Decision::Allow;
    }
    if !principal.has(Capability::DocumentsEdit) {
        return Decision::Deny(DenialReason::MissingCapability);
    }
    if document.owner != principal.id && !document.is_listed(&principal.id) {
        return Decision::Deny(DenialReason::NotOwner);
    }
    if !document.confidentiality.permits(principal.role) {
        return Decision::Deny(DenialReason::ConfidentialityTier);
    }
    Decision::Allow
}

pub fn can_edit_document(principal: &Principal, document: &Document) -> bool {
    evaluate_document_edit(principal, document).is_allowed()
}

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

//! Role-Based Access Control (RBAC) for the governance core
//!
//! - Capability tokens with category and global wildcards
//! - Injected role table and principal resolution
//! - Access-control facade over the document and meeting policies
//! - Audit journal with repeated-denial alerting

pub mod audit;
pub mod permissions;
pub mod roles;
pub mod system;

pub use audit::{AuditAction, AuditOutcome, AuditQuery, AuditRecord, AuditRecorder, DenialAlert};
pub use permissions::{Capability, CapabilitySet, Category, Grant, has_capability};
pub use roles::{PermissionModel, Principal, PrincipalRecord, Role, RoleTable, RoleTableError};
pub use system::AccessControl;

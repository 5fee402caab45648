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

//! Capability tokens and grant resolution

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability: {0}")]
pub struct CapabilityParseError(pub String);

/// Capability category, the prefix before the dot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Documents,
    Meetings,
    Users,
    Reports,
    Votes,
    Audit,
}

impl Category {
    pub const ALL: [Category; 6] = [Category::Documents, Category::Meetings, Category::Users, Category::Reports, Category::Votes, Category::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Documents => "documents",
            Category::Meetings => "meetings",
            Category::Users => "users",
            Category::Reports => "reports",
            Category::Votes => "votes",
            Category::Audit => "audit",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL.into_iter().find(|c| c.as_str() == s).ok_or_else(|| CapabilityParseError(s.to_string()))
    }
}

/// Atomic capability token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    DocumentsRead,
    DocumentsCreate,
    DocumentsEdit,
    DocumentsDelete,
    MeetingsRead,
    MeetingsCreate,
    MeetingsEdit,
    MeetingsDelete,
    UsersRead,
    UsersCreate,
    UsersEdit,
    UsersDelete,
    ReportsRead,
    ReportsCreate,
    VotesCast,
    VotesCreate,
    AuditRead,
}

impl Capability {
    pub const ALL: [Capability; 17] = [
        Capability::DocumentsRead,
        Capability::DocumentsCreate,
        Capability::DocumentsEdit,
        Capability::DocumentsDelete,
        Capability::MeetingsRead,
        Capability::MeetingsCreate,
        Capability::MeetingsEdit,
        Capability::MeetingsDelete,
        Capability::UsersRead,
        Capability::UsersCreate,
        Capability::UsersEdit,
        Capability::UsersDelete,
        Capability::ReportsRead,
        Capability::ReportsCreate,
        Capability::VotesCast,
        Capability::VotesCreate,
        Capability::AuditRead,
    ];

    pub fn category(&self) -> Category {
        match self {
            Capability::DocumentsRead | Capability::DocumentsCreate | Capability::DocumentsEdit | Capability::DocumentsDelete => Category::Documents,
            Capability::MeetingsRead | Capability::MeetingsCreate | Capability::MeetingsEdit | Capability::MeetingsDelete => Category::Meetings,
            Capability::UsersRead | Capability::UsersCreate | Capability::UsersEdit | Capability::UsersDelete => Category::Users,
            Capability::ReportsRead | Capability::ReportsCreate => Category::Reports,
            Capability::VotesCast | Capability::VotesCreate => Category::Votes,
            Capability::AuditRead => Category::Audit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::DocumentsRead => "documents.read",
            Capability::DocumentsCreate => "documents.create",
            Capability::DocumentsEdit => "documents.edit",
            Capability::DocumentsDelete => "documents.delete",
            Capability::MeetingsRead => "meetings.read",
            Capability::MeetingsCreate => "meetings.create",
            Capability::MeetingsEdit => "meetings.edit",
            Capability::MeetingsDelete => "meetings.delete",
            Capability::UsersRead => "users.read",
            Capability::UsersCreate => "users.create",
            Capability::UsersEdit => "users.edit",
            Capability::UsersDelete => "users.delete",
            Capability::ReportsRead => "reports.read",
            Capability::ReportsCreate => "reports.create",
            Capability::VotesCast => "votes.cast",
            Capability::VotesCreate => "votes.create",
            Capability::AuditRead => "audit.read",
        }
    }

    /// Action half of the token, e.g. `read` for `documents.read`
    pub fn action(&self) -> &'static str {
        let s = self.as_str();
        s.split_once('.').map(|(_, action)| action).unwrap_or(s)
    }

    /// Look up a capability by category and action
    pub fn from_parts(category: Category, action: &str) -> Option<Capability> {
        Capability::ALL.into_iter().find(|c| c.category() == category && c.action() == action)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL.into_iter().find(|c| c.as_str() == s).ok_or_else(|| CapabilityParseError(s.to_string()))
    }
}

/// A grant held by a principal: one capability, a whole category, or everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Grant {
    Exact(Capability),
    Category(Category),
    Everything,
}

impl Grant {
    pub fn covers(&self, required: Capability) -> bool {
        match self {
            Grant::Exact(cap) => *cap == required,
            Grant::Category(category) => *category == required.category(),
            Grant::Everything => true,
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Exact(cap) => write!(f, "{}", cap),
            Grant::Category(category) => write!(f, "{}.*", category),
            Grant::Everything => f.write_str("*"),
        }
    }
}

impl FromStr for Grant {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Grant::Everything);
        }
        if let Some(category) = s.strip_suffix(".*") {
            return category.parse().map(Grant::Category).map_err(|_| CapabilityParseError(s.to_string()));
        }
        s.parse().map(Grant::Exact)
    }
}

impl TryFrom<String> for Grant {
    type Error = CapabilityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Grant> for String {
    fn from(grant: Grant) -> Self {
        grant.to_string()
    }
}

impl From<Capability> for Grant {
    fn from(cap: Capability) -> Self {
        Grant::Exact(cap)
    }
}

/// Set of grants held by a role or principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    grants: BTreeSet<Grant>,
}

impl CapabilitySet {
    pub fn new(grants: impl IntoIterator<Item = Grant>) -> Self {
        Self { grants: grants.into_iter().collect() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, grant: Grant) {
        self.grants.insert(grant);
    }

    pub fn revoke(&mut self, grant: &Grant) -> bool {
        self.grants.remove(grant)
    }

    /// Exact match, category wildcard, or global wildcard
    pub fn has(&self, required: Capability) -> bool {
        self.grants.iter().any(|grant| grant.covers(required))
    }

    pub fn grants(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.grants.iter().map(|g| g.to_string()).collect()
    }

    /// Parse stored grant strings, returning the ones that did not parse
    pub fn parse_lenient<S: AsRef<str>>(values: &[S]) -> (Self, Vec<String>) {
        let mut set = CapabilitySet::empty();
        let mut rejected = Vec::new();
        for value in values {
            match value.as_ref().parse::<Grant>() {
                Ok(grant) => set.grant(grant),
                Err(e) => rejected.push(e.0),
            }
        }
        (set, rejected)
    }
}

impl FromIterator<Grant> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Grant>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Whether `set` satisfies `required`
pub fn has_capability(set: &CapabilitySet, required: Capability) -> bool {
    set.has(required)
}

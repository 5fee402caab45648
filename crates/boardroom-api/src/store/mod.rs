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

//! Storage collaborator interfaces
//!
//! The service does not own a storage engine. These traits describe the
//! document store it talks to: keyed records, query by field, and an atomic
//! read-modify-write section per ballot record.

pub mod memory;

pub use memory::MemoryStore;

use crate::policy::documents::Document;
use crate::policy::meetings::Meeting;
use crate::rbac::audit::{AuditQuery, AuditRecord};
use crate::rbac::roles::PrincipalRecord;
use crate::voting::ballot::{Ballot, BallotOption};
use crate::voting::tally::{Tally, Vote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("{collection} record already exists: {id}")]
    AlreadyExists { collection: &'static str, id: String },

    #[error("{collection} record not found: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("missing index on {collection}({fields})")]
    MissingIndex { collection: &'static str, fields: String },
}

impl StoreError {
    /// Failures worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Composite index the service queries through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub collection: &'static str,
    pub fields: &'static [&'static str],
}

impl IndexSpec {
    pub const fn new(collection: &'static str, fields: &'static [&'static str]) -> Self {
        Self { collection, fields }
    }
}

/// Indexes that must exist before the service accepts traffic
pub const REQUIRED_INDEXES: &[IndexSpec] = &[
    IndexSpec::new("votes", &["ballotId", "voterId"]),
    IndexSpec::new("ballots", &["createdAt"]),
    IndexSpec::new("audit", &["actorId", "timestamp"]),
    IndexSpec::new("audit", &["resourceType", "timestamp"]),
    IndexSpec::new("audit", &["action", "timestamp"]),
    IndexSpec::new("documents", &["updatedAt"]),
    IndexSpec::new("meetings", &["scheduledFor"]),
];

/// Result of the atomic vote commit
#[derive(Debug, Clone, PartialEq)]
pub enum VoteCommit {
    /// Vote inserted and tally incremented
    Recorded(Tally),
    /// A vote by this voter already exists; nothing was written
    Existing(Vote),
    /// The selection no longer fits the ballot's current options; nothing was written
    InvalidSelection(String),
}

/// Result of an atomic option replacement
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsReplace {
    Replaced(Ballot),
    /// At least one vote exists
    Frozen,
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn get_principal(&self, id: &str) -> StoreResult<Option<PrincipalRecord>>;
    async fn insert_principal(&self, record: PrincipalRecord) -> StoreResult<()>;
    async fn put_principal(&self, record: PrincipalRecord) -> StoreResult<()>;
    async fn list_principals(&self) -> StoreResult<Vec<PrincipalRecord>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: Document) -> StoreResult<()>;
    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>>;
    /// Conflict unless `document.version` is newer than the stored version
    async fn put_document(&self, document: Document) -> StoreResult<()>;
    async fn delete_document(&self, id: &str) -> StoreResult<bool>;
    /// Most recently updated first
    async fn list_documents(&self) -> StoreResult<Vec<Document>>;
}

#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn insert_meeting(&self, meeting: Meeting) -> StoreResult<()>;
    async fn get_meeting(&self, id: &str) -> StoreResult<Option<Meeting>>;
    /// Conflict unless `meeting.revision` is exactly one past the stored revision
    async fn put_meeting(&self, meeting: Meeting) -> StoreResult<()>;
    /// Ordered by scheduled time
    async fn list_meetings(&self) -> StoreResult<Vec<Meeting>>;
}

#[async_trait]
pub trait BallotStore: Send + Sync {
    /// Insert a ballot with an empty tally
    async fn insert_ballot(&self, ballot: Ballot) -> StoreResult<()>;

    /// Deleted ballots are not returned
    async fn get_ballot(&self, id: &str) -> StoreResult<Option<Ballot>>;

    /// Newest first
    async fn list_ballots(&self) -> StoreResult<Vec<Ballot>>;

    /// Replace options unless a vote exists, atomically with the vote set
    async fn replace_options(&self, ballot_id: &str, options: Vec<BallotOption>, at: DateTime<Utc>) -> StoreResult<OptionsReplace>;

    /// Soft delete; votes are retained
    async fn delete_ballot(&self, ballot_id: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Duplicate check, vote insert and tally increment in one atomic section
    async fn commit_vote(&self, vote: &Vote) -> StoreResult<VoteCommit>;

    async fn find_vote(&self, ballot_id: &str, voter_id: &str) -> StoreResult<Option<Vote>>;
    async fn list_votes(&self, ballot_id: &str) -> StoreResult<Vec<Vote>>;
    async fn get_tally(&self, ballot_id: &str) -> StoreResult<Option<Tally>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Idempotent by record id
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<()>;

    /// Newest first, at most `query.limit` records
    async fn query_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditRecord>>;
}

pub trait IndexCatalog: Send + Sync {
    fn indexes(&self) -> Vec<IndexSpec>;
}

/// Fail fast when a required index is absent
pub fn verify_indexes(catalog: &dyn IndexCatalog, required: &[IndexSpec]) -> StoreResult<()> {
    let available = catalog.indexes();
    match required.iter().find(|spec| !available.contains(spec)) {
        Some(missing) => Err(StoreError::MissingIndex {
            collection: missing.collection,
            fields: missing.fields.join(","),
        }),
        None => Ok(()),
    }
}

/// Everything the service needs from one backing store
pub trait GovernanceStore: PrincipalStore + DocumentStore + MeetingStore + BallotStore + AuditStore + IndexCatalog {}

impl<T> GovernanceStore for T where T: PrincipalStore + DocumentStore + MeetingStore + BallotStore + AuditStore + IndexCatalog {}

#[cfg(test)]
mod tests {
    use super::*;

    struct PartialCatalog;

    impl IndexCatalog for PartialCatalog {
        fn indexes(&self) -> Vec<IndexSpec> {
            vec![IndexSpec::new("votes", &["ballotId", "voterId"])]
        }
    }

    #[test]
    fn test_missing_index_is_reported() {
        let err = verify_indexes(&PartialCatalog, REQUIRED_INDEXES).unwrap_err();
        assert_eq!(
            err,
            StoreError::MissingIndex {
                collection: "ballots",
                fields: "createdAt".to_string()
            }
        );
        assert!(verify_indexes(&PartialCatalog, &REQUIRED_INDEXES[..1]).is_ok());
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("x".into()).is_transient());
        assert!(StoreError::Timeout("x".into()).is_transient());
        assert!(!StoreError::Conflict("x".into()).is_transient());
        assert!(!StoreError::NotFound { collection: "ballots", id: "b".into() }.is_transient());
    }
}

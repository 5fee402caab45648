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

//! In-process store used for development, single-node deployments and tests

use super::{AuditStore, BallotStore, DocumentStore, IndexCatalog, IndexSpec, MeetingStore, OptionsReplace, PrincipalStore, REQUIRED_INDEXES, StoreError, StoreResult, VoteCommit};
use crate::policy::documents::Document;
use crate::policy::meetings::Meeting;
use crate::rbac::audit::{AuditQuery, AuditRecord};
use crate::rbac::roles::PrincipalRecord;
use crate::voting::ballot::{Ballot, BallotOption};
use crate::voting::tally::{Tally, Vote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Ballot with its tally and vote set, mutated together
#[derive(Debug, Clone)]
struct BallotEntry {
    ballot: Ballot,
    tally: Tally,
    votes: HashMap<String, Vote>,
    vote_order: Vec<String>,
    deleted_at: Option<DateTime<Utc>>,
}

impl BallotEntry {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Default)]
struct AuditJournal {
    records: Vec<AuditRecord>,
    ids: HashSet<String>,
}

#[derive(Debug)]
pub struct MemoryStore {
    principals: DashMap<String, PrincipalRecord>,
    documents: DashMap<String, Document>,
    meetings: DashMap<String, Meeting>,
    ballots: DashMap<String, BallotEntry>,
    audit: RwLock<AuditJournal>,
    indexes: Vec<IndexSpec>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_indexes(REQUIRED_INDEXES.to_vec())
    }

    /// Store advertising only the given indexes
    pub fn with_indexes(indexes: Vec<IndexSpec>) -> Self {
        Self {
            principals: DashMap::new(),
            documents: DashMap::new(),
            meetings: DashMap::new(),
            ballots: DashMap::new(),
            audit: RwLock::new(AuditJournal::default()),
            indexes,
        }
    }

    pub fn audit_len(&self) -> usize {
        self.audit.read().records.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(collection: &'static str, id: &str) -> StoreError {
    StoreError::NotFound { collection, id: id.to_string() }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn get_principal(&self, id: &str) -> StoreResult<Option<PrincipalRecord>> {
        Ok(self.principals.get(id).map(|r| r.clone()))
    }

    async fn insert_principal(&self, record: PrincipalRecord) -> StoreResult<()> {
        match self.principals.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection: "principals",
                id: record.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn put_principal(&self, record: PrincipalRecord) -> StoreResult<()> {
        self.principals.insert(record.id.clone(), record);
        Ok(())
    }

    async fn list_principals(&self) -> StoreResult<Vec<PrincipalRecord>> {
        let mut all: Vec<_> = self.principals.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, document: Document) -> StoreResult<()> {
        match self.documents.entry(document.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection: "documents",
                id: document.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(document);
                Ok(())
            }
        }
    }

    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.documents.get(id).map(|d| d.clone()))
    }

    async fn put_document(&self, document: Document) -> StoreResult<()> {
        let mut existing = self.documents.get_mut(&document.id).ok_or_else(|| not_found("documents", &document.id))?;
        // optimistic check: the incoming version must be newer
        if document.version <= existing.version {
            return Err(StoreError::Conflict(format!("document {} is at version {}", document.id, existing.version)));
        }
        *existing = document;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> StoreResult<bool> {
        Ok(self.documents.remove(id).is_some())
    }

    async fn list_documents(&self) -> StoreResult<Vec<Document>> {
        let mut all: Vec<_> = self.documents.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn insert_meeting(&self, meeting: Meeting) -> StoreResult<()> {
        match self.meetings.entry(meeting.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection: "meetings",
                id: meeting.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(meeting);
                Ok(())
            }
        }
    }

    async fn get_meeting(&self, id: &str) -> StoreResult<Option<Meeting>> {
        Ok(self.meetings.get(id).map(|m| m.clone()))
    }

    async fn put_meeting(&self, meeting: Meeting) -> StoreResult<()> {
        let mut existing = self.meetings.get_mut(&meeting.id).ok_or_else(|| not_found("meetings", &meeting.id))?;
        if meeting.revision != existing.revision + 1 {
            return Err(StoreError::Conflict(format!("meeting {} is at revision {}", meeting.id, existing.revision)));
        }
        *existing = meeting;
        Ok(())
    }

    async fn list_meetings(&self) -> StoreResult<Vec<Meeting>> {
        let mut all: Vec<_> = self.meetings.iter().map(|m| m.value().clone()).collect();
        all.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        Ok(all)
    }
}

#[async_trait]
impl BallotStore for MemoryStore {
    async fn insert_ballot(&self, ballot: Ballot) -> StoreResult<()> {
        match self.ballots.entry(ballot.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists { collection: "ballots", id: ballot.id }),
            Entry::Vacant(slot) => {
                slot.insert(BallotEntry {
                    tally: Tally::empty(&ballot),
                    ballot,
                    votes: HashMap::new(),
                    vote_order: Vec::new(),
                    deleted_at: None,
                });
                Ok(())
            }
        }
    }

    async fn get_ballot(&self, id: &str) -> StoreResult<Option<Ballot>> {
        Ok(self.ballots.get(id).filter(|e| e.is_live()).map(|e| e.ballot.clone()))
    }

    async fn list_ballots(&self) -> StoreResult<Vec<Ballot>> {
        let mut all: Vec<_> = self.ballots.iter().filter(|e| e.is_live()).map(|e| e.ballot.clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(all)
    }

    async fn replace_options(&self, ballot_id: &str, options: Vec<BallotOption>, at: DateTime<Utc>) -> StoreResult<OptionsReplace> {
        let mut entry = self.ballots.get_mut(ballot_id).filter(|e| e.is_live()).ok_or_else(|| not_found("ballots", ballot_id))?;
        if !entry.votes.is_empty() {
            return Ok(OptionsReplace::Frozen);
        }
        entry.tally = Tally::for_options(ballot_id, &options);
        entry.ballot.options = options;
        entry.ballot.updated_at = at;
        Ok(OptionsReplace::Replaced(entry.ballot.clone()))
    }

    async fn delete_ballot(&self, ballot_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        match self.ballots.get_mut(ballot_id) {
            Some(mut entry) if entry.is_live() => {
                entry.deleted_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_vote(&self, vote: &Vote) -> StoreResult<VoteCommit> {
        let mut guard = self.ballots.get_mut(&vote.ballot_id).filter(|e| e.is_live()).ok_or_else(|| not_found("ballots", &vote.ballot_id))?;
        let entry = &mut *guard;

        if let Some(existing) = entry.votes.get(&vote.voter_id) {
            return Ok(VoteCommit::Existing(existing.clone()));
        }
        // options may have been replaced since the caller validated against them
        if let Err(e) = entry.ballot.validate_selection(&vote.selected_option_ids) {
            return Ok(VoteCommit::InvalidSelection(e.to_string()));
        }
        entry.tally.apply(vote, entry.ballot.is_anonymous).map_err(|e| StoreError::Conflict(e.to_string()))?;
        entry.votes.insert(vote.voter_id.clone(), vote.clone());
        entry.vote_order.push(vote.voter_id.clone());
        Ok(VoteCommit::Recorded(entry.tally.clone()))
    }

    async fn find_vote(&self, ballot_id: &str, voter_id: &str) -> StoreResult<Option<Vote>> {
        Ok(self.ballots.get(ballot_id).and_then(|e| e.votes.get(voter_id).cloned()))
    }

    async fn list_votes(&self, ballot_id: &str) -> StoreResult<Vec<Vote>> {
        let entry = self.ballots.get(ballot_id).ok_or_else(|| not_found("ballots", ballot_id))?;
        Ok(entry.vote_order.iter().filter_map(|voter| entry.votes.get(voter).cloned()).collect())
    }

    async fn get_tally(&self, ballot_id: &str) -> StoreResult<Option<Tally>> {
        Ok(self.ballots.get(ballot_id).filter(|e| e.is_live()).map(|e| e.tally.clone()))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<()> {
        let mut journal = self.audit.write();
        if journal.ids.insert(record.id.clone()) {
            journal.records.push(record);
        }
        Ok(())
    }

    async fn query_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditRecord>> {
        let journal = self.audit.read();
        let mut matched: Vec<AuditRecord> = journal.records.iter().rev().filter(|r| query.matches(r)).take(query.limit).cloned().collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matched)
    }
}

impl IndexCatalog for MemoryStore {
    fn indexes(&self) -> Vec<IndexSpec> {
        self.indexes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::audit::{AuditAction, AuditOutcome};
    use crate::voting::ballot::NewBallot;
    use chrono::Duration;

    fn ballot(id: &str) -> Ballot {
        let now = Utc::now();
        let request: NewBallot = serde_json::from_value(serde_json::json!({
            "title": "Motion",
            "options": ["Yes", "No"],
            "startDate": now - Duration::hours(1),
            "endDate": now + Duration::hours(1),
        }))
        .unwrap();
        Ballot::from_request(request, id.to_string(), "sec", now).unwrap()
    }

    fn vote(voter: &str, option: &str) -> Vote {
        Vote {
            ballot_id: "b1".to_string(),
            voter_id: voter.to_string(),
            selected_option_ids: vec![option.to_string()],
            submitted_at: Utc::now(),
            submission_id: uuid::Uuid::new_v4().to_string(),
            receipt: None,
            comments: None,
        }
    }

    #[tokio::test]
    async fn test_commit_vote_rejects_second_vote() {
        let store = MemoryStore::new();
        store.insert_ballot(ballot("b1")).await.unwrap();

        let first = vote("v1", "yes");
        assert!(matches!(store.commit_vote(&first).await.unwrap(), VoteCommit::Recorded(_)));
        match store.commit_vote(&vote("v1", "no")).await.unwrap() {
            VoteCommit::Existing(existing) => assert_eq!(existing, first),
            other => panic!("expected existing vote, got {:?}", other),
        }
        let tally = store.get_tally("b1").await.unwrap().unwrap();
        assert_eq!(tally.count_for("yes"), Some(1));
        assert_eq!(tally.count_for("no"), Some(0));
    }

    #[tokio::test]
    async fn test_options_freeze_after_first_vote() {
        let store = MemoryStore::new();
        store.insert_ballot(ballot("b1")).await.unwrap();
        let options = vec![
            BallotOption { id: "for".into(), label: "For".into() },
            BallotOption { id: "against".into(), label: "Against".into() },
        ];
        assert!(matches!(store.replace_options("b1", options.clone(), Utc::now()).await.unwrap(), OptionsReplace::Replaced(_)));

        store.commit_vote(&vote("v1", "for")).await.unwrap();
        assert_eq!(store.replace_options("b1", options, Utc::now()).await.unwrap(), OptionsReplace::Frozen);
    }

    #[tokio::test]
    async fn test_commit_rechecks_selection_against_replaced_options() {
        let store = MemoryStore::new();
        store.insert_ballot(ballot("b1")).await.unwrap();
        let options = vec![
            BallotOption { id: "for".into(), label: "For".into() },
            BallotOption { id: "against".into(), label: "Against".into() },
        ];
        store.replace_options("b1", options, Utc::now()).await.unwrap();

        match store.commit_vote(&vote("v1", "yes")).await.unwrap() {
            VoteCommit::InvalidSelection(detail) => assert!(detail.contains("yes")),
            other => panic!("expected invalid selection, got {:?}", other),
        }
        assert!(store.find_vote("b1", "v1").await.unwrap().is_none());
        assert!(matches!(store.commit_vote(&vote("v1", "for")).await.unwrap(), VoteCommit::Recorded(_)));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_ballot_but_keeps_votes() {
        let store = MemoryStore::new();
        store.insert_ballot(ballot("b1")).await.unwrap();
        store.commit_vote(&vote("v1", "yes")).await.unwrap();

        assert!(store.delete_ballot("b1", Utc::now()).await.unwrap());
        assert!(!store.delete_ballot("b1", Utc::now()).await.unwrap());
        assert!(store.get_ballot("b1").await.unwrap().is_none());
        assert!(store.list_ballots().await.unwrap().is_empty());
        assert_eq!(store.list_votes("b1").await.unwrap().len(), 1);
        assert!(store.commit_vote(&vote("v2", "no")).await.is_err());
    }

    #[tokio::test]
    async fn test_audit_append_is_idempotent_and_queries_newest_first() {
        let store = MemoryStore::new();
        let first = AuditRecord::new(AuditAction::DocumentView, "alice", "document", AuditOutcome::Success);
        let mut second = AuditRecord::new(AuditAction::VoteCast, "alice", "ballot", AuditOutcome::Success);
        second.timestamp = first.timestamp + Duration::seconds(1);

        store.append_audit(first.clone()).await.unwrap();
        store.append_audit(first.clone()).await.unwrap();
        store.append_audit(second.clone()).await.unwrap();
        assert_eq!(store.audit_len(), 2);

        let all = store.query_audit(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id.clone()).collect::<Vec<_>>(), vec![second.id.clone(), first.id.clone()]);

        let votes = store
            .query_audit(&AuditQuery {
                action: Some(AuditAction::VoteCast),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(votes.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_existing_id() {
        let store = MemoryStore::new();
        store.insert_ballot(ballot("b1")).await.unwrap();
        assert!(matches!(store.insert_ballot(ballot("b1")).await, Err(StoreError::AlreadyExists { .. })));
    }
}

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

//! Audit journal for access decisions and mutations

use crate::retry::RetryPolicy;
use crate::store::{AuditStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AuditAction {
    #[serde(rename = "access.denied")]
    AccessDenied,
    #[serde(rename = "auth.rejected")]
    AuthRejected,
    #[serde(rename = "security.unknown_role")]
    UnknownRole,
    #[serde(rename = "security.invalid_grant")]
    InvalidGrant,
    #[serde(rename = "security.violation")]
    SecurityViolation,
    #[serde(rename = "security.invariant_violation")]
    InvariantViolation,
    #[serde(rename = "principal.create")]
    PrincipalCreate,
    #[serde(rename = "principal.role_change")]
    PrincipalRoleChange,
    #[serde(rename = "principal.deactivate")]
    PrincipalDeactivate,
    #[serde(rename = "document.upload")]
    DocumentUpload,
    #[serde(rename = "document.view")]
    DocumentView,
    #[serde(rename = "document.edit")]
    DocumentEdit,
    #[serde(rename = "document.status")]
    DocumentStatus,
    #[serde(rename = "document.delete")]
    DocumentDelete,
    #[serde(rename = "meeting.create")]
    MeetingCreate,
    #[serde(rename = "meeting.respond")]
    MeetingRespond,
    #[serde(rename = "meeting.join")]
    MeetingJoin,
    #[serde(rename = "meeting.leave")]
    MeetingLeave,
    #[serde(rename = "meeting.status")]
    MeetingStatus,
    #[serde(rename = "ballot.create")]
    BallotCreate,
    #[serde(rename = "ballot.options_update")]
    BallotOptionsUpdate,
    #[serde(rename = "ballot.delete")]
    BallotDelete,
    #[serde(rename = "vote.cast")]
    VoteCast,
    #[serde(rename = "vote.rejected")]
    VoteRejected,
}

impl AuditAction {
    pub const ALL: [AuditAction; 24] = [
        AuditAction::AccessDenied,
        AuditAction::AuthRejected,
        AuditAction::UnknownRole,
        AuditAction::InvalidGrant,
        AuditAction::SecurityViolation,
        AuditAction::InvariantViolation,
        AuditAction::PrincipalCreate,
        AuditAction::PrincipalRoleChange,
        AuditAction::PrincipalDeactivate,
        AuditAction::DocumentUpload,
        AuditAction::DocumentView,
        AuditAction::DocumentEdit,
        AuditAction::DocumentStatus,
        AuditAction::DocumentDelete,
        AuditAction::MeetingCreate,
        AuditAction::MeetingRespond,
        AuditAction::MeetingJoin,
        AuditAction::MeetingLeave,
        AuditAction::MeetingStatus,
        AuditAction::BallotCreate,
        AuditAction::BallotOptionsUpdate,
        AuditAction::BallotDelete,
        AuditAction::VoteCast,
        AuditAction::VoteRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AccessDenied => "access.denied",
            AuditAction::AuthRejected => "auth.rejected",
            AuditAction::UnknownRole => "security.unknown_role",
            AuditAction::InvalidGrant => "security.invalid_grant",
            AuditAction::SecurityViolation => "security.violation",
            AuditAction::InvariantViolation => "security.invariant_violation",
            AuditAction::PrincipalCreate => "principal.create",
            AuditAction::PrincipalRoleChange => "principal.role_change",
            AuditAction::PrincipalDeactivate => "principal.deactivate",
            AuditAction::DocumentUpload => "document.upload",
            AuditAction::DocumentView => "document.view",
            AuditAction::DocumentEdit => "document.edit",
            AuditAction::DocumentStatus => "document.status",
            AuditAction::DocumentDelete => "document.delete",
            AuditAction::MeetingCreate => "meeting.create",
            AuditAction::MeetingRespond => "meeting.respond",
            AuditAction::MeetingJoin => "meeting.join",
            AuditAction::MeetingLeave => "meeting.leave",
            AuditAction::MeetingStatus => "meeting.status",
            AuditAction::BallotCreate => "ballot.create",
            AuditAction::BallotOptionsUpdate => "ballot.options_update",
            AuditAction::BallotDelete => "ballot.delete",
            AuditAction::VoteCast => "vote.cast",
            AuditAction::VoteRejected => "vote.rejected",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL.into_iter().find(|a| a.as_str() == s).ok_or_else(|| format!("unknown audit action: {}", s))
    }
}

/// Audit record outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// Operation succeeded
    Success,
    /// Access check said no
    Denied,
    /// Request failed validation
    Rejected,
    /// Operation failed
    Failure,
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Unique record ID, also the idempotency key for appends
    pub id: String,

    pub actor_id: String,

    pub action: AuditAction,

    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    pub outcome: AuditOutcome,

    /// Machine-readable reason code for denials and rejections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// State before a mutation
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub before: Option<serde_json::Value>,

    /// State after a mutation
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub after: Option<serde_json::Value>,

    pub details: BTreeMap<String, String>,

    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, actor_id: impl Into<String>, resource_type: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            outcome,
            reason: None,
            before: None,
            after: None,
            details: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Attach before/after snapshots. Values that fail to serialize are left out.
    pub fn with_change<B: Serialize, A: Serialize>(mut self, before: Option<&B>, after: Option<&A>) -> Self {
        self.before = before.and_then(|b| serde_json::to_value(b).ok());
        self.after = after.and_then(|a| serde_json::to_value(a).ok());
        self
    }
}

/// Filter for audit log queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub actor_id: Option<String>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub limit: usize,
}

impl AuditQuery {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.actor_id.as_ref().is_none_or(|a| *a == record.actor_id)
            && self.action.is_none_or(|a| a == record.action)
            && self.resource_type.as_ref().is_none_or(|t| *t == record.resource_type)
            && self.resource_id.as_ref().is_none_or(|id| record.resource_id.as_ref() == Some(id))
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            actor_id: None,
            action: None,
            resource_type: None,
            resource_id: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Repeated-denial alerting thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenialAlert {
    pub threshold: usize,
    pub window: Duration,
}

impl Default for DenialAlert {
    fn default() -> Self {
        Self {
            threshold: 5,
            window: Duration::seconds(300),
        }
    }
}

/// Sliding window of recent denials per principal
#[derive(Debug)]
struct DenialTracker {
    alert: DenialAlert,
    recent: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl DenialTracker {
    fn new(alert: DenialAlert) -> Self {
        Self { alert, recent: DashMap::new() }
    }

    /// Record a denial; returns the count in the window when it just reached the threshold
    fn observe(&self, actor_id: &str, at: DateTime<Utc>) -> Option<usize> {
        if self.alert.threshold == 0 {
            return None;
        }
        let cutoff = at - self.alert.window;
        let reached = {
            let mut entry = self.recent.entry(actor_id.to_string()).or_default();
            while entry.front().is_some_and(|t| *t < cutoff) {
                entry.pop_front();
            }
            entry.push_back(at);
            let count = entry.len();
            (count >= self.alert.threshold).then_some(count)
        };

        // actors whose window emptied out are forgotten
        self.recent.retain(|_, times| times.back().is_some_and(|t| *t >= cutoff));
        if reached.is_some() {
            // start a fresh window so one burst raises one alert
            self.recent.remove(actor_id);
        }
        reached
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.recent.len()
    }
}

/// Records audit entries to the store, never failing into the caller
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    retry: RetryPolicy,
    denials: DenialTracker,
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder").field("retry", &self.retry).field("denials", &self.denials).finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, retry: RetryPolicy, alert: DenialAlert) -> Self {
        Self {
            store,
            retry,
            denials: DenialTracker::new(alert),
        }
    }

    /// Log and persist a record. Store failures go to the fallback sink.
    pub async fn record(&self, record: AuditRecord) {
        match record.outcome {
            AuditOutcome::Success => {
                info!(
                    action = %record.action,
                    actor = %record.actor_id,
                    resource_type = %record.resource_type,
                    resource_id = ?record.resource_id,
                    "Audit: {}", record.action
                );
            }
            AuditOutcome::Denied | AuditOutcome::Rejected | AuditOutcome::Failure => {
                warn!(
                    action = %record.action,
                    actor = %record.actor_id,
                    resource_type = %record.resource_type,
                    resource_id = ?record.resource_id,
                    outcome = ?record.outcome,
                    reason = ?record.reason,
                    "Audit: {} - {:?}", record.action, record.outcome
                );
            }
        }

        let result = self.retry.run("audit.append", |_| self.store.append_audit(record.clone())).await;
        if let Err(e) = result {
            self.fallback(&record, &e);
        }
    }

    fn fallback(&self, record: &AuditRecord, cause: &StoreError) {
        counter!("boardroom_audit_fallback_total", 1);
        let payload = serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record));
        error!(target: "audit_fallback", record = %payload, error = %cause, "Audit store unavailable, record written to fallback sink");
    }

    /// Record a denied access attempt and raise a violation on repeated denials
    pub async fn record_denial(&self, actor_id: &str, resource_type: &str, resource_id: Option<&str>, attempted: &str, reason: &str) {
        counter!("boardroom_access_denied_total", 1, "reason" => reason.to_string());

        let mut record = AuditRecord::new(AuditAction::AccessDenied, actor_id, resource_type, AuditOutcome::Denied)
            .with_reason(reason)
            .with_detail("attempted", attempted);
        if let Some(id) = resource_id {
            record = record.with_resource_id(id);
        }
        let at = record.timestamp;
        self.record(record).await;

        if let Some(count) = self.denials.observe(actor_id, at) {
            let violation = AuditRecord::new(AuditAction::SecurityViolation, actor_id, "principal", AuditOutcome::Denied)
                .with_resource_id(actor_id)
                .with_reason("repeated_denials")
                .with_detail("denials", count.to_string())
                .with_detail("window_secs", self.denials.alert.window.num_seconds().to_string());
            self.record(violation).await;
        }
    }

    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, StoreError> {
        let query = AuditQuery {
            limit: query.limit.clamp(1, AuditQuery::MAX_LIMIT),
            ..query.clone()
        };
        self.retry.run("audit.query", |_| self.store.query_audit(&query)).await
    }
}

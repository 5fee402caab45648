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

//! Ballot lifecycle and vote casting

use super::ballot::{Ballot, BallotOptionInput, BallotStatus, NewBallot, normalize_options};
use super::receipt::ReceiptSigner;
use super::tally::{Tally, Vote};
use crate::error::{CoreError, CoreResult};
use crate::policy::meetings::can_cast_vote_in_meeting;
use crate::policy::{Decision, DenialReason};
use crate::rbac::audit::{AuditAction, AuditOutcome, AuditRecord};
use crate::rbac::permissions::Capability;
use crate::rbac::roles::Principal;
use crate::rbac::system::AccessControl;
use crate::retry::RetryPolicy;
use crate::store::{BallotStore, MeetingStore, OptionsReplace, StoreError, VoteCommit};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

/// What the voter gets back from a successful cast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CastOutcome {
    pub ballot_id: String,
    pub submitted_at: DateTime<Utc>,
    /// Returned on anonymous ballots only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    /// The commit had already landed on an earlier attempt
    #[serde(skip)]
    pub replayed: bool,
}

/// Ballot as presented to a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BallotView {
    #[serde(flatten)]
    pub ballot: Ballot,
    pub status: BallotStatus,
    pub total_votes: u64,
    pub has_voted: bool,
}

const MAX_COMMENT_CHARS: usize = 2000;

/// Blank comments are dropped
fn normalize_comments(comments: Option<String>) -> CoreResult<Option<String>> {
    let Some(comments) = comments.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    if comments.chars().count() > MAX_COMMENT_CHARS {
        return Err(CoreError::validation(format!("comments are limited to {} characters", MAX_COMMENT_CHARS)));
    }
    Ok(Some(comments))
}

pub struct VotingEngine {
    ballots: Arc<dyn BallotStore>,
    meetings: Arc<dyn MeetingStore>,
    access: Arc<AccessControl>,
    signer: ReceiptSigner,
    retry: RetryPolicy,
}

impl VotingEngine {
    pub fn new(ballots: Arc<dyn BallotStore>, meetings: Arc<dyn MeetingStore>, access: Arc<AccessControl>, signer: ReceiptSigner, retry: RetryPolicy) -> Self {
        Self {
            ballots,
            meetings,
            access,
            signer,
            retry,
        }
    }

    async fn load_ballot(&self, ballot_id: &str) -> CoreResult<Ballot> {
        self.retry
            .run("ballot.get", |_| self.ballots.get_ballot(ballot_id))
            .await?
            .ok_or_else(|| CoreError::not_found(format!("ballot {}", ballot_id)))
    }

    pub async fn create_ballot(&self, principal: &Principal, request: NewBallot) -> CoreResult<Ballot> {
        self.access.require(principal, Capability::VotesCreate, "ballot", None).await?;

        if let Some(meeting_id) = request.meeting_id.as_deref().filter(|m| !m.is_empty()) {
            let meeting = self.retry.run("meeting.get", |_| self.meetings.get_meeting(meeting_id)).await?;
            if meeting.is_none() {
                return Err(CoreError::validation(format!("meeting {} does not exist", meeting_id)));
            }
        }

        let ballot = Ballot::from_request(request, uuid::Uuid::new_v4().to_string(), &principal.id, Utc::now())?;
        self.retry
            .run("ballot.insert", |attempt| {
                let ballot = ballot.clone();
                async move {
                    match self.ballots.insert_ballot(ballot).await {
                        // an earlier attempt landed before the error surfaced
                        Err(StoreError::AlreadyExists { .. }) if attempt > 1 => Ok(()),
                        other => other,
                    }
                }
            })
            .await?;

        info!(ballot_id = %ballot.id, created_by = %principal.id, options = ballot.options.len(), "Ballot created");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::BallotCreate, principal.id.as_str(), "ballot", AuditOutcome::Success)
                    .with_resource_id(ballot.id.as_str())
                    .with_change::<Ballot, Ballot>(None, Some(&ballot)),
            )
            .await;
        Ok(ballot)
    }

    /// Whether `principal` may vote on `ballot`: admin, listed voter, or eligible through the linked meeting
    pub async fn is_eligible(&self, principal: &Principal, ballot: &Ballot) -> CoreResult<bool> {
        if principal.is_admin() || ballot.is_listed_voter(&principal.id) {
            return Ok(true);
        }
        let Some(meeting_id) = ballot.meeting_id.as_deref() else {
            return Ok(false);
        };
        let meeting = self.retry.run("meeting.get", |_| self.meetings.get_meeting(meeting_id)).await?;
        Ok(meeting.is_some_and(|m| can_cast_vote_in_meeting(principal, &m)))
    }

    /// Eligibility as an access decision
    pub async fn evaluate_vote(&self, principal: &Principal, ballot_id: &str) -> CoreResult<Decision> {
        let ballot = self.load_ballot(ballot_id).await?;
        Ok(if self.is_eligible(principal, &ballot).await? {
            Decision::Allow
        } else {
            Decision::Deny(DenialReason::NotEligible)
        })
    }

    async fn reject(&self, principal: &Principal, ballot_id: &str, err: CoreError) -> CoreError {
        warn!(ballot_id, voter = %principal.id, reason = err.code(), "Vote rejected");
        counter!("boardroom_votes_rejected_total", 1, "reason" => err.code());
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::VoteRejected, principal.id.as_str(), "ballot", AuditOutcome::Rejected)
                    .with_resource_id(ballot_id)
                    .with_reason(err.code()),
            )
            .await;
        err
    }

    /// Cast a vote. The duplicate check, insert and tally update happen in one
    /// store commit; transient commit failures are retried with the same
    /// submission id so a commit that already landed reads back as success.
    pub async fn cast_vote(&self, principal: &Principal, ballot_id: &str, selected_option_ids: Vec<String>, comments: Option<String>) -> CoreResult<CastOutcome> {
        let ballot = self.load_ballot(ballot_id).await?;
        let now = Utc::now();

        if ballot.status_at(now) != BallotStatus::Active {
            return Err(self.reject(principal, ballot_id, CoreError::BallotNotActive).await);
        }
        if !self.is_eligible(principal, &ballot).await? {
            return Err(self.reject(principal, ballot_id, CoreError::NotEligible).await);
        }
        if let Err(e) = ballot.validate_selection(&selected_option_ids) {
            return Err(self.reject(principal, ballot_id, e).await);
        }
        let comments = match normalize_comments(comments) {
            Ok(comments) => comments,
            Err(e) => return Err(self.reject(principal, ballot_id, e).await),
        };

        let submission_id = uuid::Uuid::new_v4().to_string();
        let receipt = self.signer.sign(&ballot.id, &principal.id, &selected_option_ids, &submission_id);
        let vote = Vote {
            ballot_id: ballot.id.clone(),
            voter_id: principal.id.clone(),
            selected_option_ids,
            submitted_at: now,
            submission_id,
            receipt: Some(receipt.clone()),
            comments,
        };

        let commit = self.retry.run("vote.commit", |_| self.ballots.commit_vote(&vote)).await;
        let replayed = match commit {
            Ok(VoteCommit::Recorded(_)) => false,
            Ok(VoteCommit::Existing(existing)) if existing.submission_id == vote.submission_id => true,
            Ok(VoteCommit::Existing(_)) => return Err(self.reject(principal, ballot_id, CoreError::DuplicateVote).await),
            Ok(VoteCommit::InvalidSelection(detail)) => return Err(self.reject(principal, ballot_id, CoreError::Validation(detail)).await),
            Err(e) => {
                error!(ballot_id, voter = %principal.id, error = %e, "Vote commit failed");
                return Err(e.into());
            }
        };

        counter!("boardroom_votes_cast_total", 1);
        info!(ballot_id, voter = %principal.id, anonymous = ballot.is_anonymous, replayed, "Vote recorded");

        let mut record = AuditRecord::new(AuditAction::VoteCast, principal.id.as_str(), "ballot", AuditOutcome::Success)
            .with_resource_id(ballot.id.as_str())
            .with_detail("submissionId", vote.submission_id.as_str());
        record = if ballot.is_anonymous {
            record.with_detail("receipt", receipt.as_str())
        } else {
            let record = record.with_detail("selectedOptionIds", vote.selected_option_ids.join(","));
            match &vote.comments {
                Some(comments) => record.with_detail("comments", comments.as_str()),
                None => record,
            }
        };
        self.access.audit().record(record).await;

        Ok(CastOutcome {
            ballot_id: ballot.id,
            submitted_at: vote.submitted_at,
            receipt: ballot.is_anonymous.then_some(receipt),
            replayed,
        })
    }

    /// Replace the option list. Fails once any vote exists.
    pub async fn replace_options(&self, principal: &Principal, ballot_id: &str, inputs: Vec<BallotOptionInput>) -> CoreResult<Ballot> {
        self.access.require(principal, Capability::VotesCreate, "ballot", Some(ballot_id)).await?;
        let before = self.load_ballot(ballot_id).await?;
        let decision = if principal.is_admin() || before.created_by == principal.id {
            Decision::Allow
        } else {
            Decision::Deny(DenialReason::NotOwner)
        };
        self.access.enforce(principal, decision, "options_update", "ballot", Some(ballot_id)).await?;

        let options = normalize_options(inputs)?;
        let now = Utc::now();
        let replaced = self.retry.run("ballot.replace_options", |_| self.ballots.replace_options(ballot_id, options.clone(), now)).await?;

        match replaced {
            OptionsReplace::Replaced(after) => {
                info!(ballot_id, updated_by = %principal.id, "Ballot options replaced");
                self.access
                    .audit()
                    .record(
                        AuditRecord::new(AuditAction::BallotOptionsUpdate, principal.id.as_str(), "ballot", AuditOutcome::Success)
                            .with_resource_id(ballot_id)
                            .with_change(Some(&before.options), Some(&after.options)),
                    )
                    .await;
                Ok(after)
            }
            OptionsReplace::Frozen => {
                self.access
                    .audit()
                    .record(
                        AuditRecord::new(AuditAction::BallotOptionsUpdate, principal.id.as_str(), "ballot", AuditOutcome::Rejected)
                            .with_resource_id(ballot_id)
                            .with_reason(CoreError::OptionsFrozen.code()),
                    )
                    .await;
                Err(CoreError::OptionsFrozen)
            }
        }
    }

    /// Admin-only soft delete; recorded votes survive
    pub async fn delete_ballot(&self, principal: &Principal, ballot_id: &str) -> CoreResult<()> {
        self.access.require_admin(principal, "ballot.delete", "ballot", Some(ballot_id)).await?;
        let before = self.load_ballot(ballot_id).await?;
        let deleted = self.retry.run("ballot.delete", |_| self.ballots.delete_ballot(ballot_id, Utc::now())).await?;
        if !deleted {
            return Err(CoreError::not_found(format!("ballot {}", ballot_id)));
        }
        info!(ballot_id, deleted_by = %principal.id, "Ballot deleted");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::BallotDelete, principal.id.as_str(), "ballot", AuditOutcome::Success)
                    .with_resource_id(ballot_id)
                    .with_change::<Ballot, Ballot>(Some(&before), None),
            )
            .await;
        Ok(())
    }

    async fn view(&self, principal: &Principal, ballot: Ballot, now: DateTime<Utc>) -> CoreResult<BallotView> {
        let tally = self.retry.run("tally.get", |_| self.ballots.get_tally(&ballot.id)).await?;
        let has_voted = self.retry.run("vote.find", |_| self.ballots.find_vote(&ballot.id, &principal.id)).await?.is_some();
        Ok(BallotView {
            status: ballot.status_at(now),
            total_votes: tally.map(|t| t.total_votes).unwrap_or(0),
            has_voted,
            ballot,
        })
    }

    pub async fn get_ballot(&self, principal: &Principal, ballot_id: &str) -> CoreResult<BallotView> {
        let ballot = self.load_ballot(ballot_id).await?;
        self.view(principal, ballot, Utc::now()).await
    }

    /// Newest first
    pub async fn list_ballots(&self, principal: &Principal) -> CoreResult<Vec<BallotView>> {
        let now = Utc::now();
        let ballots = self.retry.run("ballot.list", |_| self.ballots.list_ballots()).await?;
        let mut views = Vec::with_capacity(ballots.len());
        for ballot in ballots {
            views.push(self.view(principal, ballot, now).await?);
        }
        Ok(views)
    }

    /// Current tally, checked against a recount of the vote records
    pub async fn results(&self, ballot_id: &str) -> CoreResult<Tally> {
        let tally = self.verify_tally(ballot_id).await?;
        Ok(tally)
    }

    /// Recount from votes. A mismatch is reported, never repaired.
    pub async fn verify_tally(&self, ballot_id: &str) -> CoreResult<Tally> {
        let ballot = self.load_ballot(ballot_id).await?;
        let stored = self
            .retry
            .run("tally.get", |_| self.ballots.get_tally(ballot_id))
            .await?
            .ok_or_else(|| CoreError::not_found(format!("tally for ballot {}", ballot_id)))?;
        let votes = self.retry.run("vote.list", |_| self.ballots.list_votes(ballot_id)).await?;

        let divergence = match Tally::recompute(&ballot, &votes) {
            Ok(recount) => stored.divergence(&recount),
            Err(e) => Some(format!("vote records do not fit the ballot: {}", e)),
        };
        if let Some(detail) = divergence {
            error!(ballot_id, detail = %detail, "Tally invariant violated");
            self.access
                .audit()
                .record(
                    AuditRecord::new(AuditAction::InvariantViolation, "system", "ballot", AuditOutcome::Failure)
                        .with_resource_id(ballot_id)
                        .with_reason("tally_divergence")
                        .with_detail("detail", detail.as_str()),
                )
                .await;
            return Err(CoreError::InvariantViolation(format!("tally for ballot {} diverges from its votes: {}", ballot_id, detail)));
        }

        Ok(if ballot.is_anonymous { stored.redacted() } else { stored })
    }

    /// Whether a vote carrying `receipt` is recorded on the ballot
    pub async fn verify_receipt(&self, ballot_id: &str, receipt: &str) -> CoreResult<bool> {
        self.load_ballot(ballot_id).await?;
        let votes = self.retry.run("vote.list", |_| self.ballots.list_votes(ballot_id)).await?;
        Ok(votes.iter().any(|v| v.receipt.as_deref() == Some(receipt) && self.signer.verify(v, receipt)))
    }
}

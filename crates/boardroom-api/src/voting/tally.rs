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

//! Votes and running tallies

use super::ballot::{Ballot, BallotOption};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use utoipa::ToSchema;

/// A recorded vote. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub ballot_id: String,
    pub voter_id: String,
    pub selected_option_ids: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    /// Idempotency key for retried commits
    pub submission_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    /// Free-text remarks left with the vote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option_id: String,
    pub count: u64,
    /// Always empty on anonymous ballots
    pub voter_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub ballot_id: String,
    pub options: Vec<OptionTally>,
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TallyError {
    #[error("vote is for ballot {found}, tally is for {expected}")]
    WrongBallot { expected: String, found: String },

    #[error("unknown option {0}")]
    UnknownOption(String),

    #[error("empty selection")]
    EmptySelection,
}

impl Tally {
    pub fn empty(ballot: &Ballot) -> Self {
        Self::for_options(&ballot.id, &ballot.options)
    }

    pub fn for_options(ballot_id: &str, options: &[BallotOption]) -> Self {
        Self {
            ballot_id: ballot_id.to_string(),
            options: options
                .iter()
                .map(|o| OptionTally {
                    option_id: o.id.clone(),
                    count: 0,
                    voter_ids: Vec::new(),
                })
                .collect(),
            total_votes: 0,
        }
    }

    /// Count one vote. Checks everything before touching any counter.
    pub fn apply(&mut self, vote: &Vote, anonymous: bool) -> Result<(), TallyError> {
        if vote.ballot_id != self.ballot_id {
            return Err(TallyError::WrongBallot {
                expected: self.ballot_id.clone(),
                found: vote.ballot_id.clone(),
            });
        }
        if vote.selected_option_ids.is_empty() {
            return Err(TallyError::EmptySelection);
        }
        let mut indices = Vec::with_capacity(vote.selected_option_ids.len());
        for option_id in &vote.selected_option_ids {
            let index = self.options.iter().position(|o| &o.option_id == option_id).ok_or_else(|| TallyError::UnknownOption(option_id.clone()))?;
            indices.push(index);
        }

        for index in indices {
            let entry = &mut self.options[index];
            entry.count += 1;
            if !anonymous {
                entry.voter_ids.push(vote.voter_id.clone());
            }
        }
        self.total_votes += 1;
        Ok(())
    }

    /// Rebuild a tally from the full vote set
    pub fn recompute(ballot: &Ballot, votes: &[Vote]) -> Result<Self, TallyError> {
        let mut tally = Self::empty(ballot);
        for vote in votes {
            tally.apply(vote, ballot.is_anonymous)?;
        }
        Ok(tally)
    }

    pub fn count_for(&self, option_id: &str) -> Option<u64> {
        self.options.iter().find(|o| o.option_id == option_id).map(|o| o.count)
    }

    /// First difference between two tallies, ignoring voter id order
    pub fn divergence(&self, other: &Tally) -> Option<String> {
        if self.total_votes != other.total_votes {
            return Some(format!("totalVotes {} != {}", self.total_votes, other.total_votes));
        }
        if self.options.len() != other.options.len() {
            return Some(format!("option count {} != {}", self.options.len(), other.options.len()));
        }
        for (a, b) in self.options.iter().zip(&other.options) {
            if a.option_id != b.option_id || a.count != b.count {
                return Some(format!("option {} count {} != option {} count {}", a.option_id, a.count, b.option_id, b.count));
            }
            let left: HashSet<&String> = a.voter_ids.iter().collect();
            let right: HashSet<&String> = b.voter_ids.iter().collect();
            if left != right {
                return Some(format!("option {} voter ids differ", a.option_id));
            }
        }
        None
    }

    /// Strip voter identities for anonymous views
    pub fn redacted(mut self) -> Self {
        for option in &mut self.options {
            option.voter_ids.clear();
        }
        self
    }
}

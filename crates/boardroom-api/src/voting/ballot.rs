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

//! Ballot definition and lifecycle

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BallotOption {
    pub id: String,
    pub label: String,
}

/// Option as submitted by a client: a bare label, or an object with an id and/or label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum BallotOptionInput {
    Label(String),
    Full { id: Option<String>, label: Option<String> },
}

impl BallotOptionInput {
    fn into_option(self) -> Result<BallotOption, CoreError> {
        let (id, label) = match self {
            BallotOptionInput::Label(label) => (None, Some(label)),
            BallotOptionInput::Full { id, label } => (id, label),
        };
        let id = id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let label = label.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (id, label) {
            (Some(id), Some(label)) => Ok(BallotOption { id, label }),
            (Some(id), None) => Ok(BallotOption { label: id.clone(), id }),
            (None, Some(label)) => Ok(BallotOption { id: slug(&label), label }),
            (None, None) => Err(CoreError::validation("ballot option needs an id or a label")),
        }
    }
}

fn slug(label: &str) -> String {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Normalize submitted options, enforcing at least two with unique ids
pub fn normalize_options(inputs: Vec<BallotOptionInput>) -> Result<Vec<BallotOption>, CoreError> {
    let options = inputs.into_iter().map(BallotOptionInput::into_option).collect::<Result<Vec<_>, _>>()?;
    if options.len() < 2 {
        return Err(CoreError::validation("a ballot needs at least two options"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = options.iter().find(|o| o.id.is_empty() || !seen.insert(o.id.as_str())) {
        return Err(CoreError::validation(format!("duplicate or empty option id '{}'", dup.id)));
    }
    Ok(options)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BallotStatus {
    Scheduled,
    Active,
    Completed,
}

/// Request body for ballot creation
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewBallot {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub options: Vec<BallotOptionInput>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub allow_multiple: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub eligible_voters: Vec<String>,
    #[serde(default)]
    pub meeting_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<BallotOption>,
    pub is_anonymous: bool,
    pub allow_multiple: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub eligible_voters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ballot {
    /// Validate a creation request and build the ballot
    pub fn from_request(request: NewBallot, id: String, created_by: &str, now: DateTime<Utc>) -> Result<Ballot, CoreError> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if request.start_date > request.end_date {
            return Err(CoreError::validation("startDate must not be after endDate"));
        }
        let options = normalize_options(request.options)?;

        let mut eligible_voters: Vec<String> = Vec::with_capacity(request.eligible_voters.len());
        for voter in request.eligible_voters {
            if !eligible_voters.contains(&voter) {
                eligible_voters.push(voter);
            }
        }

        Ok(Ballot {
            id,
            title,
            description: request.description.filter(|d| !d.trim().is_empty()),
            options,
            is_anonymous: request.is_anonymous,
            allow_multiple: request.allow_multiple,
            start_date: request.start_date,
            end_date: request.end_date,
            eligible_voters,
            meeting_id: request.meeting_id.filter(|m| !m.is_empty()),
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Status at `now`; the window is inclusive at both ends
    pub fn status_at(&self, now: DateTime<Utc>) -> BallotStatus {
        if now < self.start_date {
            BallotStatus::Scheduled
        } else if now <= self.end_date {
            BallotStatus::Active
        } else {
            BallotStatus::Completed
        }
    }

    pub fn status(&self) -> BallotStatus {
        self.status_at(Utc::now())
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    pub fn is_listed_voter(&self, principal_id: &str) -> bool {
        self.eligible_voters.iter().any(|v| v == principal_id)
    }

    /// Non-empty, duplicate-free subset of the options; exactly one unless multiple choice
    pub fn validate_selection(&self, selected: &[String]) -> Result<(), CoreError> {
        if selected.is_empty() {
            return Err(CoreError::validation("select at least one option"));
        }
        if !self.allow_multiple && selected.len() != 1 {
            return Err(CoreError::validation("this ballot accepts exactly one option"));
        }
        let mut seen = HashSet::new();
        for option_id in selected {
            if !seen.insert(option_id.as_str()) {
                return Err(CoreError::validation(format!("option '{}' selected more than once", option_id)));
            }
            if !self.has_option(option_id) {
                return Err(CoreError::validation(format!("unknown option '{}'", option_id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(options: serde_json::Value) -> NewBallot {
        let now = Utc::now();
        serde_json::from_value(serde_json::json!({
            "title": "Approve budget",
            "options": options,
            "startDate": now - Duration::hours(1),
            "endDate": now + Duration::hours(1),
            "eligibleVoters": ["v1", "v2", "v1"],
        }))
        .unwrap()
    }

    #[test]
    fn test_options_accept_ids_labels_or_strings() {
        let ballot = Ballot::from_request(request(serde_json::json!([{"id": "yes"}, {"id": "no", "label": "No"}, "Abstain from vote"])), "b1".into(), "sec", Utc::now()).unwrap();
        let ids: Vec<_> = ballot.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["yes", "no", "abstain-from-vote"]);
        assert_eq!(ballot.options[0].label, "yes");
        assert_eq!(ballot.eligible_voters, vec!["v1".to_string(), "v2".to_string()]);
    }

    #[test]
    fn test_rejects_fewer_than_two_options() {
        let err = Ballot::from_request(request(serde_json::json!(["Only"])), "b1".into(), "sec", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_rejects_duplicate_option_ids() {
        let err = Ballot::from_request(request(serde_json::json!([{"id": "a"}, {"id": "a", "label": "A again"}])), "b1".into(), "sec", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let mut req = request(serde_json::json!(["A", "B"]));
        std::mem::swap(&mut req.start_date, &mut req.end_date);
        assert!(Ballot::from_request(req, "b1".into(), "sec", Utc::now()).is_err());
    }

    #[test]
    fn test_status_window() {
        let ballot = Ballot::from_request(request(serde_json::json!(["A", "B"])), "b1".into(), "sec", Utc::now()).unwrap();
        assert_eq!(ballot.status_at(ballot.start_date - Duration::seconds(1)), BallotStatus::Scheduled);
        assert_eq!(ballot.status_at(ballot.start_date), BallotStatus::Active);
        assert_eq!(ballot.status_at(ballot.end_date), BallotStatus::Active);
        assert_eq!(ballot.status_at(ballot.end_date + Duration::seconds(1)), BallotStatus::Completed);
    }

    #[test]
    fn test_selection_rules() {
        let mut ballot = Ballot::from_request(request(serde_json::json!(["A", "B", "C"])), "b1".into(), "sec", Utc::now()).unwrap();
        let sel = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(ballot.validate_selection(&sel(&["a"])).is_ok());
        assert!(ballot.validate_selection(&sel(&[])).is_err());
        assert!(ballot.validate_selection(&sel(&["a", "b"])).is_err());
        assert!(ballot.validate_selection(&sel(&["z"])).is_err());

        ballot.allow_multiple = true;
        assert!(ballot.validate_selection(&sel(&["a", "b"])).is_ok());
        assert!(ballot.validate_selection(&sel(&["a", "a"])).is_err());
    }
}

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

//! Meeting access policy and attendance lifecycle

use super::{Decision, DenialReason};
use crate::error::CoreError;
use crate::rbac::permissions::Capability;
use crate::rbac::roles::Principal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Postponed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::InProgress => "in-progress",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
            MeetingStatus::Postponed => "postponed",
        }
    }

    pub fn can_transition_to(&self, next: MeetingStatus) -> bool {
        use MeetingStatus::*;
        matches!(
            (*self, next),
            (Scheduled, InProgress) | (InProgress, Completed) | (Scheduled, Cancelled) | (Scheduled, Postponed) | (Postponed, Scheduled) | (Postponed, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeStatus {
    Invited,
    Accepted,
    Declined,
    Tentative,
    Attended,
    Absent,
}

impl AttendeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendeeStatus::Invited => "invited",
            AttendeeStatus::Accepted => "accepted",
            AttendeeStatus::Declined => "declined",
            AttendeeStatus::Tentative => "tentative",
            AttendeeStatus::Attended => "attended",
            AttendeeStatus::Absent => "absent",
        }
    }

    /// Statuses an invitee may choose for themselves
    pub fn is_response(&self) -> bool {
        matches!(self, AttendeeStatus::Accepted | AttendeeStatus::Declined | AttendeeStatus::Tentative)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub principal_id: String,
    pub status: AttendeeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

impl Attendee {
    pub fn invited(principal_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            status: AttendeeStatus::Invited,
            joined_at: None,
            left_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub organizer: String,
    pub scheduled_for: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub attendees: Vec<Attendee>,
    pub status: MeetingStatus,
    pub required_quorum: u32,
    /// Bumped on every stored change
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Strict majority of the invited attendees
    pub fn default_quorum(invited: usize) -> u32 {
        if invited == 0 { 0 } else { (invited / 2 + 1) as u32 }
    }

    pub fn is_attendee(&self, principal_id: &str) -> bool {
        self.attendees.iter().any(|a| a.principal_id == principal_id)
    }

    pub fn attendee(&self, principal_id: &str) -> Option<&Attendee> {
        self.attendees.iter().find(|a| a.principal_id == principal_id)
    }

    fn attendee_mut(&mut self, principal_id: &str) -> Option<&mut Attendee> {
        self.attendees.iter_mut().find(|a| a.principal_id == principal_id)
    }

    pub fn attended_count(&self) -> usize {
        self.attendees.iter().filter(|a| a.status == AttendeeStatus::Attended).count()
    }

    pub fn quorum_met(&self) -> bool {
        self.attended_count() as u32 >= self.required_quorum
    }

    fn invalid(&self, to: &str) -> CoreError {
        CoreError::InvalidTransition {
            entity: "meeting",
            from: self.status.as_str().to_string(),
            to: to.to_string(),
        }
    }

    /// Change lifecycle status. Completing marks everyone who never joined as absent.
    pub fn transition(&mut self, next: MeetingStatus, now: DateTime<Utc>) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid(next.as_str()));
        }
        if next == MeetingStatus::Completed {
            for attendee in self.attendees.iter_mut().filter(|a| a.status != AttendeeStatus::Attended) {
                attendee.status = AttendeeStatus::Absent;
            }
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Record an invitee's RSVP
    pub fn respond(&mut self, principal_id: &str, response: AttendeeStatus, now: DateTime<Utc>) -> Result<(), CoreError> {
        if !response.is_response() {
            return Err(CoreError::validation("response must be accepted, declined or tentative"));
        }
        if !matches!(self.status, MeetingStatus::Scheduled | MeetingStatus::Postponed) {
            return Err(self.invalid("respond"));
        }
        let attendee = self.attendee_mut(principal_id).ok_or_else(|| CoreError::validation("not invited to this meeting"))?;
        attendee.status = response;
        self.updated_at = now;
        Ok(())
    }

    /// Mark the principal as present. Admins and the organizer may join without an invitation.
    pub fn join(&mut self, principal_id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != MeetingStatus::InProgress {
            return Err(self.invalid("join"));
        }
        match self.attendee_mut(principal_id) {
            Some(attendee) => {
                attendee.status = AttendeeStatus::Attended;
                attendee.joined_at.get_or_insert(now);
                attendee.left_at = None;
            }
            None => self.attendees.push(Attendee {
                principal_id: principal_id.to_string(),
                status: AttendeeStatus::Attended,
                joined_at: Some(now),
                left_at: None,
            }),
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn leave(&mut self, principal_id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != MeetingStatus::InProgress {
            return Err(self.invalid("leave"));
        }
        let attendee = self
            .attendee_mut(principal_id)
            .filter(|a| a.joined_at.is_some())
            .ok_or_else(|| CoreError::validation("has not joined this meeting"))?;
        attendee.left_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

/// Join: admin, organizer, or attendee
pub fn evaluate_join(principal: &Principal, meeting: &Meeting) -> Decision {
    if principal.is_admin() || meeting.organizer == principal.id || meeting.is_attendee(&principal.id) {
        Decision::Allow
    } else {
        Decision::Deny(DenialReason::NotAttendee)
    }
}

pub fn can_join_meeting(principal: &Principal, meeting: &Meeting) -> bool {
    evaluate_join(principal, meeting).is_allowed()
}

/// Vote in meeting: `votes.cast` and (attendee or admin)
pub fn evaluate_vote_in_meeting(principal: &Principal, meeting: &Meeting) -> Decision {
    if !principal.has(Capability::VotesCast) && !principal.is_admin() {
        return Decision::Deny(DenialReason::MissingCapability);
    }
    if principal.is_admin() || meeting.is_attendee(&principal.id) {
        Decision::Allow
    } else {
        Decision::Deny(DenialReason::NotAttendee)
    }
}

pub fn can_cast_vote_in_meeting(principal: &Principal, meeting: &Meeting) -> bool {
    evaluate_vote_in_meeting(principal, meeting).is_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::roles::{Role, RoleTable};

    fn principal(id: &str, role: Role) -> Principal {
        Principal::new(id, role, RoleTable::builtin().capabilities(role).clone())
    }

    fn meeting(attendees: &[&str]) -> Meeting {
        let now = Utc::now();
        Meeting {
            id: "m1".to_string(),
            title: "Q3 board meeting".to_string(),
            description: None,
            organizer: "sec".to_string(),
            scheduled_for: now,
            location: None,
            attendees: attendees.iter().map(|id| Attendee::invited(*id)).collect(),
            status: MeetingStatus::Scheduled,
            required_quorum: Meeting::default_quorum(attendees.len()),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_join_eligibility() {
        let m = meeting(&["bm1"]);
        assert!(can_join_meeting(&principal("bm1", Role::BoardMember), &m));
        assert!(can_join_meeting(&principal("sec", Role::Secretary), &m));
        assert!(can_join_meeting(&principal("root", Role::Admin), &m));
        assert_eq!(evaluate_join(&principal("bm2", Role::BoardMember), &m), Decision::Deny(DenialReason::NotAttendee));
    }

    #[test]
    fn test_vote_in_meeting_requires_capability_and_attendance() {
        let m = meeting(&["bm1", "viewer1"]);
        assert!(can_cast_vote_in_meeting(&principal("bm1", Role::BoardMember), &m));
        assert_eq!(evaluate_vote_in_meeting(&principal("viewer1", Role::Viewer), &m), Decision::Deny(DenialReason::MissingCapability));
        assert_eq!(evaluate_vote_in_meeting(&principal("bm2", Role::BoardMember), &m), Decision::Deny(DenialReason::NotAttendee));
        // the organizer is not an attendee
        assert!(!can_cast_vote_in_meeting(&principal("sec", Role::Secretary), &m));
        assert!(can_cast_vote_in_meeting(&principal("root", Role::Admin), &m));
    }

    #[test]
    fn test_default_quorum_is_strict_majority() {
        assert_eq!(Meeting::default_quorum(0), 0);
        assert_eq!(Meeting::default_quorum(1), 1);
        assert_eq!(Meeting::default_quorum(4), 3);
        assert_eq!(Meeting::default_quorum(5), 3);
    }

    #[test]
    fn test_attendance_lifecycle() {
        let now = Utc::now();
        let mut m = meeting(&["a", "b", "c"]);

        m.respond("a", AttendeeStatus::Accepted, now).unwrap();
        assert!(m.respond("a", AttendeeStatus::Attended, now).is_err());
        assert!(m.respond("zz", AttendeeStatus::Accepted, now).is_err());
        assert!(m.join("a", now).is_err());

        m.transition(MeetingStatus::InProgress, now).unwrap();
        assert!(m.respond("b", AttendeeStatus::Declined, now).is_err());
        m.join("a", now).unwrap();
        m.join("b", now).unwrap();
        assert!(m.leave("c", now).is_err());
        m.leave("b", now).unwrap();
        assert!(m.quorum_met());

        m.transition(MeetingStatus::Completed, now).unwrap();
        assert_eq!(m.attendee("c").map(|a| a.status), Some(AttendeeStatus::Absent));
        assert_eq!(m.attendee("b").map(|a| a.status), Some(AttendeeStatus::Attended));
        assert!(m.attendee("b").and_then(|a| a.left_at).is_some());
    }

    #[test]
    fn test_status_transitions() {
        let now = Utc::now();
        let mut m = meeting(&[]);
        assert!(m.transition(MeetingStatus::Completed, now).is_err());
        m.transition(MeetingStatus::Postponed, now).unwrap();
        m.transition(MeetingStatus::Scheduled, now).unwrap();
        m.transition(MeetingStatus::Cancelled, now).unwrap();
        assert!(matches!(m.transition(MeetingStatus::Scheduled, now), Err(CoreError::InvalidTransition { .. })));
    }
}

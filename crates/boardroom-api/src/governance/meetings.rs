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

//! Meeting scheduling and attendance

use crate::error::{CoreError, CoreResult};
use crate::models::NewMeeting;
use crate::policy::meetings::{Attendee, AttendeeStatus, Meeting, MeetingStatus, evaluate_join, evaluate_vote_in_meeting};
use crate::policy::{Decision, DenialReason};
use crate::rbac::audit::{AuditAction, AuditOutcome, AuditRecord};
use crate::rbac::permissions::Capability;
use crate::rbac::roles::Principal;
use crate::rbac::system::AccessControl;
use crate::retry::RetryPolicy;
use crate::store::{MeetingStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts at a read-modify-write before giving up on a contended meeting
const UPDATE_ATTEMPTS: usize = 3;

pub struct MeetingService {
    store: Arc<dyn MeetingStore>,
    access: Arc<AccessControl>,
    retry: RetryPolicy,
}

impl MeetingService {
    pub fn new(store: Arc<dyn MeetingStore>, access: Arc<AccessControl>, retry: RetryPolicy) -> Self {
        Self { store, access, retry }
    }

    async fn load(&self, id: &str) -> CoreResult<Meeting> {
        self.retry
            .run("meeting.get", |_| self.store.get_meeting(id))
            .await?
            .ok_or_else(|| CoreError::not_found(format!("meeting {}", id)))
    }

    /// Optimistic read-modify-write, reloading on revision conflicts
    async fn modify<F>(&self, id: &str, mut change: F) -> CoreResult<Meeting>
    where
        F: FnMut(&mut Meeting) -> CoreResult<()>,
    {
        let mut attempt = 1;
        loop {
            let mut meeting = self.load(id).await?;
            change(&mut meeting)?;
            meeting.revision += 1;
            match self.retry.run("meeting.put", |_| self.store.put_meeting(meeting.clone())).await {
                Ok(()) => return Ok(meeting),
                Err(StoreError::Conflict(detail)) if attempt < UPDATE_ATTEMPTS => {
                    debug!(meeting_id = %id, attempt, detail = %detail, "Meeting changed underneath update, reloading");
                    attempt += 1;
                }
                Err(StoreError::Conflict(detail)) => {
                    warn!(meeting_id = %id, attempts = attempt, detail = %detail, "Meeting update kept losing to concurrent writers");
                    return Err(CoreError::stale_write("meeting", meeting.revision - 1, meeting.revision));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Policy decision for `subject` without enforcing or auditing it
    pub async fn evaluate(&self, subject: &Principal, id: &str, action: &str) -> CoreResult<Decision> {
        let meeting = self.load(id).await?;
        match action {
            "join" => Ok(evaluate_join(subject, &meeting)),
            "vote" => Ok(evaluate_vote_in_meeting(subject, &meeting)),
            other => Err(CoreError::validation(format!("unsupported meeting action: {}", other))),
        }
    }

    pub async fn create(&self, principal: &Principal, request: NewMeeting) -> CoreResult<Meeting> {
        self.access.require(principal, Capability::MeetingsCreate, "meeting", None).await?;

        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        let mut attendees: Vec<Attendee> = Vec::new();
        for id in request.attendees.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            if !attendees.iter().any(|a| a.principal_id == id) {
                attendees.push(Attendee::invited(id));
            }
        }
        let required_quorum = request.required_quorum.unwrap_or_else(|| Meeting::default_quorum(attendees.len()));
        if required_quorum as usize > attendees.len() {
            return Err(CoreError::validation(format!("quorum of {} exceeds the {} invited attendees", required_quorum, attendees.len())));
        }

        let now = Utc::now();
        let meeting = Meeting {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            description: request.description.filter(|d| !d.trim().is_empty()),
            organizer: principal.id.clone(),
            scheduled_for: request.scheduled_for,
            location: request.location.filter(|l| !l.trim().is_empty()),
            attendees,
            status: MeetingStatus::Scheduled,
            required_quorum,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        self.retry.run("meeting.insert", |_| self.store.insert_meeting(meeting.clone())).await?;

        info!(meeting_id = %meeting.id, organizer = %principal.id, attendees = meeting.attendees.len(), "Meeting scheduled");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::MeetingCreate, principal.id.as_str(), "meeting", AuditOutcome::Success)
                    .with_resource_id(meeting.id.as_str())
                    .with_change::<Meeting, Meeting>(None, Some(&meeting)),
            )
            .await;
        Ok(meeting)
    }

    pub async fn get(&self, principal: &Principal, id: &str) -> CoreResult<Meeting> {
        self.access.require(principal, Capability::MeetingsRead, "meeting", Some(id)).await?;
        self.load(id).await
    }

    /// Ordered by scheduled time
    pub async fn list(&self, principal: &Principal) -> CoreResult<Vec<Meeting>> {
        self.access.require(principal, Capability::MeetingsRead, "meeting", None).await?;
        Ok(self.retry.run("meeting.list", |_| self.store.list_meetings()).await?)
    }

    pub async fn respond(&self, principal: &Principal, id: &str, response: AttendeeStatus) -> CoreResult<Meeting> {
        let current = self.load(id).await?;
        let decision = if current.is_attendee(&principal.id) {
            Decision::Allow
        } else {
            Decision::Deny(DenialReason::NotAttendee)
        };
        self.access.enforce(principal, decision, "respond", "meeting", Some(id)).await?;

        let meeting = self.modify(id, |m| m.respond(&principal.id, response, Utc::now())).await?;
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::MeetingRespond, principal.id.as_str(), "meeting", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_detail("response", response.as_str()),
            )
            .await;
        Ok(meeting)
    }

    pub async fn join(&self, principal: &Principal, id: &str) -> CoreResult<Meeting> {
        let current = self.load(id).await?;
        self.access.authorize_meeting_join(principal, &current).await?;

        let meeting = self.modify(id, |m| m.join(&principal.id, Utc::now())).await?;
        info!(meeting_id = %id, principal = %principal.id, quorum_met = meeting.quorum_met(), "Joined meeting");
        self.access
            .audit()
            .record(AuditRecord::new(AuditAction::MeetingJoin, principal.id.as_str(), "meeting", AuditOutcome::Success).with_resource_id(id))
            .await;
        Ok(meeting)
    }

    pub async fn leave(&self, principal: &Principal, id: &str) -> CoreResult<Meeting> {
        let current = self.load(id).await?;
        self.access.authorize_meeting_join(principal, &current).await?;

        let meeting = self.modify(id, |m| m.leave(&principal.id, Utc::now())).await?;
        self.access
            .audit()
            .record(AuditRecord::new(AuditAction::MeetingLeave, principal.id.as_str(), "meeting", AuditOutcome::Success).with_resource_id(id))
            .await;
        Ok(meeting)
    }

    /// Lifecycle change by the organizer or an admin holding `meetings.edit`
    pub async fn set_status(&self, principal: &Principal, id: &str, status: MeetingStatus) -> CoreResult<Meeting> {
        self.access.require(principal, Capability::MeetingsEdit, "meeting", Some(id)).await?;
        let before = self.load(id).await?;
        let decision = if principal.is_admin() || before.organizer == principal.id {
            Decision::Allow
        } else {
            Decision::Deny(DenialReason::NotOwner)
        };
        self.access.enforce(principal, decision, "status", "meeting", Some(id)).await?;

        let after = self.modify(id, |m| m.transition(status, Utc::now())).await?;
        info!(meeting_id = %id, from = before.status.as_str(), to = after.status.as_str(), "Meeting status changed");
        self.access
            .audit()
            .record(
                AuditRecord::new(AuditAction::MeetingStatus, principal.id.as_str(), "meeting", AuditOutcome::Success)
                    .with_resource_id(id)
                    .with_detail("from", before.status.as_str())
                    .with_detail("to", after.status.as_str()),
            )
            .await;
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::audit::{AuditRecorder, DenialAlert};
    use crate::rbac::roles::{PermissionModel, Role, RoleTable};
    use crate::store::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service_over(store: Arc<MemoryStore>, meetings: Arc<dyn MeetingStore>) -> (MeetingService, Arc<AccessControl>) {
        let audit = Arc::new(AuditRecorder::new(store, RetryPolicy::immediate(1), DenialAlert::default()));
        let access = Arc::new(AccessControl::new(PermissionModel::new(Arc::new(RoleTable::builtin())), audit));
        (MeetingService::new(meetings, access.clone(), RetryPolicy::immediate(1)), access)
    }

    fn service() -> (MeetingService, Arc<AccessControl>) {
        let store = Arc::new(MemoryStore::new());
        service_over(store.clone(), store)
    }

    /// Every write races a concurrent writer that bumps the revision first
    struct ContendedMeetings {
        inner: Arc<MemoryStore>,
        puts: AtomicU32,
    }

    #[async_trait]
    impl MeetingStore for ContendedMeetings {
        async fn insert_meeting(&self, meeting: Meeting) -> StoreResult<()> {
            self.inner.insert_meeting(meeting).await
        }
        async fn get_meeting(&self, id: &str) -> StoreResult<Option<Meeting>> {
            self.inner.get_meeting(id).await
        }
        async fn put_meeting(&self, meeting: Meeting) -> StoreResult<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            let mut rival = meeting.clone();
            rival.location = Some("Room 9".to_string());
            self.inner.put_meeting(rival).await?;
            self.inner.put_meeting(meeting).await
        }
        async fn list_meetings(&self) -> StoreResult<Vec<Meeting>> {
            self.inner.list_meetings().await
        }
    }

    fn request(attendees: &[&str]) -> NewMeeting {
        NewMeeting {
            title: "Quarterly board meeting".to_string(),
            description: None,
            scheduled_for: Utc::now(),
            location: Some("Room 4".to_string()),
            attendees: attendees.iter().map(|s| s.to_string()).collect(),
            required_quorum: None,
        }
    }

    #[tokio::test]
    async fn test_full_meeting_flow() {
        let (service, access) = service();
        let sec = access.model().principal_for_role("sec", Role::Secretary);
        let a = access.model().principal_for_role("a", Role::BoardMember);
        let b = access.model().principal_for_role("b", Role::BoardMember);
        let outsider = access.model().principal_for_role("x", Role::BoardMember);

        let meeting = service.create(&sec, request(&["a", "b", "c", "a"])).await.unwrap();
        assert_eq!(meeting.attendees.len(), 3);
        assert_eq!(meeting.required_quorum, 2);

        service.respond(&a, &meeting.id, AttendeeStatus::Accepted).await.unwrap();
        assert_eq!(service.respond(&outsider, &meeting.id, AttendeeStatus::Accepted).await, Err(CoreError::Forbidden));

        service.set_status(&sec, &meeting.id, MeetingStatus::InProgress).await.unwrap();
        service.join(&a, &meeting.id).await.unwrap();
        let after_b = service.join(&b, &meeting.id).await.unwrap();
        assert!(after_b.quorum_met());
        assert_eq!(service.join(&outsider, &meeting.id).await, Err(CoreError::Forbidden));
        service.leave(&b, &meeting.id).await.unwrap();

        let done = service.set_status(&sec, &meeting.id, MeetingStatus::Completed).await.unwrap();
        assert_eq!(done.attendee("c").map(|x| x.status), Some(AttendeeStatus::Absent));
        assert_eq!(done.revision, 6);
    }

    #[tokio::test]
    async fn test_only_organizer_or_admin_changes_status() {
        let (service, access) = service();
        let sec = access.model().principal_for_role("sec", Role::Secretary);
        let other_sec = access.model().principal_for_role("sec2", Role::Secretary);
        let admin = access.model().principal_for_role("root", Role::Admin);
        let meeting = service.create(&sec, request(&["a"])).await.unwrap();

        assert_eq!(service.set_status(&other_sec, &meeting.id, MeetingStatus::Cancelled).await, Err(CoreError::Forbidden));
        service.set_status(&admin, &meeting.id, MeetingStatus::Postponed).await.unwrap();
        assert!(matches!(service.set_status(&sec, &meeting.id, MeetingStatus::Completed).await, Err(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_quorum_cannot_exceed_invitees() {
        let (service, access) = service();
        let sec = access.model().principal_for_role("sec", Role::Secretary);
        let mut req = request(&["a"]);
        req.required_quorum = Some(2);
        assert!(matches!(service.create(&sec, req).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_contended_update_gives_up_with_conflict() {
        let store = Arc::new(MemoryStore::new());
        let contended = Arc::new(ContendedMeetings {
            inner: store.clone(),
            puts: AtomicU32::new(0),
        });
        let (service, access) = service_over(store, contended.clone());
        let sec = access.model().principal_for_role("sec", Role::Secretary);
        let meeting = service.create(&sec, request(&["a"])).await.unwrap();

        let err = service.set_status(&sec, &meeting.id, MeetingStatus::Postponed).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { entity: "meeting", .. }));
        assert_eq!(crate::error::ApiError::from(err).status_code(), hyper::StatusCode::CONFLICT);
        assert_eq!(contended.puts.load(Ordering::SeqCst), UPDATE_ATTEMPTS as u32);
    }

    #[tokio::test]
    async fn test_board_member_cannot_schedule() {
        let (service, access) = service();
        let member = access.model().principal_for_role("bm", Role::BoardMember);
        assert_eq!(service.create(&member, request(&[])).await, Err(CoreError::Forbidden));
    }
}

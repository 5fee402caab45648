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

//! End-to-end tests driving the HTTP router with signed bearer tokens

use boardroom_api::config::Config;
use boardroom_api::rbac::roles::RoleTable;
use boardroom_api::router::Router;
use boardroom_api::state::AppState;
use boardroom_api::store::MemoryStore;
use chrono::{Duration, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "BOARDROOM_JWT_SECRET" => Some("integration-secret".to_string()),
            "BOARDROOM_STORE_RETRY_BASE_DELAY_MS" => Some("0".to_string()),
            _ => None,
        });
        let state = AppState::new(config, RoleTable::builtin(), Arc::new(MemoryStore::new()));
        state.principals.bootstrap_admin("root").await.unwrap();
        let app = Self {
            router: Router::new(state).unwrap(),
        };
        for (id, role) in [("sec", "secretary"), ("bm1", "board_member"), ("bm2", "board_member"), ("bm3", "board_member"), ("view", "viewer")] {
            let (status, _) = app.call(Method::POST, "/principals", Some("root"), Some(json!({"id": id, "displayName": id, "role": role}))).await;
            assert_eq!(status, StatusCode::CREATED, "provisioning {}", id);
        }
        app
    }

    fn token(&self, principal: &str) -> String {
        self.router.state().auth.jwt().issue(principal, Duration::hours(1)).unwrap()
    }

    async fn call(&self, method: Method, uri: &str, principal: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(principal) = principal {
            builder = builder.header("authorization", format!("Bearer {}", self.token(principal)));
        }
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let request = builder.body(Full::new(Bytes::from(body))).unwrap();

        let response = self.router.handle(request).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn create_ballot(&self, creator: &str, body: Value) -> String {
        let (status, created) = self.call(Method::POST, "/ballots", Some(creator), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        assert_eq!(created["success"], true);
        created["ballotId"].as_str().unwrap().to_string()
    }
}

fn active_ballot(voters: &[&str]) -> Value {
    json!({
        "title": "Approve budget",
        "options": [{"id": "yes"}, {"id": "no"}],
        "startDate": (Utc::now() - Duration::hours(1)).to_rfc3339(),
        "endDate": (Utc::now() + Duration::hours(1)).to_rfc3339(),
        "eligibleVoters": voters,
    })
}

#[tokio::test]
async fn test_health_and_openapi_are_public() {
    let app = TestApp::new().await;
    let (status, health) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    let (status, spec) = app.call(Method::GET, "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/ballots/{id}/vote"].is_object());
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = TestApp::new().await;
    let (status, problem) = app.call(Method::GET, "/ballots", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(problem["status"], 401);

    let (status, _) = app.call(Method::GET, "/ballots", Some("ghost"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/nowhere", Some("bm1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_vote_scenario() {
    let app = TestApp::new().await;
    let ballot_id = app.create_ballot("sec", active_ballot(&["bm1", "bm2", "bm3"])).await;
    let vote_uri = format!("/ballots/{}/vote", ballot_id);

    let (status, cast) = app.call(Method::POST, &vote_uri, Some("bm1"), Some(json!({"selectedOptionIds": ["yes"]}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cast["success"], true);
    assert!(cast.get("receipt").is_none());

    let (status, _) = app.call(Method::POST, &vote_uri, Some("bm2"), Some(json!({"selectedOptionIds": ["no"]}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, problem) = app.call(Method::POST, &vote_uri, Some("bm1"), Some(json!({"selectedOptionIds": ["no"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "DuplicateVote");

    let (status, tally) = app.call(Method::GET, &format!("/ballots/{}/results", ballot_id), Some("bm3"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tally["totalVotes"], 2);

    let (_, view) = app.call(Method::GET, &format!("/ballots/{}", ballot_id), Some("bm1"), None).await;
    assert_eq!(view["hasVoted"], true);
    assert_eq!(view["status"], "active");
}

#[tokio::test]
async fn test_scheduled_ballot_rejects_votes() {
    let app = TestApp::new().await;
    let ballot_id = app
        .create_ballot(
            "sec",
            json!({
                "title": "Next quarter",
                "options": ["yes", "no"],
                "startDate": (Utc::now() + Duration::days(1)).to_rfc3339(),
                "endDate": (Utc::now() + Duration::days(2)).to_rfc3339(),
                "eligibleVoters": ["bm1"],
            }),
        )
        .await;

    let (status, problem) = app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm1"), Some(json!({"selectedOptionIds": ["yes"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "BallotNotActive");
}

#[tokio::test]
async fn test_ineligible_voter_and_viewer_cannot_create() {
    let app = TestApp::new().await;
    let ballot_id = app.create_ballot("sec", active_ballot(&["bm1"])).await;

    let (status, problem) = app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm2"), Some(json!({"selectedOptionIds": ["yes"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "NotEligible");

    let (status, problem) = app.call(Method::POST, "/ballots", Some("view"), Some(active_ballot(&["bm1"]))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(problem["detail"], "Forbidden: not authorized");
}

#[tokio::test]
async fn test_options_freeze_after_first_vote() {
    let app = TestApp::new().await;
    let ballot_id = app.create_ballot("sec", active_ballot(&["bm1"])).await;
    let options_uri = format!("/ballots/{}/options", ballot_id);

    let (status, ballot) = app.call(Method::PUT, &options_uri, Some("sec"), Some(json!({"options": ["approve", "reject", "abstain"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ballot["options"].as_array().map(Vec::len), Some(3));

    let (status, _) = app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm1"), Some(json!({"selectedOptionIds": ["approve"]}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, problem) = app.call(Method::PUT, &options_uri, Some("sec"), Some(json!({"options": ["yes", "no"]}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(problem["code"], "OptionsFrozen");
}

#[tokio::test]
async fn test_anonymous_receipt_verifies() {
    let app = TestApp::new().await;
    let mut body = active_ballot(&["bm1"]);
    body["isAnonymous"] = json!(true);
    let ballot_id = app.create_ballot("sec", body).await;

    let (status, cast) = app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm1"), Some(json!({"selectedOptionIds": ["yes"]}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let receipt = cast["receipt"].as_str().unwrap().to_string();

    let verify_uri = format!("/ballots/{}/receipts/verify", ballot_id);
    let (_, verified) = app.call(Method::POST, &verify_uri, Some("bm1"), Some(json!({"receipt": receipt}))).await;
    assert_eq!(verified["recorded"], true);
    let (_, forged) = app.call(Method::POST, &verify_uri, Some("bm1"), Some(json!({"receipt": "forged"}))).await;
    assert_eq!(forged["recorded"], false);

    let (_, tally) = app.call(Method::GET, &format!("/ballots/{}/results", ballot_id), Some("bm1"), None).await;
    let voters = &tally["options"][0]["voterIds"];
    assert!(voters.is_null() || voters.as_array().is_some_and(|v| v.is_empty()));
}

#[tokio::test]
async fn test_top_secret_document_hidden_from_listed_secretary() {
    let app = TestApp::new().await;
    let (status, document) = app
        .call(Method::POST, "/documents", Some("root"), Some(json!({"title": "Acquisition plan", "confidentiality": "top-secret", "accessList": ["sec"]})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = document["id"].as_str().unwrap().to_string();

    let (status, hidden) = app.call(Method::GET, &format!("/documents/{}", id), Some("sec"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, missing) = app.call(Method::GET, "/documents/no-such-doc", Some("sec"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(hidden["title"], missing["title"]);
    assert_eq!(hidden["detail"], format!("Not found: document {} not found", id));

    let (_, check) = app.call(Method::GET, "/access/check?resource=document:no-such-doc&action=read", Some("sec"), None).await;
    assert_eq!(check, json!({"allowed": false, "reason": "not_authorized"}));

    let (status, check) = app.call(Method::GET, &format!("/access/check?resource=document:{}&action=read", id), Some("sec"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check, json!({"allowed": false, "reason": "not_authorized"}));

    let (_, check) = app.call(Method::GET, &format!("/access/check?principal=sec&resource=document:{}&action=read", id), Some("root"), None).await;
    assert_eq!(check["allowed"], false);
    let (status, _) = app.call(Method::GET, &format!("/access/check?principal=bm1&resource=document:{}&action=read", id), Some("sec"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listed) = app.call(Method::GET, "/documents", Some("sec"), None).await;
    assert_eq!(listed["documents"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_viewer_capability_check() {
    let app = TestApp::new().await;
    let (_, check) = app.call(Method::GET, "/access/check?resource=votes&action=cast", Some("view"), None).await;
    assert_eq!(check["allowed"], false);
    let (_, check) = app.call(Method::GET, "/access/check?resource=reports&action=read", Some("view"), None).await;
    assert_eq!(check["allowed"], true);
    let (status, _) = app.call(Method::GET, "/access/check?resource=vault:1&action=read", Some("view"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meeting_attendance_flow() {
    let app = TestApp::new().await;
    let (status, meeting) = app
        .call(
            Method::POST,
            "/meetings",
            Some("sec"),
            Some(json!({"title": "Board meeting", "scheduledFor": Utc::now().to_rfc3339(), "attendees": ["bm1", "bm2", "bm3"]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = meeting["id"].as_str().unwrap().to_string();
    assert_eq!(meeting["quorumMet"], false);

    let (status, _) = app.call(Method::POST, &format!("/meetings/{}/respond", id), Some("bm1"), Some(json!({"status": "accepted"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::POST, &format!("/meetings/{}/join", id), Some("bm1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.call(Method::POST, &format!("/meetings/{}/status", id), Some("sec"), Some(json!({"status": "in-progress"}))).await;
    assert_eq!(status, StatusCode::OK);
    app.call(Method::POST, &format!("/meetings/{}/join", id), Some("bm1"), None).await;
    let (_, joined) = app.call(Method::POST, &format!("/meetings/{}/join", id), Some("bm2"), None).await;
    assert_eq!(joined["quorumMet"], true);

    // attendees of the linked meeting may vote without being listed
    let mut body = active_ballot(&[]);
    body["meetingId"] = json!(id);
    let ballot_id = app.create_ballot("sec", body).await;
    let (status, _) = app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm2"), Some(json!({"selectedOptionIds": ["yes"]}))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_audit_log_access_and_filters() {
    let app = TestApp::new().await;
    let ballot_id = app.create_ballot("sec", active_ballot(&["bm1"])).await;
    app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm1"), Some(json!({"selectedOptionIds": ["yes"]}))).await;
    app.call(Method::POST, &format!("/ballots/{}/vote", ballot_id), Some("bm1"), Some(json!({"selectedOptionIds": ["yes"]}))).await;

    let (status, _) = app.call(Method::GET, "/audit/logs", Some("bm1"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, logs) = app.call(Method::GET, &format!("/audit/logs?action=vote.rejected&resourceId={}", ballot_id), Some("root"), None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["actorId"], "bm1");
    assert_eq!(logs[0]["reason"], "DuplicateVote");

    let (_, denied) = app.call(Method::GET, "/audit/logs?action=access.denied&actor=bm1", Some("root"), None).await;
    assert_eq!(denied["logs"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_principal_administration() {
    let app = TestApp::new().await;
    let (status, changed) = app.call(Method::PUT, "/principals/view/role", Some("root"), Some(json!({"role": "board_member"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["role"], "board_member");

    let (status, _) = app.call(Method::POST, "/principals/bm3/deactivate", Some("sec"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, deactivated) = app.call(Method::POST, "/principals/bm3/deactivate", Some("root"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["active"], false);

    let (status, _) = app.call(Method::GET, "/ballots", Some("bm3"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, own) = app.call(Method::GET, "/principals/bm1", Some("bm1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["id"], "bm1");
}

#[tokio::test]
async fn test_malformed_body_and_wrong_method() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/ballots")
        .header("authorization", format!("Bearer {}", app.token("sec")))
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    assert_eq!(app.router.handle(request).await.status(), StatusCode::BAD_REQUEST);

    let (status, _) = app.call(Method::PATCH, "/ballots", Some("sec"), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_vote_comments_recorded_on_open_ballots_only() {
    let app = TestApp::new().await;
    let open_id = app.create_ballot("sec", active_ballot(&["bm1", "bm2"])).await;
    let mut secret = active_ballot(&["bm1"]);
    secret["isAnonymous"] = json!(true);
    let secret_id = app.create_ballot("sec", secret).await;

    let vote = json!({"selectedOptionIds": ["yes"], "comments": "  Support, subject to the audit committee review  "});
    let (status, _) = app.call(Method::POST, &format!("/ballots/{}/vote", open_id), Some("bm1"), Some(vote.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.call(Method::POST, &format!("/ballots/{}/vote", secret_id), Some("bm1"), Some(vote)).await;
    assert_eq!(status, StatusCode::CREATED);

    let too_long = json!({"selectedOptionIds": ["no"], "comments": "x".repeat(2001)});
    let (status, problem) = app.call(Method::POST, &format!("/ballots/{}/vote", open_id), Some("bm2"), Some(too_long)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "ValidationFailed");

    let (_, open_logs) = app.call(Method::GET, &format!("/audit/logs?action=vote.cast&resourceId={}", open_id), Some("root"), None).await;
    assert_eq!(open_logs["logs"][0]["details"]["comments"], "Support, subject to the audit committee review");
    let (_, secret_logs) = app.call(Method::GET, &format!("/audit/logs?action=vote.cast&resourceId={}", secret_id), Some("root"), None).await;
    assert!(secret_logs["logs"][0]["details"]["comments"].is_null());
}

#[tokio::test]
async fn test_admin_system_stats() {
    let app = TestApp::new().await;
    app.create_ballot("sec", active_ballot(&["bm1"])).await;
    app.call(Method::POST, "/principals/bm3/deactivate", Some("root"), None).await;

    let (status, body) = app.call(Method::GET, "/admin/system-stats", Some("root"), None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["stats"];
    assert_eq!(stats["totalPrincipals"], 6);
    assert_eq!(stats["activePrincipals"], 5);
    assert_eq!(stats["totalBallots"], 1);
    assert_eq!(stats["openBallots"], 1);
    assert_eq!(stats["totalDocuments"], 0);

    let (status, _) = app.call(Method::GET, "/admin/system-stats", Some("sec"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

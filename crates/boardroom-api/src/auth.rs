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

//! Bearer token authentication and principal resolution

use crate::error::{CoreError, CoreResult};
use crate::rbac::audit::{AuditAction, AuditOutcome, AuditRecord};
use crate::rbac::roles::Principal;
use crate::rbac::system::AccessControl;
use crate::retry::RetryPolicy;
use crate::store::PrincipalStore;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Actor recorded for requests that never identified themselves
const ANONYMOUS: &str = "anonymous";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    pub fn new(principal_id: impl Into<String>, issuer: &str, audience: &str, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: principal_id.into(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            email: None,
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Signed token for `principal_id` valid for `expires_in`
    pub fn issue(&self, principal_id: &str, expires_in: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        self.create_token(&Claims::new(principal_id, &self.issuer, &self.audience, expires_in))
    }

    pub fn create_token(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.is_expired() {
            return Err(jsonwebtoken::errors::ErrorKind::ExpiredSignature.into());
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager").field("issuer", &self.issuer).field("audience", &self.audience).finish_non_exhaustive()
    }
}

/// Extract JWT token from Authorization header
pub fn extract_token_from_header(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

/// Maps a bearer token to an active, provisioned principal
pub struct Authenticator {
    jwt: JwtManager,
    principals: Arc<dyn PrincipalStore>,
    access: Arc<AccessControl>,
    retry: RetryPolicy,
}

impl Authenticator {
    pub fn new(jwt: JwtManager, principals: Arc<dyn PrincipalStore>, access: Arc<AccessControl>, retry: RetryPolicy) -> Self {
        Self { jwt, principals, access, retry }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    async fn reject(&self, actor: &str, reason: &'static str) -> CoreError {
        warn!(actor = %actor, reason, "Authentication rejected");
        self.access
            .audit()
            .record(AuditRecord::new(AuditAction::AuthRejected, actor, "session", AuditOutcome::Denied).with_reason(reason))
            .await;
        CoreError::Unauthorized
    }

    /// Resolve the `Authorization` header value into a principal
    pub async fn authenticate(&self, authorization: Option<&str>) -> CoreResult<Principal> {
        let Some(header) = authorization else {
            return Err(self.reject(ANONYMOUS, "missing_token").await);
        };
        let Some(token) = extract_token_from_header(header) else {
            return Err(self.reject(ANONYMOUS, "malformed_header").await);
        };
        let claims = match self.jwt.validate_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Token validation failed");
                return Err(self.reject(ANONYMOUS, "invalid_token").await);
            }
        };

        let record = self.retry.run("principal.get", |_| self.principals.get_principal(&claims.sub)).await?;
        match record {
            Some(record) if record.active => Ok(self.access.resolve_principal(&record).await),
            Some(_) => Err(self.reject(&claims.sub, "inactive_principal").await),
            None => Err(self.reject(&claims.sub, "unknown_principal").await),
        }
    }
}

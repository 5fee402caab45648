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

//! Configuration management for the governance API

use crate::rbac::audit::DenialAlert;
use crate::rbac::roles::{RoleTable, RoleTableError};
use crate::retry::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_JWT_SECRET: &str = "default-secret-change-in-production";
const DEFAULT_RECEIPT_SECRET: &str = "default-receipt-secret-change-in-production";
const DEFAULT_DENIAL_WINDOW_SECS: i64 = 300;
const MAX_DENIAL_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

/// Configuration for the governance API
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// JWT secret key for authentication
    pub jwt_secret: String,

    /// Expected `iss` claim
    pub jwt_issuer: String,

    /// Expected `aud` claim
    pub jwt_audience: String,

    /// HMAC key for anonymous ballot receipts
    pub receipt_secret: String,

    /// JSON role table replacing the built-in one
    pub role_table_path: Option<PathBuf>,

    /// Principal id provisioned as admin on startup when absent
    pub bootstrap_admin: Option<String>,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    pub store_retry_attempts: u32,
    pub store_retry_base_delay_ms: u64,

    /// Denials by one actor within the window that raise a security alert
    pub denial_alert_threshold: usize,
    pub denial_alert_window_secs: i64,

    /// Upper bound for `limit` on audit log queries
    pub audit_query_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            match lookup(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!(key, value = %raw, "Ignoring unparseable configuration value");
                    default
                }),
                None => default,
            }
        }

        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            bind_address: non_empty("BOARDROOM_BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string()),

            jwt_secret: non_empty("BOARDROOM_JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),

            jwt_issuer: non_empty("BOARDROOM_JWT_ISSUER").unwrap_or_else(|| "boardroom-api".to_string()),

            jwt_audience: non_empty("BOARDROOM_JWT_AUDIENCE").unwrap_or_else(|| "boardroom".to_string()),

            receipt_secret: non_empty("BOARDROOM_RECEIPT_SECRET").unwrap_or_else(|| DEFAULT_RECEIPT_SECRET.to_string()),

            role_table_path: non_empty("BOARDROOM_ROLE_TABLE").map(PathBuf::from),

            bootstrap_admin: non_empty("BOARDROOM_BOOTSTRAP_ADMIN"),

            max_body_size: parsed(lookup, "BOARDROOM_MAX_BODY_SIZE", 1024 * 1024), // 1MB

            request_timeout_secs: parsed(lookup, "BOARDROOM_REQUEST_TIMEOUT_SECS", 30),

            store_retry_attempts: parsed(lookup, "BOARDROOM_STORE_RETRY_ATTEMPTS", 3),

            store_retry_base_delay_ms: parsed(lookup, "BOARDROOM_STORE_RETRY_BASE_DELAY_MS", 50),

            denial_alert_threshold: parsed(lookup, "BOARDROOM_DENIAL_ALERT_THRESHOLD", 5),

            denial_alert_window_secs: match parsed(lookup, "BOARDROOM_DENIAL_ALERT_WINDOW_SECS", DEFAULT_DENIAL_WINDOW_SECS) {
                secs if (1..=MAX_DENIAL_WINDOW_SECS).contains(&secs) => secs,
                secs => {
                    warn!(value = secs, max = MAX_DENIAL_WINDOW_SECS, "Denial alert window out of range, using default");
                    DEFAULT_DENIAL_WINDOW_SECS
                }
            },

            audit_query_limit: parsed(lookup, "BOARDROOM_AUDIT_QUERY_LIMIT", 1000),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.store_retry_attempts.max(1), Duration::from_millis(self.store_retry_base_delay_ms))
    }

    pub fn denial_alert(&self) -> DenialAlert {
        DenialAlert {
            threshold: self.denial_alert_threshold.max(1),
            window: chrono::Duration::try_seconds(self.denial_alert_window_secs.clamp(1, MAX_DENIAL_WINDOW_SECS)).unwrap_or_else(|| DenialAlert::default().window),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Built-in table unless a JSON table is configured
    pub fn load_role_table(&self) -> Result<RoleTable, RoleTableError> {
        match &self.role_table_path {
            Some(path) => {
                let table = RoleTable::load(path)?;
                info!(path = %path.display(), "Loaded role table");
                Ok(table)
            }
            None => Ok(RoleTable::builtin()),
        }
    }

    /// Log loudly when a default secret is still in use
    pub fn warn_on_default_secrets(&self) {
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("BOARDROOM_JWT_SECRET is not set, using the default secret");
        }
        if self.receipt_secret == DEFAULT_RECEIPT_SECRET {
            warn!("BOARDROOM_RECEIPT_SECRET is not set, using the default secret");
        }
    }
}

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

//! Pure access policies over documents and meetings

pub mod documents;
pub mod meetings;

use serde::Serialize;
use std::fmt;

/// Why an access check said no
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotOnAccessList,
    MissingCapability,
    ConfidentialityTier,
    NotOwner,
    NotAttendee,
    NotEligible,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::NotOnAccessList => "not_on_access_list",
            DenialReason::MissingCapability => "missing_capability",
            DenialReason::ConfidentialityTier => "confidentiality_tier",
            DenialReason::NotOwner => "not_owner",
            DenialReason::NotAttendee => "not_attendee",
            DenialReason::NotEligible => "not_eligible",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenialReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }
}

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

//! Vote receipts
//!
//! A receipt is an HMAC-SHA256 commitment over the ballot, voter, sorted
//! selection and submission id, keyed by a server secret. Voters on
//! anonymous ballots keep it as proof their vote was counted without the
//! tally exposing who chose what.

use super::tally::Vote;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::hmac;
use std::fmt;

const SEPARATOR: u8 = 0x1f;

pub struct ReceiptSigner {
    key: hmac::Key,
}

impl ReceiptSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    fn message(ballot_id: &str, voter_id: &str, selection: &[String], submission_id: &str) -> Vec<u8> {
        let mut sorted: Vec<&str> = selection.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let mut message = Vec::with_capacity(128);
        for part in [ballot_id, voter_id] {
            message.extend_from_slice(part.as_bytes());
            message.push(SEPARATOR);
        }
        for option_id in sorted {
            message.extend_from_slice(option_id.as_bytes());
            message.push(b',');
        }
        message.push(SEPARATOR);
        message.extend_from_slice(submission_id.as_bytes());
        message
    }

    pub fn sign(&self, ballot_id: &str, voter_id: &str, selection: &[String], submission_id: &str) -> String {
        let tag = hmac::sign(&self.key, &Self::message(ballot_id, voter_id, selection, submission_id));
        URL_SAFE_NO_PAD.encode(tag.as_ref())
    }

    /// Whether `receipt` is the commitment for `vote`
    pub fn verify(&self, vote: &Vote, receipt: &str) -> bool {
        let Ok(tag) = URL_SAFE_NO_PAD.decode(receipt.trim()) else {
            return false;
        };
        let message = Self::message(&vote.ballot_id, &vote.voter_id, &vote.selected_option_ids, &vote.submission_id);
        hmac::verify(&self.key, &message, &tag).is_ok()
    }
}

impl fmt::Debug for ReceiptSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptSigner").finish_non_exhaustive()
    }
}

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

//! Ballots, votes, tallies and receipts

pub mod ballot;
pub mod engine;
pub mod receipt;
pub mod tally;

pub use ballot::{Ballot, BallotOption, BallotOptionInput, BallotStatus, NewBallot};
pub use engine::{BallotView, CastOutcome, VotingEngine};
pub use receipt::ReceiptSigner;
pub use tally::{OptionTally, Tally, Vote};

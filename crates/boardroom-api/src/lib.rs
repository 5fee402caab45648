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

//! Boardroom governance API
//!
//! Access control and voting core for board governance: role-based
//! capabilities, document confidentiality, meeting attendance, ballots
//! with atomic vote commits, and an audit trail, served over HTTP.

pub mod auth;
pub mod config;
pub mod error;
pub mod governance;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod rbac;
pub mod retry;
pub mod router;
pub mod server;
pub mod state;
pub mod store;
pub mod voting;

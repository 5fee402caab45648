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

//! HTTP request handlers

pub mod access;
pub mod admin;
pub mod audit;
pub mod ballots;
pub mod documents;
pub mod health;
pub mod meetings;
pub mod principals;

use crate::error::{ApiError, ApiResult};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> ApiResult<Response<Full<Bytes>>> {
    let json = serde_json::to_string(body)?;
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(json)))?)
}

pub fn no_content() -> ApiResult<Response<Full<Bytes>>> {
    Ok(Response::builder().status(StatusCode::NO_CONTENT).body(Full::new(Bytes::new()))?)
}

/// Parse a JSON request body
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest {
        message: format!("Invalid request body: {}", e),
    })
}

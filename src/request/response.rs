//! Response Envelope
//!
//! Every reply is one JSON object followed by a newline. Fields that do not
//! apply to a reply are left out entirely.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::cache::Food;
use crate::error::{Error, Result};

pub const NOT_FOUND_MESSAGE: &str = "No results were found matching request";
pub const SERVER_ERROR_MESSAGE: &str = "An error occurred while server was processing request";
pub const TOO_LARGE_MESSAGE: &str = "Result data is too big";

/// Pre-rendered "too big" reply, written when a real reply does not fit
pub static TOO_LARGE_BYTES: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut bytes = format!(r#"{{"status":"ERROR","message":"{}"}}"#, TOO_LARGE_MESSAGE).into_bytes();
    bytes.push(b'\n');
    bytes
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Error,
}

/// Reply sent back to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foods: Option<Vec<Food>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<Food>,
}

impl Response {
    pub fn ok_food(food: Food) -> Self {
        Self {
            status: Status::Ok,
            message: None,
            foods: None,
            food: Some(food),
        }
    }

    pub fn ok_foods(foods: Vec<Food>) -> Self {
        Self {
            status: Status::Ok,
            message: None,
            foods: Some(foods),
            food: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            foods: None,
            food: None,
        }
    }

    pub fn not_found() -> Self {
        Self::error(NOT_FOUND_MESSAGE)
    }

    pub fn server_error() -> Self {
        Self::error(SERVER_ERROR_MESSAGE)
    }

    pub fn too_large() -> Self {
        Self::error(TOO_LARGE_MESSAGE)
    }

    /// Error reply for a malformed command; the message carries the reason
    pub fn invalid(err: &Error) -> Self {
        Self::error(err.to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Wire form, newline included
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse one wire line (trailing newline optional)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// =============================================================================
// Tests
// =============================================================================

//! User Records
//!
//! TigerStyle: Explicit types, validation before storage.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use crate::constants::{USER_EMAIL_BYTES_MAX, USER_ID_FIRST, USER_ID_MAX, USER_NAME_BYTES_MAX};

// =============================================================================
// UserRecord
// =============================================================================

/// A stored user.
///
/// Never mutated in place; delete-then-recreate is the only update path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique within one store instance
    pub id: u64,
    /// Display name
    pub name: String,
    /// Contact email (may be empty)
    #[serde(default)]
    pub email: String,
    /// Creation time, seconds since the Unix epoch
    #[serde(default)]
    pub created_at: f64,
}

impl UserRecord {
    /// Same id, name and email.
    ///
    /// `created_at` is left out since it may lose precision crossing tiers.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.email == other.email
    }

    /// Rebuild from hash fields. Missing or unparseable fields default to
    /// zero/empty; the record is still returned.
    #[must_use]
    pub fn from_fields(fields: &std::collections::HashMap<String, String>) -> Self {
        Self {
            id: fields
                .get("id")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            name: fields.get("name").cloned().unwrap_or_default(),
            email: fields.get("email").cloned().unwrap_or_default(),
            created_at: fields
                .get("created_at")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

/// Current time in seconds since the Unix epoch, millisecond precision.
#[must_use]
pub fn unix_now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

// =============================================================================
// NewUser
// =============================================================================

/// Candidate for `create`, as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    /// Required, non-empty
    #[serde(default)]
    pub name: Option<String>,
    /// Defaults to empty
    #[serde(default)]
    pub email: Option<String>,
    /// Caller-chosen id; the store assigns one when absent
    #[serde(default)]
    pub id: Option<u64>,
    /// Defaults to now
    #[serde(default)]
    pub created_at: Option<f64>,
}

impl NewUser {
    /// Candidate with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set a caller-chosen id.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Drop any caller-chosen id.
    #[must_use]
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    /// Check the candidate without assigning an id.
    ///
    /// # Errors
    /// Returns `StorageError::Validation` for a missing/empty name, oversized
    /// fields, or an id outside `USER_ID_FIRST..=USER_ID_MAX`.
    pub fn validate(&self) -> StorageResult<()> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(StorageError::validation("Name is required"));
        }
        if name.len() > USER_NAME_BYTES_MAX {
            return Err(StorageError::validation(format!(
                "name {} bytes exceeds max {}",
                name.len(),
                USER_NAME_BYTES_MAX
            )));
        }
        if let Some(email) = &self.email {
            if email.len() > USER_EMAIL_BYTES_MAX {
                return Err(StorageError::validation(format!(
                    "email {} bytes exceeds max {}",
                    email.len(),
                    USER_EMAIL_BYTES_MAX
                )));
            }
        }
        if let Some(id) = self.id {
            if !(USER_ID_FIRST..=USER_ID_MAX).contains(&id) {
                return Err(StorageError::validation(format!(
                    "id must be between {USER_ID_FIRST} and {USER_ID_MAX}, got {id}"
                )));
            }
        }
        Ok(())
    }

    /// Validate and build the record stored under `id`.
    ///
    /// # Errors
    /// See [`NewUser::validate`].
    pub fn into_record(self, id: u64) -> StorageResult<UserRecord> {
        self.validate()?;

        Ok(UserRecord {
            id,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(unix_now_secs),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

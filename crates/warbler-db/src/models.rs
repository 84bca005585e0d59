//! Database row types. These map directly to SQLite rows and are kept apart
//! from the warbler-types models so the public types never carry digests.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use warbler_types::models::{Message, User};

use crate::error::{DbError, Result};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id("users", &self.id)?,
            username: self.username,
            email: self.email,
            image_url: self.image_url,
            header_image_url: self.header_image_url,
            bio: self.bio,
            location: self.location,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub text: String,
    pub timestamp: String,
    pub user_id: String,
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_id("messages", &self.id)?,
            timestamp: parse_timestamp(&self.timestamp)?,
            user_id: parse_id("messages", &self.user_id)?,
            text: self.text,
        })
    }
}

/// A user staged for insertion. Username and email stay optional so that a
/// missing value reaches the store and trips its NOT NULL constraint.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub text: String,
    /// Defaults to the moment the message is staged.
    pub timestamp: Option<DateTime<Utc>>,
    pub user_id: Uuid,
}

/// Column updates for an existing user. `None` leaves the column alone.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.image_url.is_none()
            && self.header_image_url.is_none()
            && self.bio.is_none()
            && self.location.is_none()
    }
}

pub(crate) fn parse_id(table: &'static str, raw: &str) -> Result<Uuid> {
    raw.parse().map_err(|e| DbError::Corrupt {
        table,
        detail: format!("bad id '{}': {}", raw, e),
    })
}

/// Timestamps are written as RFC 3339 with microseconds.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| DbError::Corrupt {
            table: "messages",
            detail: format!("bad timestamp '{}': {}", raw, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_timestamp_is_reported() {
        assert!(parse_timestamp("2024-03-01T12:30:00.000001Z").is_ok());
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, DbError::Corrupt { table: "messages", .. }));
    }

    #[test]
    fn corrupt_id_is_reported() {
        let err = parse_id("users", "not-a-uuid").unwrap_err();
        assert!(matches!(err, DbError::Corrupt { table: "users", .. }));
    }

    #[test]
    fn empty_changes() {
        assert!(UserChanges::default().is_empty());
        let changes = UserChanges {
            bio: Some(None),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}

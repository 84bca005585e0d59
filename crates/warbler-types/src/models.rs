use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

/// Upper bound on message text, counted in characters.
pub const MESSAGE_MAX_CHARS: usize = 140;

/// A registered user as the web layer sees it.
/// The password digest never leaves the database crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User #{}: {}, {}>", self.id, self.username, self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Uuid,
}

/// Directed edge: `user_following_id` follows `user_being_followed_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub user_being_followed_id: Uuid,
    pub user_following_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message_id: Uuid,
}

/// Counters shown on a profile page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub messages: u64,
    pub followers: u64,
    pub following: u64,
    pub likes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_display_matches_profile_repr() {
        let id = Uuid::new_v4();
        let user = User {
            id,
            username: "testuser".into(),
            email: "test@test.com".into(),
            image_url: DEFAULT_IMAGE_URL.into(),
            header_image_url: DEFAULT_HEADER_IMAGE_URL.into(),
            bio: None,
            location: None,
        };

        assert_eq!(user.to_string(), format!("<User #{id}: testuser, test@test.com>"));
    }

    #[test]
    fn user_serializes_without_password() {
        let user = User {
            id: Uuid::nil(),
            username: "a".into(),
            email: "a@a.com".into(),
            image_url: DEFAULT_IMAGE_URL.into(),
            header_image_url: DEFAULT_HEADER_IMAGE_URL.into(),
            bio: Some("hi".into()),
            location: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["bio"], "hi");
    }
}

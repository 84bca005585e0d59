use tracing::debug;
use uuid::Uuid;

use warbler_db::models::NewMessage;
use warbler_db::{Database, Session};
use warbler_types::models::{Follow, Like, MESSAGE_MAX_CHARS, Message, User, UserStats};

use crate::error::{Error, Result};

/// Messages shown on a home timeline or profile page.
pub const TIMELINE_LIMIT: u32 = 100;

/// Relationship queries and edge mutations over the social graph.
///
/// Reads go straight to the store; writes are staged on the caller's
/// session and only take effect when it commits.
pub struct Social<'db> {
    db: &'db Database,
}

impl<'db> Social<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    // -- Predicates --

    /// Does `user` follow `other`?
    pub fn is_following(&self, user: &User, other: &User) -> Result<bool> {
        Ok(self.db.is_following(user.id, other.id)?)
    }

    /// Is `user` followed by `other`?
    pub fn is_followed_by(&self, user: &User, other: &User) -> Result<bool> {
        Ok(self.db.is_following(other.id, user.id)?)
    }

    pub fn is_liked_by(&self, message: &Message, user: &User) -> Result<bool> {
        Ok(self.db.is_liked_by(message.id, user.id)?)
    }

    // -- Derived relationships --

    pub fn followers(&self, user: &User) -> Result<Vec<User>> {
        Ok(self.db.followers_of(user.id)?)
    }

    pub fn following(&self, user: &User) -> Result<Vec<User>> {
        Ok(self.db.following_of(user.id)?)
    }

    /// Messages `user` has liked.
    pub fn likes(&self, user: &User) -> Result<Vec<Message>> {
        Ok(self.db.liked_messages(user.id)?)
    }

    /// Every message `user` wrote, newest first.
    pub fn messages(&self, user: &User) -> Result<Vec<Message>> {
        Ok(self.db.messages_by(user.id, None)?)
    }

    /// The newest `TIMELINE_LIMIT` messages `user` wrote, for a profile page.
    pub fn recent_messages(&self, user: &User) -> Result<Vec<Message>> {
        Ok(self.db.messages_by(user.id, Some(TIMELINE_LIMIT))?)
    }

    pub fn stats(&self, user: &User) -> Result<UserStats> {
        Ok(self.db.user_stats(user.id)?)
    }

    pub fn home_timeline(&self, user: &User) -> Result<Vec<Message>> {
        Ok(self.db.home_timeline(user.id, TIMELINE_LIMIT)?)
    }

    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<User>> {
        Ok(self.db.list_users(search)?)
    }

    pub fn user(&self, id: Uuid) -> Result<User> {
        self.db
            .get_user_by_id(id)?
            .ok_or(Error::NotFound { kind: "user", id })
    }

    pub fn message(&self, id: Uuid) -> Result<Message> {
        self.db
            .get_message(id)?
            .ok_or(Error::NotFound { kind: "message", id })
    }

    // -- Writes --

    pub fn post_message(&self, session: &mut Session<'_>, author: &User, text: &str) -> Result<Message> {
        let len = text.chars().count();
        if len == 0 {
            return Err(Error::Validation("message text must not be empty"));
        }
        if len > MESSAGE_MAX_CHARS {
            return Err(Error::Validation("message text exceeds 140 characters"));
        }

        let id = Uuid::new_v4();
        let timestamp = session.add_message(NewMessage {
            id,
            text: text.to_string(),
            timestamp: None,
            user_id: author.id,
        });
        Ok(Message {
            id,
            text: text.to_string(),
            timestamp,
            user_id: author.id,
        })
    }

    /// Only the author may delete a message.
    pub fn delete_message(&self, session: &mut Session<'_>, actor: &User, message_id: Uuid) -> Result<()> {
        let message = self.message(message_id)?;
        if message.user_id != actor.id {
            return Err(Error::Forbidden("only the author may delete a message"));
        }
        session.delete_message(message_id);
        Ok(())
    }

    pub fn follow(&self, session: &mut Session<'_>, follower: &User, followed_id: Uuid) -> Result<()> {
        let followed = self.user(followed_id)?;
        session.add_follow(Follow {
            user_being_followed_id: followed.id,
            user_following_id: follower.id,
        });
        debug!("Staged follow {} -> {}", follower.username, followed.username);
        Ok(())
    }

    pub fn unfollow(&self, session: &mut Session<'_>, follower: &User, followed_id: Uuid) -> Result<()> {
        let followed = self.user(followed_id)?;
        session.remove_follow(Follow {
            user_being_followed_id: followed.id,
            user_following_id: follower.id,
        });
        Ok(())
    }

    /// Like the message if `user` has not yet, otherwise remove the like.
    /// Returns whether the message is liked once the session commits.
    ///
    /// The current state is read from the store, so a like staged earlier
    /// in the same session is not seen.
    pub fn toggle_like(&self, session: &mut Session<'_>, user: &User, message_id: Uuid) -> Result<bool> {
        let message = self.message(message_id)?;
        if message.user_id == user.id {
            return Err(Error::Forbidden("cannot like your own message"));
        }

        if self.db.is_liked_by(message.id, user.id)? {
            session.remove_like(user.id, message.id);
            Ok(false)
        } else {
            session.add_like(Like {
                id: Uuid::new_v4(),
                user_id: user.id,
                message_id: message.id,
            });
            Ok(true)
        }
    }
}

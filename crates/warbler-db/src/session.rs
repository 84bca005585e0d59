use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, warn};
use uuid::Uuid;

use warbler_types::models::{Follow, Like};

use crate::Database;
use crate::error::{DbError, Result};
use crate::models::{NewMessage, NewUser, UserChanges};

/// A staged write, applied in order at commit.
#[derive(Debug, Clone)]
enum Pending {
    InsertUser(NewUser),
    UpdateUser(Uuid, UserChanges),
    DeleteUser(Uuid),
    InsertMessage {
        id: Uuid,
        text: String,
        timestamp: DateTime<Utc>,
        user_id: Uuid,
    },
    DeleteMessage(Uuid),
    InsertFollow(Follow),
    DeleteFollow(Follow),
    InsertLike(Like),
    DeleteLike { user_id: Uuid, message_id: Uuid },
}

/// Unit of work over a [`Database`].
///
/// Staging never touches the store. `commit` applies every staged write in a
/// single transaction, so a constraint violation anywhere leaves the store as
/// it was. After a failed commit the session refuses to commit again until
/// `rollback` has discarded the offending writes.
pub struct Session<'db> {
    db: &'db Database,
    pending: Vec<Pending>,
    failed: bool,
}

impl<'db> Session<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
            failed: false,
        }
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    // -- Users --

    pub fn add_user(&mut self, user: NewUser) {
        self.pending.push(Pending::InsertUser(user));
    }

    pub fn update_user(&mut self, id: Uuid, changes: UserChanges) {
        if !changes.is_empty() {
            self.pending.push(Pending::UpdateUser(id, changes));
        }
    }

    /// Removes the user along with their messages, follow edges and likes.
    pub fn delete_user(&mut self, id: Uuid) {
        self.pending.push(Pending::DeleteUser(id));
    }

    // -- Messages --

    /// Returns the timestamp the message will be stored with. An unset
    /// timestamp becomes the current time; the store keeps microseconds.
    pub fn add_message(&mut self, message: NewMessage) -> DateTime<Utc> {
        let timestamp = message.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(6);
        self.pending.push(Pending::InsertMessage {
            id: message.id,
            text: message.text,
            timestamp,
            user_id: message.user_id,
        });
        timestamp
    }

    pub fn delete_message(&mut self, id: Uuid) {
        self.pending.push(Pending::DeleteMessage(id));
    }

    // -- Edges --

    pub fn add_follow(&mut self, follow: Follow) {
        self.pending.push(Pending::InsertFollow(follow));
    }

    pub fn remove_follow(&mut self, follow: Follow) {
        self.pending.push(Pending::DeleteFollow(follow));
    }

    pub fn add_like(&mut self, like: Like) {
        self.pending.push(Pending::InsertLike(like));
    }

    pub fn remove_like(&mut self, user_id: Uuid, message_id: Uuid) {
        self.pending.push(Pending::DeleteLike { user_id, message_id });
    }

    // -- Lifecycle --

    pub fn commit(&mut self) -> Result<()> {
        if self.failed {
            return Err(DbError::PendingRollback);
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        let ops = &self.pending;
        let result = self.db.with_tx(|tx| {
            for op in ops {
                apply(tx, op)?;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                debug!("Committed {} staged writes", self.pending.len());
                self.pending.clear();
                Ok(())
            }
            Err(e) => {
                warn!("Commit of {} staged writes failed: {}", self.pending.len(), e);
                self.failed = true;
                Err(e)
            }
        }
    }

    pub fn rollback(&mut self) {
        self.pending.clear();
        self.failed = false;
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            debug!("Discarding {} uncommitted writes", self.pending.len());
        }
    }
}

fn apply(conn: &Connection, op: &Pending) -> Result<()> {
    match op {
        Pending::InsertUser(u) => {
            conn.execute(
                "INSERT INTO users (id, username, email, password, image_url) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![u.id.to_string(), u.username, u.email, u.password_hash, u.image_url],
            )?;
        }
        Pending::UpdateUser(id, changes) => update_user(conn, *id, changes)?,
        Pending::DeleteUser(id) => {
            conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
        }
        Pending::InsertMessage {
            id,
            text,
            timestamp,
            user_id,
        } => {
            conn.execute(
                "INSERT INTO messages (id, text, timestamp, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    text,
                    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                    user_id.to_string()
                ],
            )?;
        }
        Pending::DeleteMessage(id) => {
            conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?;
        }
        Pending::InsertFollow(f) => {
            conn.execute(
                "INSERT INTO follows (user_being_followed_id, user_following_id) VALUES (?1, ?2)",
                params![f.user_being_followed_id.to_string(), f.user_following_id.to_string()],
            )?;
        }
        Pending::DeleteFollow(f) => {
            conn.execute(
                "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![f.user_being_followed_id.to_string(), f.user_following_id.to_string()],
            )?;
        }
        Pending::InsertLike(l) => {
            conn.execute(
                "INSERT INTO likes (id, user_id, message_id) VALUES (?1, ?2, ?3)",
                params![l.id.to_string(), l.user_id.to_string(), l.message_id.to_string()],
            )?;
        }
        Pending::DeleteLike { user_id, message_id } => {
            conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id.to_string(), message_id.to_string()],
            )?;
        }
    }
    Ok(())
}

fn update_user(conn: &Connection, id: Uuid, changes: &UserChanges) -> Result<()> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Option<&str>> = Vec::new();

    if let Some(v) = &changes.username {
        sets.push("username");
        values.push(Some(v.as_str()));
    }
    if let Some(v) = &changes.email {
        sets.push("email");
        values.push(Some(v.as_str()));
    }
    if let Some(v) = &changes.image_url {
        sets.push("image_url");
        values.push(Some(v.as_str()));
    }
    if let Some(v) = &changes.header_image_url {
        sets.push("header_image_url");
        values.push(Some(v.as_str()));
    }
    if let Some(v) = &changes.bio {
        sets.push("bio");
        values.push(v.as_deref());
    }
    if let Some(v) = &changes.location {
        sets.push("location");
        values.push(v.as_deref());
    }

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    let sql = format!(
        "UPDATE users SET {} WHERE id = ?{}",
        assignments.join(", "),
        sets.len() + 1
    );

    let id = id.to_string();
    let mut params: Vec<&dyn rusqlite::types::ToSql> = values
        .iter()
        .map(|v| v as &dyn rusqlite::types::ToSql)
        .collect();
    params.push(&id);

    conn.execute(&sql, params.as_slice())?;
    Ok(())
}

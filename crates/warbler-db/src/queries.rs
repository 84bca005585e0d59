use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use warbler_types::models::{Message, User, UserStats};

use crate::Database;
use crate::error::Result;
use crate::models::{MessageRow, UserRow};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location";
const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id";

impl Database {
    // -- Users --

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.get_user_row_by_id(id)?.map(UserRow::into_user).transpose()
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.get_user_row_by_username(username)?
            .map(UserRow::into_user)
            .transpose()
    }

    /// Full row including the password digest, for credential checks.
    pub fn get_user_row_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_row(conn, "WHERE u.id = ?1", &id.to_string()))
    }

    /// Exact, case-sensitive username match.
    pub fn get_user_row_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_row(conn, "WHERE u.username = ?1", username))
    }

    /// All users, or those whose username contains `search`.
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<User>> {
        self.with_conn(|conn| match search.filter(|s| !s.is_empty()) {
            Some(term) => query_users(
                conn,
                "FROM users u WHERE instr(u.username, ?1) > 0 ORDER BY u.username",
                &[&term],
            ),
            None => query_users(conn, "FROM users u ORDER BY u.username", &[]),
        })
    }

    /// Users following `user_id`.
    pub fn followers_of(&self, user_id: Uuid) -> Result<Vec<User>> {
        let id = user_id.to_string();
        self.with_conn(|conn| {
            query_users(
                conn,
                "FROM users u
                 JOIN follows f ON f.user_following_id = u.id
                 WHERE f.user_being_followed_id = ?1
                 ORDER BY u.username",
                &[&id],
            )
        })
    }

    /// Users `user_id` follows.
    pub fn following_of(&self, user_id: Uuid) -> Result<Vec<User>> {
        let id = user_id.to_string();
        self.with_conn(|conn| {
            query_users(
                conn,
                "FROM users u
                 JOIN follows f ON f.user_being_followed_id = u.id
                 WHERE f.user_following_id = ?1
                 ORDER BY u.username",
                &[&id],
            )
        })
    }

    pub fn is_following(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            exists(
                conn,
                "SELECT 1 FROM follows WHERE user_following_id = ?1 AND user_being_followed_id = ?2",
                &follower.to_string(),
                &followed.to_string(),
            )
        })
    }

    pub fn user_stats(&self, user_id: Uuid) -> Result<UserStats> {
        let id = user_id.to_string();
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [&id],
                |row| {
                    Ok(UserStats {
                        messages: row.get::<_, i64>(0)? as u64,
                        followers: row.get::<_, i64>(1)? as u64,
                        following: row.get::<_, i64>(2)? as u64,
                        likes: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Messages --

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        let id = id.to_string();
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages m WHERE m.id = ?1", MESSAGE_COLUMNS);
            let row = conn.query_row(&sql, [&id], message_row).optional()?;
            row.map(MessageRow::into_message).transpose()
        })
    }

    /// Messages authored by `user_id`, newest first. `None` returns all of them.
    pub fn messages_by(&self, user_id: Uuid, limit: Option<u32>) -> Result<Vec<Message>> {
        let id = user_id.to_string();
        // SQLite treats a negative LIMIT as no limit.
        let limit = limit.map_or(-1, i64::from);
        self.with_conn(|conn| {
            query_messages(
                conn,
                "FROM messages m WHERE m.user_id = ?1 ORDER BY m.timestamp DESC LIMIT ?2",
                &[&id, &limit],
            )
        })
    }

    /// Messages liked by `user_id`, most recently posted first.
    pub fn liked_messages(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let id = user_id.to_string();
        self.with_conn(|conn| {
            query_messages(
                conn,
                "FROM messages m
                 JOIN likes l ON l.message_id = m.id
                 WHERE l.user_id = ?1
                 ORDER BY m.timestamp DESC",
                &[&id],
            )
        })
    }

    pub fn is_liked_by(&self, message_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            exists(
                conn,
                "SELECT 1 FROM likes WHERE message_id = ?1 AND user_id = ?2",
                &message_id.to_string(),
                &user_id.to_string(),
            )
        })
    }

    /// Messages by `user_id` and by everyone they follow, newest first.
    pub fn home_timeline(&self, user_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        let id = user_id.to_string();
        self.with_conn(|conn| {
            query_messages(
                conn,
                "FROM messages m
                 WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1)
                 ORDER BY m.timestamp DESC
                 LIMIT ?2",
                &[&id, &limit],
            )
        })
    }
}

fn query_user_row(conn: &Connection, filter: &str, key: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users u {}", USER_COLUMNS, filter);
    let row = conn.query_row(&sql, [key], user_row).optional()?;
    Ok(row)
}

fn query_users(
    conn: &Connection,
    from: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<User>> {
    let sql = format!("SELECT {} {}", USER_COLUMNS, from);
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params, user_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(UserRow::into_user).collect()
}

fn query_messages(
    conn: &Connection,
    from: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Message>> {
    let sql = format!("SELECT {} {}", MESSAGE_COLUMNS, from);
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params, message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(MessageRow::into_message).collect()
}

fn exists(conn: &Connection, sql: &str, a: &str, b: &str) -> Result<bool> {
    let hit: Option<i64> = conn.query_row(sql, [a, b], |row| row.get(0)).optional()?;
    Ok(hit.is_some())
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMessage, NewUser};
    use chrono::{Duration, Utc};
    use warbler_types::models::{Follow, Like};

    fn seed_user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut session = db.session();
        session.add_user(NewUser {
            id,
            username: Some(username.into()),
            email: Some(format!("{}@test.com", username)),
            password_hash: "$argon2id$stub".into(),
            image_url: "/static/images/default-pic.png".into(),
        });
        session.commit().unwrap();
        id
    }

    fn seed_message(db: &Database, user_id: Uuid, text: &str, minutes_ago: i64) -> Uuid {
        let id = Uuid::new_v4();
        let mut session = db.session();
        session.add_message(NewMessage {
            id,
            text: text.into(),
            timestamp: Some(Utc::now() - Duration::minutes(minutes_ago)),
            user_id,
        });
        session.commit().unwrap();
        id
    }

    fn follow(db: &Database, follower: Uuid, followed: Uuid) {
        let mut session = db.session();
        session.add_follow(Follow {
            user_being_followed_id: followed,
            user_following_id: follower,
        });
        session.commit().unwrap();
    }

    fn like(db: &Database, user_id: Uuid, message_id: Uuid) {
        let mut session = db.session();
        session.add_like(Like {
            id: Uuid::new_v4(),
            user_id,
            message_id,
        });
        session.commit().unwrap();
    }

    #[test]
    fn new_user_has_no_relationships() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");

        assert!(db.messages_by(u, None).unwrap().is_empty());
        assert!(db.followers_of(u).unwrap().is_empty());
        assert!(db.following_of(u).unwrap().is_empty());
        assert!(db.liked_messages(u).unwrap().is_empty());
        assert_eq!(db.user_stats(u).unwrap(), UserStats::default());
    }

    #[test]
    fn messages_by_limit_is_optional() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let newest = seed_message(&db, a, "newest", 0);
        seed_message(&db, a, "middle", 1);
        seed_message(&db, a, "oldest", 2);

        assert_eq!(db.messages_by(a, None).unwrap().len(), 3);
        let capped = db.messages_by(a, Some(1)).unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, newest);
    }

    #[test]
    fn follow_edge_is_directed() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");
        follow(&db, b, a);

        let followers: Vec<Uuid> = db.followers_of(a).unwrap().iter().map(|u| u.id).collect();
        let following: Vec<Uuid> = db.following_of(b).unwrap().iter().map(|u| u.id).collect();
        assert_eq!(followers, vec![b]);
        assert_eq!(following, vec![a]);
        assert!(db.following_of(a).unwrap().is_empty());
        assert!(db.followers_of(b).unwrap().is_empty());

        assert!(db.is_following(b, a).unwrap());
        assert!(!db.is_following(a, b).unwrap());
    }

    #[test]
    fn likes_and_messages() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");
        let c = seed_user(&db, "c");
        let m = seed_message(&db, a, "msgtext", 0);
        like(&db, b, m);

        let authored = db.messages_by(a, None).unwrap();
        assert_eq!(authored.len(), 1);
        assert_eq!(authored[0].text, "msgtext");
        assert_eq!(authored[0].user_id, a);

        let liked = db.liked_messages(b).unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].id, m);

        assert!(db.is_liked_by(m, b).unwrap());
        assert!(!db.is_liked_by(m, c).unwrap());
        assert!(!db.is_liked_by(m, a).unwrap());
    }

    #[test]
    fn deleting_user_cascades() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");
        let c = seed_user(&db, "c");
        let a_msg = seed_message(&db, a, "from a", 0);
        let c_msg = seed_message(&db, c, "from c", 0);
        follow(&db, a, b);
        follow(&db, c, a);
        like(&db, a, c_msg);
        like(&db, b, a_msg);

        let mut session = db.session();
        session.delete_user(a);
        session.commit().unwrap();

        assert!(db.get_user_by_id(a).unwrap().is_none());
        assert!(db.get_message(a_msg).unwrap().is_none());
        assert!(db.followers_of(b).unwrap().is_empty());
        assert!(db.following_of(c).unwrap().is_empty());
        assert!(!db.is_liked_by(c_msg, a).unwrap());
        // b's like pointed at a's message, which is gone.
        assert!(db.liked_messages(b).unwrap().is_empty());
        assert_eq!(db.user_stats(b).unwrap(), UserStats::default());
        assert_eq!(db.user_stats(c).unwrap().messages, 1);
    }

    #[test]
    fn stats_count_each_relationship() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");
        let m1 = seed_message(&db, a, "one", 2);
        seed_message(&db, a, "two", 1);
        follow(&db, b, a);
        follow(&db, a, b);
        like(&db, b, m1);

        assert_eq!(
            db.user_stats(a).unwrap(),
            UserStats {
                messages: 2,
                followers: 1,
                following: 1,
                likes: 0,
            }
        );
        assert_eq!(db.user_stats(b).unwrap().likes, 1);
    }

    #[test]
    fn timeline_covers_self_and_followed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");
        let stranger = seed_user(&db, "stranger");
        let old = seed_message(&db, a, "old", 10);
        let new = seed_message(&db, b, "new", 1);
        seed_message(&db, stranger, "noise", 0);
        follow(&db, a, b);

        let ids: Vec<Uuid> = db.home_timeline(a, 100).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![new, old]);

        assert_eq!(db.home_timeline(a, 1).unwrap().len(), 1);
    }

    #[test]
    fn list_users_with_search() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "alice");
        seed_user(&db, "bob");
        seed_user(&db, "malice");

        let all: Vec<String> = db.list_users(None).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(all, vec!["alice", "bob", "malice"]);

        let hits: Vec<String> = db
            .list_users(Some("lice"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(hits, vec!["alice", "malice"]);

        assert_eq!(db.list_users(Some("")).unwrap().len(), 3);
    }

    #[test]
    fn username_lookup_is_exact() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "testuser");

        assert!(db.get_user_by_username("testuser").unwrap().is_some());
        assert!(db.get_user_by_username("TestUser").unwrap().is_none());
        assert!(db.get_user_by_username("test").unwrap().is_none());
    }
}

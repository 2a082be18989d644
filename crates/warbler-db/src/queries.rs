use crate::Database;
use crate::models::{MessageRow, NewUser, UserRow, UserUpdate};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location, u.created_at";

const MESSAGE_COLUMNS: &str = "m.id, m.text, m.user_id, u.username, u.image_url, m.created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUser<'_>) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (new.id, new.username, new.email, new.password_hash),
            )?;
            if let Some(image_url) = new.image_url {
                tx.execute(
                    "UPDATE users SET image_url = ?2 WHERE id = ?1",
                    (new.id, image_url),
                )?;
            }
            let user = query_user(&tx, "u.id = ?1", new.id)?
                .ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", new.id))?;
            tx.commit()?;
            Ok(user)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    /// All users ordered by username, optionally filtered by a substring of
    /// the username.
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = format!("%{}%", escape_like(search.unwrap_or("")));
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users u
                 WHERE u.username LIKE ?1 ESCAPE '\\'
                 ORDER BY u.username"
            ))?;
            let rows = stmt
                .query_map([pattern], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_user(&self, id: &str, update: &UserUpdate<'_>) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    image_url = COALESCE(?4, image_url),
                    header_image_url = COALESCE(?5, header_image_url),
                    bio = COALESCE(?6, bio),
                    location = COALESCE(?7, location)
                 WHERE id = ?1",
                params![
                    id,
                    update.username,
                    update.email,
                    update.image_url,
                    update.header_image_url,
                    update.bio,
                    update.location
                ],
            )?;
            let user = query_user(&tx, "u.id = ?1", id)?;
            tx.commit()?;
            Ok(user)
        })
    }

    /// Removes the user along with their messages, follows and likes.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, id: &str, user_id: &str, text: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, text, user_id) VALUES (?1, ?2, ?3)",
                (id, text, user_id),
            )?;
            let message = query_message(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("Message vanished after insert: {}", id))?;
            tx.commit()?;
            Ok(message)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// A user's own messages, newest first.
    pub fn messages_by_user(&self, user_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE m.user_id = ?1 ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?2",
                params![user_id, limit],
            )
        })
    }

    /// Messages by the user and everyone they follow, newest first.
    pub fn timeline(&self, user_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2",
                params![user_id, limit],
            )
        })
    }

    pub fn count_messages(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM messages WHERE user_id = ?1", user_id))
    }

    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Follows --

    /// Adds the edge `follower -> followed`. Returns false if it already existed.
    pub fn follow(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
                (follower_id, followed_id),
            )?;
            Ok(inserted > 0)
        })
    }

    /// Removes the edge if present. Unfollowing someone not followed is a no-op.
    pub fn unfollow(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                (follower_id, followed_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Does `user_id` follow `other_id`?
    pub fn is_following(&self, user_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
                (user_id, other_id),
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Is `user_id` followed by `other_id`?
    pub fn is_followed_by(&self, user_id: &str, other_id: &str) -> Result<bool> {
        self.is_following(other_id, user_id)
    }

    /// Users that `user_id` follows.
    pub fn list_following(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM follows f
                 JOIN users u ON u.id = f.followed_id
                 WHERE f.follower_id = ?1
                 ORDER BY u.username"
            ))?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users following `user_id`.
    pub fn list_followers(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.followed_id = ?1
                 ORDER BY u.username"
            ))?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_following(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM follows WHERE follower_id = ?1", user_id))
    }

    pub fn count_followers(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM follows WHERE followed_id = ?1", user_id))
    }

    // -- Likes --

    /// Idempotent: liking an already-liked message returns false and changes nothing.
    pub fn add_like(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO likes (user_id, message_id) VALUES (?1, ?2)",
                (user_id, message_id),
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_like(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                (user_id, message_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Toggle a like: removes it if present, inserts it if not.
    /// Returns whether the message is liked afterwards, or `None` when the
    /// message does not exist.
    pub fn toggle_like(&self, user_id: &str, message_id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
                [message_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }
            let removed = tx.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                (user_id, message_id),
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                    (user_id, message_id),
                )?;
            }
            tx.commit()?;
            Ok(Some(removed == 0))
        })
    }

    pub fn has_liked(&self, user_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND message_id = ?2)",
                (user_id, message_id),
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Messages liked by `user_id`, most recently liked first.
    pub fn list_likes(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                "JOIN likes l ON l.message_id = m.id
                 WHERE l.user_id = ?1
                 ORDER BY l.created_at DESC, l.rowid DESC",
                [user_id],
            )
        })
    }

    pub fn liked_message_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    pub fn count_likes(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM likes WHERE user_id = ?1", user_id))
    }

    pub fn count_likes_for_message(&self, message_id: &str) -> Result<usize> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM likes WHERE message_id = ?1", message_id))
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        user_id: row.get(2)?,
        author_username: row.get(3)?,
        author_image_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}"))?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m
         JOIN users u ON u.id = m.user_id
         WHERE m.id = ?1"
    ))?;
    let row = stmt.query_row([id], message_from_row).optional()?;
    Ok(row)
}

fn query_messages<P: rusqlite::Params>(conn: &Connection, tail: &str, params: P) -> Result<Vec<MessageRow>> {
    // JOIN users to fetch author fields in a single query
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m
         JOIN users u ON u.id = m.user_id
         {tail}"
    ))?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn count(conn: &Connection, sql: &str, id: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(n as usize)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

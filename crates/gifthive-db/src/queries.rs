use crate::models::{GiftPatch, GiftRow, HiveRow, ShareRow, UserRow, UserWrite};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::debug;

const USER_COLUMNS: &str = "id, username, password, access_token, created_at";
const HIVE_COLUMNS: &str = "h.id, h.user_id, h.name, h.created_at";
const GIFT_COLUMNS: &str = "g.id, g.hive_id, g.name, g.description, g.link, g.bought, g.created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        access_token: &str,
    ) -> Result<UserWrite> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password, access_token) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, access_token),
            );
            match inserted {
                Ok(_) => Ok(UserWrite::Written),
                Err(e) if is_unique_violation(&e) => Ok(UserWrite::UsernameTaken),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_token(&self, access_token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "access_token", access_token))
    }

    pub fn update_user(
        &self,
        id: &str,
        username: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<UserWrite> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET username = COALESCE(?1, username), password = COALESCE(?2, password)
                 WHERE id = ?3",
                (username, password_hash, id),
            );
            match updated {
                Ok(0) => Ok(UserWrite::NotFound),
                Ok(_) => Ok(UserWrite::Written),
                Err(e) if is_unique_violation(&e) => Ok(UserWrite::UsernameTaken),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Remove a user with every hive, gift and share hanging off them.
    /// Children go first and the whole cascade commits or rolls back as one.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let gifts = tx.execute(
                "DELETE FROM gifts WHERE hive_id IN (SELECT id FROM hives WHERE user_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM hive_shares
                 WHERE user_id = ?1 OR hive_id IN (SELECT id FROM hives WHERE user_id = ?1)",
                [id],
            )?;
            let hives = tx.execute("DELETE FROM hives WHERE user_id = ?1", [id])?;
            let users = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            tx.commit()?;

            debug!("Deleted user {} ({} hives, {} gifts)", id, hives, gifts);
            Ok(users > 0)
        })
    }

    /// Ids of the hives and gifts a user owns, oldest first.
    pub fn owned_ids(&self, user_id: &str) -> Result<(Vec<String>, Vec<String>)> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM hives WHERE user_id = ?1 ORDER BY rowid")?;
            let hives = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT g.id FROM gifts g JOIN hives h ON g.hive_id = h.id
                 WHERE h.user_id = ?1 ORDER BY g.rowid",
            )?;
            let gifts = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok((hives, gifts))
        })
    }

    // -- Hives --

    pub fn create_hive(&self, id: &str, user_id: &str, name: &str) -> Result<HiveRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO hives (id, user_id, name) VALUES (?1, ?2, ?3)",
                (id, user_id, name),
            )?;
            query_hive(conn, "SELECT {} FROM hives h WHERE h.id = ?1", &[id])?
                .ok_or_else(|| anyhow::anyhow!("Hive {} vanished after insert", id))
        })
    }

    pub fn list_owned_hives(&self, user_id: &str) -> Result<Vec<HiveRow>> {
        self.with_conn(|conn| {
            query_hives(conn, "SELECT {} FROM hives h WHERE h.user_id = ?1 ORDER BY h.rowid", &[user_id])
        })
    }

    pub fn list_shared_hives(&self, user_id: &str) -> Result<Vec<HiveRow>> {
        self.with_conn(|conn| {
            query_hives(
                conn,
                "SELECT {} FROM hives h JOIN hive_shares s ON s.hive_id = h.id
                 WHERE s.user_id = ?1 ORDER BY s.rowid",
                &[user_id],
            )
        })
    }

    pub fn get_owned_hive(&self, id: &str, user_id: &str) -> Result<Option<HiveRow>> {
        self.with_conn(|conn| {
            query_hive(conn, "SELECT {} FROM hives h WHERE h.id = ?1 AND h.user_id = ?2", &[id, user_id])
        })
    }

    /// A hive the user owns or that was shared with them.
    pub fn get_visible_hive(&self, id: &str, user_id: &str) -> Result<Option<HiveRow>> {
        self.with_conn(|conn| {
            query_hive(
                conn,
                "SELECT {} FROM hives h WHERE h.id = ?1 AND (h.user_id = ?2
                 OR EXISTS (SELECT 1 FROM hive_shares s WHERE s.hive_id = h.id AND s.user_id = ?2))",
                &[id, user_id],
            )
        })
    }

    pub fn rename_hive(&self, id: &str, user_id: &str, name: &str) -> Result<Option<HiveRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE hives SET name = ?1 WHERE id = ?2 AND user_id = ?3",
                (name, id, user_id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_hive(conn, "SELECT {} FROM hives h WHERE h.id = ?1", &[id])
        })
    }

    /// Delete an owned hive: gifts and shares first, then the hive, in one
    /// transaction. Returns false if the user does not own the hive.
    pub fn delete_hive(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let owned: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM hives WHERE id = ?1 AND user_id = ?2)",
                [id, user_id],
                |row| row.get(0),
            )?;
            if !owned {
                return Ok(false);
            }

            let gifts = tx.execute("DELETE FROM gifts WHERE hive_id = ?1", [id])?;
            tx.execute("DELETE FROM hive_shares WHERE hive_id = ?1", [id])?;
            tx.execute("DELETE FROM hives WHERE id = ?1", [id])?;
            tx.commit()?;

            debug!("Deleted hive {} with {} gifts", id, gifts);
            Ok(true)
        })
    }

    /// Grant `user_id` read access to an owned hive. Re-sharing is a no-op.
    pub fn share_hive(&self, hive_id: &str, owner_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO hive_shares (hive_id, user_id)
                 SELECT id, ?3 FROM hives WHERE id = ?1 AND user_id = ?2",
                (hive_id, owner_id, user_id),
            )?;
            if inserted > 0 {
                return Ok(true);
            }
            // Nothing inserted: either already shared or not the owner.
            let owned: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM hives WHERE id = ?1 AND user_id = ?2)",
                [hive_id, owner_id],
                |row| row.get(0),
            )?;
            Ok(owned)
        })
    }

    /// Hives the user can see whose name contains `term` (case-insensitive)
    /// or whose id is exactly `term`. Case is folded here rather than with
    /// SQLite's `lower()`, which only handles ASCII.
    pub fn search_hives(&self, user_id: &str, term: &str) -> Result<Vec<HiveRow>> {
        let needle = term.to_lowercase();
        let visible = self.with_conn(|conn| {
            query_hives(
                conn,
                "SELECT {} FROM hives h
                 WHERE h.user_id = ?1
                    OR EXISTS (SELECT 1 FROM hive_shares s WHERE s.hive_id = h.id AND s.user_id = ?1)
                 ORDER BY h.rowid",
                &[user_id],
            )
        })?;

        Ok(visible
            .into_iter()
            .filter(|h| h.id == term || h.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Usernames each hive is shared with, in grant order.
    pub fn get_shares_for_hives(&self, hive_ids: &[String]) -> Result<Vec<ShareRow>> {
        if hive_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT s.hive_id, u.username FROM hive_shares s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.hive_id IN ({}) ORDER BY s.rowid",
                placeholders(hive_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(hive_ids), |row| {
                    Ok(ShareRow {
                        hive_id: row.get(0)?,
                        username: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Gifts --

    /// Insert a gift under a hive the user owns. `None` if they do not own it.
    pub fn create_gift(
        &self,
        id: &str,
        user_id: &str,
        hive_id: &str,
        name: &str,
        description: Option<&str>,
        link: Option<&str>,
    ) -> Result<Option<GiftRow>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO gifts (id, hive_id, name, description, link)
                 SELECT ?1, id, ?3, ?4, ?5 FROM hives WHERE id = ?2 AND user_id = ?6",
                rusqlite::params![id, hive_id, name, description, link, user_id],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            query_gift(conn, "SELECT {} FROM gifts g WHERE g.id = ?1", &[id])
        })
    }

    /// Gifts of the given hives, in insertion order.
    pub fn get_gifts_for_hives(&self, hive_ids: &[String]) -> Result<Vec<GiftRow>> {
        if hive_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM gifts g WHERE g.hive_id IN ({}) ORDER BY g.rowid",
                GIFT_COLUMNS,
                placeholders(hive_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(hive_ids), gift_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_owned_gifts(&self, user_id: &str, hive_id: Option<&str>) -> Result<Vec<GiftRow>> {
        self.with_conn(|conn| match hive_id {
            Some(hive_id) => query_gifts(
                conn,
                "SELECT {} FROM gifts g JOIN hives h ON g.hive_id = h.id
                 WHERE h.user_id = ?1 AND h.id = ?2 ORDER BY g.rowid",
                &[user_id, hive_id],
            ),
            None => query_gifts(
                conn,
                "SELECT {} FROM gifts g JOIN hives h ON g.hive_id = h.id
                 WHERE h.user_id = ?1 ORDER BY g.rowid",
                &[user_id],
            ),
        })
    }

    /// Apply a partial update to a gift whose hive the user owns.
    pub fn update_gift(&self, id: &str, user_id: &str, patch: &GiftPatch) -> Result<Option<GiftRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE gifts SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    link = COALESCE(?3, link),
                    bought = COALESCE(?4, bought)
                 WHERE id = ?5 AND hive_id IN (SELECT id FROM hives WHERE user_id = ?6)",
                rusqlite::params![patch.name, patch.description, patch.link, patch.bought, id, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_gift(conn, "SELECT {} FROM gifts g WHERE g.id = ?1", &[id])
        })
    }

    /// Set `bought` on a gift in a hive shared with the user.
    pub fn mark_shared_gift(&self, id: &str, user_id: &str, bought: bool) -> Result<Option<GiftRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE gifts SET bought = ?1
                 WHERE id = ?2 AND hive_id IN (SELECT hive_id FROM hive_shares WHERE user_id = ?3)",
                rusqlite::params![bought, id, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_gift(conn, "SELECT {} FROM gifts g WHERE g.id = ?1", &[id])
        })
    }

    pub fn delete_gift(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM gifts WHERE id = ?1 AND hive_id IN (SELECT id FROM hives WHERE user_id = ?2)",
                [id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                access_token: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

// The `{}` in each template is replaced by the column list.

fn query_hive(conn: &Connection, template: &str, params: &[&str]) -> Result<Option<HiveRow>> {
    let mut stmt = conn.prepare(&template.replacen("{}", HIVE_COLUMNS, 1))?;
    let row = stmt
        .query_row(rusqlite::params_from_iter(params), hive_from_row)
        .optional()?;
    Ok(row)
}

fn query_hives(conn: &Connection, template: &str, params: &[&str]) -> Result<Vec<HiveRow>> {
    let mut stmt = conn.prepare(&template.replacen("{}", HIVE_COLUMNS, 1))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), hive_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_gift(conn: &Connection, template: &str, params: &[&str]) -> Result<Option<GiftRow>> {
    let mut stmt = conn.prepare(&template.replacen("{}", GIFT_COLUMNS, 1))?;
    let row = stmt
        .query_row(rusqlite::params_from_iter(params), gift_from_row)
        .optional()?;
    Ok(row)
}

fn query_gifts(conn: &Connection, template: &str, params: &[&str]) -> Result<Vec<GiftRow>> {
    let mut stmt = conn.prepare(&template.replacen("{}", GIFT_COLUMNS, 1))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), gift_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn hive_from_row(row: &Row<'_>) -> rusqlite::Result<HiveRow> {
    Ok(HiveRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn gift_from_row(row: &Row<'_>) -> rusqlite::Result<GiftRow> {
    Ok(GiftRow {
        id: row.get(0)?,
        hive_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        link: row.get(4)?,
        bought: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
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

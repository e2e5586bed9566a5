/// Database row types, mapped directly from SQLite rows.
/// Distinct from gifthive-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub access_token: String,
    pub created_at: String,
}

pub struct HiveRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
}

pub struct GiftRow {
    pub id: String,
    pub hive_id: String,
    pub name: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub bought: bool,
    pub created_at: String,
}

/// (hive_id, username) pairs for the share lists.
pub struct ShareRow {
    pub hive_id: String,
    pub username: String,
}

/// Partial gift update. `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct GiftPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub bought: Option<bool>,
}

/// Outcome of a write that can collide with the unique username index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserWrite {
    Written,
    UsernameTaken,
    NotFound,
}

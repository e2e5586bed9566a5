use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gift collection owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hive {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub user_id: String,
    /// Gifts in insertion order.
    #[serde(default)]
    pub gifts: Vec<Gift>,
    /// Usernames the owner shared this hive with.
    #[serde(default)]
    pub shared_with: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub bought: bool,
    pub hive_id: String,
    pub created_at: DateTime<Utc>,
}

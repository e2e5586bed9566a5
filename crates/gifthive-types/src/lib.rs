pub mod api;
pub mod models;

/// Request header carrying the opaque access token. Not a bearer scheme:
/// the raw token is the whole header value.
pub const AUTH_HEADER: &str = "auth";

/// Keys the client persists into local storage.
pub mod storage_keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const USERNAME: &str = "username";
    pub const USER_ID: &str = "userId";
    pub const HIVES: &str = "hives";
    pub const GIFTS: &str = "gifts";
    pub const UNIQUE_HIVE: &str = "uniqueHive";
}

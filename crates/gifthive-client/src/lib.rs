//! Client-side state stores for the Gifthive API.
//!
//! Each store owns an explicit state value plus a shared [`ClientContext`]
//! (HTTP client and local storage). Actions await one request and then
//! replace the state with the result of a pure transition on the state type.

pub mod api;
pub mod config;
pub mod gift_store;
pub mod search_store;
pub mod storage;
pub mod user_store;

use std::sync::Arc;

pub use api::{ApiClient, ClientError};
pub use config::ClientConfig;
pub use gift_store::{GiftState, GiftStore};
pub use search_store::{SearchState, SearchStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use user_store::{UserState, UserStore};

use gifthive_types::storage_keys;

/// Dependencies shared by every store.
pub struct ClientContext {
    pub api: ApiClient,
    pub storage: Arc<dyn SessionStorage>,
}

pub type Context = Arc<ClientContext>;

impl ClientContext {
    pub fn new(api: ApiClient, storage: Arc<dyn SessionStorage>) -> Context {
        Arc::new(Self { api, storage })
    }

    /// The persisted access token, if someone is logged in.
    pub fn access_token(&self) -> Result<String, ClientError> {
        self.storage
            .get(storage_keys::ACCESS_TOKEN)
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingToken)
    }
}

pub mod error;
pub mod extract;
pub mod gifts;
pub mod hives;
pub mod middleware;
pub mod records;
pub mod search;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tracing::error;

use gifthive_db::Database;

use crate::error::ApiError;
use crate::middleware::require_auth;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

impl AppStateInner {
    pub fn new(db: Database) -> AppState {
        Arc::new(Self { db })
    }
}

/// All REST routes. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let auth = from_fn_with_state(state.clone(), require_auth);

    let user_routes = Router::new()
        .route("/dashboard", get(users::dashboard))
        .route("/{id}", put(users::update_user).delete(users::delete_user))
        .route_layer(auth.clone())
        .route("/register", post(users::register))
        .route("/login", post(users::login));

    let gift_routes = Router::new()
        .route("/hives", get(hives::list_hives).post(hives::create_hive))
        .route(
            "/hives/{id}",
            get(hives::get_hive).put(hives::rename_hive).delete(hives::delete_hive),
        )
        .route("/hives/{id}/share", post(hives::share_hive))
        .route("/shared-hives", get(hives::list_shared_hives))
        .route("/gifts", get(gifts::list_gifts).post(gifts::create_gift))
        .route("/gifts/{id}", put(gifts::update_gift).delete(gifts::delete_gift))
        .route("/shared-gifts/{id}", put(gifts::mark_shared_gift))
        .route_layer(auth.clone());

    let search_routes = Router::new()
        .route("/search", get(search::search))
        .route_layer(auth);

    Router::new()
        .nest("/user-routes", user_routes)
        .nest("/gift-routes", gift_routes)
        .nest("/search-routes", search_routes)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run blocking store work (SQLite, password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("worker task failed"))
        })?
}

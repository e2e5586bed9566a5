use std::sync::Arc;

use gifthive_api::{AppStateInner, router};
use gifthive_client::{ApiClient, ClientConfig, ClientContext, Context, MemoryStorage};
use gifthive_db::Database;

/// Serve the API over a fresh in-memory database on an ephemeral port.
pub async fn spawn_server() -> String {
    let db = Database::open_in_memory().unwrap();
    let app = router(AppStateInner::new(db));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

pub fn context(base_url: &str) -> (Context, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let config = ClientConfig::from_lookup(|key| {
        (key == "GIFTHIVE_API_URL").then(|| format!("{}/", base_url))
    });
    let ctx = ClientContext::new(ApiClient::from_config(&config), storage.clone());
    (ctx, storage)
}

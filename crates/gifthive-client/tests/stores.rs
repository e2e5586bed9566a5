mod common;

use gifthive_client::user_store::{UNKNOWN_USERNAME, WRONG_CREDENTIALS};
use gifthive_client::{Context, GiftStore, SearchStore, SessionStorage, UserStore};
use gifthive_types::api::{CreateGiftRequest, UpdateGiftRequest};
use gifthive_types::storage_keys;

use common::{context, spawn_server};

const PASSWORD: &str = "Passw0rd";

/// Register and log in a fresh user on its own storage.
async fn logged_in(base_url: &str, username: &str) -> Context {
    let (ctx, _) = context(base_url);
    let mut users = UserStore::new(ctx.clone());
    users.register(username, PASSWORD).await;
    assert_eq!(users.state().registered.as_deref(), Some(username));
    users.login(username, PASSWORD).await;
    assert!(users.state().is_logged_in, "{}", users.state().error_message);
    ctx
}

#[tokio::test]
async fn login_persists_session_and_logout_clears_it() {
    let base_url = spawn_server().await;
    let (ctx, storage) = context(&base_url);

    let mut users = UserStore::new(ctx.clone());
    users.register("maya", PASSWORD).await;
    users.login("maya", PASSWORD).await;

    let state = users.state();
    assert!(state.is_logged_in);
    assert_eq!(state.username, "maya");
    assert_eq!(storage.get(storage_keys::USERNAME).as_deref(), Some("maya"));
    assert_eq!(storage.get(storage_keys::USER_ID), Some(state.user_id.clone()));
    assert_eq!(storage.get(storage_keys::ACCESS_TOKEN), state.access_token.clone());

    // A second store on the same storage picks the session up.
    let restored = UserStore::new(ctx.clone());
    assert!(restored.state().is_logged_in);
    assert_eq!(restored.state().username, "maya");

    users.logout();
    assert!(!users.state().is_logged_in);
    assert!(storage.get(storage_keys::ACCESS_TOKEN).is_none());
    assert!(!UserStore::new(ctx).state().is_logged_in);
}

#[tokio::test]
async fn login_failures_map_to_messages() {
    let base_url = spawn_server().await;
    let (ctx, storage) = context(&base_url);
    let mut users = UserStore::new(ctx);

    users.register("noah", PASSWORD).await;
    users.login("noah", "Wr0ngpass").await;
    assert_eq!(users.state().error_message, WRONG_CREDENTIALS);
    assert!(!users.state().is_logged_in);

    users.login("nobody", PASSWORD).await;
    assert_eq!(users.state().error_message, UNKNOWN_USERNAME);
    assert!(storage.get(storage_keys::ACCESS_TOKEN).is_none());
}

#[tokio::test]
async fn duplicate_registration_shows_server_message() {
    let base_url = spawn_server().await;
    let (ctx, _) = context(&base_url);
    let mut users = UserStore::new(ctx);

    users.register("ivy", PASSWORD).await;
    users.register("ivy", PASSWORD).await;
    assert!(users.state().error_message.contains("already exists"));
    assert!(users.state().registered.is_none());
}

#[tokio::test]
async fn hive_and_gift_lifecycle() {
    let base_url = spawn_server().await;
    let (ctx, storage) = context(&base_url);
    let mut users = UserStore::new(ctx.clone());
    users.register("lena", PASSWORD).await;
    users.login("lena", PASSWORD).await;

    let mut gifts = GiftStore::new(ctx);
    gifts.add_hive("Lena's Birthday").await;
    let hive_id = gifts.state().hives[0].id.clone();

    gifts
        .add_gift(&CreateGiftRequest {
            name: Some("Watercolor set".into()),
            description: Some("The 24 colour one".into()),
            link: None,
            hive_id: Some(hive_id.clone()),
        })
        .await;
    assert_eq!(gifts.state().gifts.len(), 1);
    assert_eq!(gifts.state().hives[0].gifts.len(), 1);
    let gift_id = gifts.state().gifts[0].id.clone();

    gifts
        .update_gift(
            &gift_id,
            &UpdateGiftRequest {
                bought: Some(true),
                ..Default::default()
            },
        )
        .await;
    assert!(gifts.state().gifts[0].bought);
    assert_eq!(gifts.state().gifts[0].description.as_deref(), Some("The 24 colour one"));

    gifts.get_hives().await;
    assert_eq!(gifts.state().hives.len(), 1);
    assert!(storage.get(storage_keys::HIVES).is_some());

    gifts.delete_hive(&hive_id).await;
    assert!(gifts.state().hives.is_empty());
    assert!(gifts.state().gifts.is_empty());

    gifts.get_gifts(None).await;
    assert!(gifts.state().gifts.is_empty());
    assert!(gifts.state().error_message.is_empty());
}

#[tokio::test]
async fn reloaded_store_matches_after_mutations() {
    let base_url = spawn_server().await;
    let ctx = logged_in(&base_url, "alice").await;

    let mut gifts = GiftStore::new(ctx.clone());
    gifts.add_hive("Birthday").await;
    let hive_id = gifts.state().hives[0].id.clone();
    gifts
        .add_gift(&CreateGiftRequest {
            name: Some("Book".into()),
            description: None,
            link: None,
            hive_id: Some(hive_id.clone()),
        })
        .await;

    // Created records survive a reload without a fetch.
    let reloaded = GiftStore::new(ctx.clone());
    assert_eq!(reloaded.state().hives.len(), 1);
    assert_eq!(reloaded.state().gifts.len(), 1);

    gifts.get_hive(&hive_id).await;
    gifts.get_hives().await;
    gifts.get_gifts(None).await;
    gifts.delete_hive(&hive_id).await;
    assert!(gifts.state().hives.is_empty());
    assert!(gifts.state().gifts.is_empty());

    let reloaded = GiftStore::new(ctx);
    assert!(reloaded.state().hives.is_empty());
    assert!(reloaded.state().gifts.is_empty());
    assert!(reloaded.state().hive.is_none());
}

#[tokio::test]
async fn foreign_hive_surfaces_not_found() {
    let base_url = spawn_server().await;

    let mut owner_gifts = GiftStore::new(logged_in(&base_url, "owner").await);
    owner_gifts.add_hive("Private").await;
    let hive_id = owner_gifts.state().hives[0].id.clone();

    let mut gifts = GiftStore::new(logged_in(&base_url, "other").await);
    gifts.get_hive(&hive_id).await;
    assert_eq!(gifts.state().error_message, "Hive not found");
    assert!(gifts.state().hive.is_none());

    gifts.delete_hive(&hive_id).await;
    assert_eq!(gifts.state().error_message, "Hive not found");
}

#[tokio::test]
async fn shared_hive_is_visible_to_the_recipient() {
    let base_url = spawn_server().await;

    let owner_ctx = logged_in(&base_url, "ruth").await;
    let guest_ctx = logged_in(&base_url, "sam").await;

    let mut owner_gifts = GiftStore::new(owner_ctx);
    owner_gifts.add_hive("Wedding").await;
    let hive_id = owner_gifts.state().hives[0].id.clone();
    owner_gifts
        .add_gift(&CreateGiftRequest {
            name: Some("Toaster".into()),
            description: None,
            link: None,
            hive_id: Some(hive_id.clone()),
        })
        .await;
    owner_gifts.share_hive(&hive_id, "sam").await;
    assert_eq!(owner_gifts.state().hives[0].shared_with, vec!["sam".to_string()]);

    let mut guest_gifts = GiftStore::new(guest_ctx);
    guest_gifts.get_shared_hives().await;
    assert_eq!(guest_gifts.state().shared_hives.len(), 1);
    let gift_id = guest_gifts.state().shared_hives[0].gifts[0].id.clone();

    guest_gifts.mark_shared_gift(&gift_id, true).await;
    assert!(guest_gifts.state().error_message.is_empty());
    assert!(guest_gifts.state().shared_hives[0].gifts[0].bought);
}

#[tokio::test]
async fn search_with_no_hits_is_still_performed() {
    let base_url = spawn_server().await;
    let ctx = logged_in(&base_url, "otto").await;

    let mut gifts = GiftStore::new(ctx.clone());
    gifts.add_hive("Graduation").await;

    let mut search = SearchStore::new(ctx);
    search.search("grad").await;
    assert!(search.state().search_performed);
    assert_eq!(search.state().search_data.len(), 1);

    search.search("christmas").await;
    assert!(search.state().search_performed);
    assert!(search.state().search_data.is_empty());
    assert!(search.state().error_message.is_empty());
}

#[tokio::test]
async fn stores_without_a_session_ask_for_login() {
    let base_url = spawn_server().await;
    let (ctx, _) = context(&base_url);

    let mut gifts = GiftStore::new(ctx);
    gifts.get_hives().await;
    assert_eq!(gifts.state().error_message, "Please log in first");
    assert!(!gifts.state().loading);
}

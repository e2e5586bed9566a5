use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use gifthive_types::api::{CreateGiftRequest, UpdateGiftRequest};
use gifthive_types::models::{Gift, Hive};
use gifthive_types::storage_keys;

use crate::api::ClientError;
use crate::storage::SessionStorage;
use crate::Context;

/// Hives and gifts as last seen from the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GiftState {
    pub hives: Vec<Hive>,
    /// The hive currently open in a detail view.
    pub hive: Option<Hive>,
    pub gifts: Vec<Gift>,
    pub shared_hives: Vec<Hive>,
    pub loading: bool,
    pub error_message: String,
}

impl GiftState {
    /// Restore cached lists written by earlier fetches.
    pub fn rehydrate(storage: &dyn SessionStorage) -> Self {
        Self {
            hives: load_cached(storage, storage_keys::HIVES).unwrap_or_default(),
            gifts: load_cached(storage, storage_keys::GIFTS).unwrap_or_default(),
            hive: load_cached(storage, storage_keys::UNIQUE_HIVE),
            ..Self::default()
        }
    }

    pub fn begin_request(self) -> Self {
        Self {
            loading: true,
            error_message: String::new(),
            ..self
        }
    }

    pub fn failed(self, message: impl Into<String>) -> Self {
        Self {
            loading: false,
            error_message: message.into(),
            ..self
        }
    }

    fn done(self) -> Self {
        Self {
            loading: false,
            error_message: String::new(),
            ..self
        }
    }

    pub fn hives_loaded(self, hives: Vec<Hive>) -> Self {
        Self { hives, ..self.done() }
    }

    pub fn hive_loaded(self, hive: Hive) -> Self {
        Self {
            hive: Some(hive),
            ..self.done()
        }
    }

    pub fn gifts_loaded(self, gifts: Vec<Gift>) -> Self {
        Self { gifts, ..self.done() }
    }

    pub fn shared_hives_loaded(self, shared_hives: Vec<Hive>) -> Self {
        Self {
            shared_hives,
            ..self.done()
        }
    }

    pub fn hive_added(mut self, hive: Hive) -> Self {
        self.hives.push(hive);
        self.done()
    }

    /// Put a fresh copy of a hive wherever it is displayed.
    pub fn hive_replaced(mut self, hive: Hive) -> Self {
        for list in [&mut self.hives, &mut self.shared_hives] {
            if let Some(slot) = list.iter_mut().find(|h| h.id == hive.id) {
                *slot = hive.clone();
            }
        }
        if self.hive.as_ref().is_some_and(|h| h.id == hive.id) {
            self.hive = Some(hive);
        }
        self.done()
    }

    /// Drop a hive and every gift that lived in it.
    pub fn hive_removed(mut self, hive_id: &str) -> Self {
        self.hives.retain(|h| h.id != hive_id);
        self.gifts.retain(|g| g.hive_id != hive_id);
        if self.hive.as_ref().is_some_and(|h| h.id == hive_id) {
            self.hive = None;
        }
        self.done()
    }

    pub fn gift_added(mut self, gift: Gift) -> Self {
        for hive in self.hives_mut() {
            if hive.id == gift.hive_id {
                hive.gifts.push(gift.clone());
            }
        }
        self.gifts.push(gift);
        self.done()
    }

    pub fn gift_replaced(mut self, gift: Gift) -> Self {
        let mut slots: Vec<&mut Gift> = self.gifts.iter_mut().collect();
        for hive in self
            .hives
            .iter_mut()
            .chain(self.shared_hives.iter_mut())
            .chain(self.hive.iter_mut())
        {
            slots.extend(hive.gifts.iter_mut());
        }
        for slot in slots.into_iter().filter(|g| g.id == gift.id) {
            *slot = gift.clone();
        }
        self.done()
    }

    pub fn gift_removed(mut self, gift_id: &str) -> Self {
        self.gifts.retain(|g| g.id != gift_id);
        for hive in self.hives_mut() {
            hive.gifts.retain(|g| g.id != gift_id);
        }
        self.done()
    }

    fn hives_mut(&mut self) -> impl Iterator<Item = &mut Hive> {
        self.hives
            .iter_mut()
            .chain(self.shared_hives.iter_mut())
            .chain(self.hive.iter_mut())
    }
}

fn load_cached<T: DeserializeOwned>(storage: &dyn SessionStorage, key: &str) -> Option<T> {
    let raw = storage.get(key)?;
    serde_json::from_str(&raw)
        .map_err(|e| warn!("Ignoring corrupt cached {}: {}", key, e))
        .ok()
}

fn cache<T: Serialize>(storage: &dyn SessionStorage, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => storage.set(key, &raw),
        Err(e) => warn!("Could not cache {}: {}", key, e),
    }
}

pub struct GiftStore {
    ctx: Context,
    state: GiftState,
}

impl GiftStore {
    pub fn new(ctx: Context) -> Self {
        let state = GiftState::rehydrate(ctx.storage.as_ref());
        Self { ctx, state }
    }

    pub fn state(&self) -> &GiftState {
        &self.state
    }

    fn apply<F>(&mut self, transition: F)
    where
        F: FnOnce(GiftState) -> GiftState,
    {
        self.state = transition(std::mem::take(&mut self.state));
    }

    /// Apply a successful transition and write the cached lists back, so a
    /// store rebuilt from storage sees the same hives and gifts.
    fn commit<F>(&mut self, transition: F)
    where
        F: FnOnce(GiftState) -> GiftState,
    {
        self.apply(transition);
        self.persist();
    }

    fn persist(&self) {
        let storage = self.ctx.storage.as_ref();
        cache(storage, storage_keys::HIVES, &self.state.hives);
        cache(storage, storage_keys::GIFTS, &self.state.gifts);
        match &self.state.hive {
            Some(hive) => cache(storage, storage_keys::UNIQUE_HIVE, hive),
            None => storage.remove(storage_keys::UNIQUE_HIVE),
        }
    }

    /// Token for the next request, or record why there is none.
    fn token(&mut self) -> Option<String> {
        match self.ctx.access_token() {
            Ok(token) => {
                self.apply(GiftState::begin_request);
                Some(token)
            }
            Err(e) => {
                self.fail("No access token", e);
                None
            }
        }
    }

    fn fail(&mut self, context: &str, e: ClientError) {
        error!("{}: {}", context, e);
        self.apply(|s| s.failed(e.user_message()));
    }

    pub async fn get_hives(&mut self) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.hives(&token).await {
            Ok(hives) => self.commit(|s| s.hives_loaded(hives)),
            Err(e) => self.fail("Error fetching hives", e),
        }
    }

    pub async fn get_hive(&mut self, hive_id: &str) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.hive(&token, hive_id).await {
            Ok(hive) => self.commit(|s| s.hive_loaded(hive)),
            Err(e) => self.fail("Error fetching hive", e),
        }
    }

    pub async fn get_gifts(&mut self, hive_id: Option<&str>) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.gifts(&token, hive_id).await {
            Ok(gifts) => self.commit(|s| s.gifts_loaded(gifts)),
            Err(e) => self.fail("Error fetching gifts", e),
        }
    }

    pub async fn get_shared_hives(&mut self) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.shared_hives(&token).await {
            Ok(hives) => self.commit(|s| s.shared_hives_loaded(hives)),
            Err(e) => self.fail("Error fetching shared hives", e),
        }
    }

    pub async fn add_hive(&mut self, name: &str) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.create_hive(&token, name).await {
            Ok(hive) => self.commit(|s| s.hive_added(hive)),
            Err(e) => self.fail("Error adding hive", e),
        }
    }

    pub async fn rename_hive(&mut self, hive_id: &str, name: &str) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.rename_hive(&token, hive_id, name).await {
            Ok(hive) => self.commit(|s| s.hive_replaced(hive)),
            Err(e) => self.fail("Error renaming hive", e),
        }
    }

    pub async fn share_hive(&mut self, hive_id: &str, username: &str) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.share_hive(&token, hive_id, username).await {
            Ok(hive) => self.commit(|s| s.hive_replaced(hive)),
            Err(e) => self.fail("Error sharing hive", e),
        }
    }

    pub async fn delete_hive(&mut self, hive_id: &str) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.delete_hive(&token, hive_id).await {
            Ok(()) => self.commit(|s| s.hive_removed(hive_id)),
            Err(e) => self.fail("Error deleting hive", e),
        }
    }

    pub async fn add_gift(&mut self, gift: &CreateGiftRequest) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.create_gift(&token, gift).await {
            Ok(gift) => self.commit(|s| s.gift_added(gift)),
            Err(e) => self.fail("Error adding gift", e),
        }
    }

    pub async fn update_gift(&mut self, gift_id: &str, update: &UpdateGiftRequest) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.update_gift(&token, gift_id, update).await {
            Ok(gift) => self.commit(|s| s.gift_replaced(gift)),
            Err(e) => self.fail("Error updating gift", e),
        }
    }

    /// Mark a gift in someone else's shared hive as bought (or not).
    pub async fn mark_shared_gift(&mut self, gift_id: &str, bought: bool) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.mark_shared_gift(&token, gift_id, bought).await {
            Ok(gift) => self.commit(|s| s.gift_replaced(gift)),
            Err(e) => self.fail("Error updating shared gift", e),
        }
    }

    pub async fn delete_gift(&mut self, gift_id: &str) {
        let Some(token) = self.token() else { return };
        match self.ctx.api.delete_gift(&token, gift_id).await {
            Ok(()) => self.commit(|s| s.gift_removed(gift_id)),
            Err(e) => self.fail("Error deleting gift", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn hive(id: &str, gifts: Vec<Gift>) -> Hive {
        Hive {
            id: id.into(),
            name: format!("hive {}", id),
            user_id: "u1".into(),
            gifts,
            shared_with: vec![],
            created_at: Default::default(),
        }
    }

    fn gift(id: &str, hive_id: &str) -> Gift {
        Gift {
            id: id.into(),
            name: format!("gift {}", id),
            description: None,
            link: None,
            bought: false,
            hive_id: hive_id.into(),
            created_at: Default::default(),
        }
    }

    #[test]
    fn removing_a_hive_drops_its_gifts() {
        let state = GiftState::default()
            .hives_loaded(vec![hive("h1", vec![]), hive("h2", vec![])])
            .gifts_loaded(vec![gift("g1", "h1"), gift("g2", "h2")])
            .hive_loaded(hive("h1", vec![gift("g1", "h1")]))
            .hive_removed("h1");

        assert_eq!(state.hives.len(), 1);
        assert_eq!(state.gifts, vec![gift("g2", "h2")]);
        assert!(state.hive.is_none());
    }

    #[test]
    fn added_gift_shows_up_in_its_hive() {
        let state = GiftState::default()
            .hives_loaded(vec![hive("h1", vec![])])
            .gift_added(gift("g1", "h1"));

        assert_eq!(state.gifts.len(), 1);
        assert_eq!(state.hives[0].gifts, vec![gift("g1", "h1")]);
    }

    #[test]
    fn replaced_gift_updates_every_copy() {
        let mut bought = gift("g1", "h1");
        bought.bought = true;

        let state = GiftState::default()
            .hives_loaded(vec![hive("h1", vec![gift("g1", "h1")])])
            .gifts_loaded(vec![gift("g1", "h1")])
            .hive_loaded(hive("h1", vec![gift("g1", "h1")]))
            .gift_replaced(bought.clone());

        assert_eq!(state.gifts[0], bought);
        assert_eq!(state.hives[0].gifts[0], bought);
        assert_eq!(state.hive.unwrap().gifts[0], bought);
    }

    #[test]
    fn failure_keeps_data_and_sets_message() {
        let state = GiftState::default()
            .hives_loaded(vec![hive("h1", vec![])])
            .begin_request()
            .failed("Hive not found");

        assert_eq!(state.hives.len(), 1);
        assert!(!state.loading);
        assert_eq!(state.error_message, "Hive not found");
    }

    #[test]
    fn rehydrates_cached_lists_and_skips_corrupt_ones() {
        let storage = MemoryStorage::new();
        cache(&storage, storage_keys::HIVES, &vec![hive("h1", vec![])]);
        storage.set(storage_keys::GIFTS, "{not json");

        let state = GiftState::rehydrate(&storage);
        assert_eq!(state.hives.len(), 1);
        assert!(state.gifts.is_empty());
        assert!(state.hive.is_none());
    }
}

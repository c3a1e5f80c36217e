//! In-memory place store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tech_map_place_models::Place;

use crate::{PlaceStore, StoreError};

/// A [`PlaceStore`] backed by a `BTreeMap`. Always ready.
#[derive(Debug, Default)]
pub struct MemoryPlaceStore {
    places: RwLock<BTreeMap<String, Place>>,
}

impl MemoryPlaceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlaceStore for MemoryPlaceStore {
    fn is_ready(&self) -> bool {
        true
    }

    async fn store_places(&self, places: &[Place]) -> Result<(), StoreError> {
        let mut guard = self
            .places
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for place in places {
            guard.insert(place.id.clone(), place.clone());
        }
        drop(guard);
        Ok(())
    }

    async fn get_places(&self, ids: &[String]) -> Result<Vec<Place>, StoreError> {
        let guard = self
            .places
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self
            .places
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.places
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: &str, address: &str) -> Place {
        let mut p = Place::new(id, -33.8, 151.2);
        p.address1 = address.to_owned();
        p
    }

    #[tokio::test]
    async fn upsert_replaces_whole_record() {
        let store = MemoryPlaceStore::new();
        store.store_place(&place("A", "old")).await.unwrap();
        store.store_place(&place("A", "new")).await.unwrap();

        let got = store.get_place("A").await.unwrap().unwrap();
        assert_eq!(got.address1, "new");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_places_keeps_order_and_skips_missing() {
        let store = MemoryPlaceStore::new();
        store
            .store_places(&[place("A", "a"), place("B", "b"), place("C", "c")])
            .await
            .unwrap();

        let ids = vec!["C".to_owned(), "missing".to_owned(), "A".to_owned()];
        let got: Vec<String> = store
            .get_places(&ids)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();

        assert_eq!(got, vec!["C".to_owned(), "A".to_owned()]);
        assert!(store.get_place("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_empties_store() {
        let store = MemoryPlaceStore::new();
        store.store_place(&place("A", "a")).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn always_ready() {
        let store = MemoryPlaceStore::new();
        store
            .wait_until_ready(std::time::Duration::from_millis(1))
            .await
            .unwrap();
    }
}

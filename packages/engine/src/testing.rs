//! Scripted premises API and fixtures for engine tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tech_map_geo::{BoxKey, Bounds, GeoBox, Viewport};
use tech_map_place_models::{Place, TechType};
use tech_map_source::{ApiPage, PremisesApi, Proceed, SourceError};
use tech_map_store::PlaceStore;
use tech_map_store::memory::MemoryPlaceStore;
use tokio::sync::Notify;

/// Pauses the first matching request until released.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// One recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub key: BoxKey,
    pub page: u32,
    /// Premises in the store when the request was made.
    pub stored_before: usize,
}

/// Every box yields `pages` pages; each page holds an FTTP premise and a
/// fixed-wireless premise near the box centre.
pub struct FakeApi {
    /// `None` paginates forever.
    pages: Option<u32>,
    failing: Mutex<HashSet<BoxKey>>,
    calls: Mutex<Vec<Call>>,
    gate: Mutex<Option<Gate>>,
    delay: Option<Duration>,
    store: Option<Arc<MemoryPlaceStore>>,
}

impl FakeApi {
    pub fn new(pages: u32) -> Self {
        Self {
            pages: Some(pages),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            delay: None,
            store: None,
        }
    }

    pub fn endless() -> Self {
        Self {
            pages: None,
            ..Self::new(1)
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Records the store size seen by each request.
    #[must_use]
    pub fn observing(mut self, store: Arc<MemoryPlaceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn fail(&self, key: BoxKey) {
        self.failing.lock().unwrap().insert(key);
    }

    pub fn heal(&self, key: BoxKey) {
        self.failing.lock().unwrap().remove(&key);
    }

    /// Holds the next request until `gate.release` is notified.
    pub fn gate_next(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn distinct_boxes(&self) -> HashSet<BoxKey> {
        self.calls().into_iter().map(|c| c.key).collect()
    }
}

/// The two premises served on `page` of `geo_box`.
pub fn page_places(geo_box: &GeoBox, page: u32) -> Vec<Place> {
    let center = geo_box.center();
    let offset = f64::from(page) * 0.0001;
    let id = |suffix: &str| format!("{}:{}:{page}:{suffix}", geo_box.key.row, geo_box.key.col);

    let mut fttp = Place::new(id("fttp"), center.lat - offset, center.lng);
    fttp.tech_type = TechType::Fttp;
    fttp.address1 = format!("{page} Fibre St");

    let mut wireless = Place::new(id("fw"), center.lat, center.lng + offset);
    wireless.tech_type = TechType::Wireless;
    wireless.address1 = format!("{page} Tower Rd");

    vec![fttp, wireless]
}

#[async_trait]
impl PremisesApi for FakeApi {
    async fn fetch_page(
        &self,
        geo_box: &GeoBox,
        page: u32,
        proceed: Proceed<'_>,
    ) -> Result<ApiPage, SourceError> {
        if !proceed() {
            return Err(SourceError::Stale {
                box_label: geo_box.center_label(),
            });
        }

        let stored_before = match &self.store {
            Some(store) => store.count().await.unwrap_or_default(),
            None => 0,
        };
        self.calls.lock().unwrap().push(Call {
            key: geo_box.key,
            page,
            stored_before,
        });

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&geo_box.key) {
            return Err(SourceError::Status {
                status: 503,
                url: format!("fake://{}", geo_box.center_label()),
            });
        }

        let next_page = match self.pages {
            Some(last) if page >= last => None,
            _ => Some(page + 1),
        };
        Ok(ApiPage {
            places: page_places(geo_box, page),
            next_page,
        })
    }
}

/// Three rows by two columns of boxes over Sydney's lower north shore at
/// zoom 15. Every box centre lies strictly inside the view.
pub fn sydney() -> Viewport {
    Viewport::from_bounds(Bounds::new(-33.80, -33.86, 151.23, 151.17).unwrap(), 15)
}

/// [`sydney`] shifted one column east; shares one column of boxes.
pub fn sydney_east() -> Viewport {
    Viewport::from_bounds(Bounds::new(-33.80, -33.86, 151.27, 151.21).unwrap(), 15)
}

/// One row by two columns, far from [`sydney`].
pub fn melbourne() -> Viewport {
    Viewport::from_bounds(Bounds::new(-37.80, -37.82, 144.99, 144.93).unwrap(), 15)
}

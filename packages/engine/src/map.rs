//! The map session a front-end drives.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tech_map_geo::{Bounds, LatLng, Viewport};
use tech_map_mode::{ModeClassifier, ModeId};
use tech_map_place_models::{LegendItem, PlaceDetail};
use tech_map_points::popup::{self, Popup};
use tech_map_points::{AggregatePoint, Marker, MarkerLayer, PointAggregator, cluster, legend};
use tech_map_source::PremisesApi;
use tech_map_store::PlaceStore;
use tech_map_store::session::SessionState;
use tokio::sync::{mpsc, watch};

use crate::EngineError;
use crate::config::EngineConfig;
use crate::coordinator::{FetchCoordinator, PlanOutcome, Shared};
use crate::events::{MapSignal, emit};
use crate::progress::{ProgressFactory, ProgressItem, null_factory};
use crate::viewport::{self, ViewportState};

/// Pixel size used to project a remembered centre and zoom.
pub const DEFAULT_VIEW_SIZE: (u32, u32) = (1280, 800);

/// Builds a [`TechMap`].
pub struct TechMapBuilder {
    config: EngineConfig,
    api: Arc<dyn PremisesApi>,
    store: Arc<dyn PlaceStore>,
    layer: Arc<dyn MarkerLayer>,
    session: SessionState,
    session_path: Option<PathBuf>,
    viewport: Option<Viewport>,
    view_size: (u32, u32),
    debug: bool,
    progress_factory: ProgressFactory,
}

impl TechMapBuilder {
    /// Starts from `session` instead of the default view.
    #[must_use]
    pub fn session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }

    /// Resumes the session stored at `path`, if any, and writes it back
    /// there on every viewport change and mode switch.
    #[must_use]
    pub fn session_path(mut self, path: PathBuf) -> Self {
        match SessionState::load(&path) {
            Ok(Some(session)) => {
                log::debug!("Resuming session from {}", path.display());
                self.session = session;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read session {}: {e}", path.display()),
        }
        self.session_path = Some(path);
        self
    }

    /// Centre and zoom the map will start at, unless a viewport is set.
    #[must_use]
    pub const fn current_position(&self) -> (LatLng, u8) {
        (self.session.center, self.session.zoom)
    }

    /// Overrides the session's centre and zoom.
    #[must_use]
    pub const fn position(mut self, center: LatLng, zoom: u8) -> Self {
        self.session.center = center;
        self.session.zoom = zoom;
        self
    }

    /// Overrides the session's mode.
    #[must_use]
    pub fn mode(mut self, mode: ModeId) -> Self {
        self.session.mode = mode.to_string();
        self
    }

    /// Starts at exactly `viewport`, ignoring the session's centre and zoom.
    #[must_use]
    pub const fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    #[must_use]
    pub const fn view_size(mut self, width_px: u32, height_px: u32) -> Self {
        self.view_size = (width_px, height_px);
        self
    }

    /// Attaches raw records to detail views.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn progress_factory(mut self, factory: ProgressFactory) -> Self {
        self.progress_factory = factory;
        self
    }

    /// Builds the session and the receiving end of its signals.
    ///
    /// # Errors
    ///
    /// * If the configured grid is invalid
    /// * If the session's centre cannot be projected
    pub fn build(self) -> Result<(TechMap, mpsc::UnboundedReceiver<MapSignal>), EngineError> {
        let mode = self.session.mode.parse::<ModeId>().unwrap_or_else(|_| {
            log::warn!("Unknown mode {:?} in session, using all", self.session.mode);
            ModeId::default()
        });
        let start = match self.viewport {
            Some(viewport) => viewport,
            None => Viewport::from_center(
                self.session.center,
                self.session.zoom,
                self.view_size.0,
                self.view_size.1,
            )?,
        };

        let classifier = tech_map_mode::for_id(mode, self.debug);
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let shared = Shared {
            api: self.api,
            store: self.store,
            aggregator: Arc::new(tokio::sync::Mutex::new(PointAggregator::new(
                self.layer.clone(),
            ))),
            classifier: Arc::new(RwLock::new(classifier)),
            signals: signal_tx,
        };

        let (viewport_tx, viewport_rx) = viewport::channel(start);
        let coordinator = FetchCoordinator::new(&self.config, shared.clone(), viewport_rx)?
            .with_progress_factory(self.progress_factory);

        Ok((
            TechMap {
                config: self.config,
                debug: self.debug,
                view_size: self.view_size,
                shared,
                layer: self.layer,
                viewport_tx,
                coordinator: Arc::new(coordinator),
                session_path: self.session_path,
                geolocate: Mutex::new(self.session.geolocate),
            },
            signals,
        ))
    }
}

/// One map: its viewport, its mode and the points fetched for them.
pub struct TechMap {
    config: EngineConfig,
    debug: bool,
    view_size: (u32, u32),
    shared: Shared,
    layer: Arc<dyn MarkerLayer>,
    viewport_tx: watch::Sender<ViewportState>,
    coordinator: Arc<FetchCoordinator>,
    session_path: Option<PathBuf>,
    geolocate: Mutex<bool>,
}

impl std::fmt::Debug for TechMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TechMap")
            .field("viewport", &self.viewport())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl TechMap {
    #[must_use]
    pub fn builder(
        config: EngineConfig,
        api: Arc<dyn PremisesApi>,
        store: Arc<dyn PlaceStore>,
        layer: Arc<dyn MarkerLayer>,
    ) -> TechMapBuilder {
        TechMapBuilder {
            config,
            api,
            store,
            layer,
            session: SessionState::default(),
            session_path: None,
            viewport: None,
            view_size: DEFAULT_VIEW_SIZE,
            debug: false,
            progress_factory: null_factory(),
        }
    }

    /// Waits for the place store, wires up popups and fetches the first
    /// view.
    ///
    /// # Errors
    ///
    /// * [`EngineError::StoreInit`] if the store is not ready in time
    pub async fn start(&self) -> Result<PlanOutcome, EngineError> {
        self.shared
            .store
            .wait_until_ready(self.config.store_ready_timeout())
            .await
            .map_err(|e| {
                log::error!("Place store unavailable: {e}");
                EngineError::StoreInit(e)
            })?;

        self.layer
            .set_mode_handler(self.classifier(), self.shared.store.clone());
        log::info!("Map started at {}", self.viewport_state().epoch());

        Ok(self.plan().await)
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport_tx.borrow().viewport
    }

    fn viewport_state(&self) -> ViewportState {
        *self.viewport_tx.borrow()
    }

    #[must_use]
    pub fn mode(&self) -> ModeId {
        self.classifier().id()
    }

    #[must_use]
    pub fn classifier(&self) -> Arc<dyn ModeClassifier> {
        self.shared.classifier()
    }

    #[must_use]
    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Moves the map, prunes far-away markers and fetches what is missing.
    pub async fn set_viewport(&self, viewport: Viewport) -> PlanOutcome {
        self.viewport_tx.send_modify(|s| s.viewport = viewport);
        self.refresh_markers(&viewport.bounds).await;
        self.save_session();
        self.plan().await
    }

    /// Moves the map to `center` at `zoom` using the configured view size.
    ///
    /// # Errors
    ///
    /// * If `center` is not a finite coordinate
    pub async fn pan_to(&self, center: LatLng, zoom: u8) -> Result<PlanOutcome, EngineError> {
        let (width, height) = self.view_size;
        let viewport = Viewport::from_center(center, zoom, width, height)?;
        Ok(self.set_viewport(viewport).await)
    }

    /// Switches the classification mode.
    ///
    /// Everything fetched so far is dropped from the map and the current
    /// view is planned again under the new mode.
    pub async fn switch_mode(&self, id: ModeId) -> PlanOutcome {
        log::info!("Switching to mode {id} ({})", id.display_name());
        let classifier = tech_map_mode::for_id(id, self.debug);

        *self
            .shared
            .classifier
            .write()
            .unwrap_or_else(PoisonError::into_inner) = classifier.clone();
        self.viewport_tx.send_modify(|s| s.mode_generation += 1);
        self.coordinator.reset_tracking();
        self.shared.aggregator.lock().await.reset_all();
        self.layer
            .set_mode_handler(classifier, self.shared.store.clone());

        emit(&self.shared.signals, MapSignal::ModeChanged(id));
        self.save_session();
        self.plan().await
    }

    async fn plan(&self) -> PlanOutcome {
        let outcome = self.coordinator.plan_fetch().await;
        emit(&self.shared.signals, MapSignal::LegendUpdated(self.legend()));
        outcome
    }

    /// Drops markers outside the padded view and puts back any aggregated
    /// point inside it that an earlier prune removed.
    async fn refresh_markers(&self, bounds: &Bounds) {
        let padded = bounds.pad(self.config.marker_padding);
        self.layer.remove_markers_outside_bounds(&padded);

        let near: BTreeMap<String, AggregatePoint> = {
            let aggregator = self.shared.aggregator.lock().await;
            aggregator
                .points()
                .filter(|p| padded.contains(p.position()))
                .map(|p| (p.key(), p.clone()))
                .collect()
        };
        if !near.is_empty() {
            self.layer.add_points(&near);
        }
    }

    /// Legend rows for the current mode with counts of the markers in view.
    #[must_use]
    pub fn legend(&self) -> Vec<LegendItem> {
        legend::count_markers(self.classifier().legend_entries(), &self.markers_in_view())
    }

    #[must_use]
    pub fn markers_in_view(&self) -> Vec<Marker> {
        self.layer
            .get_markers_within_bounds(&self.viewport().bounds)
    }

    /// Clustering radius for the current zoom.
    #[must_use]
    pub fn cluster_radius(&self) -> u32 {
        cluster::cluster_radius(self.viewport().zoom)
    }

    /// Colour mix of everything in view, as one cluster.
    #[must_use]
    pub fn view_cluster(&self) -> cluster::ClusterIcon {
        cluster::cluster_icon(&self.markers_in_view())
    }

    pub async fn point(&self, key: &str) -> Option<AggregatePoint> {
        self.shared.aggregator.lock().await.get(key).cloned()
    }

    /// Popup for the point at `key`.
    ///
    /// # Errors
    ///
    /// * If reading the members from the store fails
    pub async fn popup(&self, key: &str) -> Result<Option<Popup>, EngineError> {
        let Some(point) = self.point(key).await else {
            return Ok(None);
        };
        let classifier = self.classifier();
        Ok(popup::build(&point, self.shared.store.as_ref(), classifier.as_ref()).await?)
    }

    /// Detail of a stored premise under the current mode.
    ///
    /// # Errors
    ///
    /// * If the store read fails
    pub async fn place_detail(&self, id: &str) -> Result<Option<PlaceDetail>, EngineError> {
        let place = self.shared.store.get_place(id).await?;
        Ok(place.map(|p| self.classifier().render_detail(&p)))
    }

    /// Running batches, plus finished ones younger than the progress
    /// expiry.
    #[must_use]
    pub fn progress(&self) -> Vec<ProgressItem> {
        let tracker = self.coordinator.progress();
        tracker.sweep(Utc::now(), self.config.progress_expiry());
        tracker.snapshot()
    }

    pub fn set_geolocate(&self, geolocate: bool) {
        *self.geolocate.lock().unwrap_or_else(PoisonError::into_inner) = geolocate;
        self.save_session();
    }

    /// What would be written to the session file now.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        let viewport = self.viewport();
        SessionState {
            center: viewport.center,
            zoom: viewport.zoom,
            mode: self.mode().to_string(),
            geolocate: *self.geolocate.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn save_session(&self) {
        let Some(path) = &self.session_path else {
            return;
        };
        if let Err(e) = self.session_state().save(path) {
            log::warn!("Failed to save session to {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tech_map_place_models::Place;
    use tech_map_points::MemoryMarkerLayer;
    use tech_map_store::StoreError;
    use tech_map_store::memory::MemoryPlaceStore;

    use super::*;
    use crate::testing::{FakeApi, melbourne, page_places, sydney};

    struct Fixture {
        api: Arc<FakeApi>,
        store: Arc<MemoryPlaceStore>,
        layer: Arc<MemoryMarkerLayer>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                api: Arc::new(FakeApi::new(1)),
                store: Arc::new(MemoryPlaceStore::new()),
                layer: Arc::new(MemoryMarkerLayer::new()),
            }
        }

        fn builder(&self) -> TechMapBuilder {
            TechMap::builder(
                EngineConfig::default(),
                self.api.clone(),
                self.store.clone(),
                self.layer.clone(),
            )
        }
    }

    fn count(legend: &[LegendItem], label: &str) -> u64 {
        legend
            .iter()
            .find(|item| item.label == label)
            .and_then(|item| item.count)
            .unwrap()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("tech_map_engine_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn start_fetches_view_and_counts_legend() {
        let f = Fixture::new();
        let (map, mut signals) = f.builder().viewport(sydney()).build().unwrap();

        let outcome = map.start().await.unwrap();

        assert!(matches!(outcome, PlanOutcome::Batch(ref r) if r.fetched == 6));
        assert_eq!(f.store.count().await.unwrap(), 12);
        let legend = map.legend();
        assert_eq!(count(&legend, "FTTP"), 6);
        assert_eq!(count(&legend, "FW"), 6);
        assert_eq!(count(&legend, "HFC"), 0);

        let mut last_legend = None;
        while let Ok(signal) = signals.try_recv() {
            if let MapSignal::LegendUpdated(items) = signal {
                last_legend = Some(items);
            }
        }
        assert_eq!(last_legend, Some(legend));
    }

    #[tokio::test]
    async fn switch_mode_reclassifies_without_network() {
        let f = Fixture::new();
        let (map, _signals) = f.builder().viewport(sydney()).build().unwrap();
        map.start().await.unwrap();

        let outcome = map.switch_mode(ModeId::Fw).await;

        assert!(matches!(outcome, PlanOutcome::Batch(ref r) if r.replayed == 6));
        assert_eq!(f.api.call_count(), 6);
        assert_eq!(map.mode(), ModeId::Fw);
        assert_eq!(map.markers_in_view().len(), 6);
        let legend = map.legend();
        assert_eq!(legend.iter().filter_map(|i| i.count).sum::<u64>(), 6);
    }

    #[tokio::test]
    async fn far_markers_are_pruned_and_restored() {
        let f = Fixture::new();
        let (map, _signals) = f.builder().viewport(sydney()).build().unwrap();
        map.start().await.unwrap();
        assert_eq!(f.layer.len(), 12);

        map.set_viewport(melbourne()).await;
        assert_eq!(f.layer.len(), 4);

        // Sydney boxes are still fetched, so coming back needs no request.
        let calls = f.api.call_count();
        let outcome = map.set_viewport(sydney()).await;
        assert_eq!(outcome, PlanOutcome::NothingToFetch);
        assert_eq!(f.api.call_count(), calls);
        assert_eq!(map.markers_in_view().len(), 12);
    }

    #[tokio::test]
    async fn zoomed_out_view_signals_zoom_in() {
        let f = Fixture::new();
        let (map, mut signals) = f.builder().build().unwrap();

        let outcome = map.start().await.unwrap();

        assert!(matches!(outcome, PlanOutcome::ZoomTooLow { zoom: 10, .. }));
        assert_eq!(
            signals.try_recv().unwrap(),
            MapSignal::ZoomInRequired {
                zoom: 10,
                min_zoom: 11
            }
        );
        assert_eq!(f.api.call_count(), 0);
    }

    #[tokio::test]
    async fn popup_and_detail_come_from_the_store() {
        let f = Fixture::new();
        let (map, _signals) = f.builder().viewport(sydney()).build().unwrap();
        map.start().await.unwrap();

        let geo_box = tech_map_geo::tiler::tile(&sydney().bounds, map.coordinator().grid())[0];
        let fttp = &page_places(&geo_box, 1)[0];
        let key = tech_map_points::point_key(fttp.latitude, fttp.longitude);

        assert!(matches!(map.popup(&key).await.unwrap(), Some(Popup::Single(_))));
        let detail = map.place_detail(&fttp.id).await.unwrap().unwrap();
        assert_eq!(detail.sections[0].fields[0].1, "FTTP");
        assert!(map.place_detail("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_is_resumed_and_saved() {
        let dir = temp_dir("session");
        let path = dir.join("session.json");
        SessionState {
            center: sydney().center,
            zoom: 15,
            mode: "fw".to_owned(),
            geolocate: true,
        }
        .save(&path)
        .unwrap();

        let f = Fixture::new();
        let (map, _signals) = f.builder().session_path(path.clone()).build().unwrap();
        assert_eq!(map.mode(), ModeId::Fw);
        assert_eq!(map.viewport().zoom, 15);

        map.switch_mode(ModeId::Ee).await;
        let saved = SessionState::load(&path).unwrap().unwrap();
        assert_eq!(saved.mode, "ee");
        assert!(saved.geolocate);

        map.set_viewport(melbourne()).await;
        let saved = SessionState::load(&path).unwrap().unwrap();
        assert_eq!(saved.center, melbourne().center);

        cleanup(&dir);
    }

    struct NeverReady;

    #[async_trait::async_trait]
    impl PlaceStore for NeverReady {
        fn is_ready(&self) -> bool {
            false
        }

        async fn store_places(&self, _places: &[Place]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_places(&self, _ids: &[String]) -> Result<Vec<Place>, StoreError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unready_store_fails_start() {
        let f = Fixture::new();
        let config = EngineConfig {
            store_ready_timeout_secs: 0,
            ..EngineConfig::default()
        };
        let (map, _signals) =
            TechMap::builder(config, f.api.clone(), Arc::new(NeverReady), f.layer.clone())
                .viewport(sydney())
                .build()
                .unwrap();

        let err = map.start().await.unwrap_err();

        assert!(matches!(err, EngineError::StoreInit(_)));
        assert_eq!(f.api.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_session_mode_falls_back_to_all() {
        let f = Fixture::new();
        let session = SessionState {
            mode: "satellite".to_owned(),
            ..SessionState::default()
        };
        let (map, _signals) = f.builder().session(session).build().unwrap();
        assert_eq!(map.mode(), ModeId::All);
    }

    #[tokio::test]
    async fn cluster_radius_follows_zoom() {
        let f = Fixture::new();
        let (map, _signals) = f.builder().viewport(sydney()).build().unwrap();
        assert_eq!(map.cluster_radius(), 0);

        map.pan_to(sydney().center, 14).await.unwrap();
        assert_eq!(map.cluster_radius(), 100);
    }

    #[tokio::test]
    async fn finished_progress_expires_without_a_new_batch() {
        let f = Fixture::new();
        let config = EngineConfig {
            progress_expiry_secs: 0,
            ..EngineConfig::default()
        };
        let (map, _signals) =
            TechMap::builder(config, f.api.clone(), f.store.clone(), f.layer.clone())
                .viewport(sydney())
                .build()
                .unwrap();
        map.start().await.unwrap();

        assert!(map.progress().is_empty());
        assert_eq!(map.coordinator().progress().snapshot().len(), 0);
    }

    #[tokio::test]
    async fn finished_progress_stays_until_expiry() {
        let f = Fixture::new();
        let (map, _signals) = f.builder().viewport(sydney()).build().unwrap();
        map.start().await.unwrap();

        let items = map.progress();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_done());
    }
}

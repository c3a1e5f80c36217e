//! Turns the current viewport into box fetches.
//!
//! A plan tiles the (optionally padded) viewport, drops boxes already
//! fetched under the current mode and walks the rest one box at a time.
//! Each box is paginated sequentially; every page is persisted before it
//! is aggregated and before the next page is requested.
//!
//! Results are checked against the latest viewport at three points: before
//! each box, when a page request is issued and when its response arrives.
//! Anything that no longer matches is dropped as stale, without touching
//! the store, the aggregator or the fetched-box set.
//!
//! Only one batch runs at a time. A plan started while another batch is
//! running waits for it to finish or to abandon itself at its next box,
//! then tiles against the fetched-box set as it stands, so a box that was
//! in flight is never requested twice.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tech_map_geo::{BoxKey, GeoBox, GridSpec, tiler};
use tech_map_mode::ModeClassifier;
use tech_map_place_models::Place;
use tech_map_points::PointAggregator;
use tech_map_source::{PremisesApi, SourceError};
use tech_map_store::PlaceStore;
use tokio::sync::watch;

use crate::config::{EngineConfig, ModeSwitchStrategy};
use crate::events::{MapSignal, SignalSender, emit};
use crate::progress::{ProgressFactory, ProgressTracker, null_factory};
use crate::viewport::{EpochKey, ViewportState};
use crate::EngineError;

/// Collaborators shared between the coordinator and the map session.
#[derive(Clone)]
pub struct Shared {
    pub api: Arc<dyn PremisesApi>,
    pub store: Arc<dyn PlaceStore>,
    pub aggregator: Arc<tokio::sync::Mutex<PointAggregator>>,
    /// The active mode. Swapped wholesale on a mode switch.
    pub classifier: Arc<RwLock<Arc<dyn ModeClassifier>>>,
    pub signals: SignalSender,
}

impl Shared {
    /// Snapshot of the active classifier.
    #[must_use]
    pub fn classifier(&self) -> Arc<dyn ModeClassifier> {
        self.classifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Counts for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub epoch: EpochKey,
    /// Boxes the batch set out to fetch.
    pub total: usize,
    /// Boxes loaded from the API.
    pub fetched: usize,
    /// Boxes replayed from the place store.
    pub replayed: usize,
    pub failed: usize,
    pub stale: usize,
    /// The viewport changed before every box was attempted.
    pub aborted: bool,
}

impl BatchReport {
    const fn new(epoch: EpochKey, total: usize) -> Self {
        Self {
            epoch,
            total,
            fetched: 0,
            replayed: 0,
            failed: 0,
            stale: 0,
            aborted: false,
        }
    }

    /// Boxes that ended up marked fetched.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.fetched + self.replayed
    }
}

/// What a call to [`FetchCoordinator::plan_fetch`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Zoomed out below the minimum; nothing was requested.
    ZoomTooLow { zoom: u8, min_zoom: u8 },
    /// More boxes than allowed; nothing was requested.
    TooManyBoxes { count: usize, max: usize },
    /// Every box in view was already fetched.
    NothingToFetch,
    Batch(BatchReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxSource {
    Network { pages: u32, places: usize },
    Replay { places: usize },
}

/// Plans and runs box fetches for the current viewport.
pub struct FetchCoordinator {
    grid: GridSpec,
    min_zoom: u8,
    max_boxes: usize,
    max_pages: u32,
    page_timeout: Duration,
    fetch_padding: f64,
    store_ready_timeout: Duration,
    progress_expiry: Duration,
    strategy: ModeSwitchStrategy,
    shared: Shared,
    viewport: watch::Receiver<ViewportState>,
    fetched: Mutex<HashSet<BoxKey>>,
    /// Held for the whole of a plan.
    batch: tokio::sync::Mutex<()>,
    /// Ids persisted for each completely fetched box, across modes.
    box_index: Mutex<HashMap<BoxKey, Vec<String>>>,
    progress: ProgressTracker,
    progress_factory: ProgressFactory,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("grid", &self.grid)
            .field("strategy", &self.strategy)
            .field("fetched", &self.fetched_count())
            .finish_non_exhaustive()
    }
}

fn stale(geo_box: &GeoBox) -> EngineError {
    SourceError::Stale {
        box_label: geo_box.center_label(),
    }
    .into()
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl FetchCoordinator {
    /// Creates a coordinator reading viewport changes from `viewport`.
    ///
    /// # Errors
    ///
    /// * If the configured grid is invalid
    pub fn new(
        config: &EngineConfig,
        shared: Shared,
        viewport: watch::Receiver<ViewportState>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            grid: config.grid()?,
            min_zoom: config.min_zoom,
            max_boxes: config.max_boxes,
            max_pages: config.max_pages_per_box.max(1),
            page_timeout: config.page_timeout(),
            fetch_padding: config.fetch_padding,
            store_ready_timeout: config.store_ready_timeout(),
            progress_expiry: config.progress_expiry(),
            strategy: config.mode_switch,
            shared,
            viewport,
            fetched: Mutex::new(HashSet::new()),
            batch: tokio::sync::Mutex::new(()),
            box_index: Mutex::new(HashMap::new()),
            progress: ProgressTracker::new(),
            progress_factory: null_factory(),
        })
    }

    /// Uses `factory` for live per-batch progress indicators.
    #[must_use]
    pub fn with_progress_factory(mut self, factory: ProgressFactory) -> Self {
        self.progress_factory = factory;
        self
    }

    #[must_use]
    pub const fn grid(&self) -> &GridSpec {
        &self.grid
    }

    #[must_use]
    pub const fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    #[must_use]
    pub fn is_fetched(&self, key: BoxKey) -> bool {
        self.lock_fetched().contains(&key)
    }

    #[must_use]
    pub fn fetched_count(&self) -> usize {
        self.lock_fetched().len()
    }

    /// Forgets which boxes were fetched. Called after a mode switch has
    /// bumped the generation.
    pub fn reset_tracking(&self) {
        let mut fetched = self.lock_fetched();
        log::debug!("Resetting {} fetched boxes", fetched.len());
        fetched.clear();
    }

    /// Forgets the per-box id index, so every box is fetched from the API
    /// again. Use after clearing the store.
    pub fn forget_index(&self) {
        self.lock_index().clear();
    }

    /// Plans and runs the fetch for the current viewport.
    ///
    /// Never fails: box errors are logged and counted in the report, and
    /// the failed boxes stay eligible for the next plan. Waits for a
    /// running batch first.
    pub async fn plan_fetch(&self) -> PlanOutcome {
        let _batch = self.batch.lock().await;
        let state = *self.viewport.borrow();
        let zoom = state.viewport.zoom;

        if zoom < self.min_zoom {
            log::warn!("Zoom {zoom} is below {}, not fetching", self.min_zoom);
            emit(
                &self.shared.signals,
                MapSignal::ZoomInRequired {
                    zoom,
                    min_zoom: self.min_zoom,
                },
            );
            return PlanOutcome::ZoomTooLow {
                zoom,
                min_zoom: self.min_zoom,
            };
        }

        let bounds = state.bounds().pad(self.fetch_padding);
        let remaining: Vec<GeoBox> = {
            let fetched = self.lock_fetched();
            tiler::tile(&bounds, &self.grid)
                .into_iter()
                .filter(|b| !fetched.contains(&b.key))
                .collect()
        };

        if remaining.is_empty() {
            log::debug!("Every box in {bounds} is already fetched");
            emit(&self.shared.signals, MapSignal::ZoomWarningCleared);
            return PlanOutcome::NothingToFetch;
        }

        if remaining.len() > self.max_boxes {
            log::warn!(
                "{} boxes needed for {bounds}, limit is {}, not fetching",
                remaining.len(),
                self.max_boxes
            );
            emit(
                &self.shared.signals,
                MapSignal::TooManyBoxes {
                    count: remaining.len(),
                    max: self.max_boxes,
                },
            );
            return PlanOutcome::TooManyBoxes {
                count: remaining.len(),
                max: self.max_boxes,
            };
        }

        emit(&self.shared.signals, MapSignal::ZoomWarningCleared);
        PlanOutcome::Batch(self.run_batch(&state, &remaining).await)
    }

    async fn run_batch(&self, state: &ViewportState, boxes: &[GeoBox]) -> BatchReport {
        let epoch = state.epoch();
        let total = boxes.len();
        let classifier = self.shared.classifier();
        let text = format!("Loading {total} areas");

        self.progress.sweep(Utc::now(), self.progress_expiry);
        self.progress.begin(&epoch, &text, as_u64(total));
        let bar = (self.progress_factory)(&text, as_u64(total));

        log::info!(
            "Fetching {total} boxes for {epoch} in {} mode",
            classifier.id()
        );
        emit(
            &self.shared.signals,
            MapSignal::FetchStarted {
                epoch: epoch.clone(),
                total,
            },
        );

        let mut report = BatchReport::new(epoch.clone(), total);

        for geo_box in boxes {
            if self.current_epoch() != epoch {
                log::debug!("Viewport moved, abandoning batch {epoch}");
                report.aborted = true;
                break;
            }

            let label = geo_box.center_label();
            bar.box_started(&label);
            match self.fetch_box(geo_box, &epoch, classifier.as_ref()).await {
                Ok(BoxSource::Network { pages, places }) => {
                    log::debug!("Box {label}: {places} premises over {pages} pages");
                    report.fetched += 1;
                }
                Ok(BoxSource::Replay { places }) => {
                    log::debug!("Box {label}: replayed {places} premises from the store");
                    report.replayed += 1;
                }
                Err(e) if e.is_stale() => {
                    log::debug!("Discarding box {label}: {e}");
                    report.stale += 1;
                }
                Err(e) => {
                    log::error!("Failed to fetch box {label}: {e}");
                    report.failed += 1;
                }
            }

            bar.box_done();
            if let Some(item) = self.progress.advance(&epoch) {
                emit(&self.shared.signals, MapSignal::ProgressUpdated(item));
            }
        }

        if report.aborted {
            self.progress.remove(&epoch);
            bar.abandon();
        } else {
            self.progress.finish(&epoch);
            bar.finish(&format!("Loaded {} of {total} areas", report.completed()));
        }

        log::info!(
            "Batch {epoch}: {} fetched, {} replayed, {} failed, {} stale{}",
            report.fetched,
            report.replayed,
            report.failed,
            report.stale,
            if report.aborted { ", aborted" } else { "" }
        );
        emit(&self.shared.signals, MapSignal::FetchFinished(report.clone()));

        report
    }

    async fn fetch_box(
        &self,
        geo_box: &GeoBox,
        epoch: &EpochKey,
        classifier: &dyn ModeClassifier,
    ) -> Result<BoxSource, EngineError> {
        if self.strategy == ModeSwitchStrategy::Reclassify
            && let Some(ids) = self.indexed_ids(geo_box.key)
            && let Some(source) = self.replay_box(geo_box, epoch, &ids, classifier).await?
        {
            return Ok(source);
        }

        let proceed = || self.still_wanted(geo_box, epoch);
        let mut page = 1;
        let mut pages = 0;
        let mut ids: Vec<String> = Vec::new();

        loop {
            let response = tokio::time::timeout(
                self.page_timeout,
                self.shared.api.fetch_page(geo_box, page, &proceed),
            )
            .await
            .map_err(|_| SourceError::Timeout {
                seconds: self.page_timeout.as_secs(),
            })??;

            if !proceed() {
                return Err(stale(geo_box));
            }

            self.persist(&response.places).await?;
            self.aggregate(geo_box, &response.places, epoch, classifier)
                .await?;
            ids.extend(response.places.iter().map(|p| p.id.clone()));
            pages += 1;

            log::debug!(
                "Box {} page {page}: {} premises",
                geo_box.center_label(),
                response.places.len()
            );

            match response.next_page {
                None => break,
                Some(_) if pages >= self.max_pages => {
                    log::warn!(
                        "Box {} still has pages after {pages}, stopping at the ceiling",
                        geo_box.center_label()
                    );
                    break;
                }
                Some(next) => page = next,
            }
        }

        ids.sort_unstable();
        ids.dedup();
        let places = ids.len();
        self.lock_index().insert(geo_box.key, ids);
        self.mark_fetched(geo_box, epoch)?;

        Ok(BoxSource::Network { pages, places })
    }

    /// Re-runs a box's stored premises through `classifier`.
    ///
    /// Returns `Ok(None)` if the store lost any of them, in which case the
    /// box has to come from the API.
    async fn replay_box(
        &self,
        geo_box: &GeoBox,
        epoch: &EpochKey,
        ids: &[String],
        classifier: &dyn ModeClassifier,
    ) -> Result<Option<BoxSource>, EngineError> {
        self.shared
            .store
            .wait_until_ready(self.store_ready_timeout)
            .await?;
        let places = self.shared.store.get_places(ids).await?;

        if places.len() < ids.len() {
            log::debug!(
                "Only {} of {} premises of box {} are left in the store",
                places.len(),
                ids.len(),
                geo_box.center_label()
            );
            self.lock_index().remove(&geo_box.key);
            return Ok(None);
        }

        if !self.still_wanted(geo_box, epoch) {
            return Err(stale(geo_box));
        }

        self.aggregate(geo_box, &places, epoch, classifier).await?;
        self.mark_fetched(geo_box, epoch)?;

        Ok(Some(BoxSource::Replay {
            places: places.len(),
        }))
    }

    async fn persist(&self, places: &[Place]) -> Result<(), EngineError> {
        if places.is_empty() {
            return Ok(());
        }
        self.shared
            .store
            .wait_until_ready(self.store_ready_timeout)
            .await?;
        self.shared.store.store_places(places).await?;
        Ok(())
    }

    async fn aggregate(
        &self,
        geo_box: &GeoBox,
        places: &[Place],
        epoch: &EpochKey,
        classifier: &dyn ModeClassifier,
    ) -> Result<(), EngineError> {
        let mut aggregator = self.shared.aggregator.lock().await;
        // A mode switch resets the aggregator after bumping the generation.
        if self.current_generation() != epoch.mode_generation {
            return Err(stale(geo_box));
        }
        aggregator.add_premises(places, classifier);
        Ok(())
    }

    fn mark_fetched(&self, geo_box: &GeoBox, epoch: &EpochKey) -> Result<(), EngineError> {
        let mut fetched = self.lock_fetched();
        if self.current_generation() != epoch.mode_generation {
            return Err(stale(geo_box));
        }
        fetched.insert(geo_box.key);
        Ok(())
    }

    /// Whether `geo_box` still matters to the latest viewport and mode.
    fn still_wanted(&self, geo_box: &GeoBox, epoch: &EpochKey) -> bool {
        let state = self.viewport.borrow();
        state.mode_generation == epoch.mode_generation
            && state
                .bounds()
                .pad(self.fetch_padding)
                .intersects(&geo_box.bounds)
    }

    fn current_epoch(&self) -> EpochKey {
        self.viewport.borrow().epoch()
    }

    fn current_generation(&self) -> u64 {
        self.viewport.borrow().mode_generation
    }

    fn indexed_ids(&self, key: BoxKey) -> Option<Vec<String>> {
        self.lock_index().get(&key).cloned()
    }

    fn lock_fetched(&self) -> MutexGuard<'_, HashSet<BoxKey>> {
        self.fetched.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_index(&self) -> MutexGuard<'_, HashMap<BoxKey, Vec<String>>> {
        self.box_index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

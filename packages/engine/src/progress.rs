//! Progress of fetch batches.
//!
//! Two layers: [`ProgressTracker`] keeps one [`ProgressItem`] per batch
//! epoch for anything that wants to show or inspect it, and
//! [`ProgressCallback`] decouples live rendering (an `indicatif` bar in
//! the CLI, nothing in tests) from the engine.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::viewport::EpochKey;

/// Live view of one running batch, driven box by box.
pub trait ProgressCallback: Send + Sync {
    /// `label` is the box about to be fetched.
    fn box_started(&self, label: &str);

    fn box_done(&self);

    /// The batch walked every box; `summary` replaces the box label.
    fn finish(&self, summary: &str);

    /// The batch was abandoned for a newer viewport.
    fn abandon(&self);
}

/// Renders nothing.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn box_started(&self, _label: &str) {}
    fn box_done(&self) {}
    fn finish(&self, _summary: &str) {}
    fn abandon(&self) {}
}

/// Creates the live indicator for a batch from its label and box count.
pub type ProgressFactory = Arc<dyn Fn(&str, u64) -> Arc<dyn ProgressCallback> + Send + Sync>;

/// A factory that renders nothing.
#[must_use]
pub fn null_factory() -> ProgressFactory {
    Arc::new(|_, _| Arc::new(NullProgress))
}

/// Progress of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressItem {
    pub started_at: DateTime<Utc>,
    /// Set once the batch finishes, early or not.
    pub finished_at: Option<DateTime<Utc>>,
    pub text: String,
    pub completed: u64,
    pub total: u64,
}

impl ProgressItem {
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Completed share in `0.0..=1.0`; an empty batch counts as complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Per-epoch progress items.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    items: Mutex<BTreeMap<EpochKey, ProgressItem>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `epoch`, replacing any earlier item for it.
    pub fn begin(&self, epoch: &EpochKey, text: impl Into<String>, total: u64) -> ProgressItem {
        let item = ProgressItem {
            started_at: Utc::now(),
            finished_at: None,
            text: text.into(),
            completed: 0,
            total,
        };
        self.lock().insert(epoch.clone(), item.clone());
        item
    }

    /// Counts one more finished unit of `epoch`.
    pub fn advance(&self, epoch: &EpochKey) -> Option<ProgressItem> {
        let mut items = self.lock();
        let item = items.get_mut(epoch)?;
        item.completed = (item.completed + 1).min(item.total);
        Some(item.clone())
    }

    /// Marks `epoch` finished. It stays visible until swept.
    pub fn finish(&self, epoch: &EpochKey) -> Option<ProgressItem> {
        let mut items = self.lock();
        let item = items.get_mut(epoch)?;
        item.finished_at = Some(Utc::now());
        Some(item.clone())
    }

    /// Drops `epoch` immediately.
    pub fn remove(&self, epoch: &EpochKey) -> Option<ProgressItem> {
        self.lock().remove(epoch)
    }

    /// Drops finished items older than `expiry` as of `now`. Returns how
    /// many were removed.
    pub fn sweep(&self, now: DateTime<Utc>, expiry: Duration) -> usize {
        let expiry = chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::MAX);
        let mut items = self.lock();
        let before = items.len();
        items.retain(|_, item| item.finished_at.is_none_or(|at| now - at < expiry));
        before - items.len()
    }

    #[must_use]
    pub fn get(&self, epoch: &EpochKey) -> Option<ProgressItem> {
        self.lock().get(epoch).cloned()
    }

    /// Every tracked item, oldest epoch key first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProgressItem> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<EpochKey, ProgressItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

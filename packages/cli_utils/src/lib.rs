#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the tech map CLI.
//!
//! One `indicatif` bar per fetch batch, showing the box being loaded, and
//! a logger that shares the terminal with those bars through
//! `indicatif-log-bridge`.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tech_map_engine::progress::{ProgressCallback, ProgressFactory};

pub use indicatif::MultiProgress;

const BATCH_TEMPLATE: &str = "{prefix} {wide_bar:.green/dim} {pos}/{len} boxes [{elapsed_precise}] {msg}";

/// A fetch batch drawn as an `indicatif` bar.
///
/// The prefix holds the batch label; the message is the box in flight,
/// and is replaced by the summary when the batch ends.
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Adds a bar for a batch of `boxes` boxes to `multi`.
    #[must_use]
    pub fn batch(multi: &MultiProgress, label: &str, boxes: u64) -> Self {
        let style = ProgressStyle::with_template(BATCH_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = multi.add(ProgressBar::new(boxes).with_style(style));
        bar.set_prefix(label.to_owned());
        Self { bar }
    }

    /// A [`ProgressFactory`] that adds one [`Self::batch`] bar per fetch
    /// batch to `multi`.
    #[must_use]
    pub fn factory(multi: &MultiProgress) -> ProgressFactory {
        let multi = multi.clone();
        Arc::new(move |label: &str, boxes: u64| {
            Arc::new(Self::batch(&multi, label, boxes)) as Arc<dyn ProgressCallback>
        })
    }

    /// An indeterminate spinner, for waits such as the first map load.
    #[must_use]
    pub fn spinner(multi: &MultiProgress, message: &str) -> ProgressBar {
        let spinner = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_owned());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }

    /// The box currently shown, if any.
    #[must_use]
    pub fn current(&self) -> String {
        self.bar.message()
    }

    #[must_use]
    pub fn boxes_done(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressCallback for IndicatifProgress {
    fn box_started(&self, label: &str) {
        self.bar.set_message(format!("box {label}"));
    }

    fn box_done(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, summary: &str) {
        self.bar.finish_with_message(summary.to_owned());
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge` and returns the [`MultiProgress`] every bar has
/// to be added to.
///
/// Only the first call installs a logger; later calls just get a fresh
/// [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();
    let logger = pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .build();
    let max_level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}

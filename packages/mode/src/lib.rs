#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Display modes for the tech map.
//!
//! A mode decides which premises are shown, what colour each one gets and
//! how its detail and legend are described. Modes are stateless policy
//! objects behind the [`ModeClassifier`] trait so the active one can be
//! swapped at runtime.

pub mod detail;
pub mod modes;
pub mod predicates;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tech_map_place_models::{Color, LegendItem, Place, PlaceDetail};

pub use modes::{AllMode, EnterpriseEthernetMode, FixedWirelessMode, UpgradeMode};

/// Stable identifier of a display mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModeId {
    /// Every premise, coloured by technology.
    #[default]
    All,
    /// Premises with a planned or completed technology change.
    Upgrade,
    /// Enterprise Ethernet premises.
    Ee,
    /// Fixed-wireless premises.
    Fw,
}

impl ModeId {
    /// Every mode, in menu order.
    pub const ALL: [Self; 4] = [Self::All, Self::Upgrade, Self::Ee, Self::Fw];

    /// Human-readable menu label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::All => "Show All Locations",
            Self::Upgrade => "Technology Upgrades",
            Self::Ee => "Enterprise Ethernet",
            Self::Fw => "Fixed Wireless",
        }
    }
}

/// Classification policy for the active display mode.
///
/// Every method must be a pure function of its arguments.
pub trait ModeClassifier: Send + Sync + std::fmt::Debug {
    /// Which mode this is.
    fn id(&self) -> ModeId;

    /// Menu label.
    fn name(&self) -> &'static str {
        self.id().display_name()
    }

    /// Whether `place` is shown at all in this mode.
    fn filter(&self, place: &Place) -> bool;

    /// Colour of a single premise.
    fn color_for(&self, place: &Place) -> Color;

    /// Colour of a point; the first member stands in for the whole point.
    fn point_color(&self, members: &[Place]) -> Color {
        members
            .first()
            .map_or(Color::UNKNOWN, |first| self.color_for(first))
    }

    /// Structured detail for one premise.
    fn render_detail(&self, place: &Place) -> PlaceDetail;

    /// Short label for a point with one or more members.
    fn render_summary(&self, places: &[Place]) -> String {
        places
            .first()
            .map(|first| summary_label(first.address_label(), places.len()))
            .unwrap_or_default()
    }

    /// Legend rows for this mode, uncounted.
    fn legend_entries(&self) -> Vec<LegendItem>;
}

/// `"{first} ( + N more)"` for multi-member points, otherwise just the
/// first label.
#[must_use]
pub fn summary_label(first: &str, member_count: usize) -> String {
    if member_count > 1 {
        format!("{first} ( + {} more)", member_count - 1)
    } else {
        first.to_owned()
    }
}

/// Builds the classifier for `id`. With `debug` set, detail views carry
/// the raw record.
#[must_use]
pub fn for_id(id: ModeId, debug: bool) -> Arc<dyn ModeClassifier> {
    match id {
        ModeId::All => Arc::new(AllMode::new(debug)),
        ModeId::Upgrade => Arc::new(UpgradeMode::new(debug)),
        ModeId::Ee => Arc::new(EnterpriseEthernetMode::new(debug)),
        ModeId::Fw => Arc::new(FixedWirelessMode::new(debug)),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn mode_ids_round_trip_as_strings() {
        for id in ModeId::ALL {
            assert_eq!(ModeId::from_str(id.as_ref()).unwrap(), id);
        }
        assert_eq!(ModeId::Fw.to_string(), "fw");
        assert!(ModeId::from_str("nope").is_err());
    }

    #[test]
    fn for_id_builds_matching_classifier() {
        for id in ModeId::ALL {
            let mode = for_id(id, false);
            assert_eq!(mode.id(), id);
            assert!(!mode.legend_entries().is_empty());
        }
    }

    #[test]
    fn summary_counts_extra_members() {
        assert_eq!(summary_label("1 Main St", 1), "1 Main St");
        assert_eq!(summary_label("1 Main St", 3), "1 Main St ( + 2 more)");

        let mode = for_id(ModeId::All, false);
        let a = Place::new("A", 0.0, 0.0);
        let mut b = Place::new("B", 0.0, 0.0);
        b.address1 = "Unit 2".to_owned();
        assert_eq!(mode.render_summary(&[b, a]), "Unit 2 ( + 1 more)");
        assert_eq!(mode.render_summary(&[]), "");
    }
}

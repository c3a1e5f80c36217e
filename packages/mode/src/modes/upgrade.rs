//! Premises with a technology change, coloured by change status.

use tech_map_place_models::{Color, LegendItem, Place, PlaceDetail};

use crate::predicates::status;
use crate::{ModeClassifier, ModeId, detail};

const COMPLETE: Color = Color("#1D7044");
const AVAILABLE: Color = Color("#02B9E3");
const BUILD_FINALISED: Color = Color("#FFBE00");
const DESIGN: Color = Color("#FF7E01");
const COMMITTED: Color = Color("#E3071D");
const MDU_IN_BUILD: Color = Color("#022BE3");
const MDU_ELIGIBLE: Color = Color("#6B02E3");

/// Shows premises whose change status is anything but "Not Planned".
#[derive(Debug, Clone, Copy, Default)]
pub struct UpgradeMode {
    debug: bool,
}

impl UpgradeMode {
    /// Creates the mode.
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ModeClassifier for UpgradeMode {
    fn id(&self) -> ModeId {
        ModeId::Upgrade
    }

    fn filter(&self, place: &Place) -> bool {
        place
            .tech_change_status
            .as_deref()
            .is_some_and(|s| !s.is_empty() && s != status::NOT_PLANNED)
    }

    fn color_for(&self, place: &Place) -> Color {
        match place.change_status() {
            status::PREVIOUS_TECH_DISCONNECTED | status::NEW_TECH_CONNECTED => COMPLETE,
            status::IN_DESIGN => DESIGN,
            status::BUILD_FINALISED => BUILD_FINALISED,
            status::COMMITTED => COMMITTED,
            status::ELIGIBLE_TO_ORDER => AVAILABLE,
            status::MDU_ELIGIBLE_TO_APPLY => MDU_ELIGIBLE,
            status::MDU_IN_BUILD => MDU_IN_BUILD,
            _ => Color::UNKNOWN,
        }
    }

    fn render_detail(&self, place: &Place) -> PlaceDetail {
        let mut out = PlaceDetail::for_place(place);
        out.sections.push(detail::technology_plan(place));
        detail::finish(out, place, self.debug)
    }

    fn legend_entries(&self) -> Vec<LegendItem> {
        vec![
            LegendItem::new(status::PREVIOUS_TECH_DISCONNECTED, COMPLETE),
            LegendItem::new(status::NEW_TECH_CONNECTED, COMPLETE),
            LegendItem::new(status::ELIGIBLE_TO_ORDER, AVAILABLE),
            LegendItem::new(status::BUILD_FINALISED, BUILD_FINALISED),
            LegendItem::new(status::IN_DESIGN, DESIGN),
            LegendItem::new(status::COMMITTED, COMMITTED),
            LegendItem::new(status::MDU_ELIGIBLE_TO_APPLY, MDU_ELIGIBLE),
            LegendItem::new(status::MDU_IN_BUILD, MDU_IN_BUILD),
            LegendItem::new("Unknown", Color::UNKNOWN),
        ]
    }
}

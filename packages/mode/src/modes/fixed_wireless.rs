//! Fixed-wireless premises, coloured by home speed tier availability.

use tech_map_place_models::{Color, LegendItem, Place, PlaceDetail, TechType};

use crate::{ModeClassifier, ModeId, detail};

const SUPERFAST: Color = Color("#1D7044");
const HOME_FAST: Color = Color("#02B9E3");
const PLUS: Color = Color("#FFBE00");
const PLANNED: Color = Color("#FF7E01");
const NOT_PLANNED: Color = Color("#E3071D");

/// Note the lowercase "to": the speed tier feed differs from the change
/// status feed.
const HST_ELIGIBLE: &str = "Eligible to Order";

/// Shows fixed-wireless premises only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWirelessMode {
    debug: bool,
}

impl FixedWirelessMode {
    /// Creates the mode.
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ModeClassifier for FixedWirelessMode {
    fn id(&self) -> ModeId {
        ModeId::Fw
    }

    fn filter(&self, place: &Place) -> bool {
        place.tech_type == TechType::Wireless
    }

    fn color_for(&self, place: &Place) -> Color {
        let status = place.hst_status.as_deref();

        if status == Some(HST_ELIGIBLE) {
            match place.hst_speed_tier.as_deref() {
                Some("FW Superfast") => return SUPERFAST,
                Some("FW Home Fast") => return HOME_FAST,
                Some("FW Plus") => return PLUS,
                _ => {}
            }
        }

        match status {
            Some("Planned") => PLANNED,
            Some("Not Planned") => NOT_PLANNED,
            _ => Color::UNKNOWN,
        }
    }

    fn render_detail(&self, place: &Place) -> PlaceDetail {
        let mut out = PlaceDetail::for_place(place);
        out.sections.push(detail::fixed_wireless(place));
        detail::finish(out, place, self.debug)
    }

    fn legend_entries(&self) -> Vec<LegendItem> {
        vec![
            LegendItem::new("Available - Superfast", SUPERFAST),
            LegendItem::new("Available - Home Fast", HOME_FAST),
            LegendItem::new("Available - Plus", PLUS),
            LegendItem::new("Planned", PLANNED),
            LegendItem::new("Not Planned", NOT_PLANNED),
            LegendItem::new("Unknown", Color::UNKNOWN),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wireless(status: &str, tier: Option<&str>) -> Place {
        let mut p = Place::new("LOC", 0.0, 0.0);
        p.tech_type = TechType::Wireless;
        p.hst_status = Some(status.to_owned());
        p.hst_speed_tier = tier.map(str::to_owned);
        p
    }

    #[test]
    fn eligible_tiers() {
        let mode = FixedWirelessMode::default();
        assert_eq!(mode.color_for(&wireless("Eligible to Order", Some("FW Plus"))), PLUS);
        assert_eq!(
            mode.color_for(&wireless("Eligible to Order", Some("FW Superfast"))),
            SUPERFAST
        );
        assert_eq!(
            mode.color_for(&wireless("Eligible to Order", Some("Other"))),
            Color::UNKNOWN
        );
    }

    #[test]
    fn planning_states_and_filter() {
        let mode = FixedWirelessMode::default();
        assert_eq!(mode.color_for(&wireless("Planned", None)), PLANNED);
        assert_eq!(mode.color_for(&wireless("Not Planned", None)), NOT_PLANNED);

        let mut fibre = wireless("Planned", None);
        fibre.tech_type = TechType::Fttp;
        assert!(!mode.filter(&fibre));
    }
}

//! Enterprise Ethernet premises, coloured by price zone and build cost.

use tech_map_place_models::{Color, LegendItem, Place, PlaceDetail};

use crate::{ModeClassifier, ModeId, detail};

const CBD_ZERO_COST: Color = Color("#1D7044");
const CBD_POA: Color = Color("#02B9E3");
const ZONE_ZERO_COST: Color = Color("#FF7E01");
const ZONE_POA: Color = Color("#E3071D");

/// Shows premises where Enterprise Ethernet is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnterpriseEthernetMode {
    debug: bool,
}

impl EnterpriseEthernetMode {
    /// Creates the mode.
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ModeClassifier for EnterpriseEthernetMode {
    fn id(&self) -> ModeId {
        ModeId::Ee
    }

    fn filter(&self, place: &Place) -> bool {
        place.ee
    }

    fn color_for(&self, place: &Place) -> Color {
        match (place.cbd_pricing, place.zero_build_cost) {
            (true, true) => CBD_ZERO_COST,
            (true, false) => CBD_POA,
            (false, true) => ZONE_ZERO_COST,
            (false, false) => ZONE_POA,
        }
    }

    fn render_detail(&self, place: &Place) -> PlaceDetail {
        let mut out = PlaceDetail::for_place(place);
        out.sections.push(detail::enterprise_ethernet(place));
        detail::finish(out, place, self.debug)
    }

    fn legend_entries(&self) -> Vec<LegendItem> {
        vec![
            LegendItem::new("EE CBD $0", CBD_ZERO_COST),
            LegendItem::new("EE CBD POA", CBD_POA),
            LegendItem::new("EE Z123 $0", ZONE_ZERO_COST),
            LegendItem::new("EE Zone 1/2/3 POA", ZONE_POA),
            LegendItem::new("Unknown", Color::UNKNOWN),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colours_by_zone_and_cost() {
        let mode = EnterpriseEthernetMode::default();
        let mut p = Place::new("LOC", 0.0, 0.0);
        p.ee = true;
        assert!(mode.filter(&p));
        assert_eq!(mode.color_for(&p), ZONE_POA);

        p.cbd_pricing = true;
        p.zero_build_cost = true;
        assert_eq!(mode.color_for(&p), CBD_ZERO_COST);

        p.ee = false;
        assert!(!mode.filter(&p));
    }
}

//! Every premise, coloured by current or incoming technology.

use tech_map_place_models::{Color, LegendItem, Place, PlaceDetail, TechType};

use crate::{ModeClassifier, ModeId, detail, predicates};

const FTTP: Color = Color("#1D7044");
const FTTP_AVAIL: Color = Color("#75AD6F");
const FTTP_SOON: Color = Color("#C8E3C5");
const HFC: Color = Color("#FFBE00");
const FTTC: Color = Color("#FF7E01");
const FTTC_AVAIL: Color = Color("#FF7E01");
const FTTN_B: Color = Color("#E3071D");
const FW: Color = Color("#02B9E3");
const FW_AVAIL: Color = Color("#022BE3");
const SATELLITE: Color = Color("#6B02E3");

const fn tech_color(tech: TechType) -> Color {
    match tech {
        TechType::Fttp => FTTP,
        TechType::Fttc => FTTC,
        TechType::Fttn | TechType::Fttb => FTTN_B,
        TechType::Hfc => HFC,
        TechType::Wireless => FW,
        TechType::Satellite => SATELLITE,
        TechType::Unknown => Color::UNKNOWN,
    }
}

/// Shows every premise.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMode {
    debug: bool,
}

impl AllMode {
    /// Creates the mode.
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ModeClassifier for AllMode {
    fn id(&self) -> ModeId {
        ModeId::All
    }

    fn filter(&self, _place: &Place) -> bool {
        true
    }

    fn color_for(&self, place: &Place) -> Color {
        if predicates::is_fttp(place) {
            FTTP
        } else if predicates::is_fttp_available(place) {
            FTTP_AVAIL
        } else if predicates::is_fttp_soon(place) {
            FTTP_SOON
        } else if predicates::is_fttp_far(place) {
            tech_color(place.tech_type)
        } else if predicates::is_fttc(place) {
            FTTC
        } else if predicates::is_fw_to_fttc(place) {
            FTTC_AVAIL
        } else if predicates::is_fw_to_fttn(place) {
            FTTN_B
        } else if predicates::is_sat_to_fw(place) {
            FW_AVAIL
        } else {
            if predicates::has_planned_change(place) {
                log::trace!(
                    "Unclassified change {:?} for {}",
                    place.alt_reason_code,
                    place.id
                );
            }
            tech_color(place.tech_type)
        }
    }

    fn render_detail(&self, place: &Place) -> PlaceDetail {
        let mut out = PlaceDetail::for_place(place);
        out.sections.push(detail::technology_plan(place));
        if place.ee {
            out.sections.push(detail::enterprise_ethernet(place));
        }
        detail::finish(out, place, self.debug)
    }

    fn legend_entries(&self) -> Vec<LegendItem> {
        vec![
            LegendItem::new("FTTP", FTTP),
            LegendItem::new("FTTP Upgrade", FTTP_AVAIL),
            LegendItem::new("FTTP Coming", FTTP_SOON),
            LegendItem::new("HFC", HFC),
            LegendItem::new("FTTC", FTTC),
            LegendItem::new("FTTN/FTTB", FTTN_B),
            LegendItem::new("FW", FW),
            LegendItem::new("FW Upgrade", FW_AVAIL),
            LegendItem::new("Satellite", SATELLITE),
            LegendItem::new("Unknown", Color::UNKNOWN),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(tech: TechType) -> Place {
        let mut p = Place::new("LOC", -33.8, 151.2);
        p.tech_type = tech;
        p
    }

    #[test]
    fn colours_by_technology() {
        let mode = AllMode::default();
        assert_eq!(mode.color_for(&place(TechType::Fttp)), FTTP);
        assert_eq!(mode.color_for(&place(TechType::Fttb)), FTTN_B);
        assert_eq!(mode.color_for(&place(TechType::Satellite)), SATELLITE);
        assert_eq!(mode.color_for(&place(TechType::Unknown)), Color::UNKNOWN);
    }

    #[test]
    fn upgrade_predicates_take_precedence() {
        let mode = AllMode::default();

        let mut avail = place(TechType::Fttn);
        avail.alt_reason_code = Some("FTTP_SA".to_owned());
        avail.tech_change_status = Some("Eligible To Order".to_owned());
        assert_eq!(mode.color_for(&avail), FTTP_AVAIL);

        let mut far = place(TechType::Hfc);
        far.alt_reason_code = Some("FTTP_SA".to_owned());
        far.tech_change_status = Some("Committed".to_owned());
        assert_eq!(mode.color_for(&far), HFC);

        let mut sat = place(TechType::Wireless);
        sat.reason_code = Some("FW_SA".to_owned());
        sat.tech_change_status = Some("Eligible To Order".to_owned());
        assert_eq!(mode.color_for(&sat), FW_AVAIL);
    }

    #[test]
    fn point_colour_uses_first_member() {
        let mode = AllMode::default();
        let members = [place(TechType::Hfc), place(TechType::Fttp)];
        assert_eq!(mode.point_color(&members), HFC);
        assert_eq!(mode.point_color(&[]), Color::UNKNOWN);
    }

    #[test]
    fn detail_adds_ee_section_and_raw_in_debug() {
        let mut p = place(TechType::Fttp);
        p.ee = true;

        let plain = AllMode::new(false).render_detail(&p);
        assert_eq!(plain.sections.len(), 2);
        assert!(plain.raw.is_none());

        let debug = AllMode::new(true).render_detail(&p);
        assert!(debug.raw.unwrap().contains("\"techType\": \"FTTP\""));
    }
}

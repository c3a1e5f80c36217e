//! Detail sections shared between modes.

use tech_map_place_models::{DetailSection, Place, PlaceDetail, TechType};

use crate::predicates;

/// Placeholder for a missing value.
const MISSING: &str = "-";

fn or_missing(value: Option<&str>) -> String {
    value.unwrap_or(MISSING).to_owned()
}

/// The "Technology Plan" section: either the final technology, or the
/// current technology and the planned change.
#[must_use]
pub fn technology_plan(place: &Place) -> DetailSection {
    let section = DetailSection::new("Technology Plan");

    if place.tech_type == TechType::Fttp || !predicates::has_planned_change(place) {
        let section = section.field("Technology", place.tech_type.to_string());
        if place.tech_type == TechType::Fttp {
            section
        } else {
            section.note("No tech upgrade planned")
        }
    } else {
        section
            .field("Current", place.tech_type.to_string())
            .field("Change", or_missing(place.alt_reason_code.as_deref()))
            .field("Status", or_missing(place.tech_change_status.as_deref()))
            .field("Program", or_missing(place.program_type.as_deref()))
            .field(
                "Target Qtr",
                or_missing(place.target_eligibility_quarter.as_deref()),
            )
    }
}

/// The "Enterprise Ethernet" section.
#[must_use]
pub fn enterprise_ethernet(place: &Place) -> DetailSection {
    DetailSection::new("Enterprise Ethernet")
        .field(
            "Price Zone",
            if place.cbd_pricing { "CBD" } else { "Zone 1/2/3" },
        )
        .field(
            "Build Cost",
            if place.zero_build_cost { "$0" } else { "POA" },
        )
}

/// Program name used by the API for the wireless upgrade program.
const FW_UPGRADE_PROGRAM: &str = "Fixed Wireless and Satellite Upgrade Program";

/// The "Fixed Wireless" section.
#[must_use]
pub fn fixed_wireless(place: &Place) -> DetailSection {
    let section = DetailSection::new("Fixed Wireless");
    if place.program_type.as_deref() == Some(FW_UPGRADE_PROGRAM) {
        section
            .field("Program", "Fixed Wireless Upgrade Program")
            .field("Status", or_missing(place.hst_status.as_deref()))
            .field("SpeedTier", or_missing(place.hst_speed_tier.as_deref()))
            .field(
                "Target Qtr",
                or_missing(place.target_eligibility_quarter.as_deref()),
            )
    } else {
        section.field("Status", or_missing(place.hst_status.as_deref()))
    }
}

/// Attaches the raw record when `debug` is set.
#[must_use]
pub fn finish(detail: PlaceDetail, place: &Place, debug: bool) -> PlaceDetail {
    if debug { detail.with_raw(place) } else { detail }
}

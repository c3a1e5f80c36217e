//! Technology transition predicates shared by the modes.

use tech_map_place_models::{Place, TechType};

/// Technology change status values reported by the API.
pub mod status {
    pub const ELIGIBLE_TO_ORDER: &str = "Eligible To Order";
    pub const NEW_TECH_CONNECTED: &str = "New Tech Connected";
    pub const PREVIOUS_TECH_DISCONNECTED: &str = "Previous Tech Disconnected";
    pub const IN_DESIGN: &str = "In Design";
    pub const BUILD_FINALISED: &str = "Build Finalised";
    pub const PLANNED: &str = "Planned";
    pub const COMMITTED: &str = "Committed";
    pub const NOT_PLANNED: &str = "Not Planned";
    pub const MDU_ELIGIBLE_TO_APPLY: &str = "MDU Complex Eligible To Apply";
    pub const MDU_IN_BUILD: &str = "MDU Complex Premises In Build";
}

/// Statuses meaning an FTTP upgrade is on its way but not orderable yet.
const FTTP_SOON: [&str; 5] = [
    status::IN_DESIGN,
    status::BUILD_FINALISED,
    status::PLANNED,
    status::MDU_ELIGIBLE_TO_APPLY,
    status::MDU_IN_BUILD,
];

/// Alternative reason code meaning "no planned change".
pub const NO_ALT_REASON: &str = "NULL_NA";

/// Already on fibre to the premises.
#[must_use]
pub fn is_fttp(place: &Place) -> bool {
    place.tech_type == TechType::Fttp
}

/// An FTTP upgrade can be ordered now.
#[must_use]
pub fn is_fttp_available(place: &Place) -> bool {
    place.alt_reason_starts_with("FTTP") && place.change_status() == status::ELIGIBLE_TO_ORDER
}

/// An FTTP upgrade is in design or build.
#[must_use]
pub fn is_fttp_soon(place: &Place) -> bool {
    place.alt_reason_starts_with("FTTP") && FTTP_SOON.contains(&place.change_status())
}

/// An FTTP upgrade is committed but not yet scheduled.
#[must_use]
pub fn is_fttp_far(place: &Place) -> bool {
    place.alt_reason_starts_with("FTTP") && place.change_status() == status::COMMITTED
}

/// Connected on FTTC after a transition.
#[must_use]
pub fn is_fttc(place: &Place) -> bool {
    place.tech_type == TechType::Fttc
        && place.reason_starts_with("FTTC")
        && place.change_status() == status::NEW_TECH_CONNECTED
}

/// FTTC can be ordered after a transition.
#[must_use]
pub fn is_fw_to_fttc(place: &Place) -> bool {
    place.tech_type == TechType::Fttc
        && place.reason_starts_with("FTTC")
        && place.change_status() == status::ELIGIBLE_TO_ORDER
}

/// Moving from fixed wireless onto FTTN.
#[must_use]
pub fn is_fw_to_fttn(place: &Place) -> bool {
    place.tech_type == TechType::Fttn
        && place.reason_code.as_deref() == Some("FTTN_SA")
        && place.alt_reason_code.as_deref() == Some("FW_CT")
        && place.change_status() == status::ELIGIBLE_TO_ORDER
}

/// Moving from satellite onto fixed wireless.
#[must_use]
pub fn is_sat_to_fw(place: &Place) -> bool {
    place.tech_type == TechType::Wireless
        && place.reason_code.as_deref() == Some("FW_SA")
        && place.change_status() == status::ELIGIBLE_TO_ORDER
}

/// Whether any technology change is recorded against the premise.
#[must_use]
pub fn has_planned_change(place: &Place) -> bool {
    place
        .alt_reason_code
        .as_deref()
        .is_some_and(|code| !code.is_empty() && code != NO_ALT_REASON)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(tech: TechType, reason: Option<&str>, alt: Option<&str>, status: Option<&str>) -> Place {
        let mut p = Place::new("LOC", 0.0, 0.0);
        p.tech_type = tech;
        p.reason_code = reason.map(str::to_owned);
        p.alt_reason_code = alt.map(str::to_owned);
        p.tech_change_status = status.map(str::to_owned);
        p
    }

    #[test]
    fn fttp_upgrade_stages() {
        let avail = place(TechType::Fttn, None, Some("FTTP_SA"), Some(status::ELIGIBLE_TO_ORDER));
        let soon = place(TechType::Fttn, None, Some("FTTP_SA"), Some(status::IN_DESIGN));
        let far = place(TechType::Hfc, None, Some("FTTP_NA"), Some(status::COMMITTED));

        assert!(is_fttp_available(&avail) && !is_fttp_soon(&avail));
        assert!(is_fttp_soon(&soon) && !is_fttp_far(&soon));
        assert!(is_fttp_far(&far) && !is_fttp_available(&far));
    }

    #[test]
    fn wireless_transitions() {
        let fttc = place(TechType::Fttc, Some("FTTC_SA"), None, Some(status::ELIGIBLE_TO_ORDER));
        let fttn = place(
            TechType::Fttn,
            Some("FTTN_SA"),
            Some("FW_CT"),
            Some(status::ELIGIBLE_TO_ORDER),
        );
        let sat = place(TechType::Wireless, Some("FW_SA"), None, Some(status::ELIGIBLE_TO_ORDER));

        assert!(is_fw_to_fttc(&fttc) && !is_fttc(&fttc));
        assert!(is_fw_to_fttn(&fttn));
        assert!(is_sat_to_fw(&sat));
    }

    #[test]
    fn null_alt_reason_is_no_change() {
        assert!(!has_planned_change(&place(TechType::Fttn, None, Some("NULL_NA"), None)));
        assert!(!has_planned_change(&place(TechType::Fttn, None, None, None)));
        assert!(has_planned_change(&place(TechType::Fttn, None, Some("FTTP_SA"), None)));
    }
}

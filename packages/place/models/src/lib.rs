#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Premise records and the shared presentation types of the tech map.
//!
//! A [`Place`] is one premise as returned by the upstream premises API.
//! The fetch and aggregation layers only ever look at its id and
//! coordinates; everything else is classification payload consumed by the
//! display modes.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Access technology currently serving a premise.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TechType {
    /// Fibre to the premises
    Fttp,
    /// Fibre to the curb
    Fttc,
    /// Fibre to the node
    Fttn,
    /// Fibre to the building
    Fttb,
    /// Hybrid fibre-coaxial
    Hfc,
    /// Fixed wireless
    Wireless,
    /// Satellite
    Satellite,
    /// Anything the API reports that we do not recognise
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single premise record.
///
/// Upserts by [`Place::id`] replace the whole record; records are never
/// partially merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    /// Unique location identifier (e.g. `"LOC000012345678"`).
    #[serde(alias = "locid")]
    pub id: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// First address line, used as the display label.
    #[serde(default)]
    pub address1: String,
    /// Second address line (suburb, state, postcode).
    #[serde(default)]
    pub address2: String,
    /// Current access technology.
    #[serde(default)]
    pub tech_type: TechType,
    /// Reason code for the current technology (e.g. `"FTTN_SA"`).
    #[serde(default)]
    pub reason_code: Option<String>,
    /// Reason code for the planned alternative technology (e.g. `"FTTP_SA"`).
    #[serde(default)]
    pub alt_reason_code: Option<String>,
    /// Status of any planned technology change (e.g. `"Eligible To Order"`).
    #[serde(default)]
    pub tech_change_status: Option<String>,
    /// Upgrade program the premise belongs to.
    #[serde(default)]
    pub program_type: Option<String>,
    /// Quarter in which the premise is expected to become eligible.
    #[serde(default)]
    pub target_eligibility_quarter: Option<String>,
    /// Fixed-wireless home speed tier status.
    #[serde(default)]
    pub hst_status: Option<String>,
    /// Fixed-wireless home speed tier (e.g. `"FW Superfast"`).
    #[serde(default)]
    pub hst_speed_tier: Option<String>,
    /// Change reason for copper/wireless transitions.
    #[serde(default)]
    pub coat_change_reason: Option<String>,
    /// Whether a ready-to-connect date has been forecast.
    #[serde(default, rename = "forecastedRTC")]
    pub forecasted_rtc: bool,
    /// Business fibre available.
    #[serde(default)]
    pub business_fibre: bool,
    /// Enterprise Ethernet CBD price zone.
    #[serde(default, rename = "cbdpricing")]
    pub cbd_pricing: bool,
    /// Enterprise Ethernet available.
    #[serde(default)]
    pub ee: bool,
    /// Enterprise Ethernet with no build cost.
    #[serde(default)]
    pub zero_build_cost: bool,
    /// Hours since the upstream record was refreshed.
    #[serde(default)]
    pub hours_since_last_update: Option<f64>,
}

impl Place {
    /// Creates a bare place with only identity and coordinates set.
    #[must_use]
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            address1: String::new(),
            address2: String::new(),
            tech_type: TechType::Unknown,
            reason_code: None,
            alt_reason_code: None,
            tech_change_status: None,
            program_type: None,
            target_eligibility_quarter: None,
            hst_status: None,
            hst_speed_tier: None,
            coat_change_reason: None,
            forecasted_rtc: false,
            business_fibre: false,
            cbd_pricing: false,
            ee: false,
            zero_build_cost: false,
            hours_since_last_update: None,
        }
    }

    /// Label shown in tooltips. Falls back to the id when the address is
    /// missing.
    #[must_use]
    pub fn address_label(&self) -> &str {
        if self.address1.is_empty() {
            &self.id
        } else {
            &self.address1
        }
    }

    /// Whether the alternative reason code starts with `prefix`.
    #[must_use]
    pub fn alt_reason_starts_with(&self, prefix: &str) -> bool {
        self.alt_reason_code
            .as_deref()
            .is_some_and(|code| code.starts_with(prefix))
    }

    /// Whether the current reason code starts with `prefix`.
    #[must_use]
    pub fn reason_starts_with(&self, prefix: &str) -> bool {
        self.reason_code
            .as_deref()
            .is_some_and(|code| code.starts_with(prefix))
    }

    /// The technology change status, or `""` when absent.
    #[must_use]
    pub fn change_status(&self) -> &str {
        self.tech_change_status.as_deref().unwrap_or_default()
    }
}

/// A display colour token (`#RRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Color(pub &'static str);

impl Color {
    /// Colour used for anything that cannot be classified.
    pub const UNKNOWN: Self = Self("#888888");

    /// Returns the hex string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// One legend row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendItem {
    /// Human-readable category label.
    pub label: String,
    /// Colour of the category.
    pub color: Color,
    /// Number of markers of this colour in view, when counted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl LegendItem {
    /// Creates an uncounted legend row.
    #[must_use]
    pub fn new(label: &str, color: Color) -> Self {
        Self {
            label: label.to_owned(),
            color,
            count: None,
        }
    }
}

/// A labelled group of fields in a premise detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailSection {
    /// Section heading (e.g. "Technology Plan").
    pub heading: String,
    /// `(label, value)` rows, in display order.
    pub fields: Vec<(String, String)>,
}

impl DetailSection {
    /// Creates an empty section.
    #[must_use]
    pub fn new(heading: &str) -> Self {
        Self {
            heading: heading.to_owned(),
            fields: Vec::new(),
        }
    }

    /// Appends a row and returns the section.
    #[must_use]
    pub fn field(mut self, label: &str, value: impl Into<String>) -> Self {
        self.fields.push((label.to_owned(), value.into()));
        self
    }

    /// Appends a free-text row with an empty label.
    #[must_use]
    pub fn note(mut self, text: &str) -> Self {
        self.fields.push((String::new(), text.to_owned()));
        self
    }
}

/// Structured, renderer-agnostic detail for one premise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceDetail {
    /// Premise id.
    pub title: String,
    /// Address lines.
    pub address: Vec<String>,
    /// Mode-specific sections.
    pub sections: Vec<DetailSection>,
    /// Pretty-printed raw record, only populated in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl PlaceDetail {
    /// Starts a detail view with the id and address lines of `place`.
    #[must_use]
    pub fn for_place(place: &Place) -> Self {
        Self {
            title: place.id.clone(),
            address: [&place.address1, &place.address2]
                .into_iter()
                .filter(|line| !line.is_empty())
                .cloned()
                .collect(),
            sections: Vec::new(),
            raw: None,
        }
    }

    /// Attaches the raw record as pretty JSON.
    #[must_use]
    pub fn with_raw(mut self, place: &Place) -> Self {
        self.raw = serde_json::to_string_pretty(place).ok();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_api_record() {
        let json = r#"{
            "id": "LOC000111",
            "latitude": -33.81,
            "longitude": 151.2,
            "address1": "1 Example St",
            "address2": "SYDNEY NSW 2000",
            "techType": "FTTN",
            "altReasonCode": "FTTP_SA",
            "techChangeStatus": "Eligible To Order",
            "cbdpricing": true,
            "forecastedRTC": true
        }"#;
        let place: Place = serde_json::from_str(json).unwrap();

        assert_eq!(place.id, "LOC000111");
        assert_eq!(place.tech_type, TechType::Fttn);
        assert!(place.alt_reason_starts_with("FTTP"));
        assert!(place.cbd_pricing);
        assert!(place.forecasted_rtc);
        assert!(!place.ee);
        assert_eq!(place.change_status(), "Eligible To Order");
    }

    #[test]
    fn accepts_legacy_locid_and_unknown_tech() {
        let json = r#"{"locid": "LOC9", "latitude": 1.0, "longitude": 2.0, "techType": "CARRIER_PIGEON"}"#;
        let place: Place = serde_json::from_str(json).unwrap();

        assert_eq!(place.id, "LOC9");
        assert_eq!(place.tech_type, TechType::Unknown);
        assert_eq!(place.address_label(), "LOC9");
    }

    #[test]
    fn tech_type_string_forms() {
        assert_eq!(TechType::Wireless.to_string(), "WIRELESS");
        assert_eq!("FTTB".parse::<TechType>().unwrap(), TechType::Fttb);
    }

    #[test]
    fn detail_skips_empty_address_lines() {
        let mut place = Place::new("LOC1", 0.0, 0.0);
        place.address1 = "2 Road".to_owned();
        let detail = PlaceDetail::for_place(&place);

        assert_eq!(detail.address, vec!["2 Road".to_owned()]);
        assert!(detail.raw.is_none());
        assert!(detail.with_raw(&place).raw.unwrap().contains("LOC1"));
    }
}

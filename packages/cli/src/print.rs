//! Plain-text rendering of what the map would show.

use tech_map_engine::{EngineError, TechMap};
use tech_map_geo::tiler::GeoBox;
use tech_map_place_models::PlaceDetail;
use tech_map_points::popup::Popup;

pub fn legend(map: &TechMap) {
    println!("{}", map.mode().display_name());
    println!();
    for item in map.legend() {
        println!(
            "  {:<48} {} {:>6}",
            item.label,
            item.color,
            item.count.unwrap_or_default()
        );
    }
}

pub fn tiles(boxes: &[GeoBox]) {
    println!("{} boxes", boxes.len());
    for geo_box in boxes {
        let b = &geo_box.bounds;
        println!(
            "  {:>6},{:<6} centre {:<18} N {:.4} S {:.4} E {:.4} W {:.4}",
            geo_box.key.row,
            geo_box.key.col,
            geo_box.center_label(),
            b.north,
            b.south,
            b.east,
            b.west
        );
    }
}

pub fn detail(detail: &PlaceDetail) {
    println!("{}", detail.title);
    for line in &detail.address {
        println!("  {line}");
    }
    for section in &detail.sections {
        println!();
        println!("{}", section.heading);
        for (label, value) in &section.fields {
            if label.is_empty() {
                println!("  {value}");
            } else {
                println!("  {label}: {value}");
            }
        }
    }
    if let Some(raw) = &detail.raw {
        println!();
        println!("{raw}");
    }
}

/// Lists up to `limit` markers in view; shared points also list their
/// premises.
pub async fn points(map: &TechMap, limit: usize) -> Result<(), EngineError> {
    let markers = map.markers_in_view();
    println!(
        "{} points in view, cluster radius {}px",
        markers.len(),
        map.cluster_radius()
    );

    for marker in markers.iter().take(limit) {
        println!(
            "  {:<24} {} x{:<3} {}",
            marker.key, marker.color, marker.member_count, marker.tooltip
        );
        if marker.member_count > 1
            && let Some(Popup::Multi { entries }) = map.popup(&marker.key).await?
        {
            for entry in entries {
                println!("      {} {}", entry.color, entry.label);
            }
        }
    }
    if markers.len() > limit {
        println!("  ... {} more", markers.len() - limit);
    }

    let mix = map.view_cluster();
    if mix.child_count > 0 {
        println!();
        println!("Colour mix of {} points:", mix.child_count);
        for stop in mix.stops {
            println!(
                "  {} {:>5} {:>5.1}%..{:>5.1}%",
                stop.color, stop.count, stop.start_pct, stop.end_pct
            );
        }
    }
    Ok(())
}

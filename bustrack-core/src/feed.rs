//! Live fleet feed parsing.
//!
//! The feed is a tag-attribute document of `<bus>` elements:
//! `<bus lat=".." lon=".." head=".." route=".." stop=".." next=".." code=".."/>`.
//! The same format is served by the remote endpoint and stored in the
//! local fallback file.
//!
//! A record missing or malforming a required field (lat, lon, head,
//! code, route) is skipped with a warning rather than failing the
//! whole batch; a structurally invalid document fails the parse, which
//! the cache treats like a fetch failure.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;
use roxmltree::{Document, Node};

use crate::types::{BusSighting, BusStatus, FleetSnapshot, LatLon, Result, TransitError};

/// Parse a feed document into a snapshot stamped with `captured_at`.
pub fn parse_snapshot(text: &str, captured_at: DateTime<Utc>) -> Result<FleetSnapshot> {
    let doc = Document::parse(text).map_err(|err| TransitError::Feed(err.to_string()))?;

    let mut buses: HashMap<String, Vec<BusSighting>> = HashMap::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("bus")) {
        match parse_bus(&node) {
            Ok(sighting) => buses
                .entry(sighting.route_id.clone())
                .or_default()
                .push(sighting),
            Err(reason) => warn!("skipping bus record: {reason}"),
        }
    }

    Ok(FleetSnapshot { buses, captured_at })
}

fn parse_bus(node: &Node) -> std::result::Result<BusSighting, String> {
    let lat = required_f64(node, "lat")?;
    let lon = required_f64(node, "lon")?;
    let heading = required_f64(node, "head")?;
    let code: u8 = node
        .attribute("code")
        .ok_or("missing code")?
        .parse()
        .map_err(|_| format!("bad code {:?}", node.attribute("code").unwrap_or("")))?;
    let route_id = match node.attribute("route") {
        Some(route) if !route.is_empty() => route.to_string(),
        _ => return Err("missing route".to_string()),
    };
    let location = LatLon::new(lat, lon).map_err(|err| err.to_string())?;

    Ok(BusSighting {
        route_id,
        location,
        heading,
        stop_id: optional_attr(node, "stop"),
        next_stop_id: optional_attr(node, "next"),
        status: BusStatus::from_code(code),
    })
}

fn required_f64(node: &Node, name: &str) -> std::result::Result<f64, String> {
    let value = node.attribute(name).ok_or_else(|| format!("missing {name}"))?;
    value.parse().map_err(|_| format!("bad {name} {value:?}"))
}

fn optional_attr(node: &Node, name: &str) -> Option<String> {
    node.attribute(name)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Parking definitions and the registry that validates them against a
//! routing request (§4.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::duration::Duration;
use crate::error::{Error, Result};
use crate::model::{RoutingRequest, TravelMode, Waypoint};

/// A physical location where the vehicle parks and the driver continues on
/// foot (or by bicycle) to deliver a group of shipments (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingLocation {
    pub tag: String,
    pub waypoint: Waypoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_waypoint: Option<Waypoint>,
    #[serde(default)]
    pub travel_mode: TravelMode,
    #[serde(default = "default_multiple")]
    pub travel_duration_multiplier: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub delivery_load_limits: HashMap<String, i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cost_per_kilometer_per_load_unit: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cost_per_hour_per_load_unit: HashMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_round_duration: Option<Duration>,
    #[serde(default)]
    pub arrival_duration: Duration,
    #[serde(default)]
    pub arrival_cost: f64,
    #[serde(default)]
    pub departure_duration: Duration,
    #[serde(default)]
    pub departure_cost: f64,
    #[serde(default)]
    pub reload_duration: Duration,
    #[serde(default)]
    pub reload_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unload_duration_per_item: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_duration_per_item: Option<Duration>,
    #[serde(default)]
    pub avoid_u_turns: bool,
    #[serde(default)]
    pub avoid_indoor: bool,
}

fn default_multiple() -> f64 {
    1.0
}

impl ParkingLocation {
    /// The waypoint the driver uses on foot: the explicit local waypoint if
    /// set, otherwise the driving waypoint with `sideOfRoad` stripped
    /// (§9 open question — the stripping itself is a deliberate, documented
    /// guess, not a validated solver requirement).
    pub fn walking_waypoint(&self) -> Waypoint {
        self.local_waypoint
            .clone()
            .unwrap_or_else(|| self.waypoint.without_side_of_road())
    }

    pub fn has_any_global_transition_attribute(&self) -> bool {
        self.arrival_cost != 0.0
            || self.arrival_duration != Duration::ZERO
            || self.departure_cost != 0.0
            || self.departure_duration != Duration::ZERO
            || self.reload_cost != 0.0
            || self.reload_duration != Duration::ZERO
    }
}

/// External JSON input: `{ "parking_locations": [...], "parking_for_shipment": {...} }` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParkingMap {
    pub parking_locations: Vec<ParkingLocation>,
    /// Maps an original shipment index to the tag of the parking it is
    /// served through.
    pub parking_for_shipment: HashMap<usize, String>,
}

/// Validated, indexed view over a [`ParkingMap`] (§4.1).
///
/// Construction performs every input-inconsistency check in §7 up front;
/// a `ParkingRegistry` therefore always represents a request+parking-map
/// pair known to be internally consistent.
#[derive(Debug, Clone)]
pub struct ParkingRegistry {
    by_tag: HashMap<String, ParkingLocation>,
    shipment_to_tag: HashMap<usize, String>,
}

impl ParkingRegistry {
    pub fn build(request: &RoutingRequest, parking_map: &ParkingMap) -> Result<Self> {
        tracing::debug!(
            parkings = parking_map.parking_locations.len(),
            shipments = request.model.shipments.len(),
            "building parking registry"
        );
        let mut by_tag = HashMap::with_capacity(parking_map.parking_locations.len());
        for parking in &parking_map.parking_locations {
            if parking.avoid_indoor && parking.travel_mode != TravelMode::Walking {
                let message = format!("parking {:?} sets avoid_indoor but travel_mode is not walking", parking.tag);
                tracing::error!(tag = %parking.tag, "{message}");
                return Err(Error::input_inconsistency(message));
            }
            if by_tag.insert(parking.tag.clone(), parking.clone()).is_some() {
                let message = format!("duplicate parking tag {:?}", parking.tag);
                tracing::error!(tag = %parking.tag, "{message}");
                return Err(Error::input_inconsistency(message));
            }
        }

        let shipment_count = request.model.shipments.len();
        for (&shipment_index, tag) in &parking_map.parking_for_shipment {
            if shipment_index >= shipment_count {
                let message = format!(
                    "parking_for_shipment references out-of-range shipment index {shipment_index}"
                );
                tracing::error!(shipment_index, "{message}");
                return Err(Error::input_inconsistency(message));
            }
            if !by_tag.contains_key(tag) {
                let message = format!("parking_for_shipment references unknown parking tag {tag:?}");
                tracing::error!(shipment_index, tag = %tag, "{message}");
                return Err(Error::input_inconsistency(message));
            }
            let shipment = &request.model.shipments[shipment_index];
            if shipment.single_visit_request().is_none() {
                let message = format!(
                    "shipment {shipment_index} is served via a parking but does not have \
                     exactly one visit request"
                );
                tracing::error!(shipment_index, "{message}");
                return Err(Error::input_inconsistency(message));
            }
        }

        tracing::info!(
            parkings = by_tag.len(),
            served_shipments = parking_map.parking_for_shipment.len(),
            "parking registry built"
        );
        Ok(Self { by_tag, shipment_to_tag: parking_map.parking_for_shipment.clone() })
    }

    pub fn get(&self, tag: &str) -> Option<&ParkingLocation> {
        self.by_tag.get(tag)
    }

    pub fn parking_for_shipment(&self, shipment_index: usize) -> Option<&ParkingLocation> {
        self.shipment_to_tag
            .get(&shipment_index)
            .and_then(|tag| self.by_tag.get(tag))
    }

    pub fn tag_for_shipment(&self, shipment_index: usize) -> Option<&str> {
        self.shipment_to_tag.get(&shipment_index).map(String::as_str)
    }

    pub fn is_served_via_parking(&self, shipment_index: usize) -> bool {
        self.shipment_to_tag.contains_key(&shipment_index)
    }

    pub fn parkings(&self) -> impl Iterator<Item = &ParkingLocation> {
        self.by_tag.values()
    }

    pub fn shipment_count(&self) -> usize {
        self.shipment_to_tag.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    #[test]
    fn rejects_duplicate_tags() {
        let request = demo::small_request();
        let mut map = demo::small_parking_map();
        let dup = map.parking_locations[0].clone();
        map.parking_locations.push(dup);
        let err = ParkingRegistry::build(&request, &map).unwrap_err();
        assert!(matches!(err, Error::InputInconsistency(_)));
    }

    #[test]
    fn rejects_unknown_parking_reference() {
        let request = demo::small_request();
        let mut map = demo::small_parking_map();
        map.parking_for_shipment.insert(0, "does-not-exist".to_string());
        let err = ParkingRegistry::build(&request, &map).unwrap_err();
        assert!(matches!(err, Error::InputInconsistency(_)));
    }

    #[test]
    fn rejects_out_of_range_shipment() {
        let request = demo::small_request();
        let mut map = demo::small_parking_map();
        map.parking_for_shipment.insert(9999, "P001".to_string());
        let err = ParkingRegistry::build(&request, &map).unwrap_err();
        assert!(matches!(err, Error::InputInconsistency(_)));
    }

    #[test]
    fn rejects_indoor_driving_parking() {
        let request = demo::small_request();
        let mut map = demo::small_parking_map();
        map.parking_locations[0].avoid_indoor = true;
        map.parking_locations[0].travel_mode = TravelMode::Driving;
        let err = ParkingRegistry::build(&request, &map).unwrap_err();
        assert!(matches!(err, Error::InputInconsistency(_)));
    }

    #[test]
    fn walking_waypoint_strips_side_of_road_but_keeps_place_id() {
        let parking = ParkingLocation {
            waypoint: crate::model::Waypoint {
                location: None,
                place_id: Some("ChIJ-example".to_string()),
                side_of_road: Some(true),
                heading: None,
            },
            ..demo::small_parking_map().parking_locations[0].clone()
        };

        let walking = parking.walking_waypoint();
        assert_eq!(walking.place_id.as_deref(), Some("ChIJ-example"));
        assert_eq!(walking.side_of_road, None);
    }

    #[test]
    fn local_waypoint_is_used_verbatim_when_set() {
        let mut parking = demo::small_parking_map().parking_locations[0].clone();
        parking.local_waypoint = Some(crate::model::Waypoint {
            location: None,
            place_id: Some("ChIJ-local".to_string()),
            side_of_road: Some(true),
            heading: None,
        });

        let walking = parking.walking_waypoint();
        assert_eq!(walking.side_of_road, Some(true));
        assert_eq!(walking.place_id.as_deref(), Some("ChIJ-local"));
    }

    #[test]
    fn accepts_valid_small_scenario() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let registry = ParkingRegistry::build(&request, &map).unwrap();
        assert_eq!(registry.shipment_count(), 8);
        assert!(registry.get("P001").is_some());
        assert!(registry.get("P002").is_some());
    }
}

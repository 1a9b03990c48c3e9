//! Demo/fixture data: the "S1 small scenario" used throughout the test
//! suite and the demo binary — 9 shipments, 2 parkings, 4 vehicles, one
//! direct shipment.

use std::collections::HashMap;

use crate::duration::{Duration, Timestamp};
use crate::model::{
    Model, RoutingRequest, Shipment, TimeWindow, TravelMode, Vehicle, VisitRequest, Waypoint,
};
use crate::parking::{ParkingLocation, ParkingMap};

pub fn global_start() -> Timestamp {
    "2024-01-01T08:00:00Z".parse().unwrap()
}

pub fn global_end() -> Timestamp {
    "2024-01-01T18:00:00Z".parse().unwrap()
}

fn customer_shipment(label: &str, lat: f64, lng: f64) -> Shipment {
    Shipment {
        deliveries: vec![VisitRequest::new(
            Waypoint::from_location(lat, lng),
            Duration::from_minutes(3),
        )
        .with_time_windows(vec![TimeWindow::new(global_start(), global_end())])],
        load_demands: HashMap::from([("packages".to_string(), 1)]),
        label: label.to_string(),
        ..Default::default()
    }
}

/// Builds the S1 fixture request: shipments 0-3 near `P001`, 4-7 near
/// `P002`, and shipment 8 served directly by a driving vehicle.
pub fn small_request() -> RoutingRequest {
    let mut shipments = Vec::new();
    for i in 0..4 {
        shipments.push(customer_shipment(&format!("p001-customer-{i}"), 37.770 + i as f64 * 0.001, -122.41));
    }
    for i in 0..4 {
        shipments.push(customer_shipment(&format!("p002-customer-{i}"), 37.790 + i as f64 * 0.001, -122.43));
    }
    shipments.push(customer_shipment("direct-customer", 37.760, -122.40));

    let depot = Waypoint::from_location(37.775, -122.42);
    let vehicles = (0..4)
        .map(|i| Vehicle {
            start_waypoint: depot.clone(),
            end_waypoint: depot.clone(),
            start_time_windows: vec![TimeWindow::new(global_start(), global_end())],
            end_time_windows: vec![TimeWindow::new(global_start(), global_end())],
            travel_mode: TravelMode::Driving,
            travel_duration_multiple: 1.0,
            fixed_cost: 0.0,
            cost_per_hour: 20.0,
            cost_per_kilometer: 1.0,
            load_limits: HashMap::new(),
            route_duration_limit: None,
            break_rule: None,
            label: format!("vehicle-{i}"),
        })
        .collect();

    RoutingRequest::new(Model {
        shipments,
        vehicles,
        transition_attributes: Vec::new(),
        global_start_time: Some(global_start()),
        global_end_time: Some(global_end()),
    })
}

fn parking(tag: &str, lat: f64, lng: f64) -> ParkingLocation {
    ParkingLocation {
        tag: tag.to_string(),
        waypoint: Waypoint::from_location(lat, lng),
        local_waypoint: None,
        travel_mode: TravelMode::Walking,
        travel_duration_multiplier: 1.0,
        delivery_load_limits: HashMap::from([("packages".to_string(), 20)]),
        cost_per_kilometer_per_load_unit: HashMap::new(),
        cost_per_hour_per_load_unit: HashMap::new(),
        max_round_duration: Some(Duration::from_hours(2)),
        arrival_duration: Duration::from_minutes(2),
        arrival_cost: 0.0,
        departure_duration: Duration::from_minutes(2),
        departure_cost: 0.0,
        reload_duration: Duration::from_minutes(5),
        reload_cost: 0.0,
        unload_duration_per_item: Some(Duration::from_minutes(1)),
        load_duration_per_item: Some(Duration::from_minutes(1)),
        avoid_u_turns: false,
        avoid_indoor: false,
    }
}

/// Builds the parking map for [`small_request`]: shipments 0-3 through
/// `P001`, shipments 4-7 through `P002`, shipment 8 left direct.
pub fn small_parking_map() -> ParkingMap {
    let mut parking_for_shipment = HashMap::new();
    for i in 0..4 {
        parking_for_shipment.insert(i, "P001".to_string());
    }
    for i in 4..8 {
        parking_for_shipment.insert(i, "P002".to_string());
    }

    ParkingMap {
        parking_locations: vec![
            parking("P001", 37.7705, -122.411),
            parking("P002", 37.7905, -122.431),
        ],
        parking_for_shipment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_request_has_nine_shipments_and_four_vehicles() {
        let request = small_request();
        assert_eq!(request.model.shipments.len(), 9);
        assert_eq!(request.model.vehicles.len(), 4);
    }

    #[test]
    fn small_parking_map_assigns_eight_shipments() {
        let map = small_parking_map();
        assert_eq!(map.parking_for_shipment.len(), 8);
        assert_eq!(map.parking_locations.len(), 2);
    }
}

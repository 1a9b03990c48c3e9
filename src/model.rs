//! The solver's wire protocol: requests, responses, and the shared pieces
//! (waypoints, shipments, vehicles, routes) that both are built from.
//!
//! These types model only the fields this crate actually reads or writes
//! (§6); they are not a complete client for the solver collaborator. Field
//! names follow the solver's `camelCase` JSON convention.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::duration::{Duration, Timestamp};

/// A location the solver can route to: either coordinates or an opaque
/// place identifier understood by the map provider. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_of_road: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<i32>,
}

impl Waypoint {
    pub fn from_location(lat: f64, lng: f64) -> Self {
        Self {
            location: Some(LatLng { latitude: lat, longitude: lng }),
            place_id: None,
            side_of_road: None,
            heading: None,
        }
    }

    pub fn from_place_id(place_id: impl Into<String>) -> Self {
        Self {
            location: None,
            place_id: Some(place_id.into()),
            side_of_road: None,
            heading: None,
        }
    }

    /// Returns a copy with `side_of_road` stripped.
    ///
    /// Used when a parking's walking waypoint falls back to its driving
    /// waypoint: whether the solver accepts a `sideOfRoad` hint on a
    /// non-driving travel mode is unconfirmed (§9 open question), so this
    /// crate strips it defensively rather than forwarding it unchanged.
    pub fn without_side_of_road(&self) -> Self {
        Self { side_of_road: None, ..self.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

/// A half-open time interval, with optional soft inner bounds.
///
/// A missing `start_time` means "from the model's global start"; a missing
/// `end_time` means "until the model's global end".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_start_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_end_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_hour_before_soft_start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_hour_after_soft_end_time: Option<f64>,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
            soft_start_time: None,
            soft_end_time: None,
            cost_per_hour_before_soft_start_time: None,
            cost_per_hour_after_soft_end_time: None,
        }
    }

    pub fn effective_start(&self, global_start: Timestamp) -> Timestamp {
        self.start_time.unwrap_or(global_start)
    }

    pub fn effective_end(&self, global_end: Timestamp) -> Timestamp {
        self.end_time.unwrap_or(global_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelMode {
    Driving,
    Walking,
    Bicycling,
}

impl Default for TravelMode {
    fn default() -> Self {
        TravelMode::Driving
    }
}

/// One arrival (and optionally a distinct departure) at a waypoint, to
/// pick up or deliver a [`Shipment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    pub arrival_waypoint: Waypoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_waypoint: Option<Waypoint>,
    #[serde(default)]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_windows: Vec<TimeWindow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visit_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoid_u_turns: Option<bool>,
}

impl VisitRequest {
    pub fn new(arrival_waypoint: Waypoint, duration: Duration) -> Self {
        Self {
            arrival_waypoint,
            departure_waypoint: None,
            duration,
            time_windows: Vec::new(),
            tags: Vec::new(),
            visit_types: Vec::new(),
            cost: None,
            avoid_u_turns: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_time_windows(mut self, windows: Vec<TimeWindow>) -> Self {
        self.time_windows = windows;
        self
    }
}

/// Sparse per-vehicle cost overrides: `vehicle_indices[i]` pairs with `costs[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostsPerVehicle {
    pub vehicle_indices: Vec<usize>,
    pub costs: Vec<f64>,
}

impl CostsPerVehicle {
    pub fn is_empty(&self) -> bool {
        self.vehicle_indices.is_empty()
    }

    /// Merges several sparse cost overrides, summing costs for vehicles
    /// that appear in more than one (used when combining the originals of
    /// a parking round into one virtual global shipment, §4.3).
    pub fn merge<'a>(all: impl IntoIterator<Item = &'a CostsPerVehicle>) -> CostsPerVehicle {
        let mut combined: HashMap<usize, f64> = HashMap::new();
        for cpv in all {
            for (idx, cost) in cpv.vehicle_indices.iter().zip(cpv.costs.iter()) {
                *combined.entry(*idx).or_insert(0.0) += cost;
            }
        }
        let mut vehicle_indices: Vec<usize> = combined.keys().copied().collect();
        vehicle_indices.sort_unstable();
        let costs = vehicle_indices.iter().map(|idx| combined[idx]).collect();
        CostsPerVehicle { vehicle_indices, costs }
    }
}

/// A unit of work: some pickups and/or deliveries, with optional load
/// demands, an optional penalty cost (absent means mandatory), and an
/// optional restriction to a subset of vehicles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pickups: Vec<VisitRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deliveries: Vec<VisitRequest>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub load_demands: HashMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_vehicle_indices: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs_per_vehicle: Option<CostsPerVehicle>,
    #[serde(default)]
    pub label: String,
}

impl Shipment {
    /// Returns the shipment's single visit request, as required of any
    /// shipment served via a parking (§3). Returns `None` if the shipment
    /// has zero or more than one visit request in total.
    pub fn single_visit_request(&self) -> Option<&VisitRequest> {
        match (self.pickups.as_slice(), self.deliveries.as_slice()) {
            ([pickup], []) => Some(pickup),
            ([], [delivery]) => Some(delivery),
            _ => None,
        }
    }

    pub fn is_pickup_shipment(&self) -> bool {
        self.pickups.len() == 1 && self.deliveries.is_empty()
    }

    pub fn is_mandatory(&self) -> bool {
        self.penalty_cost.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_load: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_kilometer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_hour: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakRule {
    pub break_requests: Vec<BreakRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakRequest {
    pub earliest_start_time: Timestamp,
    pub latest_start_time: Timestamp,
    pub min_duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub start_waypoint: Waypoint,
    pub end_waypoint: Waypoint,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub start_time_windows: Vec<TimeWindow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub end_time_windows: Vec<TimeWindow>,
    #[serde(default)]
    pub travel_mode: TravelMode,
    #[serde(default = "default_multiple")]
    pub travel_duration_multiple: f64,
    #[serde(default)]
    pub fixed_cost: f64,
    #[serde(default)]
    pub cost_per_hour: f64,
    #[serde(default)]
    pub cost_per_kilometer: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub load_limits: HashMap<String, LoadLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_duration_limit: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_rule: Option<BreakRule>,
    #[serde(default)]
    pub label: String,
}

fn default_multiple() -> f64 {
    1.0
}

impl Vehicle {
    /// Builds an N-round local vehicle for a parking group (§4.2): starts
    /// and ends at the parking's walking waypoint, on foot, with the
    /// parking's capacity and a high fixed cost that pushes the solver
    /// toward fewer rounds.
    pub fn local_round(
        parking_waypoint: Waypoint,
        travel_mode: TravelMode,
        travel_duration_multiple: f64,
        load_limits: HashMap<String, LoadLimit>,
        route_duration_limit: Option<Duration>,
        fixed_cost: f64,
        label: String,
    ) -> Self {
        Self {
            start_waypoint: parking_waypoint.clone(),
            end_waypoint: parking_waypoint,
            start_time_windows: Vec::new(),
            end_time_windows: Vec::new(),
            travel_mode,
            travel_duration_multiple,
            fixed_cost,
            cost_per_hour: 0.0,
            cost_per_kilometer: 0.0,
            load_limits,
            route_duration_limit,
            break_rule: None,
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionAttribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_src_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_dst_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
}

impl TransitionAttribute {
    pub fn new() -> Self {
        Self {
            src_tag: None,
            excluded_src_tag: None,
            dst_tag: None,
            excluded_dst_tag: None,
            cost: None,
            delay: None,
        }
    }

    pub fn from_tag(mut self, tag: impl Into<String>) -> Self {
        self.src_tag = Some(tag.into());
        self
    }

    pub fn excluding_from_tag(mut self, tag: impl Into<String>) -> Self {
        self.excluded_src_tag = Some(tag.into());
        self
    }

    pub fn to_tag(mut self, tag: impl Into<String>) -> Self {
        self.dst_tag = Some(tag.into());
        self
    }

    pub fn excluding_to_tag(mut self, tag: impl Into<String>) -> Self {
        self.excluded_dst_tag = Some(tag.into());
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Default for TransitionAttribute {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transition_attributes: Vec<TransitionAttribute>,
    pub global_start_time: Option<Timestamp>,
    pub global_end_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMode {
    DefaultSearch,
    ConsumeAllAvailableTime,
}

/// A minimal hint visit: references a shipment's visit request without a
/// resolved start time. Used to seed the solver via
/// `injected_first_solution_routes` (§4.5, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedVisit {
    pub shipment_index: usize,
    #[serde(default)]
    pub visit_request_index: usize,
    pub is_pickup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedRoute {
    pub vehicle_index: usize,
    #[serde(default)]
    pub visits: Vec<InjectedVisit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRequest {
    pub model: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<SearchMode>,
    #[serde(default)]
    pub populate_polylines: bool,
    #[serde(default)]
    pub populate_transition_polylines: bool,
    #[serde(default)]
    pub consider_road_traffic: bool,
    #[serde(default)]
    pub allow_large_deadline_despite_interruption_risk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_parameters: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injected_first_solution_routes: Vec<InjectedRoute>,
}

impl RoutingRequest {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            search_mode: None,
            populate_polylines: false,
            populate_transition_polylines: false,
            consider_road_traffic: false,
            allow_large_deadline_despite_interruption_risk: false,
            parent: None,
            internal_parameters: None,
            injected_first_solution_routes: Vec::new(),
        }
    }
}

/// One visit on a solved [`Route`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub shipment_index: usize,
    #[serde(default)]
    pub visit_request_index: usize,
    pub is_pickup: bool,
    pub start_time: Timestamp,
    #[serde(default)]
    pub detour: Duration,
    #[serde(default)]
    pub shipment_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injected_solution_location_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedPolyline {
    pub points: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub start_time: Timestamp,
    #[serde(default)]
    pub travel_duration: Duration,
    #[serde(default)]
    pub wait_duration: Duration,
    #[serde(default)]
    pub break_duration: Duration,
    #[serde(default)]
    pub delay_duration: Duration,
    #[serde(default)]
    pub total_duration: Duration,
    #[serde(default)]
    pub travel_distance_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_polyline: Option<EncodedPolyline>,
}

impl Transition {
    pub fn zero(start_time: Timestamp) -> Self {
        Self {
            start_time,
            travel_duration: Duration::ZERO,
            wait_duration: Duration::ZERO,
            break_duration: Duration::ZERO,
            delay_duration: Duration::ZERO,
            total_duration: Duration::ZERO,
            travel_distance_meters: 0.0,
            route_polyline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Break {
    pub start_time: Timestamp,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    #[serde(default)]
    pub travel_duration: Duration,
    #[serde(default)]
    pub wait_duration: Duration,
    #[serde(default)]
    pub delay_duration: Duration,
    #[serde(default)]
    pub break_duration: Duration,
    #[serde(default)]
    pub visit_duration: Duration,
    #[serde(default)]
    pub total_duration: Duration,
    #[serde(default)]
    pub travel_distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub vehicle_index: usize,
    #[serde(default)]
    pub vehicle_label: String,
    pub vehicle_start_time: Timestamp,
    pub vehicle_end_time: Timestamp,
    #[serde(default)]
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breaks: Vec<Break>,
    #[serde(default)]
    pub metrics: AggregatedMetrics,
    #[serde(default)]
    pub route_total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_polyline: Option<EncodedPolyline>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_traffic_infeasibilities: bool,
}

impl Route {
    /// True for a local route that actually serves a round: the parking
    /// registers a vehicle per potential round, but unused rounds solve to
    /// an empty route (§4.2).
    pub fn is_non_empty(&self) -> bool {
        !self.visits.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedShipment {
    pub index: usize,
    #[serde(default)]
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_shipments: Vec<SkippedShipment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipment_single_visit_request_detects_pickup() {
        let s = Shipment {
            pickups: vec![VisitRequest::new(Waypoint::from_location(1.0, 2.0), Duration::ZERO)],
            ..Default::default()
        };
        assert!(s.single_visit_request().is_some());
        assert!(s.is_pickup_shipment());
    }

    #[test]
    fn shipment_single_visit_request_rejects_multiple() {
        let visit = VisitRequest::new(Waypoint::from_location(1.0, 2.0), Duration::ZERO);
        let s = Shipment {
            pickups: vec![visit.clone(), visit],
            ..Default::default()
        };
        assert!(s.single_visit_request().is_none());
    }

    #[test]
    fn costs_per_vehicle_merge_sums_overlapping() {
        let a = CostsPerVehicle { vehicle_indices: vec![0, 1], costs: vec![1.0, 2.0] };
        let b = CostsPerVehicle { vehicle_indices: vec![1, 2], costs: vec![3.0, 4.0] };
        let merged = CostsPerVehicle::merge([&a, &b]);
        assert_eq!(merged.vehicle_indices, vec![0, 1, 2]);
        assert_eq!(merged.costs, vec![1.0, 5.0, 4.0]);
    }

    #[test]
    fn waypoint_strips_side_of_road() {
        let mut w = Waypoint::from_location(1.0, 2.0);
        w.side_of_road = Some(true);
        let stripped = w.without_side_of_road();
        assert!(stripped.side_of_road.is_none());
        assert!(stripped.location.is_some());
    }
}

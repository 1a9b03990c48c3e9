//! Global model builder (§4.3): carries direct shipments through unchanged
//! and turns each non-empty local route into one virtual global shipment.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::duration::{add_duration, sub_timestamps, Timestamp};
use crate::error::{Error, Result};
use crate::local_model::LocalModelIndex;
use crate::model::{
    CostsPerVehicle, Model, Route, RoutingRequest, RoutingResponse, Shipment, TimeWindow,
    Visit, VisitRequest,
};
use crate::options::PlannerOptions;
use crate::parking::ParkingRegistry;
use crate::tags::TagManager;

pub(crate) fn visit_request_for<'a>(model: &'a Model, visit: &Visit) -> &'a VisitRequest {
    let shipment = &model.shipments[visit.shipment_index];
    if visit.is_pickup {
        &shipment.pickups[visit.visit_request_index]
    } else {
        &shipment.deliveries[visit.visit_request_index]
    }
}

fn merge_overlapping(mut intervals: Vec<(Timestamp, Timestamp)>) -> Vec<(Timestamp, Timestamp)> {
    intervals.sort_by_key(|&(start, _)| start);
    let mut merged: Vec<(Timestamp, Timestamp)> = Vec::new();
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }
    merged
}

/// Intersects two sorted, disjoint interval sets via the standard linear
/// merge (§4.3).
fn intersect_interval_sets(
    a: &[(Timestamp, Timestamp)],
    b: &[(Timestamp, Timestamp)],
) -> Vec<(Timestamp, Timestamp)> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (a_start, a_end) = a[i];
        let (b_start, b_end) = b[j];
        let start = a_start.max(b_start);
        let end = a_end.min(b_end);
        if start <= end {
            result.push((start, end));
        }
        if a_end < b_end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Computes the start-time windows for one non-empty local route (§4.3).
///
/// Returns an empty vector when the intersection equals the full horizon
/// (no constraint worth emitting), and an error when it is empty.
fn start_time_windows(
    local_model: &Model,
    route: &Route,
    local_visit_tag: &str,
    global_start: Timestamp,
    global_end: Timestamp,
) -> Result<Vec<TimeWindow>> {
    let route_start = route.vehicle_start_time;
    let mut candidate = vec![(global_start, global_end)];

    for visit in &route.visits {
        let visit_request = visit_request_for(local_model, visit);
        if !visit_request.tags.iter().any(|tag| tag == local_visit_tag) {
            continue;
        }

        let offset = sub_timestamps(visit.start_time, route_start);
        let windows = if visit_request.time_windows.is_empty() {
            vec![(global_start, global_end)]
        } else {
            let mut raw: Vec<(Timestamp, Timestamp)> = visit_request
                .time_windows
                .iter()
                .map(|window| {
                    let effective_start = window.effective_start(global_start);
                    let effective_end = window.effective_end(global_end);
                    let start = add_duration(effective_start, -offset).max(global_start);
                    let end = add_duration(effective_end, -offset).min(global_end);
                    (start, end)
                })
                .filter(|(start, end)| start <= end)
                .collect();
            raw.sort_by_key(|&(start, _)| start);
            merge_overlapping(raw)
        };

        candidate = intersect_interval_sets(&candidate, &windows);
        if candidate.is_empty() {
            return Err(Error::infeasible(format!(
                "local route for vehicle {} has an empty start-time-window intersection",
                route.vehicle_index
            )));
        }
    }

    if candidate.len() == 1 && candidate[0] == (global_start, global_end) {
        return Ok(Vec::new());
    }

    Ok(candidate
        .into_iter()
        .map(|(start, end)| {
            let mut window = TimeWindow::new(start, end);
            if start == global_start {
                window.start_time = None;
            }
            if end == global_end {
                window.end_time = None;
            }
            window
        })
        .collect())
}

fn originals_in_round(route: &Route, local_index: &LocalModelIndex) -> Vec<usize> {
    let mut originals = Vec::new();
    for visit in &route.visits {
        if let Some(original) = local_index.original_for_local_shipment(visit.shipment_index) {
            if !originals.contains(&original) {
                originals.push(original);
            }
        }
    }
    originals
}

fn build_global_shipment(
    request: &RoutingRequest,
    local_request: &RoutingRequest,
    route: &Route,
    registry: &ParkingRegistry,
    local_index: &LocalModelIndex,
    tags: &mut TagManager,
    global_start: Timestamp,
    global_end: Timestamp,
) -> Result<Shipment> {
    let group = local_index.group_owning_vehicle(route.vehicle_index).ok_or_else(|| {
        Error::invariant_violation(format!("local route for vehicle {} has no owning group", route.vehicle_index))
    })?;
    let parking = registry
        .get(&group.parking_tag)
        .ok_or_else(|| Error::invariant_violation(format!("unknown parking tag {:?}", group.parking_tag)))?;
    let parking_tags = tags.tags_for(parking);

    let originals = originals_in_round(route, local_index);
    let windows = start_time_windows(&local_request.model, route, &parking_tags.local_visit, global_start, global_end)?;

    let mut load_demands: HashMap<String, i64> = HashMap::new();
    let mut all_optional = true;
    let mut penalty_sum = 0.0;
    let mut allowed: Option<Vec<usize>> = None;
    let mut costs_per_vehicle: Vec<CostsPerVehicle> = Vec::new();

    for &original_index in &originals {
        let original = &request.model.shipments[original_index];
        for (unit, &demand) in &original.load_demands {
            *load_demands.entry(unit.clone()).or_insert(0) += demand;
        }
        match original.penalty_cost {
            Some(cost) => penalty_sum += cost,
            None => all_optional = false,
        }
        if let Some(set) = &original.allowed_vehicle_indices {
            let mut sorted = set.clone();
            sorted.sort_unstable();
            allowed = Some(match allowed {
                Some(existing) => intersect_sorted(&existing, &sorted),
                None => sorted,
            });
        }
        if let Some(cpv) = &original.costs_per_vehicle {
            costs_per_vehicle.push(cpv.clone());
        }
    }

    let merged_costs = CostsPerVehicle::merge(costs_per_vehicle.iter());

    let mut visit_request = VisitRequest::new(parking.waypoint.clone(), route.metrics.total_duration);
    visit_request.time_windows = windows;
    if parking_tags.has_any_global_transition_attribute {
        visit_request.tags.push(parking_tags.global_parking.clone());
    }

    let originals_label = originals.iter().map(usize::to_string).collect::<Vec<_>>().join(",");

    Ok(Shipment {
        pickups: Vec::new(),
        deliveries: vec![visit_request],
        load_demands,
        penalty_cost: if all_optional { Some(penalty_sum) } else { None },
        allowed_vehicle_indices: allowed,
        costs_per_vehicle: if merged_costs.is_empty() { None } else { Some(merged_costs) },
        label: format!("p:{} {originals_label}", route.vehicle_index),
    })
}

/// Builds the global request from the original request and the solved
/// local response.
pub fn build_global_request(
    request: &RoutingRequest,
    local_request: &RoutingRequest,
    local_response: &RoutingResponse,
    registry: &ParkingRegistry,
    local_index: &LocalModelIndex,
    tags: &mut TagManager,
    options: &PlannerOptions,
    request_override: Option<&str>,
) -> Result<RoutingRequest> {
    tracing::debug!(
        local_routes = local_response.routes.len(),
        "building global model"
    );
    let global_start = request
        .model
        .global_start_time
        .ok_or_else(|| Error::input_inconsistency("model has no globalStartTime"))?;
    let global_end = request
        .model
        .global_end_time
        .ok_or_else(|| Error::input_inconsistency("model has no globalEndTime"))?;

    let mut shipments = Vec::new();
    for (index, shipment) in request.model.shipments.iter().enumerate() {
        if registry.is_served_via_parking(index) {
            continue;
        }
        let mut carried = shipment.clone();
        carried.label = format!("s:{index} {}", shipment.label);
        shipments.push(carried);
    }

    let mut transition_attributes = Vec::new();
    let mut seen_parkings = std::collections::HashSet::new();

    for route in &local_response.routes {
        if !route.is_non_empty() {
            continue;
        }
        let shipment =
            build_global_shipment(request, local_request, route, registry, local_index, tags, global_start, global_end)?;
        if let Some(group) = local_index.group_owning_vehicle(route.vehicle_index) {
            if seen_parkings.insert(group.parking_tag.clone()) {
                if let Some(parking) = registry.get(&group.parking_tag) {
                    transition_attributes.extend(tags.global_rules(parking));
                }
            }
        }
        shipments.push(shipment);
    }

    let model = Model {
        shipments,
        vehicles: request.model.vehicles.clone(),
        transition_attributes,
        global_start_time: Some(global_start),
        global_end_time: Some(global_end),
    };

    let mut global_request = RoutingRequest::new(model);
    global_request.search_mode = options.search_mode;
    global_request.populate_polylines = options.populate_polylines;
    global_request.populate_transition_polylines = options.populate_transition_polylines;
    global_request.consider_road_traffic = options.consider_road_traffic;
    global_request.allow_large_deadline_despite_interruption_risk =
        options.allow_large_deadline_despite_interruption_risk;
    global_request.internal_parameters = crate::options::resolve_internal_parameters(
        crate::options::Phase::InitialGlobal,
        request_override,
        &options.internal_parameters,
    );

    tracing::info!(
        direct_shipments = request.model.shipments.len() - registry.shipment_count(),
        parking_shipments = global_request.model.shipments.len() - (request.model.shipments.len() - registry.shipment_count()),
        "global model built"
    );
    Ok(global_request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Waypoint;

    fn ts(hour: u32, minute: u32) -> Timestamp {
        format!("2024-01-01T{hour:02}:{minute:02}:00Z").parse().unwrap()
    }

    fn waypoint() -> Waypoint {
        Waypoint::from_location(0.0, 0.0)
    }

    fn visit(shipment_index: usize, is_pickup: bool, start: Timestamp) -> Visit {
        Visit {
            shipment_index,
            visit_request_index: 0,
            is_pickup,
            start_time: start,
            detour: crate::duration::Duration::ZERO,
            shipment_label: String::new(),
            injected_solution_location_token: None,
        }
    }

    #[test]
    fn intersects_two_customer_windows() {
        const LOCAL_VISIT: &str = "local-visit";
        let global_start = ts(8, 0);
        let global_end = ts(18, 0);

        let visit_a = VisitRequest::new(waypoint(), crate::duration::Duration::from_minutes(3))
            .with_tag(LOCAL_VISIT)
            .with_time_windows(vec![TimeWindow::new(ts(9, 0), ts(12, 0))]);
        let visit_b = VisitRequest::new(waypoint(), crate::duration::Duration::from_minutes(3))
            .with_tag(LOCAL_VISIT)
            .with_time_windows(vec![TimeWindow::new(ts(10, 30), ts(11, 40))]);

        let model = Model {
            shipments: vec![
                Shipment { deliveries: vec![visit_a], ..Default::default() },
                Shipment { deliveries: vec![visit_b], ..Default::default() },
            ],
            vehicles: Vec::new(),
            transition_attributes: Vec::new(),
            global_start_time: Some(global_start),
            global_end_time: Some(global_end),
        };

        let route = Route {
            vehicle_index: 0,
            vehicle_label: String::new(),
            vehicle_start_time: ts(11, 0),
            vehicle_end_time: ts(12, 0),
            visits: vec![visit(0, false, ts(11, 10)), visit(1, false, ts(11, 30))],
            transitions: Vec::new(),
            breaks: Vec::new(),
            metrics: Default::default(),
            route_total_cost: 0.0,
            route_polyline: None,
            has_traffic_infeasibilities: false,
        };

        let windows = start_time_windows(&model, &route, LOCAL_VISIT, global_start, global_end).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, Some(ts(10, 0)));
        assert_eq!(windows[0].end_time, Some(ts(11, 10)));
    }

    #[test]
    fn unconstrained_visits_yield_no_window() {
        const LOCAL_VISIT: &str = "local-visit";
        let global_start = ts(8, 0);
        let global_end = ts(18, 0);
        let visit_a = VisitRequest::new(waypoint(), crate::duration::Duration::from_minutes(3)).with_tag(LOCAL_VISIT);
        let model = Model {
            shipments: vec![Shipment { deliveries: vec![visit_a], ..Default::default() }],
            vehicles: Vec::new(),
            transition_attributes: Vec::new(),
            global_start_time: Some(global_start),
            global_end_time: Some(global_end),
        };
        let route = Route {
            vehicle_index: 0,
            vehicle_label: String::new(),
            vehicle_start_time: ts(11, 0),
            vehicle_end_time: ts(11, 30),
            visits: vec![visit(0, false, ts(11, 10))],
            transitions: Vec::new(),
            breaks: Vec::new(),
            metrics: Default::default(),
            route_total_cost: 0.0,
            route_polyline: None,
            has_traffic_infeasibilities: false,
        };
        let windows = start_time_windows(&model, &route, LOCAL_VISIT, global_start, global_end).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn empty_intersection_is_an_error() {
        const LOCAL_VISIT: &str = "local-visit";
        let global_start = ts(8, 0);
        let global_end = ts(18, 0);
        let visit_a = VisitRequest::new(waypoint(), crate::duration::Duration::from_minutes(3))
            .with_tag(LOCAL_VISIT)
            .with_time_windows(vec![TimeWindow::new(ts(9, 0), ts(9, 30))]);
        let visit_b = VisitRequest::new(waypoint(), crate::duration::Duration::from_minutes(3))
            .with_tag(LOCAL_VISIT)
            .with_time_windows(vec![TimeWindow::new(ts(16, 0), ts(17, 0))]);
        let model = Model {
            shipments: vec![
                Shipment { deliveries: vec![visit_a], ..Default::default() },
                Shipment { deliveries: vec![visit_b], ..Default::default() },
            ],
            vehicles: Vec::new(),
            transition_attributes: Vec::new(),
            global_start_time: Some(global_start),
            global_end_time: Some(global_end),
        };
        let route = Route {
            vehicle_index: 0,
            vehicle_label: String::new(),
            vehicle_start_time: ts(11, 0),
            vehicle_end_time: ts(12, 0),
            visits: vec![visit(0, false, ts(11, 5)), visit(1, false, ts(11, 30))],
            transitions: Vec::new(),
            breaks: Vec::new(),
            metrics: Default::default(),
            route_total_cost: 0.0,
            route_polyline: None,
            has_traffic_infeasibilities: false,
        };
        let err = start_time_windows(&model, &route, LOCAL_VISIT, global_start, global_end).unwrap_err();
        assert!(matches!(err, Error::Infeasible(_)));
    }

    #[test]
    fn allowed_vehicle_intersection_ignores_unconstrained_originals() {
        assert_eq!(intersect_sorted(&[1, 2, 3], &[2, 3, 4]), vec![2, 3]);
    }
}

//! Refinement model builder (§4.5): finds back-to-back visits to the same
//! parking in a global route and gives the solver room to reorder across
//! round boundaries that the local/global split artificially froze.

use std::collections::HashMap;

use crate::duration::{Duration, Timestamp};
use crate::error::{Error, Result};
use crate::local_model::{build_local_shipment, load_limits_for, LocalModelIndex};
use crate::merge::parse_parking_label;
use crate::model::{
    InjectedRoute, InjectedVisit, Model, Route, RoutingRequest, RoutingResponse, Shipment,
    TimeWindow, Vehicle, VisitRequest,
};
use crate::options::PlannerOptions;
use crate::parking::{ParkingLocation, ParkingRegistry};
use crate::tags::TagManager;

/// A large per-hour cost so the solver treats the run's original end time as
/// a de facto ceiling without making it a hard constraint (§4.5).
const OVERRUN_COST_PER_HOUR: f64 = 1_000_000.0;

/// One maximal run (length ≥ 2) of consecutive same-parking visits within a
/// global route.
#[derive(Debug, Clone)]
struct Run {
    parking_tag: String,
    /// Indices into `route.visits`.
    positions: Vec<usize>,
}

/// A visit's `injected_solution_location_token` is meant to pin it to a
/// specific solver-chosen location; siblings within the same run are
/// expected to agree whenever they carry one. Disagreement does not block
/// refinement — it is logged and the run proceeds (§7).
fn warn_on_disagreeing_injection_tokens(route: &Route, run: &Run) {
    let mut tokens = run.positions.iter().filter_map(|&p| route.visits[p].injected_solution_location_token.as_deref());
    let Some(first) = tokens.next() else { return };
    if tokens.any(|t| t != first) {
        tracing::warn!(
            global_vehicle = route.vehicle_index,
            start_position = run.positions[0],
            parking_tag = %run.parking_tag,
            "injected-solution-location tokens disagree across a refinement run"
        );
    }
}

fn parking_tag_at(route: &Route, position: usize, local_index: &LocalModelIndex) -> Option<String> {
    let (local_vehicle_index, _) = parse_parking_label(&route.visits[position].shipment_label)?;
    local_index.group_owning_vehicle(local_vehicle_index).map(|g| g.parking_tag.clone())
}

/// A run is broken by a break sitting between the two visits, or by a
/// negative wait duration on the transition leading into the later visit
/// (§4.5).
fn broken_between(route: &Route, earlier: usize, later: usize) -> bool {
    if route.transitions[later].wait_duration.is_negative() {
        return true;
    }
    let earlier_end = route.visits[earlier].start_time;
    let later_start = route.visits[later].start_time;
    route.breaks.iter().any(|b| b.start_time >= earlier_end && b.start_time < later_start)
}

fn find_runs(route: &Route, local_index: &LocalModelIndex) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Option<Run> = None;

    for position in 0..route.visits.len() {
        let tag = parking_tag_at(route, position, local_index);
        let continues = match (&current, &tag) {
            (Some(run), Some(tag)) => {
                run.parking_tag == *tag && !broken_between(route, *run.positions.last().unwrap(), position)
            }
            _ => false,
        };

        if continues {
            current.as_mut().unwrap().positions.push(position);
            continue;
        }

        if let Some(run) = current.take() {
            if run.positions.len() >= 2 {
                runs.push(run);
            }
        }
        current = tag.map(|parking_tag| Run { parking_tag, positions: vec![position] });
    }

    if let Some(run) = current.take() {
        if run.positions.len() >= 2 {
            runs.push(run);
        }
    }

    runs
}

fn barrier_shipment(parking: &ParkingLocation, pickup_tag: &str, delivery_tag: &str, vehicle_index: usize) -> Shipment {
    let pickup = VisitRequest::new(parking.walking_waypoint(), Duration::ZERO).with_tag(pickup_tag);
    let delivery = VisitRequest::new(parking.walking_waypoint(), Duration::ZERO).with_tag(delivery_tag);
    Shipment {
        pickups: vec![pickup],
        deliveries: vec![delivery],
        load_demands: parking.delivery_load_limits.clone(),
        penalty_cost: None,
        allowed_vehicle_indices: Some(vec![vehicle_index]),
        costs_per_vehicle: None,
        label: format!("barrier {}", parking.tag),
    }
}

/// Identifies one refinement run in the model built below, by the identity
/// its own vehicle's label carries (§4.6 parses this back out of the
/// solved refinement response).
#[derive(Debug, Clone)]
pub struct RefinementRun {
    pub global_vehicle_index: usize,
    pub start_position: usize,
    pub run_length: usize,
    pub parking_tag: String,
    pub refinement_vehicle_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RefinementIndex {
    pub runs: Vec<RefinementRun>,
}

/// Parses a refinement vehicle's `global_route:<g> start:<v> size:<n>
/// parking:<tag>` label.
pub(crate) fn parse_refinement_vehicle_label(label: &str) -> Option<(usize, usize, usize, String)> {
    let rest = label.strip_prefix("global_route:")?;
    let (g_str, rest) = rest.split_once(" start:")?;
    let (v_str, rest) = rest.split_once(" size:")?;
    let (n_str, tag) = rest.split_once(" parking:")?;
    Some((g_str.parse().ok()?, v_str.parse().ok()?, n_str.parse().ok()?, tag.to_string()))
}

fn run_bounds(route: &Route, run: &Run, local_response: &RoutingResponse) -> Result<(Timestamp, Timestamp)> {
    let start = route.visits[run.positions[0]].start_time;
    let last_position = *run.positions.last().unwrap();
    let last_visit = &route.visits[last_position];
    let (local_vehicle_index, _) = parse_parking_label(&last_visit.shipment_label).ok_or_else(|| {
        Error::invariant_violation(format!("refinement run visit at position {last_position} is not a parking visit"))
    })?;
    let local_route = local_response
        .routes
        .iter()
        .find(|r| r.vehicle_index == local_vehicle_index)
        .ok_or_else(|| Error::model_violation(format!("no local route for vehicle {local_vehicle_index}")))?;
    let end = crate::duration::add_duration(last_visit.start_time, local_route.metrics.total_duration);
    Ok((start, end))
}

/// Builds the refinement request for every qualifying run across every
/// global route, and the index the integrator needs to place the solved
/// routes back (§4.5).
pub fn build_refinement_request(
    request: &RoutingRequest,
    local_response: &RoutingResponse,
    global_response: &RoutingResponse,
    registry: &ParkingRegistry,
    local_index: &LocalModelIndex,
    tags: &mut TagManager,
    options: &PlannerOptions,
) -> Result<(RoutingRequest, RefinementIndex)> {
    tracing::debug!(global_routes = global_response.routes.len(), "scanning for refinement runs");
    let mut shipments = Vec::new();
    let mut vehicles = Vec::new();
    let mut injected_routes = Vec::new();
    let mut transition_attributes = Vec::new();
    let mut seen_parkings = std::collections::HashSet::new();
    let mut runs_index = Vec::new();

    for global_route in &global_response.routes {
        for run in find_runs(global_route, local_index) {
            let parking = registry
                .get(&run.parking_tag)
                .ok_or_else(|| Error::invariant_violation(format!("unknown parking tag {:?}", run.parking_tag)))?;
            let parking_tags = tags.tags_for(parking);

            if seen_parkings.insert(run.parking_tag.clone()) {
                transition_attributes.extend(tags.local_refinement_rules(parking));
            }

            let (run_start, run_end) = run_bounds(global_route, &run, local_response)?;
            let vehicle_index = vehicles.len();
            tracing::debug!(
                global_vehicle = global_route.vehicle_index,
                start_position = run.positions[0],
                run_length = run.positions.len(),
                parking_tag = %run.parking_tag,
                "refinement run found"
            );

            vehicles.push(Vehicle {
                start_waypoint: parking.walking_waypoint(),
                end_waypoint: parking.walking_waypoint(),
                start_time_windows: vec![TimeWindow::new(run_start, run_start)],
                end_time_windows: vec![TimeWindow {
                    start_time: None,
                    end_time: None,
                    soft_start_time: None,
                    soft_end_time: Some(run_end),
                    cost_per_hour_before_soft_start_time: None,
                    cost_per_hour_after_soft_end_time: Some(OVERRUN_COST_PER_HOUR),
                }],
                travel_mode: parking.travel_mode,
                travel_duration_multiple: parking.travel_duration_multiplier,
                fixed_cost: 0.0,
                cost_per_hour: 0.0,
                cost_per_kilometer: 0.0,
                load_limits: load_limits_for(parking),
                route_duration_limit: None,
                break_rule: None,
                label: format!(
                    "global_route:{} start:{} size:{} parking:{}",
                    global_route.vehicle_index,
                    run.positions[0],
                    run.positions.len(),
                    run.parking_tag
                ),
            });

            warn_on_disagreeing_injection_tokens(global_route, &run);

            let mut visits = Vec::new();
            for &position in &run.positions {
                let global_visit = &global_route.visits[position];
                let (local_vehicle_index, _) = parse_parking_label(&global_visit.shipment_label).ok_or_else(|| {
                    Error::invariant_violation(format!("refinement run visit at position {position} is not a parking visit"))
                })?;
                let local_route = local_response
                    .routes
                    .iter()
                    .find(|r| r.vehicle_index == local_vehicle_index)
                    .ok_or_else(|| Error::model_violation(format!("no local route for vehicle {local_vehicle_index}")))?;

                let mut local_to_new: HashMap<usize, usize> = HashMap::new();
                for visit in &local_route.visits {
                    let original_index = local_index.original_for_local_shipment(visit.shipment_index).ok_or_else(|| {
                        Error::invariant_violation(format!("local shipment {} has no original", visit.shipment_index))
                    })?;
                    let new_index = *local_to_new.entry(visit.shipment_index).or_insert_with(|| {
                        let original = &request.model.shipments[original_index];
                        shipments.push(build_local_shipment(
                            original_index,
                            original,
                            parking,
                            &parking_tags.local_visit,
                            &parking_tags.local_unload_from_vehicle,
                            &parking_tags.local_load_to_vehicle,
                            parking.unload_duration_per_item.unwrap_or(Duration::ZERO),
                            parking.load_duration_per_item.unwrap_or(Duration::ZERO),
                            vec![vehicle_index],
                        ));
                        shipments.len() - 1
                    });
                    visits.push(InjectedVisit {
                        shipment_index: new_index,
                        visit_request_index: 0,
                        is_pickup: visit.is_pickup,
                        start_time: None,
                    });
                }

                // A barrier follows every round in the run, including the
                // last (one per internal boundary, plus one trailing) so
                // the solver always has somewhere to reload between or
                // after rounds (§4.5).
                let barrier = barrier_shipment(
                    parking,
                    &parking_tags.barrier_pickup,
                    &parking_tags.barrier_delivery,
                    vehicle_index,
                );
                shipments.push(barrier);
                let barrier_index = shipments.len() - 1;
                visits.push(InjectedVisit {
                    shipment_index: barrier_index,
                    visit_request_index: 0,
                    is_pickup: true,
                    start_time: None,
                });
                visits.push(InjectedVisit {
                    shipment_index: barrier_index,
                    visit_request_index: 0,
                    is_pickup: false,
                    start_time: None,
                });
            }

            injected_routes.push(InjectedRoute { vehicle_index, visits, label: None });

            runs_index.push(RefinementRun {
                global_vehicle_index: global_route.vehicle_index,
                start_position: run.positions[0],
                run_length: run.positions.len(),
                parking_tag: run.parking_tag.clone(),
                refinement_vehicle_index: vehicle_index,
            });
        }
    }

    let model = Model {
        shipments,
        vehicles,
        transition_attributes,
        global_start_time: request.model.global_start_time,
        global_end_time: request.model.global_end_time,
    };

    let mut refinement_request = RoutingRequest::new(model);
    refinement_request.search_mode = options.search_mode;
    refinement_request.populate_polylines = options.populate_polylines;
    refinement_request.populate_transition_polylines = options.populate_transition_polylines;
    refinement_request.consider_road_traffic = options.consider_road_traffic;
    refinement_request.allow_large_deadline_despite_interruption_risk =
        options.allow_large_deadline_despite_interruption_risk;
    refinement_request.injected_first_solution_routes = injected_routes;
    refinement_request.internal_parameters = crate::options::resolve_internal_parameters(
        crate::options::Phase::RefinementLocal,
        None,
        &options.internal_parameters,
    );

    tracing::info!(runs = runs_index.len(), "refinement model built");
    Ok((refinement_request, RefinementIndex { runs: runs_index }))
}

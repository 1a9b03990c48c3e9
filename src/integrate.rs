//! Refinement integrator (§4.6): folds a solved refinement response back
//! into the local model, splitting each refined run on its barrier
//! boundaries, and produces the integrated global side in one of three
//! fidelities.

use std::collections::HashMap;

use crate::duration::{add_duration, sub_timestamps, Duration, Timestamp};
use crate::error::{Error, Result};
use crate::global_model::{self, visit_request_for};
use crate::local_model::{build_local_shipment, GroupInfo, LocalModelIndex};
use crate::merge::parse_parking_label;
use crate::model::{
    AggregatedMetrics, InjectedRoute, InjectedVisit, Model, Route, RoutingRequest, RoutingResponse,
    Transition, Vehicle, Visit,
};
use crate::options::PlannerOptions;
use crate::parking::ParkingRegistry;
use crate::refinement::{parse_refinement_vehicle_label, RefinementIndex};
use crate::tags::TagManager;

/// How much of the integrated global side to compute eagerly (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMode {
    /// Visit identities only, no timing hints.
    VisitsOnly,
    /// Visit identities plus the original/new start times as hints.
    VisitsAndStartTimes,
    /// A complete, self-consistent integrated global response.
    FullRoutes,
}

/// The always-produced, always-consistent integrated local side.
pub struct IntegratedLocal {
    pub request: RoutingRequest,
    pub response: RoutingResponse,
    pub index: LocalModelIndex,
}

/// The integrated global side, whose populated fields depend on the
/// requested [`IntegrationMode`].
pub struct IntegratedGlobal {
    pub injected_routes: Vec<InjectedRoute>,
    pub response: Option<RoutingResponse>,
}

fn parse_local_shipment_label(label: &str) -> Option<usize> {
    label.split_once(": ")?.0.parse().ok()
}

fn is_barrier(label: &str) -> bool {
    label.starts_with("barrier ")
}

/// Splits one solved refinement route into its constituent rounds on
/// barrier pickup→delivery boundaries (§4.6 step 3), returning, for each
/// round, the slice of visits and the slice of transitions (one longer)
/// that belong to it.
fn split_refinement_route<'a>(route: &'a Route) -> Result<Vec<(&'a [Visit], &'a [Transition])>> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < route.visits.len() {
        let visit = &route.visits[i];
        if is_barrier(&visit.shipment_label) && visit.is_pickup {
            let delivery = route.visits.get(i + 1).ok_or_else(|| {
                Error::model_violation("barrier pickup has no matching delivery".to_string())
            })?;
            if !is_barrier(&delivery.shipment_label) || delivery.is_pickup {
                return Err(Error::model_violation(
                    "barrier pickup is not immediately followed by its delivery".to_string(),
                ));
            }
            if i > start {
                segments.push((&route.visits[start..i], &route.transitions[start..=i]));
            }
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < route.visits.len() {
        segments.push((&route.visits[start..], &route.transitions[start..=route.visits.len()]));
    }
    Ok(segments)
}

struct BuiltRound {
    vehicle_index: usize,
    route: Route,
    parking_tag: String,
}

/// Rebuilds one round (whether carried unchanged or split out of a
/// refinement route) into the integrated local model's arrays.
fn push_round(
    vehicles: &mut Vec<Vehicle>,
    new_vehicle: Vehicle,
    visits: Vec<Visit>,
    transitions: Vec<Transition>,
    visit_duration: Duration,
    parking_tag: String,
) -> BuiltRound {
    let vehicle_index = vehicles.len();
    vehicles.push(new_vehicle);
    let travel_duration: Duration = transitions.iter().map(|t| t.travel_duration).sum();
    let wait_duration: Duration = transitions.iter().map(|t| t.wait_duration).sum();
    let delay_duration: Duration = transitions.iter().map(|t| t.delay_duration).sum();
    let break_duration: Duration = transitions.iter().map(|t| t.break_duration).sum();
    let total_duration = travel_duration + wait_duration + delay_duration + break_duration + visit_duration;
    let travel_distance_meters: f64 = transitions.iter().map(|t| t.travel_distance_meters).sum();
    let vehicle_start_time = transitions[0].start_time;
    let vehicle_end_time = vehicle_start_time + total_duration_as_chrono(total_duration);
    let route = Route {
        vehicle_index,
        vehicle_label: vehicles[vehicle_index].label.clone(),
        vehicle_start_time,
        vehicle_end_time,
        visits,
        transitions,
        breaks: Vec::new(),
        metrics: AggregatedMetrics {
            travel_duration,
            wait_duration,
            delay_duration,
            break_duration,
            visit_duration,
            total_duration,
            travel_distance_meters,
        },
        route_total_cost: 0.0,
        route_polyline: None,
        has_traffic_infeasibilities: false,
    };
    BuiltRound { vehicle_index, route, parking_tag }
}

fn total_duration_as_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis())
}

/// Indexes refinement runs by `(global_vehicle_index, start_position)`, the
/// key used to recognize a run's start while walking a global route
/// (§4.6 step 1).
fn index_refinement_runs(refinement_index: &RefinementIndex) -> HashMap<(usize, usize), usize> {
    refinement_index
        .runs
        .iter()
        .map(|run| ((run.global_vehicle_index, run.start_position), run.refinement_vehicle_index))
        .collect()
}

/// A new global shipment waiting to be built, carrying enough context to
/// emit an injected-route hint once the integrated local side is final.
struct PendingGlobalVisit {
    global_vehicle_index: usize,
    start_time: Timestamp,
    local_vehicle_index: usize,
}

#[allow(clippy::too_many_arguments)]
pub fn integrate(
    request: &RoutingRequest,
    local_request: &RoutingRequest,
    local_response: &RoutingResponse,
    local_index: &LocalModelIndex,
    global_response: &RoutingResponse,
    refinement_request: &RoutingRequest,
    refinement_response: &RoutingResponse,
    refinement_index: &RefinementIndex,
    registry: &ParkingRegistry,
    tags: &mut TagManager,
    options: &PlannerOptions,
    mode: IntegrationMode,
    request_override: Option<&str>,
) -> Result<(IntegratedLocal, IntegratedGlobal)> {
    tracing::debug!(
        global_routes = global_response.routes.len(),
        runs = refinement_index.runs.len(),
        mode = ?mode,
        "integrating refinement result"
    );
    let run_starts = index_refinement_runs(refinement_index);

    let mut shipments = Vec::new();
    let mut vehicles = Vec::new();
    let mut routes = Vec::new();
    let mut groups_by_tag: HashMap<String, GroupInfo> = HashMap::new();
    let mut direct_count = 0usize;
    let mut pending_globals: Vec<PendingGlobalVisit> = Vec::new();

    for original_index in 0..request.model.shipments.len() {
        if !registry.is_served_via_parking(original_index) {
            direct_count += 1;
        }
    }

    for global_route in &global_response.routes {
        let g = global_route.vehicle_index;
        let mut i = 0usize;
        while i < global_route.visits.len() {
            let visit = &global_route.visits[i];

            if let Some(&refinement_vehicle_index) = run_starts.get(&(g, i)) {
                let run = refinement_index
                    .runs
                    .iter()
                    .find(|r| r.global_vehicle_index == g && r.start_position == i)
                    .expect("looked up by the same key");
                let refinement_route = refinement_response
                    .routes
                    .iter()
                    .find(|r| r.vehicle_index == refinement_vehicle_index)
                    .ok_or_else(|| {
                        Error::model_violation(format!("no refinement route for vehicle {refinement_vehicle_index}"))
                    })?;
                let (parsed_g, parsed_v, parsed_n, parsed_tag) =
                    parse_refinement_vehicle_label(&refinement_route.vehicle_label).ok_or_else(|| {
                        Error::model_violation(format!(
                            "refinement vehicle label {:?} does not parse",
                            refinement_route.vehicle_label
                        ))
                    })?;
                if (parsed_g, parsed_v, parsed_n, &parsed_tag) != (g, i, run.run_length, &run.parking_tag) {
                    return Err(Error::model_violation(
                        "refinement vehicle label disagrees with the run index".to_string(),
                    ));
                }
                let parking = registry
                    .get(&run.parking_tag)
                    .ok_or_else(|| Error::invariant_violation(format!("unknown parking tag {:?}", run.parking_tag)))?;
                let parking_tags = tags.tags_for(parking);

                let rounds = split_refinement_route(refinement_route)?;
                tracing::debug!(
                    global_vehicle = g,
                    start_position = i,
                    parking_tag = %run.parking_tag,
                    rounds = rounds.len(),
                    "split refinement run into rounds"
                );
                for (segment_visits, segment_transitions) in rounds {
                    let mut local_to_new: HashMap<usize, usize> = HashMap::new();
                    let mut new_visits = Vec::with_capacity(segment_visits.len());
                    for visit in segment_visits {
                        let refinement_shipment = &refinement_request.model.shipments[visit.shipment_index];
                        let original_index = parse_local_shipment_label(&refinement_shipment.label).ok_or_else(|| {
                            Error::invariant_violation(format!(
                                "refinement shipment label {:?} does not carry an original index",
                                refinement_shipment.label
                            ))
                        })?;
                        let new_index = *local_to_new.entry(visit.shipment_index).or_insert_with(|| {
                            let original = &request.model.shipments[original_index];
                            let new_vehicle_index_placeholder = vehicles.len();
                            shipments.push(build_local_shipment(
                                original_index,
                                original,
                                parking,
                                &parking_tags.local_visit,
                                &parking_tags.local_unload_from_vehicle,
                                &parking_tags.local_load_to_vehicle,
                                parking.unload_duration_per_item.unwrap_or(Duration::ZERO),
                                parking.load_duration_per_item.unwrap_or(Duration::ZERO),
                                vec![new_vehicle_index_placeholder],
                            ));
                            shipments.len() - 1
                        });
                        new_visits.push(Visit {
                            shipment_index: new_index,
                            visit_request_index: 0,
                            is_pickup: visit.is_pickup,
                            start_time: visit.start_time,
                            detour: visit.detour,
                            shipment_label: shipments[new_index].label.clone(),
                            injected_solution_location_token: visit.injected_solution_location_token.clone(),
                        });
                    }

                    let mut new_transitions: Vec<Transition> = segment_transitions.to_vec();
                    let last = new_transitions.last_mut().expect("segment always has >= 1 transition");
                    last.delay_duration = Duration::ZERO;
                    last.total_duration =
                        last.travel_duration + last.wait_duration + last.break_duration + last.delay_duration;

                    // Every shipment just built above was stamped with a
                    // provisional `allowed_vehicle_indices` guess equal to the
                    // vehicle-count at the time it was created; since no other
                    // vehicle is minted in between, that guess always equals the
                    // round's real new vehicle index once it's assigned.
                    let new_vehicle_index = vehicles.len();
                    for &new_index in local_to_new.values() {
                        shipments[new_index].allowed_vehicle_indices = Some(vec![new_vehicle_index]);
                    }

                    let new_vehicle = Vehicle::local_round(
                        parking.walking_waypoint(),
                        parking.travel_mode,
                        parking.travel_duration_multiplier,
                        crate::local_model::load_limits_for(parking),
                        parking.max_round_duration,
                        0.0,
                        format!("parking:{} round(refined):{}", parking.tag, vehicles.len()),
                    );

                    let visit_duration: Duration = new_visits
                        .iter()
                        .map(|v| {
                            let shipment = &shipments[v.shipment_index];
                            let visit_request =
                                if v.is_pickup { &shipment.pickups[v.visit_request_index] } else { &shipment.deliveries[v.visit_request_index] };
                            visit_request.duration
                        })
                        .sum();
                    let built = push_round(
                        &mut vehicles,
                        new_vehicle,
                        new_visits,
                        new_transitions,
                        visit_duration,
                        run.parking_tag.clone(),
                    );
                    let start_time = built.route.vehicle_start_time;
                    routes.push(built.route);
                    groups_by_tag
                        .entry(built.parking_tag.clone())
                        .or_insert_with(|| GroupInfo {
                            parking_tag: built.parking_tag.clone(),
                            vehicle_indices: Vec::new(),
                            local_shipment_indices: Vec::new(),
                            originals: Vec::new(),
                        })
                        .vehicle_indices
                        .push(built.vehicle_index);
                    pending_globals.push(PendingGlobalVisit {
                        global_vehicle_index: g,
                        start_time,
                        local_vehicle_index: built.vehicle_index,
                    });
                }

                i += run.run_length;
                continue;
            }

            if let Some((old_local_vehicle_index, _originals)) = parse_parking_label(&visit.shipment_label) {
                let old_local_route = local_response
                    .routes
                    .iter()
                    .find(|r| r.vehicle_index == old_local_vehicle_index)
                    .ok_or_else(|| {
                        Error::model_violation(format!("no local route for vehicle {old_local_vehicle_index}"))
                    })?;
                let group = local_index.group_owning_vehicle(old_local_vehicle_index).ok_or_else(|| {
                    Error::invariant_violation(format!(
                        "local vehicle {old_local_vehicle_index} has no owning group"
                    ))
                })?;
                let new_vehicle_index = vehicles.len();
                let mut local_to_new: HashMap<usize, usize> = HashMap::new();
                let mut new_visits = Vec::with_capacity(old_local_route.visits.len());
                for old_visit in &old_local_route.visits {
                    let new_index = *local_to_new.entry(old_visit.shipment_index).or_insert_with(|| {
                        let mut carried = local_request.model.shipments[old_visit.shipment_index].clone();
                        carried.allowed_vehicle_indices = Some(vec![new_vehicle_index]);
                        shipments.push(carried);
                        shipments.len() - 1
                    });
                    new_visits.push(Visit { shipment_index: new_index, ..old_visit.clone() });
                }
                vehicles.push(local_request.model.vehicles[old_local_vehicle_index].clone());
                let route = Route {
                    vehicle_index: new_vehicle_index,
                    vehicle_label: vehicles[new_vehicle_index].label.clone(),
                    visits: new_visits,
                    transitions: old_local_route.transitions.clone(),
                    ..old_local_route.clone()
                };
                let start_time = route.vehicle_start_time;
                routes.push(route);
                groups_by_tag
                    .entry(group.parking_tag.clone())
                    .or_insert_with(|| GroupInfo {
                        parking_tag: group.parking_tag.clone(),
                        vehicle_indices: Vec::new(),
                        local_shipment_indices: Vec::new(),
                        originals: Vec::new(),
                    })
                    .vehicle_indices
                    .push(new_vehicle_index);
                pending_globals.push(PendingGlobalVisit {
                    global_vehicle_index: g,
                    start_time,
                    local_vehicle_index: new_vehicle_index,
                });
                i += 1;
                continue;
            }

            // Direct shipment visits need no local-side action.
            i += 1;
        }
    }

    for group in groups_by_tag.values_mut() {
        for &vehicle_index in &group.vehicle_indices {
            for visit in &routes[vehicle_index].visits {
                if let Some(original) = parse_local_shipment_label(&shipments[visit.shipment_index].label) {
                    if !group.local_shipment_indices.contains(&visit.shipment_index) {
                        group.local_shipment_indices.push(visit.shipment_index);
                        group.originals.push(original);
                    }
                }
            }
        }
    }

    let mut transition_attributes = Vec::new();
    let mut seen_parkings = std::collections::HashSet::new();
    for group in groups_by_tag.values() {
        if seen_parkings.insert(group.parking_tag.clone()) {
            let parking = registry
                .get(&group.parking_tag)
                .ok_or_else(|| Error::invariant_violation(format!("unknown parking tag {:?}", group.parking_tag)))?;
            transition_attributes.extend(tags.local_rules(parking));
        }
    }

    let integrated_local_index = LocalModelIndex { groups: groups_by_tag.into_values().collect() };

    let model = Model {
        shipments,
        vehicles,
        transition_attributes,
        global_start_time: local_request.model.global_start_time,
        global_end_time: local_request.model.global_end_time,
    };
    let mut integrated_local_request = RoutingRequest::new(model);
    integrated_local_request.search_mode = options.search_mode;
    integrated_local_request.populate_polylines = options.populate_polylines;
    integrated_local_request.populate_transition_polylines = options.populate_transition_polylines;
    integrated_local_request.consider_road_traffic = options.consider_road_traffic;
    integrated_local_request.allow_large_deadline_despite_interruption_risk =
        options.allow_large_deadline_despite_interruption_risk;
    integrated_local_request.internal_parameters = crate::options::resolve_internal_parameters(
        crate::options::Phase::RefinementLocal,
        None,
        &options.internal_parameters,
    );

    let integrated_local_response = RoutingResponse { routes, skipped_shipments: local_response.skipped_shipments.clone() };

    let integrated_local = IntegratedLocal {
        request: integrated_local_request,
        response: integrated_local_response,
        index: integrated_local_index,
    };

    // Every non-empty local route, in array order, gets exactly one global
    // shipment appended after the direct ones (mirrors `build_global_request`'s
    // own iteration order), so the shipment index for a pending visit is
    // predictable without re-deriving it from the rebuilt request.
    let mut global_index_by_local_vehicle: HashMap<usize, usize> = HashMap::new();
    let mut next_global_index = direct_count;
    for route in &integrated_local.response.routes {
        if route.is_non_empty() {
            global_index_by_local_vehicle.insert(route.vehicle_index, next_global_index);
            next_global_index += 1;
        }
    }

    let mut injected_by_vehicle: HashMap<usize, Vec<InjectedVisit>> = HashMap::new();
    for global_route in &global_response.routes {
        let g = global_route.vehicle_index;
        for visit in &global_route.visits {
            if let Some(original_index) = crate::merge::parse_direct_label(&visit.shipment_label) {
                let start_time = (mode != IntegrationMode::VisitsOnly).then_some(visit.start_time);
                injected_by_vehicle.entry(g).or_default().push(InjectedVisit {
                    shipment_index: original_index_to_direct_shipment_index(request, registry, original_index),
                    visit_request_index: 0,
                    is_pickup: request.model.shipments[original_index].is_pickup_shipment(),
                    start_time,
                });
            }
        }
    }
    for pending in &pending_globals {
        let shipment_index = *global_index_by_local_vehicle.get(&pending.local_vehicle_index).ok_or_else(|| {
            Error::invariant_violation(format!(
                "local vehicle {} produced no global shipment",
                pending.local_vehicle_index
            ))
        })?;
        let start_time = (mode != IntegrationMode::VisitsOnly).then_some(pending.start_time);
        injected_by_vehicle.entry(pending.global_vehicle_index).or_default().push(InjectedVisit {
            shipment_index,
            visit_request_index: 0,
            is_pickup: false,
            start_time,
        });
    }

    let injected_routes: Vec<InjectedRoute> = injected_by_vehicle
        .into_iter()
        .map(|(vehicle_index, visits)| InjectedRoute { vehicle_index, visits, label: None })
        .collect();

    let response = if mode == IntegrationMode::FullRoutes {
        Some(build_full_integrated_global_response(
            request,
            &integrated_local,
            global_response,
            registry,
            tags,
            options,
            &global_index_by_local_vehicle,
            &pending_globals,
            direct_count,
            request_override,
        )?)
    } else {
        None
    };

    tracing::info!(
        local_vehicles = integrated_local.response.routes.len(),
        injected_routes = injected_routes.len(),
        "refinement integration complete"
    );
    Ok((integrated_local, IntegratedGlobal { injected_routes, response }))
}

/// Mirrors `build_global_request`'s own direct-shipment loop: a direct
/// shipment's position in the rebuilt global model is the count of
/// non-parking-served shipments before it, not its original index.
fn original_index_to_direct_shipment_index(_request: &RoutingRequest, registry: &ParkingRegistry, original_index: usize) -> usize {
    (0..original_index).filter(|&i| !registry.is_served_via_parking(i)).count()
}

/// Builds the `FullRoutes` integrated global response by rebuilding the
/// global request from the integrated local side and stitching each
/// original global route's direct/round visits back together with fresh
/// reload transitions at split boundaries (§4.6 steps 4-5).
#[allow(clippy::too_many_arguments)]
fn build_full_integrated_global_response(
    request: &RoutingRequest,
    integrated_local: &IntegratedLocal,
    global_response: &RoutingResponse,
    registry: &ParkingRegistry,
    tags: &mut TagManager,
    options: &PlannerOptions,
    global_index_by_local_vehicle: &HashMap<usize, usize>,
    pending_globals: &[PendingGlobalVisit],
    direct_count: usize,
    request_override: Option<&str>,
) -> Result<RoutingResponse> {
    let rebuilt_global_request = global_model::build_global_request(
        request,
        &integrated_local.request,
        &integrated_local.response,
        registry,
        &integrated_local.index,
        tags,
        options,
        request_override,
    )?;
    let _ = direct_count;

    let mut by_local_vehicle: HashMap<usize, &PendingGlobalVisit> =
        HashMap::new();
    for pending in pending_globals {
        by_local_vehicle.insert(pending.local_vehicle_index, pending);
    }

    let mut routes = Vec::with_capacity(global_response.routes.len());
    for original_route in &global_response.routes {
        let mut visits: Vec<Visit> = Vec::new();
        let mut i = 0usize;
        while i < original_route.visits.len() {
            let visit = &original_route.visits[i];
            if let Some(original_index) = crate::merge::parse_direct_label(&visit.shipment_label) {
                let label = format!("s:{original_index} {}", request.model.shipments[original_index].label);
                let shipment_index = rebuilt_global_request
                    .model
                    .shipments
                    .iter()
                    .position(|s| s.label == label)
                    .ok_or_else(|| Error::invariant_violation(format!("direct shipment {label:?} missing from rebuilt global model")))?;
                visits.push(Visit { shipment_index, ..visit.clone() });
                i += 1;
                continue;
            }
            if let Some((local_vehicle_index, _)) = parse_parking_label(&visit.shipment_label) {
                if let Some(&shipment_index) = global_index_by_local_vehicle.get(&local_vehicle_index) {
                    let start_time = by_local_vehicle.get(&local_vehicle_index).map(|p| p.start_time).unwrap_or(visit.start_time);
                    visits.push(Visit {
                        shipment_index,
                        visit_request_index: 0,
                        is_pickup: false,
                        start_time,
                        detour: visit.detour,
                        shipment_label: rebuilt_global_request.model.shipments[shipment_index].label.clone(),
                        injected_solution_location_token: None,
                    });
                }
                i += 1;
                continue;
            }
            i += 1;
        }

        visits.sort_by_key(|v| v.start_time);
        let transitions = reconcile_transitions(&visits, &rebuilt_global_request, original_route.has_traffic_infeasibilities, options)?;
        let metrics = aggregate_metrics(&transitions, &visits, &rebuilt_global_request);
        let vehicle_start_time = transitions.first().map(|t| t.start_time).unwrap_or(original_route.vehicle_start_time);
        let vehicle_end_time = transitions.last().map(|t| add_duration(t.start_time, t.total_duration)).unwrap_or(original_route.vehicle_end_time);

        routes.push(Route {
            vehicle_index: original_route.vehicle_index,
            vehicle_label: original_route.vehicle_label.clone(),
            vehicle_start_time,
            vehicle_end_time,
            visits,
            transitions,
            breaks: original_route.breaks.clone(),
            metrics,
            route_total_cost: original_route.route_total_cost,
            route_polyline: None,
            has_traffic_infeasibilities: original_route.has_traffic_infeasibilities,
        });
    }

    Ok(RoutingResponse { routes, skipped_shipments: global_response.skipped_shipments.clone() })
}

/// Recomputes each transition's `startTime`/`waitDuration` from its visit's
/// actual duration so the chain invariant holds after splicing (§4.6 step 5,
/// §8 invariant 1). Negative wait is only tolerated when the source route
/// was already flagged traffic-infeasible.
fn reconcile_transitions(
    visits: &[Visit],
    model_request: &RoutingRequest,
    traffic_infeasible: bool,
    options: &PlannerOptions,
) -> Result<Vec<Transition>> {
    let mut transitions = Vec::with_capacity(visits.len() + 1);
    let mut cursor = visits.first().map(|v| v.start_time).unwrap_or(model_request.model.global_start_time.unwrap());

    for visit in visits {
        let visit_request = visit_request_for(&model_request.model, visit);
        let wait = sub_timestamps(visit.start_time, cursor);
        if wait.is_negative() && !(traffic_infeasible && options.allow_negative_wait_despite_traffic_infeasibility) {
            return Err(Error::invariant_violation(
                "negative wait duration in integrated global route without a traffic-infeasibility flag".to_string(),
            ));
        }
        transitions.push(Transition {
            start_time: cursor,
            travel_duration: Duration::ZERO,
            wait_duration: wait.max(Duration::ZERO),
            break_duration: Duration::ZERO,
            delay_duration: Duration::ZERO,
            total_duration: wait.max(Duration::ZERO),
            travel_distance_meters: 0.0,
            route_polyline: None,
        });
        cursor = add_duration(visit.start_time, visit_request.duration);
    }
    transitions.push(Transition::zero(cursor));
    Ok(transitions)
}

fn aggregate_metrics(transitions: &[Transition], visits: &[Visit], model_request: &RoutingRequest) -> AggregatedMetrics {
    let travel_duration: Duration = transitions.iter().map(|t| t.travel_duration).sum();
    let wait_duration: Duration = transitions.iter().map(|t| t.wait_duration).sum();
    let delay_duration: Duration = transitions.iter().map(|t| t.delay_duration).sum();
    let break_duration: Duration = transitions.iter().map(|t| t.break_duration).sum();
    let visit_duration: Duration = visits.iter().map(|v| visit_request_for(&model_request.model, v).duration).sum();
    let total_duration = travel_duration + wait_duration + delay_duration + break_duration + visit_duration;
    let travel_distance_meters = transitions.iter().map(|t| t.travel_distance_meters).sum();
    AggregatedMetrics {
        travel_duration,
        wait_duration,
        delay_duration,
        break_duration,
        visit_duration,
        total_duration,
        travel_distance_meters,
    }
}

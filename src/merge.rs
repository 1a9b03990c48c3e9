//! Merger (§4.4): weaves each local route back into its owning global
//! route, producing the final per-original-vehicle plan.

use crate::duration::{add_duration, sub_timestamps, Duration, Timestamp};
use crate::error::{Error, Result};
use crate::global_model::visit_request_for;
use crate::local_model::LocalModelIndex;
use crate::model::{
    AggregatedMetrics, Route, RoutingRequest, RoutingResponse, SkippedShipment, Transition, Visit,
};
use crate::options::PlannerOptions;
use crate::parking::ParkingRegistry;
use crate::tags::TagManager;

pub(crate) fn parse_direct_label(label: &str) -> Option<usize> {
    label.strip_prefix("s:")?.split_whitespace().next()?.parse().ok()
}

pub(crate) fn parse_parking_label(label: &str) -> Option<(usize, Vec<usize>)> {
    let rest = label.strip_prefix("p:")?;
    let mut parts = rest.splitn(2, ' ');
    let vehicle_index: usize = parts.next()?.parse().ok()?;
    let originals_str = parts.next().unwrap_or("").trim();
    let originals = if originals_str.is_empty() {
        Vec::new()
    } else {
        originals_str.split(',').map(str::parse).collect::<std::result::Result<Vec<usize>, _>>().ok()?
    };
    Some((vehicle_index, originals))
}

fn shift_transition(transition: &Transition, shift: Duration) -> Transition {
    Transition { start_time: add_duration(transition.start_time, shift), ..transition.clone() }
}

/// Returns the indices, within `route.visits`, of the leading and trailing
/// contiguous runs of parking-side visits (the unload and load phases),
/// along with their elapsed durations (§4.4).
fn phase_boundaries(
    local_model: &crate::model::Model,
    route: &Route,
    local_visit_tag: &str,
) -> (Option<usize>, Duration, Option<usize>, Duration) {
    let is_customer = |visit: &Visit| {
        visit_request_for(local_model, visit).tags.iter().any(|tag| tag == local_visit_tag)
    };

    let mut unload_end = None;
    for (index, visit) in route.visits.iter().enumerate() {
        if is_customer(visit) {
            break;
        }
        unload_end = Some(index);
    }
    let unload_duration = match unload_end {
        Some(index) => {
            let visit = &route.visits[index];
            let duration = visit_request_for(local_model, visit).duration;
            sub_timestamps(visit.start_time, route.vehicle_start_time) + duration
        }
        None => Duration::ZERO,
    };

    let mut load_start = None;
    for (index, visit) in route.visits.iter().enumerate().rev() {
        if is_customer(visit) {
            break;
        }
        load_start = Some(index);
    }
    let load_duration = match load_start {
        Some(index) => sub_timestamps(route.vehicle_end_time, route.visits[index].start_time),
        None => Duration::ZERO,
    };

    (unload_end, unload_duration, load_start, load_duration)
}

fn merge_route(
    request: &RoutingRequest,
    local_request: &RoutingRequest,
    local_response: &RoutingResponse,
    global_route: &Route,
    registry: &ParkingRegistry,
    local_index: &LocalModelIndex,
    tags: &mut TagManager,
    options: &PlannerOptions,
    synthetic_base: &mut usize,
) -> Result<Route> {
    let mut visits: Vec<Visit> = Vec::new();
    let mut transitions: Vec<Transition> = Vec::new();
    let mut visit_durations: Vec<Duration> = Vec::new();
    let mut extra_cost = 0.0;

    if global_route.transitions.is_empty() {
        return Err(Error::invariant_violation(format!(
            "global route for vehicle {} has no transitions",
            global_route.vehicle_index
        )));
    }
    transitions.push(global_route.transitions[0].clone());

    for (k, global_visit) in global_route.visits.iter().enumerate() {
        if let Some(original_index) = parse_direct_label(&global_visit.shipment_label) {
            let original = &request.model.shipments[original_index];
            visits.push(Visit {
                shipment_index: original_index,
                visit_request_index: 0,
                is_pickup: original.is_pickup_shipment(),
                start_time: global_visit.start_time,
                detour: global_visit.detour,
                shipment_label: original.label.clone(),
                injected_solution_location_token: global_visit.injected_solution_location_token.clone(),
            });
            let visit_request = original
                .single_visit_request()
                .ok_or_else(|| Error::invariant_violation(format!("direct shipment {original_index} is not single-visit")))?;
            visit_durations.push(visit_request.duration);
        } else if let Some((local_vehicle_index, originals)) = parse_parking_label(&global_visit.shipment_label) {
            let local_route = local_response
                .routes
                .iter()
                .find(|route| route.vehicle_index == local_vehicle_index)
                .ok_or_else(|| Error::model_violation(format!("no local route for vehicle {local_vehicle_index}")))?;
            let group = local_index.group_owning_vehicle(local_vehicle_index).ok_or_else(|| {
                Error::invariant_violation(format!("local vehicle {local_vehicle_index} has no owning group"))
            })?;
            let parking = registry
                .get(&group.parking_tag)
                .ok_or_else(|| Error::invariant_violation(format!("unknown parking tag {:?}", group.parking_tag)))?;
            let local_visit_tag = tags.tags_for(parking).local_visit;

            let (_, unload_duration, load_start, load_duration) =
                phase_boundaries(&local_request.model, local_route, &local_visit_tag);

            let shift = sub_timestamps(global_visit.start_time, local_route.vehicle_start_time);
            extra_cost += local_route.route_total_cost;

            visits.push(Visit {
                shipment_index: *synthetic_base,
                visit_request_index: 0,
                is_pickup: false,
                start_time: global_visit.start_time,
                detour: global_visit.detour,
                shipment_label: format!("{} arrival", group.parking_tag),
                injected_solution_location_token: None,
            });
            visit_durations.push(unload_duration);
            *synthetic_base += 1;

            let customer_positions: Vec<usize> = local_route
                .visits
                .iter()
                .enumerate()
                .filter(|(_, visit)| {
                    visit_request_for(&local_request.model, visit).tags.iter().any(|tag| tag == &local_visit_tag)
                })
                .map(|(index, _)| index)
                .collect();

            let first_inner = customer_positions.first().copied().unwrap_or(local_route.visits.len());
            transitions.push(shift_transition(&local_route.transitions[first_inner], shift));

            for (position, &visit_index) in customer_positions.iter().enumerate() {
                let visit = &local_route.visits[visit_index];
                let original_index = local_index.original_for_local_shipment(visit.shipment_index).ok_or_else(|| {
                    Error::invariant_violation(format!("local shipment {} has no original", visit.shipment_index))
                })?;
                let original = &request.model.shipments[original_index];
                visits.push(Visit {
                    shipment_index: original_index,
                    visit_request_index: 0,
                    is_pickup: original.is_pickup_shipment(),
                    start_time: add_duration(visit.start_time, shift),
                    detour: global_visit.detour + visit.detour,
                    shipment_label: original.label.clone(),
                    injected_solution_location_token: visit.injected_solution_location_token.clone(),
                });
                let visit_request = original
                    .single_visit_request()
                    .ok_or_else(|| Error::invariant_violation(format!("shipment {original_index} is not single-visit")))?;
                visit_durations.push(visit_request.duration);

                if position + 1 < customer_positions.len() {
                    let next_index = customer_positions[position + 1];
                    transitions.push(shift_transition(&local_route.transitions[next_index], shift));
                }
            }

            let trailing_index = load_start.unwrap_or(local_route.visits.len());
            transitions.push(shift_transition(&local_route.transitions[trailing_index], shift));

            let local_route_end_in_global = add_duration(local_route.vehicle_end_time, shift);
            visits.push(Visit {
                shipment_index: *synthetic_base,
                visit_request_index: 0,
                is_pickup: true,
                start_time: add_duration(local_route_end_in_global, -load_duration),
                detour: global_visit.detour,
                shipment_label: format!("{} departure", group.parking_tag),
                injected_solution_location_token: None,
            });
            visit_durations.push(load_duration);
            *synthetic_base += 1;

            // originals is only needed to validate that the label and the
            // local response agree on round membership.
            if originals.len() != customer_positions.len() {
                return Err(Error::model_violation(format!(
                    "parking-visit label for local vehicle {local_vehicle_index} names {} originals but the local route visits {}",
                    originals.len(),
                    customer_positions.len()
                )));
            }
        } else {
            return Err(Error::model_violation(format!(
                "global visit has an unrecognized shipment label {:?}",
                global_visit.shipment_label
            )));
        }

        transitions.push(global_route.transitions[k + 1].clone());
    }

    if transitions.len() != visits.len() + 1 {
        return Err(Error::invariant_violation(format!(
            "merged route for vehicle {} has {} transitions for {} visits",
            global_route.vehicle_index,
            transitions.len(),
            visits.len()
        )));
    }

    let travel_duration: Duration = transitions.iter().map(|t| t.travel_duration).sum();
    let wait_duration: Duration = transitions.iter().map(|t| t.wait_duration).sum();
    let delay_duration: Duration = transitions.iter().map(|t| t.delay_duration).sum();
    let break_duration: Duration = transitions.iter().map(|t| t.break_duration).sum();
    let visit_duration: Duration = visit_durations.into_iter().sum();
    let total_duration = travel_duration + wait_duration + delay_duration + break_duration + visit_duration;
    let travel_distance_meters: f64 = transitions.iter().map(|t| t.travel_distance_meters).sum();

    let route_polyline = if options.populate_polylines && transitions.iter().all(|t| t.route_polyline.is_some()) {
        let segments: Vec<_> = transitions.iter().map(|t| t.route_polyline.clone().unwrap()).collect();
        Some(crate::geometry::join_transition_polylines(&segments))
    } else {
        None
    };

    Ok(Route {
        vehicle_index: global_route.vehicle_index,
        vehicle_label: global_route.vehicle_label.clone(),
        vehicle_start_time: global_route.vehicle_start_time,
        vehicle_end_time: global_route.vehicle_end_time,
        visits,
        transitions,
        breaks: global_route.breaks.clone(),
        metrics: AggregatedMetrics {
            travel_duration,
            wait_duration,
            delay_duration,
            break_duration,
            visit_duration,
            total_duration,
            travel_distance_meters,
        },
        route_total_cost: global_route.route_total_cost + extra_cost,
        route_polyline,
        has_traffic_infeasibilities: global_route.has_traffic_infeasibilities,
    })
}

fn merge_skipped_shipments(
    request: &RoutingRequest,
    local_response: &RoutingResponse,
    global_response: &RoutingResponse,
    local_index: &LocalModelIndex,
) -> Result<Vec<SkippedShipment>> {
    let mut skipped = Vec::new();

    for skip in &global_response.skipped_shipments {
        if let Some(original_index) = parse_direct_label(&skip.label) {
            skipped.push(SkippedShipment {
                index: original_index,
                label: request.model.shipments[original_index].label.clone(),
                reason: skip.reason.clone(),
            });
        } else if let Some((_, originals)) = parse_parking_label(&skip.label) {
            for original_index in originals {
                skipped.push(SkippedShipment {
                    index: original_index,
                    label: request.model.shipments[original_index].label.clone(),
                    reason: skip.reason.clone(),
                });
            }
        } else {
            return Err(Error::model_violation(format!(
                "global skipped-shipment label {:?} is unrecognized",
                skip.label
            )));
        }
    }

    for skip in &local_response.skipped_shipments {
        let original_index = local_index.original_for_local_shipment(skip.index).ok_or_else(|| {
            Error::invariant_violation(format!("local-skipped shipment {} has no original", skip.index))
        })?;
        skipped.push(SkippedShipment {
            index: original_index,
            label: request.model.shipments[original_index].label.clone(),
            reason: skip.reason.clone(),
        });
    }

    Ok(skipped)
}

/// Produces the final merged response: one route per original vehicle, with
/// each parking round woven back into place (§4.4).
pub fn merge(
    request: &RoutingRequest,
    local_request: &RoutingRequest,
    local_response: &RoutingResponse,
    global_response: &RoutingResponse,
    registry: &ParkingRegistry,
    local_index: &LocalModelIndex,
    tags: &mut TagManager,
    options: &PlannerOptions,
) -> Result<RoutingResponse> {
    tracing::debug!(global_routes = global_response.routes.len(), "merging local and global responses");
    let mut synthetic_base = request.model.shipments.len();
    let mut routes = Vec::with_capacity(global_response.routes.len());
    for global_route in &global_response.routes {
        let merged = merge_route(
            request,
            local_request,
            local_response,
            global_route,
            registry,
            local_index,
            tags,
            options,
            &mut synthetic_base,
        )?;
        routes.push(merged);
    }

    let skipped_shipments = merge_skipped_shipments(request, local_response, global_response, local_index)?;

    tracing::info!(
        routes = routes.len(),
        skipped = skipped_shipments.len(),
        "merge complete"
    );
    Ok(RoutingResponse { routes, skipped_shipments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use crate::local_model::build_local_request;
    use crate::model::{AggregatedMetrics as Metrics, SkippedShipment as Skip};

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn parses_direct_and_parking_labels() {
        assert_eq!(parse_direct_label("s:3 direct-customer"), Some(3));
        assert_eq!(parse_direct_label("p:0 1,2"), None);
        assert_eq!(parse_parking_label("p:0 1,2,3"), Some((0, vec![1, 2, 3])));
        assert_eq!(parse_parking_label("p:2 "), Some((2, vec![])));
    }

    #[test]
    fn merge_fails_on_malformed_label() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let registry = ParkingRegistry::build(&request, &map).unwrap();
        let mut tag_manager = TagManager::from_model(&request.model);
        let (local_request, local_index) =
            build_local_request(&request, &registry, &mut tag_manager, &PlannerOptions::default());

        let local_response = RoutingResponse::default();

        let bad_visit = Visit {
            shipment_index: 0,
            visit_request_index: 0,
            is_pickup: false,
            start_time: ts("2024-01-01T08:00:00Z"),
            detour: Duration::ZERO,
            shipment_label: "garbage".to_string(),
            injected_solution_location_token: None,
        };
        let global_route = Route {
            vehicle_index: 0,
            vehicle_label: String::new(),
            vehicle_start_time: ts("2024-01-01T08:00:00Z"),
            vehicle_end_time: ts("2024-01-01T09:00:00Z"),
            visits: vec![bad_visit],
            transitions: vec![
                Transition::zero(ts("2024-01-01T08:00:00Z")),
                Transition::zero(ts("2024-01-01T09:00:00Z")),
            ],
            breaks: Vec::new(),
            metrics: Metrics::default(),
            route_total_cost: 0.0,
            route_polyline: None,
            has_traffic_infeasibilities: false,
        };
        let global_response = RoutingResponse { routes: vec![global_route], skipped_shipments: Vec::new() };

        let err = merge(
            &request,
            &local_request,
            &local_response,
            &global_response,
            &registry,
            &local_index,
            &mut tag_manager,
            &PlannerOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ModelViolation(_)));
    }

    #[test]
    fn skipped_direct_shipment_translates_to_original_index() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let registry = ParkingRegistry::build(&request, &map).unwrap();
        let local_index = LocalModelIndex::default();
        let global_response = RoutingResponse {
            routes: Vec::new(),
            skipped_shipments: vec![Skip { index: 0, label: "s:8 direct-customer".to_string(), reason: None }],
        };
        let local_response = RoutingResponse::default();
        let skipped = merge_skipped_shipments(&request, &local_response, &global_response, &local_index).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].index, 8);
        let _ = registry;
    }
}

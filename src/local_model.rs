//! Local model builder (§4.2): turns each parking-served shipment into a
//! pickup-and-delivery shipment and synthesizes round vehicles for it.

use std::collections::HashMap;

use crate::duration::Duration;
use crate::model::{LoadLimit, Model, RoutingRequest, Shipment, Vehicle, VisitRequest};
use crate::options::PlannerOptions;
use crate::parking::{ParkingLocation, ParkingRegistry};
use crate::tags::TagManager;

/// A large fixed cost on every round vehicle, so the solver only opens a
/// second round at a parking when the first one cannot fit everything.
const ROUND_FIXED_COST: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    parking_tag: String,
    time_windows: Vec<(Option<i64>, Option<i64>)>,
    allowed_vehicles: Option<Vec<usize>>,
    penalty_cost_bits: Option<u64>,
}

fn group_key_for(registry: &ParkingRegistry, shipment_index: usize, shipment: &Shipment) -> GroupKey {
    let tag = registry
        .tag_for_shipment(shipment_index)
        .expect("caller only groups parking-served shipments")
        .to_string();
    let visit = shipment
        .single_visit_request()
        .expect("registry validation guarantees exactly one visit request");
    let mut time_windows: Vec<(Option<i64>, Option<i64>)> = visit
        .time_windows
        .iter()
        .map(|w| (w.start_time.map(|t| t.timestamp_millis()), w.end_time.map(|t| t.timestamp_millis())))
        .collect();
    time_windows.sort_unstable();
    let allowed_vehicles = shipment.allowed_vehicle_indices.clone().map(|mut v| {
        v.sort_unstable();
        v
    });
    GroupKey {
        parking_tag: tag,
        time_windows,
        allowed_vehicles,
        penalty_cost_bits: shipment.penalty_cost.map(f64::to_bits),
    }
}

/// One parking group's worth of bookkeeping needed by later phases.
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub parking_tag: String,
    /// Indices into the local model's `vehicles`, one per round.
    pub vehicle_indices: Vec<usize>,
    /// Indices into the local model's `shipments`; parallel to `originals`.
    pub local_shipment_indices: Vec<usize>,
    /// The original request's shipment index for each local shipment above.
    pub originals: Vec<usize>,
}

/// Maps local-model indices back to the original request, so later phases
/// (global build, merge) can translate between the two.
#[derive(Debug, Clone, Default)]
pub struct LocalModelIndex {
    pub groups: Vec<GroupInfo>,
}

impl LocalModelIndex {
    pub fn original_for_local_shipment(&self, local_shipment_index: usize) -> Option<usize> {
        self.groups.iter().find_map(|g| {
            g.local_shipment_indices
                .iter()
                .position(|&i| i == local_shipment_index)
                .map(|pos| g.originals[pos])
        })
    }

    pub fn group_owning_vehicle(&self, vehicle_index: usize) -> Option<&GroupInfo> {
        self.groups.iter().find(|g| g.vehicle_indices.contains(&vehicle_index))
    }
}

pub(crate) fn load_limits_for(parking: &ParkingLocation) -> HashMap<String, LoadLimit> {
    parking
        .delivery_load_limits
        .iter()
        .map(|(unit, &max_load)| {
            let limit = LoadLimit {
                max_load: Some(max_load),
                cost_per_kilometer: parking.cost_per_kilometer_per_load_unit.get(unit).copied(),
                cost_per_hour: parking.cost_per_hour_per_load_unit.get(unit).copied(),
            };
            (unit.clone(), limit)
        })
        .collect()
}

pub(crate) fn build_local_shipment(
    original_index: usize,
    original: &Shipment,
    parking: &ParkingLocation,
    local_visit_tag: &str,
    unload_tag: &str,
    load_tag: &str,
    unload_duration: Duration,
    load_duration: Duration,
    allowed_vehicles: Vec<usize>,
) -> Shipment {
    let customer_visit = original
        .single_visit_request()
        .expect("registry validation guarantees exactly one visit request");
    let mut customer_visit = customer_visit.clone();
    customer_visit.tags.push(local_visit_tag.to_string());

    let (pickups, deliveries) = if original.is_pickup_shipment() {
        let parking_visit = VisitRequest::new(parking.walking_waypoint(), load_duration)
            .with_tag(load_tag);
        (vec![customer_visit], vec![parking_visit])
    } else {
        let parking_visit = VisitRequest::new(parking.walking_waypoint(), unload_duration)
            .with_tag(unload_tag);
        (vec![parking_visit], vec![customer_visit])
    };

    Shipment {
        pickups,
        deliveries,
        load_demands: original.load_demands.clone(),
        penalty_cost: original.penalty_cost,
        allowed_vehicle_indices: Some(allowed_vehicles),
        costs_per_vehicle: None,
        label: format!("{original_index}: {}", original.label),
    }
}

/// Builds the local request and the index later phases need, from the
/// original request and a validated parking registry.
pub fn build_local_request(
    request: &RoutingRequest,
    registry: &ParkingRegistry,
    tags: &mut TagManager,
    options: &PlannerOptions,
) -> (RoutingRequest, LocalModelIndex) {
    tracing::debug!(shipments = request.model.shipments.len(), "building local model");
    let mut group_order: Vec<GroupKey> = Vec::new();
    let mut group_members: HashMap<GroupKey, Vec<usize>> = HashMap::new();

    for (index, shipment) in request.model.shipments.iter().enumerate() {
        if !registry.is_served_via_parking(index) {
            continue;
        }
        let key = group_key_for(registry, index, shipment);
        group_members.entry(key.clone()).or_insert_with(|| {
            group_order.push(key.clone());
            Vec::new()
        });
        group_members.get_mut(&key).unwrap().push(index);
    }

    let mut shipments = Vec::new();
    let mut vehicles = Vec::new();
    let mut transition_attributes = Vec::new();
    let mut seen_parkings = std::collections::HashSet::new();
    let mut groups = Vec::new();

    for key in group_order {
        let originals = &group_members[&key];
        let parking = registry.get(&key.parking_tag).expect("validated by registry construction");
        let parking_tags = tags.tags_for(parking);

        if seen_parkings.insert(key.parking_tag.clone()) {
            transition_attributes.extend(tags.local_rules(parking));
        }

        let vehicle_base = vehicles.len();
        let mut vehicle_indices = Vec::with_capacity(originals.len());
        for round in 0..originals.len() {
            vehicle_indices.push(vehicle_base + round);
            vehicles.push(Vehicle::local_round(
                parking.walking_waypoint(),
                parking.travel_mode,
                parking.travel_duration_multiplier,
                load_limits_for(parking),
                parking.max_round_duration,
                ROUND_FIXED_COST,
                format!("parking:{} round:{round}", parking.tag),
            ));
        }

        let shipment_base = shipments.len();
        let mut local_shipment_indices = Vec::with_capacity(originals.len());
        for (offset, &original_index) in originals.iter().enumerate() {
            local_shipment_indices.push(shipment_base + offset);
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
                vehicle_indices.clone(),
            ));
        }

        groups.push(GroupInfo {
            parking_tag: key.parking_tag.clone(),
            vehicle_indices,
            local_shipment_indices,
            originals: originals.clone(),
        });
    }

    let model = Model {
        shipments,
        vehicles,
        transition_attributes,
        global_start_time: request.model.global_start_time,
        global_end_time: request.model.global_end_time,
    };

    let mut local_request = RoutingRequest::new(model);
    local_request.search_mode = options.search_mode;
    local_request.populate_polylines = options.populate_polylines;
    local_request.populate_transition_polylines = options.populate_transition_polylines;
    local_request.consider_road_traffic = options.consider_road_traffic;
    local_request.allow_large_deadline_despite_interruption_risk =
        options.allow_large_deadline_despite_interruption_risk;
    local_request.internal_parameters = crate::options::resolve_internal_parameters(
        crate::options::Phase::InitialLocal,
        None,
        &options.internal_parameters,
    );

    tracing::info!(
        groups = groups.len(),
        local_shipments = local_request.model.shipments.len(),
        local_vehicles = local_request.model.vehicles.len(),
        "local model built"
    );
    (local_request, LocalModelIndex { groups })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    #[test]
    fn groups_shipments_by_parking() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let registry = ParkingRegistry::build(&request, &map).unwrap();
        let mut tags = TagManager::from_model(&request.model);
        let (local_request, index) = build_local_request(&request, &registry, &mut tags, &PlannerOptions::default());

        assert_eq!(index.groups.len(), 2);
        for group in &index.groups {
            assert_eq!(group.vehicle_indices.len(), group.originals.len());
        }
        let total_shipments: usize = index.groups.iter().map(|g| g.originals.len()).sum();
        assert_eq!(total_shipments, 8);
        assert_eq!(local_request.model.shipments.len(), 8);
        assert_eq!(local_request.model.vehicles.len(), local_request.model.shipments.len());
    }

    #[test]
    fn local_shipments_are_restricted_to_their_own_group() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let registry = ParkingRegistry::build(&request, &map).unwrap();
        let mut tags = TagManager::from_model(&request.model);
        let (local_request, index) = build_local_request(&request, &registry, &mut tags, &PlannerOptions::default());

        for group in &index.groups {
            for &shipment_index in &group.local_shipment_indices {
                let allowed = local_request.model.shipments[shipment_index]
                    .allowed_vehicle_indices
                    .as_ref()
                    .unwrap();
                assert_eq!(allowed, &group.vehicle_indices);
            }
        }
    }

    #[test]
    fn label_convention_is_index_colon_label() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let registry = ParkingRegistry::build(&request, &map).unwrap();
        let mut tags = TagManager::from_model(&request.model);
        let (local_request, index) = build_local_request(&request, &registry, &mut tags, &PlannerOptions::default());

        let group = &index.groups[0];
        let local_idx = group.local_shipment_indices[0];
        let original_idx = group.originals[0];
        let expected_prefix = format!("{original_idx}: ");
        assert!(local_request.model.shipments[local_idx].label.starts_with(&expected_prefix));
    }
}

//! Synthetic tag minting and transition-attribute emission (§4.1).
//!
//! A handful of VisitRequest tags exist purely to let the solver's
//! transition-attribute mechanism recognize "the vehicle is arriving at a
//! parking", "this is the unload leg of a round", and so on. They must never
//! collide with a tag already present in the caller's input, so they are
//! minted lazily by probing `<base>#1`, `<base>#2`, … against everything
//! seen in the request plus everything minted so far.

use std::collections::{HashMap, HashSet};

use crate::duration::Duration;
use crate::model::{Model, TransitionAttribute};
use crate::parking::ParkingLocation;

const HUGE_COST: f64 = 1_000_000.0;

fn huge_delay() -> Duration {
    Duration::from_hours(2)
}

/// The synthetic tags minted for one parking location.
///
/// The spec names six synthetic tags per parking (global-parking,
/// local-visit, local-unload-from-vehicle, local-load-to-vehicle,
/// barrier-pickup, barrier-delivery); this also carries the derived
/// "has any global transition attribute" flag alongside them since both are
/// cached together per parking tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkingTags {
    pub global_parking: String,
    pub local_visit: String,
    pub local_unload_from_vehicle: String,
    pub local_load_to_vehicle: String,
    pub barrier_pickup: String,
    pub barrier_delivery: String,
    pub has_any_global_transition_attribute: bool,
}

/// Mints and caches [`ParkingTags`] per parking, and emits the three rule
/// lists (global / local / local-refinement) described in §4.1.
#[derive(Debug, Clone)]
pub struct TagManager {
    used_tags: HashSet<String>,
    cache: HashMap<String, ParkingTags>,
}

impl TagManager {
    /// Scans `model` for every tag used in any visit request, seeding the
    /// collision set that minted tags must avoid.
    pub fn from_model(model: &Model) -> Self {
        let mut used_tags = HashSet::new();
        for shipment in &model.shipments {
            for visit in shipment.pickups.iter().chain(shipment.deliveries.iter()) {
                used_tags.extend(visit.tags.iter().cloned());
            }
        }
        Self { used_tags, cache: HashMap::new() }
    }

    fn mint(&mut self, base: &str) -> String {
        for suffix in 1u32.. {
            let candidate = format!("{base}#{suffix}");
            if !self.used_tags.contains(&candidate) {
                self.used_tags.insert(candidate.clone());
                return candidate;
            }
        }
        unreachable!("suffix space is unbounded")
    }

    /// Returns the tags for `parking`, minting them on first use.
    pub fn tags_for(&mut self, parking: &ParkingLocation) -> ParkingTags {
        if let Some(tags) = self.cache.get(&parking.tag) {
            return tags.clone();
        }
        let base = format!("__parking::{}", parking.tag);
        let tags = ParkingTags {
            global_parking: self.mint(&base),
            local_visit: self.mint(&base),
            local_unload_from_vehicle: self.mint(&base),
            local_load_to_vehicle: self.mint(&base),
            barrier_pickup: self.mint(&base),
            barrier_delivery: self.mint(&base),
            has_any_global_transition_attribute: parking.has_any_global_transition_attribute(),
        };
        self.cache.insert(parking.tag.clone(), tags.clone());
        tags
    }

    /// Parking arrival/departure/reload cost and delay, for the global model.
    pub fn global_rules(&mut self, parking: &ParkingLocation) -> Vec<TransitionAttribute> {
        let tags = self.tags_for(parking);
        let mut rules = Vec::new();
        if parking.arrival_duration != Duration::ZERO || parking.arrival_cost != 0.0 {
            rules.push(
                TransitionAttribute::new()
                    .excluding_from_tag(tags.global_parking.clone())
                    .to_tag(tags.global_parking.clone())
                    .with_delay(parking.arrival_duration)
                    .with_cost(parking.arrival_cost),
            );
        }
        if parking.departure_duration != Duration::ZERO || parking.departure_cost != 0.0 {
            rules.push(
                TransitionAttribute::new()
                    .from_tag(tags.global_parking.clone())
                    .excluding_to_tag(tags.global_parking.clone())
                    .with_delay(parking.departure_duration)
                    .with_cost(parking.departure_cost),
            );
        }
        if parking.reload_duration != Duration::ZERO || parking.reload_cost != 0.0 {
            rules.push(
                TransitionAttribute::new()
                    .from_tag(tags.global_parking.clone())
                    .to_tag(tags.global_parking)
                    .with_delay(parking.reload_duration)
                    .with_cost(parking.reload_cost),
            );
        }
        rules
    }

    /// Anti-interleaving rules for the local model: forbid jumping directly
    /// between a load-to-vehicle leg and an unload-from-vehicle leg of a
    /// different round, in either order, and between a load leg and a
    /// customer visit.
    pub fn local_rules(&mut self, parking: &ParkingLocation) -> Vec<TransitionAttribute> {
        let tags = self.tags_for(parking);
        vec![
            TransitionAttribute::new()
                .from_tag(tags.local_load_to_vehicle.clone())
                .to_tag(tags.local_unload_from_vehicle.clone())
                .with_cost(HUGE_COST)
                .with_delay(huge_delay()),
            TransitionAttribute::new()
                .from_tag(tags.local_visit.clone())
                .to_tag(tags.local_unload_from_vehicle)
                .with_cost(HUGE_COST)
                .with_delay(huge_delay()),
            TransitionAttribute::new()
                .from_tag(tags.local_load_to_vehicle)
                .to_tag(tags.local_visit)
                .with_cost(HUGE_COST)
                .with_delay(huge_delay()),
        ]
    }

    /// Local rules plus refinement barrier semantics: a barrier pickup is a
    /// natural reload point, so transitioning into one from a visit or a
    /// load leg costs the parking's ordinary reload cost/delay instead of
    /// the anti-interleaving penalty.
    pub fn local_refinement_rules(&mut self, parking: &ParkingLocation) -> Vec<TransitionAttribute> {
        let tags = self.tags_for(parking);
        let mut rules = self.local_rules(parking);
        rules.push(
            TransitionAttribute::new()
                .from_tag(tags.local_visit.clone())
                .to_tag(tags.barrier_pickup.clone())
                .with_cost(parking.reload_cost)
                .with_delay(parking.reload_duration),
        );
        rules.push(
            TransitionAttribute::new()
                .from_tag(tags.local_load_to_vehicle)
                .to_tag(tags.barrier_pickup)
                .with_cost(parking.reload_cost)
                .with_delay(parking.reload_duration),
        );
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    #[test]
    fn mints_non_colliding_tags() {
        let request = demo::small_request();
        let mut manager = TagManager::from_model(&request.model);
        let map = demo::small_parking_map();
        let tags = manager.tags_for(&map.parking_locations[0]);
        let all = [
            &tags.global_parking,
            &tags.local_visit,
            &tags.local_unload_from_vehicle,
            &tags.local_load_to_vehicle,
            &tags.barrier_pickup,
            &tags.barrier_delivery,
        ];
        let unique: HashSet<&&String> = all.iter().collect();
        assert_eq!(unique.len(), all.len(), "minted tags must be pairwise distinct");
    }

    #[test]
    fn caches_tags_per_parking() {
        let request = demo::small_request();
        let mut manager = TagManager::from_model(&request.model);
        let map = demo::small_parking_map();
        let first = manager.tags_for(&map.parking_locations[0]);
        let second = manager.tags_for(&map.parking_locations[0]);
        assert_eq!(first, second);
    }

    #[test]
    fn avoids_preexisting_tags() {
        use crate::model::{Shipment, VisitRequest, Waypoint};
        let mut request = demo::small_request();
        // Force the very first minted suffix to collide so the manager must skip it.
        request.model.shipments.push(Shipment {
            pickups: vec![VisitRequest::new(Waypoint::from_location(0.0, 0.0), Duration::ZERO)
                .with_tag("__parking::P001#1")],
            ..Default::default()
        });
        let mut manager = TagManager::from_model(&request.model);
        let map = demo::small_parking_map();
        let tags = manager.tags_for(&map.parking_locations[0]);
        assert_ne!(tags.global_parking, "__parking::P001#1");
    }

    #[test]
    fn departure_rule_excludes_reload_to_the_same_parking() {
        let mut manager = TagManager::from_model(&demo::small_request().model);
        let map = demo::small_parking_map();
        let rules = manager.global_rules(&map.parking_locations[0]);
        let tags = manager.tags_for(&map.parking_locations[0]);
        let departure = rules
            .iter()
            .find(|r| r.src_tag.as_deref() == Some(tags.global_parking.as_str()) && r.dst_tag.is_none())
            .expect("departure rule is present for the demo fixture");
        assert_eq!(departure.excluded_dst_tag.as_deref(), Some(tags.global_parking.as_str()));
    }
}

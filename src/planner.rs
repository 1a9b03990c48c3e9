//! Planner facade (§4.7): the single entry point tying the decomposition
//! and recomposition passes together.
//!
//! A [`Planner`] is built once from the original request and its parking
//! map, runs every §7 input-inconsistency check up front, and then exposes
//! one method per lifecycle step. Each method takes the previous step's
//! response(s) by shared reference and returns a freshly owned request or
//! response; the planner holds no solver and performs no I/O.

use crate::error::Result;
use crate::integrate::{self, IntegratedGlobal, IntegratedLocal, IntegrationMode};
use crate::local_model::{self, LocalModelIndex};
use crate::merge;
use crate::model::{RoutingRequest, RoutingResponse};
use crate::options::PlannerOptions;
use crate::parking::{ParkingMap, ParkingRegistry};
use crate::refinement::{self, RefinementIndex};
use crate::tags::TagManager;

/// Ties §4.1-§4.6 together into the ordered pipeline a caller drives:
/// local build → solve → global build → solve →
/// (optionally) refinement build → solve → integrate/merge.
pub struct Planner {
    request: RoutingRequest,
    registry: ParkingRegistry,
    tags: TagManager,
    options: PlannerOptions,
}

impl Planner {
    /// Validates `request`/`parking_map` against every §7 input-inconsistency
    /// rule and returns a build error immediately if any fails.
    pub fn new(request: RoutingRequest, parking_map: &ParkingMap, options: PlannerOptions) -> Result<Self> {
        let registry = ParkingRegistry::build(&request, parking_map)?;
        let tags = TagManager::from_model(&request.model);
        Ok(Self { request, registry, tags, options })
    }

    pub fn original_request(&self) -> &RoutingRequest {
        &self.request
    }

    /// §4.2: builds the local request from the original request.
    pub fn make_local_request(&mut self) -> (RoutingRequest, LocalModelIndex) {
        local_model::build_local_request(&self.request, &self.registry, &mut self.tags, &self.options)
    }

    /// §4.3: builds the global request from the solved local response.
    pub fn make_global_request(
        &mut self,
        local_request: &RoutingRequest,
        local_response: &RoutingResponse,
        local_index: &LocalModelIndex,
    ) -> Result<RoutingRequest> {
        crate::global_model::build_global_request(
            &self.request,
            local_request,
            local_response,
            &self.registry,
            local_index,
            &mut self.tags,
            &self.options,
            None,
        )
    }

    /// §4.5: builds the refinement request from the solved local and global
    /// responses, for every qualifying run across the global response.
    pub fn make_refinement_request(
        &mut self,
        local_response: &RoutingResponse,
        global_response: &RoutingResponse,
        local_index: &LocalModelIndex,
    ) -> Result<(RoutingRequest, RefinementIndex)> {
        refinement::build_refinement_request(
            &self.request,
            local_response,
            global_response,
            &self.registry,
            local_index,
            &mut self.tags,
            &self.options,
        )
    }

    /// §4.6: folds a solved refinement response back into the local model
    /// and produces the integrated global side at the requested fidelity.
    #[allow(clippy::too_many_arguments)]
    pub fn integrate_refinement(
        &mut self,
        local_request: &RoutingRequest,
        local_response: &RoutingResponse,
        local_index: &LocalModelIndex,
        global_response: &RoutingResponse,
        refinement_request: &RoutingRequest,
        refinement_response: &RoutingResponse,
        refinement_index: &RefinementIndex,
        mode: IntegrationMode,
    ) -> Result<(IntegratedLocal, IntegratedGlobal)> {
        integrate::integrate(
            &self.request,
            local_request,
            local_response,
            local_index,
            global_response,
            refinement_request,
            refinement_response,
            refinement_index,
            &self.registry,
            &mut self.tags,
            &self.options,
            mode,
            None,
        )
    }

    /// §4.4: weaves a solved local response back into its owning solved
    /// global response, producing the final per-original-vehicle plan.
    pub fn merge(
        &mut self,
        local_request: &RoutingRequest,
        local_response: &RoutingResponse,
        global_response: &RoutingResponse,
        local_index: &LocalModelIndex,
    ) -> Result<RoutingResponse> {
        merge::merge(
            &self.request,
            local_request,
            local_response,
            global_response,
            &self.registry,
            local_index,
            &mut self.tags,
            &self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    #[test]
    fn rejects_inconsistent_input_at_construction() {
        let request = demo::small_request();
        let mut map = demo::small_parking_map();
        map.parking_for_shipment.insert(9999, "P001".to_string());
        let err = Planner::new(request, &map, PlannerOptions::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InputInconsistency(_)));
    }

    #[test]
    fn make_local_request_delegates_to_local_model_builder() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let mut planner = Planner::new(request, &map, PlannerOptions::default()).unwrap();

        let (local_request, local_index) = planner.make_local_request();
        assert_eq!(local_index.groups.len(), 2);
        assert_eq!(local_request.model.shipments.len(), 8);
        assert_eq!(local_request.model.vehicles.len(), 8);
    }

    #[test]
    fn original_request_is_preserved_verbatim() {
        let request = demo::small_request();
        let map = demo::small_parking_map();
        let planner = Planner::new(request.clone(), &map, PlannerOptions::default()).unwrap();
        assert_eq!(planner.original_request().model.shipments.len(), request.model.shipments.len());
    }
}

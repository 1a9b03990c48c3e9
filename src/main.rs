//! Demo binary: runs the decomposition half of the pipeline against the S1
//! fixture and prints what each phase produces. Solving itself is left to
//! an external [`two_step_routing::solver::Solver`] implementation — this
//! binary only exercises the request-building side of the facade.

use tracing_subscriber::EnvFilter;
use two_step_routing::{console, demo, options::PlannerOptions, planner::Planner};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("two_step_routing=info".parse().unwrap()))
        .init();

    console::print_banner();

    let request = demo::small_request();
    let map = demo::small_parking_map();
    console::print_config(request.model.shipments.len(), request.model.vehicles.len(), map.parking_locations.len());

    let mut planner = Planner::new(request, &map, PlannerOptions::default()).expect("fixture request is consistent");

    let timer = console::PhaseTimer::start("LocalModel", 1);
    let (local_request, local_index) = planner.make_local_request();
    timer.finish(&format!(
        "{} round vehicles across {} parking groups",
        local_request.model.vehicles.len(),
        local_index.groups.len()
    ));

    println!(
        "\nLocal sub-problem ready: {} shipments, {} vehicles. Solve it with a two_step_routing::solver::Solver \
         implementation, then call Planner::make_global_request to continue the pipeline.",
        local_request.model.shipments.len(),
        local_request.model.vehicles.len(),
    );
}

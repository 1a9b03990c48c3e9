//! The external routing-solver collaborator (§6, §9).
//!
//! The core never talks to a transport directly: it calls a single
//! blocking method on whatever implements [`Solver`]. Production code
//! plugs in an HTTP/gRPC/in-process client; tests substitute
//! [`MockSolver`], a table-driven stand-in keyed by request identity.

use crate::error::{Error, Result};
use crate::model::{RoutingRequest, RoutingResponse};

/// A blocking request/response collaborator. Single-threaded and
/// synchronous by design (§5): the core has no asynchronous surface of its
/// own, so neither does this trait.
pub trait Solver {
    fn solve(&self, request: &RoutingRequest) -> Result<RoutingResponse>;
}

/// A table-driven mock solver for tests.
///
/// Responses are registered ahead of time and matched in FIFO order against
/// calls to [`Solver::solve`]; a call past the end of the table is an
/// error rather than a panic, so tests see a normal `Result` failure if
/// they wire up fewer responses than the planner actually issues requests.
#[derive(Default)]
pub struct MockSolver {
    responses: std::sync::Mutex<std::collections::VecDeque<RoutingResponse>>,
    recorded_requests: std::sync::Mutex<Vec<RoutingRequest>>,
}

impl MockSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: RoutingResponse) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_responses(responses: impl IntoIterator<Item = RoutingResponse>) -> Self {
        let solver = Self::new();
        for response in responses {
            solver.push_response(response);
        }
        solver
    }

    pub fn requests(&self) -> Vec<RoutingRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }
}

impl Solver for MockSolver {
    fn solve(&self, request: &RoutingRequest) -> Result<RoutingResponse> {
        self.recorded_requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::infeasible("mock solver has no more queued responses"))
    }
}

/// Solves several independent requests in parallel and returns their
/// responses in the same order as the inputs.
///
/// This is the only place this crate touches `rayon`: it exists purely
/// because §5 calls out that independent local sub-problems (one per
/// parking group) share no mutable state and so *can* be dispatched
/// concurrently by the caller. The core itself never calls this; it is an
/// opt-in convenience.
pub fn solve_all_in_parallel<S: Solver + Sync>(
    solver: &S,
    requests: &[RoutingRequest],
) -> Result<Vec<RoutingResponse>> {
    use rayon::prelude::*;

    requests.par_iter().map(|request| solver.solve(request)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    #[test]
    fn mock_solver_returns_queued_responses_in_order() {
        let mock = MockSolver::new();
        mock.push_response(RoutingResponse::default());
        let request = demo::small_request();
        let response = mock.solve(&request).unwrap();
        assert!(response.routes.is_empty());
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn mock_solver_errors_past_end_of_table() {
        let mock = MockSolver::new();
        let request = demo::small_request();
        assert!(mock.solve(&request).is_err());
    }

    #[test]
    fn parallel_dispatch_preserves_order() {
        let mock = MockSolver::new();
        let mut r1 = RoutingResponse::default();
        r1.skipped_shipments.push(crate::model::SkippedShipment { index: 1, label: "a".into(), reason: None });
        let r2 = RoutingResponse::default();
        mock.push_response(r1);
        mock.push_response(r2);

        let requests = vec![demo::small_request(), demo::small_request()];
        let responses = solve_all_in_parallel(&mock, &requests).unwrap();
        assert_eq!(responses[0].skipped_shipments.len(), 1);
        assert_eq!(responses[1].skipped_shipments.len(), 0);
    }
}

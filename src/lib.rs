//! Two-step vehicle routing: decomposes a routing request whose shipments
//! may be served from parking locations (last-mile on foot or by cart) into
//! a sequence of solver-sized sub-problems, then recomposes the solved
//! sub-problems back into one routing response.
//!
//! # Pipeline
//!
//! - [`parking`]: the parking registry and input validation (§4.1)
//! - [`local_model`]: per-parking round-trip sub-problem builder (§4.2)
//! - [`global_model`]: vehicle-level routing problem over parking visits
//!   and direct shipments (§4.3)
//! - [`merge`]: weaves a solved local response back into a solved global
//!   response (§4.4)
//! - [`refinement`]: re-solves consecutive-parking-visit runs with shared
//!   capacity across rounds (§4.5)
//! - [`integrate`]: folds a solved refinement response back into the local
//!   and global models (§4.6)
//! - [`planner`]: the facade tying the above into one ordered pipeline (§4.7)
//!
//! # Support
//!
//! - [`model`]: the wire-level request/response types
//! - [`duration`]: fixed-precision millisecond durations and timestamps
//! - [`tags`]: synthetic tag/label minting shared across phases
//! - [`options`]: planner-wide options and internal-parameter precedence
//! - [`error`]: the crate's error type
//! - [`solver`]: the external solver collaborator trait and test double
//! - [`geometry`]: polyline encode/decode and joining
//! - [`console`]: human-readable plan summaries
//! - [`demo`]: fixture data used by tests and the demo binary

pub mod console;
pub mod demo;
pub mod duration;
pub mod error;
pub mod geometry;
pub mod global_model;
pub mod integrate;
pub mod local_model;
pub mod merge;
pub mod model;
pub mod options;
pub mod parking;
pub mod planner;
pub mod refinement;
pub mod solver;
pub mod tags;

//! Crate-wide error type.
//!
//! Every build-time failure in this crate falls into one of the four kinds
//! below. None of them are retried automatically: a build-time error means
//! the input (or a previous phase's output) is inconsistent, not that the
//! solver collaborator misbehaved. Skipped shipments reported by the solver
//! are not modeled as errors at all — see [`crate::model::SkippedShipment`].

use thiserror::Error;

/// A crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The input request and/or parking map are mutually inconsistent:
    /// duplicate parking tags, dangling shipment→parking references, a
    /// parking-served shipment with the wrong number of visit requests, or
    /// an `avoid_indoor` parking using the driving travel mode.
    #[error("input inconsistency: {0}")]
    InputInconsistency(String),

    /// A synthetic label produced by an earlier phase could not be parsed,
    /// or two visits that should agree on an injected-solution-location
    /// token disagree.
    #[error("model violation: {0}")]
    ModelViolation(String),

    /// A build-time computation proved the request infeasible before it was
    /// ever sent to the solver, e.g. an empty start-time-window
    /// intersection for a local route.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// A structural invariant tying visits, transitions, and durations
    /// together was violated while merging or integrating results. This
    /// always indicates a bug: the solver's own output, or a previous
    /// phase's output, was not self-consistent.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub fn input_inconsistency(msg: impl Into<String>) -> Self {
        Self::InputInconsistency(msg.into())
    }

    pub fn model_violation(msg: impl Into<String>) -> Self {
        Self::ModelViolation(msg.into())
    }

    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::Infeasible(msg.into())
    }

    pub fn invariant_violation(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

//! Planner-wide configuration and the `internalParameters` precedence
//! helper (§3.2, §9).

use crate::model::SearchMode;

/// Which phase of the pipeline is asking for its `internalParameters`
/// value. Each phase has its own fixed chain of candidate sources (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitialLocal,
    InitialGlobal,
    RefinementLocal,
    RefinementGlobal,
}

/// The planner-wide `internalParameters` defaults a caller can set once,
/// separate from any one request's override.
#[derive(Debug, Clone, Default)]
pub struct InternalParameterSources {
    /// Applies to every phase unless overridden.
    pub options: Option<String>,
    /// Applies only to the refinement-global phase.
    pub refinement_options: Option<String>,
}

/// Collapses one phase's ordered list of candidate `internalParameters`
/// sources into a single value: later entries in the phase's chain win over
/// earlier ones, skipping any source that is absent (§9).
///
/// This is the single place that encodes the precedence chain; callers
/// must never re-derive it inline.
pub fn resolve_internal_parameters(
    phase: Phase,
    request_override: Option<&str>,
    sources: &InternalParameterSources,
) -> Option<String> {
    let chain: Vec<Option<&str>> = match phase {
        Phase::InitialLocal => vec![sources.options.as_deref()],
        Phase::InitialGlobal => vec![request_override, sources.options.as_deref()],
        Phase::RefinementLocal => vec![sources.options.as_deref()],
        Phase::RefinementGlobal => {
            vec![request_override, sources.options.as_deref(), sources.refinement_options.as_deref()]
        }
    };
    chain.into_iter().flatten().last().map(str::to_string)
}

/// Cross-cutting knobs a caller sets once per [`crate::planner::Planner`]
/// instance (§3.2).
#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    pub internal_parameters: InternalParameterSources,
    pub populate_polylines: bool,
    pub populate_transition_polylines: bool,
    pub consider_road_traffic: bool,
    pub allow_large_deadline_despite_interruption_risk: bool,
    pub search_mode: Option<SearchMode>,
    /// Gates the traffic-infeasibility open question in §9: when `false`
    /// (the default), a negative wait duration anywhere it is not
    /// explicitly expected is an invariant-violation error rather than
    /// being passed through.
    pub allow_negative_wait_despite_traffic_infeasibility: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_local_uses_only_options() {
        let sources = InternalParameterSources {
            options: Some("opts".into()),
            refinement_options: Some("refine".into()),
        };
        assert_eq!(
            resolve_internal_parameters(Phase::InitialLocal, Some("override"), &sources),
            Some("opts".into())
        );
    }

    #[test]
    fn initial_global_prefers_options_over_override_when_both_present() {
        let sources = InternalParameterSources { options: Some("opts".into()), refinement_options: None };
        assert_eq!(
            resolve_internal_parameters(Phase::InitialGlobal, Some("override"), &sources),
            Some("opts".into())
        );
    }

    #[test]
    fn initial_global_falls_back_to_override_when_options_absent() {
        let sources = InternalParameterSources::default();
        assert_eq!(
            resolve_internal_parameters(Phase::InitialGlobal, Some("override"), &sources),
            Some("override".into())
        );
    }

    #[test]
    fn refinement_global_prefers_refinement_options_above_all() {
        let sources = InternalParameterSources {
            options: Some("opts".into()),
            refinement_options: Some("refine".into()),
        };
        assert_eq!(
            resolve_internal_parameters(Phase::RefinementGlobal, Some("override"), &sources),
            Some("refine".into())
        );
    }

    #[test]
    fn absent_chain_yields_none() {
        let sources = InternalParameterSources::default();
        assert_eq!(resolve_internal_parameters(Phase::RefinementLocal, None, &sources), None);
    }
}

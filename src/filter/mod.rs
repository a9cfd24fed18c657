/// Cascading constraint filtering
///
/// This module handles:
/// - Selection criteria and their completeness rules (criteria.rs)
/// - Conjunctive SQL filter assembly from optional criteria (query.rs)
/// - Legal value domains, invalidation and match counting (domains.rs)
///
/// Everything here is a stateless query against a `FrameCatalog`; the caller
/// re-runs `refine` after every constraint change.

pub mod criteria;
pub mod domains;
pub mod query;

pub use criteria::{CompleteCriteria, Criterion, SelectionCriteria, TemperatureConstraint};
pub use domains::{
    clamp_desired_count, domains, is_ready, match_count, refine, temperature_domain, Domains,
    Refinement, MIN_STACK_FRAMES,
};
pub use query::{Column, FrameFilter, Predicate};

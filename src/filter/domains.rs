use std::cmp::Ordering;

use tracing::debug;

use super::criteria::{Criterion, SelectionCriteria, TemperatureConstraint};
use super::query::{Column, FrameFilter};
use crate::error::Result;
use crate::state::catalog::FrameCatalog;

/// Smallest number of frames that can be stacked
pub const MIN_STACK_FRAMES: usize = 2;

/// Legal choices for the criteria that depend on temperature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domains {
    pub iso_or_gain: Vec<String>,
    pub exposure: Vec<String>,
    pub resolution: Vec<String>,
    pub binning: Vec<String>,
}

impl Domains {
    /// Choices for a dependent criterion (temperature has its own domain)
    pub fn get(&self, criterion: Criterion) -> &[String] {
        match criterion {
            Criterion::Temperature => &[],
            Criterion::IsoOrGain => &self.iso_or_gain,
            Criterion::Exposure => &self.exposure,
            Criterion::Resolution => &self.resolution,
            Criterion::Binning => &self.binning,
        }
    }

    /// Clear every dependent selection that is no longer a legal choice.
    ///
    /// Surviving selections are rewritten to the domain's spelling, so "120.0"
    /// becomes "120" when that is how the catalog renders it.
    /// Returns the criteria that were cleared.
    pub fn reconcile(&self, criteria: &mut SelectionCriteria) -> Vec<Criterion> {
        let mut cleared = Vec::new();
        for criterion in [
            Criterion::IsoOrGain,
            Criterion::Exposure,
            Criterion::Resolution,
            Criterion::Binning,
        ] {
            let domain = self.get(criterion);
            let Some(slot) = criteria.slot_mut(criterion) else {
                continue;
            };
            let Some(selected) = slot.as_deref().map(str::trim) else {
                continue;
            };
            if selected.is_empty() {
                *slot = None;
                continue;
            }

            match domain.iter().find(|choice| same_choice(choice, selected)) {
                Some(choice) => *slot = Some(choice.clone()),
                None => {
                    debug!("Clearing {} '{}': no longer available", criterion, selected);
                    *slot = None;
                    cleared.push(criterion);
                }
            }
        }
        cleared
    }
}

fn same_choice(choice: &str, selected: &str) -> bool {
    if choice == selected {
        return true;
    }
    match (choice.parse::<f64>(), selected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Sort key of a choice: the number itself, or the number before the "x" of a
/// composite key such as "4144x2822"
fn numeric_key(value: &str) -> Option<f64> {
    let head = match value.split_once('x') {
        Some((first, _)) => first,
        None => value,
    };
    head.trim().parse::<f64>().ok()
}

/// Sort a domain ascending.
///
/// Numeric order is used only if every value has a numeric key; a single
/// non-numeric value switches the whole domain to lexicographic order.
pub fn sort_domain(mut values: Vec<String>) -> Vec<String> {
    let keys: Option<Vec<f64>> = values.iter().map(|v| numeric_key(v)).collect();

    match keys {
        Some(keys) => {
            let mut keyed: Vec<(f64, String)> = keys.into_iter().zip(values).collect();
            keyed.sort_by(|a, b| match a.0.total_cmp(&b.0) {
                Ordering::Equal => a.1.cmp(&b.1),
                other => other,
            });
            keyed.into_iter().map(|(_, v)| v).collect()
        }
        None => {
            values.sort();
            values
        }
    }
}

/// All cataloged temperatures. Never restricted by other criteria.
pub fn temperature_domain(catalog: &FrameCatalog) -> Result<Vec<String>> {
    let values = catalog.distinct_values(Column::CcdTemp, &FrameFilter::all())?;
    Ok(sort_domain(values))
}

/// Legal choices for every dependent criterion under a temperature constraint.
pub fn domains(catalog: &FrameCatalog, temperature: Option<&TemperatureConstraint>) -> Result<Domains> {
    let filter = FrameFilter::all().and_temperature(temperature);
    let domain = |column| -> Result<Vec<String>> {
        Ok(sort_domain(catalog.distinct_values(column, &filter)?))
    };

    Ok(Domains {
        iso_or_gain: domain(Column::IsoOrGain)?,
        exposure: domain(Column::ExposureTime)?,
        resolution: domain(Column::Resolution)?,
        binning: domain(Column::Binning)?,
    })
}

/// Number of frames matching every criterion that has a value
pub fn match_count(catalog: &FrameCatalog, criteria: &SelectionCriteria) -> Result<u64> {
    catalog.count_matching(&FrameFilter::from_criteria(criteria))
}

/// Clamp the requested stack size to `[2, match_count]`.
/// With fewer than 2 matches the result stays at 2 (synthesis is not ready anyway).
pub fn clamp_desired_count(desired: usize, match_count: u64) -> usize {
    let upper = usize::try_from(match_count)
        .unwrap_or(usize::MAX)
        .max(MIN_STACK_FRAMES);
    desired.clamp(MIN_STACK_FRAMES, upper)
}

/// Synthesis is enabled once every criterion is concrete and at least two frames match
pub fn is_ready(criteria: &SelectionCriteria, match_count: u64) -> bool {
    criteria.is_complete() && match_count >= MIN_STACK_FRAMES as u64
}

/// Result of recomputing the selection state after a constraint change
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Criteria with stale dependent selections cleared
    pub criteria: SelectionCriteria,
    pub temperatures: Vec<String>,
    pub domains: Domains,
    /// Dependent criteria that were reset because their value disappeared
    pub cleared: Vec<Criterion>,
    pub match_count: u64,
    pub desired_count: usize,
    pub ready: bool,
}

/// Recompute domains, invalidate stale selections, count matches and
/// re-clamp the requested stack size.
pub fn refine(
    catalog: &FrameCatalog,
    mut criteria: SelectionCriteria,
    desired_count: usize,
) -> Result<Refinement> {
    let temperatures = temperature_domain(catalog)?;
    let domains = domains(catalog, criteria.temperature.as_ref())?;
    let cleared = domains.reconcile(&mut criteria);
    let match_count = match_count(catalog, &criteria)?;

    Ok(Refinement {
        desired_count: clamp_desired_count(desired_count, match_count),
        ready: is_ready(&criteria, match_count),
        criteria,
        temperatures,
        domains,
        cleared,
        match_count,
    })
}

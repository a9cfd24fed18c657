//! Selection criteria for building a master dark
//!
//! Criteria are transient: the CLI builds them from flags, the filtering
//! engine narrows them, the pipeline consumes the complete form.

use std::fmt;

use crate::error::{DarkError, Result};

/// Temperature selection, either a single value or an inclusive range.
///
/// In range mode either bound may still be unset while the user is choosing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureConstraint {
    Exact(f64),
    Range { min: Option<f64>, max: Option<f64> },
}

impl TemperatureConstraint {
    /// Range bounds in ascending order, `None` unless both are set.
    /// An exact temperature has no range bounds.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            TemperatureConstraint::Exact(_) => None,
            TemperatureConstraint::Range {
                min: Some(a),
                max: Some(b),
            } => Some((a.min(b), a.max(b))),
            TemperatureConstraint::Range { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            TemperatureConstraint::Exact(_) => true,
            TemperatureConstraint::Range { .. } => self.bounds().is_some(),
        }
    }

    /// Label used in master dark names: "-10" or "-15--5"
    pub fn label(&self) -> Option<String> {
        match self {
            TemperatureConstraint::Exact(t) => Some(t.to_string()),
            TemperatureConstraint::Range { .. } => {
                self.bounds().map(|(min, max)| format!("{}-{}", min, max))
            }
        }
    }
}

/// Parse a temperature entered by the user (or picked from the domain)
pub fn parse_temperature(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| DarkError::invalid(format!("temperature '{}' is not a number", trimmed)))
}

/// The user-facing criteria, in the order they are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Temperature,
    IsoOrGain,
    Exposure,
    Resolution,
    Binning,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::Temperature => "temperature",
            Criterion::IsoOrGain => "ISO/gain",
            Criterion::Exposure => "exposure time",
            Criterion::Resolution => "resolution",
            Criterion::Binning => "binning",
        };
        f.write_str(name)
    }
}

/// Partially or fully specified criteria.
///
/// Dependent criteria hold the string exactly as it appears in its domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionCriteria {
    pub temperature: Option<TemperatureConstraint>,
    pub iso_or_gain: Option<String>,
    pub exposure: Option<String>,
    pub resolution: Option<String>,
    pub binning: Option<String>,
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).is_some_and(|v| !v.is_empty())
}

impl SelectionCriteria {
    /// Criteria that still lack a concrete value
    pub fn missing(&self) -> Vec<Criterion> {
        let mut missing = Vec::new();
        if !self.temperature.as_ref().is_some_and(|t| t.is_complete()) {
            missing.push(Criterion::Temperature);
        }
        for (criterion, value) in [
            (Criterion::IsoOrGain, &self.iso_or_gain),
            (Criterion::Exposure, &self.exposure),
            (Criterion::Resolution, &self.resolution),
            (Criterion::Binning, &self.binning),
        ] {
            if !is_set(value) {
                missing.push(criterion);
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Mutable slot for a dependent criterion (temperature has none)
    pub(crate) fn slot_mut(&mut self, criterion: Criterion) -> Option<&mut Option<String>> {
        match criterion {
            Criterion::Temperature => None,
            Criterion::IsoOrGain => Some(&mut self.iso_or_gain),
            Criterion::Exposure => Some(&mut self.exposure),
            Criterion::Resolution => Some(&mut self.resolution),
            Criterion::Binning => Some(&mut self.binning),
        }
    }
}

/// Fully specified criteria, as required by the synthesis pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteCriteria {
    pub temperature_label: String,
    pub iso_or_gain: String,
    pub exposure: String,
    pub resolution: String,
    pub binning: String,
}

impl TryFrom<&SelectionCriteria> for CompleteCriteria {
    type Error = DarkError;

    fn try_from(criteria: &SelectionCriteria) -> Result<Self> {
        let missing = criteria.missing();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|c| c.to_string()).collect();
            return Err(DarkError::invalid(format!(
                "every criterion needs a value, missing: {}",
                names.join(", ")
            )));
        }

        let text = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
        Ok(CompleteCriteria {
            temperature_label: criteria
                .temperature
                .as_ref()
                .and_then(|t| t.label())
                .unwrap_or_default(),
            iso_or_gain: text(&criteria.iso_or_gain),
            exposure: text(&criteria.exposure),
            resolution: text(&criteria.resolution),
            binning: text(&criteria.binning),
        })
    }
}

//! Conjunctive filter assembly for the `darks` table
//!
//! Every criterion that has a value contributes one predicate; the builder
//! folds them into a single parameterized `WHERE` clause. Unset criteria are
//! simply never pushed, so they match everything.

use rusqlite::types::Value;

use super::criteria::{SelectionCriteria, TemperatureConstraint};

/// Filterable columns (or derived keys) of the `darks` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    CcdTemp,
    /// ISO speed when present, electronic gain otherwise
    IsoOrGain,
    ExposureTime,
    /// Composite "<naxis1>x<naxis2>"
    Resolution,
    /// Composite "<xbinning>x<ybinning>"
    Binning,
}

impl Column {
    /// SQL expression selecting this column
    pub fn sql(&self) -> &'static str {
        match self {
            Column::CcdTemp => "ccd_temp",
            Column::IsoOrGain => "COALESCE(iso, gain)",
            Column::ExposureTime => "exptime",
            Column::Resolution => "naxis1 || 'x' || naxis2",
            Column::Binning => "xbinning || 'x' || ybinning",
        }
    }

    /// Composite keys are compared as opaque text
    pub fn is_composite(&self) -> bool {
        matches!(self, Column::Resolution | Column::Binning)
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: Column, value: Value },
    /// Inclusive on both ends
    Between { column: Column, min: Value, max: Value },
}

impl Predicate {
    /// Equality against a value picked from a domain
    pub fn eq(column: Column, value: &str) -> Self {
        let value = if column.is_composite() {
            Value::Text(value.to_string())
        } else {
            typed_value(value)
        };
        Predicate::Eq { column, value }
    }

    fn push_sql(&self, clauses: &mut Vec<String>, params: &mut Vec<Value>) {
        match self {
            Predicate::Eq { column, value } => {
                clauses.push(format!("{} = ?", column.sql()));
                params.push(value.clone());
            }
            Predicate::Between { column, min, max } => {
                clauses.push(format!("{} BETWEEN ? AND ?", column.sql()));
                params.push(min.clone());
                params.push(max.clone());
            }
        }
    }
}

/// Ordered set of predicates combined with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameFilter {
    predicates: Vec<Predicate>,
}

impl FrameFilter {
    /// A filter matching every frame
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add an equality predicate only when a value is selected
    pub fn and_eq(self, column: Column, value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => self.and(Predicate::eq(column, value)),
            None => self,
        }
    }

    /// Restrict by temperature; a range with a missing bound restricts nothing
    pub fn and_temperature(self, constraint: Option<&TemperatureConstraint>) -> Self {
        match constraint {
            Some(TemperatureConstraint::Exact(t)) => self.and(Predicate::Eq {
                column: Column::CcdTemp,
                value: Value::Real(*t),
            }),
            Some(range) => match range.bounds() {
                Some((min, max)) => self.and(Predicate::Between {
                    column: Column::CcdTemp,
                    min: Value::Real(min),
                    max: Value::Real(max),
                }),
                None => self,
            },
            None => self,
        }
    }

    /// Filter built from every criterion that currently has a value
    pub fn from_criteria(criteria: &SelectionCriteria) -> Self {
        FrameFilter::all()
            .and_temperature(criteria.temperature.as_ref())
            .and_eq(Column::IsoOrGain, criteria.iso_or_gain.as_deref())
            .and_eq(Column::ExposureTime, criteria.exposure.as_deref())
            .and_eq(Column::Resolution, criteria.resolution.as_deref())
            .and_eq(Column::Binning, criteria.binning.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Render as `" WHERE a = ? AND b BETWEEN ? AND ?"` plus its parameters.
    /// An empty filter renders as an empty string.
    pub fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::new();
        for predicate in &self.predicates {
            predicate.push_sql(&mut clauses, &mut params);
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

/// Bind a domain value with the SQL type it was read as.
///
/// Expressions such as `COALESCE(iso, gain)` carry no column affinity, so a
/// text parameter would never equal a stored number.
pub fn typed_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        Value::Integer(int)
    } else if let Ok(real) = raw.parse::<f64>() {
        Value::Real(real)
    } else {
        Value::Text(raw.to_string())
    }
}

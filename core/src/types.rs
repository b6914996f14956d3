//! Shared primitive types used across the entire pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the synthetic aggregate row appended to every table.
pub const NATIONWIDE: &str = "NATIONWIDE";

/// As-of-date carried by the nationwide prison population row.
pub const NOT_APPLICABLE: &str = "N/A";

/// Rates are expressed per this many persons (or cases, for CFR).
pub const PER_100K: f64 = 100_000.0;

/// The three upstream sources. Every fatal error names one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    PrisonPopulation,
    PrisonCovid,
    StateCovid,
}

impl Dataset {
    pub fn label(self) -> &'static str {
        match self {
            Dataset::PrisonPopulation => "prison population",
            Dataset::PrisonCovid      => "prison COVID-19 cases",
            Dataset::StateCovid       => "state COVID-19 daily report",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A derived rate. `NoData` marks a division by a zero or missing
/// denominator and must never be rendered as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Rate {
    Value(f64),
    #[default]
    NoData,
}

impl Rate {
    /// Wrap a float, mapping NaN and infinities to `NoData`.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Rate::Value(value)
        } else {
            Rate::NoData
        }
    }

    /// `count * 100000 / denominator`.
    pub fn per_100k(count: Option<u64>, denominator: Option<u64>) -> Self {
        match (count, denominator) {
            (Some(count), Some(denominator)) if denominator > 0 => {
                Rate::new(count as f64 * PER_100K / denominator as f64)
            }
            _ => Rate::NoData,
        }
    }

    /// A rate supplied directly by a source, possibly missing.
    pub fn from_supplied(value: Option<f64>) -> Self {
        value.map_or(Rate::NoData, Rate::new)
    }

    /// Rescale a value; `NoData` stays `NoData`.
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Rate::Value(v) => Rate::new(v * factor),
            Rate::NoData   => Rate::NoData,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Rate::Value(v) => Some(v),
            Rate::NoData   => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, Rate::NoData)
    }
}

impl From<Option<f64>> for Rate {
    fn from(value: Option<f64>) -> Self {
        Rate::from_supplied(value)
    }
}

impl From<Rate> for Option<f64> {
    fn from(rate: Rate) -> Self {
        rate.value()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Value(v) => write!(f, "{v:.2}"),
            Rate::NoData   => f.write_str("no data"),
        }
    }
}

/// Normalized state name used for every cross-table join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(name: &str) -> Self {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominator_is_no_data_not_zero() {
        assert_eq!(Rate::per_100k(Some(0), Some(0)), Rate::NoData);
        assert_eq!(Rate::per_100k(Some(5), Some(0)), Rate::NoData);
        assert_eq!(Rate::per_100k(None, Some(10)), Rate::NoData);
        assert_eq!(Rate::per_100k(Some(0), Some(10)), Rate::Value(0.0));
    }

    #[test]
    fn non_finite_values_collapse_to_no_data() {
        assert!(Rate::new(f64::NAN).is_no_data());
        assert!(Rate::new(f64::INFINITY).is_no_data());
        assert!(Rate::from_supplied(Some(f64::NEG_INFINITY)).is_no_data());
    }

    #[test]
    fn rate_serializes_as_number_or_null() {
        let json = serde_json::to_string(&vec![Rate::Value(1.5), Rate::NoData]).unwrap();
        assert_eq!(json, "[1.5,null]");
        let back: Vec<Rate> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Rate::Value(1.5), Rate::NoData]);
    }

    #[test]
    fn state_keys_ignore_case_and_spacing() {
        assert_eq!(StateKey::new("  New   York "), StateKey::new("new york"));
        assert_ne!(StateKey::new("New York"), StateKey::new("New Jersey"));
    }
}

//! State COVID-19 loader (daily report for the prison data's as-of-date).
//!
//! Design:
//!   - Incident_Rate is already cases per 100,000 persons -> State_CR
//!   - Case_Fatality_Ratio (Mortality_Rate in older reports) is deaths per
//!     100 cases -> State_CFR after x1000
//!   - The report carries no population, so it is recovered by inverting
//!     the case rate: confirmed * 100000 / State_CR, truncated to a whole
//!     number of persons
//!   - State_MR = deaths * 100000 / state_population
//!   - NATIONWIDE sums confirmed, deaths and derived populations and
//!     recomputes all three rates from those sums; states lacking a
//!     population are listed by `nationwide_gaps`

use crate::{
    error::PipelineResult,
    table::{index_unique, RawTable},
    types::{Dataset, Rate, StateKey, NATIONWIDE, PER_100K},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PROVINCE_STATE: &str = "Province_State";
const CONFIRMED: &str = "Confirmed";
const DEATHS: &str = "Deaths";
const INCIDENT_RATE: &str = "Incident_Rate";
const CASE_FATALITY_RATIO: &str = "Case_Fatality_Ratio";

/// Deaths per 100 cases -> deaths per 100,000 cases.
pub const CFR_RESCALE: f64 = 1000.0;

/// One state's figures as supplied by the daily report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCovidSupplied {
    pub name: String,
    pub confirmed: Option<u64>,
    pub deaths: Option<u64>,
    pub incident_rate: Option<f64>,
    /// Deaths per 100 cases.
    pub case_fatality_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCovidRow {
    #[serde(rename = "Province_State")]
    pub name: String,
    #[serde(rename = "Confirmed")]
    pub confirmed: Option<u64>,
    #[serde(rename = "Deaths")]
    pub deaths: Option<u64>,
    #[serde(rename = "population")]
    pub state_population: Option<u64>,
    #[serde(rename = "State_CR")]
    pub state_cr: Rate,
    #[serde(rename = "State_MR")]
    pub state_mr: Rate,
    #[serde(rename = "State_CFR")]
    pub state_cfr: Rate,
}

impl StateCovidRow {
    fn derive(supplied: StateCovidSupplied) -> Self {
        let state_cr = Rate::from_supplied(supplied.incident_rate);
        let state_cfr = Rate::from_supplied(supplied.case_fatality_ratio).scaled(CFR_RESCALE);
        let state_population = implied_population(supplied.confirmed, state_cr);
        Self {
            state_mr: Rate::per_100k(supplied.deaths, state_population),
            name: supplied.name,
            confirmed: supplied.confirmed,
            deaths: supplied.deaths,
            state_population,
            state_cr,
            state_cfr,
        }
    }
}

/// Invert `State_CR = confirmed * 100000 / population`. A zero or missing
/// case rate leaves the population undefined.
pub fn implied_population(confirmed: Option<u64>, state_cr: Rate) -> Option<u64> {
    let confirmed = confirmed?;
    match state_cr {
        Rate::Value(cr) if cr > 0.0 => {
            let population = (confirmed as f64 * PER_100K / cr).trunc();
            (population.is_finite() && population >= 0.0).then_some(population as u64)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCovidTable {
    pub states: Vec<StateCovidRow>,
    pub nationwide: StateCovidRow,
}

impl StateCovidTable {
    pub fn load(raw: &RawTable) -> PipelineResult<Self> {
        let name = raw.column(PROVINCE_STATE)?;
        let confirmed = raw.column(CONFIRMED)?;
        let deaths = raw.column(DEATHS)?;
        let incident = raw.column(INCIDENT_RATE)?;
        let fatality = raw.column(CASE_FATALITY_RATIO)?;

        let supplied = raw
            .rows()
            .iter()
            .map(|row| {
                Ok(StateCovidSupplied {
                    name:                raw.text(row, &name).to_string(),
                    confirmed:           raw.count(row, &confirmed)?,
                    deaths:              raw.count(row, &deaths)?,
                    incident_rate:       raw.rate(row, &incident)?,
                    case_fatality_ratio: raw.rate(row, &fatality)?,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Self::from_supplied(supplied)
    }

    pub fn from_supplied(supplied: Vec<StateCovidSupplied>) -> PipelineResult<Self> {
        index_unique(Dataset::StateCovid, &supplied, |s| s.name.as_str())?;

        let states: Vec<StateCovidRow> = supplied
            .into_iter()
            .map(StateCovidRow::derive)
            .inspect(|row| {
                if row.state_population.is_none() {
                    log::warn!(
                        "{}: case rate is zero or missing, population and State_MR have no data",
                        row.name
                    );
                }
            })
            .collect();

        let confirmed: u64 = states.iter().filter_map(|r| r.confirmed).sum();
        let deaths: u64 = states.iter().filter_map(|r| r.deaths).sum();
        let population: u64 = states.iter().filter_map(|r| r.state_population).sum();

        let nationwide = StateCovidRow {
            name:             NATIONWIDE.to_string(),
            confirmed:        Some(confirmed),
            deaths:           Some(deaths),
            state_population: Some(population),
            state_cr:         Rate::per_100k(Some(confirmed), Some(population)),
            state_mr:         Rate::per_100k(Some(deaths), Some(population)),
            state_cfr:        Rate::per_100k(Some(deaths), Some(confirmed)),
        };

        log::debug!(
            "state covid: {} states, nationwide population={population} State_CR={}",
            states.len(),
            nationwide.state_cr
        );

        let table = Self { states, nationwide };
        {
            let gaps = table.nationwide_gaps();
            if !gaps.is_empty() {
                log::warn!(
                    "NATIONWIDE state rates count cases and deaths of states with no derived population: {}",
                    gaps.join(", ")
                );
            }
        }
        Ok(table)
    }

    /// States whose counts enter the NATIONWIDE numerators while their
    /// derived population is missing from the denominator.
    pub fn nationwide_gaps(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|r| {
                r.state_population.is_none()
                    && (r.confirmed.is_some_and(|c| c > 0) || r.deaths.is_some_and(|d| d > 0))
            })
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn index(&self) -> PipelineResult<HashMap<StateKey, &StateCovidRow>> {
        index_unique(Dataset::StateCovid, &self.states, |r| r.name.as_str())
    }

    /// All rows in table order; NATIONWIDE is last.
    pub fn rows(&self) -> impl Iterator<Item = &StateCovidRow> {
        self.states.iter().chain(std::iter::once(&self.nationwide))
    }
}

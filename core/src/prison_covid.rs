//! Prison COVID-19 loader.
//!
//! Design:
//!   - Prison_CR  = total_prisoner_cases  * 100000 / dec_pop
//!   - Prison_MR  = total_prisoner_deaths * 100000 / dec_pop
//!   - Prison_CFR = total_prisoner_deaths * 100000 / total_prisoner_cases
//!   - dec_pop is looked up by state name in the population table, never
//!     by row position. Every state must appear in both tables.
//!   - NATIONWIDE rates are recomputed from summed counts over the summed
//!     population, not averaged from state rates. States with counts but
//!     no population are reported by `nationwide_gaps` and logged.
//!   - The first row's as-of-date picks the state daily report to fetch.

use crate::{
    error::{PipelineError, PipelineResult},
    prison_population::{PrisonPopulationRow, PrisonPopulationTable},
    table::{index_unique, RawTable},
    types::{Dataset, Rate, StateKey, NATIONWIDE, NOT_APPLICABLE},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const NAME: &str = "name";
const CASES: &str = "total_prisoner_cases";
const DEATHS: &str = "total_prisoner_deaths";
const AS_OF_DATE: &str = "as_of_date";

/// Date spellings seen in the prison case data.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y"];

/// Raw counts for one state, before rates are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrisonCovidCounts {
    pub name: String,
    pub total_prisoner_cases: Option<u64>,
    pub total_prisoner_deaths: Option<u64>,
    pub as_of_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrisonCovidRow {
    pub name: String,
    pub total_prisoner_cases: Option<u64>,
    pub total_prisoner_deaths: Option<u64>,
    pub as_of_date: String,
    #[serde(rename = "Prison_CR")]
    pub prison_cr: Rate,
    #[serde(rename = "Prison_MR")]
    pub prison_mr: Rate,
    #[serde(rename = "Prison_CFR")]
    pub prison_cfr: Rate,
}

impl PrisonCovidRow {
    fn derive(counts: PrisonCovidCounts, population: Option<u64>) -> Self {
        let cases = counts.total_prisoner_cases;
        let deaths = counts.total_prisoner_deaths;
        Self {
            prison_cr:  Rate::per_100k(cases, population),
            prison_mr:  Rate::per_100k(deaths, population),
            prison_cfr: Rate::per_100k(deaths, cases),
            name: counts.name,
            total_prisoner_cases: cases,
            total_prisoner_deaths: deaths,
            as_of_date: counts.as_of_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrisonCovidTable {
    pub states: Vec<PrisonCovidRow>,
    pub nationwide: PrisonCovidRow,
}

impl PrisonCovidTable {
    pub fn load(raw: &RawTable, population: &PrisonPopulationTable) -> PipelineResult<Self> {
        let name = raw.column(NAME)?;
        let cases = raw.column(CASES)?;
        let deaths = raw.column(DEATHS)?;
        let as_of = raw.column(AS_OF_DATE)?;

        let counts = raw
            .rows()
            .iter()
            .map(|row| {
                Ok(PrisonCovidCounts {
                    name:                  raw.text(row, &name).to_string(),
                    total_prisoner_cases:  raw.count(row, &cases)?,
                    total_prisoner_deaths: raw.count(row, &deaths)?,
                    as_of_date:            raw.text(row, &as_of).to_string(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Self::from_counts(counts, population)
    }

    /// Derive rates for each state and append the NATIONWIDE aggregate.
    pub fn from_counts(
        counts: Vec<PrisonCovidCounts>,
        population: &PrisonPopulationTable,
    ) -> PipelineResult<Self> {
        index_unique(Dataset::PrisonCovid, &counts, |c| c.name.as_str())?;
        let populations = population.index()?;
        ensure_all_present(&populations, &counts)?;

        let states = counts
            .into_iter()
            .map(|c| {
                let pop = populations
                    .get(&StateKey::new(&c.name))
                    .ok_or_else(|| PipelineError::UnmatchedKey {
                        dataset: Dataset::PrisonCovid,
                        other:   Dataset::PrisonPopulation,
                        name:    c.name.clone(),
                    })?
                    .dec_pop;
                let row = PrisonCovidRow::derive(c, pop);
                if row.prison_cfr.is_no_data() {
                    log::warn!("{}: no prisoner cases reported, Prison_CFR has no data", row.name);
                }
                Ok(row)
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let nationwide = PrisonCovidRow::derive(
            PrisonCovidCounts {
                name:                  NATIONWIDE.to_string(),
                total_prisoner_cases:  Some(states.iter().filter_map(|r| r.total_prisoner_cases).sum()),
                total_prisoner_deaths: Some(states.iter().filter_map(|r| r.total_prisoner_deaths).sum()),
                as_of_date:            NOT_APPLICABLE.to_string(),
            },
            population.nationwide.dec_pop,
        );

        log::debug!(
            "prison covid: {} states, nationwide cases={:?} Prison_CR={}",
            states.len(),
            nationwide.total_prisoner_cases,
            nationwide.prison_cr
        );

        let table = Self { states, nationwide };
        {
            let gaps = table.nationwide_gaps();
            if !gaps.is_empty() {
                log::warn!(
                    "NATIONWIDE prison rates count cases and deaths of states with no population: {}",
                    gaps.join(", ")
                );
            }
        }
        Ok(table)
    }

    /// States whose counts enter the NATIONWIDE numerators while their
    /// population is missing from the denominator.
    pub fn nationwide_gaps(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|r| {
                (is_positive(r.total_prisoner_cases) && r.prison_cr.is_no_data())
                    || (is_positive(r.total_prisoner_deaths) && r.prison_mr.is_no_data())
            })
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn index(&self) -> PipelineResult<HashMap<StateKey, &PrisonCovidRow>> {
        index_unique(Dataset::PrisonCovid, &self.states, |r| r.name.as_str())
    }

    /// All rows in table order; NATIONWIDE is last.
    pub fn rows(&self) -> impl Iterator<Item = &PrisonCovidRow> {
        self.states.iter().chain(std::iter::once(&self.nationwide))
    }

    /// The reporting date of the first state row. It selects which daily
    /// state report the rest of the pipeline uses.
    pub fn data_date(&self) -> PipelineResult<NaiveDate> {
        let first = self.states.first().ok_or(PipelineError::MissingDate {
            dataset: Dataset::PrisonCovid,
        })?;
        parse_as_of_date(&first.as_of_date)
    }
}

fn is_positive(count: Option<u64>) -> bool {
    count.is_some_and(|c| c > 0)
}

/// Every population row must have a case row. The reverse direction is
/// checked while deriving rates.
fn ensure_all_present(
    populations: &HashMap<StateKey, &PrisonPopulationRow>,
    counts: &[PrisonCovidCounts],
) -> PipelineResult<()> {
    let present: HashSet<StateKey> =
        counts.iter().map(|c| StateKey::new(&c.name)).collect();
    let mut missing: Vec<&str> = populations
        .iter()
        .filter(|(key, _)| !present.contains(*key))
        .map(|(_, row)| row.name.as_str())
        .collect();
    missing.sort_unstable();
    match missing.first() {
        Some(name) => Err(PipelineError::UnmatchedKey {
            dataset: Dataset::PrisonPopulation,
            other:   Dataset::PrisonCovid,
            name:    name.to_string(),
        }),
        None => Ok(()),
    }
}

pub fn parse_as_of_date(value: &str) -> PipelineResult<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PipelineError::MissingDate { dataset: Dataset::PrisonCovid });
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| PipelineError::InvalidDate {
            dataset: Dataset::PrisonCovid,
            value: value.to_string(),
        })
}

/// `MM-DD-YYYY`, the file name of a daily state report.
pub fn date_segment(date: NaiveDate) -> String {
    date.format("%m-%d-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_dates_become_dashed_segments() {
        let date = parse_as_of_date("12/15/2020").unwrap();
        assert_eq!(date_segment(date), "12-15-2020");
        let iso = parse_as_of_date("2020-07-04").unwrap();
        assert_eq!(date_segment(iso), "07-04-2020");
    }

    #[test]
    fn garbage_dates_are_rejected() {
        assert!(matches!(
            parse_as_of_date("sometime in May"),
            Err(PipelineError::InvalidDate { .. })
        ));
        assert!(matches!(parse_as_of_date(" "), Err(PipelineError::MissingDate { .. })));
    }
}

//! Prison population loader.
//!
//! Keeps each state's most recent (December) population figure and its
//! as-of-date, then appends a NATIONWIDE row whose population is the sum
//! of the state figures.

use crate::{
    error::PipelineResult,
    table::{index_unique, RawTable},
    types::{Dataset, StateKey, NATIONWIDE, NOT_APPLICABLE},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NAME: &str = "name";
const DEC_POP: &str = "dec_pop";
const AS_OF_DATE_DEC: &str = "as_of_date_dec";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrisonPopulationRow {
    pub name: String,
    /// `None` when the source leaves the cell blank.
    pub dec_pop: Option<u64>,
    pub as_of_date_dec: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrisonPopulationTable {
    pub states: Vec<PrisonPopulationRow>,
    pub nationwide: PrisonPopulationRow,
}

impl PrisonPopulationTable {
    pub fn load(raw: &RawTable) -> PipelineResult<Self> {
        let name = raw.column(NAME)?;
        let dec_pop = raw.column(DEC_POP)?;
        let as_of = raw.column(AS_OF_DATE_DEC)?;

        let states = raw
            .rows()
            .iter()
            .map(|row| {
                Ok(PrisonPopulationRow {
                    name:           raw.text(row, &name).to_string(),
                    dec_pop:        raw.count(row, &dec_pop)?,
                    as_of_date_dec: raw.text(row, &as_of).to_string(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Self::from_states(states)
    }

    /// Build the table from state rows, appending the NATIONWIDE total.
    pub fn from_states(states: Vec<PrisonPopulationRow>) -> PipelineResult<Self> {
        for row in states.iter().filter(|r| r.dec_pop.is_none()) {
            log::warn!("No December prison population for {}; its prison rates will be empty", row.name);
        }

        let total = states.iter().filter_map(|r| r.dec_pop).sum::<u64>();
        let table = Self {
            states,
            nationwide: PrisonPopulationRow {
                name:           NATIONWIDE.to_string(),
                dec_pop:        Some(total),
                as_of_date_dec: NOT_APPLICABLE.to_string(),
            },
        };
        table.index()?;

        log::debug!("prison population: {} states, nationwide {total}", table.states.len());
        Ok(table)
    }

    /// State rows keyed by normalized name.
    pub fn index(&self) -> PipelineResult<HashMap<StateKey, &PrisonPopulationRow>> {
        index_unique(Dataset::PrisonPopulation, &self.states, |r| r.name.as_str())
    }

    /// All rows in table order; NATIONWIDE is last.
    pub fn rows(&self) -> impl Iterator<Item = &PrisonPopulationRow> {
        self.states.iter().chain(std::iter::once(&self.nationwide))
    }
}

//! Table reconciler: joins the prison and state tables into the unified
//! report consumed by the dashboard.
//!
//! Rows are matched by normalized state name. Every state must appear
//! exactly once on both sides; NATIONWIDE rows are paired directly.
//! Output order is the prison table's order with NATIONWIDE last.

use crate::{
    error::{PipelineError, PipelineResult},
    prison_covid::{PrisonCovidRow, PrisonCovidTable},
    state_covid::{StateCovidRow, StateCovidTable},
    types::{Dataset, Rate, StateKey, NATIONWIDE},
};
use serde::{Deserialize, Serialize};

/// Column order of the unified table.
pub const REPORT_COLUMNS: [&str; 7] = [
    "name", "Prison_CR", "State_CR", "Prison_MR", "State_MR", "Prison_CFR", "State_CFR",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub name: String,
    #[serde(rename = "Prison_CR")]
    pub prison_cr: Rate,
    #[serde(rename = "State_CR")]
    pub state_cr: Rate,
    #[serde(rename = "Prison_MR")]
    pub prison_mr: Rate,
    #[serde(rename = "State_MR")]
    pub state_mr: Rate,
    #[serde(rename = "Prison_CFR")]
    pub prison_cfr: Rate,
    #[serde(rename = "State_CFR")]
    pub state_cfr: Rate,
}

impl ReportRow {
    fn join(name: &str, prison: &PrisonCovidRow, state: &StateCovidRow) -> Self {
        Self {
            name:       name.to_string(),
            prison_cr:  prison.prison_cr,
            state_cr:   state.state_cr,
            prison_mr:  prison.prison_mr,
            state_mr:   state.state_mr,
            prison_cfr: prison.prison_cfr,
            state_cfr:  state.state_cfr,
        }
    }

    pub fn is_nationwide(&self) -> bool {
        self.name == NATIONWIDE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn reconcile(prison: &PrisonCovidTable, state: &StateCovidTable) -> PipelineResult<Self> {
        let prison_index = prison.index()?;
        let state_index = state.index()?;

        if let Some(orphan) = state
            .states
            .iter()
            .find(|s| !prison_index.contains_key(&StateKey::new(&s.name)))
        {
            return Err(PipelineError::UnmatchedKey {
                dataset: Dataset::StateCovid,
                other:   Dataset::PrisonCovid,
                name:    orphan.name.clone(),
            });
        }

        let mut rows = Vec::with_capacity(prison.states.len() + 1);
        for p in &prison.states {
            let s = state_index
                .get(&StateKey::new(&p.name))
                .ok_or_else(|| PipelineError::UnmatchedKey {
                    dataset: Dataset::PrisonCovid,
                    other:   Dataset::StateCovid,
                    name:    p.name.clone(),
                })?;
            rows.push(ReportRow::join(&p.name, p, s));
        }
        rows.push(ReportRow::join(NATIONWIDE, &prison.nationwide, &state.nationwide));

        log::info!("Reconciled {} states plus {NATIONWIDE}", rows.len() - 1);
        Ok(Self { rows })
    }

    /// Every row in order; NATIONWIDE is last.
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn states(&self) -> &[ReportRow] {
        &self.rows[..self.rows.len().saturating_sub(1)]
    }

    pub fn nationwide(&self) -> Option<&ReportRow> {
        self.rows.last().filter(|r| r.is_nationwide())
    }

    /// Name-based lookup, as the grid addresses states.
    pub fn row(&self, name: &str) -> Option<&ReportRow> {
        let key = StateKey::new(name);
        self.rows.iter().find(|r| StateKey::new(&r.name) == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

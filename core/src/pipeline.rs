//! The pipeline context: fetch, derive and reconcile in one pass.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Prison population   (denominators for every prison rate)
//!   2. Prison COVID-19     (needs 1)
//!   3. Report date         (first as-of-date of 2, as MM-DD-YYYY)
//!   4. State COVID-19      (URL built from 3)
//!   5. Reconcile           (joins 2 and 4 by state name)
//!
//! RULES:
//!   - Each stage reads only the outputs of earlier stages.
//!   - Any stage error aborts the run; there is no partial report.
//!   - Fetched bodies are memoized by URL for the life of the pipeline.
//!     The state report URL embeds the date, so the date is part of the key.

use crate::{
    config::PipelineConfig,
    error::PipelineResult,
    prison_covid::{date_segment, PrisonCovidTable},
    prison_population::PrisonPopulationTable,
    reconcile::ReportTable,
    source::{HttpFetcher, SourceFetcher},
    state_covid::StateCovidTable,
    table::RawTable,
    types::Dataset,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything one run produces. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub data_date: NaiveDate,
    pub prison_population: PrisonPopulationTable,
    pub prison_covid: PrisonCovidTable,
    pub state_covid: StateCovidTable,
    pub report: ReportTable,
}

pub struct Pipeline<F: SourceFetcher> {
    config: PipelineConfig,
    fetcher: F,
    cache: HashMap<String, String>,
}

impl Pipeline<HttpFetcher> {
    /// A pipeline that fetches over HTTP(S) with the configured timeout.
    pub fn http(config: PipelineConfig) -> PipelineResult<Self> {
        let fetcher = HttpFetcher::new(config.http.clone())?;
        Ok(Self::new(config, fetcher))
    }
}

impl<F: SourceFetcher> Pipeline<F> {
    pub fn new(config: PipelineConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher,
            cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage in order.
    pub fn run(&mut self) -> PipelineResult<PipelineOutput> {
        let prison_population = {
            let raw = self.load_raw(Dataset::PrisonPopulation, None)?;
            PrisonPopulationTable::load(&raw)?
        };
        log::info!(
            "Stage 1: {} prison population rows, nationwide {:?}",
            prison_population.states.len(),
            prison_population.nationwide.dec_pop
        );

        let prison_covid = {
            let raw = self.load_raw(Dataset::PrisonCovid, None)?;
            PrisonCovidTable::load(&raw, &prison_population)?
        };
        log::info!("Stage 2: {} prison COVID-19 rows", prison_covid.states.len());

        let data_date = prison_covid.data_date()?;
        let segment = date_segment(data_date);
        log::info!("Stage 3: report date {data_date} ({segment})");

        let state_covid = {
            let raw = self.load_raw(Dataset::StateCovid, Some(&segment))?;
            StateCovidTable::load(&raw)?
        };
        log::info!("Stage 4: {} state COVID-19 rows", state_covid.states.len());

        let report = ReportTable::reconcile(&prison_covid, &state_covid)?;
        log::info!("Stage 5: unified report with {} rows", report.len());

        Ok(PipelineOutput {
            data_date,
            prison_population,
            prison_covid,
            state_covid,
            report,
        })
    }

    /// Drop every memoized body so the next run refetches.
    pub fn invalidate(&mut self) {
        log::debug!("Dropping {} cached source bodies", self.cache.len());
        self.cache.clear();
    }

    pub fn cached_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.cache.keys().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }

    fn load_raw(&mut self, dataset: Dataset, date_segment: Option<&str>) -> PipelineResult<RawTable> {
        let url = self.config.source(dataset).resolve_url(date_segment);
        self.fetch_cached(dataset, &url)?;
        let body = self.cache.get(&url).map(String::as_str).unwrap_or_default();
        RawTable::parse(dataset, body, self.config.source(dataset))
    }

    fn fetch_cached(&mut self, dataset: Dataset, url: &str) -> PipelineResult<()> {
        if self.cache.contains_key(url) {
            log::debug!("{dataset}: cache hit for {url}");
            return Ok(());
        }
        let body = self.fetcher.fetch(dataset, url)?;
        log::debug!("{dataset}: fetched {} bytes", body.len());
        self.cache.insert(url.to_string(), body);
        Ok(())
    }
}

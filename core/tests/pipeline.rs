//! End-to-end pipeline runs against in-memory sources.
//!
//! Tests verify:
//! 1. A full run yields all three source tables and the unified report
//! 2. The daily state report URL comes from the prison as-of-date
//! 3. Fetched bodies are memoized until invalidated
//! 4. Source failures abort the run and name the failing dataset

mod common;

use chrono::NaiveDate;
use prison_covid_core::{
    error::PipelineError,
    pipeline::Pipeline,
    source::StaticFetcher,
    types::{Dataset, NATIONWIDE},
};

#[test]
fn full_run_produces_every_table() {
    common::init_logging();
    let config = common::config_for(3);
    let fetcher = common::three_state_fetcher(&config);
    let output = Pipeline::new(config, &fetcher).run().unwrap();

    assert_eq!(output.data_date, NaiveDate::from_ymd_opt(2020, 12, 15).unwrap());
    assert_eq!(output.prison_population.states.len(), 3);
    assert_eq!(output.prison_population.nationwide.dec_pop, Some(65_000));
    assert_eq!(output.prison_covid.nationwide.total_prisoner_cases, Some(1_400));
    assert_eq!(output.state_covid.nationwide.state_population, Some(13_800_000));
    assert_eq!(output.report.len(), 4);
    assert_eq!(output.report.rows()[3].name, NATIONWIDE);
}

#[test]
fn state_report_url_is_derived_from_prison_as_of_date() {
    let config = common::config_for(3);
    let fetcher = common::three_state_fetcher(&config);
    Pipeline::new(config, &fetcher).run().unwrap();

    assert_eq!(
        fetcher.requests(),
        vec![
            common::POPULATION_URL.to_string(),
            common::PRISON_URL.to_string(),
            common::state_url("12-15-2020"),
        ]
    );
}

#[test]
fn second_run_is_served_from_cache() {
    let config = common::config_for(3);
    let fetcher = common::three_state_fetcher(&config);
    let mut pipeline = Pipeline::new(config, &fetcher);

    let first = pipeline.run().unwrap();
    let second = pipeline.run().unwrap();
    assert_eq!(first, second);
    assert_eq!(fetcher.requests().len(), 3);
    assert_eq!(pipeline.cached_urls().len(), 3);

    pipeline.invalidate();
    assert!(pipeline.cached_urls().is_empty());
    pipeline.run().unwrap();
    assert_eq!(fetcher.requests().len(), 6);
}

#[test]
fn missing_daily_report_aborts_with_state_dataset() {
    let config = common::config_for(1);
    let fetcher = StaticFetcher::new()
        .with(
            common::POPULATION_URL,
            common::population_csv(&config, &[("Ohio", Some(50_000))]),
        )
        .with(
            common::PRISON_URL,
            common::prison_csv(&config, &[("Ohio", Some(10), Some(0), "01/02/2021")]),
        );
    let err = Pipeline::new(config, &fetcher).run().unwrap_err();

    assert_eq!(err.dataset(), Some(Dataset::StateCovid));
    assert!(
        matches!(err, PipelineError::HttpStatus { status: 404, ref url, .. } if url.ends_with("01-02-2021.csv")),
        "{err}"
    );
}

#[test]
fn upstream_schema_drift_aborts_before_any_rates() {
    let config = common::config_for(3);
    let drifted = common::population_csv(&config, &[
        ("Alabama", Some(20_000)),
        ("Alaska", Some(5_000)),
        ("Arizona", Some(40_000)),
    ])
    .replacen("dec_pop", "december_pop", 1);
    let fetcher = StaticFetcher::new().with(common::POPULATION_URL, drifted);
    let err = Pipeline::new(config, &fetcher).run().unwrap_err();

    assert!(
        matches!(err, PipelineError::SchemaMismatch { dataset: Dataset::PrisonPopulation, .. }),
        "{err}"
    );
    assert_eq!(fetcher.requests().len(), 1);
}

#[test]
fn too_few_state_rows_is_reported() {
    let config = common::config_for(3);
    let fetcher = StaticFetcher::new().with(
        common::POPULATION_URL,
        common::population_csv(&config, &[("Alabama", Some(20_000))]),
    );
    let err = Pipeline::new(config, &fetcher).run().unwrap_err();
    assert!(
        matches!(
            err,
            PipelineError::InsufficientRows { dataset: Dataset::PrisonPopulation, expected: 3, found: 1 }
        ),
        "{err}"
    );
}

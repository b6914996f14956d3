//! report-runner: headless runner for the prison COVID-19 dashboard feed.
//!
//! Usage:
//!   report-runner --metric cr
//!   report-runner --metric cfr --show-data --out dashboard.json
//!   report-runner --config sources.json --metric mr

use anyhow::Result;
use prison_covid_core::{
    config::PipelineConfig,
    dashboard::{format_data_date, Dashboard, Metric},
    pipeline::{Pipeline, PipelineOutput},
    types::Rate,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let metric: Metric = match arg_value(&args, "--metric") {
        Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
        None => Metric::default(),
    };
    let show_data = args.iter().any(|a| a == "--show-data");
    let out = arg_value(&args, "--out");
    let config = match arg_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    println!("Prison COVID-19 report-runner");
    println!("  metric:    {}", metric.label());
    println!("  show data: {show_data}");
    println!("  timeout:   {}ms", config.http.timeout_ms);
    println!();

    let mut pipeline = Pipeline::http(config)?;
    let output = match pipeline.run() {
        Ok(output) => output,
        Err(e) => {
            match e.dataset() {
                Some(dataset) => log::error!("Report aborted, {dataset} source failed: {e}"),
                None => log::error!("Report aborted: {e}"),
            }
            return Err(e.into());
        }
    };

    print_summary(&output, metric);

    let dashboard = Dashboard::build(&output, metric, show_data);
    if let Some(path) = out {
        std::fs::write(path, dashboard.to_json()?)?;
        println!();
        println!("Dashboard feed written to {path}");
    }
    Ok(())
}

fn print_summary(output: &PipelineOutput, metric: Metric) {
    println!("=== {} ===", metric.label().to_uppercase());
    println!("  data as of:  {}", format_data_date(output.data_date));
    println!("  states:      {}", output.report.states().len());

    if let Some(nat) = output.report.nationwide() {
        let (prison, statewide) = metric.select(nat);
        println!("  nationwide:  prisons {prison} | statewide {statewide}");
    }

    let no_data = output
        .report
        .states()
        .iter()
        .filter(|r| {
            let (p, s) = metric.select(r);
            p.is_no_data() || s.is_no_data()
        })
        .count();
    println!("  no data:     {no_data} states");

    println!();
    println!("=== HIGHEST PRISON {} (top 5) ===", metric.code());
    let mut ranked: Vec<_> = output
        .report
        .states()
        .iter()
        .filter_map(|r| match metric.select(r) {
            (Rate::Value(p), statewide) => Some((r.name.as_str(), p, statewide)),
            (Rate::NoData, _) => None,
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (name, prison, statewide) in ranked.iter().take(5) {
        println!("  {name:<16} prisons {prison:>10.2} | statewide {statewide}");
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

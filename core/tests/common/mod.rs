//! Shared CSV fixtures. Every fixture carries the real upstream header so
//! the schema checks run exactly as they do against live data.

#![allow(dead_code)]

use prison_covid_core::{
    config::{PipelineConfig, RowSelection},
    source::StaticFetcher,
};

pub const POPULATION_URL: &str = "mem://prison_populations.csv";
pub const PRISON_URL: &str = "mem://covid_prison_cases.csv";
pub const STATE_URL_TEMPLATE: &str = "mem://daily/{date}.csv";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default schemas, in-memory URLs, and windows sized for `states` rows.
pub fn config_for(states: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.prison_population.url = POPULATION_URL.into();
    config.prison_population.rows = RowSelection::Window { skip: 0, take: states };
    config.prison_covid.url = PRISON_URL.into();
    config.prison_covid.rows = RowSelection::Window { skip: 0, take: states };
    config.state_covid.url = STATE_URL_TEMPLATE.into();
    config.state_covid.rows = RowSelection::Excluding { rows: vec![], take: states };
    config
}

pub fn state_url(segment: &str) -> String {
    STATE_URL_TEMPLATE.replace("{date}", segment)
}

fn csv(header: &[String], rows: Vec<Vec<String>>) -> String {
    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        assert_eq!(row.len(), header.len(), "fixture row width");
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn opt(v: Option<u64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn set(row: &mut [String], header: &[String], column: &str, value: String) {
    let index = header.iter().position(|h| h == column).expect("fixture column");
    row[index] = value;
}

/// `(name, dec_pop)` rows.
pub fn population_csv(config: &PipelineConfig, rows: &[(&str, Option<u64>)]) -> String {
    let header = &config.prison_population.columns;
    let body = rows
        .iter()
        .map(|(name, pop)| {
            let mut row = vec![String::new(); header.len()];
            set(&mut row, header, "name", name.to_string());
            set(&mut row, header, "abbreviation", abbreviate(name));
            set(&mut row, header, "nov_pop", "1".into());
            set(&mut row, header, "dec_pop", opt(*pop));
            set(&mut row, header, "as_of_date_dec", "12/01/2020".into());
            row
        })
        .collect();
    csv(header, body)
}

/// `(name, cases, deaths, as_of_date)` rows.
pub fn prison_csv(config: &PipelineConfig, rows: &[(&str, Option<u64>, Option<u64>, &str)]) -> String {
    let header = &config.prison_covid.columns;
    let body = rows
        .iter()
        .map(|(name, cases, deaths, date)| {
            let mut row = vec![String::new(); header.len()];
            set(&mut row, header, "name", name.to_string());
            set(&mut row, header, "abbreviation", abbreviate(name));
            set(&mut row, header, "total_staff_cases", "7".into());
            set(&mut row, header, "total_prisoner_cases", opt(*cases));
            set(&mut row, header, "total_prisoner_deaths", opt(*deaths));
            set(&mut row, header, "as_of_date", date.to_string());
            row
        })
        .collect();
    csv(header, body)
}

/// `(name, confirmed, deaths, incident_rate, case_fatality_ratio)` rows.
pub fn state_csv(config: &PipelineConfig, rows: &[(&str, u64, u64, f64, f64)]) -> String {
    let header = &config.state_covid.columns;
    let body = rows
        .iter()
        .map(|(name, confirmed, deaths, incident, fatality)| {
            let mut row = vec![String::new(); header.len()];
            set(&mut row, header, "Province_State", name.to_string());
            set(&mut row, header, "Country_Region", "US".into());
            set(&mut row, header, "Confirmed", confirmed.to_string());
            set(&mut row, header, "Deaths", deaths.to_string());
            set(&mut row, header, "Incident_Rate", incident.to_string());
            set(&mut row, header, "Case_Fatality_Ratio", fatality.to_string());
            set(&mut row, header, "ISO3", "USA".into());
            row
        })
        .collect();
    csv(header, body)
}

fn abbreviate(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

/// Three states whose sources list them in three different orders.
pub fn three_state_fetcher(config: &PipelineConfig) -> StaticFetcher {
    StaticFetcher::new()
        .with(
            POPULATION_URL,
            population_csv(config, &[
                ("Alabama", Some(20_000)),
                ("Alaska", Some(5_000)),
                ("Arizona", Some(40_000)),
            ]),
        )
        .with(
            PRISON_URL,
            prison_csv(config, &[
                ("Arizona", Some(400), Some(4), "12/15/2020"),
                ("Alabama", Some(1_000), Some(20), "12/15/2020"),
                ("Alaska", Some(0), Some(0), "12/15/2020"),
            ]),
        )
        .with(
            state_url("12-15-2020"),
            state_csv(config, &[
                ("Alaska", 40_000, 200, 5_000.0, 0.5),
                ("Arizona", 400_000, 8_000, 5_000.0, 2.0),
                ("Alabama", 250_000, 5_000, 5_000.0, 2.0),
            ]),
        )
}

//! Plot-ready feed for the dashboard renderer.
//!
//! The renderer itself lives outside this crate. Everything here is a
//! deterministic mapping from the unified report to chart primitives:
//! a 9x12 tile map of per-state bar pairs and a full-width grouped bar
//! chart, both for one selected metric. `NoData` values pass through
//! untouched so the renderer can draw them as absent bars.

use crate::{
    error::PipelineResult,
    pipeline::PipelineOutput,
    prison_covid::PrisonCovidRow,
    prison_population::PrisonPopulationRow,
    reconcile::{ReportRow, ReportTable},
    state_covid::StateCovidRow,
    types::{Rate, NATIONWIDE},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const GRID_ROWS: u8 = 9;
pub const GRID_COLS: u8 = 12;

pub const STATEWIDE_COLOR: &str = "#000000";
pub const PRISON_SERIES: &str = "In prisons";
pub const STATEWIDE_SERIES: &str = "Statewide";

/// Tile positions (1-based row, column) of the state grid map.
const GRID_LAYOUT: &[(&str, &str, u8, u8)] = &[
    ("ME", "Maine", 1, 12),
    ("WA", "Washington", 2, 1),
    ("MT", "Montana", 2, 2),
    ("ND", "North Dakota", 2, 3),
    ("MN", "Minnesota", 2, 4),
    ("WI", "Wisconsin", 2, 5),
    ("MI", "Michigan", 2, 6),
    ("NY", "New York", 2, 9),
    ("VT", "Vermont", 2, 10),
    ("NH", "New Hampshire", 2, 11),
    ("MA", "Massachusetts", 2, 12),
    ("OR", "Oregon", 3, 1),
    ("ID", "Idaho", 3, 2),
    ("WY", "Wyoming", 3, 3),
    ("SD", "South Dakota", 3, 4),
    ("IA", "Iowa", 3, 5),
    ("IL", "Illinois", 3, 6),
    ("IN", "Indiana", 3, 7),
    ("OH", "Ohio", 3, 8),
    ("PA", "Pennsylvania", 3, 9),
    ("NJ", "New Jersey", 3, 10),
    ("CT", "Connecticut", 3, 11),
    ("RI", "Rhode Island", 3, 12),
    ("NV", "Nevada", 4, 1),
    ("UT", "Utah", 4, 2),
    ("CO", "Colorado", 4, 3),
    ("NE", "Nebraska", 4, 4),
    ("KS", "Kansas", 4, 5),
    ("MO", "Missouri", 4, 6),
    ("TN", "Tennessee", 4, 7),
    ("KY", "Kentucky", 4, 8),
    ("WV", "West Virginia", 4, 9),
    ("VA", "Virginia", 4, 10),
    ("MD", "Maryland", 4, 11),
    ("DE", "Delaware", 4, 12),
    ("CA", "California", 5, 2),
    ("AZ", "Arizona", 5, 3),
    ("NM", "New Mexico", 5, 4),
    ("OK", "Oklahoma", 5, 5),
    ("AR", "Arkansas", 5, 6),
    ("MS", "Mississippi", 5, 7),
    ("AL", "Alabama", 5, 8),
    ("GA", "Georgia", 5, 9),
    ("SC", "South Carolina", 5, 10),
    ("NC", "North Carolina", 5, 11),
    ("TX", "Texas", 6, 5),
    ("LA", "Louisiana", 6, 6),
    ("FL", "Florida", 6, 9),
    ("AK", "Alaska", 8, 2),
    ("HI", "Hawaii", 8, 4),
    ("NAT", NATIONWIDE, 8, 11),
];

/// The three comparisons a reader can switch between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    CaseRate,
    MortalityRate,
    CaseFatalityRatio,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::CaseRate, Metric::MortalityRate, Metric::CaseFatalityRatio];

    /// Column suffix in the unified table.
    pub fn code(self) -> &'static str {
        match self {
            Metric::CaseRate          => "CR",
            Metric::MortalityRate     => "MR",
            Metric::CaseFatalityRatio => "CFR",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::CaseRate          => "Case Rate",
            Metric::MortalityRate     => "Mortality Rate",
            Metric::CaseFatalityRatio => "Case-Fatality Ratio",
        }
    }

    /// Color of the prison series; the statewide series is always black.
    pub fn color(self) -> &'static str {
        match self {
            Metric::CaseRate          => "#F13B3B",
            Metric::MortalityRate     => "#1E88E5",
            Metric::CaseFatalityRatio => "#FFC107",
        }
    }

    pub fn axis_title(self) -> &'static str {
        match self {
            Metric::CaseRate =>
                "COVID-19 Case Rate (confirmed cases per 100,000 persons)",
            Metric::MortalityRate =>
                "COVID-19 Mortality Rate (confirmed deaths per 100,000 persons)",
            Metric::CaseFatalityRatio =>
                "COVID-19 Case-Fatality Ratio (confirmed deaths per 100,000 confirmed cases)",
        }
    }

    /// (prison, statewide) values of this metric for one row.
    pub fn select(self, row: &ReportRow) -> (Rate, Rate) {
        match self {
            Metric::CaseRate          => (row.prison_cr, row.state_cr),
            Metric::MortalityRate     => (row.prison_mr, row.state_mr),
            Metric::CaseFatalityRatio => (row.prison_cfr, row.state_cfr),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cr" | "case_rate" | "case-rate"                  => Ok(Metric::CaseRate),
            "mr" | "mortality_rate" | "mortality-rate"        => Ok(Metric::MortalityRate),
            "cfr" | "case_fatality_ratio" | "case-fatality-ratio" => Ok(Metric::CaseFatalityRatio),
            other => Err(format!("unknown metric '{other}' (expected cr, mr or cfr)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTile {
    pub abbreviation: String,
    pub name: String,
    pub row: u8,
    pub col: u8,
    pub prison: Rate,
    pub statewide: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridChart {
    pub metric: Metric,
    pub prison_color: String,
    pub statewide_color: String,
    pub rows: u8,
    pub cols: u8,
    pub tiles: Vec<GridTile>,
    /// Shared y-axis `[0.01 * max, 1.05 * max]`; `None` when nothing has data.
    pub y_range: Option<(f64, f64)>,
}

impl GridChart {
    pub fn build(report: &ReportTable, metric: Metric) -> Self {
        let tiles: Vec<GridTile> = GRID_LAYOUT
            .iter()
            .map(|&(abbreviation, name, row, col)| {
                let (prison, statewide) = match report.row(name) {
                    Some(r) => metric.select(r),
                    None => {
                        log::warn!("Grid tile {abbreviation}: {name} missing from report");
                        (Rate::NoData, Rate::NoData)
                    }
                };
                GridTile {
                    abbreviation: abbreviation.to_string(),
                    name: name.to_string(),
                    row,
                    col,
                    prison,
                    statewide,
                }
            })
            .collect();

        Self {
            metric,
            prison_color: metric.color().to_string(),
            statewide_color: STATEWIDE_COLOR.to_string(),
            rows: GRID_ROWS,
            cols: GRID_COLS,
            tiles,
            y_range: y_range(report, metric),
        }
    }

    pub fn tile(&self, abbreviation: &str) -> Option<&GridTile> {
        self.tiles.iter().find(|t| t.abbreviation == abbreviation)
    }
}

/// Max over both series of every report row, ignoring `NoData`.
fn y_range(report: &ReportTable, metric: Metric) -> Option<(f64, f64)> {
    let max = report
        .rows()
        .iter()
        .flat_map(|r| {
            let (p, s) = metric.select(r);
            [p.value(), s.value()]
        })
        .flatten()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))?;
    Some((0.01 * max, max + 0.05 * max))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub name: String,
    pub color: String,
    pub values: Vec<Rate>,
}

/// Horizontal grouped bars, one category per report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub metric: Metric,
    pub x_axis_title: String,
    pub categories: Vec<String>,
    pub prison: BarSeries,
    pub statewide: BarSeries,
}

impl BarChart {
    /// Categories in name order with NATIONWIDE pinned last.
    pub fn build(report: &ReportTable, metric: Metric) -> Self {
        let mut rows: Vec<&ReportRow> = report.rows().iter().collect();
        rows.sort_by(|a, b| {
            a.is_nationwide()
                .cmp(&b.is_nationwide())
                .then_with(|| a.name.cmp(&b.name))
        });

        let (prison, statewide): (Vec<Rate>, Vec<Rate>) =
            rows.iter().map(|r| metric.select(r)).unzip();

        Self {
            metric,
            x_axis_title: metric.axis_title().to_string(),
            categories: rows.iter().map(|r| r.name.clone()).collect(),
            prison: BarSeries {
                name: PRISON_SERIES.to_string(),
                color: metric.color().to_string(),
                values: prison,
            },
            statewide: BarSeries {
                name: STATEWIDE_SERIES.to_string(),
                color: STATEWIDE_COLOR.to_string(),
                values: statewide,
            },
        }
    }
}

/// One metric's full view: grid map plus bar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricView {
    pub metric: Metric,
    pub label: String,
    pub grid: GridChart,
    pub bars: BarChart,
}

impl MetricView {
    pub fn build(report: &ReportTable, metric: Metric) -> Self {
        Self {
            metric,
            label: metric.label().to_string(),
            grid: GridChart::build(report, metric),
            bars: BarChart::build(report, metric),
        }
    }
}

/// Display rows of the prison case table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrisonCovidDisplayRow {
    pub name: String,
    pub total_prisoner_cases: Option<u64>,
    pub total_prisoner_deaths: Option<u64>,
    #[serde(rename = "Prison_CR")]
    pub prison_cr: Rate,
    #[serde(rename = "Prison_MR")]
    pub prison_mr: Rate,
    #[serde(rename = "Prison_CFR")]
    pub prison_cfr: Rate,
}

impl From<&PrisonCovidRow> for PrisonCovidDisplayRow {
    fn from(row: &PrisonCovidRow) -> Self {
        Self {
            name: row.name.clone(),
            total_prisoner_cases: row.total_prisoner_cases,
            total_prisoner_deaths: row.total_prisoner_deaths,
            prison_cr: row.prison_cr,
            prison_mr: row.prison_mr,
            prison_cfr: row.prison_cfr,
        }
    }
}

/// The optional "show data" view: each source trimmed to its display
/// columns, plus the unified table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataView {
    /// e.g. "December 15, 2020".
    pub data_as_of: String,
    pub prison_population: Vec<PrisonPopulationRow>,
    pub prison_covid: Vec<PrisonCovidDisplayRow>,
    pub state_covid: Vec<StateCovidRow>,
    pub comparison: Vec<ReportRow>,
}

impl RawDataView {
    pub fn build(output: &PipelineOutput) -> Self {
        Self {
            data_as_of: format_data_date(output.data_date),
            prison_population: output.prison_population.rows().cloned().collect(),
            prison_covid: output.prison_covid.rows().map(PrisonCovidDisplayRow::from).collect(),
            state_covid: output.state_covid.rows().cloned().collect(),
            comparison: output.report.rows().to_vec(),
        }
    }
}

pub fn format_data_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// Everything the renderer needs for one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub title: String,
    pub selected: MetricView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<RawDataView>,
}

impl Dashboard {
    pub const TITLE: &'static str = "COVID-19 in US Prisons, as Told by Data";

    pub fn build(output: &PipelineOutput, metric: Metric, show_data: bool) -> Self {
        Self {
            title: Self::TITLE.to_string(),
            selected: MetricView::build(&output.report, metric),
            raw_data: show_data.then(|| RawDataView::build(output)),
        }
    }

    /// The feed as pretty-printed JSON.
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

use crate::types::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder in `SourceConfig::url` replaced by the derived report date.
pub const DATE_PLACEHOLDER: &str = "{date}";

pub const PRISON_POPULATION_URL: &str =
    "https://raw.githubusercontent.com/themarshallproject/COVID_prison_data/master/data/prison_populations.csv";
pub const PRISON_COVID_URL: &str =
    "https://raw.githubusercontent.com/themarshallproject/COVID_prison_data/master/data/covid_prison_cases.csv";
pub const STATE_COVID_URL_TEMPLATE: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports_us/{date}.csv";

/// Number of states each source is expected to enumerate.
pub const STATE_COUNT: usize = 50;

const PRISON_POPULATION_COLUMNS: &[&str] = &[
    "name", "abbreviation",
    "march_pop", "april_pop", "june_pop", "july_pop", "aug_pop",
    "sept_pop", "oct_pop", "nov_pop", "dec_pop",
    "as_of_date_march", "as_of_date_april", "as_of_date_june", "as_of_date_july",
    "as_of_date_aug", "as_of_date_sept", "as_of_date_oct", "as_of_date_nov",
    "as_of_date_dec",
];

const PRISON_COVID_COLUMNS: &[&str] = &[
    "name", "abbreviation",
    "staff_tests", "staff_tests_with_multiples", "total_staff_cases",
    "staff_recovered", "total_staff_deaths", "staff_partial_dose", "staff_full_dose",
    "prisoner_tests", "prisoner_test_with_multiples", "total_prisoner_cases",
    "prisoners_recovered", "total_prisoner_deaths", "prisoners_partial_dose",
    "prisoners_full_dose", "as_of_date", "notes",
];

const STATE_COVID_COLUMNS: &[&str] = &[
    "Province_State", "Country_Region", "Last_Update", "Lat", "Long_",
    "Confirmed", "Deaths", "Recovered", "Active", "FIPS", "Incident_Rate",
    "Total_Test_Results", "People_Hospitalized", "Case_Fatality_Ratio", "UID", "ISO3",
    "Testing_Rate", "Hospitalization_Rate",
];

/// Spellings the daily reports used before November 2020.
const STATE_COVID_ALIASES: &[(&str, &[&str])] = &[
    ("Total_Test_Results", &["People_Tested"]),
    ("Case_Fatality_Ratio", &["Mortality_Rate"]),
];

/// Territories, cruise ships and other non-state rows of the daily report,
/// as zero-based data-row indices (header excluded).
const STATE_COVID_EXCLUDED_ROWS: &[usize] = &[2, 9, 10, 13, 14, 39, 44, 52];

/// Prison case data is a long table with one block of state rows per
/// reporting date. This offset selects the block the dashboard reports on
/// and must be revised when upstream appends new blocks.
const PRISON_COVID_BLOCK_OFFSET: usize = 102;

/// Which data rows of a fetched table belong to states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowSelection {
    /// Skip `skip` data rows, then take the next `take`.
    Window { skip: usize, take: usize },
    /// Drop the listed data-row indices, then take the first `take` remaining.
    Excluding { rows: Vec<usize>, take: usize },
}

impl RowSelection {
    pub fn take(&self) -> usize {
        match self {
            RowSelection::Window { take, .. } | RowSelection::Excluding { take, .. } => *take,
        }
    }
}

/// Declarative descriptor of one upstream CSV: where it lives, the header
/// it must carry, and which rows are state rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub columns: Vec<String>,
    pub rows: RowSelection,
    /// Former upstream names, keyed by the name in `columns`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl SourceConfig {
    pub fn new(url: &str, columns: &[&str], rows: RowSelection) -> Self {
        Self {
            url: url.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[(&str, &[&str])]) -> Self {
        for (column, spellings) in aliases {
            self.aliases
                .entry(column.to_string())
                .or_default()
                .extend(spellings.iter().map(|s| s.to_string()));
        }
        self
    }

    /// The `columns` name a fetched header cell stands for.
    pub fn canonical<'a>(&'a self, header: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(_, spellings)| spellings.iter().any(|s| s == header))
            .map_or(header, |(column, _)| column.as_str())
    }

    /// Resolve the URL, substituting the `MM-DD-YYYY` date segment if the
    /// URL is a template.
    pub fn resolve_url(&self, date_segment: Option<&str>) -> String {
        match date_segment {
            Some(date) => self.url.replace(DATE_PLACEHOLDER, date),
            None => self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Applies to the whole request, connect through body.
    pub timeout_ms: u64,
    pub max_response_bytes: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_response_bytes: 16 * 1024 * 1024,
            user_agent: format!("prison-covid/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub prison_population: SourceConfig,
    pub prison_covid: SourceConfig,
    pub state_covid: SourceConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prison_population: SourceConfig::new(
                PRISON_POPULATION_URL,
                PRISON_POPULATION_COLUMNS,
                RowSelection::Window { skip: 0, take: STATE_COUNT },
            ),
            prison_covid: SourceConfig::new(
                PRISON_COVID_URL,
                PRISON_COVID_COLUMNS,
                RowSelection::Window { skip: PRISON_COVID_BLOCK_OFFSET, take: STATE_COUNT },
            ),
            state_covid: SourceConfig::new(
                STATE_COVID_URL_TEMPLATE,
                STATE_COVID_COLUMNS,
                RowSelection::Excluding {
                    rows: STATE_COVID_EXCLUDED_ROWS.to_vec(),
                    take: STATE_COUNT,
                },
            )
            .with_aliases(STATE_COVID_ALIASES),
            http: HttpConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load an override file (JSON). The built-in defaults need no file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        anyhow::ensure!(
            config.state_covid.url.contains(DATE_PLACEHOLDER),
            "state_covid.url in {path} must contain {DATE_PLACEHOLDER}"
        );
        Ok(config)
    }

    pub fn source(&self, dataset: Dataset) -> &SourceConfig {
        match dataset {
            Dataset::PrisonPopulation => &self.prison_population,
            Dataset::PrisonCovid      => &self.prison_covid,
            Dataset::StateCovid       => &self.state_covid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_url_is_a_date_template() {
        let config = PipelineConfig::default();
        let url = config.state_covid.resolve_url(Some("12-15-2020"));
        assert!(url.ends_with("/csse_covid_19_daily_reports_us/12-15-2020.csv"), "{url}");
        assert_eq!(config.prison_covid.resolve_url(None), PRISON_COVID_URL);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
        assert!(json.contains("\"kind\":\"excluding\""));
    }

    #[test]
    fn former_daily_report_names_map_to_current_columns() {
        let state = PipelineConfig::default().state_covid;
        assert_eq!(state.canonical("Mortality_Rate"), "Case_Fatality_Ratio");
        assert_eq!(state.canonical("People_Tested"), "Total_Test_Results");
        assert_eq!(state.canonical("Confirmed"), "Confirmed");
        assert!(PipelineConfig::default().prison_covid.aliases.is_empty());
    }
}

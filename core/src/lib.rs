//! Prison vs. statewide COVID-19 rates: fetch three public CSV sources,
//! derive per-state and nationwide rates, join them by state and feed
//! the result to the dashboard renderer.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod pipeline;
pub mod prison_covid;
pub mod prison_population;
pub mod reconcile;
pub mod source;
pub mod state_covid;
pub mod table;
pub mod types;

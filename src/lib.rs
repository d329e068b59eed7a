//! gdp_compare
//!
//! A small Rust library for comparing GDP per capita across countries using
//! World Bank indicator data. Pairs with the `gdpc` CLI.
//!
//! ### Features
//! - Fetch the country list and GDP-per-capita series, cached for 24 hours
//! - Year-over-year growth for every series
//! - Align series by year and compare two countries (ratios, growth gap, overtakes)
//! - Export a series as CSV or JSON
//! - Quick summary statistics (min, max, mean, median, CAGR)
//!
//! ### Example
//! ```no_run
//! use gdp_compare::{Client, YearRange, analytics, config::Settings};
//!
//! let mut client = Client::new(&Settings::default())?;
//! let countries = client.fetch_countries()?;
//! let picked: Vec<_> = countries
//!     .into_iter()
//!     .filter(|c| c.code == "DEU" || c.code == "JPN")
//!     .collect();
//! let (series, _failed) = gdp_compare::api::partition_loads(client.load_series(&picked, 1990, 2020));
//! let range = YearRange::new(1990, 2020);
//! let rows = analytics::align(&series, range);
//! if let [a, b] = series.as_slice() {
//!     let metrics = analytics::compare(a, b, &rows);
//!     println!("{:#?}", metrics);
//! }
//! gdp_compare::storage::save_csv(&series[0], range, "gdp.csv")?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Interactive callers that let the user change the selection while a load is
//! running take a ticket per selection and drop results that arrive late:
//! ```no_run
//! use gdp_compare::{Client, api::partition_loads, config::Settings, selection::SelectionGuard};
//!
//! let guard = SelectionGuard::new();
//! let mut client = Client::new(&Settings::default())?;
//! let picked = client.fetch_countries()?;
//! let ticket = guard.begin();
//! let loads = client.load_series(&picked[..2], 2000, 2020);
//! if let Some(loads) = guard.accept(ticket, loads) {
//!     let (series, _failed) = partition_loads(loads);
//!     println!("showing {} series", series.len());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod selection;
pub mod stats;
pub mod storage;

pub use api::{Client, SeriesLoad, Transport};
pub use error::FetchError;
pub use models::{Country, CountrySeries, GdpPoint, Leader, YearRange};

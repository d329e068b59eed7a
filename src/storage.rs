use crate::models::{CountrySeries, Leader, YearRange};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

pub const CSV_HEADER: [&str; 3] = ["Year", "GDP per Capita (USD)", "Growth Rate (%)"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRow {
    pub year: i32,
    pub gdp: f64,
    pub growth: f64,
}

/// JSON export document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    pub country: String,
    #[serde(rename = "timeRange")]
    pub time_range: TimeRange,
    pub data: Vec<ExportRow>,
}

/// Build the JSON export for the points of `series` inside `range`.
pub fn to_export(series: &CountrySeries, range: YearRange) -> ExportDocument {
    ExportDocument {
        country: series.name.clone(),
        time_range: TimeRange {
            start: range.start,
            end: range.end,
        },
        data: series
            .points_in(range)
            .map(|p| ExportRow {
                year: p.year,
                gdp: p.value,
                growth: p.growth,
            })
            .collect(),
    }
}

/// Write the CSV export (header + one row per point, growth to 2 decimals).
pub fn write_csv<W: Write>(series: &CountrySeries, range: YearRange, out: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(out);
    wtr.write_record(CSV_HEADER)?;
    for p in series.points_in(range) {
        wtr.write_record([
            p.year.to_string(),
            p.value.to_string(),
            format!("{:.2}", p.growth),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save a series as CSV with header.
pub fn save_csv<P: AsRef<Path>>(series: &CountrySeries, range: YearRange, path: P) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(series, range, f)
}

/// Save a series as pretty JSON.
pub fn save_json<P: AsRef<Path>>(series: &CountrySeries, range: YearRange, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let s = serde_json::to_string_pretty(&to_export(series, range))?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Read leader annotations: a JSON object of country code -> list of leaders.
///
/// Codes are upper-cased so they match [`CountrySeries::id`].
pub fn load_leaders<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Vec<Leader>>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let raw: HashMap<String, Vec<Leader>> = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse leaders from {}", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|(code, leaders)| (code.trim().to_ascii_uppercase(), leaders))
        .collect())
}

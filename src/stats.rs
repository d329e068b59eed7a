use crate::models::{CountrySeries, YearRange};
use serde::{Deserialize, Serialize};

/// Summary statistics for one country's series over a range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub country_id: String,
    pub country_name: String,
    pub count: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Compound annual growth rate between the first and last point, in percent.
    pub cagr: Option<f64>,
}

/// Compound annual growth in percent; `None` unless both ends are positive and apart.
pub fn cagr(start_value: f64, end_value: f64, years: f64) -> Option<f64> {
    if start_value <= 0.0 || end_value <= 0.0 || years <= 0.0 {
        None
    } else {
        Some(((end_value / start_value).powf(1.0 / years) - 1.0) * 100.0)
    }
}

/// Compute statistics for each series restricted to `range`.
pub fn summarize(series: &[CountrySeries], range: YearRange) -> Vec<Summary> {
    series.iter().map(|s| summarize_one(s, range)).collect()
}

fn summarize_one(series: &CountrySeries, range: YearRange) -> Summary {
    let points: Vec<_> = series.points_in(range).collect();
    let first = points.iter().min_by_key(|p| p.year);
    let last = points.iter().max_by_key(|p| p.year);

    let mut vals: Vec<f64> = points.iter().map(|p| p.value).collect();
    vals.sort_by(f64::total_cmp);
    let count = vals.len();
    let min = vals.first().copied();
    let max = vals.last().copied();
    let mean = if count > 0 {
        Some(vals.iter().sum::<f64>() / count as f64)
    } else {
        None
    };
    let median = if count == 0 {
        None
    } else if count % 2 == 1 {
        Some(vals[count / 2])
    } else {
        Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
    };
    let growth = match (first, last) {
        (Some(f), Some(l)) => cagr(f.value, l.value, f64::from(l.year - f.year)),
        _ => None,
    };

    Summary {
        country_id: series.id.clone(),
        country_name: series.name.clone(),
        count,
        first_year: first.map(|p| p.year),
        last_year: last.map(|p| p.year),
        min,
        max,
        mean,
        median,
        cagr: growth,
    }
}

//! Year alignment and two-country comparison over normalized series.
//!
//! Ratios are best-effort: a missing value or a zero denominator yields a
//! non-finite `f64` instead of an error. Callers decide how to display it.

use crate::models::{CountrySeries, Leader, YearRange};
use serde::Serialize;
use std::collections::BTreeMap;

/// One country's figures in an aligned row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub value: f64,
    pub growth: f64,
}

/// All selected countries' figures for a single year.
///
/// A country without a point for `year` has no entry; nothing is zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub year: i32,
    pub countries: BTreeMap<String, Observation>,
}

impl AlignedRow {
    pub fn get(&self, country_id: &str) -> Option<&Observation> {
        self.countries.get(country_id)
    }

    pub fn value(&self, country_id: &str) -> Option<f64> {
        self.get(country_id).map(|o| o.value)
    }

    pub fn growth(&self, country_id: &str) -> Option<f64> {
        self.get(country_id).map(|o| o.growth)
    }
}

/// Combine series into one row per distinct year within `range`, ascending.
///
/// Rows are keyed by country id. If a series repeats a year, its first point wins.
pub fn align(series: &[CountrySeries], range: YearRange) -> Vec<AlignedRow> {
    let mut by_year: BTreeMap<i32, BTreeMap<String, Observation>> = BTreeMap::new();
    for s in series {
        for p in s.points_in(range) {
            by_year
                .entry(p.year)
                .or_default()
                .entry(s.id.clone())
                .or_insert(Observation {
                    value: p.value,
                    growth: p.growth,
                });
        }
    }
    by_year
        .into_iter()
        .map(|(year, countries)| AlignedRow { year, countries })
        .collect()
}

/// A year in which the leading country changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overtake {
    pub year: i32,
    /// Name of the country that leads from this year on.
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetrics {
    pub starting_ratio: f64,
    pub ending_ratio: f64,
    pub average_growth_diff: f64,
    pub overtakes: Vec<Overtake>,
}

fn ratio(row: &AlignedRow, a: &str, b: &str) -> f64 {
    match (row.value(a), row.value(b)) {
        (Some(x), Some(y)) => x / y,
        _ => f64::NAN,
    }
}

/// Compare `first` against `second` over already aligned `rows` in one pass.
///
/// - `starting_ratio` / `ending_ratio`: `first / second` at the first and last row
/// - `average_growth_diff`: mean of `growth(first) - growth(second)` over every row but
///   the first; rows missing either growth are left out
/// - `overtakes`: rows where the ratio crosses 1 strictly from one side to the other.
///   A non-finite ratio breaks the chain.
pub fn compare(first: &CountrySeries, second: &CountrySeries, rows: &[AlignedRow]) -> ComparisonMetrics {
    let (a, b) = (first.id.as_str(), second.id.as_str());

    let mut starting_ratio = f64::NAN;
    let mut ending_ratio = f64::NAN;
    let mut overtakes = Vec::new();
    let mut prev: Option<f64> = None;
    let mut diff_sum = 0.0;
    let mut diff_count = 0usize;

    for (i, row) in rows.iter().enumerate() {
        let r = ratio(row, a, b);
        if i == 0 {
            starting_ratio = r;
        } else if let (Some(g1), Some(g2)) = (row.growth(a), row.growth(b)) {
            diff_sum += g1 - g2;
            diff_count += 1;
        }
        ending_ratio = r;

        if let (Some(p), true) = (prev, r.is_finite()) {
            if p < 1.0 && r > 1.0 {
                overtakes.push(Overtake {
                    year: row.year,
                    country: first.name.clone(),
                });
            } else if p > 1.0 && r < 1.0 {
                overtakes.push(Overtake {
                    year: row.year,
                    country: second.name.clone(),
                });
            }
        }
        prev = r.is_finite().then_some(r);
    }

    let average_growth_diff = if diff_count > 0 {
        diff_sum / diff_count as f64
    } else {
        f64::NAN
    };

    ComparisonMetrics {
        starting_ratio,
        ending_ratio,
        average_growth_diff,
        overtakes,
    }
}

/// Leader whose tenure covers `year`, if the series carries one.
pub fn leader_in_office(series: &CountrySeries, year: i32) -> Option<&Leader> {
    series.leaders.iter().find(|l| l.in_office(year))
}

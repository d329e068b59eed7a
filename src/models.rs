use serde::{Deserialize, Serialize};

/// Inclusive year interval used for queries, alignment, and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn to_query_param(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

/// Metadata section returned by the API (position 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub pages: u32,
    /// Some responses encode `per_page` as a string, others as a number.
    /// Accept both and normalize to `u32`.
    #[serde(deserialize_with = "de_u32_from_string_or_number")]
    pub per_page: u32,
    #[serde(deserialize_with = "de_u32_from_string_or_number")]
    pub total: u32,
}

/// Serde helper: parse `u32` from either a JSON number or a string.
fn de_u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct U32Visitor;

    impl<'de> Visitor<'de> for U32Visitor {
        type Value = u32;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or integer representing a non-negative number")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(|_| E::custom("value out of range for u32"))
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.trim().parse::<u32>().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U32Visitor)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeName {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// Raw record from the `country` endpoint (position 1 array).
///
/// Aggregates (regions, income groups) come back with an empty `capitalCity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: CodeName,
    #[serde(rename = "capitalCity", default)]
    pub capital_city: Option<String>,
}

impl CountryRecord {
    /// `true` for sovereign countries, `false` for aggregates without a capital.
    pub fn has_capital(&self) -> bool {
        self.capital_city
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}

/// Raw observation from the indicator endpoint (position 1 array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub date: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl IndicatorRecord {
    /// Year and value when both are usable; `None` for gaps the API reports as null.
    pub fn observation(&self) -> Option<(i32, f64)> {
        let year = self.date.trim().parse::<i32>().ok()?;
        let value = self.value.filter(|v| v.is_finite())?;
        Some((year, value))
    }
}

/// Country reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Country {
    pub code: String,
    pub name: String,
    pub region: String,
}

impl From<CountryRecord> for Country {
    fn from(r: CountryRecord) -> Self {
        Self {
            code: r.id.trim().to_string(),
            name: r.name.trim().to_string(),
            region: r.region.value.trim().to_string(),
        }
    }
}

/// One year of GDP per capita (current USD) with growth vs the previous point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GdpPoint {
    pub year: i32,
    pub value: f64,
    /// Percent change against the previous point of the same series; 0 for the first.
    pub growth: f64,
}

/// A political tenure used to annotate a series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leader {
    pub name: String,
    #[serde(default)]
    pub party: Option<String>,
    pub start_year: i32,
    /// `None` while still in office.
    #[serde(default)]
    pub end_year: Option<i32>,
}

impl Leader {
    pub fn in_office(&self, year: i32) -> bool {
        self.start_year <= year && self.end_year.is_none_or(|end| year <= end)
    }
}

/// Normalized per-country series as consumed by analytics and export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountrySeries {
    pub id: String,
    pub name: String,
    pub gdp_data: Vec<GdpPoint>,
    #[serde(default)]
    pub leaders: Vec<Leader>,
}

impl CountrySeries {
    pub fn new(country: &Country, gdp_data: Vec<GdpPoint>) -> Self {
        Self {
            id: country.code.clone(),
            name: country.name.clone(),
            gdp_data,
            leaders: Vec::new(),
        }
    }

    pub fn with_leaders(mut self, leaders: Vec<Leader>) -> Self {
        self.leaders = leaders;
        self
    }

    /// Points whose year falls inside `range`, in series order.
    pub fn points_in(&self, range: YearRange) -> impl Iterator<Item = &GdpPoint> + '_ {
        self.gdp_data.iter().filter(move |p| range.contains(p.year))
    }
}

//! Synchronous client for the **World Bank Indicators API (v2)**.
//!
//! Two queries are supported: the country list (`country`) and one indicator series
//! for one country (`country/{code}/indicator/{id}`). Responses are validated against
//! the expected `[Meta, [record, ...]]` shape, normalized, and cached per query key
//! for 24 hours (configurable). Pagination is handled automatically.
//!
//! ### Notes
//! - Failures are surfaced as [`FetchError`] and never retried.
//! - Aggregates (regions, income groups) are dropped from the country list: the API
//!   returns them with an empty `capitalCity`.
//! - The API lists observations newest first; series are returned oldest first.
//!
//! Typical usage:
//! ```no_run
//! # use gdp_compare::{Client, config::Settings};
//! let mut client = Client::new(&Settings::default())?;
//! let points = client.fetch_gdp_data("DEU", 2010, 2020)?;
//! # Ok::<(), gdp_compare::FetchError>(())
//! ```
use crate::cache::{CacheKey, Clock, SystemClock, TtlCache};
use crate::config::Settings;
use crate::error::FetchError;
use crate::models::{Country, CountryRecord, CountrySeries, GdpPoint, IndicatorRecord, Meta, YearRange};
use log::{debug, info, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Safety cap to avoid pathological jobs.
const MAX_PAGES: u32 = 1000;

/// Issues one GET and returns the decoded JSON body.
pub trait Transport: Send + Sync {
    fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(settings.timeout_secs)) // total request timeout
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("gdp_compare/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Http {
                url: settings.base_url.clone(),
                source,
            })?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self.http.get(url).send().map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.json::<Value>()
            .map_err(|e| FetchError::malformed(url, format!("decode json: {e}")))
    }
}

// Allow -, _, . unescaped in codes (common for indicator ids)
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc(part: &str) -> String {
    percent_encoding::utf8_percent_encode(part.trim(), SAFE).to_string()
}

fn validate_query(code: &str, start: i32, end: i32) -> Result<YearRange, FetchError> {
    if code.trim().is_empty() {
        return Err(FetchError::InvalidQuery("country code must not be empty".into()));
    }
    let range = YearRange::new(start, end);
    if !range.is_valid() {
        return Err(FetchError::InvalidQuery(format!(
            "start year {start} is after end year {end}"
        )));
    }
    Ok(range)
}

/// Render the `message` payload of an API error object.
fn api_message(message: &Value) -> String {
    let parts: Vec<&str> = message
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|m| m.get("value").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if parts.is_empty() {
        message.to_string()
    } else {
        parts.join("; ")
    }
}

/// Fill in year-over-year growth (percent) against the previous *element*.
///
/// The predecessor is positional: when a year is missing the growth spans the gap.
pub fn apply_growth(points: &mut [GdpPoint]) {
    let mut prev: Option<f64> = None;
    for p in points.iter_mut() {
        p.growth = match prev {
            Some(before) => (p.value - before) / before * 100.0,
            None => 0.0,
        };
        prev = Some(p.value);
    }
}

/// Outcome of loading one selected country.
#[derive(Debug)]
pub struct SeriesLoad {
    pub country: Country,
    pub result: Result<CountrySeries, FetchError>,
}

/// Split loads into successful series and per-country failures, keeping order.
pub fn partition_loads(loads: Vec<SeriesLoad>) -> (Vec<CountrySeries>, Vec<(Country, FetchError)>) {
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for load in loads {
        match load.result {
            Ok(series) => ok.push(series),
            Err(e) => failed.push((load.country, e)),
        }
    }
    (ok, failed)
}

pub struct Client<T = HttpTransport, C = SystemClock> {
    pub base_url: String,
    pub indicator: String,
    transport: T,
    countries: TtlCache<Vec<Country>, C>,
    series: TtlCache<Vec<GdpPoint>, C>,
}

impl Client {
    /// HTTP-backed client on the wall clock.
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(settings)?;
        Ok(Self::with_transport(transport, SystemClock, settings))
    }
}

impl<T: Transport, C: Clock + Clone> Client<T, C> {
    pub fn with_transport(transport: T, clock: C, settings: &Settings) -> Self {
        let ttl = settings.cache_ttl();
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            indicator: settings.indicator.clone(),
            transport,
            countries: TtlCache::new(clock.clone(), ttl),
            series: TtlCache::new(clock, ttl),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn gdp_cache(&self) -> &TtlCache<Vec<GdpPoint>, C> {
        &self.series
    }

    /// Sovereign countries known to the service, cached under a fixed key.
    ///
    /// ### Errors
    /// Network/HTTP failure, an API error payload, or a response without records.
    pub fn fetch_countries(&mut self) -> Result<Vec<Country>, FetchError> {
        let key = CacheKey::Countries;
        if let Some(hit) = self.countries.get(&key) {
            debug!("cache hit: {key}");
            return Ok(hit.clone());
        }
        debug!("cache miss: {key}");
        let countries = self.request_countries()?;
        self.countries.insert(&key, countries.clone());
        Ok(countries)
    }

    /// GDP per capita for `code` over the inclusive `[start, end]` range, oldest first,
    /// with growth filled in.
    ///
    /// ### Errors
    /// - [`FetchError::InvalidQuery`] for an empty code or `start > end`
    /// - [`FetchError::NoData`] when the service has no observations for the query
    /// - Network/HTTP/decoding failures
    pub fn fetch_gdp_data(
        &mut self,
        code: &str,
        start: i32,
        end: i32,
    ) -> Result<Vec<GdpPoint>, FetchError> {
        let range = validate_query(code, start, end)?;
        let key = CacheKey::gdp(code, start, end);
        if let Some(hit) = self.series.get(&key) {
            debug!("cache hit: {key}");
            return Ok(hit.clone());
        }
        debug!("cache miss: {key}");
        let points = self.request_gdp(code, range)?;
        self.series.insert(&key, points.clone());
        Ok(points)
    }

    /// Load series for every selected country.
    ///
    /// Cache hits are served directly; misses are fetched concurrently, one thread per
    /// country. Each country succeeds or fails on its own and the output keeps the
    /// selection order.
    pub fn load_series(&mut self, selection: &[Country], start: i32, end: i32) -> Vec<SeriesLoad> {
        let mut slots: Vec<Option<Result<Vec<GdpPoint>, FetchError>>> = selection
            .iter()
            .map(|c| match validate_query(&c.code, start, end) {
                Err(e) => Some(Err(e)),
                Ok(_) => {
                    let hit = self.series.get(&CacheKey::gdp(&c.code, start, end));
                    if hit.is_some() {
                        debug!("cache hit: {}", CacheKey::gdp(&c.code, start, end));
                    }
                    hit.cloned().map(Ok)
                }
            })
            .collect();

        let range = YearRange::new(start, end);
        let this = &*self;
        let fetched: Vec<(usize, Result<Vec<GdpPoint>, FetchError>)> = std::thread::scope(|s| {
            let handles: Vec<_> = selection
                .iter()
                .enumerate()
                .filter(|(i, _)| slots[*i].is_none())
                .map(|(i, c)| (i, s.spawn(move || this.request_gdp(&c.code, range))))
                .collect();
            handles
                .into_iter()
                .map(|(i, h)| match h.join() {
                    Ok(res) => (i, res),
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        for (i, result) in fetched {
            let code = &selection[i].code;
            match &result {
                Ok(points) => self
                    .series
                    .insert(&CacheKey::gdp(code, start, end), points.clone()),
                Err(e) => warn!("failed to load {code}: {e}"),
            }
            slots[i] = Some(result);
        }

        selection
            .iter()
            .zip(slots)
            .filter_map(|(country, slot)| {
                slot.map(|res| SeriesLoad {
                    country: country.clone(),
                    result: res.map(|points| CountrySeries::new(country, points)),
                })
            })
            .collect()
    }

    fn request_countries(&self) -> Result<Vec<Country>, FetchError> {
        let url = format!("{}/country?format=json&per_page=1000", self.base_url);
        info!("fetching country list");
        let records: Vec<CountryRecord> = self
            .fetch_records(&url)?
            .ok_or_else(|| FetchError::malformed(&url, "response carries no country records"))?;
        let total = records.len();
        let countries: Vec<Country> = records
            .into_iter()
            .filter(|r| r.has_capital())
            .map(Country::from)
            .collect();
        debug!("kept {} of {} country records", countries.len(), total);
        Ok(countries)
    }

    fn request_gdp(&self, code: &str, range: YearRange) -> Result<Vec<GdpPoint>, FetchError> {
        let url = format!(
            "{}/country/{}/indicator/{}?format=json&per_page=1000&date={}",
            self.base_url,
            enc(code),
            enc(&self.indicator),
            range.to_query_param()
        );
        let no_data = || FetchError::NoData {
            country: code.trim().to_ascii_uppercase(),
            start: range.start,
            end: range.end,
        };
        info!("fetching {} for {} ({})", self.indicator, code, range.to_query_param());

        let records: Vec<IndicatorRecord> = self.fetch_records(&url)?.ok_or_else(no_data)?;
        let mut points: Vec<GdpPoint> = records
            .iter()
            .filter_map(IndicatorRecord::observation)
            .map(|(year, value)| GdpPoint {
                year,
                value,
                growth: 0.0,
            })
            .collect();
        if points.len() < records.len() {
            debug!(
                "{code}: skipped {} observations without a value",
                records.len() - points.len()
            );
        }
        if points.is_empty() {
            return Err(no_data());
        }

        points.sort_by_key(|p| p.year);
        apply_growth(&mut points);
        Ok(points)
    }

    /// Read every page of `url` and collect its records.
    ///
    /// Returns `None` when the service sent no records array at all (e.g. `[meta, null]`).
    /// Individual records that do not match `R` are logged and skipped.
    fn fetch_records<R: DeserializeOwned>(&self, url: &str) -> Result<Option<Vec<R>>, FetchError> {
        let mut page = 1u32;
        let mut out: Option<Vec<R>> = None;
        loop {
            if page > MAX_PAGES {
                return Err(FetchError::malformed(url, format!("page limit exceeded ({MAX_PAGES})")));
            }
            let page_url = format!("{url}&page={page}");
            let v = self.transport.get_json(&page_url)?;

            // [Meta, [record, ...]] or a "message" object in position 0 on error.
            let arr = v
                .as_array()
                .ok_or_else(|| FetchError::malformed(&page_url, "not a top-level array"))?;
            let head = arr
                .first()
                .ok_or_else(|| FetchError::malformed(&page_url, "empty array"))?;
            if let Some(message) = head.get("message") {
                return Err(FetchError::Api(api_message(message)));
            }

            let meta: Meta = serde_json::from_value(head.clone())
                .map_err(|e| FetchError::malformed(&page_url, format!("parse meta: {e}")))?;

            match arr.get(1) {
                Some(Value::Array(items)) => {
                    let records = out.get_or_insert_with(Vec::new);
                    for item in items {
                        match serde_json::from_value::<R>(item.clone()) {
                            Ok(r) => records.push(r),
                            Err(e) => warn!("skipping malformed record from {page_url}: {e}"),
                        }
                    }
                }
                None | Some(Value::Null) => {}
                Some(other) => {
                    return Err(FetchError::malformed(
                        &page_url,
                        format!("records are not an array: {other}"),
                    ));
                }
            }

            if page >= meta.pages {
                break;
            }
            page += 1;
        }
        Ok(out)
    }
}

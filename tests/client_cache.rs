use chrono::{TimeDelta, TimeZone, Utc};
use gdp_compare::cache::{CacheKey, Clock, ManualClock};
use gdp_compare::config::Settings;
use gdp_compare::{Client, FetchError, Transport};
use serde_json::{Value, json};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str) -> Result<Value, FetchError> + Send + Sync>;

/// Transport that records every URL and answers from a closure.
struct Scripted {
    calls: Mutex<Vec<String>>,
    respond: Responder,
}

impl Scripted {
    fn new(respond: impl Fn(&str) -> Result<Value, FetchError> + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn count_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains(needle))
            .count()
    }
}

impl Transport for Scripted {
    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        (self.respond)(url)
    }
}

fn settings() -> Settings {
    Settings {
        base_url: "http://wb.test/v2".into(),
        ..Settings::default()
    }
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
}

fn client(t: Scripted) -> (Client<Scripted, ManualClock>, ManualClock) {
    let clk = clock();
    (Client::with_transport(t, clk.clone(), &settings()), clk)
}

fn meta() -> Value {
    json!({"page": 1, "pages": 1, "per_page": "50", "total": 4})
}

fn countries_body() -> Value {
    json!([
        meta(),
        [
            {"id": "DEU", "iso2Code": "DE", "name": "Germany",
             "region": {"id": "ECS", "iso2code": "Z7", "value": "Europe & Central Asia"},
             "capitalCity": "Berlin"},
            {"id": "EUU", "iso2Code": "EU", "name": "European Union",
             "region": {"id": "NA", "iso2code": "NA", "value": "Aggregates"},
             "capitalCity": ""},
            {"id": "WLD", "iso2Code": "1W", "name": "World",
             "region": {"id": "NA", "iso2code": "NA", "value": "Aggregates"}},
            {"id": "JPN", "iso2Code": "JP", "name": "Japan",
             "region": {"id": "EAS", "iso2code": "Z4", "value": "East Asia & Pacific"},
             "capitalCity": "Tokyo"}
        ]
    ])
}

/// Newest first, like the real API.
fn gdp_body(points: &[(i32, Option<f64>)]) -> Value {
    let mut records: Vec<Value> = points
        .iter()
        .map(|(y, v)| {
            json!({
                "indicator": {"id": "NY.GDP.PCAP.CD", "value": "GDP per capita (current US$)"},
                "country": {"id": "XX", "value": "Somewhere"},
                "countryiso3code": "XXX",
                "date": y.to_string(),
                "value": v,
                "unit": "",
                "obs_status": "",
                "decimal": 1
            })
        })
        .collect();
    records.reverse();
    json!([meta(), records])
}

fn steady_gdp(_url: &str) -> Result<Value, FetchError> {
    Ok(gdp_body(&[
        (2000, Some(100.0)),
        (2001, Some(110.0)),
        (2002, Some(121.0)),
        (2003, Some(99.22)),
    ]))
}

#[test]
fn countries_without_capital_are_excluded() {
    let (mut c, _) = client(Scripted::new(|_| Ok(countries_body())));
    let countries = c.fetch_countries().unwrap();
    let codes: Vec<&str> = countries.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, ["DEU", "JPN"]);
    assert_eq!(countries[0].name, "Germany");
    assert_eq!(countries[0].region, "Europe & Central Asia");
    assert!(c.transport().calls.lock().unwrap()[0].starts_with("http://wb.test/v2/country?format=json"));
}

#[test]
fn country_list_is_cached() {
    let (mut c, _) = client(Scripted::new(|_| Ok(countries_body())));
    let first = c.fetch_countries().unwrap();
    let second = c.fetch_countries().unwrap();
    assert_eq!(first, second);
    assert_eq!(c.transport().count(), 1);
}

#[test]
fn series_is_oldest_first_with_positional_growth() {
    let (mut c, _) = client(Scripted::new(steady_gdp));
    let pts = c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    let years: Vec<i32> = pts.iter().map(|p| p.year).collect();
    assert_eq!(years, [2000, 2001, 2002, 2003]);

    assert_eq!(pts[0].growth, 0.0);
    for i in 1..pts.len() {
        let expected = (pts[i].value - pts[i - 1].value) / pts[i - 1].value * 100.0;
        assert!((pts[i].growth - expected).abs() < 1e-9, "point {i}");
    }
    assert!((pts[1].growth - 10.0).abs() < 1e-9);
    assert!((pts[3].growth + 18.0).abs() < 1e-9);
}

#[test]
fn null_values_are_skipped_and_growth_spans_the_gap() {
    let (mut c, _) = client(Scripted::new(|_| {
        Ok(gdp_body(&[(2000, Some(100.0)), (2001, None), (2002, Some(130.0))]))
    }));
    let pts = c.fetch_gdp_data("DEU", 2000, 2002).unwrap();
    assert_eq!(pts.len(), 2);
    assert_eq!(pts[1].year, 2002);
    assert!((pts[1].growth - 30.0).abs() < 1e-9);
}

#[test]
fn request_url_carries_indicator_and_range() {
    let (mut c, _) = client(Scripted::new(steady_gdp));
    c.fetch_gdp_data("deu", 2000, 2003).unwrap();
    let url = c.transport().calls.lock().unwrap()[0].clone();
    assert!(url.starts_with("http://wb.test/v2/country/deu/indicator/NY.GDP.PCAP.CD?"));
    assert!(url.contains("date=2000:2003"));
    assert!(url.contains("format=json"));
}

#[test]
fn identical_calls_within_window_hit_network_once() {
    let (mut c, clk) = client(Scripted::new(steady_gdp));
    let a = c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    clk.advance(TimeDelta::hours(23));
    let b = c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    assert_eq!(a, b);
    assert_eq!(c.transport().count(), 1);

    // different range is a different key
    c.fetch_gdp_data("DEU", 2001, 2003).unwrap();
    assert_eq!(c.transport().count(), 2);
}

#[test]
fn expired_entry_is_refetched_and_overwritten() {
    let (mut c, clk) = client(Scripted::new(steady_gdp));
    c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    let key = CacheKey::gdp("DEU", 2000, 2003);
    let first_stamp = c.gdp_cache().entry(&key).unwrap().timestamp;

    clk.advance(TimeDelta::hours(24));
    c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    assert_eq!(c.transport().count(), 2);

    let entry = c.gdp_cache().entry(&key).unwrap();
    assert_eq!(entry.timestamp, clk.now());
    assert!(entry.timestamp > first_stamp);
    assert_eq!(c.gdp_cache().len(), 1);
}

#[test]
fn failed_fetch_leaves_cache_untouched() {
    let fail_first = Mutex::new(true);
    let (mut c, _) = client(Scripted::new(move |url| {
        let mut fail = fail_first.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        steady_gdp(url)
    }));

    let err = c.fetch_gdp_data("DEU", 2000, 2003).unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert!(c.gdp_cache().is_empty());

    // no automatic retry happened; the next call goes to the network again
    assert_eq!(c.transport().count(), 1);
    assert!(c.fetch_gdp_data("DEU", 2000, 2003).is_ok());
    assert_eq!(c.transport().count(), 2);
}

#[test]
fn missing_records_is_no_data() {
    let (mut c, _) = client(Scripted::new(|_| {
        Ok(json!([{"page": 0, "pages": 0, "per_page": 50, "total": 0}, null]))
    }));
    let err = c.fetch_gdp_data("ABW", 1960, 1961).unwrap_err();
    assert!(err.is_no_data());
    assert!(err.to_string().contains("ABW"));
}

#[test]
fn all_null_values_is_no_data() {
    let (mut c, _) = client(Scripted::new(|_| Ok(gdp_body(&[(2000, None), (2001, None)]))));
    assert!(c.fetch_gdp_data("PRK", 2000, 2001).unwrap_err().is_no_data());
    assert!(c.gdp_cache().is_empty());
}

#[test]
fn api_error_payload_is_surfaced() {
    let (mut c, _) = client(Scripted::new(|_| {
        Ok(json!([{"message": [{"id": "120", "key": "Invalid value",
                                 "value": "The provided parameter value is not valid"}]}]))
    }));
    match c.fetch_gdp_data("ZZZ", 2000, 2001).unwrap_err() {
        FetchError::Api(msg) => assert!(msg.contains("not valid")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unexpected_shape_is_malformed() {
    let (mut c, _) = client(Scripted::new(|_| Ok(json!({"oops": true}))));
    assert!(matches!(
        c.fetch_countries().unwrap_err(),
        FetchError::Malformed { .. }
    ));
}

#[test]
fn invalid_queries_do_not_reach_the_network() {
    let (mut c, _) = client(Scripted::new(steady_gdp));
    assert!(matches!(
        c.fetch_gdp_data("DEU", 2010, 2000).unwrap_err(),
        FetchError::InvalidQuery(_)
    ));
    assert!(matches!(
        c.fetch_gdp_data("  ", 2000, 2010).unwrap_err(),
        FetchError::InvalidQuery(_)
    ));
    assert_eq!(c.transport().count(), 0);
}

#[test]
fn all_pages_are_collected() {
    let (mut c, _) = client(Scripted::new(|url| {
        let meta = |page: u32| json!({"page": page, "pages": 2, "per_page": "2", "total": 4});
        if url.ends_with("&page=1") {
            Ok(json!([meta(1), [{"date": "2003", "value": 4.0}, {"date": "2002", "value": 3.0}]]))
        } else {
            Ok(json!([meta(2), [{"date": "2001", "value": 2.0}, {"date": "2000", "value": 1.0}]]))
        }
    }));
    let pts = c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    assert_eq!(pts.len(), 4);
    assert_eq!(pts[0].year, 2000);
    assert_eq!(pts[3].value, 4.0);
    assert_eq!(c.transport().count(), 2);
}

#[test]
fn load_series_records_each_country_independently() {
    let (mut c, _) = client(Scripted::new(|url| {
        if url.contains("/country/XXX/") {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 400,
            })
        } else {
            steady_gdp(url)
        }
    }));
    let selection = vec![
        gdp_compare::Country {
            code: "DEU".into(),
            name: "Germany".into(),
            region: "Europe & Central Asia".into(),
        },
        gdp_compare::Country {
            code: "XXX".into(),
            name: "Nowhere".into(),
            region: String::new(),
        },
    ];

    let loads = c.load_series(&selection, 2000, 2003);
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[0].country.code, "DEU");
    let deu = loads[0].result.as_ref().unwrap();
    assert_eq!(deu.name, "Germany");
    assert_eq!(deu.gdp_data.len(), 4);
    assert!(deu.leaders.is_empty());
    assert!(loads[1].result.is_err());

    // DEU now cached, XXX is tried again
    let again = c.load_series(&selection, 2000, 2003);
    assert!(again[0].result.is_ok());
    assert_eq!(c.transport().count_matching("/country/DEU/"), 1);
    assert_eq!(c.transport().count_matching("/country/XXX/"), 2);

    // and the single-country fetch shares the same cache entry
    c.fetch_gdp_data("DEU", 2000, 2003).unwrap();
    assert_eq!(c.transport().count_matching("/country/DEU/"), 1);
}

#[test]
fn load_finished_after_a_newer_selection_is_discarded() {
    use gdp_compare::selection::SelectionGuard;

    let guard = SelectionGuard::new();
    let (mut c, _) = client(Scripted::new(steady_gdp));
    let country = |code: &str, name: &str| gdp_compare::Country {
        code: code.into(),
        name: name.into(),
        region: String::new(),
    };
    let first_pick = vec![country("DEU", "Germany")];
    let second_pick = vec![country("JPN", "Japan"), country("FRA", "France")];

    let first = guard.begin();
    let late = c.load_series(&first_pick, 2000, 2003);
    // the user re-selected before the first load was applied
    let second = guard.begin();
    let fresh = c.load_series(&second_pick, 2000, 2003);

    assert!(guard.accept(first, late).is_none());
    let applied = guard.accept(second, fresh).unwrap();
    let (series, failed) = gdp_compare::api::partition_loads(applied);
    assert!(failed.is_empty());
    let ids: Vec<_> = series.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["JPN", "FRA"]);
}

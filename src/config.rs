//! Runtime settings: defaults, overridable from the environment and CLI flags.

use anyhow::{Context, Result};
use chrono::TimeDelta;

pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";
/// GDP per capita (current US$).
pub const GDP_PER_CAPITA: &str = "NY.GDP.PCAP.CD";

pub const ENV_BASE_URL: &str = "GDPC_API_BASE";
pub const ENV_INDICATOR: &str = "GDPC_INDICATOR";
pub const ENV_CACHE_TTL_HOURS: &str = "GDPC_CACHE_TTL_HOURS";
pub const ENV_TIMEOUT_SECS: &str = "GDPC_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "GDPC_CONNECT_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub indicator: String,
    pub cache_ttl_hours: i64,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            indicator: GDP_PER_CAPITA.into(),
            cache_ttl_hours: crate::cache::DEFAULT_TTL_HOURS,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Defaults overridden by `GDPC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`Settings::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Self::default();
        let var = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var(ENV_BASE_URL) {
            s.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = var(ENV_INDICATOR) {
            s.indicator = v;
        }
        if let Some(v) = var(ENV_CACHE_TTL_HOURS) {
            s.cache_ttl_hours = v
                .parse()
                .with_context(|| format!("{ENV_CACHE_TTL_HOURS} must be an integer, got {v:?}"))?;
        }
        if let Some(v) = var(ENV_TIMEOUT_SECS) {
            s.timeout_secs = v
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be an integer, got {v:?}"))?;
        }
        if let Some(v) = var(ENV_CONNECT_TIMEOUT_SECS) {
            s.connect_timeout_secs = v.parse().with_context(|| {
                format!("{ENV_CONNECT_TIMEOUT_SECS} must be an integer, got {v:?}")
            })?;
        }
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_hours < 0 {
            anyhow::bail!("cache ttl must not be negative");
        }
        if self.base_url.is_empty() {
            anyhow::bail!("base url must not be empty");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> TimeDelta {
        TimeDelta::try_hours(self.cache_ttl_hours).unwrap_or(TimeDelta::MAX)
    }
}

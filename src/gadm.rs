//! Administrative boundaries from the GADM 4.1 GeoJSON distribution.
//!
//! One file exists per country and level: `gadm41_{ISO}_{level}.json`. A
//! request for `country` with subregions `[a, b]` and `depth` `d` downloads
//! level `2 + d` and keeps the features whose `NAME_1 == a` and `NAME_2 == b`.

use std::time::Duration;

use crate::codec::{self, CodecOptions};
use crate::decimate::Decimation;
use crate::error::{Error, Result};
use crate::geotable::{self, GeoTable, DEFAULT_GEOMETRY_COLUMN};
use crate::table::{RowTable, Value};

pub const DEFAULT_BASE_URL: &str = "https://geodata.ucdavis.edu/gadm/gadm4.1/json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const USER_AGENT: &str = concat!("gis-io/", env!("CARGO_PKG_VERSION"));

/// Minimal blocking HTTP interface, so tests can serve canned responses.
pub trait HttpClient {
    /// GET `url` and return the body. Non-success statuses are errors.
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP client backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(ReqwestClient { client })
    }

    /// Client configured from the `timeout_secs` option.
    pub fn from_options(options: &CodecOptions) -> Result<Self> {
        let timeout = options
            .get_parsed("timeout_secs")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::with_timeout(timeout)
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "GET");
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Country code plus nested subregion names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRequest {
    pub country: String,
    pub subregions: Vec<String>,
    /// Levels below the last named subregion to return.
    pub depth: usize,
}

impl RegionRequest {
    pub fn new(country: impl Into<String>) -> Self {
        RegionRequest {
            country: country.into(),
            subregions: Vec::new(),
            depth: 0,
        }
    }

    pub fn subregion(mut self, name: impl Into<String>) -> Self {
        self.subregions.push(name.into());
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// GADM level holding the requested features.
    pub fn level(&self) -> usize {
        self.subregions.len() + self.depth
    }

    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/gadm41_{}_{}.json",
            base_url.trim_end_matches('/'),
            self.country.to_uppercase(),
            self.level()
        )
    }

    fn describe(&self) -> String {
        std::iter::once(self.country.as_str())
            .chain(self.subregions.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Download the level file for `request` as a row table, unfiltered.
pub fn fetch_rows(
    client: &dyn HttpClient,
    request: &RegionRequest,
    options: &CodecOptions,
) -> Result<RowTable> {
    let base_url = options.get("base_url").unwrap_or(DEFAULT_BASE_URL);
    let url = request.url(base_url);
    tracing::info!("Fetching {}", url);
    let body = client.get(&url)?;
    codec::geojson::read_rows(body.as_slice())
}

/// Rows whose `NAME_1..NAME_n` match the requested subregion names.
fn matching_rows(table: &GeoTable, request: &RegionRequest) -> Vec<usize> {
    (0..table.len())
        .filter(|&row| {
            request.subregions.iter().enumerate().all(|(i, name)| {
                let column = format!("NAME_{}", i + 1);
                matches!(table.values().value(&column, row), Some(Value::Text(v)) if v == name)
            })
        })
        .collect()
}

/// Fetch, filter and decimate the boundaries for `request`. Always eager.
pub fn fetch_region(
    client: &dyn HttpClient,
    request: &RegionRequest,
    decimation: &Decimation,
    options: &CodecOptions,
) -> Result<GeoTable> {
    decimation.validate()?;
    let rows = fetch_rows(client, request, options)?;
    let mut table = geotable::wrap(rows, DEFAULT_GEOMETRY_COLUMN, false)?;
    if !request.subregions.is_empty() {
        let keep = matching_rows(&table, request);
        if keep.is_empty() {
            return Err(Error::RegionNotFound {
                region: request.describe(),
            });
        }
        table = table.select_rows(&keep)?;
    }
    let table = decimation.apply_table(table)?;
    tracing::info!("Fetched {} regions for {}", table.len(), request.describe());
    Ok(table)
}

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use tracing::debug;

use crate::catalog::PubMedia;
use crate::config::Settings;
use crate::error::FetchError;

const USER_AGENT: &str = concat!("mwb_audio/", env!("CARGO_PKG_VERSION"));

/// One catalog request against the publication media endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Meeting workbook issue, `YYYYMM`.
    Workbook { issue: String },
    /// Bible audio for one book number.
    BibleBook(u32),
    /// The lesson booklet.
    Lessons,
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogQuery::Workbook { issue } => write!(f, "workbook issue {}", issue),
            CatalogQuery::BibleBook(n) => write!(f, "Bible book {}", n),
            CatalogQuery::Lessons => write!(f, "lesson booklet"),
        }
    }
}

impl CatalogQuery {
    /// Query string for this request in the given language.
    pub fn params(&self, language: &str) -> Vec<(&'static str, String)> {
        let publication = match self {
            CatalogQuery::Workbook { .. } => "mwb",
            CatalogQuery::BibleBook(_) => "bi12",
            CatalogQuery::Lessons => "lfb",
        };
        let mut params = vec![
            ("pub", publication.to_string()),
            ("output", "json".to_string()),
            ("fileformat", "MP3".to_string()),
            ("langwritten", language.to_string()),
        ];
        match self {
            CatalogQuery::Workbook { issue } => {
                params.push(("issue", issue.clone()));
                params.push(("alllangs", "0".to_string()));
                params.push(("txtCMSLang", language.to_string()));
            }
            CatalogQuery::BibleBook(n) => params.push(("booknum", n.to_string())),
            CatalogQuery::Lessons => {}
        }
        params
    }
}

/// Blocking client for the catalog API and workbook pages.
pub struct MediaApi {
    client: Client,
    base_url: String,
    language: String,
}

impl MediaApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(MediaApi {
            client,
            base_url: settings.api_base_url.clone(),
            language: settings.language.clone(),
        })
    }

    /// Fetch and decode a catalog. `Ok(None)` means not yet published.
    pub fn fetch_catalog(&self, query: &CatalogQuery) -> Result<Option<PubMedia>, FetchError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&query.params(&self.language));
        let Some((url, body)) = self.send(request, &self.base_url)? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| FetchError::Decode { url, source })
    }

    /// Fetch a page body. `Ok(None)` means not yet published.
    pub fn fetch_page(&self, url: &str) -> Result<Option<String>, FetchError> {
        Ok(self.send(self.client.get(url), url)?.map(|(_, body)| body))
    }

    fn send(&self, request: RequestBuilder, url: &str) -> Result<Option<(String, String)>, FetchError> {
        let request = request.build().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        let url = request.url().to_string();
        debug!("GET {}", url);

        let response = self
            .client
            .execute(request)
            .map_err(|source| FetchError::Request { url: url.clone(), source })?;

        if !is_published(&url, response.status())? {
            return Ok(None);
        }

        let body = response
            .text()
            .map_err(|source| FetchError::Request { url: url.clone(), source })?;
        Ok(Some((url, body)))
    }
}

/// `Ok(false)` for 404 (not yet published), `Ok(true)` for 200, an error otherwise.
fn is_published(url: &str, status: StatusCode) -> Result<bool, FetchError> {
    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        other => Err(FetchError::Status {
            url: url.to_string(),
            status: other.as_u16(),
        }),
    }
}

/// Workbook issue codes (`YYYYMM`) for the month of `today` and the following
/// `months - 1` months.
pub fn issue_codes(today: NaiveDate, months: u32) -> Vec<String> {
    let first = today.with_day(1).unwrap_or(today);
    (0..months)
        .filter_map(|i| first.checked_add_months(Months::new(i)))
        .map(|d| d.format("%Y%m").to_string())
        .collect()
}

// ── Tests ──

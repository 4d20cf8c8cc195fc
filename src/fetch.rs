use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, LAST_MODIFIED, USER_AGENT};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A page body together with what the server told us about it.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it.
    pub url: Url,
    pub html: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub retrieved_at: DateTime<Utc>,
}

impl FetchedPage {
    /// `Last-Modified` when the server sent one, otherwise the retrieval time.
    pub fn modified_or_retrieved(&self) -> DateTime<Utc> {
        match self.last_modified {
            Some(modified) => modified,
            None => {
                tracing::warn!(url = %self.url, "no usable Last-Modified header; using retrieval time");
                self.retrieved_at
            }
        }
    }
}

pub trait PageFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, "nikayabook/0.1")
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: unexpected status {status}");
        }

        let final_url = response.url().clone();
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);
        let html = response
            .text()
            .with_context(|| format!("read body: {url}"))?;

        Ok(FetchedPage {
            url: final_url,
            html,
            last_modified,
            retrieved_at: Utc::now(),
        })
    }
}

/// Parses an HTTP date such as `Tue, 15 Nov 1994 08:12:31 GMT`.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

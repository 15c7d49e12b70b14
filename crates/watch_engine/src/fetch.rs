use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT,
};
use serde_json::Value;
use url::Url;
use watch_core::SearchProfile;
use watch_logging::{watch_debug, watch_error, watch_info, watch_warn};

use crate::retry::{with_retries, RetryPolicy};
use crate::types::map_reqwest_error;
use crate::{FailureKind, FetchError};

/// Promoted project ads; not second-hand listings.
const EXCLUDED_SECTION: &str = "yad1";

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub base_url: String,
    /// Sent with every query, before the per-profile parameters.
    pub fixed_params: Vec<(String, String)>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
    pub max_pages: u32,
    pub retry: RetryPolicy,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "https://gw.yad2.co.il/realestate-feed/forsale/feed".to_string(),
            fixed_params: Vec::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            max_concurrency: 4,
            max_pages: 50,
            retry: RetryPolicy::default(),
        }
    }
}

/// Provider query derived from one search profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub profile: String,
    pub params: Vec<(String, String)>,
}

impl FeedQuery {
    pub fn for_profile(profile: &SearchProfile) -> Self {
        let neighborhoods: Vec<&str> = profile
            .allowed_neighborhoods
            .iter()
            .map(String::as_str)
            .collect();
        let params = vec![
            ("minRooms".to_string(), profile.min_rooms.to_string()),
            ("maxRooms".to_string(), profile.max_rooms.to_string()),
            ("minSquaremeter".to_string(), profile.min_sqm.to_string()),
            ("maxPrice".to_string(), profile.max_price.to_string()),
            ("multiNeighborhood".to_string(), neighborhoods.join(",")),
        ];
        Self {
            profile: profile.name.clone(),
            params,
        }
    }
}

/// One decoded result page.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub records: Vec<Value>,
    pub total_pages: u32,
}

impl FeedPage {
    /// Collects records from every array under `data` except promoted ads.
    pub fn from_document(document: &Value) -> Self {
        let records = document
            .get("data")
            .and_then(Value::as_object)
            .map(|sections| {
                sections
                    .iter()
                    .filter(|(name, _)| name.as_str() != EXCLUDED_SECTION)
                    .filter_map(|(_, section)| section.as_array())
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let total_pages = document
            .pointer("/pagination/totalPages")
            .and_then(Value::as_u64)
            .map(|pages| pages.clamp(1, u64::from(u32::MAX)) as u32)
            .unwrap_or(1);
        Self {
            records,
            total_pages,
        }
    }
}

/// Source of raw provider records.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Every record for `query`, across all of its pages, in page order.
    async fn fetch_query(&self, query: &FeedQuery) -> Result<Vec<Value>, FetchError>;
}

/// Browser-like headers; the provider serves a bot-check page otherwise.
pub(crate) fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,he;q=0.8"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.yad2.co.il/"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.yad2.co.il"));
    headers
}

pub(crate) fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .default_headers(default_headers())
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

/// GETs `url` and decodes a JSON body; an HTML body counts as blocked.
pub(crate) async fn get_json(client: &reqwest::Client, url: Url) -> Result<Value, FetchError> {
    let response = client.get(url).send().await.map_err(map_reqwest_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));
    if is_html {
        return Err(FetchError::new(
            FailureKind::Blocked,
            "received an html page instead of json",
        ));
    }

    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body)
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
}

#[derive(Debug, Clone)]
pub struct ReqwestFeedSource {
    settings: FeedSettings,
    client: reqwest::Client,
}

impl ReqwestFeedSource {
    pub fn new(settings: FeedSettings) -> Result<Self, FetchError> {
        let client = build_client(settings.connect_timeout, settings.request_timeout)?;
        Ok(Self { settings, client })
    }

    fn page_url(&self, query: &FeedQuery, page: u32) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        url.query_pairs_mut()
            .extend_pairs(&self.settings.fixed_params)
            .extend_pairs(&query.params)
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    async fn fetch_page(&self, query: &FeedQuery, page: u32) -> Result<FeedPage, FetchError> {
        let url = self.page_url(query, page)?;
        let label = format!("{} page {}", query.profile, page);
        let document = with_retries(self.settings.retry, &label, || {
            get_json(&self.client, url.clone())
        })
        .await?;
        let page_data = FeedPage::from_document(&document);
        watch_debug!(
            "{}/{}: {} records",
            label,
            page_data.total_pages,
            page_data.records.len()
        );
        Ok(page_data)
    }
}

#[async_trait::async_trait]
impl FeedSource for ReqwestFeedSource {
    async fn fetch_query(&self, query: &FeedQuery) -> Result<Vec<Value>, FetchError> {
        let first = self.fetch_page(query, 1).await?;
        let total_pages = first.total_pages.min(self.settings.max_pages.max(1));
        if first.total_pages > total_pages {
            watch_warn!(
                "{}: provider reports {} pages, fetching the first {}",
                query.profile,
                first.total_pages,
                total_pages
            );
        }

        let mut records = first.records;
        let rest: Vec<Result<FeedPage, FetchError>> = stream::iter(2..=total_pages)
            .map(|page| self.fetch_page(query, page))
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;
        for page in rest {
            records.extend(page?.records);
        }
        Ok(records)
    }
}

/// Raw records of every query, concatenated in query order.
///
/// A failed query is logged and skipped; the batch fails only when every
/// query failed.
pub async fn collect_feed(
    source: &dyn FeedSource,
    queries: &[FeedQuery],
) -> Result<Vec<Value>, FetchError> {
    let mut records = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0;
    for query in queries {
        match source.fetch_query(query).await {
            Ok(batch) => {
                watch_info!("Profile {:?}: {} records", query.profile, batch.len());
                records.extend(batch);
                succeeded += 1;
            }
            Err(err) => {
                watch_error!("Profile {:?}: fetch failed: {}", query.profile, err);
                last_error = Some(err);
            }
        }
    }
    match last_error {
        Some(err) if succeeded == 0 => Err(err),
        _ => Ok(records),
    }
}

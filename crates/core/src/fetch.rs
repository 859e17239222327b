//! Batched article fetching from a MediaWiki query API.
//!
//! [`ArticleSource`] splits titles into chunks of at most 50 and issues one
//! round-trip per chunk through a [`Transport`]. Results come back through a
//! [`PageStream`], which only requests the next chunk once the previous one
//! has been consumed, so callers can start on the first pages early.
//!
//! A failed round-trip is fatal to the whole batch. Retrying is the
//! transport's business.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;

use serde::Deserialize;

use crate::{ChronicleError, Result};

/// The API accepts at most this many titles per request.
pub const MAX_BATCH: usize = 50;

/// HTTP client configuration for the article source.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Query API endpoint.
    pub api_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Titles per round-trip, capped at [`MAX_BATCH`].
    pub batch_size: usize,
    /// `maxlag` parameter asking the server to shed load under replication lag.
    pub maxlag: u32,
    /// `maxage` cache hint in seconds.
    pub maxage: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: "https://starwars.fandom.com/api.php".to_string(),
            timeout: 30,
            user_agent: "chronicle/0.1 (media timeline catalog bot)".to_string(),
            batch_size: MAX_BATCH,
            maxlag: 1,
            maxage: 604_800,
        }
    }
}

/// Page properties requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageProperties {
    /// Latest revision content and timestamp.
    Content,
    /// File metadata: url, sha1 and upload timestamp.
    ImageInfo,
}

impl PageProperties {
    /// Query parameters selecting these properties.
    pub fn params(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            PageProperties::Content => &[("prop", "revisions"), ("rvprop", "content|timestamp"), ("rvslots", "main")],
            PageProperties::ImageInfo => &[("prop", "imageinfo"), ("iiprop", "url|sha1|timestamp")],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageProperties::Content => "revisions",
            PageProperties::ImageInfo => "imageinfo",
        }
    }
}

/// One round-trip worth of titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub titles: Vec<String>,
    pub properties: PageProperties,
}

/// Raw transport answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub status: u16,
    pub body: String,
}

/// Moves one query to the API and back.
pub trait Transport {
    fn send(&self, request: &QueryRequest) -> impl Future<Output = Result<QueryResponse>>;
}

/// File metadata returned for `File:` pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One page of a query result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Title as cleaned by the server.
    pub title: String,
    pub missing: bool,
    pub page_id: Option<u64>,
    pub content: Option<String>,
    pub revision_timestamp: Option<String>,
    pub image: Option<ImageInfo>,
    /// The title the caller asked for, when the server normalized it.
    pub normalized_from: Option<String>,
}

impl PageResult {
    /// The key the caller used to request this page.
    pub fn requested_title(&self) -> &str {
        self.normalized_from.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    normalized: Vec<ApiNormalization>,
    #[serde(default)]
    pages: Option<BTreeMap<String, ApiPage>>,
}

#[derive(Debug, Deserialize)]
struct ApiNormalization {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    pageid: Option<u64>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
    #[serde(default)]
    revisions: Vec<ApiRevision>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiRevision {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    slots: Option<ApiSlots>,
}

#[derive(Debug, Deserialize)]
struct ApiSlots {
    main: ApiSlot,
}

#[derive(Debug, Deserialize)]
struct ApiSlot {
    #[serde(rename = "*", default)]
    content: Option<String>,
}

/// Decodes a query response body into page results.
pub fn parse_response(body: &str) -> Result<Vec<PageResult>> {
    let response: ApiResponse = serde_json::from_str(body)?;
    let Some(query) = response.query else {
        let detail = response.error.map(|e| e.to_string()).unwrap_or_else(|| "missing 'query' object".to_string());
        return Err(ChronicleError::InvalidResponse(detail));
    };
    let pages = query
        .pages
        .ok_or_else(|| ChronicleError::InvalidResponse("missing 'pages' object".to_string()))?;

    let normalizations: HashMap<String, String> = query.normalized.into_iter().map(|n| (n.to, n.from)).collect();
    if !normalizations.is_empty() {
        tracing::debug!(count = normalizations.len(), "Titles normalized by the source");
    }

    Ok(pages
        .into_values()
        .map(|page| {
            let normalized_from = normalizations.get(&page.title).cloned();
            let missing = page.missing.is_some();
            let revision = page.revisions.into_iter().next();
            PageResult {
                missing,
                page_id: page.pageid,
                revision_timestamp: revision.as_ref().and_then(|r| r.timestamp.clone()),
                content: revision.and_then(|r| r.slots).and_then(|s| s.main.content),
                image: page.imageinfo.into_iter().next(),
                normalized_from,
                title: page.title,
            }
        })
        .collect())
}

/// Round-trip counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub requests: usize,
    pub bytes: usize,
}

/// Batched access to the article source.
pub struct ArticleSource<T> {
    transport: T,
    batch_size: usize,
    stats: Cell<FetchStats>,
}

impl<T: Transport> ArticleSource<T> {
    pub fn new(transport: T) -> Self {
        Self::with_batch_size(transport, MAX_BATCH)
    }

    /// Uses smaller batches, never more than [`MAX_BATCH`].
    pub fn with_batch_size(transport: T, batch_size: usize) -> Self {
        Self { transport, batch_size: batch_size.clamp(1, MAX_BATCH), stats: Cell::new(FetchStats::default()) }
    }

    pub fn stats(&self) -> FetchStats {
        self.stats.get()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Streams results for `titles`, one round-trip per chunk.
    pub fn fetch<S: AsRef<str>>(&self, titles: &[S], properties: PageProperties) -> PageStream<'_, T> {
        let titles: Vec<String> = titles.iter().map(|t| t.as_ref().to_string()).collect();
        let chunks: VecDeque<Vec<String>> = titles.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        PageStream { source: self, chunks, properties, buffer: VecDeque::new() }
    }

    /// Fetches a single page.
    pub async fn fetch_one(&self, title: &str, properties: PageProperties) -> Result<PageResult> {
        self.fetch(&[title], properties)
            .next()
            .await
            .unwrap_or_else(|| Err(ChronicleError::InvalidResponse(format!("No page returned for {}", title))))
    }

    async fn round_trip(&self, titles: Vec<String>, properties: PageProperties) -> Result<Vec<PageResult>> {
        let request = QueryRequest { titles, properties };
        let response = self.transport.send(&request).await?;

        let mut stats = self.stats.get();
        stats.requests += 1;
        stats.bytes += response.body.len();
        self.stats.set(stats);

        if !(200..300).contains(&response.status) {
            let message: String = response.body.chars().take(200).collect();
            return Err(ChronicleError::Fetch { status: response.status, message });
        }

        tracing::info!(bytes = response.body.len(), prop = properties.as_str(), "Received query response");
        parse_response(&response.body)
    }
}

/// Incremental results of a batched fetch. Finite and not restartable.
pub struct PageStream<'a, T> {
    source: &'a ArticleSource<T>,
    chunks: VecDeque<Vec<String>>,
    properties: PageProperties,
    buffer: VecDeque<PageResult>,
}

impl<T: Transport> PageStream<'_, T> {
    /// The next page, fetching the next chunk when the buffer runs dry.
    ///
    /// After an error the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<PageResult>> {
        loop {
            if let Some(page) = self.buffer.pop_front() {
                return Some(Ok(page));
            }
            let chunk = self.chunks.pop_front()?;
            match self.source.round_trip(chunk, self.properties).await {
                Ok(pages) => self.buffer.extend(pages),
                Err(e) => {
                    self.chunks.clear();
                    return Some(Err(e));
                }
            }
        }
    }

    /// Chunks not yet requested.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Drains the stream into a vector.
    pub async fn collect(mut self) -> Result<Vec<PageResult>> {
        let mut pages = Vec::new();
        while let Some(page) = self.next().await {
            pages.push(page?);
        }
        Ok(pages)
    }
}

/// reqwest-backed transport.
#[cfg(feature = "fetch")]
pub struct HttpTransport {
    client: reqwest::Client,
    config: FetchConfig,
}

#[cfg(feature = "fetch")]
impl HttpTransport {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ChronicleError::HttpError)?;
        Ok(Self { client, config })
    }

    /// Full query URL for a request.
    pub fn url(&self, request: &QueryRequest) -> Result<url::Url> {
        let maxlag = self.config.maxlag.to_string();
        let maxage = self.config.maxage.to_string();
        let titles = request.titles.join("|");

        let mut params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("format", "json"),
            ("origin", "*"),
            ("maxlag", &maxlag),
            ("maxage", &maxage),
            ("titles", &titles),
        ];
        params.extend_from_slice(request.properties.params());

        url::Url::parse_with_params(&self.config.api_url, &params)
            .map_err(|e| ChronicleError::ConfigError(format!("Invalid API URL {}: {}", self.config.api_url, e)))
    }
}

#[cfg(feature = "fetch")]
impl ArticleSource<HttpTransport> {
    /// Source talking HTTP to the configured API.
    pub fn http(config: FetchConfig) -> Result<Self> {
        let batch_size = config.batch_size;
        Ok(Self::with_batch_size(HttpTransport::new(config)?, batch_size))
    }
}

#[cfg(feature = "fetch")]
impl Transport for HttpTransport {
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let url = self.url(request)?;
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(QueryResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const BODY: &str = r#"{
        "query": {
            "normalized": [{"from": "Star_Wars_Rebels", "to": "Star Wars Rebels"}],
            "pages": {
                "-1": {"title": "Nowhere", "missing": ""},
                "42": {
                    "pageid": 42,
                    "title": "Star Wars Rebels",
                    "revisions": [{"timestamp": "2024-01-01T00:00:00Z", "slots": {"main": {"*": "{}"}}}]
                }
            }
        }
    }"#;

    struct Recorder {
        requests: RefCell<Vec<QueryRequest>>,
        status: u16,
        body: String,
    }

    impl Recorder {
        fn new(status: u16, body: &str) -> Self {
            Self { requests: RefCell::new(Vec::new()), status, body: body.to_string() }
        }
    }

    impl Transport for Recorder {
        async fn send(&self, request: &QueryRequest) -> Result<QueryResponse> {
            self.requests.borrow_mut().push(request.clone());
            Ok(QueryResponse { status: self.status, body: self.body.clone() })
        }
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Runtime::new().unwrap().block_on(future)
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.batch_size, MAX_BATCH);
        assert!(config.api_url.ends_with("api.php"));
    }

    #[test]
    fn test_parse_response_pages() {
        let pages = parse_response(BODY).unwrap();
        assert_eq!(pages.len(), 2);

        let missing = pages.iter().find(|p| p.title == "Nowhere").unwrap();
        assert!(missing.missing);

        let found = pages.iter().find(|p| p.title == "Star Wars Rebels").unwrap();
        assert!(!found.missing);
        assert_eq!(found.page_id, Some(42));
        assert_eq!(found.content.as_deref(), Some("{}"));
        assert_eq!(found.revision_timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(found.normalized_from.as_deref(), Some("Star_Wars_Rebels"));
        assert_eq!(found.requested_title(), "Star_Wars_Rebels");
    }

    #[test]
    fn test_parse_response_without_query() {
        let result = parse_response(r#"{"error": {"code": "maxlag"}}"#);
        assert!(matches!(result, Err(ChronicleError::InvalidResponse(ref m)) if m.contains("maxlag")));
    }

    #[test]
    fn test_parse_response_without_pages() {
        let result = parse_response(r#"{"query": {}}"#);
        assert!(matches!(result, Err(ChronicleError::InvalidResponse(ref m)) if m.contains("pages")));

        let result = parse_response(r#"{"query": {"normalized": [{"from": "a", "to": "A"}]}}"#);
        assert!(matches!(result, Err(ChronicleError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_image_info() {
        let body = r#"{"query": {"pages": {"7": {"pageid": 7, "title": "File:Cover.png",
            "imageinfo": [{"url": "https://img/Cover.png", "sha1": "abc", "timestamp": "2020-01-01T00:00:00Z"}]}}}}"#;
        let pages = parse_response(body).unwrap();
        let image = pages[0].image.as_ref().unwrap();
        assert_eq!(image.sha1.as_deref(), Some("abc"));
        assert_eq!(image.url.as_deref(), Some("https://img/Cover.png"));
    }

    #[test]
    fn test_chunks_of_fifty() {
        let source = ArticleSource::new(Recorder::new(200, r#"{"query": {"pages": {}}}"#));
        let titles: Vec<String> = (0..120).map(|i| format!("Title {}", i)).collect();

        let pages = block_on(source.fetch(&titles, PageProperties::Content).collect()).unwrap();
        assert!(pages.is_empty());

        let requests = source.transport().requests.borrow();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].titles.len(), 50);
        assert_eq!(requests[2].titles.len(), 20);
        assert_eq!(source.stats().requests, 3);
    }

    #[test]
    fn test_stream_is_lazy() {
        let source = ArticleSource::with_batch_size(Recorder::new(200, BODY), 1);
        let mut stream = source.fetch(&["A", "B", "C"], PageProperties::Content);
        assert_eq!(stream.pending_chunks(), 3);

        let first = block_on(stream.next()).unwrap().unwrap();
        assert!(!first.title.is_empty());
        assert_eq!(source.transport().requests.borrow().len(), 1);
        assert_eq!(stream.pending_chunks(), 2);
    }

    #[test]
    fn test_non_success_status_is_fatal() {
        let source = ArticleSource::with_batch_size(Recorder::new(503, "Service Unavailable"), 1);
        let mut stream = source.fetch(&["A", "B"], PageProperties::Content);

        let first = block_on(stream.next()).unwrap();
        assert!(matches!(first, Err(ChronicleError::Fetch { status: 503, .. })));
        assert!(block_on(stream.next()).is_none());
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_http_url_params() {
        let transport = HttpTransport::new(FetchConfig::default()).unwrap();
        let request = QueryRequest { titles: vec!["A".to_string(), "B C".to_string()], properties: PageProperties::Content };
        let url = transport.url(&request).unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("titles").map(String::as_str), Some("A|B C"));
        assert_eq!(pairs.get("prop").map(String::as_str), Some("revisions"));
        assert_eq!(pairs.get("action").map(String::as_str), Some("query"));
    }
}

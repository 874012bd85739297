//! Remote document fetching
//!
//! Transient failures (connect errors, timeouts, 429 and 5xx responses) are
//! retried with exponential backoff. Everything else fails on the first try.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Document at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

impl FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { source, .. } => source.is_timeout() || source.is_connect(),
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            FetchError::Client(_) | FetchError::TooLarge { .. } => false,
        }
    }
}

/// Parse a user-supplied URL, accepting only http and https
pub fn parse_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid URL '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!(
            "Unsupported URL scheme '{}'. Must be 'http' or 'https'",
            other
        )),
    }
}

/// HTTP client with a bounded timeout, body cap and retry budget
#[derive(Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    retries: u32,
    backoff: Duration,
    max_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration, retries: u32, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docshift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            retries,
            backoff: DEFAULT_BACKOFF,
            max_bytes,
        })
    }

    /// Base delay before the first retry; doubles on every further attempt
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(%url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large());
        }

        // Length-less bodies are capped while streaming
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        debug!(%url, bytes = body.len(), "Fetched remote document");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, Bytes},
        http::StatusCode as HttpStatus,
        routing::get,
        Router,
    };
    use futures::stream;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher(retries: u32) -> RemoteFetcher {
        RemoteFetcher::new(Duration::from_secs(5), retries, 1024)
            .unwrap()
            .with_backoff(Duration::from_millis(10))
    }

    #[test]
    fn only_http_urls_are_accepted() {
        assert!(parse_url("https://example.com/deck.html").is_ok());
        assert!(parse_url("file:///etc/passwd").is_err());
        assert!(parse_url("not a url").is_err());
    }

    #[tokio::test]
    async fn fetches_body() {
        let base = serve(Router::new().route("/deck.html", get(|| async { "<p>remote</p>" }))).await;
        let url = parse_url(&format!("{}/deck.html", base)).unwrap();

        let body = fetcher(0).fetch(&url).await.unwrap();
        assert_eq!(body, b"<p>remote</p>");
    }

    #[tokio::test]
    async fn retries_server_errors_then_gives_up() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/flaky",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    HttpStatus::SERVICE_UNAVAILABLE
                }
            }),
        );
        let base = serve(app).await;
        let url = parse_url(&format!("{}/flaky", base)).unwrap();

        let err = fetcher(2).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/gone",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    HttpStatus::NOT_FOUND
                }
            }),
        );
        let base = serve(app).await;
        let url = parse_url(&format!("{}/gone", base)).unwrap();

        assert!(fetcher(3).fetch(&url).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oversize_body_is_rejected() {
        let big = "x".repeat(4096);
        let app = Router::new().route("/big", get(move || async move { big }));
        let base = serve(app).await;
        let url = parse_url(&format!("{}/big", base)).unwrap();

        let err = fetcher(0).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 1024, .. }));
    }

    #[tokio::test]
    async fn endless_stream_is_cut_off_at_the_cap() {
        let app = Router::new().route(
            "/endless",
            get(|| async {
                const CHUNK: &[u8] = &[b'x'; 512];
                Body::from_stream(stream::repeat_with(|| {
                    Ok::<_, Infallible>(Bytes::from_static(CHUNK))
                }))
            }),
        );
        let base = serve(app).await;
        let url = parse_url(&format!("{}/endless", base)).unwrap();

        let started = std::time::Instant::now();
        let err = fetcher(0).fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 1024, .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

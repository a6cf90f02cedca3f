use chapterbind_model::ChapterError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::future::Future;
use std::time::Duration;

/// Identity sent with every request. Image hosts commonly reject non-browser agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-side or throttling statuses that are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    /// A missing content type is given the benefit of the doubt.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The one network operation the pipeline needs: a GET returning the whole body.
pub trait WebClient: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<Response, ChapterError>> + Send;
}

/// `WebClient` over a shared reqwest connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl WebClient for HttpClient {
    async fn get(&self, url: &str) -> Result<Response, ChapterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChapterError::transport(url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| ChapterError::transport(url, e))?
            .to_vec();

        tracing::trace!(url, status, bytes = body.len(), "Received response");
        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Delay before the first retry; doubled for each further one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// GET `url`, retrying transport failures and retryable statuses.
///
/// The last response or error is returned once the retries are spent.
pub async fn get_with_retry<C: WebClient>(
    client: &C,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Response, ChapterError> {
    let mut attempt = 0;
    loop {
        let result = client.get(url).await;
        let reason = match &result {
            Ok(resp) if resp.is_retryable() => format!("HTTP {}", resp.status),
            Err(err) if err.is_transient() => err.to_string(),
            _ => return result,
        };
        if attempt >= policy.retries {
            return result;
        }
        let delay = policy.delay(attempt);
        attempt += 1;
        tracing::warn!(
            url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Resolve a possibly relative link against the page it was found on.
pub fn resolve_link(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

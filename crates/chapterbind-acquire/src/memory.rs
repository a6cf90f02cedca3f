//! In-memory `WebClient` serving canned responses.
//!
//! Lets the pipeline run against fixture pages without a network, with
//! optional per-URL latency and a number of leading transport failures.

use crate::http::{Response, WebClient};
use chapterbind_model::ChapterError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Route {
    response: Response,
    delay: Duration,
    failures: usize,
}

impl Route {
    fn not_found() -> Self {
        Self {
            response: Response {
                status: 404,
                content_type: Some("text/html".into()),
                body: b"<html><body>Not Found</body></html>".to_vec(),
            },
            delay: Duration::ZERO,
            failures: 0,
        }
    }
}

/// Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MemoryClient {
    routes: HashMap<String, Route>,
    hits: Mutex<HashMap<String, usize>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, response: Response) -> Self {
        self.route(url).response = response;
        self
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(
            url,
            Response {
                status: 200,
                content_type: Some("text/html; charset=utf-8".into()),
                body: html.as_bytes().to_vec(),
            },
        )
    }

    pub fn with_body(self, url: &str, content_type: &str, body: Vec<u8>) -> Self {
        self.with_response(
            url,
            Response {
                status: 200,
                content_type: Some(content_type.into()),
                body,
            },
        )
    }

    /// Delay every answer for `url` by `delay`.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.route(url).delay = delay;
        self
    }

    /// Fail the first `count` requests for `url` with a transport error.
    pub fn with_failures(mut self, url: &str, count: usize) -> Self {
        self.route(url).failures = count;
        self
    }

    /// Number of requests made for `url` so far.
    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn route(&mut self, url: &str) -> &mut Route {
        self.routes
            .entry(url.to_string())
            .or_insert_with(Route::not_found)
    }
}

impl WebClient for MemoryClient {
    async fn get(&self, url: &str) -> Result<Response, ChapterError> {
        let hit = {
            let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
            let count = hits.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let route = self.routes.get(url).cloned().unwrap_or_else(Route::not_found);
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        if hit <= route.failures {
            return Err(ChapterError::transport(url, "simulated connection failure"));
        }
        Ok(route.response)
    }
}

use crate::http::{get_with_retry, resolve_link, RetryPolicy, WebClient};
use crate::normalize;
use chapterbind_model::{order_chapters, Chapter, ChapterError};
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::HashMap;

/// Chapter entries on the listing page.
pub const CHAPTER_ENTRY_SELECTOR: &str = ".chapter-name.text-nowrap";

/// Discover the chapters of a title, ordered by chapter number.
///
/// Entries whose name lacks "Chapter" are dropped; unnumbered chapters go
/// last in listing order. Connection-level failures come back as
/// `Transport`; a bad status or non-HTML body is a `Discovery` error.
pub async fn discover<C: WebClient>(
    client: &C,
    listing_url: &str,
    retry: &RetryPolicy,
) -> Result<Vec<Chapter>, ChapterError> {
    tracing::info!(url = %listing_url, "Fetching chapter listing");
    let response = get_with_retry(client, listing_url, retry).await?;

    if !response.is_success() {
        return Err(ChapterError::Discovery {
            url: listing_url.to_string(),
            reason: format!("HTTP {}", response.status),
        });
    }
    if !response.is_html() {
        return Err(ChapterError::Discovery {
            url: listing_url.to_string(),
            reason: format!(
                "expected HTML, got '{}'",
                response.content_type.as_deref().unwrap_or_default()
            ),
        });
    }

    let html = response.text();
    tracing::info!(bytes = html.len(), "Received listing HTML");

    let entries = parse_listing(&html, listing_url);
    let total = entries.len();
    let chapters = order_chapters(entries);
    tracing::info!(
        entries = total,
        chapters = chapters.len(),
        "Discovered chapters"
    );
    Ok(chapters)
}

/// Extract every chapter entry from the listing, in document order.
///
/// Links are resolved against `listing_url`. A repeated display name keeps
/// the position of its first occurrence and the link of its last.
pub fn parse_listing(html: &str, listing_url: &str) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let entry_sel = Selector::parse(CHAPTER_ENTRY_SELECTOR).expect("valid selector");
    let base = Url::parse(listing_url).ok();

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<Chapter> = Vec::new();

    for node in document.select(&entry_sel) {
        let name = normalize::clean_text(&node.text().collect::<String>());
        if name.is_empty() {
            continue;
        }
        let Some(href) = node.value().attr("href") else {
            tracing::debug!(name = %name, "Skipping entry without href");
            continue;
        };
        let link = resolve_link(base.as_ref(), href.trim());
        match positions.get(&name) {
            Some(&at) => {
                tracing::debug!(name = %name, link = %link, "Repeated entry, replacing link");
                entries[at] = Chapter::new(name, link);
            }
            None => {
                positions.insert(name.clone(), entries.len());
                entries.push(Chapter::new(name, link));
            }
        }
    }

    entries
}

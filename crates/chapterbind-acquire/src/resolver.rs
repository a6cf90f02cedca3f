use crate::http::{get_with_retry, resolve_link, RetryPolicy, WebClient};
use chapterbind_model::{ChapterError, PageImage};
use reqwest::Url;
use scraper::{Html, Selector};

/// Page images inside the chapter reader.
pub const READER_IMAGE_SELECTOR: &str = ".container-chapter-reader img";

/// Resolve the ordered page images of a chapter.
///
/// An empty result is not an error here; the caller decides what a
/// chapter without pages means.
pub async fn resolve_pages<C: WebClient>(
    client: &C,
    chapter_url: &str,
    retry: &RetryPolicy,
) -> Result<Vec<PageImage>, ChapterError> {
    let resolution_error = |reason: String| ChapterError::Resolution {
        url: chapter_url.to_string(),
        reason,
    };

    tracing::debug!(url = %chapter_url, "Fetching chapter page");
    let response = get_with_retry(client, chapter_url, retry)
        .await
        .map_err(|e| resolution_error(e.to_string()))?;
    if !response.is_success() {
        return Err(resolution_error(format!("HTTP {}", response.status)));
    }

    let pages = parse_reader_page(&response.text(), chapter_url);
    tracing::debug!(url = %chapter_url, pages = pages.len(), "Resolved page images");
    Ok(pages)
}

/// Collect reader image locations in document order.
///
/// Lazy-loading readers keep the real location in `data-src`; it is used
/// when `src` is absent or blank.
pub fn parse_reader_page(html: &str, chapter_url: &str) -> Vec<PageImage> {
    let document = Html::parse_document(html);
    let img_sel = Selector::parse(READER_IMAGE_SELECTOR).expect("valid selector");
    let base = Url::parse(chapter_url).ok();

    let urls = document.select(&img_sel).filter_map(|img| {
        let elem = img.value();
        let src = ["src", "data-src"]
            .iter()
            .filter_map(|attr| elem.attr(attr))
            .map(str::trim)
            .find(|s| !s.is_empty());
        if src.is_none() {
            tracing::debug!("Skipping reader image without a source");
        }
        src.map(|s| resolve_link(base.as_ref(), s))
    });

    PageImage::sequence(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;

    const CHAPTER_URL: &str = "https://site.example/abc/chapter-1";

    const READER: &str = r#"
    <html><body>
    <img src="https://site.example/logo.png">
    <div class="container-chapter-reader">
      <img src="https://cdn.example/abc/1/3.jpg" alt="page 1">
      <img src="/abc/1/1.jpg" alt="page 2">
      <div class="ad"><img data-src="https://cdn.example/abc/1/2.webp"></div>
      <img alt="broken">
    </div>
    </body></html>
    "#;

    #[test]
    fn test_parse_reader_page_order() {
        let pages = parse_reader_page(READER, CHAPTER_URL);
        let urls: Vec<&str> = pages.iter().map(|p| p.source_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example/abc/1/3.jpg",
                "https://site.example/abc/1/1.jpg",
                "https://cdn.example/abc/1/2.webp",
            ]
        );
        let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_resolve_without_reader_is_empty() {
        let client = MemoryClient::new()
            .with_html(CHAPTER_URL, "<html><body><img src='x.jpg'></body></html>");
        let pages = resolve_pages(&client, CHAPTER_URL, &RetryPolicy::none())
            .await
            .unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_transport_failure() {
        let client = MemoryClient::new()
            .with_html(CHAPTER_URL, READER)
            .with_failures(CHAPTER_URL, 1);
        let err = resolve_pages(&client, CHAPTER_URL, &RetryPolicy::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "resolution");
        assert!(err.to_string().contains(CHAPTER_URL));
    }

    #[tokio::test]
    async fn test_resolve_bad_status() {
        let err = resolve_pages(&MemoryClient::new(), CHAPTER_URL, &RetryPolicy::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "resolution");
    }
}

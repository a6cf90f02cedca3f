use crate::http::{get_with_retry, RetryPolicy, WebClient};
use crate::normalize::{self, DEFAULT_JPEG_QUALITY};
use chapterbind_model::{staged_file_name, ChapterError, PageImage, StagedPage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Knobs for page retrieval.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum number of page retrievals in flight at once.
    pub concurrency: usize,
    pub jpeg_quality: u8,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Fetch, normalize, and stage every page of a chapter.
///
/// Pages are retrieved through a bounded pool and written to `staging_dir`
/// as they complete. The result is aligned with `pages` no matter which
/// retrieval finishes first. The first failure aborts the outstanding
/// retrievals and fails the whole call; already staged files are left for
/// the caller to clean up. No retrieval is still writing once this returns.
pub async fn fetch_all<C: WebClient>(
    client: Arc<C>,
    pages: &[PageImage],
    staging_dir: &Path,
    config: &FetchConfig,
) -> Result<Vec<StagedPage>, ChapterError> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    tracing::info!(
        pages = pages.len(),
        concurrency = config.concurrency.max(1),
        "Fetching page images"
    );

    for (slot, page) in pages.iter().cloned().enumerate() {
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let dest = staging_dir.join(staged_file_name(page.index));
        let quality = config.jpeg_quality;
        let retry = config.retry.clone();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| ChapterError::transport(&page.source_url, e))?;
            let staged = fetch_page(client.as_ref(), &page, dest, quality, &retry).await?;
            Ok::<_, ChapterError>((slot, staged))
        });
    }

    let mut slots: Vec<Option<StagedPage>> = (0..pages.len()).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| ChapterError::transport("page worker", e))
            .and_then(|result| result);
        match outcome {
            Ok((slot, staged)) => slots[slot] = Some(staged),
            Err(err) => {
                tasks.abort_all();
                tracing::warn!(error = %err, kind = err.kind(), "Page retrieval failed, aborting chapter");
                // Wait for aborted workers so none writes into the workspace after we return.
                while tasks.join_next().await.is_some() {}
                return Err(err);
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

async fn fetch_page<C: WebClient>(
    client: &C,
    page: &PageImage,
    dest: PathBuf,
    quality: u8,
    retry: &RetryPolicy,
) -> Result<StagedPage, ChapterError> {
    let url = page.source_url.as_str();
    let response = get_with_retry(client, url, retry).await?;

    if !response.is_success() {
        return Err(ChapterError::transport(url, format!("HTTP {}", response.status)));
    }
    if !response.is_image() {
        return Err(ChapterError::InvalidContent {
            url: url.to_string(),
            content_type: response.content_type.unwrap_or_default(),
        });
    }

    let index = page.index;
    let body = response.body;
    let decode_error = |reason: String| ChapterError::Decode {
        url: url.to_string(),
        reason,
    };
    let raster = tokio::task::spawn_blocking(move || normalize::to_raster_page(index, &body, quality))
        .await
        .map_err(|e| decode_error(e.to_string()))?
        .map_err(|e| decode_error(e.to_string()))?;

    tokio::fs::write(&dest, &raster.jpeg)
        .await
        .map_err(|e| ChapterError::workspace(&dest, e))?;

    tracing::debug!(
        index,
        url,
        width = raster.width,
        height = raster.height,
        path = %dest.display(),
        "Staged page"
    );
    Ok(StagedPage {
        index,
        path: dest,
        width: raster.width,
        height: raster.height,
    })
}

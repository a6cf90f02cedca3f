use crate::assemble::{assemble, document_path};
use crate::workspace::Workspace;
use chapterbind_acquire::{discover, fetch_all, resolve_pages, FetchConfig, WebClient};
use chapterbind_model::{Chapter, ChapterError, Document};
use std::path::PathBuf;
use std::sync::Arc;

/// Settings for turning chapters into documents.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving documents and transient workspaces.
    pub output_root: PathBuf,
    pub fetch: FetchConfig,
    /// Leave the workspace of a failed chapter in place for inspection.
    pub keep_failed: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            fetch: FetchConfig::default(),
            keep_failed: false,
        }
    }
}

/// Runs chapters through resolve → fetch → assemble, one at a time.
pub struct Pipeline<C> {
    client: Arc<C>,
    config: PipelineConfig,
}

impl<C: WebClient> Pipeline<C> {
    pub fn new(client: Arc<C>, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// List the chapters of a title in reading order.
    pub async fn discover(&self, listing_url: &str) -> Result<Vec<Chapter>, ChapterError> {
        discover(self.client.as_ref(), listing_url, &self.config.fetch.retry).await
    }

    /// Produce the document for one chapter.
    ///
    /// Any failure is confined to this chapter. The workspace of a failed
    /// chapter is removed unless `keep_failed` is set. A chapter whose
    /// document path is already taken fails before anything is fetched.
    pub async fn process_chapter(&self, chapter: &Chapter) -> Result<Document, ChapterError> {
        let output_root = &self.config.output_root;
        tracing::info!(
            chapter = %chapter.display_name(),
            url = %chapter.source_url(),
            "Processing chapter"
        );

        let target = document_path(output_root, chapter.display_name());
        if target.exists() {
            return Err(ChapterError::Document {
                path: target,
                reason: "a document with this name already exists".to_string(),
            });
        }

        let pages = resolve_pages(
            self.client.as_ref(),
            chapter.source_url(),
            &self.config.fetch.retry,
        )
        .await?;
        if pages.is_empty() {
            tracing::warn!(chapter = %chapter.display_name(), "No page images found");
        }

        std::fs::create_dir_all(output_root)
            .map_err(|e| ChapterError::workspace(output_root, e))?;
        let workspace = Workspace::create(output_root, chapter.display_name())?;

        let staged = match fetch_all(
            Arc::clone(&self.client),
            &pages,
            workspace.root(),
            &self.config.fetch,
        )
        .await
        {
            Ok(staged) => staged,
            Err(err) => {
                self.discard(&workspace);
                return Err(err);
            }
        };
        tracing::info!(
            chapter = %chapter.display_name(),
            pages = staged.len(),
            "Fetched all pages"
        );

        let expected: Vec<usize> = staged.iter().map(|p| p.index).collect();
        let name = chapter.display_name().to_string();
        let root = output_root.clone();
        let ws = workspace.clone();
        let assembled =
            tokio::task::spawn_blocking(move || assemble(&name, &ws, &expected, &root))
                .await
                .map_err(|e| ChapterError::Document {
                    path: target,
                    reason: e.to_string(),
                })
                .and_then(|result| result);

        match assembled {
            Ok(document) => Ok(document),
            Err(err) => {
                self.discard(&workspace);
                Err(err)
            }
        }
    }

    fn discard(&self, workspace: &Workspace) {
        if self.config.keep_failed {
            tracing::info!(path = %workspace.root().display(), "Keeping workspace of failed chapter");
            return;
        }
        if let Err(err) = workspace.remove() {
            tracing::warn!(error = %err, "Could not remove workspace of failed chapter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterbind_acquire::{MemoryClient, RetryPolicy};
    use image::{ImageFormat, Rgb, RgbImage};
    use lopdf::Object;
    use std::fs;
    use std::io::Cursor;
    use std::time::Duration;

    const LISTING_URL: &str = "https://site.example/manga/abc";
    const CHAPTER_URL: &str = "https://site.example/abc/chapter-1";

    fn png(width: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, 5, Rgb([90, 90, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn image_url(i: usize) -> String {
        format!("https://cdn.example/abc/1/{i}.png")
    }

    fn reader_html(count: usize) -> String {
        let imgs: String = (0..count)
            .map(|i| format!(r#"<img src="{}">"#, image_url(i)))
            .collect();
        format!(r#"<html><body><div class="container-chapter-reader">{imgs}</div></body></html>"#)
    }

    /// Five pages whose simulated latency is reversed: the last finishes first.
    fn chapter_client() -> MemoryClient {
        let mut client = MemoryClient::new().with_html(CHAPTER_URL, &reader_html(5));
        for i in 0..5 {
            client = client
                .with_body(&image_url(i), "image/png", png(30 + i as u32))
                .with_delay(&image_url(i), Duration::from_millis(15 * (5 - i as u64)));
        }
        client
    }

    fn pipeline(client: MemoryClient, root: &std::path::Path, keep_failed: bool) -> Pipeline<MemoryClient> {
        let config = PipelineConfig {
            output_root: root.to_path_buf(),
            fetch: FetchConfig {
                retry: RetryPolicy::none(),
                ..FetchConfig::default()
            },
            keep_failed,
        };
        Pipeline::new(Arc::new(client), config)
    }

    fn page_widths(path: &std::path::Path) -> Vec<i64> {
        let doc = lopdf::Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let page = doc.get_object(id).and_then(Object::as_dict).unwrap();
                let media = page.get(b"MediaBox").and_then(Object::as_array).unwrap();
                media[2].as_i64().unwrap()
            })
            .collect()
    }

    fn entries(root: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_chapter_pages_keep_source_order() {
        let out = tempfile::tempdir().unwrap();
        let p = pipeline(chapter_client(), out.path(), false);
        let chapter = Chapter::new("Chapter 1: Start!", CHAPTER_URL);

        let doc = p.process_chapter(&chapter).await.unwrap();

        assert_eq!(doc.pages, 5);
        assert!(doc.skipped.is_empty());
        assert_eq!(page_widths(&doc.path), vec![30, 31, 32, 33, 34]);
        assert_eq!(entries(out.path()), vec!["Chapter 1 Start.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_page_produces_no_document() {
        let out = tempfile::tempdir().unwrap();
        let client = chapter_client().with_html(&image_url(3), "<html>captcha</html>");
        let p = pipeline(client, out.path(), false);
        let chapter = Chapter::new("Chapter 1", CHAPTER_URL);

        let err = p.process_chapter(&chapter).await.unwrap_err();

        assert_eq!(err.kind(), "invalid-content");
        assert!(entries(out.path()).is_empty());
    }

    #[tokio::test]
    async fn test_keep_failed_preserves_workspace() {
        let out = tempfile::tempdir().unwrap();
        let client = chapter_client().with_html(&image_url(0), "<html>captcha</html>");
        let p = pipeline(client, out.path(), true);

        let err = p
            .process_chapter(&Chapter::new("Chapter 1", CHAPTER_URL))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "invalid-content");
        assert_eq!(entries(out.path()), vec!["Chapter 1".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_workspace_blocks_chapter() {
        let out = tempfile::tempdir().unwrap();
        fs::create_dir(out.path().join("Chapter 1")).unwrap();
        fs::write(out.path().join("Chapter 1").join("keep.txt"), b"mine").unwrap();
        let p = pipeline(chapter_client(), out.path(), false);

        let err = p
            .process_chapter(&Chapter::new("Chapter 1", CHAPTER_URL))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "workspace");
        assert!(out.path().join("Chapter 1").join("keep.txt").is_file());
    }

    #[tokio::test]
    async fn test_unreachable_chapter_is_resolution_error() {
        let out = tempfile::tempdir().unwrap();
        let p = pipeline(MemoryClient::new(), out.path(), false);
        let err = p
            .process_chapter(&Chapter::new("Chapter 9", "https://site.example/abc/chapter-9"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "resolution");
        assert!(entries(out.path()).is_empty());
    }

    #[tokio::test]
    async fn test_chapter_without_pages_writes_empty_document() {
        let out = tempfile::tempdir().unwrap();
        let client = MemoryClient::new().with_html(CHAPTER_URL, "<html><body></body></html>");
        let p = pipeline(client, out.path(), false);
        let doc = p
            .process_chapter(&Chapter::new("Chapter 1", CHAPTER_URL))
            .await
            .unwrap();
        assert_eq!(doc.pages, 0);
        assert_eq!(entries(out.path()), vec!["Chapter 1.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_names_sanitizing_alike_do_not_share_a_document() {
        let out = tempfile::tempdir().unwrap();
        let second_url = "https://site.example/abc/chapter-15";
        let client = chapter_client().with_html(second_url, &reader_html(1));
        let p = pipeline(client, out.path(), false);

        let first = p
            .process_chapter(&Chapter::new("Chapter 1.5", CHAPTER_URL))
            .await
            .unwrap();
        let err = p
            .process_chapter(&Chapter::new("Chapter 15", second_url))
            .await
            .unwrap_err();

        assert_eq!(first.path, out.path().join("Chapter 15.pdf"));
        assert_eq!(err.kind(), "document");
        assert_eq!(page_widths(&first.path).len(), 5);
        assert_eq!(entries(out.path()), vec!["Chapter 15.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_discover_then_process_sequentially() {
        let out = tempfile::tempdir().unwrap();
        let listing = format!(
            r#"<html><body>
            <a class="chapter-name text-nowrap" href="https://site.example/abc/chapter-2">Chapter 2</a>
            <a class="chapter-name text-nowrap" href="{CHAPTER_URL}">Chapter 1</a>
            </body></html>"#
        );
        let client = chapter_client()
            .with_html(LISTING_URL, &listing)
            .with_html("https://site.example/abc/chapter-2", &reader_html(2));
        let p = pipeline(client, out.path(), false);

        let chapters = p.discover(LISTING_URL).await.unwrap();
        assert_eq!(chapters[0].display_name(), "Chapter 1");

        let mut pages = Vec::new();
        for chapter in &chapters {
            pages.push(p.process_chapter(chapter).await.unwrap().pages);
        }
        assert_eq!(pages, vec![5, 2]);
        assert_eq!(
            entries(out.path()),
            vec!["Chapter 1.pdf".to_string(), "Chapter 2.pdf".to_string()]
        );
    }
}

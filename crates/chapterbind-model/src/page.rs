use std::path::PathBuf;

/// A page image location discovered on a chapter page.
///
/// `index` is the page's position in the chapter markup and the only
/// ordering key used downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub index: usize,
    pub source_url: String,
}

impl PageImage {
    /// Number the given locations in the order they were discovered.
    pub fn sequence<I, S>(urls: I) -> Vec<PageImage>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(index, url)| PageImage {
                index,
                source_url: url.into(),
            })
            .collect()
    }
}

/// A fetched page, normalized to baseline RGB JPEG.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub index: usize,
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A page that has been normalized and written to its workspace file.
///
/// Only the metadata is kept; the encoded bytes live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPage {
    pub index: usize,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Staged file name for a page: zero-padded 1-based page number, so lexical
/// order of the names matches page order.
pub fn staged_file_name(index: usize) -> String {
    format!("{:04}.jpg", index + 1)
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Substring a listing entry must contain to count as a chapter.
pub const CHAPTER_TOKEN: &str = "Chapter";

static CHAPTER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Chapter (\d+(\.\d+)?)").expect("valid regex"));

/// One installment of a title, as listed on the title's listing page.
///
/// Constructed once by the catalog and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    display_name: String,
    source_url: String,
    /// Number extracted from the display name. `None` means the name carries
    /// no chapter number and the chapter sorts after every numbered one.
    order_key: Option<f64>,
}

impl Chapter {
    pub fn new(display_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let order_key = extract_order_key(&display_name);
        Self {
            display_name,
            source_url: source_url.into(),
            order_key,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn order_key(&self) -> Option<f64> {
        self.order_key
    }

    /// Whether the display name identifies a chapter (as opposed to e.g. a volume wrapper).
    pub fn is_chapter(&self) -> bool {
        self.display_name.contains(CHAPTER_TOKEN)
    }

    /// The order key with the missing case mapped to positive infinity.
    fn sort_value(&self) -> f64 {
        self.order_key.unwrap_or(f64::INFINITY)
    }

    /// Ascending order by chapter number; unnumbered chapters compare equal to each other.
    pub fn cmp_order(&self, other: &Chapter) -> Ordering {
        self.sort_value().total_cmp(&other.sort_value())
    }
}

/// Extract the chapter number from a display name like "Vol.2 Chapter 10.5: Return".
pub fn extract_order_key(display_name: &str) -> Option<f64> {
    CHAPTER_NUMBER
        .captures(display_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Stable sort by chapter number; entries sharing a key keep their listing order.
pub fn sort_chapters(chapters: &mut [Chapter]) {
    chapters.sort_by(Chapter::cmp_order);
}

/// Keep only chapter entries, then order them by chapter number.
pub fn order_chapters(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut kept: Vec<Chapter> = chapters.into_iter().filter(Chapter::is_chapter).collect();
    sort_chapters(&mut kept);
    kept
}

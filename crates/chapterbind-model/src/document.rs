use std::path::PathBuf;

/// Fallback used when sanitizing leaves nothing usable.
pub const UNTITLED: &str = "untitled";

/// A per-chapter document written to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Sanitized chapter name, also the file stem.
    pub name: String,
    pub path: PathBuf,
    /// Number of pages actually embedded.
    pub pages: usize,
    /// Page indices whose staged file was missing at assembly time.
    pub skipped: Vec<usize>,
}

/// Strip everything except ASCII letters, ASCII digits, and whitespace.
///
/// Used for both the workspace directory and the document file name.
/// Sanitizing an already sanitized name returns it unchanged.
pub fn sanitize_name(display_name: &str) -> String {
    let cleaned: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    if cleaned.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned
    }
}

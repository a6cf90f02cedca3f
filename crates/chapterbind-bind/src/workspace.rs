use chapterbind_model::{sanitize_name, staged_file_name, ChapterError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Per-chapter staging directory, `<output root>/<sanitized chapter name>/`.
///
/// Holds one normalized JPEG per page until the document is assembled.
#[derive(Debug, Clone)]
pub struct Workspace {
    chapter_name: String,
    root: PathBuf,
}

impl Workspace {
    /// Create the staging directory for a chapter.
    ///
    /// Fails if anything with the same name already sits in the output root,
    /// so two runs never stage into the same directory.
    pub fn create(output_root: &Path, chapter_name: &str) -> Result<Self, ChapterError> {
        let root = output_root.join(sanitize_name(chapter_name));

        fs::create_dir(&root).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => {
                ChapterError::workspace(&root, "an entry with this name already exists")
            }
            _ => ChapterError::workspace(&root, e),
        })?;

        tracing::debug!(path = %root.display(), "Created workspace");
        Ok(Self {
            chapter_name: chapter_name.to_string(),
            root,
        })
    }

    pub fn chapter_name(&self) -> &str {
        &self.chapter_name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the page with the given index is staged.
    pub fn page_path(&self, index: usize) -> PathBuf {
        self.root.join(staged_file_name(index))
    }

    /// Delete the staging directory and everything in it.
    pub fn remove(&self) -> Result<(), ChapterError> {
        fs::remove_dir_all(&self.root).map_err(|e| ChapterError::workspace(&self.root, e))?;
        tracing::debug!(path = %self.root.display(), "Removed workspace");
        Ok(())
    }
}

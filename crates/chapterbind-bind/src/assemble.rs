use crate::workspace::Workspace;
use chapterbind_model::{sanitize_name, ChapterError, Document};
use image::ImageFormat;
use lopdf::{dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where the document for a chapter is written.
pub fn document_path(output_root: &Path, chapter_name: &str) -> PathBuf {
    output_root.join(format!("{}.pdf", sanitize_name(chapter_name)))
}

/// Bind the staged pages of a chapter into one PDF.
///
/// Pages are taken in `expected` order, each sized to its pixel dimensions.
/// A page whose staged file is missing or unreadable is logged and skipped.
/// The document is written even when no page made it in, but never over an
/// existing file: two chapters whose names sanitize alike cannot share a
/// document. On success the workspace is removed.
pub fn assemble(
    chapter_name: &str,
    workspace: &Workspace,
    expected: &[usize],
    output_root: &Path,
) -> Result<Document, ChapterError> {
    let path = document_path(output_root, chapter_name);
    let mut pdf = PdfBuilder::new();
    let mut skipped = Vec::new();

    for &index in expected {
        let staged = workspace.page_path(index);
        match read_staged(&staged) {
            Ok(Some((jpeg, width, height))) => pdf.add_jpeg_page(jpeg, width, height),
            Ok(None) => {
                tracing::warn!(index, path = %staged.display(), "Staged page not found, skipping");
                skipped.push(index);
            }
            Err(reason) => {
                tracing::warn!(index, path = %staged.display(), reason = %reason, "Unreadable staged page, skipping");
                skipped.push(index);
            }
        }
    }

    let pages = pdf.page_count();
    if pages == 0 {
        tracing::warn!(chapter = %chapter_name, "No pages embedded, writing empty document");
    }

    pdf.save_new(output_root, &path)?;
    tracing::info!(
        path = %path.display(),
        pages,
        skipped = skipped.len(),
        "Wrote document"
    );

    if let Err(err) = workspace.remove() {
        tracing::warn!(error = %err, "Document written but workspace could not be removed");
    }

    Ok(Document {
        name: sanitize_name(chapter_name),
        path,
        pages,
        skipped,
    })
}

/// `Ok(None)` when the file does not exist.
fn read_staged(path: &Path) -> Result<Option<(Vec<u8>, u32, u32)>, String> {
    if !path.is_file() {
        return Ok(None);
    }
    let jpeg = fs::read(path).map_err(|e| e.to_string())?;
    match image::guess_format(&jpeg) {
        Ok(ImageFormat::Jpeg) => {}
        Ok(other) => return Err(format!("expected JPEG, found {other:?}")),
        Err(e) => return Err(e.to_string()),
    }
    let (width, height) = image::image_dimensions(path).map_err(|e| e.to_string())?;
    Ok(Some((jpeg, width, height)))
}

/// Minimal PDF writer: one JPEG image per page, page box equal to the image.
struct PdfBuilder {
    doc: PdfDocument,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    fn add_jpeg_page(&mut self, jpeg: Vec<u8>, width: u32, height: u32) {
        let (w, h) = (i64::from(width), i64::from(height));

        // Already DCT-compressed; must not be deflated again.
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let content = format!("q {w} 0 0 {h} 0 0 cm /Im0 Do Q").into_bytes();
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
        });
        self.kids.push(Object::Reference(page_id));
    }

    /// Write to a temporary file beside `path`, then move it into place only
    /// if nothing exists there yet.
    fn save_new(self, dir: &Path, path: &Path) -> Result<(), ChapterError> {
        let document_error = |reason: String| ChapterError::Document {
            path: path.to_path_buf(),
            reason,
        };
        let mut staging = NamedTempFile::new_in(dir).map_err(|e| document_error(e.to_string()))?;
        self.write_to(staging.as_file_mut())
            .map_err(|e| document_error(e.to_string()))?;
        staging.persist_noclobber(path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                document_error("a document with this name already exists".to_string())
            } else {
                document_error(e.error.to_string())
            }
        })?;
        Ok(())
    }

    fn write_to(mut self, out: &mut fs::File) -> lopdf::Result<()> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc.save_to(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn stage_jpeg(ws: &Workspace, index: usize, width: u32) {
        let img = RgbImage::from_pixel(width, 6, Rgb([30, 60, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        fs::write(ws.page_path(index), out.into_inner()).unwrap();
    }

    fn page_widths(path: &Path) -> Vec<i64> {
        let doc = PdfDocument::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let page = doc.get_object(id).and_then(Object::as_dict).unwrap();
                let media = page.get(b"MediaBox").and_then(Object::as_array).unwrap();
                media[2].as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_pages_follow_expected_order() {
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(out.path(), "Chapter 7").unwrap();
        for i in 0..3 {
            stage_jpeg(&ws, i, 20 + i as u32);
        }
        let doc = assemble("Chapter 7", &ws, &[0, 1, 2], out.path()).unwrap();
        assert_eq!(doc.pages, 3);
        assert_eq!(doc.name, "Chapter 7");
        assert_eq!(page_widths(&doc.path), vec![20, 21, 22]);
    }

    #[test]
    fn test_missing_page_is_skipped() {
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(out.path(), "Chapter 3").unwrap();
        for i in 0..5 {
            stage_jpeg(&ws, i, 10 + i as u32);
        }
        fs::remove_file(ws.page_path(3)).unwrap();

        let doc = assemble("Chapter 3", &ws, &[0, 1, 2, 3, 4], out.path()).unwrap();
        assert_eq!(doc.pages, 4);
        assert_eq!(doc.skipped, vec![3]);
        assert_eq!(page_widths(&doc.path), vec![10, 11, 12, 14]);
    }

    #[test]
    fn test_corrupt_page_is_skipped() {
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(out.path(), "Chapter 4").unwrap();
        stage_jpeg(&ws, 0, 8);
        fs::write(ws.page_path(1), b"garbage").unwrap();
        let doc = assemble("Chapter 4", &ws, &[0, 1], out.path()).unwrap();
        assert_eq!(doc.pages, 1);
        assert_eq!(doc.skipped, vec![1]);
    }

    #[test]
    fn test_success_removes_workspace() {
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(out.path(), "Chapter 10: The Fall!").unwrap();
        stage_jpeg(&ws, 0, 16);
        let doc = assemble("Chapter 10: The Fall!", &ws, &[0], out.path()).unwrap();

        assert!(!ws.root().exists());
        let entries: Vec<PathBuf> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries, vec![out.path().join("Chapter 10 The Fall.pdf")]);
        assert_eq!(doc.path, entries[0]);
    }

    #[test]
    fn test_existing_document_is_not_overwritten() {
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("Chapter 15.pdf"), b"earlier").unwrap();
        let ws = Workspace::create(out.path(), "Chapter 1.5").unwrap();
        stage_jpeg(&ws, 0, 12);

        let err = assemble("Chapter 1.5", &ws, &[0], out.path()).unwrap_err();

        assert_eq!(err.kind(), "document");
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read(out.path().join("Chapter 15.pdf")).unwrap(), b"earlier");
        // Only the earlier file and the untouched workspace remain; no temporary file.
        let mut names: Vec<String> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Chapter 15", "Chapter 15.pdf"]);
    }

    #[test]
    fn test_zero_pages_still_written() {
        let out = tempfile::tempdir().unwrap();
        let ws = Workspace::create(out.path(), "Chapter 0").unwrap();
        let doc = assemble("Chapter 0", &ws, &[0, 1], out.path()).unwrap();
        assert_eq!(doc.pages, 0);
        assert!(doc.path.is_file());
        assert!(PdfDocument::load(&doc.path).unwrap().get_pages().is_empty());
    }
}

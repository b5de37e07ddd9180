use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::error::SplitError;
use crate::processor::{PageSource, RasterPage};

/// Renders single PDF pages to encoded images.
pub trait Rasterizer: Send + Sync {
    /// Renders page `page` (1-based) at `dpi` and returns encoded image bytes.
    fn rasterize(&self, pdf_path: &Path, page: usize, dpi: u32) -> Result<Vec<u8>, SplitError>;

    /// Page count for documents that `lopdf` cannot parse.
    fn page_count(&self, pdf_path: &Path) -> Result<usize, SplitError>;
}

pub struct PdfSplitter {
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
}

impl PdfSplitter {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, dpi: u32) -> Self {
        Self { rasterizer, dpi }
    }

    pub fn split(&self, path: &Path) -> Result<PageSource, SplitError> {
        let _span = tracing::info_span!("splitter.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| SplitError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let page_count = match lopdf::Document::load_mem(&pdf_bytes) {
            Ok(doc) => doc.get_pages().len(),
            Err(e) => {
                // lopdf rejects some damaged cross-reference tables that poppler still reads.
                tracing::warn!(
                    "lopdf failed to parse {}: {}. Asking the rasterizer for a page count.",
                    crate::sanitize::redact_path(path),
                    e
                );
                self.rasterizer.page_count(path).map_err(|fallback| {
                    SplitError::Corrupt(format!(
                        "Failed to load PDF: {}. Fallback page count failed: {}",
                        e, fallback
                    ))
                })?
            }
        };

        let pages = PdfPages {
            path: path.to_path_buf(),
            rasterizer: Arc::clone(&self.rasterizer),
            dpi: self.dpi,
            next_page: 1,
            page_count,
        };

        Ok(PageSource::new(page_count, Box::new(pages)))
    }
}

/// Rasterizes one page per `next()` call, so pages are rendered only as
/// fast as the recognizer consumes them.
struct PdfPages {
    path: PathBuf,
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
    next_page: usize,
    page_count: usize,
}

impl Iterator for PdfPages {
    type Item = RasterPage;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_page > self.page_count {
            return None;
        }

        let index = self.next_page;
        self.next_page += 1;

        let image = self.rasterizer.rasterize(&self.path, index, self.dpi);
        if let Err(ref e) = image {
            tracing::warn!(page = index, "page rasterization failed: {}", e);
        }

        Some(RasterPage { index, image })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.page_count + 1).saturating_sub(self.next_page);
        (remaining, Some(remaining))
    }
}

/// Rasterizer backed by the poppler command-line tools (`pdftoppm`, `pdfinfo`).
#[derive(Debug, Default, Clone)]
pub struct PopplerRasterizer;

impl PopplerRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for PopplerRasterizer {
    fn rasterize(&self, pdf_path: &Path, page: usize, dpi: u32) -> Result<Vec<u8>, SplitError> {
        let output = pdftoppm_command(pdf_path, page, dpi)
            .output()
            .map_err(|e| SplitError::Rasterize {
                page,
                reason: format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ),
            })?;

        if !output.status.success() {
            return Err(SplitError::Rasterize {
                page,
                reason: format!("pdftoppm failed: {}", String::from_utf8_lossy(&output.stderr)),
            });
        }

        if output.stdout.is_empty() {
            return Err(SplitError::Rasterize {
                page,
                reason: "pdftoppm produced no image".to_string(),
            });
        }

        Ok(output.stdout)
    }

    fn page_count(&self, pdf_path: &Path) -> Result<usize, SplitError> {
        let output = Command::new("pdfinfo").arg(pdf_path).output().map_err(|e| {
            SplitError::Corrupt(format!(
                "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

        if !output.status.success() {
            return Err(SplitError::Corrupt(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| SplitError::Corrupt("pdfinfo reported no page count".to_string()))
    }
}

/// Renders a single page as PNG to stdout; nothing is written to disk.
fn pdftoppm_command(pdf_path: &Path, page: usize, dpi: u32) -> Command {
    let mut command = Command::new("pdftoppm");
    command
        .arg("-png")
        .arg("-singlefile")
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-f")
        .arg(page.to_string())
        .arg("-l")
        .arg(page.to_string())
        .arg(pdf_path)
        .arg("-");
    command
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Renders `page-N` as the "image" and fails on the listed pages.
    struct ScriptedRasterizer {
        failing_pages: Vec<usize>,
        rendered: Mutex<Vec<usize>>,
    }

    impl ScriptedRasterizer {
        fn new(failing_pages: Vec<usize>) -> Self {
            Self {
                failing_pages,
                rendered: Mutex::new(Vec::new()),
            }
        }
    }

    impl Rasterizer for ScriptedRasterizer {
        fn rasterize(&self, _: &Path, page: usize, _: u32) -> Result<Vec<u8>, SplitError> {
            self.rendered.lock().unwrap().push(page);
            if self.failing_pages.contains(&page) {
                return Err(SplitError::Rasterize {
                    page,
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(format!("page-{}", page).into_bytes())
        }

        fn page_count(&self, _: &Path) -> Result<usize, SplitError> {
            Err(SplitError::Corrupt("no fallback in tests".to_string()))
        }
    }

    fn blank_pdf(pages: usize) -> NamedTempFile {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                });
                page_id.into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), &bytes).unwrap();
        file
    }

    #[test]
    fn test_pages_come_out_in_order() {
        let file = blank_pdf(3);
        let splitter = PdfSplitter::new(Arc::new(ScriptedRasterizer::new(vec![])), 250);

        let source = splitter.split(file.path()).unwrap();
        assert_eq!(source.page_count(), 3);

        let pages: Vec<RasterPage> = source.collect();
        let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(pages[1].image.as_ref().unwrap(), b"page-2");
    }

    #[test]
    fn test_rasterization_failure_is_page_local() {
        let file = blank_pdf(3);
        let splitter = PdfSplitter::new(Arc::new(ScriptedRasterizer::new(vec![2])), 250);

        let pages: Vec<RasterPage> = splitter.split(file.path()).unwrap().collect();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].image.is_ok());
        assert!(matches!(
            pages[1].image,
            Err(SplitError::Rasterize { page: 2, .. })
        ));
        assert!(pages[2].image.is_ok());
    }

    #[test]
    fn test_pages_are_rendered_lazily() {
        let file = blank_pdf(4);
        let rasterizer = Arc::new(ScriptedRasterizer::new(vec![]));
        let splitter = PdfSplitter::new(Arc::clone(&rasterizer) as Arc<dyn Rasterizer>, 250);

        let mut source = splitter.split(file.path()).unwrap();
        assert!(rasterizer.rendered.lock().unwrap().is_empty());

        source.next();
        assert_eq!(*rasterizer.rendered.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_corrupted_pdf_fails_whole_file() {
        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), b"not a valid pdf content").unwrap();

        let splitter = PdfSplitter::new(Arc::new(ScriptedRasterizer::new(vec![])), 250);
        match splitter.split(file.path()) {
            Err(SplitError::Corrupt(msg)) => {
                assert!(msg.contains("Failed to load PDF"), "unexpected message: {}", msg);
            }
            _ => panic!("Expected Corrupt error"),
        }
    }

    #[test]
    fn test_pdf_file_not_found_error() {
        let splitter = PdfSplitter::new(Arc::new(ScriptedRasterizer::new(vec![])), 250);
        let result = splitter.split(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(SplitError::ReadDocument { .. })));
    }

    #[test]
    fn test_pdftoppm_writes_page_to_stdout() {
        let command = pdftoppm_command(Path::new("/data/sessions/ab/uploads/b1/scan.pdf"), 3, 250);
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-png",
                "-singlefile",
                "-r",
                "250",
                "-f",
                "3",
                "-l",
                "3",
                "/data/sessions/ab/uploads/b1/scan.pdf",
                "-",
            ]
        );
    }

    #[test]
    fn test_parse_pdfinfo_pages() {
        let stdout = "Producer:       LibreOffice\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(stdout), Some(12));
        assert_eq!(parse_pdfinfo_pages("Title: nothing here"), None);
    }
}

use crate::config::{OcrSettings, Settings};
use crate::error::ExtractError;
use crate::models::{DocumentKind, ExtractionMethod, ExtractionNotice};
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Text of one document, pages sorted ascending by number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub name: String,
    pub path: PathBuf,
    pub pages: Vec<PageText>,
    pub method: ExtractionMethod,
    pub notice: Option<ExtractionNotice>,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError>;
}

pub trait OcrEngine {
    fn recognize_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError>;
}

/// Page-preserving text-layer extraction.
#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
        let document =
            Document::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.is_empty() {
            return Err(ExtractError::PdfParse(format!(
                "pdf has no pages: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Lower-fidelity backend: the whole document becomes page 1.
#[derive(Default)]
pub struct WholeDocumentPdfExtractor;

impl PdfExtractor for WholeDocumentPdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
        let bytes = std::fs::read(path)?;

        // pdf-extract panics on some malformed inputs.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
            .map_err(|_| ExtractError::PdfParse("pdf-extract panicked".to_string()))?
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        Ok(vec![PageText { number: 1, text }])
    }
}

/// Rasterizes with poppler's `pdftoppm` and recognizes each page with `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    settings: OcrSettings,
}

impl TesseractOcr {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    fn pdftoppm(&self) -> PathBuf {
        match &self.settings.poppler_path {
            Some(dir) => dir.join("pdftoppm"),
            None => PathBuf::from("pdftoppm"),
        }
    }

    fn rasterize(&self, pdf: &Path, workdir: &Path) -> Result<Vec<(u32, PathBuf)>, ExtractError> {
        let prefix = workdir.join("page");
        let program = self.pdftoppm();
        let mut command = Command::new(&program);
        command
            .arg("-r")
            .arg(self.settings.dpi.to_string())
            .arg("-jpeg")
            .arg(pdf)
            .arg(&prefix);
        run_tool(&program.to_string_lossy(), &mut command)?;

        let mut images = std::fs::read_dir(workdir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let number = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(page_number_from_image)?;
                Some((number, path))
            })
            .collect::<Vec<_>>();

        images.sort_by_key(|(number, _)| *number);
        Ok(images)
    }

    fn recognize(&self, image: &Path) -> Result<String, ExtractError> {
        let mut command = Command::new(&self.settings.tesseract_cmd);
        command
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.settings.languages);
        run_tool(&self.settings.tesseract_cmd, &mut command)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
        // Removed with every image on drop, whichever way this returns.
        let workdir = tempfile::Builder::new()
            .prefix("smart-finder-ocr-")
            .tempdir()?;

        let images = self.rasterize(path, workdir.path())?;
        if images.is_empty() {
            return Err(ExtractError::OcrFailed(format!(
                "no page images produced for {}",
                path.display()
            )));
        }

        let pages = images
            .into_iter()
            .map(|(number, image)| {
                let text = self.recognize(&image).unwrap_or_else(|error| {
                    warn!(page = number, %error, "ocr failed for page");
                    String::new()
                });
                PageText { number, text }
            })
            .collect();

        Ok(pages)
    }
}

/// `page-7.jpg` / `page-007.jpg` -> 7
fn page_number_from_image(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(".jpg")?;
    let (_, digits) = stem.rsplit_once('-')?;
    digits.parse().ok()
}

fn run_tool(program: &str, command: &mut Command) -> Result<String, ExtractError> {
    let output = command.output().map_err(|error| ExtractError::Tool {
        program: program.to_string(),
        details: error.to_string(),
    })?;

    if !output.status.success() {
        return Err(ExtractError::Tool {
            program: program.to_string(),
            details: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub struct TextExtractor<P = LopdfExtractor, O = TesseractOcr> {
    pdf: P,
    ocr: O,
}

impl TextExtractor {
    pub fn new(settings: &Settings) -> Self {
        Self::with_backends(LopdfExtractor, TesseractOcr::new(&settings.ocr))
    }
}

impl<P, O> TextExtractor<P, O>
where
    P: PdfExtractor,
    O: OcrEngine,
{
    pub fn with_backends(pdf: P, ocr: O) -> Self {
        Self { pdf, ocr }
    }

    /// Uses the file's own extension as the declared type.
    pub fn extract_path(&self, path: &Path) -> ExtractedDocument {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        self.extract(path, extension)
    }

    /// Never fails: unreadable or unsupported input yields one empty page and a notice.
    pub fn extract(&self, path: &Path, declared_extension: &str) -> ExtractedDocument {
        let name = document_name(path);
        let kind = DocumentKind::from_extension(declared_extension);
        debug!(document = %name, ?kind, "extracting text");

        let extracted = match kind {
            DocumentKind::Docx => extract_docx(path).map(|pages| (pages, ExtractionMethod::Docx)),
            DocumentKind::Pdf => self.extract_pdf(path),
            DocumentKind::Unsupported => {
                warn!(document = %name, "unsupported file format");
                return ExtractedDocument {
                    name,
                    path: path.to_path_buf(),
                    pages: empty_page(),
                    method: ExtractionMethod::None,
                    notice: Some(ExtractionNotice::UnsupportedFormat {
                        extension: declared_extension.to_string(),
                    }),
                };
            }
        };

        let (pages, method) = match extracted {
            Ok(extracted) => extracted,
            Err(error) => {
                warn!(document = %name, %error, "document could not be read");
                return ExtractedDocument {
                    name,
                    path: path.to_path_buf(),
                    pages: empty_page(),
                    method: ExtractionMethod::None,
                    notice: Some(ExtractionNotice::Unreadable {
                        reason: error.to_string(),
                    }),
                };
            }
        };

        if kind == DocumentKind::Pdf && pages.iter().all(|page| page.text.trim().is_empty()) {
            info!(document = %name, "no text layer found, falling back to ocr");
            return match self.ocr.recognize_pages(path) {
                Ok(ocr_pages) => ExtractedDocument {
                    name,
                    path: path.to_path_buf(),
                    pages: ocr_pages,
                    method: ExtractionMethod::Ocr,
                    notice: Some(ExtractionNotice::OcrFallback),
                },
                Err(error) => {
                    warn!(document = %name, %error, "ocr fallback failed");
                    ExtractedDocument {
                        name,
                        path: path.to_path_buf(),
                        pages,
                        method,
                        notice: Some(ExtractionNotice::OcrFailed {
                            reason: error.to_string(),
                        }),
                    }
                }
            };
        }

        ExtractedDocument {
            name,
            path: path.to_path_buf(),
            pages,
            method,
            notice: None,
        }
    }

    fn extract_pdf(&self, path: &Path) -> Result<(Vec<PageText>, ExtractionMethod), ExtractError> {
        match self.pdf.extract_pages(path) {
            Ok(pages) => Ok((pages, ExtractionMethod::PdfTextLayer)),
            Err(primary_error) => {
                debug!(%primary_error, "page extraction failed, reading the whole document");
                WholeDocumentPdfExtractor
                    .extract_pages(path)
                    .map(|pages| (pages, ExtractionMethod::PdfWholeDocument))
                    .map_err(|fallback_error| {
                        ExtractError::PdfParse(format!(
                            "{primary_error}; whole-document fallback failed: {fallback_error}"
                        ))
                    })
            }
        }
    }
}

/// The whole document is page 1; paragraphs are joined with newlines.
pub fn extract_docx(path: &Path) -> Result<Vec<PageText>, ExtractError> {
    let bytes = std::fs::read(path)?;
    let docx =
        docx_rs::read_docx(&bytes).map_err(|error| ExtractError::DocxParse(error.to_string()))?;

    let text = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(vec![PageText { number: 1, text }])
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_children_text(&paragraph.children, &mut text);
    text
}

// Hyperlinks nest their own runs.
fn push_children_text(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children_text(&link.children, text),
            _ => {}
        }
    }
}

pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn empty_page() -> Vec<PageText> {
    vec![PageText {
        number: 1,
        text: String::new(),
    }]
}

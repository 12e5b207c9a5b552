use crate::context::assemble_context;
use crate::extractor::{OcrEngine, PdfExtractor, TextExtractor};
use crate::matcher::find_matches;
use crate::models::{DocumentKind, DocumentMatches, DocumentNotice};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files are kept in the given order; folders are walked for `.pdf`/`.docx` files.
pub fn discover_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();

    for path in paths {
        if !path.is_dir() {
            documents.push(path.clone());
            continue;
        }

        let mut found = WalkDir::new(path)
            .into_iter()
            .filter_map(|item| item.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|candidate| is_supported(candidate))
            .collect::<Vec<_>>();

        found.sort_unstable();
        debug!(folder = %path.display(), count = found.len(), "discovered documents");
        documents.extend(found);
    }

    documents
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(DocumentKind::from_extension)
        .is_some_and(|kind| kind != DocumentKind::Unsupported)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Only documents with at least one match, in input order.
    pub documents: Vec<DocumentMatches>,
    pub notices: Vec<DocumentNotice>,
    pub scanned: usize,
}

impl ScanReport {
    pub fn context(&self) -> String {
        assemble_context(&self.documents)
    }

    pub fn total_matches(&self) -> usize {
        self.documents
            .iter()
            .map(|document| document.matches.len())
            .sum()
    }
}

/// Extracts and matches every document; problems become notices, never errors.
pub fn scan_documents<P, O>(
    extractor: &TextExtractor<P, O>,
    documents: &[PathBuf],
    keyword: &str,
) -> ScanReport
where
    P: PdfExtractor,
    O: OcrEngine,
{
    let mut report = ScanReport::default();

    for path in documents {
        let extracted = extractor.extract_path(path);
        report.scanned += 1;

        if let Some(notice) = extracted.notice.clone() {
            warn!(document = %extracted.name, %notice, "document notice");
            report.notices.push(DocumentNotice {
                document: extracted.name.clone(),
                path: extracted.path.clone(),
                notice,
            });
        }

        let matches = find_matches(keyword, &extracted.pages);
        debug!(
            document = %extracted.name,
            pages = extracted.pages.len(),
            matches = matches.len(),
            "scanned document"
        );

        if !matches.is_empty() {
            report.documents.push(DocumentMatches {
                document: extracted.name,
                matches,
            });
        }
    }

    report
}

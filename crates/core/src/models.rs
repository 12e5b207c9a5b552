use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// First keyword occurrence on one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Match {
    pub page: u32,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMatches {
    pub document: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Unsupported,
}

impl DocumentKind {
    /// Accepts `pdf`, `.PDF`, `docx`, ... in any case.
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim().trim_start_matches('.');
        if extension.eq_ignore_ascii_case("pdf") {
            DocumentKind::Pdf
        } else if extension.eq_ignore_ascii_case("docx") {
            DocumentKind::Docx
        } else {
            DocumentKind::Unsupported
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExtractionMethod {
    Docx,
    PdfTextLayer,
    PdfWholeDocument,
    Ocr,
    None,
}

/// Non-fatal conditions raised while reading a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionNotice {
    UnsupportedFormat { extension: String },
    Unreadable { reason: String },
    OcrFallback,
    OcrFailed { reason: String },
}

impl std::fmt::Display for ExtractionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionNotice::UnsupportedFormat { extension } => {
                write!(f, "unsupported file format: {extension:?}")
            }
            ExtractionNotice::Unreadable { reason } => write!(f, "unreadable document: {reason}"),
            ExtractionNotice::OcrFallback => {
                write!(f, "no text layer found, text was recognized with OCR")
            }
            ExtractionNotice::OcrFailed { reason } => {
                write!(f, "no text layer found and OCR failed: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentNotice {
    pub document: String,
    pub path: PathBuf,
    pub notice: ExtractionNotice,
}

/// One related-standard hit from the web search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StandardReference {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

#[derive(Debug)]
pub enum SearchOutcome {
    Unconfigured,
    Failed(SearchError),
    Empty,
    Found(Vec<StandardReference>),
}

impl SearchOutcome {
    pub fn references(&self) -> &[StandardReference] {
        match self {
            SearchOutcome::Found(references) => references,
            _ => &[],
        }
    }

    pub fn is_unconfigured(&self) -> bool {
        matches!(self, SearchOutcome::Unconfigured)
    }
}

pub const ANSWER_UNCONFIGURED_NOTICE: &str =
    "OPENAI_API_KEY is not set, so questions cannot be answered.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnswerOutcome {
    Unconfigured,
    Answered { model: String, text: String },
    Failed { message: String },
}

impl AnswerOutcome {
    /// Text shown to the user for every variant.
    pub fn text(&self) -> &str {
        match self {
            AnswerOutcome::Unconfigured => ANSWER_UNCONFIGURED_NOTICE,
            AnswerOutcome::Answered { text, .. } => text,
            AnswerOutcome::Failed { message } => message,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mode {
    DocumentSearch,
    QuestionAnswering,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_matched_without_case_or_dot() {
        assert_eq!(DocumentKind::from_extension("PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_extension(".docx"), DocumentKind::Docx);
        assert_eq!(DocumentKind::from_extension("doc"), DocumentKind::Unsupported);
        assert_eq!(DocumentKind::from_extension(""), DocumentKind::Unsupported);
    }

    #[test]
    fn answer_text_covers_every_variant() {
        assert_eq!(AnswerOutcome::Unconfigured.text(), ANSWER_UNCONFIGURED_NOTICE);
        assert!(ANSWER_UNCONFIGURED_NOTICE.contains("OPENAI_API_KEY"));
        assert!(!ANSWER_UNCONFIGURED_NOTICE.contains("--"));
        let answered = AnswerOutcome::Answered {
            model: "m".to_string(),
            text: "42".to_string(),
        };
        assert_eq!(answered.text(), "42");
    }
}

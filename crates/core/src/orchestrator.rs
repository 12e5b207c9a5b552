use crate::answer::{AnswerGenerator, ChatBackend, OpenAiChatClient};
use crate::config::Settings;
use crate::error::{AnswerError, SearchError};
use crate::extractor::{LopdfExtractor, OcrEngine, PdfExtractor, TesseractOcr, TextExtractor};
use crate::ingest::{scan_documents, ScanReport};
use crate::models::{AnswerOutcome, Mode, SearchOutcome};
use crate::standards::{SearchBackend, SerpApiClient, StandardsSearch};
use std::path::PathBuf;
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::info;

#[derive(Debug, Clone)]
pub struct FinderRequest {
    pub mode: Mode,
    pub documents: Vec<PathBuf>,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    NoDocuments,
    NoQuery,
}

impl std::fmt::Display for Skipped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skipped::NoDocuments => write!(f, "Provide at least one PDF or DOCX document first."),
            Skipped::NoQuery => write!(f, "Enter a keyword or question."),
        }
    }
}

/// Everything one interaction produced.
#[derive(Debug)]
pub struct FinderReport {
    pub mode: Mode,
    pub query: String,
    pub skipped: Option<Skipped>,
    pub scan: ScanReport,
    pub standards: Option<SearchOutcome>,
    pub answer: Option<AnswerOutcome>,
}

impl FinderReport {
    fn skipped(request: &FinderRequest, reason: Skipped) -> Self {
        Self {
            mode: request.mode,
            query: request.query.clone(),
            skipped: Some(reason),
            scan: ScanReport::default(),
            standards: None,
            answer: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("standards search setup failed: {0}")]
    Search(#[from] SearchError),

    #[error("answer generator setup failed: {0}")]
    Answer(#[from] AnswerError),
}

pub struct FinderCoordinator<
    P = LopdfExtractor,
    O = TesseractOcr,
    S = SerpApiClient,
    C = OpenAiChatClient,
> {
    extractor: TextExtractor<P, O>,
    standards: StandardsSearch<S>,
    answers: AnswerGenerator<C>,
}

impl FinderCoordinator {
    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        Ok(Self::new(
            TextExtractor::new(settings),
            StandardsSearch::from_settings(settings)?,
            AnswerGenerator::from_settings(settings)?,
        ))
    }
}

impl<P, O, S, C> FinderCoordinator<P, O, S, C>
where
    P: PdfExtractor,
    O: OcrEngine,
    S: SearchBackend + Send + Sync,
    C: ChatBackend + Send + Sync,
{
    pub fn new(
        extractor: TextExtractor<P, O>,
        standards: StandardsSearch<S>,
        answers: AnswerGenerator<C>,
    ) -> Self {
        Self {
            extractor,
            standards,
            answers,
        }
    }

    /// One sequential pass: scan, then search or answer depending on the mode.
    pub async fn run(&self, request: &FinderRequest) -> FinderReport {
        if request.documents.is_empty() {
            return FinderReport::skipped(request, Skipped::NoDocuments);
        }
        if request.query.trim().is_empty() {
            return FinderReport::skipped(request, Skipped::NoQuery);
        }

        let scan_all = || scan_documents(&self.extractor, &request.documents, &request.query);
        // block_in_place is only allowed on the multi-threaded scheduler.
        let on_multi_thread = Handle::try_current()
            .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        let scan = if on_multi_thread {
            tokio::task::block_in_place(scan_all)
        } else {
            scan_all()
        };
        info!(
            scanned = scan.scanned,
            matched_documents = scan.documents.len(),
            matches = scan.total_matches(),
            "documents scanned"
        );

        let (standards, answer) = match request.mode {
            Mode::DocumentSearch => (Some(self.standards.search(&request.query).await), None),
            Mode::QuestionAnswering => {
                let context = scan.context();
                (None, Some(self.answers.answer(&request.query, &context).await))
            }
        };

        FinderReport {
            mode: request.mode,
            query: request.query.clone(),
            skipped: None,
            scan,
            standards,
            answer,
        }
    }
}

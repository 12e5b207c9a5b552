pub mod answer;
pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod matcher;
pub mod models;
pub mod orchestrator;
pub mod standards;

pub use answer::{build_messages, AnswerGenerator, ChatBackend, ChatMessage, OpenAiChatClient};
pub use config::{ChatSettings, OcrSettings, SearchSettings, Settings};
pub use context::assemble_context;
pub use error::{AnswerError, ExtractError, SearchError};
pub use extractor::{
    extract_docx, ExtractedDocument, LopdfExtractor, OcrEngine, PageText, PdfExtractor,
    TesseractOcr, TextExtractor, WholeDocumentPdfExtractor,
};
pub use ingest::{discover_documents, scan_documents, ScanReport};
pub use matcher::{find_matches, LOOKAHEAD_CHARS, LOOKBACK_CHARS};
pub use models::{
    AnswerOutcome, DocumentKind, DocumentMatches, DocumentNotice, ExtractionMethod,
    ExtractionNotice, Match, Mode, SearchOutcome, StandardReference,
};
pub use orchestrator::{FinderCoordinator, FinderReport, FinderRequest, SetupError, Skipped};
pub use standards::{SearchBackend, SerpApiClient, StandardsSearch};

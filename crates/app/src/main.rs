use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use smart_finder_core::config::{
    ChatSettings, OcrSettings, SearchSettings, Settings, DEFAULT_CHAT_ENDPOINT,
    DEFAULT_FALLBACK_MODEL, DEFAULT_OCR_LANGUAGES, DEFAULT_PRIMARY_MODEL, DEFAULT_SEARCH_ENDPOINT,
};
use smart_finder_core::{
    discover_documents, AnswerOutcome, FinderCoordinator, FinderReport, FinderRequest, Mode,
    SearchOutcome,
};
use std::fmt::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "smart-finder", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the chat-completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// API key for the standards web search
    #[arg(long, env = "SERPAPI_API_KEY", hide_env_values = true)]
    serpapi_api_key: Option<String>,

    /// Model asked first
    #[arg(long, env = "SMART_FINDER_PRIMARY_MODEL", default_value = DEFAULT_PRIMARY_MODEL)]
    primary_model: String,

    /// Model asked once when the primary model fails
    #[arg(long, env = "SMART_FINDER_FALLBACK_MODEL", default_value = DEFAULT_FALLBACK_MODEL)]
    fallback_model: String,

    /// Disable the fallback model
    #[arg(long, default_value_t = false)]
    no_fallback_model: bool,

    /// Chat-completion endpoint URL
    #[arg(long, env = "SMART_FINDER_CHAT_ENDPOINT", default_value = DEFAULT_CHAT_ENDPOINT)]
    chat_endpoint: String,

    /// Web search endpoint URL
    #[arg(long, env = "SMART_FINDER_SEARCH_ENDPOINT", default_value = DEFAULT_SEARCH_ENDPOINT)]
    search_endpoint: String,

    /// Tesseract executable
    #[arg(long, env = "SMART_FINDER_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Directory holding poppler's pdftoppm
    #[arg(long, env = "SMART_FINDER_POPPLER_PATH")]
    poppler_path: Option<PathBuf>,

    /// Tesseract language models
    #[arg(long, env = "SMART_FINDER_OCR_LANGUAGES", default_value = DEFAULT_OCR_LANGUAGES)]
    ocr_languages: String,

    /// Maximum number of standards references to print.
    #[arg(long, default_value = "10")]
    max_web_results: usize,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Highlight keyword occurrences and look up related standards.
    Search {
        /// PDF/DOCX files or folders that contain them.
        paths: Vec<PathBuf>,
        /// Keyword to look for.
        #[arg(long)]
        keyword: String,
    },
    /// Answer a question from the snippets that match it.
    Ask {
        /// PDF/DOCX files or folders that contain them.
        paths: Vec<PathBuf>,
        /// Question, also used as the keyword that selects the context.
        #[arg(long)]
        question: String,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            chat: ChatSettings {
                endpoint: self.chat_endpoint.clone(),
                primary_model: self.primary_model.clone(),
                fallback_model: if self.no_fallback_model {
                    None
                } else {
                    Some(self.fallback_model.clone())
                },
                ..ChatSettings::default()
            },
            search: SearchSettings {
                endpoint: self.search_endpoint.clone(),
                ..SearchSettings::default()
            },
            ocr: OcrSettings {
                tesseract_cmd: self.tesseract.clone(),
                poppler_path: self.poppler_path.clone(),
                languages: self.ocr_languages.clone(),
                ..OcrSettings::default()
            },
            ..Settings::default()
        }
        .with_credentials(self.openai_api_key.clone(), self.serpapi_api_key.clone())
    }
}

/// Variables already set in the environment win over the file.
fn load_env_file() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(error) if error.not_found() => debug!("no .env file found"),
        Err(error) => warn!(%error, "ignoring unreadable .env file"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    load_env_file();
    let cli = Cli::parse();
    let settings = cli.settings();
    let coordinator = FinderCoordinator::from_settings(&settings)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        search_configured = settings.serpapi_api_key.is_some(),
        answer_configured = settings.openai_api_key.is_some(),
        "smart-finder boot"
    );

    let (mode, paths, query) = match cli.command {
        Command::Search { paths, keyword } => (Mode::DocumentSearch, paths, keyword),
        Command::Ask { paths, question } => (Mode::QuestionAnswering, paths, question),
    };

    let request = FinderRequest {
        mode,
        documents: discover_documents(&paths),
        query,
    };
    info!(documents = request.documents.len(), ?mode, "running");

    let report = coordinator.run(&request).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report_json(&report, cli.max_web_results))?
        );
    } else {
        print!("{}", render_text(&report, cli.max_web_results));
    }

    Ok(())
}

fn render_text(report: &FinderReport, max_web_results: usize) -> String {
    let mut out = String::new();

    if let Some(skipped) = report.skipped {
        let _ = writeln!(out, "{skipped}");
        return out;
    }

    for notice in &report.scan.notices {
        let _ = writeln!(out, "warning: {}: {}", notice.document, notice.notice);
    }

    if report.mode == Mode::DocumentSearch {
        let _ = writeln!(out, "== Document matches ==");
        if report.scan.documents.is_empty() {
            let _ = writeln!(out, "No matches in the documents for this keyword.");
        }
        for document in &report.scan.documents {
            let _ = writeln!(out, "### {}", document.document);
            for found in &document.matches {
                let _ = writeln!(out, "- page {}: ...{}...", found.page, found.snippet);
            }
        }
    }

    if let Some(standards) = &report.standards {
        let _ = writeln!(out, "\n== Related standards ==");
        match standards {
            SearchOutcome::Unconfigured => {
                let _ = writeln!(out, "SERPAPI_API_KEY is not set; web search is skipped.");
            }
            SearchOutcome::Failed(error) => {
                let _ = writeln!(out, "error: web search failed: {error}");
            }
            SearchOutcome::Empty => {
                let _ = writeln!(out, "No related standards found.");
            }
            SearchOutcome::Found(references) => {
                for reference in references.iter().take(max_web_results) {
                    let _ = writeln!(
                        out,
                        "{}\n  {}\n  {}",
                        reference.title, reference.snippet, reference.link
                    );
                }
            }
        }
    }

    if let Some(answer) = &report.answer {
        let _ = writeln!(out, "== Answer ==\n{}", answer.text());
        if matches!(answer, AnswerOutcome::Unconfigured) {
            let _ = writeln!(out, "Set it in the environment, a .env file or --openai-api-key.");
        }
    }

    out
}

fn report_json(report: &FinderReport, max_web_results: usize) -> Value {
    let standards = report.standards.as_ref().map(|outcome| match outcome {
        SearchOutcome::Unconfigured => json!({ "status": "unconfigured" }),
        SearchOutcome::Failed(error) => json!({ "status": "failed", "error": error.to_string() }),
        SearchOutcome::Empty => json!({ "status": "empty", "results": [] }),
        SearchOutcome::Found(references) => json!({
            "status": "found",
            "results": references.iter().take(max_web_results).collect::<Vec<_>>(),
        }),
    });

    let answer = report.answer.as_ref().map(|outcome| match outcome {
        AnswerOutcome::Unconfigured => json!({ "status": "unconfigured", "text": outcome.text() }),
        AnswerOutcome::Answered { model, .. } => {
            json!({ "status": "answered", "model": model, "text": outcome.text() })
        }
        AnswerOutcome::Failed { .. } => json!({ "status": "failed", "text": outcome.text() }),
    });

    json!({
        "mode": report.mode,
        "query": report.query,
        "skipped": report.skipped.map(|skipped| skipped.to_string()),
        "matches": report.scan.documents,
        "notices": report.scan.notices,
        "context": report.scan.context(),
        "standards": standards,
        "answer": answer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use smart_finder_core::models::ANSWER_UNCONFIGURED_NOTICE;
    use smart_finder_core::{DocumentMatches, Match, ScanReport, Skipped, StandardReference};
    use std::fs;
    use tempfile::tempdir;

    fn search_report(standards: SearchOutcome) -> FinderReport {
        FinderReport {
            mode: Mode::DocumentSearch,
            query: "gateway".to_string(),
            skipped: None,
            scan: ScanReport {
                documents: vec![DocumentMatches {
                    document: "manual.pdf".to_string(),
                    matches: vec![Match {
                        page: 3,
                        snippet: "SCADA gateway".to_string(),
                    }],
                }],
                notices: Vec::new(),
                scanned: 1,
            },
            standards: Some(standards),
            answer: None,
        }
    }

    fn reference(n: usize) -> StandardReference {
        StandardReference {
            title: format!("Standard {n}"),
            snippet: String::new(),
            link: format!("https://iec.ch/{n}"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fallback_can_be_disabled() {
        let cli = Cli::try_parse_from([
            "smart-finder",
            "--no-fallback-model",
            "ask",
            "a.pdf",
            "--question",
            "what?",
        ])
        .expect("arguments should parse");
        assert_eq!(cli.settings().chat.fallback_model, None);
    }

    #[test]
    fn text_output_lists_matches_and_caps_references() {
        let references = (1..=12).map(reference).collect();
        let text = render_text(&search_report(SearchOutcome::Found(references)), 10);

        assert!(text.contains("### manual.pdf\n- page 3: ...SCADA gateway...\n"));
        assert!(text.contains("https://iec.ch/10"));
        assert!(!text.contains("https://iec.ch/11"));
    }

    #[test]
    fn unconfigured_search_is_an_informational_line() {
        let text = render_text(&search_report(SearchOutcome::Unconfigured), 10);
        assert!(text.contains("SERPAPI_API_KEY is not set"));
    }

    #[test]
    fn skipped_run_prints_only_the_reason() {
        let report = FinderReport {
            mode: Mode::QuestionAnswering,
            query: String::new(),
            skipped: Some(Skipped::NoQuery),
            scan: ScanReport::default(),
            standards: None,
            answer: None,
        };
        assert_eq!(render_text(&report, 10), format!("{}\n", Skipped::NoQuery));
    }

    #[test]
    fn json_report_carries_context_and_answer() {
        let mut report = search_report(SearchOutcome::Empty);
        report.mode = Mode::QuestionAnswering;
        report.standards = None;
        report.answer = Some(AnswerOutcome::Unconfigured);

        let value = report_json(&report, 10);

        assert_eq!(value["mode"], "QuestionAnswering");
        assert_eq!(value["context"], "manual.pdf, page 3: SCADA gateway\n");
        assert_eq!(value["answer"]["status"], "unconfigured");
        assert_eq!(value["answer"]["text"], ANSWER_UNCONFIGURED_NOTICE);
        assert!(value["standards"].is_null());
    }

    #[test]
    fn json_answer_names_the_model_that_answered() {
        let mut report = search_report(SearchOutcome::Empty);
        report.answer = Some(AnswerOutcome::Answered {
            model: "gpt-4o-mini".to_string(),
            text: "It polls RTUs.".to_string(),
        });

        let value = report_json(&report, 10);

        assert_eq!(value["answer"]["status"], "answered");
        assert_eq!(value["answer"]["model"], "gpt-4o-mini");
        assert_eq!(value["answer"]["text"], "It polls RTUs.");
    }

    #[test]
    fn unconfigured_answer_hints_at_every_credential_source() {
        let mut report = search_report(SearchOutcome::Empty);
        report.mode = Mode::QuestionAnswering;
        report.standards = None;
        report.answer = Some(AnswerOutcome::Unconfigured);

        let text = render_text(&report, 10);

        assert!(text.contains(ANSWER_UNCONFIGURED_NOTICE));
        assert!(text.contains(".env"));
        assert!(text.contains("--openai-api-key"));
    }

    #[test]
    fn credentials_are_read_from_a_dotenv_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "OPENAI_API_KEY=sk-from-dotenv\nSERPAPI_API_KEY=\"  \"\n",
        )?;

        dotenvy::from_path_override(&path)?;
        let cli = Cli::try_parse_from(["smart-finder", "search", "a.pdf", "--keyword", "relay"])?;
        let settings = cli.settings();

        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-from-dotenv"));
        assert_eq!(settings.serpapi_api_key, None);
        Ok(())
    }
}

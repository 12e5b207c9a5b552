use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://serpapi.com/search";
pub const DEFAULT_SEARCH_ENGINE: &str = "google";
pub const DEFAULT_PRIMARY_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OCR_LANGUAGES: &str = "ind+eng";
pub const DEFAULT_OCR_DPI: u32 = 300;

/// Process-wide configuration, built once at startup and handed to each adapter.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub serpapi_api_key: Option<String>,
    pub chat: ChatSettings,
    pub search: SearchSettings,
    pub ocr: OcrSettings,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub endpoint: String,
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: Some(DEFAULT_FALLBACK_MODEL.to_string()),
            max_tokens: 300,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub endpoint: String,
    pub engine: String,
    pub timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            engine: DEFAULT_SEARCH_ENGINE.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub tesseract_cmd: String,
    /// Directory holding `pdftoppm`; `None` resolves it from `PATH`.
    pub poppler_path: Option<PathBuf>,
    pub languages: String,
    pub dpi: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_cmd: "tesseract".to_string(),
            poppler_path: None,
            languages: DEFAULT_OCR_LANGUAGES.to_string(),
            dpi: DEFAULT_OCR_DPI,
        }
    }
}

impl Settings {
    /// Applies the credentials, dropping blank values.
    pub fn with_credentials(
        mut self,
        openai_api_key: Option<String>,
        serpapi_api_key: Option<String>,
    ) -> Self {
        self.openai_api_key = non_blank(openai_api_key);
        self.serpapi_api_key = non_blank(serpapi_api_key);
        self
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

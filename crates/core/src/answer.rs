//! Grounded question answering against an OpenAI-compatible chat endpoint.
//!
//! The generator tries the primary model first and, when that fails for any
//! reason, the fallback model once. Failures are folded into
//! [`AnswerOutcome::Failed`] so a bad upstream never ends the interaction.

use crate::config::Settings;
use crate::error::AnswerError;
use crate::models::AnswerOutcome;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

pub const SYSTEM_PROMPT: &str =
    "You are an assistant that answers questions using only the technical documents provided.";

const FEW_SHOT_EXAMPLES: &str = "\
Here are some example questions and answers about the documents:

Example 1:
Question: What is SCADA?
Answer: SCADA (Supervisory Control and Data Acquisition) is a system used to supervise and control industrial processes remotely.

Example 2:
Question: What does a SCADA gateway do?
Answer: A SCADA gateway connects the SCADA system with other devices and keeps communication between the devices and the server running smoothly.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "{FEW_SHOT_EXAMPLES}\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n\n\
         Answer (use only the information in the context above; if it is not there, say it was not found):\n"
    )
}

pub fn build_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", SYSTEM_PROMPT),
        ChatMessage::new("user", build_prompt(question, context)),
    ]
}

#[async_trait]
pub trait ChatBackend {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, AnswerError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

pub struct OpenAiChatClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChatClient {
    pub fn new(settings: &Settings, api_key: impl Into<String>) -> Result<Self, AnswerError> {
        Ok(Self {
            client: Client::builder().timeout(settings.chat.timeout).build()?,
            endpoint: Url::parse(&settings.chat.endpoint)?,
            api_key: api_key.into(),
            max_tokens: settings.chat.max_tokens,
            temperature: settings.chat.temperature,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, AnswerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model,
                messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_completion(model, status, &body)
    }
}

fn parse_completion(model: &str, status: StatusCode, body: &str) -> Result<String, AnswerError> {
    let parsed = serde_json::from_str::<ChatResponse>(body);

    if let Ok(ChatResponse {
        error: Some(ApiError {
            message: Some(message),
        }),
        ..
    }) = &parsed
    {
        return Err(AnswerError::Api {
            model: model.to_string(),
            message: message.clone(),
        });
    }

    if !status.is_success() {
        return Err(AnswerError::Status {
            model: model.to_string(),
            status: status.as_u16(),
            details: body.chars().take(500).collect(),
        });
    }

    parsed?
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| AnswerError::EmptyAnswer {
            model: model.to_string(),
        })
}

pub struct AnswerGenerator<C = OpenAiChatClient> {
    backend: Option<C>,
    primary_model: String,
    fallback_model: Option<String>,
}

impl AnswerGenerator {
    pub fn from_settings(settings: &Settings) -> Result<Self, AnswerError> {
        let backend = settings
            .openai_api_key
            .as_deref()
            .map(|key| OpenAiChatClient::new(settings, key))
            .transpose()?;

        Ok(Self::new(
            backend,
            settings.chat.primary_model.clone(),
            settings.chat.fallback_model.clone(),
        ))
    }
}

impl<C> AnswerGenerator<C>
where
    C: ChatBackend + Send + Sync,
{
    pub fn new(
        backend: Option<C>,
        primary_model: impl Into<String>,
        fallback_model: Option<String>,
    ) -> Self {
        Self {
            backend,
            primary_model: primary_model.into(),
            fallback_model,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn model_chain(&self) -> Vec<&str> {
        let mut chain = vec![self.primary_model.as_str()];
        if let Some(fallback) = self.fallback_model.as_deref() {
            if fallback != self.primary_model {
                chain.push(fallback);
            }
        }
        chain
    }

    /// The context is sent as-is, however long it is.
    pub async fn answer(&self, question: &str, context: &str) -> AnswerOutcome {
        let Some(backend) = &self.backend else {
            info!("llm api key not configured, skipping answer generation");
            return AnswerOutcome::Unconfigured;
        };

        let messages = build_messages(question, context);
        let mut last_error = None;

        for model in self.model_chain() {
            debug!(model, context_chars = context.len(), "requesting answer");
            match backend.complete(model, &messages).await {
                Ok(text) => {
                    return AnswerOutcome::Answered {
                        model: model.to_string(),
                        text,
                    }
                }
                Err(error) => {
                    warn!(model, %error, "answer generation failed");
                    last_error = Some(error);
                }
            }
        }

        let reason = last_error
            .map(|error| error.to_string())
            .unwrap_or_else(|| "no model configured".to_string());
        AnswerOutcome::Failed {
            message: format!("An error occurred while generating the answer: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeChat {
        answers: HashMap<String, Result<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatBackend for FakeChat {
        async fn complete(
            &self,
            model: &str,
            _messages: &[ChatMessage],
        ) -> Result<String, AnswerError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(model.to_string());
            }
            match self.answers.get(model) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(message)) => Err(AnswerError::Api {
                    model: model.to_string(),
                    message: message.clone(),
                }),
                None => Err(AnswerError::EmptyAnswer {
                    model: model.to_string(),
                }),
            }
        }
    }

    fn calls(generator: &AnswerGenerator<FakeChat>) -> Vec<String> {
        generator
            .backend
            .as_ref()
            .and_then(|backend| backend.calls.lock().ok().map(|calls| calls.clone()))
            .unwrap_or_default()
    }

    #[test]
    fn prompt_embeds_examples_context_and_question() {
        let messages = build_messages("What is a gateway?", "a.pdf, page 1: gateway text\n");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("Question: What is SCADA?"));
        assert!(messages[1].content.contains("Context:\na.pdf, page 1: gateway text\n"));
        assert!(messages[1].content.contains("Question:\nWhat is a gateway?"));
    }

    #[test]
    fn request_body_uses_chat_completion_shape() -> Result<(), serde_json::Error> {
        let messages = build_messages("q", "c");
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            max_tokens: 300,
            temperature: 0.25,
        })?;

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["temperature"], 0.25);
        assert_eq!(body["messages"][0]["role"], "system");
        Ok(())
    }

    #[test]
    fn completion_content_is_trimmed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  A gateway links devices. \n"}}]}"#;
        let text = parse_completion("m", StatusCode::OK, body).expect("valid completion");
        assert_eq!(text, "A gateway links devices.");
    }

    #[test]
    fn api_error_message_is_surfaced() {
        let body = r#"{"error":{"message":"model deprecated","type":"invalid_request_error"}}"#;
        let error = parse_completion("old-model", StatusCode::NOT_FOUND, body);
        assert!(matches!(
            error,
            Err(AnswerError::Api { ref message, .. }) if message == "model deprecated"
        ));
    }

    #[test]
    fn http_failure_without_error_body_reports_status() {
        let error = parse_completion("m", StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(error, Err(AnswerError::Status { status: 502, .. })));
    }

    #[test]
    fn malformed_or_empty_bodies_are_errors() {
        assert!(matches!(
            parse_completion("m", StatusCode::OK, "not json"),
            Err(AnswerError::Serialization(_))
        ));
        assert!(matches!(
            parse_completion("m", StatusCode::OK, r#"{"choices":[]}"#),
            Err(AnswerError::EmptyAnswer { .. })
        ));
    }

    #[tokio::test]
    async fn missing_credential_returns_notice() {
        let generator = AnswerGenerator::from_settings(&Settings::default())
            .expect("building without a key should not fail");
        assert!(!generator.is_configured());

        let outcome = generator.answer("What is SCADA?", "").await;
        assert_eq!(outcome, AnswerOutcome::Unconfigured);
        assert!(outcome.text().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn primary_answer_skips_fallback() {
        let mut chat = FakeChat::default();
        chat.answers
            .insert("primary".to_string(), Ok("from primary".to_string()));
        let generator = AnswerGenerator::new(Some(chat), "primary", Some("secondary".to_string()));

        let outcome = generator.answer("q", "c").await;

        assert_eq!(outcome.text(), "from primary");
        assert_eq!(calls(&generator), vec!["primary"]);
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_secondary() {
        let mut chat = FakeChat::default();
        chat.answers
            .insert("primary".to_string(), Err("overloaded".to_string()));
        chat.answers
            .insert("secondary".to_string(), Ok("from secondary".to_string()));
        let generator = AnswerGenerator::new(Some(chat), "primary", Some("secondary".to_string()));

        let outcome = generator.answer("q", "c").await;

        assert_eq!(
            outcome,
            AnswerOutcome::Answered {
                model: "secondary".to_string(),
                text: "from secondary".to_string(),
            }
        );
        assert_eq!(calls(&generator), vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn both_models_failing_returns_description() {
        let mut chat = FakeChat::default();
        chat.answers
            .insert("primary".to_string(), Err("removed".to_string()));
        chat.answers
            .insert("secondary".to_string(), Err("also removed".to_string()));
        let generator = AnswerGenerator::new(Some(chat), "primary", Some("secondary".to_string()));

        let outcome = generator.answer("q", "c").await;

        match outcome {
            AnswerOutcome::Failed { message } => assert!(message.contains("also removed")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn without_fallback_only_primary_is_tried() {
        let generator =
            AnswerGenerator::new(Some(FakeChat::default()), "primary", None::<String>);

        let outcome = generator.answer("q", "c").await;

        assert!(matches!(outcome, AnswerOutcome::Failed { .. }));
        assert_eq!(calls(&generator), vec!["primary"]);
    }

    #[tokio::test]
    async fn identical_fallback_is_not_retried() {
        let generator =
            AnswerGenerator::new(Some(FakeChat::default()), "same", Some("same".to_string()));
        generator.answer("q", "c").await;
        assert_eq!(calls(&generator), vec!["same"]);
    }
}

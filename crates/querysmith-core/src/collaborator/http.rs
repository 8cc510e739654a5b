//! OpenAI-compatible chat-completions collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::domain::CandidateProgram;
use crate::interpreter::ResponsePayload;

use super::{
    prompt, Advisory, AdvisoryReviewer, AnswerRenderer, CodeGenerator, GenerationError,
    GenerationResult,
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

/// Code generator, reviewer, and renderer backed by one chat model.
pub struct ChatCompletionsClient {
    config: ModelConfig,
    entry_point: String,
    http_client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(config: ModelConfig, entry_point: impl Into<String>) -> GenerationResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("querysmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("http client: {e}")))?;

        Ok(Self {
            config,
            entry_point: entry_point.into(),
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn complete(&self, user_prompt: String) -> GenerationResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage::new("system", prompt::system_prompt(&self.entry_point)),
                ChatMessage::new("user", user_prompt),
            ],
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self.http_client.post(self.endpoint()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                GenerationError::Unavailable(format!(
                    "cannot connect to model server at {}",
                    self.config.base_url
                ))
            } else {
                GenerationError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Unavailable(format!(
                "model server returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices in response".into()))?;

        debug!(event = "collaborator.reply", model = %self.config.model, chars = text.len());
        Ok(text)
    }

    async fn complete_program(&self, user_prompt: String) -> GenerationResult<CandidateProgram> {
        let reply = self.complete(user_prompt).await?;
        CandidateProgram::from_model_response(&reply).ok_or(GenerationError::EmptyProgram)
    }
}

#[async_trait]
impl CodeGenerator for ChatCompletionsClient {
    async fn generate_code(
        &self,
        question: &str,
        schema_context: &str,
    ) -> GenerationResult<CandidateProgram> {
        self.complete_program(prompt::generate_prompt(question, schema_context))
            .await
    }

    async fn repair_code(
        &self,
        question: &str,
        failing_program: &CandidateProgram,
        failure_message: &str,
    ) -> GenerationResult<CandidateProgram> {
        self.complete_program(prompt::repair_prompt(
            question,
            failing_program,
            failure_message,
        ))
        .await
    }
}

#[async_trait]
impl AdvisoryReviewer for ChatCompletionsClient {
    async fn review(
        &self,
        question: &str,
        program: &CandidateProgram,
    ) -> GenerationResult<Advisory> {
        let reply = self.complete(prompt::review_prompt(question, program)).await?;
        Ok(Advisory::from_reply(&reply))
    }
}

#[async_trait]
impl AnswerRenderer for ChatCompletionsClient {
    async fn render_answer(
        &self,
        question: &str,
        payload: &ResponsePayload,
    ) -> GenerationResult<String> {
        let user_prompt = match payload {
            ResponsePayload::Answer { .. } => {
                prompt::render_prompt(question, &payload.data_text())
            }
            ResponsePayload::Failure { summary, .. } => {
                prompt::render_failure_prompt(question, summary)
            }
        };
        self.complete(user_prompt).await
    }
}

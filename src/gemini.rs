use anyhow::{anyhow, Context, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPart,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::prompts::Prompts;

/// Generative-AI inference used by the dashboard. Responses are opaque text.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Identify the item in an image and describe its e-waste hazards.
    async fn identify_hazards(&self, image: &[u8], mime: &str) -> Result<String>;

    /// Answer a free-text recycling question.
    async fn answer(&self, question: &str) -> Result<String>;
}

/// Gemini, spoken to through its OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Self {
        // Single attempt per call; rate limits and 5xx surface immediately.
        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(api_base),
        )
        .with_backoff(backoff);
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub fn from_config(app_config: &AppConfig) -> Self {
        Self::new(
            &app_config.gemini_api_key,
            &app_config.gemini_api_base,
            &app_config.gemini_model,
        )
    }

    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .context("Failed to build Gemini request")?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("Gemini request failed")?;

        let content = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No response from Gemini"))?
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("No content in response from Gemini"))?;

        debug!("Gemini responded with {} chars", content.len());
        Ok(content)
    }
}

#[async_trait]
impl Assistant for GeminiClient {
    async fn identify_hazards(&self, image: &[u8], mime: &str) -> Result<String> {
        info!("Sending {} byte {} image to {}", image.len(), mime, self.model);

        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(image));

        let parts: Vec<ChatCompletionRequestMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(Prompts::HAZARD_IDENTIFICATION)
                .build()?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(ImageUrlArgs::default().url(data_url).build()?)
                .build()?
                .into(),
        ];

        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()?
            .into();

        self.complete(vec![message]).await
    }

    async fn answer(&self, question: &str) -> Result<String> {
        info!("Asking {} a {} char question", self.model, question.len());

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(Prompts::ASSISTANT_PREAMBLE)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(question)
                .build()?
                .into(),
        ];

        self.complete(messages).await
    }
}

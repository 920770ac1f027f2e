use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, Role, CreateChatCompletionRequest,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent,
    },
    Client,
};
use async_trait::async_trait;
use crate::config::OpenAiSettings;
use crate::error::ProviderError;
use crate::models::ProviderSlot;
use super::ProviderClient;

const SYSTEM_PROMPT: &str = "You are a careful data analyst. You answer questions about spreadsheet data \
using only the rows and columns you are given, and you say so when the data does not contain the answer.";

/// OpenAI chat completions client. Secondary provider.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings) -> Self {
        let config = OpenAIConfig::new().with_api_key(&settings.api_key);

        Self {
            client: Client::with_config(config),
            model: settings.model.clone(),
        }
    }

    fn build_request(&self, prompt: &str) -> CreateChatCompletionRequest {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: SYSTEM_PROMPT.to_string(),
                    name: None,
                    role: Role::System,
                }
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                    name: None,
                    role: Role::User,
                }
            ),
        ];

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.3),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn slot(&self) -> ProviderSlot {
        ProviderSlot::Secondary
    }

    /// Listing models is free and authenticates the key.
    async fn probe(&self) -> Result<(), ProviderError> {
        self.client.models().list().await?;
        Ok(())
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self.client
            .chat()
            .create(self.build_request(prompt))
            .await?;

        let content = response.choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))?;

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content)
    }
}

use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::error::EngageError;

use super::{
    styles::{parse_generation, CommentStyle},
    Generation,
};

pub fn build_request(model: String, style: CommentStyle, content: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: style.system_prompt(),
            },
            ChatMessage {
                role: "user".into(),
                content: style.user_prompt(content),
            },
        ],
        temperature: style.temperature(),
        max_tokens: style.max_tokens(),
        response_format: ResponseFormat {
            r#type: "json_object".into(),
        },
    }
}

pub async fn parse_response(response: Response) -> Result<Generation, EngageError> {
    let body = response
        .text()
        .await
        .map_err(|err| EngageError::Provider(format!("failed to read response body: {err}")))?;
    parse_completion_body(&body)
}

pub fn parse_completion_body(body: &str) -> Result<Generation, EngageError> {
    let completion: ChatCompletionResponse = serde_json::from_str(body).map_err(|err| {
        EngageError::MalformedResponse(format!("unexpected completion envelope: {err}"))
    })?;
    let choice = completion.choices.into_iter().next().ok_or_else(|| {
        EngageError::MalformedResponse("completion did not contain any choices".into())
    })?;

    let content = choice
        .message
        .and_then(|msg| msg.content)
        .ok_or_else(|| {
            EngageError::MalformedResponse("completion missing message content".into())
        })?;

    parse_generation(&content)
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderErrorBody {
    pub error: Option<ProviderErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderErrorDetail {
    pub message: Option<String>,
}

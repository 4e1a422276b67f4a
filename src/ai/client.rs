use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::{config::ProviderConfig, error::EngageError};

use super::{
    inference::{build_request, parse_response, ProviderErrorBody},
    CommentGenerator, CommentStyle, Generation,
};

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    pub async fn generate_with_key(
        &self,
        content: &str,
        style: CommentStyle,
        api_key: &str,
    ) -> Result<Generation, EngageError> {
        let request = build_request(self.config.model.clone(), style, content);
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| EngageError::Provider(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|error| error.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(EngageError::Provider(format!(
                "API error: {} - {}",
                status.as_u16(),
                detail
            )));
        }

        let generation = parse_response(response).await?;
        tracing::debug!(
            target: "provider",
            style = %style,
            skipped = matches!(generation, Generation::Skip { .. }),
            "generation completed"
        );
        Ok(generation)
    }

    pub fn session(self: &Arc<Self>, api_key: String) -> ProviderSession {
        ProviderSession {
            client: self.clone(),
            api_key,
        }
    }
}

pub struct ProviderSession {
    client: Arc<OpenAiClient>,
    api_key: String,
}

#[async_trait]
impl CommentGenerator for ProviderSession {
    async fn generate(
        &self,
        content: &str,
        style: CommentStyle,
    ) -> Result<Generation, EngageError> {
        self.client
            .generate_with_key(content, style, &self.api_key)
            .await
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use summary_core::config::GenerationConfig;
use summary_core::{SchedulerError, SchedulerResult, SummaryGenerator};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI兼容的 `/chat/completions` 接口客户端
pub struct HttpSummaryGenerator {
    client: reqwest::Client,
    url: String,
    config: GenerationConfig,
}

impl HttpSummaryGenerator {
    pub fn new(config: GenerationConfig) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;
        let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
        Ok(Self {
            client,
            url,
            config,
        })
    }

    fn build_request<'a>(&'a self, content: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
        }
    }

    fn extract_text(response: ChatResponse) -> SchedulerResult<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| SchedulerError::Generation("生成服务返回了空内容".to_string()))
    }
}

#[async_trait]
impl SummaryGenerator for HttpSummaryGenerator {
    async fn generate(&self, content: &str) -> SchedulerResult<String> {
        let mut request = self.client.post(&self.url).json(&self.build_request(content));
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchedulerError::Generation(format!("请求生成服务失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Generation(format!(
                "生成服务返回错误状态 {status}: {body}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| SchedulerError::Generation(format!("解析生成服务响应失败: {e}")))?;

        let text = Self::extract_text(body)?;
        debug!(chars = text.len(), "摘要生成完成");
        Ok(text)
    }
}

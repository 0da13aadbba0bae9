//! Client for a Gemini `generateContent`-compatible REST endpoint.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::core::ChatRole;
use crate::error::ProviderError;
use crate::providers::{AiRequest, CompletionProvider};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: HttpClient,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new<E, M>(endpoint: E, model: M, api_key: Option<String>) -> Self
    where
        E: Into<String>,
        M: Into<String>,
    {
        Self {
            http: HttpClient::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(&config.endpoint, &config.model, config.resolve_api_key())
    }

    fn url(&self, api_key: &str) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            api_key
        )
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, request: &AiRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::MissingCredentials("no Gemini API key configured".into())
        })?;

        let body = GenerateContentRequest::from(request);
        let response = self.http.post(self.url(api_key)).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        extract_text(parsed)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

impl From<&AiRequest> for GenerateContentRequest {
    fn from(request: &AiRequest) -> Self {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|m| Content {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Ai => "model",
                },
                parts: vec![Part { text: m.text.clone() }],
            })
            .collect();
        contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: request.instruction.clone(),
            }],
        });
        Self { contents }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

/// Join the text parts of the first candidate. A candidate with blank text is
/// still an answer; the assistant substitutes its fallback text for it.
fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or(ProviderError::Empty)
}

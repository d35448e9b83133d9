use std::io::{BufRead, BufReader};
use std::sync::mpsc::Sender;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    /// "json" asks the backend for structured output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    pub stream: bool,
    pub options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

impl ChatRequest {
    pub fn json(model: &str, system: &str, prompt: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            format: Some("json".into()),
            stream: false,
            options: ChatOptions {
                temperature,
                num_predict: max_tokens,
            },
        }
    }
}

/// One chat response, or one line of a streamed response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: Option<ChatMessageResponse>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageResponse {
    #[serde(default)]
    pub content: String,
}

impl ChatResponse {
    fn into_content(self) -> Result<String, BackendError> {
        if let Some(error) = self.error {
            return Err(BackendError::Backend(error));
        }
        Ok(self.message.map(|m| m.content).unwrap_or_default())
    }
}

/// A generative backend that can answer chat requests.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> Result<String, BackendError>;

    /// Sends the response as a sequence of text fragments. Backends that
    /// cannot stream deliver the whole text as one fragment.
    fn stream(&self, request: &ChatRequest, fragments: &Sender<String>) -> Result<(), BackendError> {
        let text = self.complete(request)?;
        if !text.is_empty() {
            let _ = fragments.send(text);
        }
        Ok(())
    }
}

/// Client for an Ollama-compatible chat endpoint.
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn send(&self, request: &ChatRequest, stream: bool) -> Result<Response, BackendError> {
        let mut request = request.clone();
        request.stream = stream;

        let resp = self.client.post(self.chat_url()).json(&request).send()?;
        check_status(resp)
    }

    pub fn test_connection(&self) -> Result<String, BackendError> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()?;
        let resp: serde_json::Value = check_status(resp)?.json()?;

        Ok(format!(
            "Connected ({} models available)",
            resp["models"].as_array().map(|a| a.len()).unwrap_or(0)
        ))
    }
}

impl ChatBackend for OllamaClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let resp = self.send(request, false)?.json::<ChatResponse>()?;
        resp.into_content()
    }

    fn stream(&self, request: &ChatRequest, fragments: &Sender<String>) -> Result<(), BackendError> {
        let resp = self.send(request, true)?;

        // Ollama streams newline-delimited JSON objects.
        for line in BufReader::new(resp).lines() {
            let line = line.map_err(|e| BackendError::StreamAborted(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }

            let chunk: ChatResponse = serde_json::from_str(&line)
                .map_err(|e| BackendError::Malformed(format!("{}: {}", e, line)))?;
            let done = chunk.done;
            let content = chunk.into_content()?;

            if !content.is_empty() && fragments.send(content).is_err() {
                return Err(BackendError::StreamAborted("fragment consumer went away".into()));
            }
            if done {
                break;
            }
        }

        Ok(())
    }
}

fn check_status(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

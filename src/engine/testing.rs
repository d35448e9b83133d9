use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use crate::engine::llm_client::{ChatBackend, ChatRequest};
use crate::error::BackendError;

/// Backend that replays canned replies in order and records every request.
/// `Err` entries simulate transport failures.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    fragment_size: Option<usize>,
}

impl ScriptedBackend {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        let backend = Self::default();
        backend.push_err(message);
        backend
    }

    /// Streams replies in chunks of `size` bytes.
    pub fn chunked(mut self, size: usize) -> Self {
        self.fragment_size = Some(size.max(1));
        self
    }

    pub fn push_ok(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_err(&self, message: &str) {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        let requests = self.requests.lock().unwrap();
        requests.last().and_then(|r| r.messages.last()).map(|m| m.content.clone())
    }

    pub fn last_model(&self) -> Option<String> {
        self.requests.lock().unwrap().last().map(|r| r.model.clone())
    }
}

impl ChatBackend for ScriptedBackend {
    fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(BackendError::Backend(message)),
            None => Err(BackendError::Backend("no scripted reply left".into())),
        }
    }

    fn stream(&self, request: &ChatRequest, fragments: &Sender<String>) -> Result<(), BackendError> {
        let text = self.complete(request)?;
        let size = self.fragment_size.unwrap_or(text.len().max(1));

        let mut rest = text.as_str();
        while !rest.is_empty() {
            let mut cut = size.min(rest.len());
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            let (head, tail) = rest.split_at(cut);
            let _ = fragments.send(head.to_string());
            rest = tail;
        }
        Ok(())
    }
}

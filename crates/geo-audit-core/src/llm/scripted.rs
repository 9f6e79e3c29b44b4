use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatRequest, LlmClient, LlmReply};
use crate::error::TransportError;

type Responder = dyn Fn(&ChatRequest) -> Result<LlmReply, TransportError> + Send + Sync;

enum Script {
    Queue(Mutex<VecDeque<Result<LlmReply, TransportError>>>),
    Responder(Box<Responder>),
}

/// In-memory client that answers from a queue or a closure and records every
/// request it receives. Used by tests and offline dry runs.
pub struct ScriptedLlmClient {
    script: Script,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlmClient {
    /// Replies are handed out in order; an exhausted queue yields a transport error.
    pub fn with_replies(replies: impl IntoIterator<Item = Result<LlmReply, TransportError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(replies.into_iter().collect())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a queue of successful text replies.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replies(texts.into_iter().map(|text| Ok(LlmReply::Text(text.into()))))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<LlmReply, TransportError> + Send + Sync + 'static,
    {
        Self {
            script: Script::Responder(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<LlmReply, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.script {
            Script::Responder(responder) => responder(request),
            Script::Queue(queue) => queue
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front())
                .unwrap_or_else(|| {
                    Err(TransportError::request("scripted", "no scripted reply left"))
                }),
        }
    }
}

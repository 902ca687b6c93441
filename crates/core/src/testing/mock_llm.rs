//! Mock LLM client.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::advisor::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Mock implementation of [`LlmClient`].
///
/// Replays canned responses; once a sequence is exhausted the last response
/// repeats. `failing()` errors on every call.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// Always reply with the same text.
    pub fn replying(text: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            last: Mutex::new(Some(text.to_string())),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with each text in turn, repeating the last one afterwards.
    pub fn with_sequence(texts: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(texts.iter().map(|t| t.to_string()).collect()),
            last: Mutex::new(texts.last().map(|t| t.to_string())),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Error on every call.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts seen so far, in order.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt);

        if self.fail {
            return Err(LlmError::Api {
                status: 500,
                message: "mock failure".to_string(),
            });
        }

        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.last.lock().unwrap().clone())
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            usage: LlmUsage {
                input_tokens: 200,
                output_tokens: 100,
            },
            model: "mock-model".to_string(),
        })
    }
}

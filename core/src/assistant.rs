//! Text-generation capability for the virtual assistant.
//!
//! Assistant replies are a best-effort, possibly-slow, possibly-failing
//! external call with no retry. The chat service spawns reply generation as
//! a detached task; failures here are logged at that boundary and never
//! propagate to the user's send.

use crate::error::{MarketError, Result};
use crate::types::Property;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Role of a conversation turn passed to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Instructions framing the assistant's persona
    System,
    /// A message from the prospective buyer
    User,
    /// A prior assistant reply
    Assistant,
}

/// One conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the turn
    pub role: TurnRole,
    /// Turn text
    pub content: String,
}

impl ChatTurn {
    /// Build a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    /// Build a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Build the constrained per-property assistant persona.
///
/// The persona pins the assistant to the property under discussion so it
/// answers as a listing representative rather than a general chatbot.
#[must_use]
pub fn property_persona(property: &Property) -> ChatTurn {
    ChatTurn::system(format!(
        "You are a friendly virtual assistant for a property marketplace. \
         You are answering questions about the listing \"{}\" priced at {}. \
         Answer only questions about this property, viewing arrangements, \
         and the reservation process. If asked anything else, politely \
         redirect the conversation to the property.",
        property.title, property.price
    ))
}

/// Text-generation collaborator.
///
/// Treated as opaque: the implementation may be any chat-completion
/// service. No retry is attempted on failure.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    /// Generate a completion for the given conversation.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::ExternalFailure`] if the service is
    /// unreachable, rate-limits, or returns an unusable response.
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String>;
}

/// Scriptable in-memory text generation for development and testing.
#[derive(Clone, Debug)]
pub struct MockTextGeneration {
    reply: Arc<Mutex<String>>,
    failing: Arc<Mutex<bool>>,
    calls: Arc<Mutex<u32>>,
}

impl MockTextGeneration {
    /// Creates a mock that always replies with a canned line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reply: Arc::new(Mutex::new(
                "Thanks for your interest! The property is available for viewing.".to_string(),
            )),
            failing: Arc::new(Mutex::new(false)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Set the canned reply.
    pub fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = reply.into();
    }

    /// Make every subsequent completion fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    /// Number of completions attempted (for asserting fire-and-forget).
    #[must_use]
    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockTextGeneration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGeneration for MockTextGeneration {
    async fn complete(&self, _turns: Vec<ChatTurn>) -> Result<String> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(MarketError::external("text generation unavailable"));
        }
        Ok(self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// HTTP chat-completion adapter.
///
/// Speaks a minimal messages API: POST `{api_url}/v1/messages` with the
/// conversation turns, expecting `{ "text": "..." }` back.
#[derive(Clone)]
pub struct HttpTextGeneration {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl HttpTextGeneration {
    /// Create a new client with an explicit API key.
    #[must_use]
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
        }
    }

    /// Create a new client from `ASSISTANT_API_KEY` / `ASSISTANT_API_URL` /
    /// `ASSISTANT_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Unconfigured`] if the key or URL is missing.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ASSISTANT_API_KEY")
            .map_err(|_| MarketError::Unconfigured {
                what: "ASSISTANT_API_KEY",
            })?;
        let api_url = std::env::var("ASSISTANT_API_URL")
            .map_err(|_| MarketError::Unconfigured {
                what: "ASSISTANT_API_URL",
            })?;
        let model =
            std::env::var("ASSISTANT_MODEL").unwrap_or_else(|_| "assistant-default".to_string());
        Ok(Self::new(api_key, api_url, model))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

#[async_trait]
impl TextGeneration for HttpTextGeneration {
    async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: turns,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MarketError::external(format!("completion request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| MarketError::external(format!("completion parse failed: {e}")))?;
                Ok(parsed.text)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(MarketError::external("completion rate limited")),
            status => Err(MarketError::external(format!(
                "completion service returned {status}"
            ))),
        }
    }
}

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{AiError, TransportError};
use crate::models::{ChatTurn, PantryItem, Recipe, RecipeDetails, RecipeFilters};
use crate::retry::{RetryPolicy, retry_with_backoff};

pub const ACTION_RECOMMENDATIONS: &str = "getRecipeRecommendations";
pub const ACTION_DETAILS: &str = "getRecipeDetails";
pub const ACTION_ANALYZE_RECEIPT: &str = "analyzeReceipt";
pub const ACTION_CHAT: &str = "chatWithAIChef";

/// Raw HTTP exchange result: status code plus the body as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Platform HTTP access to the AI backend. The CLI implements this with reqwest.
#[async_trait]
pub trait ChefTransport: Send + Sync {
    async fn post(&self, body: &Value) -> Result<HttpReply, TransportError>;
}

/// Why one attempt failed, before the retry policy has had its say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Non-2xx with a JSON `{error}` body.
    Upstream { status: u16, message: String },
    /// Body that is not the JSON we expect (proxy pages, truncated output).
    Malformed { detail: String },
    /// No response at all.
    Transport(String),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Malformed { detail } => write!(f, "malformed response: {detail}"),
            Self::Transport(e) => write!(f, "network error: {e}"),
        }
    }
}

/// Retry on overload signals and on network failures, never on anything else.
#[must_use]
pub fn should_retry(failure: &AttemptFailure) -> bool {
    match failure {
        AttemptFailure::Upstream { message, .. } => {
            message.contains("overloaded") || message.contains("503")
        }
        AttemptFailure::Malformed { .. } => false,
        AttemptFailure::Transport(_) => true,
    }
}

/// Classify one HTTP reply.
pub fn classify_reply(reply: HttpReply) -> Result<Value, AttemptFailure> {
    if reply.is_success() {
        return serde_json::from_str(&reply.body).map_err(|e| AttemptFailure::Malformed {
            detail: format!("HTTP {} with invalid JSON body: {e}", reply.status),
        });
    }

    let Ok(parsed) = serde_json::from_str::<Value>(&reply.body) else {
        let detail = if reply.body.trim().is_empty() {
            format!("HTTP {}", reply.status)
        } else {
            reply.body
        };
        return Err(AttemptFailure::Malformed { detail });
    };

    let message = match parsed.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let message = if message.is_empty() {
        format!("HTTP {}", reply.status)
    } else {
        message
    };
    Err(AttemptFailure::Upstream {
        status: reply.status,
        message,
    })
}

/// Client for the single-endpoint AI backend. Requests are `{action, payload}`;
/// successes are `{result: T}`, failures `{error: string}` or whatever a proxy
/// in between sent back.
pub struct ChefClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: ChefTransport> ChefClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Issue one logical request and return the success envelope.
    pub async fn execute(&self, action: &str, payload: Value) -> Result<Value, AiError> {
        let body = json!({ "action": action, "payload": payload });
        let body = &body;

        let outcome = retry_with_backoff(&self.policy, should_retry, |attempt| async move {
            tracing::debug!(action, attempt, "calling recipe service");
            match self.transport.post(body).await {
                Ok(reply) => classify_reply(reply),
                Err(e) => Err(AttemptFailure::Transport(e.0)),
            }
        })
        .await;

        outcome.map_err(|failure| self.classify_failure(failure))
    }

    fn classify_failure(&self, failure: AttemptFailure) -> AiError {
        let exhausted = should_retry(&failure);
        match failure {
            AttemptFailure::Upstream { message, .. } if exhausted => AiError::RetryExhausted {
                attempts: self.policy.max_attempts,
                message,
            },
            AttemptFailure::Upstream { message, .. } => AiError::NonRetryable(message),
            AttemptFailure::Malformed { detail } => AiError::NonRetryable(detail),
            AttemptFailure::Transport(e) => AiError::Network(e),
        }
    }

    /// `execute`, then decode the envelope's `result` field.
    pub async fn call<R: DeserializeOwned>(
        &self,
        action: &str,
        payload: Value,
    ) -> Result<R, AiError> {
        let envelope = self.execute(action, payload).await?;
        decode_result(action, envelope)
    }

    /// Stage A: cheap overview candidates. An empty list is a valid answer.
    pub async fn get_overview(
        &self,
        pantry_names: &[String],
        priority_names: &[String],
        filters: &RecipeFilters,
        language: &str,
    ) -> Result<Vec<Recipe>, AiError> {
        let payload = json!({
            "ingredients": pantry_names,
            "priorityIngredients": priority_names,
            "filters": filters,
            "language": language,
        });
        // One off-contract candidate must not sink the rest of the list.
        let candidates: Vec<Value> = self.call(ACTION_RECOMMENDATIONS, payload).await?;
        Ok(candidates
            .into_iter()
            .filter_map(|c| {
                serde_json::from_value::<Recipe>(c)
                    .inspect_err(|e| {
                        tracing::warn!(error = %e, "dropping undecodable recipe candidate");
                    })
                    .ok()
            })
            .map(Recipe::into_overview)
            .collect())
    }

    /// Stage B: the expensive part of one recipe.
    pub async fn get_details(
        &self,
        recipe_name: &str,
        pantry_names: &[String],
        language: &str,
    ) -> Result<RecipeDetails, AiError> {
        let payload = json!({
            "recipeName": recipe_name,
            "ingredients": pantry_names,
            "language": language,
        });
        self.call(ACTION_DETAILS, payload).await
    }

    /// Read pantry items off a receipt photo.
    pub async fn analyze_receipt(
        &self,
        image_base64: &str,
        mime_type: &str,
        language: &str,
    ) -> Result<Vec<PantryItem>, AiError> {
        #[derive(Deserialize)]
        struct ReceiptLine {
            #[serde(default)]
            name: String,
            #[serde(default)]
            quantity: Option<String>,
        }

        let payload = json!({
            "image": image_base64,
            "mimeType": mime_type,
            "language": language,
        });
        let lines: Vec<ReceiptLine> = self.call(ACTION_ANALYZE_RECEIPT, payload).await?;
        Ok(lines
            .into_iter()
            .filter_map(|l| {
                let name = l.name.trim().to_string();
                (!name.is_empty()).then(|| PantryItem::new(name, l.quantity.unwrap_or_default()))
            })
            .collect())
    }

    pub async fn chat(
        &self,
        recipe: &Recipe,
        history: &[ChatTurn],
        message: &str,
        language: &str,
    ) -> Result<String, AiError> {
        let payload = json!({
            "recipe": recipe,
            "history": history,
            "message": message,
            "language": language,
        });
        self.call(ACTION_CHAT, payload).await
    }
}

fn decode_result<R: DeserializeOwned>(action: &str, mut envelope: Value) -> Result<R, AiError> {
    let result = envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| AiError::NonRetryable(format!("{action}: response has no result field")))?;
    serde_json::from_value(result)
        .map_err(|e| AiError::NonRetryable(format!("{action}: unexpected result shape: {e}")))
}

//! Model-API collaborator — named model backends behind a registry.
//!
//! The engine consumes exactly one operation: given the conversation state,
//! produce an update. Backends are registered by name; the manager holds only
//! a selector string, and resolution failures surface at first use rather
//! than at manager construction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::conversation::{ChatMessage, Conversation};
use crate::error::ModelError;

/// One conversation update produced by a model backend.
#[derive(Debug, Clone)]
pub struct ModelTurn {
    /// The message to append to the conversation.
    pub message: ChatMessage,
    /// Optional structured result payload, decoded by the task definition.
    pub payload: Option<serde_json::Value>,
    /// Whether the model considers the task finished.
    pub finished: bool,
}

impl ModelTurn {
    /// A plain assistant message, task not finished.
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::assistant(content),
            payload: None,
            finished: false,
        }
    }

    /// Attach a structured result payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Mark the turn as final.
    pub fn finish(mut self) -> Self {
        self.finished = true;
        self
    }
}

/// A model backend: advances a conversation by one turn.
#[async_trait]
pub trait ModelApi: Send + Sync {
    /// Backend name used for registry lookup.
    fn name(&self) -> &str;

    /// Produce the next turn for the given conversation.
    async fn advance(&self, conversation: &Conversation) -> Result<ModelTurn, ModelError>;
}

/// Registry of named model backends.
pub struct ModelRegistry {
    apis: RwLock<HashMap<String, Arc<dyn ModelApi>>>,
    default_name: RwLock<Option<String>>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            apis: RwLock::new(HashMap::new()),
            default_name: RwLock::new(None),
        }
    }

    /// Register a backend. The first registration becomes the default.
    pub async fn register(&self, api: Arc<dyn ModelApi>) {
        let name = api.name().to_string();
        self.apis.write().await.insert(name.clone(), api);
        let mut default = self.default_name.write().await;
        if default.is_none() {
            *default = Some(name.clone());
        }
        tracing::debug!("Registered model API: {}", name);
    }

    /// Set the default backend name.
    pub async fn set_default(&self, name: impl Into<String>) {
        *self.default_name.write().await = Some(name.into());
    }

    /// Resolve a backend by name. Empty name resolves the default.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn ModelApi>, ModelError> {
        let resolved = if name.is_empty() {
            self.default_name
                .read()
                .await
                .clone()
                .ok_or(ModelError::UnknownApi {
                    name: "(default)".to_string(),
                })?
        } else {
            name.to_string()
        };
        self.apis
            .read()
            .await
            .get(&resolved)
            .cloned()
            .ok_or(ModelError::UnknownApi { name: resolved })
    }

    /// List registered backend names.
    pub async fn list(&self) -> Vec<String> {
        self.apis.read().await.keys().cloned().collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

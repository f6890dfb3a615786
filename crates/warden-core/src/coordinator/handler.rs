//! Task handlers and the registry that routes task types to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::textgen::TextGenError;
use crate::payload::Payload;

/// Errors a handler can report. Contained by the coordinator in the envelope.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler ran but could not complete the task.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler did not finish in time.
    #[error("handler timed out after {0:?}")]
    Timeout(Duration),

    /// The text-generation backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] TextGenError),

    /// The payload is not usable by this handler.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Executes one kind of task.
///
/// Handlers receive the payload after screening, so it may carry a
/// `_safety_warnings` entry.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Name reported as `handler_name` in the task envelope.
    fn name(&self) -> &str;

    /// Runs the task.
    async fn handle(&self, payload: Payload) -> Result<Value, HandlerError>;
}

/// Maps task types to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `task_type`, replacing any previous handler.
    pub fn register(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.into(), handler);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_handler(mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(task_type, handler);
        self
    }

    /// Looks up the handler for a task type.
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Returns true if a handler is registered for `task_type`.
    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Returns the registered task types, sorted.
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn handle(&self, payload: Payload) -> Result<Value, HandlerError> {
            Ok(Value::from(payload))
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = HandlerRegistry::new()
            .with_handler("zeta", Arc::new(Echo))
            .with_handler("alpha", Arc::new(Echo));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alpha"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.task_types(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn registered_handler_runs() {
        let registry = HandlerRegistry::new().with_handler("echo", Arc::new(Echo));
        let handler = registry.get("echo").unwrap();

        let out = handler.handle(Payload::from(json!({"a": 1}))).await.unwrap();
        assert_eq!(out, json!({"a": 1}));
        assert_eq!(handler.name(), "echo");
    }
}

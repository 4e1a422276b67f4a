pub mod client;
pub mod inference;
pub mod styles;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::EngageError;

pub use client::OpenAiClient;
pub use styles::CommentStyle;

/// Result of one generation request. `Skip` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Generation {
    Comment(String),
    Skip { reason: String },
}

impl Generation {
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Generation::Comment(comment) => serde_json::json!({ "comment": comment }),
            Generation::Skip { reason } => serde_json::json!({ "skip": true, "reason": reason }),
        }
    }
}

#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(&self, content: &str, style: CommentStyle)
        -> Result<Generation, EngageError>;
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    /// Replays queued results; once the queue is empty every call yields `fallback`.
    pub struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<Generation, EngageError>>>,
        fallback: Result<Generation, EngageError>,
        calls: Mutex<Vec<(String, CommentStyle)>>,
    }

    impl ScriptedGenerator {
        pub fn always(comment: &str) -> Self {
            Self::with_fallback(Ok(Generation::Comment(comment.to_string())))
        }

        pub fn with_fallback(fallback: Result<Generation, EngageError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn then(self, next: Result<Generation, EngageError>) -> Self {
            self.script.lock().push_back(next);
            self
        }

        pub fn calls(&self) -> Vec<(String, CommentStyle)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CommentGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            content: &str,
            style: CommentStyle,
        ) -> Result<Generation, EngageError> {
            self.calls.lock().push((content.to_string(), style));
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }
}

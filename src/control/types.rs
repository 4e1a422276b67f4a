use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ai::CommentStyle,
    config::RunSettings,
    domain::{RunProgress, RunSummary},
    infrastructure::telemetry::LogEvent,
};

/// One request line. `id` is opaque and echoed back untouched.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Start {
        #[serde(default)]
        config: RunSettings,
    },
    Stop,
    Ping,
    Status,
    Logs,
    GenerateComment {
        content: String,
        #[serde(default)]
        style: CommentStyle,
        #[serde(default)]
        credentials: Option<String>,
    },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::Start { .. } => "START",
            Command::Stop => "STOP",
            Command::Ping => "PING",
            Command::Status => "STATUS",
            Command::Logs => "LOGS",
            Command::GenerateComment { .. } => "GENERATE_COMMENT",
        }
    }

    pub fn awaits_provider(&self) -> bool {
        matches!(self, Command::GenerateComment { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Option<Value>, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub progress: RunProgress,
    pub last_run: Option<RunSummary>,
}

#[derive(Debug, Serialize)]
pub struct EventLine<'a> {
    pub event: &'a LogEvent,
}

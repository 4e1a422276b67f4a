use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

use super::post::PostId;

/// Comment quota dimensions. The terse subtype always generates with the single-word
/// style; the adaptive subtype uses whichever style the run configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSubtype {
    SingleWord,
    Adaptive,
}

impl CommentSubtype {
    pub const ALL: [CommentSubtype; 2] = [CommentSubtype::SingleWord, CommentSubtype::Adaptive];

    pub fn label(&self) -> &'static str {
        match self {
            CommentSubtype::SingleWord => "single_word",
            CommentSubtype::Adaptive => "adaptive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "subtype")]
pub enum ActionKind {
    Like,
    Comment(CommentSubtype),
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Like => f.write_str("like"),
            ActionKind::Comment(subtype) => write!(f, "comment:{}", subtype.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum ActionResult {
    Applied { verified: bool },
    AlreadyApplied,
    Aborted,
    GenerationSkipped { reason: String },
    Failed { kind: String, message: String },
    /// The run was stopped before this action started.
    NotStarted,
}

impl ActionResult {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        ActionResult::Failed {
            kind: kind.label().to_string(),
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionResult::Applied { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyEngaged,
    QuotaExhausted,
    NotSelected,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::AlreadyEngaged => "already engaged",
            SkipReason::QuotaExhausted => "no remaining quota for an available action",
            SkipReason::NotSelected => "no action selected this time",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum PostVerdict {
    Duplicate,
    Advertisement,
    NotExtractable,
    Skipped { reason: SkipReason },
    Processed { actions: Vec<(ActionKind, ActionResult)> },
}

#[derive(Debug, Clone, Serialize)]
pub struct PostReport {
    pub id: PostId,
    pub author: String,
    pub verdict: PostVerdict,
}

#[cfg(test)]
impl PostReport {
    pub fn applied(&self, kind_matches: impl Fn(&ActionKind) -> bool) -> bool {
        match &self.verdict {
            PostVerdict::Processed { actions } => actions
                .iter()
                .any(|(kind, result)| kind_matches(kind) && result.is_applied()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub examined: u32,
    pub processed: u32,
    pub liked: u32,
    pub commented: u32,
    pub skipped: u32,
    pub advertisements: u32,
    pub aborted: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    QuotaSatisfied,
    Stopped,
    FeedExhausted,
    PostLimitReached,
}

impl TerminalStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            TerminalStatus::QuotaSatisfied => "all quotas satisfied",
            TerminalStatus::Stopped => "stopped on request",
            TerminalStatus::FeedExhausted => "feed stopped producing new posts",
            TerminalStatus::PostLimitReached => "processed-post limit reached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Scanning,
    Processing,
    Scrolling,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub phase: RunPhase,
    pub status: String,
    pub stats: RunStats,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            status: "idle".to_string(),
            stats: RunStats::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: TerminalStatus,
    pub stats: RunStats,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn headline(&self) -> String {
        format!(
            "{}: examined {}, liked {}, commented {}, errors {}",
            self.status.describe(),
            self.stats.examined,
            self.stats.liked,
            self.stats.commented,
            self.stats.errors
        )
    }
}

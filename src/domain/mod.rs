pub mod post;
pub mod types;

pub use post::{excerpt, generate_post_id, EngagementState, PostId, PostRecord};
pub use types::{
    ActionKind, ActionResult, CommentSubtype, PostReport, PostVerdict, RunPhase, RunProgress,
    RunStats, RunSummary, SkipReason, TerminalStatus,
};

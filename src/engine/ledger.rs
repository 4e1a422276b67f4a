use std::collections::{HashMap, HashSet};

use crate::domain::{CommentSubtype, EngagementState, PostId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActedEntry {
    pub liked: bool,
    pub commented: bool,
    pub comment_subtype: Option<CommentSubtype>,
}

/// What this run has looked at and what it has done.
///
/// The ledger is the authority on actions taken during the run. It records an action as
/// soon as the write was issued to the page, whether or not the page confirmed it.
#[derive(Debug, Default)]
pub struct EngagementLedger {
    examined: HashSet<PostId>,
    acted: HashMap<PostId, ActedEntry>,
}

impl EngagementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time an id is seen.
    pub fn mark_examined(&mut self, id: &PostId) -> bool {
        self.examined.insert(id.clone())
    }

    pub fn is_examined(&self, id: &PostId) -> bool {
        self.examined.contains(id)
    }

    pub fn examined_count(&self) -> usize {
        self.examined.len()
    }

    #[cfg(test)]
    pub fn acted(&self, id: &PostId) -> Option<&ActedEntry> {
        self.acted.get(id)
    }

    pub fn engagement(&self, id: &PostId) -> EngagementState {
        self.acted
            .get(id)
            .map(|entry| EngagementState {
                liked: entry.liked,
                commented: entry.commented,
            })
            .unwrap_or_default()
    }

    pub fn record_like(&mut self, id: &PostId) {
        self.acted.entry(id.clone()).or_default().liked = true;
    }

    pub fn record_comment(&mut self, id: &PostId, subtype: CommentSubtype) {
        let entry = self.acted.entry(id.clone()).or_default();
        entry.commented = true;
        entry.comment_subtype = Some(subtype);
    }
}

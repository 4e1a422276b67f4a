use std::collections::BTreeMap;

use serde::Serialize;

use crate::{domain::CommentSubtype, error::EngageError};

/// Per-run action targets. The subtype split always sums to `comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaTargets {
    pub likes: u32,
    pub comments: u32,
    pub by_subtype: BTreeMap<CommentSubtype, u32>,
}

impl QuotaTargets {
    pub fn new(
        likes: u32,
        comments: u32,
        single_word: u32,
        adaptive: u32,
    ) -> Result<Self, EngageError> {
        let split = u64::from(single_word) + u64::from(adaptive);
        if split != u64::from(comments) {
            return Err(EngageError::invalid_config(format!(
                "comment subtypes must sum to the comment quota: {single_word} + {adaptive} != {comments}"
            )));
        }
        let by_subtype = BTreeMap::from([
            (CommentSubtype::SingleWord, single_word),
            (CommentSubtype::Adaptive, adaptive),
        ]);
        Ok(Self {
            likes,
            comments,
            by_subtype,
        })
    }

    pub fn restricted(mut self, likes_enabled: bool, comments_enabled: bool) -> Self {
        if !likes_enabled {
            self.likes = 0;
        }
        if !comments_enabled {
            self.comments = 0;
            self.by_subtype.values_mut().for_each(|target| *target = 0);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.likes == 0 && self.comments == 0
    }

    pub fn subtype(&self, subtype: CommentSubtype) -> u32 {
        self.by_subtype.get(&subtype).copied().unwrap_or(0)
    }
}

/// Counters for one run. Counters only move up and never pass their target.
#[derive(Debug, Clone)]
pub struct QuotaState {
    targets: QuotaTargets,
    likes: u32,
    comments: u32,
    by_subtype: BTreeMap<CommentSubtype, u32>,
}

impl QuotaState {
    pub fn new(targets: QuotaTargets) -> Self {
        Self {
            targets,
            likes: 0,
            comments: 0,
            by_subtype: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn targets(&self) -> &QuotaTargets {
        &self.targets
    }

    #[cfg(test)]
    pub fn likes(&self) -> u32 {
        self.likes
    }

    #[cfg(test)]
    pub fn comments(&self) -> u32 {
        self.comments
    }

    pub fn subtype_count(&self, subtype: CommentSubtype) -> u32 {
        self.by_subtype.get(&subtype).copied().unwrap_or(0)
    }

    pub fn can_like(&self) -> bool {
        self.likes < self.targets.likes
    }

    pub fn can_comment(&self) -> bool {
        self.comments < self.targets.comments
            && CommentSubtype::ALL.iter().any(|s| self.subtype_remaining(*s) > 0)
    }

    pub fn subtype_remaining(&self, subtype: CommentSubtype) -> u32 {
        self.targets
            .subtype(subtype)
            .saturating_sub(self.subtype_count(subtype))
    }

    pub fn open_subtypes(&self) -> Vec<CommentSubtype> {
        if self.comments >= self.targets.comments {
            return Vec::new();
        }
        CommentSubtype::ALL
            .into_iter()
            .filter(|s| self.subtype_remaining(*s) > 0)
            .collect()
    }

    pub fn record_like(&mut self) -> bool {
        if !self.can_like() {
            return false;
        }
        self.likes += 1;
        true
    }

    pub fn record_comment(&mut self, subtype: CommentSubtype) -> bool {
        if self.comments >= self.targets.comments || self.subtype_remaining(subtype) == 0 {
            return false;
        }
        self.comments += 1;
        *self.by_subtype.entry(subtype).or_insert(0) += 1;
        true
    }

    pub fn is_satisfied(&self) -> bool {
        self.likes >= self.targets.likes && self.comments >= self.targets.comments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(likes: u32, single: u32, adaptive: u32) -> QuotaTargets {
        QuotaTargets::new(likes, single + adaptive, single, adaptive).unwrap()
    }

    #[test]
    fn counters_never_exceed_targets() {
        let mut quota = QuotaState::new(targets(2, 1, 1));
        let mut previous = (0, 0);
        for _ in 0..10 {
            quota.record_like();
            quota.record_comment(CommentSubtype::SingleWord);
            quota.record_comment(CommentSubtype::Adaptive);
            let now = (quota.likes(), quota.comments());
            assert!(now.0 >= previous.0 && now.1 >= previous.1);
            assert!(now.0 <= 2 && now.1 <= 2);
            assert!(quota.subtype_count(CommentSubtype::SingleWord) <= 1);
            previous = now;
        }
        assert!(quota.is_satisfied());
    }

    #[test]
    fn exhausted_type_is_excluded() {
        let mut quota = QuotaState::new(targets(1, 1, 0));
        assert!(quota.record_like());
        assert!(!quota.can_like());
        assert!(!quota.record_like());
        assert!(quota.can_comment());
        assert_eq!(quota.open_subtypes(), vec![CommentSubtype::SingleWord]);
        assert!(!quota.record_comment(CommentSubtype::Adaptive));
        assert!(quota.record_comment(CommentSubtype::SingleWord));
        assert!(!quota.can_comment());
        assert!(quota.open_subtypes().is_empty());
    }

    #[test]
    fn zero_comment_target_counts_as_met() {
        let quota = QuotaState::new(targets(2, 0, 0));
        assert!(!quota.can_comment());
        assert!(!quota.is_satisfied());
    }

    #[test]
    fn restricted_zeroes_subtypes_too() {
        let t = targets(3, 2, 1).restricted(true, false);
        assert_eq!(t.comments, 0);
        assert_eq!(t.subtype(CommentSubtype::SingleWord), 0);
        assert_eq!(t.likes, 3);
    }
}

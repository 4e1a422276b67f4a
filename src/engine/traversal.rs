use std::{collections::HashSet, sync::Arc};

use crate::{
    config::PacingConfig,
    domain::{generate_post_id, PostId},
    error::EngageError,
    infrastructure::shutdown::ShutdownListener,
    page::{FeedPage, PostHandle},
};

use super::{ledger::EngagementLedger, random::EngineRng};

#[derive(Clone)]
pub struct Candidate {
    pub id: PostId,
    pub content: Option<String>,
    pub handle: PostHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Scrolled,
    Saturated,
    Stopped,
}

pub struct FeedTraversal {
    page: Arc<dyn FeedPage>,
    pacing: PacingConfig,
    stale_scrolls: u32,
}

impl FeedTraversal {
    pub fn new(page: Arc<dyn FeedPage>, pacing: PacingConfig) -> Self {
        Self {
            page,
            pacing,
            stale_scrolls: 0,
        }
    }

    #[cfg(test)]
    pub fn stale_scrolls(&self) -> u32 {
        self.stale_scrolls
    }

    pub async fn next_batch(
        &self,
        ledger: &EngagementLedger,
    ) -> Result<Vec<Candidate>, EngageError> {
        let viewport = self.page.viewport().await;
        let margin = f64::from(self.pacing.visibility_margin_px);
        let mut seen = HashSet::new();
        let mut batch = Vec::new();

        for handle in self.page.find_candidate_posts().await? {
            let Some(bounds) = handle.bounds().await else {
                continue;
            };
            if !bounds.intersects_with_margin(&viewport, margin) {
                continue;
            }

            let content = handle.content().await;
            let id = generate_post_id(
                handle.natural_id().as_deref(),
                content.as_deref().unwrap_or_default(),
                handle.position(),
            );
            if ledger.is_examined(&id) || !seen.insert(id.clone()) {
                continue;
            }
            batch.push(Candidate {
                id,
                content,
                handle,
            });
        }

        tracing::debug!(
            target: "traversal",
            viewport_top = viewport.top,
            candidates = batch.len(),
            "batch collected"
        );
        Ok(batch)
    }

    pub fn note_progress(&mut self) {
        self.stale_scrolls = 0;
    }

    /// Each call counts as stale until `note_progress` says otherwise, so a feed that
    /// never grows ends the traversal after `max_stale_scrolls` attempts.
    pub async fn scroll_for_more(
        &mut self,
        rng: &mut EngineRng,
        stop: &mut ShutdownListener,
    ) -> ScrollOutcome {
        if self.stale_scrolls >= self.pacing.max_stale_scrolls {
            tracing::info!(
                target: "traversal",
                attempts = self.stale_scrolls,
                "no new posts after repeated scrolling"
            );
            return ScrollOutcome::Saturated;
        }
        self.stale_scrolls += 1;

        let distance = rng.pixels(self.pacing.scroll_distance);
        if let Err(err) = self.page.scroll_by(distance).await {
            tracing::warn!(target: "traversal", error = %err, "scroll failed");
        }

        let pause = rng.delay(self.pacing.scroll_pause);
        tracing::debug!(
            target: "traversal",
            distance,
            pause_ms = pause.as_millis() as u64,
            stale = self.stale_scrolls,
            "scrolled for more posts"
        );
        if !stop.sleep(pause).await {
            return ScrollOutcome::Stopped;
        }
        ScrollOutcome::Scrolled
    }
}

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout_at, Instant};

use crate::{
    config::{DelayRange, PacingConfig},
    error::EngageError,
    infrastructure::shutdown::ShutdownListener,
    page::{Control, Editor, InputMode, PostAccessor},
};

use super::random::EngineRng;

const VERIFY_PREFIX_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Applied,
    AlreadyApplied,
    /// Clicked (or tried to) without the page confirming the pressed state.
    Failed { clicked: bool },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    /// `verified` says whether the text was seen among the post's comments afterwards.
    Submitted { verified: bool },
    /// The stop flag went up before any text reached the composer.
    Stopped,
}

pub async fn wait_for<T, F, Fut>(bound: Duration, poll: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + bound;
    loop {
        match timeout_at(deadline, probe()).await {
            Ok(Some(found)) => return Some(found),
            Ok(None) => {}
            Err(_) => return None,
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(poll.min(deadline - now)).await;
    }
}

pub struct ActionExecutor {
    pacing: PacingConfig,
}

impl ActionExecutor {
    pub fn new(pacing: PacingConfig) -> Self {
        Self { pacing }
    }

    async fn settle(&self, rng: &mut EngineRng, range: DelayRange) {
        let pause = rng.delay(range);
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }

    async fn settle_unless_stopped(
        &self,
        rng: &mut EngineRng,
        range: DelayRange,
        stop: &mut ShutdownListener,
    ) -> bool {
        stop.sleep(rng.delay(range)).await
    }

    pub async fn like(
        &self,
        post: &dyn PostAccessor,
        rng: &mut EngineRng,
        stop: &ShutdownListener,
    ) -> LikeOutcome {
        let Some(control) = post.like_control().await else {
            tracing::warn!(target: "executor", "like control not found");
            return LikeOutcome::Failed { clicked: false };
        };
        if control.is_active().await {
            return LikeOutcome::AlreadyApplied;
        }
        if stop.is_triggered() {
            return LikeOutcome::Stopped;
        }
        if let Err(err) = control.click().await {
            tracing::warn!(target: "executor", error = %err, "like click failed");
            return LikeOutcome::Failed { clicked: false };
        }
        self.settle(rng, self.pacing.click_settle).await;

        if control.is_active().await {
            LikeOutcome::Applied
        } else {
            tracing::warn!(target: "executor", "like not confirmed after click");
            LikeOutcome::Failed { clicked: true }
        }
    }

    /// Until the text is injected a raised `stop` ends the attempt with `Stopped`. From
    /// then on the write runs to completion. A failed verification is not an error.
    pub async fn comment(
        &self,
        post: &dyn PostAccessor,
        text: &str,
        rng: &mut EngineRng,
        stop: &ShutdownListener,
    ) -> Result<CommentOutcome, EngageError> {
        let mut stop = stop.clone();
        post.scroll_into_view().await?;
        if !self
            .settle_unless_stopped(rng, self.pacing.scroll_settle, &mut stop)
            .await
        {
            return Ok(CommentOutcome::Stopped);
        }

        let opener = post
            .comment_control()
            .await
            .ok_or(EngageError::ElementNotFound {
                control: "comment control",
                waited: Duration::ZERO,
            })?;
        opener.click().await?;
        if !self
            .settle_unless_stopped(rng, self.pacing.click_settle, &mut stop)
            .await
        {
            return Ok(CommentOutcome::Stopped);
        }

        let editor = wait_for(self.pacing.composer_wait(), self.pacing.wait_poll(), || {
            post.comment_composer()
        })
        .await
        .ok_or(EngageError::ElementNotFound {
            control: "comment composer",
            waited: self.pacing.composer_wait(),
        })?;

        editor.focus().await?;
        if !self
            .settle_unless_stopped(rng, self.pacing.focus_settle, &mut stop)
            .await
        {
            return Ok(CommentOutcome::Stopped);
        }
        inject_text(editor.as_ref(), text).await?;
        self.settle(rng, self.pacing.type_settle).await;

        let submit = wait_for(self.pacing.submit_wait(), self.pacing.wait_poll(), || {
            enabled_submit(post)
        })
        .await
        .ok_or(EngageError::ElementNotFound {
            control: "enabled submit control",
            waited: self.pacing.submit_wait(),
        })?;
        submit.click().await?;
        self.settle(rng, self.pacing.submit_settle).await;

        self.settle(rng, self.pacing.verify_settle).await;
        let verified = comment_visible(post, text).await;
        if !verified {
            tracing::info!(
                target: "executor",
                "could not verify comment posting, assuming success"
            );
        }
        Ok(CommentOutcome::Submitted { verified })
    }
}

async fn inject_text(editor: &dyn Editor, text: &str) -> Result<(), EngageError> {
    match editor.input_mode() {
        InputMode::PlainValue => editor.set_value(text).await,
        InputMode::RichText => editor.replace_content(text).await,
    }
}

async fn enabled_submit(post: &dyn PostAccessor) -> Option<Arc<dyn Control>> {
    let control = post.submit_control().await?;
    control.is_enabled().await.then_some(control)
}

async fn comment_visible(post: &dyn PostAccessor, text: &str) -> bool {
    let needle: String = text.chars().take(VERIFY_PREFIX_CHARS).collect();
    post.comments()
        .await
        .iter()
        .any(|entry| entry.text.contains(&needle))
}

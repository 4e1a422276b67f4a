use std::sync::Arc;

use chrono::Utc;

use crate::{
    ai::CommentGenerator,
    config::RunConfig,
    domain::{PostVerdict, RunPhase, RunSummary, TerminalStatus},
    infrastructure::{shutdown::ShutdownListener, telemetry::EventLog},
    page::FeedPage,
};

use super::{
    classifier::PostClassifier,
    random::EngineRng,
    scheduler::{EngagementScheduler, RunState},
    traversal::{FeedTraversal, ScrollOutcome},
};

pub struct EngagementRun {
    config: RunConfig,
    page: Arc<dyn FeedPage>,
    generator: Arc<dyn CommentGenerator>,
    events: Arc<EventLog>,
    stop: ShutdownListener,
}

impl EngagementRun {
    pub fn new(
        config: RunConfig,
        page: Arc<dyn FeedPage>,
        generator: Arc<dyn CommentGenerator>,
        events: Arc<EventLog>,
        stop: ShutdownListener,
    ) -> Self {
        Self {
            config,
            page,
            generator,
            events,
            stop,
        }
    }

    pub async fn execute(self) -> RunSummary {
        let EngagementRun {
            config,
            page,
            generator,
            events,
            mut stop,
        } = self;

        let started_at = Utc::now();
        let seed = config.seed;
        let max_posts = config.max_posts;
        let targets = config.targets.clone();
        let between_posts = config.pacing.between_posts;

        let mut rng = EngineRng::seeded(seed);
        let mut state = RunState::new(targets.clone());
        let mut traversal = FeedTraversal::new(page.clone(), config.pacing.clone());

        let identity = page.signed_in_identity().await;
        if identity.is_none() {
            tracing::debug!(
                target: "engine",
                "signed-in identity unknown; relying on activity indicators"
            );
        }
        let scheduler = EngagementScheduler::new(
            config,
            PostClassifier::new(identity),
            generator,
            events.clone(),
        );

        tracing::info!(
            target: "engine",
            seed,
            likes = targets.likes,
            comments = targets.comments,
            "engagement run started"
        );
        events.info(format!(
            "Starting engagement: {} likes, {} comments",
            targets.likes, targets.comments
        ));
        events.publish_progress(RunPhase::Scanning, "Scanning feed", state.stats);

        let post_limit_reached =
            |state: &RunState| max_posts.is_some_and(|limit| state.stats.processed >= limit);

        let status = 'run: loop {
            if stop.is_triggered() {
                break TerminalStatus::Stopped;
            }
            if state.quota.is_satisfied() {
                break TerminalStatus::QuotaSatisfied;
            }
            if post_limit_reached(&state) {
                break TerminalStatus::PostLimitReached;
            }

            let batch = match traversal.next_batch(&state.ledger).await {
                Ok(batch) => batch,
                Err(err) => {
                    state.stats.errors += 1;
                    events.error(format!("Failed to read the feed: {err}"));
                    Vec::new()
                }
            };

            if batch.is_empty() {
                let stats = state.stats;
                events.publish_progress(RunPhase::Scrolling, "Scrolling for more posts", stats);
                match traversal.scroll_for_more(&mut rng, &mut stop).await {
                    ScrollOutcome::Scrolled => continue,
                    ScrollOutcome::Saturated => break TerminalStatus::FeedExhausted,
                    ScrollOutcome::Stopped => break TerminalStatus::Stopped,
                }
            }
            traversal.note_progress();

            for candidate in batch {
                if stop.is_triggered() {
                    break 'run TerminalStatus::Stopped;
                }
                if state.quota.is_satisfied() {
                    break 'run TerminalStatus::QuotaSatisfied;
                }
                if post_limit_reached(&state) {
                    break 'run TerminalStatus::PostLimitReached;
                }

                events.publish_progress(
                    RunPhase::Processing,
                    format!("Examining post {}", candidate.id),
                    state.stats,
                );
                let report = scheduler
                    .process(&mut state, candidate, &mut rng, &stop)
                    .await;
                events.publish_stats(state.stats);

                let acted = matches!(report.verdict, PostVerdict::Processed { .. });
                if acted && !state.quota.is_satisfied() {
                    let pause = rng.delay(between_posts);
                    if !stop.sleep(pause).await {
                        break 'run TerminalStatus::Stopped;
                    }
                }
            }
        };

        let summary = RunSummary {
            status,
            stats: state.stats,
            seed,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            target: "engine",
            status = ?summary.status,
            examined = summary.stats.examined,
            distinct_posts = state.ledger.examined_count(),
            liked = summary.stats.liked,
            commented = summary.stats.commented,
            errors = summary.stats.errors,
            "engagement run finished"
        );
        match status {
            TerminalStatus::QuotaSatisfied => events.success(summary.headline()),
            _ => events.info(summary.headline()),
        }
        events.publish_progress(RunPhase::Finished, status.describe(), summary.stats);
        summary
    }
}

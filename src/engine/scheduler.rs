use std::sync::Arc;

use crate::{
    ai::{CommentGenerator, CommentStyle, Generation},
    config::RunConfig,
    domain::{
        excerpt, ActionKind, ActionResult, CommentSubtype, PostRecord, PostReport, PostVerdict,
        RunStats, SkipReason,
    },
    engine::quota::{QuotaState, QuotaTargets},
    error::{EngageError, ErrorKind},
    infrastructure::{shutdown::ShutdownListener, telemetry::EventLog},
    page::PostAccessor,
};

use super::{
    classifier::PostClassifier,
    executor::{ActionExecutor, CommentOutcome, LikeOutcome},
    ledger::EngagementLedger,
    random::EngineRng,
    traversal::Candidate,
};

const LOG_EXCERPT_CHARS: usize = 50;

#[derive(Debug)]
pub struct RunState {
    pub quota: QuotaState,
    pub ledger: EngagementLedger,
    pub stats: RunStats,
}

impl RunState {
    pub fn new(targets: QuotaTargets) -> Self {
        Self {
            quota: QuotaState::new(targets),
            ledger: EngagementLedger::new(),
            stats: RunStats::default(),
        }
    }
}

pub struct EngagementScheduler {
    config: RunConfig,
    classifier: PostClassifier,
    executor: ActionExecutor,
    generator: Arc<dyn CommentGenerator>,
    events: Arc<EventLog>,
}

impl EngagementScheduler {
    pub fn new(
        config: RunConfig,
        classifier: PostClassifier,
        generator: Arc<dyn CommentGenerator>,
        events: Arc<EventLog>,
    ) -> Self {
        let executor = ActionExecutor::new(config.pacing.clone());
        Self {
            config,
            classifier,
            executor,
            generator,
            events,
        }
    }

    /// Errors from individual actions are logged and counted here; nothing propagates.
    pub async fn process(
        &self,
        state: &mut RunState,
        candidate: Candidate,
        rng: &mut EngineRng,
        stop: &ShutdownListener,
    ) -> PostReport {
        let id = candidate.id.clone();
        if !state.ledger.mark_examined(&id) {
            return PostReport {
                id,
                author: String::new(),
                verdict: PostVerdict::Duplicate,
            };
        }
        state.stats.examined += 1;

        let classified = match self.classifier.classify(&candidate).await {
            Ok(classified) => classified,
            Err(err) => {
                state.stats.skipped += 1;
                self.events.warning(format!("Skipping post {id}: {err}"));
                return PostReport {
                    id,
                    author: String::new(),
                    verdict: PostVerdict::NotExtractable,
                };
            }
        };
        if let Some(ambiguity) = &classified.ambiguity {
            tracing::debug!(
                target: "engine",
                post_id = %id,
                reason = %ambiguity,
                "classification ambiguous"
            );
        }
        let record = classified.record;
        let report = |verdict| PostReport {
            id: id.clone(),
            author: record.author.clone(),
            verdict,
        };

        if record.is_advertisement {
            state.stats.advertisements += 1;
            state.stats.skipped += 1;
            self.events.info(format!("Skipping advertisement by {}", record.author));
            return report(PostVerdict::Advertisement);
        }

        // The ledger outranks the page for anything this run already did.
        let engagement = record.engagement.merge(state.ledger.engagement(&id));
        let like_available = !engagement.liked && state.quota.can_like();
        let comment_available = !engagement.commented && state.quota.can_comment();

        if !like_available && !comment_available {
            let blocked_by_engagement = (engagement.liked && state.quota.can_like())
                || (engagement.commented && state.quota.can_comment())
                || engagement.fully_engaged();
            let reason = if blocked_by_engagement {
                SkipReason::AlreadyEngaged
            } else {
                SkipReason::QuotaExhausted
            };
            state.stats.skipped += 1;
            self.events.info(format!(
                "Skipping post by {}: {}",
                record.author,
                reason.describe()
            ));
            return report(PostVerdict::Skipped { reason });
        }

        let mut actions = Vec::with_capacity(2);
        if like_available && rng.chance(self.config.like_probability) {
            actions.push(ActionKind::Like);
        }
        if comment_available && rng.chance(self.config.comment_probability) {
            if let Some(subtype) = self.pick_subtype(&state.quota, rng) {
                actions.push(ActionKind::Comment(subtype));
            }
        }
        if actions.is_empty() {
            state.stats.skipped += 1;
            tracing::debug!(target: "engine", post_id = %id, "no action selected");
            return report(PostVerdict::Skipped {
                reason: SkipReason::NotSelected,
            });
        }
        rng.shuffle(&mut actions);

        state.stats.processed += 1;
        self.events.info(format!(
            "Processing post by {}: \"{}\"",
            record.author,
            record.excerpt(LOG_EXCERPT_CHARS)
        ));

        let post = candidate.handle.as_ref();
        let mut results = Vec::with_capacity(actions.len());
        for kind in actions {
            if stop.is_triggered() {
                results.push((kind, ActionResult::NotStarted));
                continue;
            }
            let result = match kind {
                ActionKind::Like => self.like(state, post, &record, rng, stop).await,
                ActionKind::Comment(subtype) => {
                    self.comment(state, post, &record, subtype, rng, stop).await
                }
            };
            results.push((kind, result));
        }

        report(PostVerdict::Processed { actions: results })
    }

    pub fn pick_subtype(&self, quota: &QuotaState, rng: &mut EngineRng) -> Option<CommentSubtype> {
        match quota.open_subtypes().as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => Some(if rng.chance(self.config.single_word_ratio) {
                CommentSubtype::SingleWord
            } else {
                CommentSubtype::Adaptive
            }),
        }
    }

    async fn like(
        &self,
        state: &mut RunState,
        post: &dyn PostAccessor,
        record: &PostRecord,
        rng: &mut EngineRng,
        stop: &ShutdownListener,
    ) -> ActionResult {
        let guard = self.classifier.engagement_status(post).await;
        if guard.state.liked {
            state.stats.aborted += 1;
            self.events.warning(format!(
                "Like aborted: post by {} is already liked",
                record.author
            ));
            return ActionResult::Aborted;
        }
        match self.executor.like(post, rng, stop).await {
            LikeOutcome::Applied => {
                state.ledger.record_like(&record.id);
                state.quota.record_like();
                state.stats.liked += 1;
                self.events.success(format!("Liked post by {}", record.author));
                ActionResult::Applied { verified: true }
            }
            LikeOutcome::AlreadyApplied => ActionResult::AlreadyApplied,
            LikeOutcome::Stopped => ActionResult::NotStarted,
            LikeOutcome::Failed { clicked } => {
                if clicked {
                    state.ledger.record_like(&record.id);
                }
                state.stats.errors += 1;
                self.events.error(format!("Failed to like post by {}", record.author));
                ActionResult::failed(ErrorKind::Interaction, "like was not confirmed")
            }
        }
    }

    async fn comment(
        &self,
        state: &mut RunState,
        post: &dyn PostAccessor,
        record: &PostRecord,
        subtype: CommentSubtype,
        rng: &mut EngineRng,
        stop: &ShutdownListener,
    ) -> ActionResult {
        if self.already_commented(state, post, record).await {
            return ActionResult::Aborted;
        }
        if stop.is_triggered() {
            return ActionResult::NotStarted;
        }

        let style = CommentStyle::for_subtype(subtype, self.config.adaptive_style);
        let text = match self.generator.generate(&record.content, style).await {
            Ok(Generation::Comment(text)) => text,
            Ok(Generation::Skip { reason }) => {
                self.events.info(format!(
                    "Generator skipped post by {}: {}",
                    record.author, reason
                ));
                return ActionResult::GenerationSkipped { reason };
            }
            Err(err) => return self.action_failed(state, record, "comment generation", err),
        };
        self.events.info(format!(
            "Generated comment: \"{}\"",
            excerpt(&text, LOG_EXCERPT_CHARS)
        ));

        if stop.is_triggered() {
            return ActionResult::NotStarted;
        }
        // Generation can take seconds; look again right before writing.
        if self.already_commented(state, post, record).await {
            return ActionResult::Aborted;
        }

        match self.executor.comment(post, &text, rng, stop).await {
            Ok(CommentOutcome::Stopped) => {
                self.events.info(format!(
                    "Comment on post by {} abandoned by stop",
                    record.author
                ));
                ActionResult::NotStarted
            }
            Ok(CommentOutcome::Submitted { verified }) => {
                state.ledger.record_comment(&record.id, subtype);
                state.quota.record_comment(subtype);
                state.stats.commented += 1;
                self.events.success(format!(
                    "Successfully commented on post by {}",
                    record.author
                ));
                ActionResult::Applied { verified }
            }
            Err(err) => self.action_failed(state, record, "comment", err),
        }
    }

    async fn already_commented(
        &self,
        state: &mut RunState,
        post: &dyn PostAccessor,
        record: &PostRecord,
    ) -> bool {
        let guard = self.classifier.engagement_status(post).await;
        if !guard.state.commented {
            return false;
        }
        state.stats.aborted += 1;
        self.events.warning(format!(
            "Comment aborted: post by {} already shows a comment from this account",
            record.author
        ));
        true
    }

    fn action_failed(
        &self,
        state: &mut RunState,
        record: &PostRecord,
        action: &str,
        err: EngageError,
    ) -> ActionResult {
        state.stats.errors += 1;
        self.events.error(format!(
            "{} failed for post by {} ({}): {}",
            action,
            record.author,
            err.kind(),
            err
        ));
        ActionResult::failed(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        ai::testing::ScriptedGenerator,
        config::{DelayRange, PacingConfig},
        domain::generate_post_id,
        engine::traversal::Candidate,
        infrastructure::shutdown::Shutdown,
        page::{simulated::UiEvent, ControlKind, FeedFixture, FeedPage, PostFixture, SimulatedFeed},
    };

    fn config(likes: u32, single: u32, adaptive: u32) -> RunConfig {
        RunConfig {
            api_key: None,
            targets: QuotaTargets::new(likes, single + adaptive, single, adaptive).unwrap(),
            adaptive_style: CommentStyle::Adaptive,
            like_probability: 1.0,
            comment_probability: 1.0,
            single_word_ratio: 0.7,
            max_posts: None,
            seed: 11,
            pacing: PacingConfig::immediate(),
        }
    }

    struct Harness {
        feed: SimulatedFeed,
        generator: Arc<ScriptedGenerator>,
        scheduler: EngagementScheduler,
        state: RunState,
        rng: EngineRng,
    }

    impl Harness {
        fn new(config: RunConfig, posts: Vec<PostFixture>, generator: ScriptedGenerator) -> Self {
            let feed = SimulatedFeed::new(FeedFixture::with_posts(posts).signed_in_as("Me"));
            let generator = Arc::new(generator);
            let state = RunState::new(config.targets.clone());
            let scheduler = EngagementScheduler::new(
                config,
                PostClassifier::new(Some("Me".into())),
                generator.clone(),
                Arc::new(EventLog::new(chrono_tz::UTC, 64)),
            );
            Self {
                feed,
                generator,
                scheduler,
                state,
                rng: EngineRng::seeded(5),
            }
        }

        async fn candidate(&self, index: usize) -> Candidate {
            let handle = self.feed.find_candidate_posts().await.unwrap().remove(index);
            let content = handle.content().await;
            Candidate {
                id: generate_post_id(
                    handle.natural_id().as_deref(),
                    content.as_deref().unwrap_or_default(),
                    handle.position(),
                ),
                content,
                handle,
            }
        }

        async fn process(&mut self, index: usize) -> PostReport {
            let candidate = self.candidate(index).await;
            let (_stop, listener) = Shutdown::new();
            self.scheduler
                .process(&mut self.state, candidate, &mut self.rng, &listener)
                .await
        }
    }

    fn actions(report: &PostReport) -> Vec<(ActionKind, ActionResult)> {
        match &report.verdict {
            PostVerdict::Processed { actions } => actions.clone(),
            other => panic!("expected processed post, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_post_twice_is_examined_once() {
        let mut h = Harness::new(
            config(5, 0, 0),
            vec![PostFixture::new("Launching today")],
            ScriptedGenerator::always("Congrats"),
        );
        let first = h.process(0).await;
        assert!(first.applied(|k| *k == ActionKind::Like));
        let second = h.process(0).await;
        assert_eq!(second.verdict, PostVerdict::Duplicate);
        assert_eq!(h.state.stats.examined, 1);
        assert_eq!(h.state.stats.liked, 1);
        assert_eq!(h.feed.clicks(ControlKind::Like), 1);
    }

    #[tokio::test]
    async fn ledger_blocks_a_second_like_even_if_page_forgets() {
        let mut fixture = PostFixture::new("Launching today").urn("urn:x");
        fixture.like_sticks = false;
        let mut h = Harness::new(config(5, 0, 0), vec![fixture], ScriptedGenerator::always("x"));
        h.process(0).await;
        let id = h.candidate(0).await.id;
        assert!(h.state.ledger.acted(&id).unwrap().liked);

        // A later encounter under a fresh examination still sees the ledger entry.
        let candidate = h.candidate(0).await;
        let mut fresh = RunState::new(h.state.quota.targets().clone());
        fresh.ledger.record_like(&id);
        let (_stop, listener) = Shutdown::new();
        let report = h
            .scheduler
            .process(&mut fresh, candidate, &mut h.rng, &listener)
            .await;
        assert!(!report.applied(|k| *k == ActionKind::Like));
        assert_eq!(h.feed.clicks(ControlKind::Like), 1);
    }

    #[tokio::test]
    async fn advertisements_never_receive_actions() {
        let mut h = Harness::new(
            config(5, 3, 2),
            vec![
                PostFixture::new("Buy now").promoted(),
                PostFixture::new("Buy later").badge("Promoted"),
            ],
            ScriptedGenerator::always("Nice"),
        );
        assert_eq!(h.process(0).await.verdict, PostVerdict::Advertisement);
        assert_eq!(h.process(1).await.verdict, PostVerdict::Advertisement);
        assert!(h
            .feed
            .events()
            .iter()
            .all(|e| !matches!(e, UiEvent::Click { .. })));
        assert!(h.generator.calls().is_empty());
        assert_eq!(h.state.stats.advertisements, 2);
    }

    #[tokio::test]
    async fn generator_skip_posts_nothing_but_marks_examined() {
        let mut h = Harness::new(
            config(0, 1, 0),
            vec![PostFixture::new("Apply to our bootcamp")],
            ScriptedGenerator::with_fallback(Ok(Generation::Skip {
                reason: "promotional".into(),
            })),
        );
        let report = h.process(0).await;
        assert_eq!(
            actions(&report),
            vec![(
                ActionKind::Comment(CommentSubtype::SingleWord),
                ActionResult::GenerationSkipped {
                    reason: "promotional".into()
                }
            )]
        );
        assert!(h.feed.submissions().is_empty());
        assert_eq!(h.state.quota.comments(), 0);
        assert_eq!(h.state.stats.commented, 0);
        assert_eq!(h.state.stats.errors, 0);
        assert!(h.state.ledger.is_examined(&report.id));
    }

    #[tokio::test]
    async fn malformed_generation_counts_an_error_and_moves_on() {
        let mut h = Harness::new(
            config(0, 2, 0),
            vec![PostFixture::new("First"), PostFixture::new("Second")],
            ScriptedGenerator::always("Great point").then(Err(EngageError::MalformedResponse(
                "response has neither `comment` nor `skip`".into(),
            ))),
        );
        let first = h.process(0).await;
        assert!(matches!(
            &actions(&first)[0].1,
            ActionResult::Failed { kind, .. } if kind == "MalformedResponse"
        ));
        assert_eq!(h.state.stats.errors, 1);
        assert!(h.feed.submissions().is_empty());

        let second = h.process(1).await;
        assert!(second.applied(|k| matches!(k, ActionKind::Comment(_))));
        assert_eq!(h.feed.submissions(), vec![(1, "Great point".to_string())]);
        assert_eq!(h.state.stats.commented, 1);
    }

    #[tokio::test]
    async fn race_guard_aborts_comment_without_side_effects() {
        let mut fixture = PostFixture::new("Big news");
        fixture.commented_externally_after_reads = Some(1);
        let mut h = Harness::new(config(1, 0, 1), vec![fixture], ScriptedGenerator::always("Wow"));
        let report = h.process(0).await;
        let results = actions(&report);

        let comment = results
            .iter()
            .find(|(k, _)| matches!(k, ActionKind::Comment(_)))
            .unwrap();
        assert_eq!(comment.1, ActionResult::Aborted);
        let like = results.iter().find(|(k, _)| *k == ActionKind::Like).unwrap();
        assert!(like.1.is_applied());

        assert!(h.generator.calls().is_empty());
        assert!(h.feed.submissions().is_empty());
        assert_eq!(h.feed.clicks(ControlKind::Comment), 0);
        assert_eq!(h.state.stats.aborted, 1);
        assert_eq!(h.state.stats.liked, 1);
        assert_eq!(h.state.quota.comments(), 0);
    }

    #[tokio::test]
    async fn like_race_guard_aborts_like() {
        let mut fixture = PostFixture::new("Big news");
        fixture.liked_externally_after_reads = Some(1);
        let mut h = Harness::new(config(1, 0, 0), vec![fixture], ScriptedGenerator::always("x"));
        let report = h.process(0).await;
        assert_eq!(actions(&report), vec![(ActionKind::Like, ActionResult::Aborted)]);
        assert_eq!(h.feed.clicks(ControlKind::Like), 0);
        assert_eq!(h.state.quota.likes(), 0);
    }

    #[tokio::test]
    async fn fully_engaged_post_does_not_count_as_processed() {
        let fixture = PostFixture::new("Old news")
            .already_liked()
            .activity("You commented on this");
        let mut h = Harness::new(config(3, 2, 1), vec![fixture], ScriptedGenerator::always("x"));
        let report = h.process(0).await;
        assert_eq!(
            report.verdict,
            PostVerdict::Skipped {
                reason: SkipReason::AlreadyEngaged
            }
        );
        assert_eq!(h.state.stats.processed, 0);
        assert_eq!(h.state.stats.examined, 1);
    }

    #[tokio::test]
    async fn like_still_happens_when_comment_quota_is_spent() {
        let mut h = Harness::new(
            config(2, 1, 0),
            vec![PostFixture::new("One"), PostFixture::new("Two")],
            ScriptedGenerator::always("Nice"),
        );
        h.process(0).await;
        assert_eq!(h.state.quota.comments(), 1);
        let second = h.process(1).await;
        assert_eq!(actions(&second).len(), 1);
        assert!(second.applied(|k| *k == ActionKind::Like));
        assert_eq!(h.state.stats.liked, 2);
    }

    #[tokio::test]
    async fn already_liked_post_can_still_be_commented() {
        let mut h = Harness::new(
            config(3, 0, 1),
            vec![PostFixture::new("Promotion!").already_liked()],
            ScriptedGenerator::always("Well deserved"),
        );
        let report = h.process(0).await;
        let results = actions(&report);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, ActionKind::Comment(CommentSubtype::Adaptive));
        assert_eq!(h.generator.calls()[0].1, CommentStyle::Adaptive);
        assert_eq!(h.feed.clicks(ControlKind::Like), 0);
    }

    #[tokio::test]
    async fn zero_probabilities_skip_without_side_effects() {
        let mut cfg = config(3, 1, 0);
        cfg.like_probability = 0.0;
        cfg.comment_probability = 0.0;
        let posts = vec![PostFixture::new("Hello")];
        let mut h = Harness::new(cfg, posts, ScriptedGenerator::always("x"));
        let report = h.process(0).await;
        assert_eq!(
            report.verdict,
            PostVerdict::Skipped {
                reason: SkipReason::NotSelected
            }
        );
        assert!(h.feed.events().is_empty());
    }

    #[tokio::test]
    async fn subtype_choice_follows_remaining_quota() {
        let h = Harness::new(config(0, 1, 1), vec![], ScriptedGenerator::always("x"));
        let mut rng = EngineRng::seeded(9);

        let mut quota = QuotaState::new(QuotaTargets::new(0, 2, 1, 1).unwrap());
        quota.record_comment(CommentSubtype::SingleWord);
        for _ in 0..20 {
            assert_eq!(
                h.scheduler.pick_subtype(&quota, &mut rng),
                Some(CommentSubtype::Adaptive)
            );
        }
        quota.record_comment(CommentSubtype::Adaptive);
        assert_eq!(h.scheduler.pick_subtype(&quota, &mut rng), None);
    }

    #[tokio::test]
    async fn subtype_ratio_biases_toward_single_word() {
        let h = Harness::new(config(0, 50, 50), vec![], ScriptedGenerator::always("x"));
        let quota = QuotaState::new(QuotaTargets::new(0, 100, 50, 50).unwrap());
        let mut rng = EngineRng::seeded(21);
        let single = (0..1000)
            .filter(|_| {
                h.scheduler.pick_subtype(&quota, &mut rng) == Some(CommentSubtype::SingleWord)
            })
            .count();
        assert!((600..=800).contains(&single), "single-word picks: {single}");
    }

    #[tokio::test]
    async fn missing_composer_counts_error_and_leaves_quota() {
        let mut h = Harness::new(
            config(0, 1, 0),
            vec![PostFixture::new("Hello").composer(None)],
            ScriptedGenerator::always("Nice"),
        );
        let report = h.process(0).await;
        assert!(matches!(
            &actions(&report)[0].1,
            ActionResult::Failed { kind, .. } if kind == "ElementNotFound"
        ));
        assert_eq!(h.state.stats.errors, 1);
        assert_eq!(h.state.quota.comments(), 0);
        assert!(h.state.ledger.acted(&report.id).is_none());
    }

    #[tokio::test]
    async fn stopped_run_starts_no_new_actions() {
        let posts = vec![PostFixture::new("Hi")];
        let mut h = Harness::new(config(1, 0, 0), posts, ScriptedGenerator::always("x"));
        let candidate = h.candidate(0).await;
        let (stop, listener) = Shutdown::new();
        stop.trigger();
        let report = h
            .scheduler
            .process(&mut h.state, candidate, &mut h.rng, &listener)
            .await;
        assert_eq!(actions(&report), vec![(ActionKind::Like, ActionResult::NotStarted)]);
        assert_eq!(h.feed.clicks(ControlKind::Like), 0);
    }

    #[tokio::test]
    async fn stop_while_preparing_comment_posts_nothing() {
        let mut cfg = config(0, 1, 0);
        cfg.pacing.scroll_settle = DelayRange::new(300, 300);
        let posts = vec![PostFixture::new("Hi")];
        let mut h = Harness::new(cfg, posts, ScriptedGenerator::always("Nice"));
        let candidate = h.candidate(0).await;
        let (stop, listener) = Shutdown::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let started = std::time::Instant::now();
        let report = h
            .scheduler
            .process(&mut h.state, candidate, &mut h.rng, &listener)
            .await;
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(
            actions(&report),
            vec![(ActionKind::Comment(CommentSubtype::SingleWord), ActionResult::NotStarted)]
        );
        assert!(h.feed.submissions().is_empty());
        assert_eq!(h.state.quota.comments(), 0);
        assert_eq!(h.state.stats.commented, 0);
        assert!(h.state.ledger.acted(&report.id).is_none());
    }
}

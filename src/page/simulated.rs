//! Fixture-driven feed used for dry runs and by the engine tests.
//!
//! Posts are stacked vertically; only the first `initially_rendered` exist until the
//! viewport scrolls close to the bottom, at which point `load_step` more appear. Every
//! click, submission and scroll is recorded so callers can assert on side effects.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::EngageError;

use super::{
    AdMarkers, Bounds, CommentEntry, Control, ControlKind, Editor, FeedPage, InputMode,
    PostAccessor, PostHandle,
};

const LOAD_THRESHOLD_PX: f64 = 400.0;
const EXTERNAL_COMMENT_INDICATOR: &str = "You commented on this";

fn default_viewport_height() -> f64 {
    900.0
}

fn default_load_step() -> usize {
    3
}

fn default_gap() -> f64 {
    8.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedFixture {
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub initially_rendered: Option<usize>,
    #[serde(default = "default_load_step")]
    pub load_step: usize,
    #[serde(default = "default_gap")]
    pub gap: f64,
    pub posts: Vec<PostFixture>,
}

#[cfg(test)]
impl FeedFixture {
    pub fn with_posts(posts: Vec<PostFixture>) -> Self {
        Self {
            viewport_height: default_viewport_height(),
            identity: None,
            initially_rendered: None,
            load_step: default_load_step(),
            gap: default_gap(),
            posts,
        }
    }

    pub fn signed_in_as(mut self, identity: &str) -> Self {
        self.identity = Some(identity.to_string());
        self
    }

    pub fn lazy(mut self, initially_rendered: usize, load_step: usize) -> Self {
        self.initially_rendered = Some(initially_rendered);
        self.load_step = load_step;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostFixture {
    pub urn: Option<String>,
    pub author: Option<String>,
    pub text: Option<String>,
    pub height: f64,
    pub promoted_attribute: bool,
    pub badge: Option<String>,
    pub liked: bool,
    pub like_control: bool,
    /// Whether clicking like actually changes the pressed state.
    pub like_sticks: bool,
    pub activity: Vec<String>,
    pub comments: Vec<CommentEntry>,
    /// `None` means the composer never appears.
    pub composer: Option<InputMode>,
    pub submit_appears: bool,
    pub render_comments: bool,
    /// Someone else comments as the signed-in user once activity has been read this often.
    pub commented_externally_after_reads: Option<u32>,
    pub liked_externally_after_reads: Option<u32>,
}

impl Default for PostFixture {
    fn default() -> Self {
        Self {
            urn: None,
            author: None,
            text: None,
            height: 400.0,
            promoted_attribute: false,
            badge: None,
            liked: false,
            like_control: true,
            like_sticks: true,
            activity: Vec::new(),
            comments: Vec::new(),
            composer: Some(InputMode::RichText),
            submit_appears: true,
            render_comments: true,
            commented_externally_after_reads: None,
            liked_externally_after_reads: None,
        }
    }
}

#[cfg(test)]
impl PostFixture {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn urn(mut self, urn: &str) -> Self {
        self.urn = Some(urn.to_string());
        self
    }

    pub fn by(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn badge(mut self, badge: &str) -> Self {
        self.badge = Some(badge.to_string());
        self
    }

    pub fn promoted(mut self) -> Self {
        self.promoted_attribute = true;
        self
    }

    pub fn already_liked(mut self) -> Self {
        self.liked = true;
        self
    }

    pub fn activity(mut self, line: &str) -> Self {
        self.activity.push(line.to_string());
        self
    }

    pub fn comment_from(mut self, author: &str, text: &str) -> Self {
        self.comments.push(CommentEntry {
            author: author.to_string(),
            text: text.to_string(),
        });
        self
    }

    pub fn composer(mut self, mode: Option<InputMode>) -> Self {
        self.composer = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Click { post: usize, control: ControlKind },
    Submitted { post: usize, text: String },
    Scrolled { pixels: u32 },
    ScrolledIntoView { post: usize },
}

struct PostState {
    fixture: PostFixture,
    liked: bool,
    posted: Vec<String>,
    composer_open: bool,
    draft: String,
    activity_reads: u32,
    like_reads: u32,
}

struct FeedState {
    posts: Vec<PostState>,
    rendered: usize,
    scroll_top: f64,
    viewport_height: f64,
    identity: Option<String>,
    load_step: usize,
    gap: f64,
    events: Vec<UiEvent>,
}

impl FeedState {
    fn top_of(&self, index: usize) -> f64 {
        self.posts[..index]
            .iter()
            .map(|post| post.fixture.height + self.gap)
            .sum()
    }

    fn rendered_height(&self) -> f64 {
        if self.rendered == 0 {
            return 0.0;
        }
        let last = self.rendered - 1;
        self.top_of(last) + self.posts[last].fixture.height
    }
}

#[derive(Clone)]
pub struct SimulatedFeed {
    state: Arc<Mutex<FeedState>>,
}

impl SimulatedFeed {
    pub fn new(fixture: FeedFixture) -> Self {
        let total = fixture.posts.len();
        let posts = fixture
            .posts
            .into_iter()
            .map(|fixture| PostState {
                liked: fixture.liked,
                fixture,
                posted: Vec::new(),
                composer_open: false,
                draft: String::new(),
                activity_reads: 0,
                like_reads: 0,
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(FeedState {
                posts,
                rendered: fixture.initially_rendered.unwrap_or(total).min(total),
                scroll_top: 0.0,
                viewport_height: fixture.viewport_height,
                identity: fixture.identity,
                load_step: fixture.load_step.max(1),
                gap: fixture.gap,
                events: Vec::new(),
            })),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read feed fixture {}", path.display()))?;
        let fixture: FeedFixture = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse feed fixture {}", path.display()))?;
        Ok(Self::new(fixture))
    }

    fn post(&self, index: usize) -> PostHandle {
        Arc::new(SimulatedPost {
            state: self.state.clone(),
            index,
        })
    }
}

#[cfg(test)]
impl SimulatedFeed {
    pub fn events(&self) -> Vec<UiEvent> {
        self.state.lock().events.clone()
    }

    pub fn clicks(&self, control: ControlKind) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| matches!(event, UiEvent::Click { control: c, .. } if *c == control))
            .count()
    }

    pub fn submissions(&self) -> Vec<(usize, String)> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                UiEvent::Submitted { post, text } => Some((*post, text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn is_liked(&self, index: usize) -> bool {
        self.state.lock().posts[index].liked
    }

    pub fn rendered(&self) -> usize {
        self.state.lock().rendered
    }
}

#[async_trait]
impl FeedPage for SimulatedFeed {
    async fn find_candidate_posts(&self) -> Result<Vec<PostHandle>, EngageError> {
        let rendered = self.state.lock().rendered;
        Ok((0..rendered).map(|index| self.post(index)).collect())
    }

    async fn viewport(&self) -> Bounds {
        let state = self.state.lock();
        Bounds {
            top: state.scroll_top,
            height: state.viewport_height,
        }
    }

    async fn scroll_by(&self, pixels: u32) -> Result<(), EngageError> {
        let mut state = self.state.lock();
        state.events.push(UiEvent::Scrolled { pixels });
        let max_top = (state.rendered_height() - state.viewport_height).max(0.0);
        state.scroll_top = (state.scroll_top + f64::from(pixels)).min(max_top);

        let near_bottom =
            state.scroll_top + state.viewport_height + LOAD_THRESHOLD_PX >= state.rendered_height();
        if near_bottom && state.rendered < state.posts.len() {
            state.rendered = (state.rendered + state.load_step).min(state.posts.len());
        }
        Ok(())
    }

    async fn signed_in_identity(&self) -> Option<String> {
        self.state.lock().identity.clone()
    }
}

struct SimulatedPost {
    state: Arc<Mutex<FeedState>>,
    index: usize,
}

#[async_trait]
impl PostAccessor for SimulatedPost {
    fn natural_id(&self) -> Option<String> {
        self.state.lock().posts[self.index].fixture.urn.clone()
    }

    fn position(&self) -> usize {
        self.index
    }

    async fn bounds(&self) -> Option<Bounds> {
        let state = self.state.lock();
        Some(Bounds {
            top: state.top_of(self.index),
            height: state.posts[self.index].fixture.height,
        })
    }

    async fn content(&self) -> Option<String> {
        let state = self.state.lock();
        state.posts[self.index]
            .fixture
            .text
            .as_ref()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }

    async fn author(&self) -> Option<String> {
        self.state.lock().posts[self.index].fixture.author.clone()
    }

    async fn ad_markers(&self) -> AdMarkers {
        let state = self.state.lock();
        let fixture = &state.posts[self.index].fixture;
        AdMarkers {
            promoted_attribute: fixture.promoted_attribute,
            badge_text: fixture.badge.clone(),
        }
    }

    async fn activity_indicators(&self) -> Vec<String> {
        let mut state = self.state.lock();
        let post = &mut state.posts[self.index];
        post.activity_reads += 1;
        let mut lines = post.fixture.activity.clone();
        if post
            .fixture
            .commented_externally_after_reads
            .is_some_and(|after| post.activity_reads > after)
        {
            lines.push(EXTERNAL_COMMENT_INDICATOR.to_string());
        }
        lines
    }

    async fn comments(&self) -> Vec<CommentEntry> {
        let state = self.state.lock();
        let post = &state.posts[self.index];
        let mut comments = post.fixture.comments.clone();
        if post.fixture.render_comments {
            let author = state.identity.clone().unwrap_or_else(|| "You".to_string());
            comments.extend(post.posted.iter().map(|text| CommentEntry {
                author: author.clone(),
                text: text.clone(),
            }));
        }
        comments
    }

    async fn locate_control(&self, kind: ControlKind) -> Option<Arc<dyn Control>> {
        let state = self.state.lock();
        let post = &state.posts[self.index];
        let present = match kind {
            ControlKind::Like => post.fixture.like_control,
            ControlKind::Comment => true,
            ControlKind::Submit => {
                post.composer_open && post.fixture.submit_appears && post.fixture.composer.is_some()
            }
        };
        present.then(|| {
            Arc::new(SimulatedControl {
                state: self.state.clone(),
                index: self.index,
                kind,
            }) as Arc<dyn Control>
        })
    }

    async fn comment_composer(&self) -> Option<Arc<dyn Editor>> {
        let state = self.state.lock();
        let post = &state.posts[self.index];
        if !post.composer_open {
            return None;
        }
        post.fixture.composer.map(|mode| {
            Arc::new(SimulatedEditor {
                state: self.state.clone(),
                index: self.index,
                mode,
            }) as Arc<dyn Editor>
        })
    }

    async fn scroll_into_view(&self) -> Result<(), EngageError> {
        let mut state = self.state.lock();
        let top = state.top_of(self.index);
        let height = state.posts[self.index].fixture.height;
        state.scroll_top = (top - (state.viewport_height - height) / 2.0).max(0.0);
        state.events.push(UiEvent::ScrolledIntoView { post: self.index });
        Ok(())
    }
}

struct SimulatedControl {
    state: Arc<Mutex<FeedState>>,
    index: usize,
    kind: ControlKind,
}

#[async_trait]
impl Control for SimulatedControl {
    async fn is_active(&self) -> bool {
        if self.kind != ControlKind::Like {
            return false;
        }
        let mut state = self.state.lock();
        let post = &mut state.posts[self.index];
        post.like_reads += 1;
        post.liked
            || post
                .fixture
                .liked_externally_after_reads
                .is_some_and(|after| post.like_reads > after)
    }

    async fn is_enabled(&self) -> bool {
        let state = self.state.lock();
        match self.kind {
            ControlKind::Submit => !state.posts[self.index].draft.trim().is_empty(),
            _ => true,
        }
    }

    async fn click(&self) -> Result<(), EngageError> {
        let mut state = self.state.lock();
        state.events.push(UiEvent::Click {
            post: self.index,
            control: self.kind,
        });
        let post = &mut state.posts[self.index];
        match self.kind {
            ControlKind::Like => {
                if post.fixture.like_sticks {
                    post.liked = !post.liked;
                }
            }
            ControlKind::Comment => post.composer_open = true,
            ControlKind::Submit => {
                let text = std::mem::take(&mut post.draft);
                if text.trim().is_empty() {
                    return Err(EngageError::Interaction("submit control is disabled".into()));
                }
                post.posted.push(text.clone());
                post.composer_open = false;
                state.events.push(UiEvent::Submitted {
                    post: self.index,
                    text,
                });
            }
        }
        Ok(())
    }
}

struct SimulatedEditor {
    state: Arc<Mutex<FeedState>>,
    index: usize,
    mode: InputMode,
}

impl SimulatedEditor {
    fn write(&self, expected: InputMode, text: &str) -> Result<(), EngageError> {
        if self.mode != expected {
            return Err(EngageError::Interaction(format!(
                "editor does not accept {expected:?} input"
            )));
        }
        self.state.lock().posts[self.index].draft = text.to_string();
        Ok(())
    }
}

#[async_trait]
impl Editor for SimulatedEditor {
    fn input_mode(&self) -> InputMode {
        self.mode
    }

    async fn focus(&self) -> Result<(), EngageError> {
        Ok(())
    }

    async fn set_value(&self, text: &str) -> Result<(), EngageError> {
        self.write(InputMode::PlainValue, text)
    }

    async fn replace_content(&self, text: &str) -> Result<(), EngageError> {
        self.write(InputMode::RichText, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(count: usize) -> Vec<PostFixture> {
        (0..count)
            .map(|i| PostFixture::new(&format!("post number {i}")))
            .collect()
    }

    #[tokio::test]
    async fn lazy_feed_grows_when_scrolled_near_bottom() {
        let feed = SimulatedFeed::new(FeedFixture::with_posts(posts(6)).lazy(2, 2));
        assert_eq!(feed.find_candidate_posts().await.unwrap().len(), 2);
        feed.scroll_by(200).await.unwrap();
        assert_eq!(feed.rendered(), 4);
        feed.scroll_by(10_000).await.unwrap();
        feed.scroll_by(10_000).await.unwrap();
        assert_eq!(feed.rendered(), 6);
        let viewport = feed.viewport().await;
        let last = feed.find_candidate_posts().await.unwrap()[5].bounds().await.unwrap();
        assert!((viewport.bottom() - last.bottom()).abs() < 1e-6);
    }

    #[tokio::test]
    async fn submit_requires_open_composer_and_draft() {
        let feed = SimulatedFeed::new(FeedFixture::with_posts(posts(1)).signed_in_as("Me"));
        let post = feed.find_candidate_posts().await.unwrap().remove(0);
        assert!(post.submit_control().await.is_none());
        post.comment_control().await.unwrap().click().await.unwrap();
        let editor = post.comment_composer().await.unwrap();
        assert_eq!(editor.input_mode(), InputMode::RichText);
        assert!(editor.set_value("nope").await.is_err());
        editor.replace_content("Well said").await.unwrap();
        let submit = post.submit_control().await.unwrap();
        assert!(submit.is_enabled().await);
        submit.click().await.unwrap();
        assert_eq!(feed.submissions(), vec![(0, "Well said".to_string())]);
        let comments = post.comments().await;
        assert_eq!(comments.last().unwrap().author, "Me");
    }

    #[tokio::test]
    async fn external_comment_appears_after_reads() {
        let mut fixture = PostFixture::new("hello");
        fixture.commented_externally_after_reads = Some(1);
        let feed = SimulatedFeed::new(FeedFixture::with_posts(vec![fixture]));
        let post = feed.find_candidate_posts().await.unwrap().remove(0);
        assert!(post.activity_indicators().await.is_empty());
        assert_eq!(post.activity_indicators().await, vec![EXTERNAL_COMMENT_INDICATOR]);
    }

    #[test]
    fn fixture_json_uses_defaults() {
        let raw = r#"{
            "identity": "Jane Doe",
            "posts": [
                { "urn": "urn:li:activity:1", "text": "Hiring!", "badge": "Promoted" },
                { "text": "Plain editor", "composer": "plain_value" },
                { "text": "No editor", "composer": null }
            ]
        }"#;
        let fixture: FeedFixture = serde_json::from_str(raw).unwrap();
        assert_eq!(fixture.viewport_height, 900.0);
        assert_eq!(fixture.posts[0].height, 400.0);
        assert!(fixture.posts[0].like_control);
        assert_eq!(fixture.posts[1].composer, Some(InputMode::PlainValue));
        assert_eq!(fixture.posts[2].composer, None);
    }
}

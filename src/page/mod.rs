//! Capabilities the engine needs from the page it automates.
//!
//! Selector fallbacks and any other knowledge of the concrete markup belong in the
//! implementations of these traits. The engine only ever talks to them.

pub mod simulated;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngageError;

pub use simulated::SimulatedFeed;
#[cfg(test)]
pub use simulated::{FeedFixture, PostFixture};

pub type PostHandle = Arc<dyn PostAccessor>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub top: f64,
    pub height: f64,
}

impl Bounds {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn intersects_with_margin(&self, viewport: &Bounds, margin: f64) -> bool {
        self.bottom() > viewport.top - margin && self.top < viewport.bottom() + margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Like,
    Comment,
    Submit,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlKind::Like => "like control",
            ControlKind::Comment => "comment control",
            ControlKind::Submit => "submit control",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// A form field whose value is assigned.
    PlainValue,
    /// A content-editable region whose content is replaced.
    RichText,
}

/// Structural sponsorship signals, read from dedicated elements or attributes rather
/// than from the post text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdMarkers {
    pub promoted_attribute: bool,
    pub badge_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub author: String,
    pub text: String,
}

#[async_trait]
pub trait Control: Send + Sync {
    async fn is_active(&self) -> bool;
    async fn is_enabled(&self) -> bool;
    async fn click(&self) -> Result<(), EngageError>;
}

#[async_trait]
pub trait Editor: Send + Sync {
    fn input_mode(&self) -> InputMode;
    async fn focus(&self) -> Result<(), EngageError>;
    async fn set_value(&self, text: &str) -> Result<(), EngageError>;
    async fn replace_content(&self, text: &str) -> Result<(), EngageError>;
}

#[async_trait]
pub trait PostAccessor: Send + Sync {
    /// Identifier the page itself assigns, if any (e.g. a `data-urn` attribute).
    fn natural_id(&self) -> Option<String>;
    fn position(&self) -> usize;

    async fn bounds(&self) -> Option<Bounds>;
    async fn content(&self) -> Option<String>;
    async fn author(&self) -> Option<String>;
    async fn ad_markers(&self) -> AdMarkers;
    async fn activity_indicators(&self) -> Vec<String>;
    async fn comments(&self) -> Vec<CommentEntry>;
    async fn locate_control(&self, kind: ControlKind) -> Option<Arc<dyn Control>>;
    async fn comment_composer(&self) -> Option<Arc<dyn Editor>>;
    async fn scroll_into_view(&self) -> Result<(), EngageError>;

    async fn like_control(&self) -> Option<Arc<dyn Control>> {
        self.locate_control(ControlKind::Like).await
    }

    async fn comment_control(&self) -> Option<Arc<dyn Control>> {
        self.locate_control(ControlKind::Comment).await
    }

    async fn submit_control(&self) -> Option<Arc<dyn Control>> {
        self.locate_control(ControlKind::Submit).await
    }
}

#[async_trait]
pub trait FeedPage: Send + Sync {
    async fn find_candidate_posts(&self) -> Result<Vec<PostHandle>, EngageError>;
    async fn viewport(&self) -> Bounds;
    async fn scroll_by(&self, pixels: u32) -> Result<(), EngageError>;
    async fn signed_in_identity(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_extends_visibility() {
        let viewport = Bounds {
            top: 1000.0,
            height: 800.0,
        };
        let below = Bounds {
            top: 1900.0,
            height: 300.0,
        };
        assert!(!below.intersects_with_margin(&viewport, 0.0));
        assert!(below.intersects_with_margin(&viewport, 200.0));

        let far = Bounds {
            top: 4000.0,
            height: 300.0,
        };
        assert!(!far.intersects_with_margin(&viewport, 300.0));

        let above = Bounds {
            top: 500.0,
            height: 400.0,
        };
        assert!(!above.intersects_with_margin(&viewport, 50.0));
        assert!(above.intersects_with_margin(&viewport, 150.0));
    }
}

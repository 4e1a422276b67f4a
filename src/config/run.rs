use serde::{Deserialize, Serialize};

use crate::{ai::CommentStyle, engine::quota::QuotaTargets, error::EngageError};

use super::{env::AppConfig, pacing::PacingConfig};

const API_KEY_PREFIX: &str = "sk-";
const API_KEY_MIN_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct RunDefaults {
    pub target_likes: u32,
    pub target_comments: u32,
    pub single_word_comments: u32,
    pub adaptive_comments: u32,
    pub adaptive_style: CommentStyle,
    pub like_probability: f64,
    pub comment_probability: f64,
    pub single_word_ratio: f64,
    pub max_posts: Option<u32>,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            target_likes: 10,
            target_comments: 5,
            single_word_comments: 3,
            adaptive_comments: 2,
            adaptive_style: CommentStyle::Adaptive,
            like_probability: 0.8,
            comment_probability: 0.5,
            single_word_ratio: 0.7,
            max_posts: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub api_key: Option<String>,
    pub target_likes: Option<u32>,
    pub target_comments: Option<u32>,
    pub single_word_comments: Option<u32>,
    pub adaptive_comments: Option<u32>,
    pub adaptive_style: Option<CommentStyle>,
    pub like_probability: Option<f64>,
    pub comment_probability: Option<f64>,
    pub single_word_ratio: Option<f64>,
    pub likes_enabled: Option<bool>,
    pub comments_enabled: Option<bool>,
    pub max_posts: Option<u32>,
    pub seed: Option<u64>,
    pub pacing: Option<PacingConfig>,
}

/// Immutable, validated snapshot for exactly one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_key: Option<String>,
    pub targets: QuotaTargets,
    pub adaptive_style: CommentStyle,
    pub like_probability: f64,
    pub comment_probability: f64,
    pub single_word_ratio: f64,
    pub max_posts: Option<u32>,
    pub seed: u64,
    pub pacing: PacingConfig,
}

impl RunSettings {
    /// `fallback_seed` is only used when the request carries no seed.
    pub fn validate(self, app: &AppConfig, fallback_seed: u64) -> Result<RunConfig, EngageError> {
        let defaults = &app.run_defaults;
        let target_likes = self.target_likes.unwrap_or(defaults.target_likes);
        let target_comments = self.target_comments.unwrap_or(defaults.target_comments);
        let single_word = self
            .single_word_comments
            .unwrap_or(defaults.single_word_comments);
        let adaptive = self.adaptive_comments.unwrap_or(defaults.adaptive_comments);

        // Split is checked on the caller's numbers, before disabled types are zeroed.
        let targets = QuotaTargets::new(target_likes, target_comments, single_word, adaptive)?;

        let like_probability = probability(
            "like_probability",
            self.like_probability.unwrap_or(defaults.like_probability),
        )?;
        let comment_probability = probability(
            "comment_probability",
            self.comment_probability
                .unwrap_or(defaults.comment_probability),
        )?;
        let single_word_ratio = probability(
            "single_word_ratio",
            self.single_word_ratio.unwrap_or(defaults.single_word_ratio),
        )?;

        let targets = targets.restricted(
            self.likes_enabled.unwrap_or(true),
            self.comments_enabled.unwrap_or(true),
        );
        if targets.is_empty() {
            return Err(EngageError::invalid_config(
                "nothing to do: every enabled quota is zero",
            ));
        }

        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| app.provider.api_key.clone());
        if targets.comments > 0 {
            match api_key.as_deref() {
                Some(key) => validate_api_key(key)?,
                None => {
                    return Err(EngageError::invalid_config(
                        "an API key is required when comments are requested",
                    ))
                }
            }
        }

        let pacing = self.pacing.unwrap_or_else(|| app.pacing.clone());
        validate_pacing(&pacing)?;

        if self.max_posts == Some(0) {
            return Err(EngageError::invalid_config("max_posts must be at least 1"));
        }

        Ok(RunConfig {
            api_key,
            targets,
            adaptive_style: self.adaptive_style.unwrap_or(defaults.adaptive_style),
            like_probability,
            comment_probability,
            single_word_ratio,
            max_posts: self.max_posts.or(defaults.max_posts),
            seed: self.seed.unwrap_or(fallback_seed),
            pacing,
        })
    }
}

pub fn validate_api_key(key: &str) -> Result<(), EngageError> {
    if !key.starts_with(API_KEY_PREFIX)
        || key.len() < API_KEY_MIN_LEN
        || key.chars().any(char::is_whitespace)
    {
        return Err(EngageError::invalid_config("Invalid OpenAI API key format"));
    }
    Ok(())
}

fn probability(name: &str, value: f64) -> Result<f64, EngageError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngageError::invalid_config(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(value)
}

fn validate_pacing(pacing: &PacingConfig) -> Result<(), EngageError> {
    if let Some((name, _)) = pacing
        .delay_ranges()
        .iter()
        .find(|(_, range)| !range.is_valid())
    {
        return Err(EngageError::invalid_config(format!(
            "{name}: minimum exceeds maximum"
        )));
    }
    if !pacing.scroll_distance.is_valid() {
        return Err(EngageError::invalid_config(
            "scroll_distance: minimum exceeds maximum",
        ));
    }
    if pacing.scroll_distance.min_px == 0 {
        return Err(EngageError::invalid_config(
            "scroll_distance must advance at least one pixel",
        ));
    }
    Ok(())
}

use std::{env, path::PathBuf, time::Duration};

use super::{
    env::{AppConfig, ConfigError, DirectoryConfig, LoggingConfig, ProviderConfig},
    pacing::{DelayRange, PacingConfig, PixelRange},
    run::RunDefaults,
};
use crate::ai::CommentStyle;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider = ProviderConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            api_url: env::var("OPENAI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_millis(parse_or("PROVIDER_TIMEOUT_MS", 30_000u64)?),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            runs_filename: env::var("RUNS_FILENAME").unwrap_or_else(|_| "runs.jsonl".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone = env::var("BOT_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        if timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid {
                key: "BOT_TIMEZONE",
                reason: format!("unknown timezone `{timezone}`"),
            });
        }

        let feed_fixture = env::var("FEED_FIXTURE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            provider,
            directories,
            logging,
            timezone,
            feed_fixture,
            event_log_capacity: parse_or("EVENT_LOG_CAPACITY", 500usize)?,
            pacing: load_pacing()?,
            run_defaults: load_run_defaults()?,
        })
    }
}

fn load_pacing() -> Result<PacingConfig, ConfigError> {
    let defaults = PacingConfig::default();
    Ok(PacingConfig {
        scroll_settle: parse_range("DELAY_SCROLL_SETTLE_MS", defaults.scroll_settle)?,
        click_settle: parse_range("DELAY_CLICK_SETTLE_MS", defaults.click_settle)?,
        focus_settle: parse_range("DELAY_FOCUS_SETTLE_MS", defaults.focus_settle)?,
        type_settle: parse_range("DELAY_TYPE_SETTLE_MS", defaults.type_settle)?,
        submit_settle: parse_range("DELAY_SUBMIT_SETTLE_MS", defaults.submit_settle)?,
        verify_settle: parse_range("DELAY_VERIFY_SETTLE_MS", defaults.verify_settle)?,
        between_posts: parse_range("DELAY_BETWEEN_POSTS_MS", defaults.between_posts)?,
        scroll_pause: parse_range("DELAY_SCROLL_PAUSE_MS", defaults.scroll_pause)?,
        scroll_distance: parse_pixels("SCROLL_DISTANCE_PX", defaults.scroll_distance)?,
        visibility_margin_px: parse_or("VISIBILITY_MARGIN_PX", defaults.visibility_margin_px)?,
        max_stale_scrolls: parse_or("MAX_STALE_SCROLLS", defaults.max_stale_scrolls)?,
        composer_wait_ms: parse_or("COMPOSER_WAIT_MS", defaults.composer_wait_ms)?,
        submit_wait_ms: parse_or("SUBMIT_WAIT_MS", defaults.submit_wait_ms)?,
        wait_poll_ms: parse_or("WAIT_POLL_MS", defaults.wait_poll_ms)?,
    })
}

fn load_run_defaults() -> Result<RunDefaults, ConfigError> {
    let defaults = RunDefaults::default();
    let adaptive_style = match env::var("DEFAULT_COMMENT_STYLE") {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.parse::<CommentStyle>()
                .map_err(|err| ConfigError::Invalid {
                    key: "DEFAULT_COMMENT_STYLE",
                    reason: err.to_string(),
                })?
        }
        _ => defaults.adaptive_style,
    };

    Ok(RunDefaults {
        target_likes: parse_or("DEFAULT_TARGET_LIKES", defaults.target_likes)?,
        target_comments: parse_or("DEFAULT_TARGET_COMMENTS", defaults.target_comments)?,
        single_word_comments: parse_or(
            "DEFAULT_SINGLE_WORD_COMMENTS",
            defaults.single_word_comments,
        )?,
        adaptive_comments: parse_or("DEFAULT_ADAPTIVE_COMMENTS", defaults.adaptive_comments)?,
        adaptive_style,
        like_probability: parse_or("DEFAULT_LIKE_PROBABILITY", defaults.like_probability)?,
        comment_probability: parse_or(
            "DEFAULT_COMMENT_PROBABILITY",
            defaults.comment_probability,
        )?,
        single_word_ratio: parse_or("DEFAULT_SINGLE_WORD_RATIO", defaults.single_word_ratio)?,
        max_posts: env::var("DEFAULT_MAX_POSTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .or(defaults.max_posts),
    })
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("cannot parse `{raw}`"),
            })
        }
        _ => Ok(default),
    }
}

fn parse_pixels(key: &'static str, default: PixelRange) -> Result<PixelRange, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            PixelRange::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key,
                reason: format!("expected `min,max` pixels, got `{raw}`"),
            })
        }
        _ => Ok(default),
    }
}

fn parse_range(key: &'static str, default: DelayRange) -> Result<DelayRange, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            DelayRange::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key,
                reason: format!("expected `min,max` milliseconds, got `{raw}`"),
            })
        }
        _ => Ok(default),
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inclusive bounds, in milliseconds, for one randomized pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    #[cfg(test)]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    pub fn parse(raw: &str) -> Option<Self> {
        parse_pair::<u64>(raw).map(|(min, max)| Self::new(min, max))
    }
}

/// Inclusive bounds, in pixels, for one scroll step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRange {
    pub min_px: u32,
    pub max_px: u32,
}

impl PixelRange {
    pub const fn new(min_px: u32, max_px: u32) -> Self {
        Self { min_px, max_px }
    }

    pub fn is_valid(&self) -> bool {
        self.min_px <= self.max_px
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (min, max) = parse_pair::<u64>(raw)?;
        Some(Self::new(u32::try_from(min).ok()?, u32::try_from(max).ok()?))
    }
}

fn parse_pair<T: std::str::FromStr + Copy>(raw: &str) -> Option<(T, T)> {
    let mut parts = raw.split(',').map(str::trim);
    let min = parts.next()?.parse::<T>().ok()?;
    let max = match parts.next() {
        Some(value) => value.parse::<T>().ok()?,
        None => min,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((min, max))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub scroll_settle: DelayRange,
    pub click_settle: DelayRange,
    pub focus_settle: DelayRange,
    pub type_settle: DelayRange,
    pub submit_settle: DelayRange,
    pub verify_settle: DelayRange,
    pub between_posts: DelayRange,
    pub scroll_pause: DelayRange,
    pub scroll_distance: PixelRange,
    pub visibility_margin_px: u32,
    pub max_stale_scrolls: u32,
    pub composer_wait_ms: u64,
    pub submit_wait_ms: u64,
    pub wait_poll_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            scroll_settle: DelayRange::new(800, 1200),
            click_settle: DelayRange::new(400, 700),
            focus_settle: DelayRange::new(200, 400),
            type_settle: DelayRange::new(800, 1200),
            submit_settle: DelayRange::new(800, 1200),
            verify_settle: DelayRange::new(1500, 2500),
            between_posts: DelayRange::new(2500, 4000),
            scroll_pause: DelayRange::new(1500, 3000),
            scroll_distance: PixelRange::new(500, 1100),
            visibility_margin_px: 300,
            max_stale_scrolls: 4,
            composer_wait_ms: 3000,
            submit_wait_ms: 2000,
            wait_poll_ms: 100,
        }
    }
}

impl PacingConfig {
    pub fn composer_wait(&self) -> Duration {
        Duration::from_millis(self.composer_wait_ms)
    }

    pub fn submit_wait(&self) -> Duration {
        Duration::from_millis(self.submit_wait_ms)
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }

    pub fn delay_ranges(&self) -> [(&'static str, DelayRange); 8] {
        [
            ("scroll_settle", self.scroll_settle),
            ("click_settle", self.click_settle),
            ("focus_settle", self.focus_settle),
            ("type_settle", self.type_settle),
            ("submit_settle", self.submit_settle),
            ("verify_settle", self.verify_settle),
            ("between_posts", self.between_posts),
            ("scroll_pause", self.scroll_pause),
        ]
    }

    /// No pauses and millisecond wait bounds, for driving the engine in tests.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            scroll_settle: DelayRange::zero(),
            click_settle: DelayRange::zero(),
            focus_settle: DelayRange::zero(),
            type_settle: DelayRange::zero(),
            submit_settle: DelayRange::zero(),
            verify_settle: DelayRange::zero(),
            between_posts: DelayRange::zero(),
            scroll_pause: DelayRange::zero(),
            scroll_distance: PixelRange::new(800, 800),
            visibility_margin_px: 300,
            max_stale_scrolls: 2,
            composer_wait_ms: 20,
            submit_wait_ms: 20,
            wait_poll_ms: 2,
        }
    }
}

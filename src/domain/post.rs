use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ID_CONTENT_PREFIX_CHARS: usize = 100;
const ID_HASH_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fallback is a pure function of `(content, position)`, so repeat scans of the same
/// post produce the same id.
pub fn generate_post_id(natural_id: Option<&str>, content: &str, position: usize) -> PostId {
    if let Some(natural) = natural_id.map(str::trim).filter(|v| !v.is_empty()) {
        return PostId(natural.to_string());
    }

    let prefix: String = content.chars().take(ID_CONTENT_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b"#");
    hasher.update(position.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    PostId(format!("h{}", &digest[..ID_HASH_LEN]))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementState {
    pub liked: bool,
    pub commented: bool,
}

impl EngagementState {
    pub fn merge(self, other: EngagementState) -> EngagementState {
        EngagementState {
            liked: self.liked || other.liked,
            commented: self.commented || other.commented,
        }
    }

    pub fn fully_engaged(&self) -> bool {
        self.liked && self.commented
    }
}

#[derive(Debug, Clone)]
pub struct PostRecord {
    pub id: PostId,
    pub content: String,
    pub author: String,
    pub is_advertisement: bool,
    pub engagement: EngagementState,
}

impl PostRecord {
    pub fn excerpt(&self, max_chars: usize) -> String {
        excerpt(&self.content, max_chars)
    }
}

pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

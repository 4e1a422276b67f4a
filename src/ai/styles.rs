use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::CommentSubtype, error::EngageError};

use super::Generation;

const BASE_PROMPT: &str = "You are a LinkedIn engagement expert. Generate authentic, meaningful comments that add value to professional discussions. ";

const LONG_FORM_GUIDELINES: &str = r#"

Guidelines:
- Keep comments between 20-80 words
- Be genuine and avoid generic responses
- Add value to the conversation
- Use proper grammar and punctuation
- Avoid controversial topics
- Don't use excessive emojis or hashtags
- Make it personal but professional
- Encourage engagement from others"#;

const SKIP_CONTRACT: &str = r#"

If the post is an advertisement, a job listing, purely promotional, or otherwise not worth engaging with, do not write a comment.

Respond only with JSON in one of these two shapes:
{ "comment": "your comment here" }
{ "skip": true, "reason": "why no comment should be posted" }"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStyle {
    SingleWord,
    #[default]
    Adaptive,
    Professional,
    Casual,
    Insightful,
    Supportive,
}

impl CommentStyle {
    pub fn label(&self) -> &'static str {
        match self {
            CommentStyle::SingleWord => "single_word",
            CommentStyle::Adaptive => "adaptive",
            CommentStyle::Professional => "professional",
            CommentStyle::Casual => "casual",
            CommentStyle::Insightful => "insightful",
            CommentStyle::Supportive => "supportive",
        }
    }

    pub fn for_subtype(subtype: CommentSubtype, adaptive_style: CommentStyle) -> CommentStyle {
        match subtype {
            CommentSubtype::SingleWord => CommentStyle::SingleWord,
            CommentSubtype::Adaptive => adaptive_style,
        }
    }

    pub fn is_long_form(&self) -> bool {
        !matches!(self, CommentStyle::SingleWord | CommentStyle::Adaptive)
    }

    fn instruction(&self) -> &'static str {
        match self {
            CommentStyle::SingleWord => "Reply with a single word or at most two words that react naturally to the post, such as \"Congratulations!\" or \"Great insight\". No hashtags, no emojis, no full sentences.",
            CommentStyle::Adaptive => "Write a short reaction of one sentence (under 20 words) whose tone adapts to the post: congratulate achievements, empathise with setbacks, agree with or build on insights. Refer to something specific in the post.",
            CommentStyle::Professional => "Write in a professional, business-focused tone. Use industry terminology appropriately and maintain formal language. Focus on business insights and professional perspectives.",
            CommentStyle::Casual => "Write in a friendly, conversational tone while remaining professional. Use a more relaxed approach but keep it appropriate for LinkedIn. Be approachable and personable.",
            CommentStyle::Insightful => "Provide thoughtful analysis and deeper perspectives. Ask meaningful questions or share relevant insights that encourage further discussion. Be intellectually engaging.",
            CommentStyle::Supportive => "Be encouraging and supportive. Acknowledge achievements, offer congratulations, or provide positive reinforcement. Focus on building others up and showing appreciation.",
        }
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from(BASE_PROMPT);
        prompt.push_str(self.instruction());
        if self.is_long_form() {
            prompt.push_str(LONG_FORM_GUIDELINES);
        }
        prompt.push_str(SKIP_CONTRACT);
        prompt
    }

    pub fn user_prompt(&self, content: &str) -> String {
        format!(
            "Please generate a {} LinkedIn comment for this post:\n\n{}",
            self.label().replace('_', "-"),
            content
        )
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            CommentStyle::SingleWord => 20,
            CommentStyle::Adaptive => 60,
            _ => 150,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            CommentStyle::SingleWord => 0.9,
            _ => 0.7,
        }
    }
}

impl fmt::Display for CommentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CommentStyle {
    type Err = EngageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single_word" | "singleword" | "terse" => Ok(CommentStyle::SingleWord),
            "adaptive" => Ok(CommentStyle::Adaptive),
            "professional" | "formal" => Ok(CommentStyle::Professional),
            "casual" => Ok(CommentStyle::Casual),
            "insightful" | "analytical" => Ok(CommentStyle::Insightful),
            "supportive" | "encouraging" => Ok(CommentStyle::Supportive),
            other => Err(EngageError::invalid_config(format!(
                "unknown comment style `{other}`"
            ))),
        }
    }
}

pub fn parse_generation(raw: &str) -> Result<Generation, EngageError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| EngageError::MalformedResponse(format!("not valid JSON: {err}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| EngageError::MalformedResponse("expected a JSON object".into()))?;

    if object.get("skip").and_then(Value::as_bool) == Some(true) {
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                EngageError::MalformedResponse("skip response without a reason".into())
            })?;
        return Ok(Generation::Skip {
            reason: reason.to_string(),
        });
    }

    match object.get("comment") {
        Some(Value::String(comment)) if !comment.trim().is_empty() => {
            Ok(Generation::Comment(comment.trim().to_string()))
        }
        Some(Value::String(_)) => Err(EngageError::MalformedResponse("comment is blank".into())),
        Some(_) => Err(EngageError::MalformedResponse(
            "comment field is not a string".into(),
        )),
        None => Err(EngageError::MalformedResponse(
            "response has neither `comment` nor `skip`".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_comment_and_trims() {
        let parsed = parse_generation(r#"{ "comment": "  Great insight!  " }"#).unwrap();
        assert_eq!(parsed, Generation::Comment("Great insight!".into()));
    }

    #[test]
    fn skip_branch_is_a_first_class_outcome() {
        let parsed = parse_generation(r#"{"skip": true, "reason": "promotional"}"#).unwrap();
        assert_eq!(
            parsed,
            Generation::Skip {
                reason: "promotional".into()
            }
        );
    }

    #[test]
    fn empty_object_is_malformed() {
        let err = parse_generation("{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn skip_without_reason_is_malformed() {
        let err = parse_generation(r#"{"skip": true}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn non_string_comment_is_malformed() {
        assert!(parse_generation(r#"{"comment": 5}"#).is_err());
        assert!(parse_generation(r#"{"comment": "   "}"#).is_err());
        assert!(parse_generation("not json").is_err());
        assert!(parse_generation(r#"["comment"]"#).is_err());
    }

    #[test]
    fn skip_false_falls_through_to_comment() {
        let parsed = parse_generation(r#"{"skip": false, "comment": "Nice"}"#).unwrap();
        assert_eq!(parsed, Generation::Comment("Nice".into()));
    }

    #[test]
    fn subtype_routing_uses_configured_adaptive_style() {
        assert_eq!(
            CommentStyle::for_subtype(CommentSubtype::SingleWord, CommentStyle::Casual),
            CommentStyle::SingleWord
        );
        assert_eq!(
            CommentStyle::for_subtype(CommentSubtype::Adaptive, CommentStyle::Casual),
            CommentStyle::Casual
        );
    }

    #[test]
    fn long_form_prompts_carry_guidelines_and_contract() {
        let prompt = CommentStyle::Professional.system_prompt();
        assert!(prompt.contains("20-80 words"));
        assert!(prompt.contains("\"skip\": true"));
        let terse = CommentStyle::SingleWord.system_prompt();
        assert!(!terse.contains("20-80 words"));
        assert!(terse.contains("\"comment\""));
    }

    #[test]
    fn style_names_parse_with_aliases() {
        assert_eq!("formal".parse::<CommentStyle>().unwrap(), CommentStyle::Professional);
        assert_eq!("single-word".parse::<CommentStyle>().unwrap(), CommentStyle::SingleWord);
        assert!("poetic".parse::<CommentStyle>().is_err());
    }
}

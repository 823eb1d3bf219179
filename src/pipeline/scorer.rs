//! Importance scorer: engagement and content signals against a fixed threshold.
//!
//! score = min(max_score,
//!     reactions * reaction_weight + replies * reply_weight
//!     + keyword_bonus      (any salient keyword)
//!     + exclamation_bonus  (two or more `!`)
//!     + emoji_bonus        (celebration / alert emoji)
//!     + long_message_bonus (longer than `long_message_chars`))
//!
//! Messages shorter than `min_message_chars` score zero. Excluded authors
//! never reach scoring.

use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::pipeline::rules::KeywordMatcher;
use crate::pipeline::types::{ImportanceScore, NormalizedMessage};

const SIGNAL_EMOJI: &[&str] = &[
    "🎉", "🎊", "🥳", "🚀", "🔥", "⚠", "🚨", "❗", "‼", "✅", "💯", ":tada:", ":rocket:", ":fire:",
    ":warning:", ":rotating_light:", ":white_check_mark:", ":100:",
];

/// Deterministic importance scorer.
#[derive(Debug, Clone)]
pub struct ImportanceScorer {
    threshold: f64,
    max_score: f64,
    reaction_weight: f64,
    reply_weight: f64,
    keyword_bonus: f64,
    exclamation_bonus: f64,
    emoji_bonus: f64,
    long_message_chars: usize,
    long_message_bonus: f64,
    min_message_chars: usize,
    keywords: KeywordMatcher,
    emoji: KeywordMatcher,
    excluded_authors: HashSet<String>,
}

impl ImportanceScorer {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        if !config.importance_threshold.is_finite() || config.importance_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "importance_threshold".into(),
                message: format!("{} is not a non-negative number", config.importance_threshold),
            });
        }
        if !config.max_score.is_finite() || config.max_score < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "max_score".into(),
                message: format!("{} is not a non-negative number", config.max_score),
            });
        }

        Ok(Self {
            threshold: config.importance_threshold,
            max_score: config.max_score,
            reaction_weight: config.reaction_weight,
            reply_weight: config.reply_weight,
            keyword_bonus: config.keyword_bonus,
            exclamation_bonus: config.exclamation_bonus,
            emoji_bonus: config.emoji_bonus,
            long_message_chars: config.long_message_chars,
            long_message_bonus: config.long_message_bonus,
            min_message_chars: config.min_message_chars,
            keywords: KeywordMatcher::new(&config.salient_keywords)?,
            emoji: KeywordMatcher::new(SIGNAL_EMOJI)?,
            excluded_authors: config.excluded_authors.iter().cloned().collect(),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Automated or anonymous posters are filtered out before scoring.
    pub fn is_excluded(&self, message: &NormalizedMessage) -> bool {
        let author = message.raw.author_id.as_str();
        author.is_empty() || self.excluded_authors.contains(author)
    }

    /// Raw score of a message, ignoring author exclusion.
    pub fn score(&self, message: &NormalizedMessage) -> ImportanceScore {
        let text = message.text.trim();
        let length = text.chars().count();
        if length < self.min_message_chars {
            return ImportanceScore::ZERO;
        }

        let raw = &message.raw;
        let mut score = f64::from(raw.reaction_count) * self.reaction_weight
            + f64::from(raw.reply_count) * self.reply_weight;

        if self.keywords.is_match(text) {
            score += self.keyword_bonus;
        }
        if text.matches('!').count() >= 2 {
            score += self.exclamation_bonus;
        }
        if self.emoji.is_match(text) {
            score += self.emoji_bonus;
        }
        if length > self.long_message_chars {
            score += self.long_message_bonus;
        }

        ImportanceScore::bounded(score, self.max_score)
    }

    /// `(is_important, score)`; ties at the threshold are important.
    pub fn evaluate(&self, message: &NormalizedMessage) -> (bool, ImportanceScore) {
        if self.is_excluded(message) {
            return (false, ImportanceScore::ZERO);
        }
        let score = self.score(message);
        (score.value() >= self.threshold, score)
    }
}

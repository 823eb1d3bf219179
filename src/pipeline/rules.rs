//! Topic classifier: ordered keyword rules, first match wins.
//!
//! Every important message gets exactly one topic:
//! - rules are evaluated top to bottom in taxonomy order
//! - the first rule whose keyword set matches decides the topic
//! - no match → `Uncategorized`
//!
//! The rule order is the tie-break between overlapping keyword sets, so it is
//! part of configuration and can be inspected through [`TopicClassifier::rules`].

use regex::Regex;
use tracing::debug;

use crate::config::TaxonomyConfig;
use crate::error::ConfigError;
use crate::pipeline::types::{NormalizedMessage, Topic};

/// Case-insensitive disjunction of keywords compiled into one regex.
///
/// Keyword forms:
/// - `word` / `two words` → whole-word match, any whitespace between words
/// - `prefix*` → word starting with `prefix`
/// - symbols or emoji (`?`, `🎉`, `:tada:`) → literal match
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    regex: Option<Regex>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, ConfigError> {
        let mut alternatives = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() || keyword == "*" {
                return Err(ConfigError::InvalidKeyword {
                    keyword: keyword.to_string(),
                    reason: "empty keyword".into(),
                });
            }
            alternatives.push(keyword_pattern(keyword));
        }

        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }

        let pattern = format!("(?i)(?:{})", alternatives.join("|"));
        let regex = Regex::new(&pattern).map_err(|e| ConfigError::InvalidKeyword {
            keyword: pattern.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}

/// Translate one keyword into a regex fragment.
fn keyword_pattern(keyword: &str) -> String {
    let (body, prefix) = match keyword.strip_suffix('*') {
        Some(body) => (body, true),
        None => (keyword, false),
    };

    let escaped = body
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if body.starts_with(is_word) { r"\b" } else { "" };
    let tail = if prefix {
        r"\w*"
    } else if body.ends_with(is_word) {
        r"\b"
    } else {
        ""
    };

    format!("{lead}{escaped}{tail}")
}

/// A single (topic, keyword set) entry.
#[derive(Debug, Clone)]
pub struct TopicRule {
    pub topic: Topic,
    /// Keywords as configured, for inspection and logging.
    pub keywords: Vec<String>,
    matcher: KeywordMatcher,
}

impl TopicRule {
    pub fn new(topic: Topic, keywords: Vec<String>) -> Result<Self, ConfigError> {
        let matcher = KeywordMatcher::new(&keywords)?;
        Ok(Self {
            topic,
            keywords,
            matcher,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

/// Priority-ordered topic classifier.
#[derive(Debug, Clone)]
pub struct TopicClassifier {
    rules: Vec<TopicRule>,
}

impl TopicClassifier {
    /// Build the classifier from a taxonomy, preserving its order.
    pub fn from_config(taxonomy: &TaxonomyConfig) -> Result<Self, ConfigError> {
        let mut classifier = Self::empty();
        for rule in &taxonomy.rules {
            classifier.add_rule(rule.topic, rule.keywords.clone())?;
        }
        Ok(classifier)
    }

    /// Classifier with the default taxonomy.
    pub fn default_rules() -> Self {
        Self::from_config(&TaxonomyConfig::default()).expect("default taxonomy compiles")
    }

    /// Classifier without rules; every message is `Uncategorized`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule at the lowest priority.
    pub fn add_rule(&mut self, topic: Topic, keywords: Vec<String>) -> Result<(), ConfigError> {
        if topic == Topic::Uncategorized {
            return Err(ConfigError::InvalidValue {
                key: "taxonomy".into(),
                message: "Uncategorized is the fallback and cannot carry keywords".into(),
            });
        }
        self.rules.push(TopicRule::new(topic, keywords)?);
        Ok(())
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[TopicRule] {
        &self.rules
    }

    /// Classify an important message.
    pub fn classify(&self, message: &NormalizedMessage) -> Topic {
        let topic = self.classify_text(&message.text);
        debug!(
            ts = %message.raw.timestamp,
            channel = %message.raw.channel_id,
            topic = topic.label(),
            "Message classified"
        );
        topic
    }

    /// Classify raw text. Total: always returns a topic.
    pub fn classify_text(&self, text: &str) -> Topic {
        self.rules
            .iter()
            .find(|rule| rule.matches(text))
            .map(|rule| rule.topic)
            .unwrap_or(Topic::Uncategorized)
    }
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::default_rules()
    }
}

//! Date and deadline extraction.
//!
//! Four matcher families run independently over the same text:
//! 1. absolute dates (`March 15th`, `15 of march 2025`, `12/25/2025`, `2025-03-15`)
//! 2. relative days (`today`, `tomorrow`, `next week`, `friday`, `end of day`)
//! 3. times of day (`at 3pm`, `by 10:30am`, `noon`)
//! 4. relative offsets (`in 3 days`, `two weeks ago`)
//!
//! Raw spans are merged so that no two emitted dates overlap: the longest span
//! wins, equal lengths go to the earlier family. Each survivor is then typed,
//! with a nearby `deadline` / `due` / `by` in the same sentence upgrading it to
//! [`DateType::Deadline`].

use regex::Regex;

use crate::config::EngineConfig;
use crate::pipeline::types::{DateMatch, DateType};

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const WEEKDAY: &str = r"(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)";
const COUNT: &str = r"(?:\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|a\s+couple\s+of|a\s+few)";
const TIME_PREPOSITION: &str = r"(?:at|by|before|after|until|around)";

/// Characters that end the sentence a deadline marker can apply to.
const SENTENCE_END: &[char] = &['.', '!', '?', '\n'];

/// Matcher family. Declaration order is the tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatcherFamily {
    Absolute,
    Relative,
    TimeOfDay,
    Offset,
}

impl MatcherFamily {
    /// Date type of a span from this family when no deadline marker is near.
    pub fn base_type(self) -> DateType {
        match self {
            Self::Absolute => DateType::Absolute,
            Self::Relative | Self::Offset => DateType::Relative,
            Self::TimeOfDay => DateType::TimeOfDay,
        }
    }
}

/// A candidate span before merging. Offsets are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSpan {
    pub start: usize,
    pub end: usize,
    pub family: MatcherFamily,
}

impl RawSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &RawSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One matcher family: a set of case-insensitive patterns.
#[derive(Debug, Clone)]
pub struct SpanMatcher {
    family: MatcherFamily,
    patterns: Vec<Regex>,
}

impl SpanMatcher {
    fn compile(family: MatcherFamily, patterns: &[String]) -> Self {
        Self {
            family,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
                .collect(),
        }
    }

    pub fn absolute() -> Self {
        Self::compile(
            MatcherFamily::Absolute,
            &[
                format!(r"\b{MONTH}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?\b(?:,?\s+\d{{4}}\b)?"),
                format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\b(?:,?\s+\d{{4}}\b)?"),
                r"\b\d{1,2}[/-]\d{1,2}[/-](?:\d{4}|\d{2})\b".to_string(),
                r"\b\d{4}-\d{1,2}-\d{1,2}\b".to_string(),
            ],
        )
    }

    pub fn relative() -> Self {
        Self::compile(
            MatcherFamily::Relative,
            &[
                r"\b(?:today|tonight|tomorrow|yesterday)\b".to_string(),
                format!(r"\b(?:next|last|this)\s+(?:week|month|year|weekend|{WEEKDAY})\b"),
                r"\b(?:end\s+of\s+(?:the\s+)?(?:day|week|month)|eod|eow)\b".to_string(),
                format!(r"\b{WEEKDAY}\b"),
            ],
        )
    }

    pub fn time_of_day() -> Self {
        Self::compile(
            MatcherFamily::TimeOfDay,
            &[
                format!(r"\b{TIME_PREPOSITION}\s+\d{{1,2}}(?::[0-5]\d)?\s*(?:am|pm)\b"),
                format!(r"\b{TIME_PREPOSITION}\s+(?:noon|midnight|\d{{1,2}}:[0-5]\d)\b"),
                r"\b\d{1,2}(?::[0-5]\d)?\s*(?:am|pm)\b".to_string(),
                r"\b(?:noon|midnight)\b".to_string(),
            ],
        )
    }

    pub fn offset() -> Self {
        Self::compile(
            MatcherFamily::Offset,
            &[
                format!(r"\bin\s+{COUNT}\s+(?:day|week|month)s?\b"),
                format!(r"\b{COUNT}\s+(?:day|week|month)s?\s+ago\b"),
            ],
        )
    }

    pub fn family(&self) -> MatcherFamily {
        self.family
    }

    /// All spans any pattern of this family finds in `text`.
    pub fn find(&self, text: &str) -> Vec<RawSpan> {
        self.patterns
            .iter()
            .flat_map(|pattern| pattern.find_iter(text))
            .map(|m| RawSpan {
                start: m.start(),
                end: m.end(),
                family: self.family,
            })
            .collect()
    }
}

/// Keep the longest of overlapping spans; equal lengths go to the earlier
/// family, then the earlier start. Result is ordered by position.
pub fn merge_spans(mut spans: Vec<RawSpan>) -> Vec<RawSpan> {
    spans.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then(a.family.cmp(&b.family))
            .then(a.start.cmp(&b.start))
    });

    let mut kept: Vec<RawSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.is_empty() || kept.iter().any(|k| k.overlaps(&span)) {
            continue;
        }
        kept.push(span);
    }

    kept.sort_by_key(|s| s.start);
    kept
}

/// Byte offset `n` chars before `from` (or 0).
fn back_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(from)
}

/// Byte offset `n` chars after `from` (or the end).
fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Pattern-based date extractor.
#[derive(Debug, Clone)]
pub struct DateExtractor {
    matchers: Vec<SpanMatcher>,
    deadline_marker: Regex,
    context_radius: usize,
    deadline_lookbehind: usize,
    deadline_lookahead: usize,
}

impl DateExtractor {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            matchers: vec![
                SpanMatcher::absolute(),
                SpanMatcher::relative(),
                SpanMatcher::time_of_day(),
                SpanMatcher::offset(),
            ],
            deadline_marker: Regex::new(r"(?i)\b(?:deadline|due|by)\b").unwrap(),
            context_radius: config.context_radius,
            deadline_lookbehind: config.deadline_lookbehind,
            deadline_lookahead: config.deadline_lookahead,
        }
    }

    /// Unmerged spans from every family.
    pub fn raw_spans(&self, text: &str) -> Vec<RawSpan> {
        self.matchers.iter().flat_map(|m| m.find(text)).collect()
    }

    /// Non-overlapping, typed dates in text order. Empty when nothing matches.
    pub fn extract(&self, text: &str) -> Vec<DateMatch> {
        if text.is_empty() {
            return Vec::new();
        }

        merge_spans(self.raw_spans(text))
            .into_iter()
            .map(|span| DateMatch {
                date_text: text[span.start..span.end].to_lowercase(),
                date_type: self.classify(text, &span),
                start: span.start,
                end: span.end,
                context: self.context(text, &span),
            })
            .collect()
    }

    /// The marker must sit in the same sentence as the span.
    fn classify(&self, text: &str, span: &RawSpan) -> DateType {
        let mut from = back_chars(text, span.start, self.deadline_lookbehind);
        if let Some(i) = text[from..span.start].rfind(SENTENCE_END) {
            from += i + 1;
        }
        let mut to = forward_chars(text, span.end, self.deadline_lookahead);
        if let Some(i) = text[span.end..to].find(SENTENCE_END) {
            to = span.end + i;
        }
        if self.deadline_marker.is_match(&text[from..to]) {
            DateType::Deadline
        } else {
            span.family.base_type()
        }
    }

    fn context(&self, text: &str, span: &RawSpan) -> String {
        let from = back_chars(text, span.start, self.context_radius);
        let to = forward_chars(text, span.end, self.context_radius);
        text[from..to].replace('\n', " ").trim().to_string()
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

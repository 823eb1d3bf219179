//! Shared types for the content pipeline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Name used whenever the directory has no entry for an author or mention.
pub const FALLBACK_NAME: &str = "Unknown";

// ── Raw input ───────────────────────────────────────────────────────

/// A chat message as delivered by the chat source. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub text: String,
    pub author_id: String,
    /// Platform timestamp; doubles as the message reference.
    pub timestamp: String,
    pub reaction_count: u32,
    pub reply_count: u32,
    pub channel_id: String,
}

/// A channel the chat source can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub member_count: u32,
}

// ── Normalized message ──────────────────────────────────────────────

/// A raw message with mentions and author resolved to display names.
///
/// Lives for one processing run only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub raw: RawMessage,
    /// Text with every `<@ID>` token replaced by `@name`.
    pub text: String,
    pub author_name: String,
    pub has_mentions: bool,
}

impl NormalizedMessage {
    /// Short single-line preview of the resolved text.
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.text, max_chars)
    }
}

/// Collapse newlines and cut to `max_chars`, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        flat.to_string()
    }
}

// ── Importance ──────────────────────────────────────────────────────

/// Bounded, non-negative importance value. Computed once per message.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportanceScore(f64);

impl ImportanceScore {
    pub const ZERO: Self = Self(0.0);

    /// Clamp `value` into `[0, max]`.
    pub fn bounded(value: f64, max: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, max))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

// ── Topic taxonomy ──────────────────────────────────────────────────

/// Closed topic taxonomy. Declaration order is the display order of topic groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "Scheduling")]
    Scheduling,
    #[serde(rename = "Technical Discussions")]
    TechnicalDiscussions,
    #[serde(rename = "Announcements")]
    Announcements,
    #[serde(rename = "Questions & Help")]
    QuestionsAndHelp,
    #[serde(rename = "Celebrations")]
    Celebrations,
    #[serde(rename = "Project Updates")]
    ProjectUpdates,
    #[serde(rename = "Team Building")]
    TeamBuilding,
    #[serde(rename = "Tools & Resources")]
    ToolsAndResources,
    #[serde(rename = "Client Management")]
    ClientManagement,
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::Scheduling,
        Topic::TechnicalDiscussions,
        Topic::Announcements,
        Topic::QuestionsAndHelp,
        Topic::Celebrations,
        Topic::ProjectUpdates,
        Topic::TeamBuilding,
        Topic::ToolsAndResources,
        Topic::ClientManagement,
        Topic::Uncategorized,
    ];

    /// Human-readable label, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scheduling => "Scheduling",
            Self::TechnicalDiscussions => "Technical Discussions",
            Self::Announcements => "Announcements",
            Self::QuestionsAndHelp => "Questions & Help",
            Self::Celebrations => "Celebrations",
            Self::ProjectUpdates => "Project Updates",
            Self::TeamBuilding => "Team Building",
            Self::ToolsAndResources => "Tools & Resources",
            Self::ClientManagement => "Client Management",
            Self::Uncategorized => "Uncategorized",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Dates ───────────────────────────────────────────────────────────

/// Semantic type of an extracted date span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateType {
    Absolute,
    Relative,
    TimeOfDay,
    Deadline,
}

/// A merged, typed date span inside one message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateMatch {
    /// Lowercased span text.
    pub date_text: String,
    pub date_type: DateType,
    /// Byte offsets into the source text.
    pub start: usize,
    pub end: usize,
    /// Window of the source text around the span.
    pub context: String,
}

impl DateMatch {
    pub fn overlaps(&self, other: &DateMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A date found in a channel message, attributed to its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedDate {
    pub date_text: String,
    pub date_type: DateType,
    pub context: String,
    pub user_name: String,
    pub message_preview: String,
    pub source_message_ref: String,
}

/// Characters of message text kept in a date's `message_preview`.
pub const DATE_PREVIEW_CHARS: usize = 100;

impl ExtractedDate {
    pub fn from_match(date: DateMatch, message: &NormalizedMessage) -> Self {
        Self {
            date_text: date.date_text,
            date_type: date.date_type,
            context: date.context,
            user_name: message.author_name.clone(),
            message_preview: message.preview(DATE_PREVIEW_CHARS),
            source_message_ref: message.raw.timestamp.clone(),
        }
    }
}

// ── Per-message analysis ────────────────────────────────────────────

/// Scorer, classifier and extractor output for one message.
///
/// `topic` and `dates` are only filled for important messages.
#[derive(Debug, Clone)]
pub struct MessageAnalysis {
    pub message: NormalizedMessage,
    pub score: ImportanceScore,
    pub is_important: bool,
    pub topic: Option<Topic>,
    pub dates: Vec<DateMatch>,
}

/// Message record as exposed to renderers and API callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEntry {
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: String,
    pub reactions: u32,
    pub replies: u32,
    pub score: ImportanceScore,
}

impl From<&MessageAnalysis> for MessageEntry {
    fn from(analysis: &MessageAnalysis) -> Self {
        let raw = &analysis.message.raw;
        Self {
            text: analysis.message.text.clone(),
            user_id: raw.author_id.clone(),
            user_name: analysis.message.author_name.clone(),
            timestamp: raw.timestamp.clone(),
            reactions: raw.reaction_count,
            replies: raw.reply_count,
            score: analysis.score,
        }
    }
}

// ── Channel summary ─────────────────────────────────────────────────

/// Everything the renderer and mailer need about one channel for one window.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub total_messages: usize,
    pub important_messages: usize,
    /// Important messages in chronological order.
    pub important: Vec<MessageEntry>,
    /// Sparse: topics without messages are absent.
    pub topic_groups: BTreeMap<Topic, Vec<MessageEntry>>,
    pub messages_with_dates: usize,
    pub dates: Vec<ExtractedDate>,
}

impl ChannelSummary {
    /// Share of messages that were selected as important.
    pub fn importance_ratio(&self) -> f64 {
        if self.total_messages == 0 {
            0.0
        } else {
            self.important_messages as f64 / self.total_messages as f64
        }
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Who the chat source is connected as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub workspace: String,
    pub user: String,
}

/// Chat platform collaborator. Pure I/O, no content logic.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Source name for logging (e.g. "slack").
    fn name(&self) -> &str;

    /// Check that the credentials are accepted.
    async fn verify(&self) -> Result<SourceIdentity, TransportError>;

    /// Channels the source can read.
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, TransportError>;

    /// Messages posted in `channel_id` between `since` and `until`, oldest first.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>, TransportError>;
}

/// User directory collaborator.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Display name for `user_id`, or `None` if the directory has no entry.
    async fn resolve_user(&self, user_id: &str) -> Result<Option<String>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_labels_match_serialization() {
        for topic in Topic::ALL {
            let json = serde_json::to_value(topic).unwrap();
            assert_eq!(json, topic.label());
        }
    }

    #[test]
    fn topic_map_serializes_with_label_keys_in_taxonomy_order() {
        let mut groups: BTreeMap<Topic, Vec<u32>> = BTreeMap::new();
        groups.insert(Topic::ClientManagement, vec![2]);
        groups.insert(Topic::Scheduling, vec![1]);
        let json = serde_json::to_string(&groups).unwrap();
        assert_eq!(json, r#"{"Scheduling":[1],"Client Management":[2]}"#);
    }

    #[test]
    fn date_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(DateType::TimeOfDay).unwrap(),
            "time-of-day"
        );
        assert_eq!(serde_json::to_value(DateType::Deadline).unwrap(), "deadline");
    }

    #[test]
    fn importance_score_is_bounded() {
        assert_eq!(ImportanceScore::bounded(-1.0, 10.0).value(), 0.0);
        assert_eq!(ImportanceScore::bounded(42.0, 10.0).value(), 10.0);
        assert_eq!(ImportanceScore::bounded(f64::NAN, 10.0).value(), 0.0);
        assert_eq!(ImportanceScore::bounded(3.5, 10.0).value(), 3.5);
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("line one\nline two", 100), "line one line two");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("  padded  ", 100), "padded");
    }

    #[test]
    fn date_match_overlap() {
        let a = DateMatch {
            date_text: "tomorrow".into(),
            date_type: DateType::Relative,
            start: 0,
            end: 8,
            context: String::new(),
        };
        let mut b = a.clone();
        b.start = 8;
        b.end = 12;
        assert!(!a.overlaps(&b));
        b.start = 7;
        assert!(a.overlaps(&b));
    }

    #[test]
    fn empty_summary_ratio_is_zero() {
        let summary = ChannelSummary {
            channel_id: "C1".into(),
            total_messages: 0,
            important_messages: 0,
            important: vec![],
            topic_groups: BTreeMap::new(),
            messages_with_dates: 0,
            dates: vec![],
        };
        assert_eq!(summary.importance_ratio(), 0.0);
    }
}

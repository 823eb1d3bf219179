//! Configuration types.
//!
//! Engine tuning lives in [`EngineConfig`] and is passed explicitly into
//! the pipeline, so concurrent runs with different settings stay isolated.
//! Collaborator settings are read from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::types::Topic;

/// Content engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A message is important iff its score is at least this value.
    pub importance_threshold: f64,
    /// Upper bound for any score.
    pub max_score: f64,
    /// Score per reaction.
    pub reaction_weight: f64,
    /// Score per reply.
    pub reply_weight: f64,
    /// Added once when any salient keyword is present.
    pub keyword_bonus: f64,
    /// Added when the text has two or more exclamation marks.
    pub exclamation_bonus: f64,
    /// Added when the text carries a celebration or alert emoji.
    pub emoji_bonus: f64,
    /// Messages longer than this (in chars) get `long_message_bonus`.
    pub long_message_chars: usize,
    pub long_message_bonus: f64,
    /// Messages shorter than this (trimmed, in chars) are never important.
    pub min_message_chars: usize,
    /// Keywords that mark a message as high-salience.
    pub salient_keywords: Vec<String>,
    /// Author IDs dropped before scoring (automated posters).
    pub excluded_authors: Vec<String>,
    /// Chars of context kept on each side of a date span.
    pub context_radius: usize,
    /// Chars before a date span searched for a deadline marker.
    pub deadline_lookbehind: usize,
    /// Chars after a date span searched for a deadline marker.
    pub deadline_lookahead: usize,
    /// Channels processed at once during a newsletter run.
    pub max_concurrent_channels: usize,
    /// Ordered topic rules.
    pub taxonomy: TaxonomyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            importance_threshold: 2.0,
            max_score: 10.0,
            reaction_weight: 1.0,
            reply_weight: 1.5,
            keyword_bonus: 2.0,
            exclamation_bonus: 1.0,
            emoji_bonus: 1.0,
            long_message_chars: 100,
            long_message_bonus: 2.0,
            min_message_chars: 5,
            salient_keywords: strings(&[
                "release",
                "deploy*",
                "ship*",
                "launch*",
                "update*",
                "decision",
                "meeting",
                "demo",
                "announcement",
                "milestone",
                "completed",
                "bug",
                "issue",
                "fix*",
                "feature",
                "breaking",
                "shift",
                "client",
                "caregiver",
                "cover",
                "deadline",
                "urgent",
            ]),
            excluded_authors: strings(&["USLACKBOT"]),
            context_radius: 30,
            deadline_lookbehind: 40,
            deadline_lookahead: 20,
            max_concurrent_channels: 4,
            taxonomy: TaxonomyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(threshold) = std::env::var("NEWSLETTER_IMPORTANCE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|t| t.is_finite() && *t >= 0.0)
        {
            config.importance_threshold = threshold;
        }

        if let Some(min_chars) = std::env::var("NEWSLETTER_MIN_MESSAGE_CHARS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.min_message_chars = min_chars;
        }

        if let Ok(authors) = std::env::var("NEWSLETTER_EXCLUDED_AUTHORS") {
            config.excluded_authors = split_list(&authors);
        }

        if let Some(max) = std::env::var("NEWSLETTER_MAX_CONCURRENT_CHANNELS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            config.max_concurrent_channels = max;
        }

        config
    }
}

// ── Topic taxonomy ──────────────────────────────────────────────────

/// One entry of the ordered taxonomy.
#[derive(Debug, Clone)]
pub struct TopicRuleConfig {
    pub topic: Topic,
    /// Case-insensitive keywords. A trailing `*` makes a prefix match.
    pub keywords: Vec<String>,
}

/// Ordered topic rules. The first rule whose keywords match wins;
/// messages matching nothing are `Uncategorized`.
#[derive(Debug, Clone)]
pub struct TaxonomyConfig {
    pub rules: Vec<TopicRuleConfig>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        let rule = |topic, keywords: &[&str]| TopicRuleConfig {
            topic,
            keywords: strings(keywords),
        };

        Self {
            rules: vec![
                rule(
                    Topic::Celebrations,
                    &[
                        "birthday",
                        "congrat*",
                        "anniversary",
                        "kudos",
                        "shoutout",
                        "shout out",
                        "welcome aboard",
                        "🎉",
                        "🎂",
                        "🥳",
                        "🎊",
                        "🍾",
                        ":tada:",
                        ":birthday:",
                        ":confetti_ball:",
                    ],
                ),
                rule(
                    Topic::ClientManagement,
                    &[
                        "client",
                        "clients",
                        "shift",
                        "shifts",
                        "replacement",
                        "caregiver",
                        "caregivers",
                        "coverage",
                        "cover for",
                    ],
                ),
                rule(
                    Topic::Scheduling,
                    &[
                        "meeting",
                        "deadline",
                        "tomorrow at",
                        "appointment",
                        "schedule*",
                        "calendar",
                        "standup",
                        "sync",
                        "reschedule*",
                    ],
                ),
                rule(
                    Topic::Announcements,
                    &[
                        "announce*",
                        "heads up",
                        "fyi",
                        "reminder",
                        "please note",
                        "policy",
                        "all hands",
                        "📢",
                    ],
                ),
                rule(
                    Topic::TechnicalDiscussions,
                    &[
                        "bug",
                        "bugs",
                        "deployed",
                        "deploy*",
                        "feature",
                        "PR",
                        "pull request",
                        "code review",
                        "merge*",
                        "release",
                        "production",
                        "API",
                        "refactor*",
                        "hotfix",
                    ],
                ),
                rule(
                    Topic::QuestionsAndHelp,
                    &[
                        "?",
                        "help",
                        "how do",
                        "anyone know",
                        "can someone",
                        "question",
                        "stuck",
                    ],
                ),
                rule(
                    Topic::ProjectUpdates,
                    &[
                        "update*",
                        "progress",
                        "milestone",
                        "completed",
                        "shipped",
                        "status",
                        "sprint",
                        "finished",
                    ],
                ),
                rule(
                    Topic::TeamBuilding,
                    &[
                        "team lunch",
                        "offsite",
                        "happy hour",
                        "game night",
                        "team event",
                        "social",
                        "icebreaker",
                    ],
                ),
                rule(
                    Topic::ToolsAndResources,
                    &[
                        "tool",
                        "tools",
                        "resource*",
                        "docs",
                        "documentation",
                        "tutorial",
                        "guide",
                        "http://",
                        "https://",
                    ],
                ),
            ],
        }
    }
}

impl TaxonomyConfig {
    /// Topics in priority order.
    pub fn order(&self) -> Vec<Topic> {
        self.rules.iter().map(|r| r.topic).collect()
    }
}

// ── Collaborators ───────────────────────────────────────────────────

/// Slack Web API configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    /// Base URL of the Web API (overridable for tests and proxies).
    pub api_base: String,
    /// Messages requested per history page.
    pub page_limit: u32,
    pub timeout_secs: u64,
}

impl SlackConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://slack.com/api";

    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: SecretString::from(bot_token.into()),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            page_limit: 200,
            timeout_secs: 30,
        }
    }

    /// Build config from environment variables. `SLACK_BOT_TOKEN` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("SLACK_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("SLACK_BOT_TOKEN".into()))?;
        if token.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SLACK_BOT_TOKEN".into(),
                message: "must not be empty".into(),
            });
        }

        let mut config = Self::new(token);
        if let Ok(base) = std::env::var("SLACK_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

/// SMTP mailer configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub recipients: Vec<String>,
}

impl MailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SMTP_HOST` is not set (mailing disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let from_address =
            std::env::var("NEWSLETTER_FROM_ADDRESS").unwrap_or_else(|_| username.clone());
        let recipients = split_list(&std::env::var("NEWSLETTER_RECIPIENTS").unwrap_or_default());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            recipients,
        })
    }
}

/// Document store configuration for published newsletters.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Directory newsletters are written into.
    pub output_dir: PathBuf,
    /// Public URL the directory is served under. Without it, links are `file://` URLs.
    pub public_base_url: Option<String>,
}

impl DocumentConfig {
    /// Build config from environment variables.
    /// Returns `None` if `NEWSLETTER_DOCS_DIR` is not set (publishing disabled).
    pub fn from_env() -> Option<Self> {
        let output_dir = std::env::var("NEWSLETTER_DOCS_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        let public_base_url = std::env::var("NEWSLETTER_DOCS_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        Some(Self {
            output_dir: PathBuf::from(output_dir),
            public_base_url,
        })
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("NEWSLETTER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        Self { port }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

//! Newsletter engine: the public operations over a chat source.
//!
//! Per channel:
//! 1. `ChatSource::fetch_messages()` (the only I/O besides directory lookups)
//! 2. `MentionResolver::normalize()` through a run-scoped `DirectoryCache`
//! 3. `ImportanceScorer::evaluate()`
//! 4. `TopicClassifier::classify()` + `DateExtractor::extract()` for important messages
//! 5. `aggregator::summarize()`
//!
//! A multi-channel run fans out over channels and reports failures per channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{ConfigError, Result, TransportError, ValidationError};
use crate::pipeline::aggregator::{self, ChannelOutcome, ChannelReport, NewsletterReport};
use crate::pipeline::dates::DateExtractor;
use crate::pipeline::mentions::{DirectoryCache, MentionResolver, ParsedMentions};
use crate::pipeline::rules::TopicClassifier;
use crate::pipeline::scorer::ImportanceScorer;
use crate::pipeline::types::{
    ChannelInfo, ChannelSummary, ChatSource, Directory, ExtractedDate, MessageAnalysis,
    MessageEntry, NormalizedMessage, RawMessage, SourceIdentity, Topic,
};

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChannelListResponse {
    pub channels: Vec<ChannelInfo>,
    pub count: usize,
    pub channel_names: Vec<String>,
}

/// Unprocessed channel history for a window.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelMessagesResponse {
    pub channel_id: String,
    /// `YYYY-MM-DD to YYYY-MM-DD`
    pub date_range: String,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub message_count: usize,
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportantMessagesResponse {
    pub channel_id: String,
    pub total_messages: usize,
    pub important_messages: usize,
    pub messages: Vec<MessageEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicResponse {
    pub channel_id: String,
    pub total_messages: usize,
    pub important_messages: usize,
    pub topic_groups: BTreeMap<Topic, Vec<MessageEntry>>,
    pub topic_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatesResponse {
    pub channel_id: String,
    pub total_messages: usize,
    pub important_messages: usize,
    pub messages_with_dates: usize,
    pub total_dates_found: usize,
    pub dates: Vec<ExtractedDate>,
}

impl From<ChannelSummary> for ImportantMessagesResponse {
    fn from(summary: ChannelSummary) -> Self {
        Self {
            channel_id: summary.channel_id,
            total_messages: summary.total_messages,
            important_messages: summary.important_messages,
            messages: summary.important,
        }
    }
}

impl From<ChannelSummary> for TopicResponse {
    fn from(summary: ChannelSummary) -> Self {
        Self {
            channel_id: summary.channel_id,
            total_messages: summary.total_messages,
            important_messages: summary.important_messages,
            topic_count: summary.topic_groups.len(),
            topic_groups: summary.topic_groups,
        }
    }
}

impl From<ChannelSummary> for DatesResponse {
    fn from(summary: ChannelSummary) -> Self {
        Self {
            channel_id: summary.channel_id,
            total_messages: summary.total_messages,
            important_messages: summary.important_messages,
            messages_with_dates: summary.messages_with_dates,
            total_dates_found: summary.dates.len(),
            dates: summary.dates,
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Content intelligence engine bound to one chat source and directory.
///
/// Holds no per-run state: every operation builds its own `DirectoryCache`,
/// so concurrent calls never share resolved names or results.
pub struct NewsletterEngine {
    source: Arc<dyn ChatSource>,
    directory: Arc<dyn Directory>,
    resolver: MentionResolver,
    scorer: ImportanceScorer,
    classifier: TopicClassifier,
    extractor: DateExtractor,
    max_concurrent_channels: usize,
}

impl NewsletterEngine {
    pub fn new(
        source: Arc<dyn ChatSource>,
        directory: Arc<dyn Directory>,
        config: &EngineConfig,
    ) -> std::result::Result<Self, ConfigError> {
        if config.max_concurrent_channels == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_channels".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            source,
            directory,
            resolver: MentionResolver::new(),
            scorer: ImportanceScorer::from_config(config)?,
            classifier: TopicClassifier::from_config(&config.taxonomy)?,
            extractor: DateExtractor::from_config(config),
            max_concurrent_channels: config.max_concurrent_channels,
        })
    }

    pub fn classifier(&self) -> &TopicClassifier {
        &self.classifier
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Ask the chat source who it is connected as.
    pub async fn check_connection(&self) -> Result<SourceIdentity> {
        Ok(self.source.verify().await?)
    }

    /// Resolve `<@ID>` tokens in free text.
    pub async fn parse_mentions(&self, text: &str) -> ParsedMentions {
        let cache = self.new_cache();
        self.resolver.parse(text, &cache).await
    }

    pub async fn list_channels(&self) -> Result<ChannelListResponse> {
        let channels = self.source.list_channels().await?;
        let channel_names = channels.iter().map(|c| c.name.clone()).collect();
        Ok(ChannelListResponse {
            count: channels.len(),
            channel_names,
            channels,
        })
    }

    /// Channel history as delivered by the source: no mention resolution,
    /// no scoring.
    pub async fn get_channel_messages(
        &self,
        channel_id: &str,
        days_back: i64,
    ) -> Result<ChannelMessagesResponse> {
        let (since, until) = self.validated_window(channel_id, days_back).await?;
        let messages = self.source.fetch_messages(channel_id, since, until).await?;
        debug!(channel_id, count = messages.len(), "Fetched raw channel history");

        Ok(ChannelMessagesResponse {
            channel_id: channel_id.to_string(),
            date_range: format!(
                "{} to {}",
                since.format("%Y-%m-%d"),
                until.format("%Y-%m-%d")
            ),
            since,
            until,
            message_count: messages.len(),
            messages,
        })
    }

    pub async fn filter_important(
        &self,
        channel_id: &str,
        days_back: i64,
    ) -> Result<ImportantMessagesResponse> {
        Ok(self.channel_summary(channel_id, days_back).await?.into())
    }

    pub async fn organize_by_topic(&self, channel_id: &str, days_back: i64) -> Result<TopicResponse> {
        Ok(self.channel_summary(channel_id, days_back).await?.into())
    }

    pub async fn extract_dates(&self, channel_id: &str, days_back: i64) -> Result<DatesResponse> {
        Ok(self.channel_summary(channel_id, days_back).await?.into())
    }

    /// Process every readable channel for the last `days_back` days.
    ///
    /// Listing channels is the only step that fails the whole run; after
    /// that, each channel succeeds or fails on its own.
    pub async fn generate_newsletter(&self, days_back: i64) -> Result<NewsletterReport> {
        let (since, until) = window(days_back)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("newsletter_run", run_id = %run_id, days_back);

        async move {
            let channels = self.source.list_channels().await?;
            info!(channels = channels.len(), "Starting newsletter run");

            let cache = self.new_cache();
            let permits = Semaphore::new(self.max_concurrent_channels);

            let reports = join_all(channels.into_iter().map(|channel| {
                let cache = &cache;
                let permits = &permits;
                async move {
                    let outcome = match permits.acquire().await {
                        Ok(_permit) => {
                            match self.summarize_channel(&channel.id, since, until, cache).await {
                                Ok(summary) => ChannelOutcome::Ok { summary },
                                Err(e) => {
                                    warn!(
                                        channel_id = %channel.id,
                                        error = %e,
                                        "Channel failed, excluding from newsletter"
                                    );
                                    ChannelOutcome::Failed {
                                        error: e.to_string(),
                                    }
                                }
                            }
                        }
                        Err(e) => ChannelOutcome::Failed {
                            error: e.to_string(),
                        },
                    };
                    ChannelReport { channel, outcome }
                }
            }))
            .await;

            let report = aggregator::combine(run_id, since, until, reports);
            info!(
                status = ?report.status,
                processed = report.totals.channels_processed,
                failed = report.totals.channels_failed,
                important = report.totals.important_messages,
                "Newsletter run complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Score, classify and extract one normalized message.
    ///
    /// Topic and dates are only computed for important messages.
    pub fn analyze(&self, message: NormalizedMessage) -> MessageAnalysis {
        let (is_important, score) = self.scorer.evaluate(&message);
        let (topic, dates) = if is_important {
            (
                Some(self.classifier.classify(&message)),
                self.extractor.extract(&message.text),
            )
        } else {
            (None, Vec::new())
        };

        MessageAnalysis {
            message,
            score,
            is_important,
            topic,
            dates,
        }
    }

    fn new_cache(&self) -> DirectoryCache {
        DirectoryCache::new(self.directory.clone())
    }

    /// Window for a single-channel operation, after checking the inputs and
    /// that the channel is readable. Nothing is fetched on failure.
    async fn validated_window(
        &self,
        channel_id: &str,
        days_back: i64,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let (since, until) = window(days_back)?;
        if channel_id.trim().is_empty() {
            return Err(ValidationError::MissingField("channel_id").into());
        }

        let known = self.source.list_channels().await?;
        if !known.iter().any(|c| c.id == channel_id) {
            return Err(ValidationError::UnknownChannel(channel_id.to_string()).into());
        }
        Ok((since, until))
    }

    /// Validated single-channel run.
    async fn channel_summary(&self, channel_id: &str, days_back: i64) -> Result<ChannelSummary> {
        let (since, until) = self.validated_window(channel_id, days_back).await?;
        let cache = self.new_cache();
        Ok(self
            .summarize_channel(channel_id, since, until, &cache)
            .await?)
    }

    async fn summarize_channel(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cache: &DirectoryCache,
    ) -> std::result::Result<ChannelSummary, TransportError> {
        let raw = self.source.fetch_messages(channel_id, since, until).await?;
        debug!(channel_id, fetched = raw.len(), "Fetched channel messages");

        let mut analyses = Vec::with_capacity(raw.len());
        for message in raw {
            let normalized = self.resolver.normalize(message, cache).await;
            analyses.push(self.analyze(normalized));
        }

        let summary = aggregator::summarize(channel_id, &analyses);
        info!(
            channel_id,
            total = summary.total_messages,
            important = summary.important_messages,
            topics = summary.topic_groups.len(),
            dates = summary.dates.len(),
            "Channel processed"
        );
        Ok(summary)
    }
}

/// `[now - days_back, now]`.
fn window(days_back: i64) -> std::result::Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    if days_back <= 0 {
        return Err(ValidationError::NonPositiveDaysBack(days_back));
    }
    let until = Utc::now();
    let since = TimeDelta::try_days(days_back)
        .and_then(|span| until.checked_sub_signed(span))
        .ok_or(ValidationError::DaysBackOutOfRange(days_back))?;
    Ok((since, until))
}

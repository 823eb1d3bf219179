//! Aggregation of per-message results into channel summaries and run reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::types::{
    ChannelInfo, ChannelSummary, ExtractedDate, MessageAnalysis, MessageEntry,
};

/// Fold one channel's analyses into a summary.
///
/// Input order is preserved everywhere (it is the chronological order);
/// topics without messages are left out of `topic_groups`.
pub fn summarize(channel_id: &str, analyses: &[MessageAnalysis]) -> ChannelSummary {
    let mut important = Vec::new();
    let mut topic_groups: BTreeMap<_, Vec<MessageEntry>> = BTreeMap::new();
    let mut dates = Vec::new();
    let mut messages_with_dates = 0;

    for analysis in analyses.iter().filter(|a| a.is_important) {
        let entry = MessageEntry::from(analysis);

        if let Some(topic) = analysis.topic {
            topic_groups.entry(topic).or_default().push(entry.clone());
        }

        if !analysis.dates.is_empty() {
            messages_with_dates += 1;
            dates.extend(
                analysis
                    .dates
                    .iter()
                    .cloned()
                    .map(|d| ExtractedDate::from_match(d, &analysis.message)),
            );
        }

        important.push(entry);
    }

    ChannelSummary {
        channel_id: channel_id.to_string(),
        total_messages: analyses.len(),
        important_messages: important.len(),
        important,
        topic_groups,
        messages_with_dates,
        dates,
    }
}

// ── Multi-channel report ────────────────────────────────────────────

/// Overall outcome of a multi-channel run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every channel succeeded (or there were no channels).
    Complete,
    /// Some channels failed; the rest are included.
    Partial,
    /// Every channel failed.
    Failed,
}

/// What happened to one channel during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Ok { summary: ChannelSummary },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelInfo,
    #[serde(flatten)]
    pub outcome: ChannelOutcome,
}

impl ChannelReport {
    pub fn summary(&self) -> Option<&ChannelSummary> {
        match &self.outcome {
            ChannelOutcome::Ok { summary } => Some(summary),
            ChannelOutcome::Failed { .. } => None,
        }
    }
}

/// Totals over the successful channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub channels_processed: usize,
    pub channels_failed: usize,
    pub total_messages: usize,
    pub important_messages: usize,
    pub total_dates_found: usize,
}

/// Result of one newsletter generation pass.
#[derive(Debug, Clone, Serialize)]
pub struct NewsletterReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub status: RunStatus,
    pub totals: RunTotals,
    pub channels: Vec<ChannelReport>,
}

/// Concatenate channel reports; no cross-channel deduplication.
pub fn combine(
    run_id: Uuid,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    channels: Vec<ChannelReport>,
) -> NewsletterReport {
    let mut totals = RunTotals::default();
    for report in &channels {
        match report.summary() {
            Some(summary) => {
                totals.channels_processed += 1;
                totals.total_messages += summary.total_messages;
                totals.important_messages += summary.important_messages;
                totals.total_dates_found += summary.dates.len();
            }
            None => totals.channels_failed += 1,
        }
    }

    let status = if totals.channels_failed == 0 {
        RunStatus::Complete
    } else if totals.channels_processed == 0 {
        RunStatus::Failed
    } else {
        RunStatus::Partial
    };

    NewsletterReport {
        run_id,
        generated_at: Utc::now(),
        since,
        until,
        status,
        totals,
        channels,
    }
}

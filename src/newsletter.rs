//! Plain-text newsletter composed from a run report.
//!
//! Layout per channel with important messages:
//! - topic sections, top 3 messages each
//! - upcoming dates, first 5 messages with dates, 2 dates each
//! - top updates, 5 highest-scoring messages
//!
//! Channels that failed are listed after the channel sections.

use std::fmt::Write;

use crate::pipeline::aggregator::{ChannelOutcome, NewsletterReport};
use crate::pipeline::types::{ChannelInfo, ChannelSummary, MessageEntry, preview};

const TOPIC_PREVIEW_CHARS: usize = 120;
const TOPIC_MESSAGES: usize = 3;
const UPDATE_PREVIEW_CHARS: usize = 150;
const TOP_UPDATES: usize = 5;
const DATE_MESSAGES: usize = 5;
const DATES_PER_MESSAGE: usize = 2;

const RULE_WIDTH: usize = 50;

/// Email subject / document title for a report.
pub fn subject(report: &NewsletterReport) -> String {
    format!(
        "Weekly Team Newsletter - {}",
        report.until.format("%B %d, %Y")
    )
}

/// Render the newsletter body.
pub fn render(report: &NewsletterReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

/// Short mail body pointing at a published copy of the newsletter.
pub fn link_body(report: &NewsletterReport, document_url: &str) -> String {
    format!(
        "{title}\n\n\
         SUMMARY:\n\
         {summary}\n\n\
         Read the full newsletter at: {document_url}\n\n\
         ---\n\
         This newsletter is generated from chat conversations.\n",
        title = subject(report),
        summary = summary_line(report),
    )
}

fn summary_line(report: &NewsletterReport) -> String {
    let totals = &report.totals;
    format!(
        "The team was active across {} channels with {} total messages. \
         {} important updates and discussions were selected.",
        totals.channels_processed, totals.total_messages, totals.important_messages
    )
}

fn write_report(out: &mut String, report: &NewsletterReport) -> std::fmt::Result {
    writeln!(out, "Weekly Team Newsletter")?;
    writeln!(out, "Generated on {}", report.generated_at.format("%B %d, %Y"))?;
    writeln!(
        out,
        "Report Period: {} - {}",
        report.since.format("%b %d"),
        report.until.format("%b %d, %Y")
    )?;
    writeln!(out)?;

    writeln!(out, "📊 SUMMARY")?;
    writeln!(out, "{} Highlights are below.", summary_line(report))?;
    writeln!(out)?;

    writeln!(out, "🏢 CHANNEL UPDATES")?;
    writeln!(out)?;

    for channel in &report.channels {
        if let ChannelOutcome::Ok { summary } = &channel.outcome
            && summary.important_messages > 0
        {
            write_channel(out, &channel.channel, summary)?;
        }
    }

    let failed: Vec<_> = report
        .channels
        .iter()
        .filter_map(|c| match &c.outcome {
            ChannelOutcome::Failed { error } => Some((&c.channel.name, error)),
            ChannelOutcome::Ok { .. } => None,
        })
        .collect();
    if !failed.is_empty() {
        writeln!(out, "⚠️ CHANNELS NOT INCLUDED")?;
        for (name, error) in failed {
            writeln!(out, "  • #{name}: {error}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "📝 ABOUT THIS NEWSLETTER")?;
    write!(
        out,
        "This newsletter is generated from chat conversations. Important messages \
         are selected by engagement (reactions, replies) and content analysis."
    )
}

fn write_channel(out: &mut String, channel: &ChannelInfo, summary: &ChannelSummary) -> std::fmt::Result {
    writeln!(out, "#{}", channel.name.to_uppercase())?;
    writeln!(
        out,
        "Members: {} | Important Updates: {}",
        channel.member_count, summary.important_messages
    )?;
    writeln!(out)?;

    if !summary.topic_groups.is_empty() {
        writeln!(out, "📂 ORGANIZED BY TOPIC:")?;
        writeln!(out)?;
        for (topic, messages) in &summary.topic_groups {
            writeln!(
                out,
                "🔹 {} ({} updates)",
                topic.label().to_uppercase(),
                messages.len()
            )?;
            for (i, msg) in messages.iter().take(TOPIC_MESSAGES).enumerate() {
                write!(out, "  {}. {}", i + 1, preview(&msg.text, TOPIC_PREVIEW_CHARS))?;
                write_engagement(out, msg)?;
                writeln!(out)?;
            }
            if messages.len() > TOPIC_MESSAGES {
                writeln!(out, "    ... and {} more", messages.len() - TOPIC_MESSAGES)?;
            }
            writeln!(out)?;
        }
    }

    if !summary.dates.is_empty() {
        writeln!(out, "📅 UPCOMING DATES & DEADLINES:")?;
        let mut current: Option<&str> = None;
        let mut messages_seen = 0;
        let mut from_current = 0;
        for date in &summary.dates {
            if current != Some(date.source_message_ref.as_str()) {
                if messages_seen == DATE_MESSAGES {
                    break;
                }
                current = Some(date.source_message_ref.as_str());
                messages_seen += 1;
                from_current = 0;
            }
            if from_current < DATES_PER_MESSAGE {
                writeln!(
                    out,
                    "  • {}: {} ({})",
                    date.user_name, date.date_text, date.context
                )?;
                from_current += 1;
            }
        }
        writeln!(out)?;
    }

    writeln!(out, "📝 TOP UPDATES:")?;
    writeln!(out)?;
    for (i, msg) in top_updates(&summary.important).into_iter().enumerate() {
        write!(
            out,
            "{}. {}: {}",
            i + 1,
            msg.user_name,
            preview(&msg.text, UPDATE_PREVIEW_CHARS)
        )?;
        write_engagement(out, msg)?;
        writeln!(out)?;
        writeln!(out)?;
    }
    if summary.important.len() > TOP_UPDATES {
        writeln!(
            out,
            "... and {} more important updates",
            summary.important.len() - TOP_UPDATES
        )?;
        writeln!(out)?;
    }

    writeln!(out, "{}", "─".repeat(RULE_WIDTH))?;
    writeln!(out)
}

/// Highest scores first; equal scores keep chronological order.
fn top_updates(messages: &[MessageEntry]) -> Vec<&MessageEntry> {
    let mut ranked: Vec<&MessageEntry> = messages.iter().collect();
    ranked.sort_by(|a, b| b.score.value().total_cmp(&a.score.value()));
    ranked.truncate(TOP_UPDATES);
    ranked
}

fn write_engagement(out: &mut String, msg: &MessageEntry) -> std::fmt::Result {
    let mut markers = Vec::new();
    if msg.reactions > 0 {
        markers.push(format!("👍{}", msg.reactions));
    }
    if msg.replies > 0 {
        markers.push(format!("💬{}", msg.replies));
    }
    if markers.is_empty() {
        return Ok(());
    }
    write!(out, " [{}]", markers.join(" "))
}

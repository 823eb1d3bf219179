//! Slack Web API collaborator: token check, channel listing, history and user lookup.
//!
//! Pure I/O: messages are mapped to `RawMessage` and handed to the pipeline
//! untouched. Paging, auth and rate-limit responses are translated into
//! `TransportError`; retries are left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::SlackConfig;
use crate::error::{ConfigError, TransportError};
use crate::pipeline::types::{ChannelInfo, ChatSource, Directory, RawMessage, SourceIdentity};

const SERVICE: &str = "slack";

/// Upper bound on pages followed for a single listing or history call.
const MAX_PAGES: usize = 50;

/// Message subtypes that never reach the pipeline.
const SKIPPED_SUBTYPES: &[&str] = &["bot_message", "channel_join", "channel_leave"];

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

fn next_cursor(meta: Option<ResponseMetadata>) -> Option<String> {
    meta.map(|m| m.next_cursor).filter(|c| !c.is_empty())
}

#[derive(Debug, Deserialize)]
struct ChannelPage {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_member: bool,
    #[serde(default)]
    num_members: u32,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    subtype: Option<String>,
    user: Option<String>,
    #[serde(default)]
    text: String,
    ts: String,
    #[serde(default)]
    reactions: Vec<SlackReaction>,
    #[serde(default)]
    reply_count: u32,
}

#[derive(Debug, Deserialize)]
struct SlackReaction {
    #[serde(default)]
    count: u32,
}

impl SlackMessage {
    /// `None` for join/leave notices and bot posts.
    fn into_raw(self, channel_id: &str) -> Option<RawMessage> {
        if let Some(subtype) = &self.subtype
            && SKIPPED_SUBTYPES.contains(&subtype.as_str())
        {
            return None;
        }

        Some(RawMessage {
            reaction_count: self.reactions.iter().map(|r| r.count).sum(),
            reply_count: self.reply_count,
            author_id: self.user.unwrap_or_default(),
            text: self.text,
            timestamp: self.ts,
            channel_id: channel_id.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AuthTest {
    #[serde(default)]
    team: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: String,
    real_name: Option<String>,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    display_name: Option<String>,
    real_name: Option<String>,
}

impl SlackUser {
    /// display_name → real_name → name, skipping blanks.
    fn preferred_name(self) -> Option<String> {
        [
            self.profile.display_name,
            self.profile.real_name,
            self.real_name,
            Some(self.name),
        ]
        .into_iter()
        .flatten()
        .map(|n| n.trim().to_string())
        .find(|n| !n.is_empty())
    }
}

/// Whether to request another page. Stops with a warning at `MAX_PAGES`.
fn more_pages(cursor: Option<&str>, pages: usize, resource: &str) -> bool {
    if cursor.is_none() {
        return false;
    }
    if pages >= MAX_PAGES {
        warn!(resource, pages, "Listing truncated at page limit");
        return false;
    }
    true
}

/// Slack timestamp (`seconds.micros`) for a point in time.
fn slack_ts(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

/// Map an `ok: false` error code to a transport error.
fn api_error(code: &str) -> TransportError {
    match code {
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" | "token_expired" => {
            TransportError::AuthFailed {
                service: SERVICE.into(),
            }
        }
        "ratelimited" => TransportError::RateLimited {
            service: SERVICE.into(),
            retry_after: None,
        },
        "channel_not_found" | "not_in_channel" | "user_not_found" => TransportError::NotFound {
            service: SERVICE.into(),
            resource: code.to_string(),
        },
        other => TransportError::Api {
            service: SERVICE.into(),
            code: other.to_string(),
        },
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Slack Web API client acting as both chat source and user directory.
pub struct SlackClient {
    token: SecretString,
    api_base: String,
    page_limit: u32,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "slack_client".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            page_limit: config.page_limit,
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Call a Web API method and decode its payload.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let resp = self
            .client
            .get(self.api_url(method))
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable {
                service: SERVICE.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!(method, ?retry_after, "Slack rate limit hit");
            return Err(TransportError::RateLimited {
                service: SERVICE.into(),
                retry_after,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::AuthFailed {
                service: SERVICE.into(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                service: SERVICE.into(),
                code: format!("HTTP {status}: {body}"),
            });
        }

        let data: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| TransportError::InvalidResponse {
                    service: SERVICE.into(),
                    reason: e.to_string(),
                })?;

        if !data.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            let code = data
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown_error");
            debug!(method, code, "Slack API returned an error");
            return Err(api_error(code));
        }

        serde_json::from_value(data).map_err(|e| TransportError::InvalidResponse {
            service: SERVICE.into(),
            reason: format!("{method}: {e}"),
        })
    }
}

#[async_trait]
impl ChatSource for SlackClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn verify(&self) -> Result<SourceIdentity, TransportError> {
        let auth: AuthTest = self.call("auth.test", &[]).await?;
        debug!(team = %auth.team, user = %auth.user, "Slack token verified");
        Ok(SourceIdentity {
            workspace: auth.team,
            user: auth.user,
        })
    }

    /// Public and private channels the bot is a member of.
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, TransportError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: ChannelPage = self.call("conversations.list", &query).await?;
            pages += 1;
            channels.extend(
                page.channels
                    .into_iter()
                    .filter(|c| c.is_member)
                    .map(|c| ChannelInfo {
                        id: c.id,
                        name: c.name,
                        member_count: c.num_members,
                    }),
            );

            cursor = next_cursor(page.response_metadata);
            if !more_pages(cursor.as_deref(), pages, "conversations.list") {
                break;
            }
        }

        debug!(count = channels.len(), pages, "Listed Slack channels");
        Ok(channels)
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>, TransportError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut query = vec![
                ("channel", channel_id.to_string()),
                ("oldest", slack_ts(since)),
                ("latest", slack_ts(until)),
                ("inclusive", "true".to_string()),
                ("limit", self.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: HistoryPage = self.call("conversations.history", &query).await?;
            pages += 1;
            messages.extend(
                page.messages
                    .into_iter()
                    .filter_map(|m| m.into_raw(channel_id)),
            );

            cursor = next_cursor(page.response_metadata);
            if !page.has_more || !more_pages(cursor.as_deref(), pages, channel_id) {
                break;
            }
        }

        // Slack returns newest first.
        messages.reverse();
        debug!(channel_id, count = messages.len(), pages, "Fetched Slack history");
        Ok(messages)
    }
}

#[async_trait]
impl Directory for SlackClient {
    async fn resolve_user(&self, user_id: &str) -> Result<Option<String>, TransportError> {
        match self
            .call::<UserInfo>("users.info", &[("user", user_id.to_string())])
            .await
        {
            Ok(info) => Ok(info.user.preferred_name()),
            Err(TransportError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

//! Mention resolver: rewrites `<@ID>` tokens into `@display name`.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::pipeline::types::{Directory, FALLBACK_NAME, NormalizedMessage, RawMessage};

/// Result of resolving mentions in one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMentions {
    pub original_text: String,
    pub parsed_text: String,
    pub has_mentions: bool,
}

/// Directory lookups cached for the lifetime of one processing run.
///
/// Populated lazily, never invalidated. Dropped with the run so names
/// cannot leak into unrelated runs. Failed lookups are not cached.
pub struct DirectoryCache {
    directory: Arc<dyn Directory>,
    names: RwLock<HashMap<String, Option<String>>>,
}

impl DirectoryCache {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Display name for `user_id`, or `None` when the directory has no usable entry.
    pub async fn lookup(&self, user_id: &str) -> Option<String> {
        if user_id.is_empty() {
            return None;
        }

        if let Some(cached) = self.names.read().await.get(user_id) {
            return cached.clone();
        }

        match self.directory.resolve_user(user_id).await {
            Ok(name) => {
                let name = name.filter(|n| !n.trim().is_empty());
                debug!(user_id, found = name.is_some(), "Directory lookup");
                self.names
                    .write()
                    .await
                    .insert(user_id.to_string(), name.clone());
                name
            }
            Err(e) => {
                warn!(user_id, error = %e, "Directory lookup failed, using fallback name");
                None
            }
        }
    }

    /// Display name for `user_id`, falling back to [`FALLBACK_NAME`].
    pub async fn display_name(&self, user_id: &str) -> String {
        self.lookup(user_id)
            .await
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    /// Number of cached entries (hits and misses).
    pub async fn len(&self) -> usize {
        self.names.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.names.read().await.is_empty()
    }
}

/// Finds mention tokens and resolves them through a [`DirectoryCache`].
#[derive(Debug, Clone)]
pub struct MentionResolver {
    token: Regex,
}

impl MentionResolver {
    pub fn new() -> Self {
        Self {
            // <@U123> and the labelled form <@U123|name>
            token: Regex::new(r"<@([^>|\s]+)(?:\|[^>]*)?>").unwrap(),
        }
    }

    /// Replace each mention token, left to right, with `@name`.
    pub async fn parse(&self, text: &str, cache: &DirectoryCache) -> ParsedMentions {
        let mut parsed = String::with_capacity(text.len());
        let mut last = 0;
        let mut has_mentions = false;

        for caps in self.token.captures_iter(text) {
            let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            has_mentions = true;
            parsed.push_str(&text[last..whole.start()]);
            parsed.push('@');
            parsed.push_str(&cache.display_name(id.as_str()).await);
            last = whole.end();
        }

        if !has_mentions {
            return ParsedMentions {
                original_text: text.to_string(),
                parsed_text: text.to_string(),
                has_mentions: false,
            };
        }

        parsed.push_str(&text[last..]);
        ParsedMentions {
            original_text: text.to_string(),
            parsed_text: parsed,
            has_mentions,
        }
    }

    /// Resolve mentions and the author name of a raw message.
    pub async fn normalize(&self, raw: RawMessage, cache: &DirectoryCache) -> NormalizedMessage {
        let parsed = self.parse(&raw.text, cache).await;
        let author_name = cache.display_name(&raw.author_id).await;
        NormalizedMessage {
            text: parsed.parsed_text,
            author_name,
            has_mentions: parsed.has_mentions,
            raw,
        }
    }
}

impl Default for MentionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::TransportError;

    /// In-memory directory that counts lookups.
    pub(crate) struct MapDirectory {
        entries: HashMap<String, String>,
        pub(crate) calls: AtomicUsize,
        fail: bool,
    }

    impl MapDirectory {
        pub(crate) fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }
    }

    #[async_trait]
    impl Directory for MapDirectory {
        async fn resolve_user(&self, user_id: &str) -> Result<Option<String>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::Unreachable {
                    service: "directory".into(),
                    reason: "offline".into(),
                });
            }
            Ok(self.entries.get(user_id).cloned())
        }
    }

    fn cache(entries: &[(&str, &str)]) -> DirectoryCache {
        DirectoryCache::new(Arc::new(MapDirectory::new(entries)))
    }

    #[tokio::test]
    async fn resolves_known_mention() {
        let cache = cache(&[("U090LNR0Y9X", "azentrix")]);
        let parsed = MentionResolver::new()
            .parse("Hey <@U090LNR0Y9X>, can you review this PR?", &cache)
            .await;
        assert_eq!(parsed.parsed_text, "Hey @azentrix, can you review this PR?");
        assert_eq!(
            parsed.original_text,
            "Hey <@U090LNR0Y9X>, can you review this PR?"
        );
        assert!(parsed.has_mentions);
    }

    #[tokio::test]
    async fn unknown_id_gets_fallback_name() {
        let cache = cache(&[]);
        let parsed = MentionResolver::new().parse("ping <@U404>", &cache).await;
        assert_eq!(parsed.parsed_text, format!("ping @{FALLBACK_NAME}"));
        assert!(parsed.has_mentions);
    }

    #[tokio::test]
    async fn multiple_mentions_resolved_in_order() {
        let cache = cache(&[("U1", "ana"), ("U2", "bo")]);
        let parsed = MentionResolver::new()
            .parse("Meeting with <@U1> and <@U2> tomorrow", &cache)
            .await;
        assert_eq!(parsed.parsed_text, "Meeting with @ana and @bo tomorrow");
    }

    #[tokio::test]
    async fn labelled_mention_form() {
        let cache = cache(&[("U1", "ana")]);
        let parsed = MentionResolver::new()
            .parse("thanks <@U1|ana.old>!", &cache)
            .await;
        assert_eq!(parsed.parsed_text, "thanks @ana!");
    }

    #[tokio::test]
    async fn token_free_text_is_unchanged() {
        let cache = cache(&[("U1", "ana")]);
        let resolver = MentionResolver::new();
        for text in ["No mentions in this message", "", "email me <at> home", "<@>"] {
            let parsed = resolver.parse(text, &cache).await;
            assert_eq!(parsed.original_text, text);
            assert_eq!(parsed.parsed_text, text);
            assert!(!parsed.has_mentions);
        }
    }

    #[tokio::test]
    async fn directory_failure_uses_fallback() {
        let cache = DirectoryCache::new(Arc::new(MapDirectory::failing()));
        let parsed = MentionResolver::new().parse("hi <@U1>", &cache).await;
        assert_eq!(parsed.parsed_text, format!("hi @{FALLBACK_NAME}"));
        // Failures are not cached.
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn empty_directory_name_counts_as_missing() {
        let cache = cache(&[("U1", "  ")]);
        assert_eq!(cache.display_name("U1").await, FALLBACK_NAME);
    }

    #[tokio::test]
    async fn lookups_are_cached_within_a_run() {
        let directory = Arc::new(MapDirectory::new(&[("U1", "ana")]));
        let cache = DirectoryCache::new(directory.clone());
        let resolver = MentionResolver::new();
        resolver.parse("<@U1> <@U1> <@U2>", &cache).await;
        resolver.parse("<@U1> <@U2>", &cache).await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn normalize_resolves_author_and_text() {
        let cache = cache(&[("U1", "ana"), ("U2", "bo")]);
        let raw = RawMessage {
            text: "<@U2> can you cover my shift?".into(),
            author_id: "U1".into(),
            timestamp: "1700000000.000100".into(),
            reaction_count: 0,
            reply_count: 0,
            channel_id: "C1".into(),
        };
        let msg = MentionResolver::new().normalize(raw.clone(), &cache).await;
        assert_eq!(msg.text, "@bo can you cover my shift?");
        assert_eq!(msg.author_name, "ana");
        assert!(msg.has_mentions);
        assert_eq!(msg.raw, raw);
    }

    #[tokio::test]
    async fn empty_author_gets_fallback_without_lookup() {
        let directory = Arc::new(MapDirectory::new(&[]));
        let cache = DirectoryCache::new(directory.clone());
        assert_eq!(cache.display_name("").await, FALLBACK_NAME);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }
}

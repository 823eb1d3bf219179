//! Document store for published newsletters.
//!
//! A `DocumentSink` persists the rendered newsletter and returns a link
//! readers can follow; the mailer can then send the link instead of the
//! full text. `FileDocumentSink` writes plain-text files into a directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use crate::config::DocumentConfig;
use crate::error::TransportError;

/// A persisted newsletter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedDocument {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Document store collaborator.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Store name for logging.
    fn name(&self) -> &str;

    /// Persist `body` under `title` and return where it can be read.
    async fn publish(&self, title: &str, body: &str) -> Result<PublishedDocument, TransportError>;
}

/// Writes each newsletter to `<output_dir>/<slug>-<short id>.txt`.
pub struct FileDocumentSink {
    output_dir: PathBuf,
    public_base_url: Option<String>,
}

impl FileDocumentSink {
    const SERVICE: &'static str = "documents";

    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    fn failed(&self, reason: String) -> TransportError {
        TransportError::PublishFailed {
            service: Self::SERVICE.into(),
            reason,
        }
    }

    fn url_for(&self, path: &Path, file_name: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{file_name}"),
            None => format!("file://{}", path.display()),
        }
    }
}

/// Lowercase ASCII words joined by `-`; `newsletter` when nothing is left.
fn slug(title: &str) -> String {
    let slug = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "newsletter".to_string()
    } else {
        slug
    }
}

#[async_trait]
impl DocumentSink for FileDocumentSink {
    fn name(&self) -> &str {
        Self::SERVICE
    }

    async fn publish(&self, title: &str, body: &str) -> Result<PublishedDocument, TransportError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| self.failed(format!("{}: {e}", self.output_dir.display())))?;

        let short = Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", slug(title), &short[..8]);
        let file_name = format!("{id}.txt");
        let path = self.output_dir.join(&file_name);

        fs::write(&path, format!("{title}\n\n{body}\n"))
            .await
            .map_err(|e| self.failed(format!("{}: {e}", path.display())))?;
        let path = fs::canonicalize(&path).await.unwrap_or_else(|_| path.clone());

        tracing::info!(id = %id, path = %path.display(), "Newsletter document written");
        Ok(PublishedDocument {
            url: self.url_for(&path, &file_name),
            id,
            title: title.to_string(),
        })
    }
}

//! Delivery of a generated newsletter: publish a document, then mail.
//!
//! Both steps are optional and independent of the run itself. A failed
//! step is reported in [`Delivery`] instead of failing the request; when a
//! document was published, the mail carries its link instead of the full text.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::channels::document::{DocumentSink, PublishedDocument};
use crate::channels::email::Mailer;
use crate::error::{Error, ValidationError};
use crate::newsletter;
use crate::pipeline::aggregator::NewsletterReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Skipped,
    Published { document: PublishedDocument },
    Failed { kind: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MailOutcome {
    Skipped,
    Sent {
        recipients: usize,
        /// The body was the document link rather than the full newsletter.
        document_link: bool,
    },
    Failed { kind: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub document: DocumentOutcome,
    pub mail: MailOutcome,
}

/// Optional document store and mailer.
#[derive(Clone, Default)]
pub struct Publisher {
    documents: Option<Arc<dyn DocumentSink>>,
    mailer: Option<Mailer>,
}

impl Publisher {
    pub fn new(documents: Option<Arc<dyn DocumentSink>>, mailer: Option<Mailer>) -> Self {
        Self { documents, mailer }
    }

    pub fn mailer(&self) -> Option<&Mailer> {
        self.mailer.as_ref()
    }

    pub fn documents_enabled(&self) -> bool {
        self.documents.is_some()
    }

    /// Reject a mail request up front when no mailer is configured.
    pub fn ensure_can_send(&self, send: bool) -> Result<(), ValidationError> {
        if send && self.mailer.is_none() {
            return Err(ValidationError::MissingField("smtp_host"));
        }
        Ok(())
    }

    /// Publish the document (when a store is configured) and mail it when
    /// `send` is set.
    pub async fn deliver(
        &self,
        report: &NewsletterReport,
        subject: &str,
        text: &str,
        send: bool,
    ) -> Delivery {
        let document = match &self.documents {
            None => DocumentOutcome::Skipped,
            Some(sink) => match sink.publish(subject, text).await {
                Ok(document) => {
                    info!(run_id = %report.run_id, url = %document.url, "Newsletter published");
                    DocumentOutcome::Published { document }
                }
                Err(e) => {
                    let e = Error::from(e);
                    warn!(run_id = %report.run_id, store = sink.name(), error = %e, "Publishing failed");
                    DocumentOutcome::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    }
                }
            },
        };

        let mail = match (&self.mailer, send) {
            (Some(mailer), true) => {
                let link = match &document {
                    DocumentOutcome::Published { document } => Some(document.url.as_str()),
                    _ => None,
                };
                let body = match link {
                    Some(url) => newsletter::link_body(report, url),
                    None => text.to_string(),
                };
                match mailer.send_newsletter(subject, &body).await {
                    Ok(()) => {
                        info!(run_id = %report.run_id, "Newsletter delivered");
                        MailOutcome::Sent {
                            recipients: mailer.recipients().len(),
                            document_link: link.is_some(),
                        }
                    }
                    Err(e) => {
                        warn!(run_id = %report.run_id, error = %e, "Mail delivery failed");
                        MailOutcome::Failed {
                            kind: e.kind(),
                            message: e.to_string(),
                        }
                    }
                }
            }
            _ => MailOutcome::Skipped,
        };

        Delivery { document, mail }
    }
}

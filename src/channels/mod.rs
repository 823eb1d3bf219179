//! External collaborators: the chat platform, the document store and mail delivery.

pub mod document;
pub mod email;
pub mod slack;

pub use document::{DocumentSink, FileDocumentSink};
pub use email::Mailer;
pub use slack::SlackClient;

//! Collaborators of the change checker.
//!
//! - Page retrieval (`Fetcher`, `HttpFetcher`)
//! - Change report delivery (`Notifier`, `LogNotifier`, `WebhookNotifier`)

mod fetcher;
mod notifier;

pub use fetcher::{Fetcher, HttpFetcher};
pub use notifier::{LogNotifier, Notifier, ReportMessage, WebhookNotifier, build_notifier};

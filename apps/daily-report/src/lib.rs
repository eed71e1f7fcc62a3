pub mod config;
pub mod fetcher;
pub mod notifier;
pub mod report;

pub use config::Config;
pub use fetcher::{ContentFetcher, FetchOutcome};
pub use notifier::{Delivery, Notifier, NotifyError};
pub use report::ReportRecord;

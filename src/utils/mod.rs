/// Opt-in bounded retry with exponential backoff.
pub mod retry;
/// TOML configuration (`askdoc.toml`).
pub mod toml_config;

pub use retry::{with_retry, RetryPolicy};
pub use toml_config::AskdocConfig;

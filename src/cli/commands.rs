//! Handlers for the `process`, `ask` and `config` subcommands.

use std::path::Path;

use super::output::Output;
use crate::session::{AskDoc, IndexHandle};
use crate::types::{AppError, Result};
use crate::utils::toml_config::AskdocConfig;
use crate::utils::{with_retry, RetryPolicy};

/// Build or reuse the index for `file` and report where it lives.
///
/// A failed build leaves nothing cached, so retrying it is safe.
pub async fn process(
    askdoc: &AskDoc,
    file: &Path,
    retry: RetryPolicy,
    output: &Output,
) -> Result<IndexHandle> {
    let handle = with_retry(retry, move || askdoc.process(file)).await?;
    report_index(askdoc, &handle, output);
    Ok(handle)
}

/// Answer `question` about `file`, or about a persisted bundle.
pub async fn ask(
    askdoc: &AskDoc,
    file: Option<&Path>,
    bundle: Option<&Path>,
    question: &str,
    show_sources: bool,
    retry: RetryPolicy,
    output: &Output,
) -> Result<()> {
    let handle = match (bundle, file) {
        (Some(bundle), _) => {
            let handle = askdoc.open_bundle(bundle).await?;
            output.info(&format!(
                "Loaded {} chunks from {}",
                handle.index.len(),
                bundle.display()
            ));
            handle
        }
        (None, Some(file)) => {
            let handle = with_retry(retry, move || askdoc.process(file)).await?;
            output.info(&format!(
                "{} chunks indexed from {}",
                handle.index.len(),
                handle.origin.display()
            ));
            handle
        }
        (None, None) => return Err(AppError::NotInitialized),
    };

    let handle = &handle;
    let answer = with_retry(retry, move || askdoc.ask_with_sources(question, handle)).await?;
    output.answer(&answer.text);

    if show_sources {
        output.header("Sources");
        if answer.sources.is_empty() {
            output.info("No passages retrieved; answered from general knowledge");
        }
        for (rank, hit) in answer.sources.iter().enumerate() {
            output.source(rank + 1, hit);
        }
    }
    Ok(())
}

/// Print or validate the effective configuration.
pub fn config(config: &AskdocConfig, config_path: &Path, validate: bool, output: &Output) -> Result<()> {
    if validate {
        config.validate()?;
        output.success(&format!("{} is valid", config_path.display()));
        return Ok(());
    }

    if !config_path.exists() {
        output.warning(&format!(
            "{} not found, showing built-in defaults",
            config_path.display()
        ));
        output.hint("Run `askdoc init` to write a starter configuration");
    }
    println!("{}", config.to_display_toml()?);
    Ok(())
}

fn report_index(askdoc: &AskDoc, handle: &IndexHandle, output: &Output) {
    output.success(&format!("Indexed {}", handle.origin.display()));
    output.kv("chunks", &handle.index.len().to_string());
    output.kv("dimensions", &handle.index.dimensions().to_string());
    output.kv("metric", handle.index.metric().name());

    if let Some(key) = &handle.key {
        output.kv("fingerprint", &key.fingerprint().to_hex());
        match askdoc.cache().bundle_path(key) {
            Some(path) => output.kv("bundle", &path.display().to_string()),
            None => output.kv("bundle", "not persisted"),
        }
    }
}

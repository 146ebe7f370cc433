//! Init command implementation
//!
//! Writes a starter `askdoc.toml`, a `.env.example` and the index directory.

use super::output::Output;
use crate::utils::toml_config::{ProviderKind, DEFAULT_CONFIG_FILE};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// askdoc.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Provider used for both embeddings and answers
    pub provider: ProviderKind,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing askdoc");

    let base_path = &config.path;
    let config_path = base_path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", DEFAULT_CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let index_dir = base_path.join("data").join("indexes");
    if index_dir.exists() {
        output.skipped("data/indexes", "already exists");
    } else if let Err(e) = fs::create_dir_all(&index_dir) {
        output.error(&format!("Failed to create data/indexes: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("directory", "data/indexes");
    }

    if let Err(e) = write_file(&config_path, &generate_config(config.provider), config.force) {
        output.error(&format!("Failed to create {}: {}", DEFAULT_CONFIG_FILE, e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", DEFAULT_CONFIG_FILE);

    let env_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_path, &generate_env_example(config.provider), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    output.header("Next Steps");
    match config.provider {
        ProviderKind::OpenAI => {
            output.info("Set your API key:");
            output.command("cp .env.example .env  # then edit OPENAI_API_KEY");
        }
        ProviderKind::Ollama => {
            output.info("Start Ollama and pull the models:");
            output.command("ollama pull nomic-embed-text && ollama pull llama3.2");
        }
    }
    output.info("Ask a question about a document:");
    output.command("askdoc ask handbook.pdf \"How many vacation days do I get?\"");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

/// Starter configuration. Every value shown is also the built-in default
/// for the chosen provider.
pub fn generate_config(provider: ProviderKind) -> String {
    let (embedding_model, llm_model, key_line) = match provider {
        ProviderKind::OpenAI => (
            "text-embedding-3-small",
            "gpt-4o-mini",
            "api_key_env = \"OPENAI_API_KEY\"\n",
        ),
        ProviderKind::Ollama => ("nomic-embed-text", "llama3.2", ""),
    };
    let provider = provider.name();

    format!(
        r#"# askdoc configuration

[logging]
level = "info"
json = false

[embeddings]
provider = "{provider}"
model = "{embedding_model}"
{key_line}batch_size = 64
timeout_secs = 60

[llm]
provider = "{provider}"
model = "{llm_model}"
{key_line}temperature = 0.0
timeout_secs = 120

[rag]
chunk_size = 1000
chunk_overlap = 100
top_k = 4
metric = "cosine"

[storage]
index_dir = "./data/indexes"
persist = true

[cache]
# 0 keeps every processed document in memory
max_entries = 0
"#
    )
}

fn generate_env_example(provider: ProviderKind) -> String {
    let mut content = String::from("# Copy to .env and fill in\nRUST_LOG=info\n");
    if provider == ProviderKind::OpenAI {
        content.push_str("OPENAI_API_KEY=sk-...\n");
    }
    content
}

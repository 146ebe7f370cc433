use anyhow::Context;
use askdoc::cli::commands;
use askdoc::cli::init::{self, InitConfig, InitResult};
use askdoc::cli::output::Output;
use askdoc::cli::{Cli, Commands};
use askdoc::utils::RetryPolicy;
use askdoc::utils::toml_config::{AskdocConfig, LoggingConfig, ProviderKind, DEFAULT_CONFIG_FILE};
use askdoc::AskDoc;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Commands::Init {
        path,
        force,
        provider,
    } = &cli.command
    {
        let provider = match provider.as_str() {
            "ollama" => ProviderKind::Ollama,
            _ => ProviderKind::OpenAI,
        };
        return match init::run(
            InitConfig {
                path: path.clone(),
                force: *force,
                provider,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let config = AskdocConfig::load_or_default(cli.config.as_deref())
        .with_context(|| format!("Failed to load {}", config_path(&cli).display()))?;
    init_tracing(&config.logging, cli.verbose);

    if let Err(e) = run(cli, config, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli, config: AskdocConfig, output: &Output) -> askdoc::Result<()> {
    let path = config_path(&cli).to_path_buf();
    let retry = RetryPolicy {
        max_attempts: cli.retries + 1,
        ..RetryPolicy::default()
    };
    match cli.command {
        Commands::Config { validate } => commands::config(&config, &path, validate, output),
        Commands::Process { file } => {
            let askdoc = AskDoc::from_config(&config)?;
            commands::process(&askdoc, &file, retry, output).await.map(|_| ())
        }
        Commands::Ask {
            file,
            question,
            index,
            sources,
        } => {
            let askdoc = AskDoc::from_config(&config)?;
            commands::ask(
                &askdoc,
                file.as_deref(),
                index.as_deref(),
                &question,
                sources,
                retry,
                output,
            )
            .await
        }
        Commands::Init { .. } => Ok(()),
    }
}

fn config_path(cli: &Cli) -> &Path {
    cli.config
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE))
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("askdoc={0},askdoc_index={0}", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

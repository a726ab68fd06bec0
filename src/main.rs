use anyhow::Context;
use ragline::cli::{Cli, Commands, ConfigAction};
use ragline::config::{expand_path, Config};
use ragline::corpus::read_corpus;
use ragline::error::{RaglineError, Result};
use ragline::retrieval::RetrievalPipeline;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Index { file, output } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_index(&config, &file, output)
                .with_context(|| format!("Failed to index {}", file.display()))?;
        }
        Commands::Query { question, k, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_query(&config, &question, k, json).context("Query failed")?;
        }
        Commands::Ask {
            question,
            k,
            show_prompt,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ask(&config, &question, k, show_prompt).context("Ask failed")?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action).context("Config command failed")?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "ragline=debug" } else { "ragline=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| RaglineError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn cmd_index(config: &Config, file: &Path, output: Option<PathBuf>) -> Result<()> {
    let documents = read_corpus(file)?;
    let index_path = expand_path(&output.unwrap_or_else(|| config.storage.index_path.clone()))?;

    tracing::info!("Indexing {} documents from {}", documents.len(), file.display());

    let provider = config.embedding_provider()?;
    let mut pipeline = RetrievalPipeline::new(provider, config.pipeline_options());

    let report = runtime()?.block_on(pipeline.build(documents))?;
    pipeline.save(&index_path)?;

    println!("✓ Indexed {} documents", report.documents);
    println!("  Dimension: {}", report.dimension);
    println!("  Embedding time: {} ms", report.duration_ms);
    println!("  Snapshot: {}", index_path.display());

    Ok(())
}

fn open_pipeline(config: &Config) -> Result<RetrievalPipeline> {
    let index_path = expand_path(&config.storage.index_path)?;
    if !index_path.exists() {
        return Err(RaglineError::Config(format!(
            "No index at {}. Run 'ragline index <FILE>' first.",
            index_path.display()
        )));
    }

    let provider = config.embedding_provider()?;
    Ok(RetrievalPipeline::open(
        provider,
        config.pipeline_options(),
        &index_path,
    )?)
}

fn cmd_query(config: &Config, question: &str, k: Option<usize>, json: bool) -> Result<()> {
    let pipeline = open_pipeline(config)?;
    let k = k.unwrap_or(config.retrieval.top_k);

    let context = runtime()?.block_on(pipeline.query(question, k))?;

    if json {
        let out = serde_json::to_string_pretty(&context).map_err(|e| RaglineError::Json {
            source: e,
            context: "Failed to serialize query results".to_string(),
        })?;
        println!("{}", out);
    } else {
        for doc in &context.documents {
            println!("[{}] ({:.4}) {}", doc.id, doc.distance, doc.content);
        }
    }

    Ok(())
}

fn cmd_ask(config: &Config, question: &str, k: Option<usize>, show_prompt: bool) -> Result<()> {
    let generator = config.text_generator()?;
    let pipeline = open_pipeline(config)?;
    let template = config.prompt_template();
    let k = k.unwrap_or(config.retrieval.top_k);

    let answer = runtime()?.block_on(pipeline.ask(question, k, generator.as_ref(), &template))?;

    if show_prompt {
        println!("{}", answer.prompt);
        println!("---");
    }
    println!("{}", answer.text);

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let out = toml::to_string_pretty(&config)?;
            println!("{}", out);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!(
                "  Embedding: {} ({})",
                config.embedding.provider, config.embedding.model
            );
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| RaglineError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'ragline config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        config.apply_env_overrides();
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

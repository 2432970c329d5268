use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

mod cli;

use cli::Cli;
use cli::commands::Commands;
use toolpilot::config::Config;
use toolpilot::llm::{LlmClient, OfflineClient, create_client};
use toolpilot::pipeline::Orchestrator;
use toolpilot::session::InMemorySession;
use toolpilot::tools::{CatalogHandle, ProviderRegistry, ToolCatalog};

fn setup_logging(default_level: &str) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolpilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("toolpilot.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_catalog(config: &Config) -> Result<ToolCatalog> {
    ProviderRegistry::with_builtin_kinds()
        .build_catalog(&config.providers)
        .context("Failed to build tool catalog")
}

fn oracle(config: &Config) -> Arc<dyn LlmClient> {
    match create_client(&config.llm) {
        Ok(client) => {
            info!("Using oracle '{}'", client.name());
            client
        }
        Err(e) => {
            log::warn!("Oracle unavailable ({}), continuing with pattern extraction only", e);
            eprintln!("{} {}", "Warning:".yellow(), format!("oracle unavailable ({}), running offline", e).dimmed());
            Arc::new(OfflineClient)
        }
    }
}

fn orchestrator(config: &Config) -> Result<Orchestrator> {
    let catalog = build_catalog(config)?;
    info!("Catalog ready with {} tools", catalog.len());
    Ok(Orchestrator::new(
        Arc::new(CatalogHandle::new(catalog)),
        oracle(config),
        config.pipeline.clone(),
    ))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Ask { notes, no_polish, .. } => {
            let utterance = cli.command.utterance().unwrap_or_default();
            handle_ask_command(&utterance, notes.as_deref(), *no_polish, config).await
        }
        Commands::Chat { notes } => handle_chat_command(notes.as_deref(), cli, config).await,
        Commands::Tools { provider } => handle_tools_command(provider.as_deref(), config),
        Commands::CheckConfig => handle_check_config_command(config),
    }
}

async fn handle_ask_command(utterance: &str, notes: Option<&str>, no_polish: bool, config: &Config) -> Result<()> {
    info!("Answering: {}", utterance);
    let mut orchestrator = orchestrator(config)?;
    if no_polish {
        orchestrator.set_polish(false);
    }

    let mut session = InMemorySession::new();
    if let Some(notes) = notes {
        session.set_notes(notes);
    }

    let reply = orchestrator.handle(utterance, &session).await;
    println!("{}", reply);
    Ok(())
}

async fn handle_chat_command(notes: Option<&str>, cli: &Cli, config: &Config) -> Result<()> {
    let orchestrator = orchestrator(config)?;
    let mut session = InMemorySession::new();
    if let Some(notes) = notes {
        session.set_notes(notes);
    }

    println!(
        "{} {}",
        "toolpilot".cyan().bold(),
        "(/tools to list, /reload to rebuild the catalog, /quit to exit)".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/tools" => print_catalog(&orchestrator.catalog(), None),
            "/reload" => match reload_catalog(cli) {
                Ok(catalog) => {
                    let count = catalog.len();
                    let version = orchestrator.reload(catalog);
                    println!("{} catalog v{} with {} tools", "Reloaded:".green(), version, count);
                }
                Err(e) => println!("{} {:#}", "Reload failed:".red(), e),
            },
            utterance => {
                let reply = orchestrator.handle(utterance, &session).await;
                println!("{}\n", reply);
                session.record_exchange(utterance, reply);
            }
        }
    }

    info!("Chat session ended");
    Ok(())
}

fn reload_catalog(cli: &Cli) -> Result<ToolCatalog> {
    let config = Config::load(cli.config.as_ref()).context("Failed to reload configuration")?;
    build_catalog(&config)
}

fn handle_tools_command(provider: Option<&str>, config: &Config) -> Result<()> {
    let catalog = build_catalog(config)?;
    print_catalog(&catalog, provider);
    Ok(())
}

fn print_catalog(catalog: &ToolCatalog, provider: Option<&str>) {
    let tools = match provider {
        Some(owner) => catalog.by_owner(owner),
        None => catalog.tools().iter().collect(),
    };

    if tools.is_empty() {
        println!("{}", "No tools available".yellow());
        return;
    }

    for tool in tools {
        println!("{} {} {}", tool.name.cyan().bold(), format!("[{}]", tool.owner).dimmed(), tool.description);
        println!("    {}", tool.param_summary());
    }
}

fn handle_check_config_command(config: &Config) -> Result<()> {
    config.validate()?;
    println!("{}", "Configuration is valid".green());
    println!("  oracle:    {} ({})", config.llm.provider, config.llm.model);
    println!(
        "  pipeline:  history {} | min confidence {} | list limit {} | polish {}",
        config.pipeline.history_window,
        config.pipeline.min_confidence,
        config.pipeline.list_limit,
        config.pipeline.polish
    );
    for provider in &config.providers {
        let state = if provider.enabled { "enabled".green() } else { "disabled".yellow() };
        println!(
            "  provider:  {} [{}] {} tools, {}",
            provider.id,
            provider.kind,
            provider.tools.len(),
            state
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    setup_logging(&level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

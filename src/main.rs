//! Conclave entry point

mod cache;
mod cli;
mod config;
mod constants;
mod conversation;
mod gateway;
mod llm;
mod review;
mod setup;
mod timeout;

use crate::cache::ResponseCache;
use crate::cli::{Cli, Commands};
use crate::config::RunConfig;
use crate::conversation::Conversation;
use crate::gateway::{Gateway, GatewayError};
use crate::llm::factory::random_model_id;
use crate::llm::EnvResolver;
use crate::review::ConsoleReview;
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::GenerateSetup { topic, cache_seed } => generate_setup(topic, cache_seed).await,
        Commands::Run {
            setup,
            manager_model,
            max_words,
            max_read_minutes,
            call_timeout,
            cache_seed,
        } => {
            let config = RunConfig {
                manager_model,
                max_words,
                max_read_minutes,
                call_timeout_secs: call_timeout,
                cache_seed,
            };
            run_conversation(&setup, config).await
        }
        Commands::ClearCache => clear_cache(),
    };

    if let Err(e) = outcome {
        if matches!(e.downcast_ref::<GatewayError>(), Some(GatewayError::Cancelled)) {
            println!("Run cancelled.");
            return;
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_gateway(cache_seed: u64, call_timeout_secs: Option<u64>) -> Result<Gateway> {
    let cache = ResponseCache::open(cache_seed).context("Failed to open response cache")?;
    Ok(Gateway::new(
        Box::new(EnvResolver),
        cache,
        ConsoleReview::from_env(),
        call_timeout_secs,
    ))
}

fn prompt_for_topic() -> Result<String> {
    print!("What would you like the group conversation or meeting to be about? ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn generate_setup(topic: Option<String>, cache_seed: u64) -> Result<()> {
    let topic = match topic {
        Some(topic) => topic,
        None => prompt_for_topic()?,
    };
    anyhow::ensure!(!topic.is_empty(), "No topic given");

    let gateway = build_gateway(cache_seed, None)?;
    let setup = setup::generate::generate_setup(&gateway, "openai-gpt", &topic).await?;

    match setup {
        Some(setup) => {
            let output = Path::new("setup.json");
            setup.write_to_file(output)?;
            println!(
                "Generated {}. Please review/modify as needed before running the conversation.",
                output.display()
            );
            Ok(())
        }
        None => anyhow::bail!("Failed to generate setup data. Please try again."),
    }
}

async fn run_conversation(setup_path: &Path, config: RunConfig) -> Result<()> {
    let setup = setup::ScenarioSetup::from_file(setup_path)?;

    let manager_model = config
        .manager_model
        .unwrap_or_else(|| random_model_id().to_string());
    println!("Manager model: {}", manager_model);

    let timestamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
    let log_path = format!("meeting_log_{}.json", timestamp);
    println!("Conversation log will be saved to: {}", log_path);

    let gateway = build_gateway(config.cache_seed, config.call_timeout_secs)?;
    let mut conversation = Conversation::new(
        setup,
        manager_model,
        gateway,
        Path::new(&log_path),
        config.max_words,
        config.max_read_minutes,
    );
    conversation.run().await?;

    println!("\nConversation finished!");
    println!("Log is saved in {}.", log_path);
    Ok(())
}

fn clear_cache() -> Result<()> {
    let cache = ResponseCache::open(cache::DEFAULT_CACHE_SEED)
        .context("Failed to open response cache")?;
    cache.clear_all().context("Failed to clear cache")?;
    println!("Cache cleared successfully");
    Ok(())
}

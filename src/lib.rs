pub mod agent;
pub mod catalog;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod progress;
pub mod server;

#[cfg(test)]
mod testing;

use agent::AIAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("LLM Max Attempts: {}", args.llm_max_attempts);
    info!("History Store Type: {}", args.history_type);
    match args.history_type.as_str() {
        "redis" => info!("History Redis URL: {}", args.history_redis_url),
        _ => info!("History Directory: {}", args.history_dir),
    }
    info!("Prompts Directory: {}", args.prompts_dir);
    info!("Courses Path: {}", args.courses_path);
    info!("Learning Paths Path: {}", args.learning_paths_path);
    info!("Course Levels Path: {}", args.course_levels_path);
    info!("Progress API: {}", args.progress_api_url.as_deref().unwrap_or("(not set)"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(AIAgent::new(args.clone()).await?);
    let server = Server::new(args.server_addr.clone(), agent, args);
    server.run().await?;

    Ok(())
}

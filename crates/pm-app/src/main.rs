mod backend;
mod config;
mod error;
mod generator;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use pm_core::PollState;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::generator::Generator;
use crate::generator::notify::LogNotifier;
use crate::generator::poller::ProgressObserver;

#[derive(Debug, Parser)]
#[command(name = "propmesh", version, about = "Property 3D model generation service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the dashboard API
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a model from an image and wait for the result
    Generate { image_url: String },
    /// Poll an existing job until it finishes
    Watch { job_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            backend::serve(config).await
        }
        Command::Generate { image_url } => {
            let generator = console_generator(&config)?;
            let job = generator.submit(&image_url).await?;
            println!("Submitted job {}", job);
            wait_until_complete(&generator).await
        }
        Command::Watch { job_id } => {
            let generator = console_generator(&config)?;
            generator.track(&job_id)?;
            wait_until_complete(&generator).await
        }
    }
}

/// Prints every progress update as it is published.
struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_update(&self, state: &PollState) {
        println!("{:>5.1}% {}", state.progress, state.status.label());
    }
}

fn console_generator(config: &AppConfig) -> anyhow::Result<Generator> {
    let generator = Generator::from_config(
        &config.api,
        config.policy.clone(),
        Arc::new(LogNotifier),
        Some(Arc::new(ConsoleProgress)),
    )?;
    Ok(generator)
}

async fn wait_until_complete(generator: &Generator) -> anyhow::Result<()> {
    let mut rx = generator.subscribe();
    let state = rx.wait_for(|state| state.is_completed()).await?.clone();

    if let Some(err) = &state.last_error {
        println!("Used fallback model after error: {}", err);
    }
    println!("{}", state.result_url.unwrap_or_default());
    Ok(())
}

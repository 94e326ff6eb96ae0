use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::apps::builtin_packages;
use crate::config::{bootstrap, AppConfig, RuntimeConfig};
use crate::configurator::Registry;
use crate::dispatcher::{BodyReceive, BufferedSink, Dispatcher, Scope};
use crate::runtime::Runtime;

/// Command-line interface for solorouter
#[derive(Parser)]
#[command(name = "solo")]
#[command(about = "solorouter CLI", long_about = None)]
pub struct Cli {
    /// Application config file (defaults to `SOLO_CONFIG`, then `config/solo.yaml`)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the compiled route table
    Routes,
    /// Run the full configuration and report the first error
    Check,
    /// Dispatch one synthetic request and print the response
    Request {
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request path, optionally with a query string
        path: String,

        /// Extra headers as `name: value`
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn load_registry(config_path: &Path) -> Result<Registry> {
    let config = AppConfig::load(config_path)?;
    bootstrap(&config, &builtin_packages())
        .with_context(|| format!("configuration of {} failed", config_path.display()))
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let runtime_config = RuntimeConfig::from_env();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| runtime_config.config_path.clone());

    match cli.command {
        Commands::Routes => {
            let registry = load_registry(&config_path)?;
            registry.router().dump_routes();
            Ok(())
        }
        Commands::Check => {
            let registry = load_registry(&config_path)?;
            println!(
                "configuration OK: {} routes, {} sum types",
                registry.router().len(),
                registry.sums().types().len()
            );
            Ok(())
        }
        Commands::Request {
            method,
            path,
            headers,
            data,
        } => {
            let registry = load_registry(&config_path)?;
            let dispatcher = Dispatcher::new(Runtime::new(Arc::new(registry)))
                .with_query_max_fields(runtime_config.query_max_fields);

            let mut scope = Scope::new(&method, &path);
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("invalid header {header:?}, expected `name: value`"))?;
                scope = scope.with_header(name.trim(), value.trim());
            }
            let mut receive = BodyReceive::new(data.unwrap_or_default());
            let mut sink = BufferedSink::new();

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start the async runtime")?;
            rt.block_on(dispatcher.handle(scope, &mut receive, &mut sink))
                .context("dispatch failed")?;

            let response = sink
                .into_response()
                .ok_or_else(|| anyhow::anyhow!("no response was sent"))?;
            println!("HTTP {}", response.status);
            for (name, value) in &response.headers {
                println!("{name}: {value}");
            }
            println!();
            println!("{}", response.body_text());
            Ok(())
        }
    }
}

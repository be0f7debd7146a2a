// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use httpstack_cli::commands;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "httpstack")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Before/after routing and DOM view composition for server-rendered sites", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch one request and print the response body
    Render {
        /// Request path, optionally with a query string
        path: String,
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,
    },
    /// List registered routes
    Routes,
    /// Serve the project over HTTP
    Serve {
        /// Port to run the server on (default: from app.toml)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (default: from app.toml)
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Render { path, method } => {
            commands::render::run(&cli.root, &method, &path)
        }
        Commands::Routes => {
            commands::routes::run(&cli.root)
        }
        Commands::Serve { port, host } => {
            commands::serve::run(&cli.root, host, port).await
        }
    }
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use creation_importer::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "creation-importer",
    about = "Scrape creation pages and bulk-import them into a destination service",
    version,
    after_help = "Run 'creation-importer <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Destination service base URL (overrides config and environment)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk-import creations, one page at a time
    Import {
        /// JSON file with an array of {creationId, url, title?}
        #[arg(long, conflicts_with = "from_page")]
        file: Option<PathBuf>,
        /// Collect creations from the links on this listing page
        #[arg(long)]
        from_page: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },
    /// Extract a single creation page and print the record
    Extract {
        /// Creation page URL
        url: String,
        /// Read the page from a saved HTML file instead of a browser
        #[arg(long)]
        html: Option<PathBuf>,
        /// Submit the record to the destination
        #[arg(long)]
        submit: bool,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },
    /// Ask the destination whether a creation was imported
    Status {
        /// Creation id
        creation_id: String,
    },
    /// Check that the destination service is reachable
    Health,
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose);

    let json = cli.json;
    let endpoint = cli.endpoint.as_deref();

    let result = match cli.command {
        Commands::Import {
            file,
            from_page,
            headful,
        } => {
            cli::import_cmd::run(endpoint, file.as_deref(), from_page.as_deref(), headful, json)
                .await
        }
        Commands::Extract {
            url,
            html,
            submit,
            headful,
        } => cli::extract_cmd::run(endpoint, &url, html.as_deref(), submit, headful, json).await,
        Commands::Status { creation_id } => {
            cli::status_cmd::run(endpoint, &creation_id, json).await
        }
        Commands::Health => cli::health_cmd::run(endpoint, json).await,
        Commands::Doctor => cli::doctor::run(endpoint).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "creation-importer", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if json {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

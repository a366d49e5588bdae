// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `creation-importer` binary.

pub mod doctor;
pub mod extract_cmd;
pub mod health_cmd;
pub mod import_cmd;
pub mod output;
pub mod status_cmd;

use crate::config::ImporterConfig;
use crate::destination::DestinationClient;
use crate::extract::CreationExtractor;
use crate::pipeline::ImportPipeline;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so that `--json`
/// output on stdout stays parseable. `CREATION_IMPORTER_LOG_JSON=1` switches
/// to JSON log lines.
pub fn init_tracing(verbose: bool) {
    let directive = if verbose {
        "creation_importer=debug"
    } else {
        "creation_importer=info"
    };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = directive.parse() {
        filter = filter.add_directive(d);
    }
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let json_logs = std::env::var("CREATION_IMPORTER_LOG_JSON").is_ok_and(|v| v.trim() == "1");
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Configuration with the `--endpoint` flag applied.
pub fn load_config(endpoint: Option<&str>) -> Result<ImporterConfig> {
    Ok(ImporterConfig::load()?.with_endpoint(endpoint))
}

/// Destination client for the configured endpoint.
pub fn destination(config: &ImporterConfig) -> DestinationClient {
    DestinationClient::new(&config.endpoint, config.timing)
}

/// Launch Chromium and build a pipeline over it.
pub async fn live_pipeline(
    config: &ImporterConfig,
    headful: bool,
) -> Result<(Arc<dyn Renderer>, Arc<ImportPipeline>)> {
    let renderer: Arc<dyn Renderer> = Arc::new(ChromiumRenderer::launch(!headful).await?);
    let pipeline = pipeline_over(Arc::clone(&renderer), config);
    Ok((renderer, pipeline))
}

/// A pipeline over any renderer, with the configured extractor and timing.
pub fn pipeline_over(renderer: Arc<dyn Renderer>, config: &ImporterConfig) -> Arc<ImportPipeline> {
    let extractor = Arc::new(CreationExtractor::new(config.site.clone(), config.timing));
    Arc::new(ImportPipeline::new(renderer, extractor, config.timing))
}

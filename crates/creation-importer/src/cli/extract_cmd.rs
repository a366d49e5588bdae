// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! `creation-importer extract`: extract one creation page.

use crate::cli::output;
use crate::renderer::snapshot::SnapshotRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Extract `url` (from a live browser or a saved HTML file), print the
/// record, and optionally submit it.
pub async fn run(
    endpoint: Option<&str>,
    url: &str,
    html: Option<&Path>,
    submit: bool,
    headful: bool,
    json: bool,
) -> Result<()> {
    let mut config = super::load_config(endpoint)?;

    let (renderer, pipeline) = match html {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            config.timing.render_settle = Duration::ZERO;
            let renderer: Arc<dyn Renderer> =
                Arc::new(SnapshotRenderer::new().with_page(url, raw));
            let pipeline = super::pipeline_over(Arc::clone(&renderer), &config);
            (renderer, pipeline)
        }
        None => super::live_pipeline(&config, headful).await?,
    };

    let result = if submit {
        let client = super::destination(&config);
        pipeline.import_one(&client, url).await.map(|(record, receipt)| {
            serde_json::json!({ "record": record, "receipt": receipt })
        })
    } else {
        pipeline
            .extract_url(url)
            .await
            .and_then(|record| Ok(serde_json::to_value(record)?))
    };

    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e}");
    }
    let value = result?;

    if json {
        output::print_json_line(&value);
    } else {
        output::print_json(&value);
    }
    Ok(())
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! `creation-importer import`: bulk-import a list of creations.

use crate::cli::output;
use crate::config::ImporterConfig;
use crate::listing::collect_descriptors;
use crate::progress::{self, ProgressReceiver};
use crate::record::{CreationDescriptor, ItemStatus};
use crate::renderer::Renderer;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Run a bulk import from a descriptor file or a listing page.
pub async fn run(
    endpoint: Option<&str>,
    file: Option<&Path>,
    from_page: Option<&str>,
    headful: bool,
    json: bool,
) -> Result<()> {
    let config = super::load_config(endpoint)?;
    let (renderer, pipeline) = super::live_pipeline(&config, headful).await?;

    let items = match (file, from_page) {
        (Some(path), _) => read_descriptors(path)?,
        (None, Some(url)) => match descriptors_from_page(renderer.as_ref(), &config, url).await {
            Ok(items) => items,
            Err(e) => {
                shutdown(renderer.as_ref()).await;
                return Err(e);
            }
        },
        (None, None) => {
            shutdown(renderer.as_ref()).await;
            bail!("nothing to import: pass --file or --from-page");
        }
    };

    if !json {
        eprintln!(
            "Importing {} creation(s) into {}",
            items.len(),
            config.endpoint
        );
    }

    let total = items.len();
    let (tx, rx) = progress::channel();
    let ack = pipeline.start(items, &config.endpoint, Some(tx));
    if json {
        output::print_json_line(&ack);
    }

    let tally = follow(rx, total, json).await;
    shutdown(renderer.as_ref()).await;

    if !json {
        eprintln!(
            "Done: {} imported, {} duplicate, {} skipped, {} failed",
            tally.imported, tally.duplicate, tally.skipped, tally.error
        );
    }
    Ok(())
}

/// Read a JSON array of descriptors.
pub fn read_descriptors(path: &Path) -> Result<Vec<CreationDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let items: Vec<CreationDescriptor> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of creations", path.display()))?;
    Ok(items)
}

/// Render a listing page and collect its creation links.
async fn descriptors_from_page(
    renderer: &dyn Renderer,
    config: &ImporterConfig,
    url: &str,
) -> Result<Vec<CreationDescriptor>> {
    let mut page = renderer.open(url).await?;
    if tokio::time::timeout(config.timing.load_timeout, page.wait_for_load())
        .await
        .is_err()
    {
        debug!("listing page did not signal load, continuing");
    }
    tokio::time::sleep(config.timing.render_settle).await;

    let snapshot = async {
        let html = page.get_html().await?;
        let base = page.get_url().await.unwrap_or_else(|_| url.to_string());
        anyhow::Ok((html, base))
    }
    .await;
    if let Err(e) = page.close().await {
        warn!("failed to close listing page: {e}");
    }
    let (html, base) = snapshot?;

    let items = collect_descriptors(&html, &base);
    if items.is_empty() {
        bail!("no creation links found on {url}");
    }
    Ok(items)
}

#[derive(Default)]
struct Tally {
    imported: usize,
    duplicate: usize,
    skipped: usize,
    error: usize,
}

/// Consume progress events until the run completes.
async fn follow(mut rx: ProgressReceiver, total: usize, json: bool) -> Tally {
    let mut tally = Tally::default();
    let bar = (!json).then(|| output::import_bar(total as u64));

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                warn!("progress output fell behind, {n} event(s) dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if json {
            output::print_json_line(&event);
        }
        if event.is_complete() {
            break;
        }
        let Some(item) = event.item() else {
            continue;
        };
        match item.status {
            ItemStatus::Imported => tally.imported += 1,
            ItemStatus::Duplicate => tally.duplicate += 1,
            ItemStatus::Skipped => tally.skipped += 1,
            ItemStatus::Error => tally.error += 1,
            _ => {}
        }
        if let Some(bar) = &bar {
            bar.set_message(format!("{} [{}]", item.title, item.status));
            if item.status.is_terminal() {
                bar.set_position(item.current as u64);
                if let Some(error) = &item.error {
                    bar.println(format!("  {} failed: {error}", item.title));
                }
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    tally
}

async fn shutdown(renderer: &dyn Renderer) {
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e}");
    }
}

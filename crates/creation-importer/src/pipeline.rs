// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bulk import pipeline.
//!
//! Items are processed strictly one after another: status check, page
//! lifecycle, extraction, submission. Every outcome is reported on the
//! progress channel; no item failure stops the run. The run ends with
//! exactly one completion event.

use crate::config::Timing;
use crate::destination::{DestinationClient, ImportReceipt};
use crate::extract::{ExtractError, PageExtractor};
use crate::progress::{self, ItemProgress, ProgressKind, ProgressSender, RunComplete};
use crate::record::{CreationDescriptor, CreationRecord, ItemStatus, PipelineItem};
use crate::renderer::{RenderContext, Renderer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immediate answer to a start request. Outcomes arrive on the progress
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    pub ok: bool,
    pub started: bool,
}

/// Terminal-status counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub total: usize,
    pub imported: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub error: usize,
}

impl RunSummary {
    fn count(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Imported => self.imported += 1,
            ItemStatus::Duplicate => self.duplicate += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Error => self.error += 1,
            _ => {}
        }
    }
}

/// State of one run, threaded through every step.
struct RunContext {
    run_id: String,
    total: usize,
    progress: Option<ProgressSender>,
    seq: u64,
    summary: RunSummary,
}

impl RunContext {
    fn new(total: usize, progress: Option<ProgressSender>) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        Self {
            summary: RunSummary {
                run_id: run_id.clone(),
                total,
                ..Default::default()
            },
            run_id,
            total,
            progress,
            seq: 0,
        }
    }

    /// Report the item's current status under `title`.
    fn report(&mut self, index: usize, item: &PipelineItem, title: &str) {
        if item.status.is_terminal() {
            self.summary.count(item.status);
        }
        progress::emit(
            &self.progress,
            &self.run_id,
            &mut self.seq,
            ProgressKind::Item(ItemProgress {
                current: index + 1,
                total: self.total,
                status: item.status,
                title: title.to_string(),
                creation_id: item.descriptor.creation_id.clone(),
                error: item.error.clone(),
            }),
        );
    }

    fn complete(&mut self) {
        progress::emit(
            &self.progress,
            &self.run_id,
            &mut self.seq,
            ProgressKind::Complete(RunComplete {
                complete: true,
                total: self.total,
            }),
        );
    }
}

/// Drives creation pages through extraction and submission.
pub struct ImportPipeline {
    renderer: Arc<dyn Renderer>,
    extractor: Arc<dyn PageExtractor>,
    timing: Timing,
}

impl ImportPipeline {
    pub fn new(renderer: Arc<dyn Renderer>, extractor: Arc<dyn PageExtractor>, timing: Timing) -> Self {
        Self {
            renderer,
            extractor,
            timing,
        }
    }

    /// Start a run in the background and acknowledge immediately.
    ///
    /// `endpoint` is captured now, so later configuration changes do not
    /// affect the run.
    pub fn start(
        self: &Arc<Self>,
        items: Vec<CreationDescriptor>,
        endpoint: &str,
        progress: Option<ProgressSender>,
    ) -> StartAck {
        let pipeline = Arc::clone(self);
        let client = DestinationClient::new(endpoint, self.timing);
        tokio::spawn(async move {
            let summary = pipeline.run_with(&client, items, progress).await;
            debug!("run {} finished", summary.run_id);
        });
        StartAck {
            ok: true,
            started: true,
        }
    }

    /// Run to completion against `endpoint`.
    pub async fn run(
        &self,
        items: Vec<CreationDescriptor>,
        endpoint: &str,
        progress: Option<ProgressSender>,
    ) -> RunSummary {
        let client = DestinationClient::new(endpoint, self.timing);
        self.run_with(&client, items, progress).await
    }

    /// Run to completion against an existing client.
    pub async fn run_with(
        &self,
        client: &DestinationClient,
        items: Vec<CreationDescriptor>,
        progress: Option<ProgressSender>,
    ) -> RunSummary {
        let mut items: Vec<PipelineItem> = items.into_iter().map(PipelineItem::new).collect();
        let mut ctx = RunContext::new(items.len(), progress);
        info!(
            "run {} started: {} items to {}",
            ctx.run_id,
            ctx.total,
            client.endpoint()
        );

        let last = items.len().saturating_sub(1);
        for (index, item) in items.iter_mut().enumerate() {
            self.process_item(&mut ctx, client, index, item).await;
            if index < last {
                tokio::time::sleep(self.timing.item_pause).await;
            }
        }

        ctx.complete();
        info!(
            "run {} complete: {} imported, {} duplicate, {} skipped, {} failed",
            ctx.run_id,
            ctx.summary.imported,
            ctx.summary.duplicate,
            ctx.summary.skipped,
            ctx.summary.error
        );
        ctx.summary
    }

    async fn process_item(
        &self,
        ctx: &mut RunContext,
        client: &DestinationClient,
        index: usize,
        item: &mut PipelineItem,
    ) {
        let label = item.descriptor.label();
        let creation_id = item.descriptor.creation_id.clone();

        item.advance(ItemStatus::Checking, None);
        ctx.report(index, item, &label);

        match client.check_status(&creation_id).await {
            Ok(status) if status.exists => {
                let title = status
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| label.clone());
                item.advance(ItemStatus::Skipped, None);
                ctx.report(index, item, &title);
                info!("{creation_id}: already imported, skipped");
                return;
            }
            Ok(_) => {}
            Err(e) => warn!("{creation_id}: status check failed, importing anyway: {e}"),
        }

        item.advance(ItemStatus::Importing, None);
        ctx.report(index, item, &label);

        let record = match self.extract_url(&item.descriptor.url).await {
            Ok(record) => record,
            Err(e) => {
                let message = e.to_string();
                warn!("{creation_id}: extraction failed: {message}");
                item.advance(ItemStatus::Error, Some(message));
                ctx.report(index, item, &label);
                return;
            }
        };

        match client.submit(&record).await {
            Ok(receipt) => {
                let status = if receipt.duplicate {
                    ItemStatus::Duplicate
                } else {
                    ItemStatus::Imported
                };
                let title = record
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(label);
                item.advance(status, None);
                ctx.report(index, item, &title);
                info!("{creation_id}: {status}");
            }
            Err(e) => {
                let message = e.to_string();
                warn!("{creation_id}: submission failed: {message}");
                item.advance(ItemStatus::Error, Some(message));
                ctx.report(index, item, &label);
            }
        }
    }

    /// Open `url`, extract, and always close the page.
    pub async fn extract_url(&self, url: &str) -> anyhow::Result<CreationRecord> {
        let mut page = self.renderer.open(url).await?;
        let result = self.drive(&mut page).await;
        if let Err(e) = page.close().await {
            warn!("failed to close page for {url}: {e}");
        }
        let record = result?;
        if record.url.trim().is_empty() {
            return Err(ExtractError::NoRecord(url.to_string()).into());
        }
        Ok(record)
    }

    /// Import a single creation page: extract it and submit it, refusing
    /// records that identify neither a creation nor an image.
    pub async fn import_one(
        &self,
        client: &DestinationClient,
        url: &str,
    ) -> anyhow::Result<(CreationRecord, ImportReceipt)> {
        let record = self.extract_url(url).await?;
        if !record.is_identifiable() {
            return Err(ExtractError::NoRecord(url.to_string()).into());
        }
        let receipt = client.submit(&record).await?;
        info!(
            "{}: {}",
            record.creation_id.as_deref().unwrap_or(url),
            if receipt.duplicate { "duplicate" } else { "imported" }
        );
        Ok((record, receipt))
    }

    async fn drive(
        &self,
        page: &mut Box<dyn RenderContext>,
    ) -> Result<CreationRecord, ExtractError> {
        match tokio::time::timeout(self.timing.load_timeout, page.wait_for_load()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("load signal failed, continuing: {e}"),
            Err(_) => debug!(
                "no load signal within {}ms, continuing",
                self.timing.load_timeout.as_millis()
            ),
        }
        tokio::time::sleep(self.timing.render_settle).await;

        let page: &dyn RenderContext = page.as_ref();
        match self.extractor.extract(page).await {
            Err(ExtractError::NotInjected) => {
                debug!("extraction capability missing, injecting");
                self.extractor.inject(page).await?;
                tokio::time::sleep(self.timing.inject_retry_delay).await;
                self.extractor.extract(page).await
            }
            other => other,
        }
    }
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer over saved HTML.
//!
//! Pages are served from memory and never execute scripts, so extraction
//! runs in its static mode: no interaction, no rendition capture.

use super::{RenderContext, Renderer};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Serves registered HTML documents by URL.
#[derive(Default)]
pub struct SnapshotRenderer {
    pages: RwLock<HashMap<String, String>>,
    active_count: Arc<AtomicUsize>,
    opened: AtomicUsize,
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `html` as the content served for `url`.
    pub fn insert(&self, url: impl Into<String>, html: impl Into<String>) {
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(url.into(), html.into());
        }
    }

    /// Builder form of [`SnapshotRenderer::insert`].
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    /// Total number of pages opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Renderer for SnapshotRenderer {
    async fn open(&self, url: &str) -> Result<Box<dyn RenderContext>> {
        let html = match self.pages.read() {
            Ok(pages) => pages.get(url).cloned(),
            Err(_) => None,
        };
        let Some(html) = html else {
            bail!("no snapshot registered for {url}");
        };
        self.opened.fetch_add(1, Ordering::Relaxed);
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SnapshotContext {
            url: url.to_string(),
            html,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// One opened snapshot.
pub struct SnapshotContext {
    url: String,
    html: String,
    active_count: Arc<AtomicUsize>,
}

impl SnapshotContext {
    /// A standalone page, not tracked by any renderer.
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            active_count: Arc::new(AtomicUsize::new(1)),
        }
    }
}

#[async_trait]
impl RenderContext for SnapshotContext {
    async fn wait_for_load(&mut self) -> Result<()> {
        Ok(())
    }

    async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
        bail!("scripts are not available in a snapshot")
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    fn supports_scripts(&self) -> bool {
        false
    }
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page control abstraction.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! browser engine (Chromium via chromiumoxide) and over saved snapshots.

pub mod chromium;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;

/// A browser engine that opens pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new background page and start loading `url`.
    ///
    /// Returns as soon as navigation has been requested; use
    /// [`RenderContext::wait_for_load`] to observe completion.
    async fn open(&self, url: &str) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open pages.
    fn active_contexts(&self) -> usize;
}

/// A single open page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Wait for the page's load-complete signal. Not bounded; callers apply
    /// their own timeout.
    async fn wait_for_load(&mut self) -> Result<()>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Close this page.
    async fn close(self: Box<Self>) -> Result<()>;
    /// Whether [`RenderContext::execute_js`] can run scripts at all.
    fn supports_scripts(&self) -> bool {
        true
    }
}

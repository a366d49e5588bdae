// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. CREATION_IMPORTER_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("CREATION_IMPORTER_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.creation-importer/chromium/
    if let Some(home) = dirs::home_dir() {
        let base = home.join(".creation-importer").join("chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                base.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome"),
            ]
        } else {
            vec![base.join("chrome-linux64/chrome"), base.join("chrome")]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    /// `None` once shut down.
    browser: Mutex<Option<Browser>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance. `headless = false` shows the window,
    /// which lets pages that require a signed-in profile render.
    pub async fn launch(headless: bool) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set CREATION_IMPORTER_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open(&self, url: &str) -> Result<Box<dyn RenderContext>> {
        // Background target: the page never takes focus from the user.
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .background(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid target parameters: {e}"))?;
        let page = {
            let browser = self.browser.lock().await;
            let Some(browser) = browser.as_ref() else {
                bail!("browser has been shut down");
            };
            browser
                .new_page(target)
                .await
                .context("failed to create new page")?
        };

        // Not `goto`: that would also wait for the load, which the caller
        // bounds separately.
        if let Err(e) = page.execute(NavigateParams::new(url)).await {
            let _ = page.close().await;
            return Err(anyhow::anyhow!("navigation to {url} failed: {e}"));
        }

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    /// Close the browser process. Later calls are no-ops; `open` fails
    /// afterwards.
    async fn shutdown(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        browser.close().await.context("failed to close Chromium")?;
        if let Err(e) = browser.wait().await {
            tracing::debug!("Chromium did not exit cleanly: {e}");
        }
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn wait_for_load(&mut self) -> Result<()> {
        self.page
            .wait_for_navigation()
            .await
            .context("page did not finish loading")?;
        Ok(())
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.execute_js("document.documentElement.outerHTML")
            .await?
            .as_str()
            .map(str::to_string)
            .context("page returned no document HTML")
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_open_and_snapshot() {
        let renderer = ChromiumRenderer::launch(true)
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .open("data:text/html,<h1>Sunset</h1><div><b>Seed</b><span>42</span></div>")
            .await
            .expect("failed to open page");
        assert_eq!(renderer.active_contexts(), 1);

        let _ = tokio::time::timeout(std::time::Duration::from_secs(10), ctx.wait_for_load()).await;

        let result = ctx
            .execute_js("document.querySelector('h1').textContent")
            .await
            .expect("JS execution failed");
        assert_eq!(result.as_str().unwrap(), "Sunset");

        let html = ctx.get_html().await.expect("get_html failed");
        assert!(html.contains("<b>Seed</b>"));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
        renderer.shutdown().await.expect("second shutdown failed");
        assert!(renderer.open("about:blank").await.is_err());
    }
}

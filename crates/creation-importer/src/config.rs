// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Importer configuration.
//!
//! Values are layered: built-in defaults, then `~/.creation-importer/config.json`,
//! then `CREATION_IMPORTER_*` environment variables. CLI flags are applied on
//! top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Destination used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

/// Everything the importer needs to know before a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Base URL of the destination service (no trailing slash).
    pub endpoint: String,
    /// Source-site assumptions used by the extraction heuristics.
    #[serde(default)]
    pub site: SiteProfile,
    /// Bounds and settle delays for every suspension point.
    #[serde(default)]
    pub timing: Timing,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            site: SiteProfile::default(),
            timing: Timing::default(),
        }
    }
}

impl ImporterConfig {
    /// Load defaults, the config file (if present) and environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: PartialConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        let mut resolved = Self::default();
        if let Some(endpoint) = config.endpoint.take() {
            resolved.endpoint = normalize_endpoint(&endpoint);
        }
        if let Some(site) = config.site.take() {
            resolved.site = site;
        }
        if let Some(timing) = config.timing.take() {
            resolved.timing = timing;
        }
        Ok(resolved)
    }

    /// Apply `CREATION_IMPORTER_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(endpoint) = read_env_string("CREATION_IMPORTER_ENDPOINT") {
            if !endpoint.is_empty() {
                self.endpoint = normalize_endpoint(&endpoint);
            }
        }
        self.timing.render_settle = Duration::from_millis(read_env_u64(
            "CREATION_IMPORTER_SETTLE_MS",
            self.timing.render_settle.as_millis() as u64,
        ));
        self.timing.load_timeout = Duration::from_millis(read_env_u64(
            "CREATION_IMPORTER_LOAD_TIMEOUT_MS",
            self.timing.load_timeout.as_millis() as u64,
        ));
        self.timing.item_pause = Duration::from_millis(read_env_u64(
            "CREATION_IMPORTER_ITEM_PAUSE_MS",
            self.timing.item_pause.as_millis() as u64,
        ));
    }

    /// Override the endpoint (used for the `--endpoint` flag).
    pub fn with_endpoint(mut self, endpoint: Option<&str>) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = normalize_endpoint(endpoint);
        }
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    endpoint: Option<String>,
    site: Option<SiteProfile>,
    timing: Option<Timing>,
}

/// Source-site assumptions. Any DOM change on the source site that breaks
/// extraction should only require edits here and in the label tables of
/// [`crate::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Value written to `CreationRecord::source`.
    pub source_name: String,
    /// Substring identifying the asset CDN in image URLs.
    pub asset_host: String,
    /// Accent colour of the "primary artifact" marker icon, as hex.
    pub marker_hex: String,
    /// The same colour as a computed-style `rgb(...)` string.
    pub marker_rgb: String,
    /// Landmark heading above the generation settings.
    pub settings_heading: String,
    /// Brand appended to document titles (`Title | Brand`).
    pub title_brand: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            source_name: "NightCafe Studio".to_string(),
            asset_host: "nightcafe".to_string(),
            marker_hex: "#e64d6a".to_string(),
            marker_rgb: "rgb(230, 77, 106)".to_string(),
            settings_heading: "Creation Settings".to_string(),
            title_brand: "NightCafe".to_string(),
        }
    }
}

impl SiteProfile {
    /// Whether a URL points at the asset CDN.
    pub fn is_asset_url(&self, url: &str) -> bool {
        !self.asset_host.is_empty() && url.contains(&self.asset_host)
    }
}

/// Every bounded suspension in the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Destination status lookup.
    #[serde(with = "millis")]
    pub status_timeout: Duration,
    /// Destination submission.
    #[serde(with = "millis")]
    pub submit_timeout: Duration,
    /// Destination health probe.
    #[serde(with = "millis")]
    pub health_timeout: Duration,
    /// Upper bound on waiting for a page's load-complete signal.
    #[serde(with = "millis")]
    pub load_timeout: Duration,
    /// Client-side rendering delay after load.
    #[serde(with = "millis")]
    pub render_settle: Duration,
    /// Delay between injecting the extraction capability and retrying.
    #[serde(with = "millis")]
    pub inject_retry_delay: Duration,
    /// Pause between consecutive pipeline items.
    #[serde(with = "millis")]
    pub item_pause: Duration,
    /// Delay after clicking an "expand truncated text" control.
    #[serde(with = "millis")]
    pub expand_settle: Duration,
    /// Polling interval while waiting for a gallery rendition.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Upper bound on waiting for a gallery rendition.
    #[serde(with = "millis")]
    pub poll_timeout: Duration,
    /// Extra render buffer after a rendition poll resolves.
    #[serde(with = "millis")]
    pub rendition_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            status_timeout: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
            load_timeout: Duration::from_secs(15),
            render_settle: Duration::from_millis(2500),
            inject_retry_delay: Duration::from_millis(1500),
            item_pause: Duration::from_millis(800),
            expand_settle: Duration::from_millis(700),
            poll_interval: Duration::from_millis(80),
            poll_timeout: Duration::from_millis(800),
            rendition_settle: Duration::from_millis(100),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// `~/.creation-importer/config.json`, unless `CREATION_IMPORTER_CONFIG` points elsewhere.
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(custom) = read_env_string("CREATION_IMPORTER_CONFIG") {
        if !custom.is_empty() {
            return Some(PathBuf::from(custom));
        }
    }
    dirs::home_dir().map(|home| home.join(".creation-importer").join("config.json"))
}

/// Trim whitespace and any trailing slashes.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Image resolution: full-size URLs, the primary artifact, and the gallery.
//!
//! Scanning is pure over a snapshot. Renditions that only appear after a
//! thumbnail is selected are captured against the live page in
//! [`capture_renditions`].

use crate::config::{SiteProfile, Timing};
use crate::dom::{self, css_path, parent_element};
use crate::record::MAX_IMAGES;
use crate::renderer::RenderContext;
use crate::wait::wait_until;
use scraper::ElementRef;
use tracing::debug;

/// Transform requested for full-size CDN images.
pub const FULL_SIZE_TRANSFORM: &str = "w-4096,c-at_max";

/// Icon elements that may carry the primary-artifact marker colour.
pub const MARKER_ICONS: &str = r#"i[class*="mdi"], span[class*="mdi"], .v-icon, [class*="v-icon"]"#;

/// Gallery containers.
pub const GALLERY: &str = r#"[data-thumb-gallery], [class*="thumb-gallery"], [class*="thumbGallery"], [class*="ThumbGallery"]"#;

/// Clickable thumbnails inside a gallery.
const GALLERY_THUMBS: &str = r#"img, [role="button"], [class*="thumb"]"#;

/// Ancestor levels searched above a marker icon.
const MARKER_DEPTH: usize = 10;
/// Thumbnails clicked per gallery.
const MAX_THUMB_CLICKS: usize = 10;
/// Minimum natural width for the "largest image" fallback.
const PRIMARY_MIN_WIDTH: u32 = 100;
/// Minimum natural size for the no-gallery fallback.
const FALLBACK_MIN_SIDE: u32 = 50;

/// Rewrite a CDN thumbnail URL to its full-resolution form.
///
/// A `?tr=` query transform is replaced by [`FULL_SIZE_TRANSFORM`]; otherwise
/// every `/tr:...` path segment is removed. Other URLs pass through. Applying
/// it twice gives the same result as applying it once.
pub fn to_full_size(url: &str) -> String {
    if let Some(pos) = url.find("?tr=") {
        let rest = &url[pos + 4..];
        let end = rest
            .find(|c: char| c == '#' || c.is_whitespace())
            .unwrap_or(rest.len());
        return format!("{}?tr={}{}", &url[..pos], FULL_SIZE_TRANSFORM, &rest[end..]);
    }
    if !url.contains("/tr:") {
        return url.to_string();
    }
    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(pos) = rest.find("/tr:") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        rest = match tail.find('/') {
            Some(slash) => &tail[slash..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// Whether an icon is painted in the marker colour, by computed colour or
/// inline style.
pub fn is_marker(icon: ElementRef<'_>, site: &SiteProfile) -> bool {
    if let Some(color) = icon.value().attr(dom::ATTR_COLOR) {
        if color.trim() == site.marker_rgb {
            return true;
        }
    }
    let style = icon.value().attr("style").unwrap_or("");
    if style.is_empty() {
        return false;
    }
    let style = style.to_lowercase();
    let hex = site.marker_hex.trim_start_matches('#').to_lowercase();
    let triple = site
        .marker_rgb
        .trim_start_matches("rgb(")
        .trim_end_matches(')');
    (!hex.is_empty() && style.contains(&hex)) || (!triple.is_empty() && style.contains(triple))
}

/// Asset-host image inside or behind `el`, as written in the page.
fn asset_image_near(el: ElementRef<'_>, site: &SiteProfile) -> Option<String> {
    if let Some(img) = dom::select_first(el, "img") {
        if let Some(src) = dom::image_source(img).filter(|s| site.is_asset_url(s)) {
            return Some(src);
        }
    }
    dom::background_url(el).filter(|u| site.is_asset_url(u))
}

/// The largest asset-host `<img>` wider than 100px. Ties go to the first in
/// document order. Images of unknown size are not considered.
pub fn largest_asset_image<'a>(root: ElementRef<'a>, site: &SiteProfile) -> Option<ElementRef<'a>> {
    let mut best: Option<(u64, ElementRef<'a>)> = None;
    for img in dom::select_all(root, "img") {
        let Some(src) = dom::image_source(img) else { continue };
        if !site.is_asset_url(&src) {
            continue;
        }
        let Some((w, h)) = dom::natural_size(img) else { continue };
        if w <= PRIMARY_MIN_WIDTH {
            continue;
        }
        let area = u64::from(w) * u64::from(h);
        if best.map_or(true, |(a, _)| area > a) {
            best = Some((area, img));
        }
    }
    best.map(|(_, img)| img)
}

/// The primary artifact image, full size.
///
/// Marker icons are tried in document order; from each, up to ten ancestors
/// are searched for an asset-host image or background. When no marker
/// resolves, the largest asset-host image on the page is used.
pub fn find_primary_image(root: ElementRef<'_>, site: &SiteProfile) -> Option<String> {
    for icon in dom::select_all(root, MARKER_ICONS) {
        if !is_marker(icon, site) {
            continue;
        }
        let mut ancestor = parent_element(icon);
        for _ in 0..MARKER_DEPTH {
            let Some(el) = ancestor else { break };
            if let Some(url) = asset_image_near(el, site) {
                return Some(to_full_size(&url));
            }
            ancestor = parent_element(el);
        }
    }
    let largest = largest_asset_image(root, site)?;
    dom::image_source(largest).map(|src| to_full_size(&src))
}

/// Static result of scanning the page for gallery images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryScan {
    /// Full-size URLs in page order, deduplicated.
    pub images: Vec<String>,
    /// Whether `images` came from gallery containers (as opposed to the
    /// whole-page fallback).
    pub from_gallery: bool,
    /// CSS paths of the thumbnails to select, when renditions should be
    /// captured.
    pub thumb_targets: Vec<String>,
    /// CSS path of the main display image polled after each selection.
    pub main_target: Option<String>,
}

impl GalleryScan {
    /// Whether selecting thumbnails can reveal further renditions.
    pub fn is_interactive(&self) -> bool {
        self.main_target.is_some() && self.thumb_targets.len() > 1
    }

    /// Merge captured renditions into the static images, deduplicated and
    /// capped.
    pub fn merged(&self, renditions: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.images.len() + renditions.len());
        for url in self.images.iter().cloned().chain(renditions) {
            if !out.contains(&url) {
                out.push(url);
            }
        }
        out.truncate(MAX_IMAGES);
        out
    }
}

fn push_unique(images: &mut Vec<String>, url: String) {
    if !images.contains(&url) {
        images.push(url);
    }
}

/// Scan gallery containers for thumbnails, or fall back to every reasonably
/// large asset-host image when the page has none.
pub fn scan_gallery(root: ElementRef<'_>, site: &SiteProfile) -> GalleryScan {
    let galleries = dom::select_all(root, GALLERY);
    let mut scan = GalleryScan::default();

    for gallery in &galleries {
        let imgs = dom::select_all(*gallery, "img");
        if imgs.is_empty() {
            for thumb in dom::select_all(*gallery, r#"[style*="background"]"#) {
                if let Some(url) = dom::background_url(thumb).filter(|u| site.is_asset_url(u)) {
                    push_unique(&mut scan.images, to_full_size(&url));
                }
            }
        } else {
            for img in imgs {
                if let Some(src) = dom::image_source(img).filter(|s| site.is_asset_url(s)) {
                    push_unique(&mut scan.images, to_full_size(&src));
                }
            }
        }
    }

    if let Some(first) = galleries.first() {
        if scan.images.len() > 1 {
            let thumbs: Vec<String> = dom::select_all(*first, GALLERY_THUMBS)
                .into_iter()
                .take(MAX_THUMB_CLICKS)
                .map(css_path)
                .collect();
            let main = largest_asset_image(root, site).map(css_path);
            if main.is_some() && thumbs.len() > 1 {
                scan.thumb_targets = thumbs;
                scan.main_target = main;
            }
        }
    }

    if scan.images.is_empty() {
        for img in dom::select_all(root, "img") {
            let Some(src) = dom::image_source(img).filter(|s| site.is_asset_url(s)) else {
                continue;
            };
            match dom::natural_size(img) {
                Some((w, h)) if w >= FALLBACK_MIN_SIDE && h >= FALLBACK_MIN_SIDE => {
                    push_unique(&mut scan.images, to_full_size(&src));
                }
                _ => {}
            }
        }
    } else {
        scan.from_gallery = true;
    }

    scan.images.truncate(MAX_IMAGES);
    scan
}

fn click_script(selector: &str) -> String {
    let sel = serde_json::Value::String(selector.to_string());
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()"
    )
}

fn source_script(selector: &str) -> String {
    let sel = serde_json::Value::String(selector.to_string());
    format!(
        "(() => {{ const el = document.querySelector({sel}); return el ? (el.currentSrc || el.src || null) : null; }})()"
    )
}

/// Select `selector` in the live page. Returns whether an element was clicked.
pub async fn click(page: &dyn RenderContext, selector: &str) -> bool {
    match page.execute_js(&click_script(selector)).await {
        Ok(v) => v.as_bool().unwrap_or(false),
        Err(e) => {
            debug!("click on {selector} failed: {e}");
            false
        }
    }
}

async fn current_source(page: &dyn RenderContext, selector: &str) -> Option<String> {
    page.execute_js(&source_script(selector))
        .await
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
}

/// Select each thumbnail in turn and record what the main image switches
/// to. Each selection waits (bounded) for the main image source to change,
/// then a short settle delay.
pub async fn capture_renditions(
    page: &dyn RenderContext,
    scan: &GalleryScan,
    timing: &Timing,
) -> Vec<String> {
    let mut captured = Vec::new();
    if !scan.is_interactive() || !page.supports_scripts() {
        return captured;
    }
    let Some(main) = scan.main_target.as_deref() else {
        return captured;
    };

    for thumb in &scan.thumb_targets {
        let before = current_source(page, main).await;
        if !click(page, thumb).await {
            continue;
        }
        let prev = before.as_deref();
        let changed = wait_until(timing.poll_interval, timing.poll_timeout, move || async move {
            current_source(page, main).await.as_deref() != prev
        })
        .await;
        tokio::time::sleep(timing.rendition_settle).await;
        if !changed {
            debug!("main image did not change after selecting {thumb}");
        }
        if let Some(src) = current_source(page, main).await {
            if Some(src.as_str()) != prev {
                push_unique(&mut captured, to_full_size(&src));
            }
        }
    }
    captured
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Creation extraction.
//!
//! `CreationExtractor` turns one open creation page into a `CreationRecord`.
//! The live page is touched only to install the page capability, annotate
//! and snapshot the DOM, and perform clicks; every field is then read from
//! the snapshot by the pure functions below. Each field degrades to `None`
//! on its own. Only an unreachable page fails the whole call.

use crate::config::{SiteProfile, Timing};
use crate::dom::{self, text_of};
use crate::images::{self, GalleryScan};
use crate::locator::{self, locate, locate_any, locate_image_any};
use crate::record::{CreationRecord, CreationType};
use crate::renderer::RenderContext;
use crate::structured::{self, JsonLdFallbacks};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use tracing::debug;

/// Installs `window.__creationImporter` unless present. Its `annotate()`
/// copies rendered-only values onto `data-ci-*` attributes so that a plain
/// HTML snapshot carries them.
pub const CAPABILITY_SCRIPT: &str = r#"(() => {
  if (typeof window.__creationImporter === 'object') return true;
  const ICONS = 'i[class*="mdi"], span[class*="mdi"], .v-icon, [class*="v-icon"]';
  const bgUrl = (el) => {
    const s = window.getComputedStyle(el).backgroundImage;
    if (!s || s === 'none') return null;
    const m = s.match(/url\(["']?([^"')]+)["']?\)/);
    return m ? m[1] : null;
  };
  window.__creationImporter = {
    version: 1,
    annotate() {
      document.querySelectorAll('img').forEach((img) => {
        const src = img.currentSrc || img.src;
        if (src) img.setAttribute('data-ci-src', src);
        if (img.complete && img.naturalWidth) {
          img.setAttribute('data-ci-natural', img.naturalWidth + 'x' + img.naturalHeight);
        }
      });
      document.querySelectorAll(ICONS).forEach((el) => {
        el.setAttribute('data-ci-color', window.getComputedStyle(el).color);
      });
      document.querySelectorAll('body *').forEach((el) => {
        const url = bgUrl(el);
        if (url) el.setAttribute('data-ci-bg', url);
      });
      return true;
    },
  };
  return true;
})()"#;

const CAPABILITY_PROBE: &str = "typeof window.__creationImporter === 'object'";
const ANNOTATE: &str = "window.__creationImporter.annotate()";

/// Errors that fail a whole extraction.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The page capability is missing; inject it and retry.
    #[error("extraction capability is not available in the page")]
    NotInjected,
    /// The page is detached, navigated away, or its script channel failed.
    #[error("page unreachable: {0}")]
    Unreachable(String),
    /// The page yielded nothing that identifies a creation.
    #[error("no identifiable creation on {0}")]
    NoRecord(String),
}

/// Something that extracts a creation from an open page.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Install the extraction capability into `page`.
    async fn inject(&self, page: &dyn RenderContext) -> Result<(), ExtractError>;
    /// Extract the creation shown in `page`.
    async fn extract(&self, page: &dyn RenderContext) -> Result<CreationRecord, ExtractError>;
}

/// Labels for one field: exact labels in order, then an optional fuzzy
/// keyword.
struct FieldLabels {
    exact: &'static [&'static str],
    fuzzy: Option<&'static str>,
}

const TEXT_PROMPT: FieldLabels = FieldLabels {
    exact: &["Text Prompts", "Prompt"],
    fuzzy: None,
};
const VIDEO_PROMPT: FieldLabels = FieldLabels {
    exact: &["Video Prompt", "Video prompt"],
    fuzzy: Some("video prompt"),
};
const REVISED_PROMPT: FieldLabels = FieldLabels {
    exact: &[
        "Revised Prompt",
        "Revised prompt",
        "DALL-E Revised Prompt",
        "Revised Text Prompt",
    ],
    fuzzy: Some("revised"),
};
const START_IMAGE: FieldLabels = FieldLabels {
    exact: &[
        "Start Image",
        "Start image",
        "Init Image",
        "Initial Image",
        "Source Image",
        "Reference Image",
        "Input Image",
        "Img2Img Image",
        "Style Image",
    ],
    fuzzy: Some("start"),
};
const INITIAL_RESOLUTION: FieldLabels = FieldLabels {
    exact: &["Initial Resolution"],
    fuzzy: None,
};
const ASPECT_RATIO: FieldLabels = FieldLabels {
    exact: &["Aspect Ratio"],
    fuzzy: None,
};
const SEED: FieldLabels = FieldLabels {
    exact: &["Seed"],
    fuzzy: None,
};

/// Auxiliary settings stored under `metadata`.
const AUX_FIELDS: &[(&str, FieldLabels)] = &[
    (
        "samplingMethod",
        FieldLabels {
            exact: &["Sampling method", "Sampling Method"],
            fuzzy: None,
        },
    ),
    (
        "runtime",
        FieldLabels {
            exact: &["Runtime"],
            fuzzy: None,
        },
    ),
    (
        "overallPromptWeight",
        FieldLabels {
            exact: &["Overall Prompt Weight"],
            fuzzy: None,
        },
    ),
    (
        "refinerWeight",
        FieldLabels {
            exact: &["Refiner Weight"],
            fuzzy: None,
        },
    ),
    (
        "duration",
        FieldLabels {
            exact: &["Duration", "Video Duration"],
            fuzzy: None,
        },
    ),
];

/// Label whose presence marks a video creation.
const VIDEO_MARKER_LABEL: &str = "Video Prompt";
/// Texts of the control that expands a truncated prompt.
const EXPAND_TEXTS: &[&str] = &["show full prompt", "show full", "toon volledige prompt"];
/// Texts of the control only the owner of a published creation sees.
const UNPUBLISH_TEXTS: &[&str] = &["unpublish", "unpublish creation"];
/// Ancestors searched above the settings heading.
const SCOPE_DEPTH: usize = 5;

fn field(labels: &FieldLabels, scope: ElementRef<'_>) -> Option<String> {
    locate_any(labels.exact, labels.fuzzy, scope)
}

fn image_field(labels: &FieldLabels, scope: ElementRef<'_>) -> Option<String> {
    locate_image_any(labels.exact, labels.fuzzy, scope)
}

fn creation_id_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/creation/([a-zA-Z0-9_-]+)").ok())
        .as_ref()
}

fn popularity_counter() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[KM+]+$").ok()).as_ref()
}

fn hidden_prompt() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)has hidden the prompt").ok())
        .as_ref()
}

/// Creation id from the path of a creation URL.
pub fn creation_id_from_url(url: &str) -> Option<String> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    creation_id_pattern()?
        .captures(&path)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Remove a trailing ` | Brand...` / ` - Brand...` suffix from a title.
pub fn strip_title_brand(title: &str, brand: &str) -> String {
    if brand.is_empty() {
        return title.trim().to_string();
    }
    let pattern = format!(r"(?i)\s*[|\-—]\s*{}.*$", regex::escape(brand));
    match Regex::new(&pattern) {
        Ok(re) => re.replace(title, "").trim().to_string(),
        Err(_) => title.trim().to_string(),
    }
}

/// The region holding the generation settings: the nearest sectioning or
/// classed container above the landmark heading, else the heading's parent,
/// else the body.
pub fn settings_scope<'a>(document: &'a Html, site: &SiteProfile) -> ElementRef<'a> {
    let body = dom::body(document);
    let heading = dom::select_all(document.root_element(), "h2, h3, h4, h5, h6")
        .into_iter()
        .find(|h| text_of(*h) == site.settings_heading);
    let Some(heading) = heading else {
        return body;
    };
    let mut current = dom::parent_element(heading);
    for _ in 0..SCOPE_DEPTH {
        let Some(el) = current else { break };
        let tag = dom::tag_name(el);
        if tag == "section" || tag == "article" || dom::class_of(el).chars().count() > 3 {
            return el;
        }
        current = dom::parent_element(el);
    }
    dom::parent_element(heading).unwrap_or(body)
}

/// The control that expands a truncated prompt, as a CSS path.
pub fn find_expand_control(scope: ElementRef<'_>) -> Option<String> {
    dom::select_all(scope, r#"button, a, span, [role="button"]"#)
        .into_iter()
        .find(|el| {
            let text = text_of(*el).to_lowercase();
            EXPAND_TEXTS.contains(&text.as_str())
        })
        .map(dom::css_path)
}

/// Whether the page shows an "unpublish" control.
pub fn is_published(root: ElementRef<'_>) -> bool {
    dom::select_all(root, r#"button, a, [role="button"]"#)
        .into_iter()
        .any(|el| {
            let text = text_of(el).to_lowercase();
            UNPUBLISH_TEXTS.contains(&text.as_str())
        })
}

/// Model name: the first model link (text, else its slug), else the last
/// meaningful line of the `Model` value.
pub fn model_name(scope: ElementRef<'_>) -> Option<String> {
    if let Some(link) = dom::select_first(scope, r#"a[href*="/model/"]"#) {
        let text = text_of(link);
        if !text.is_empty() {
            return Some(text);
        }
        return link
            .value()
            .attr("href")
            .and_then(|href| href.split("/model/").nth(1))
            .map(|slug| slug.replace('-', " "))
            .filter(|slug| !slug.is_empty());
    }

    let raw = locate("Model", scope)?;
    let counter = popularity_counter();
    let last = raw
        .lines()
        .map(str::trim)
        .filter(|l| l.chars().count() > 1)
        .filter(|l| counter.map_or(true, |re| !re.is_match(l)))
        .last()
        .map(str::to_string);
    Some(last.unwrap_or(raw))
}

/// Texts of all tag links.
pub fn tags(root: ElementRef<'_>) -> Vec<String> {
    dom::select_all(root, r#"a[href*="/tag/"]"#)
        .into_iter()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect()
}

/// What a snapshot yields before any live interaction with the gallery.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub record: CreationRecord,
    pub gallery: GalleryScan,
    jsonld: JsonLdFallbacks,
}

impl ExtractedPage {
    /// Fold in captured gallery renditions and the remaining fallbacks, and
    /// enforce the image invariants.
    pub fn finish(self, renditions: Vec<String>) -> CreationRecord {
        let ExtractedPage {
            mut record,
            gallery,
            jsonld,
        } = self;
        record.all_images = gallery.merged(renditions);
        record.reconcile_images();

        if record.image_url.is_none() {
            record.image_url = jsonld.image;
        }
        if record.prompt.is_none() {
            record.prompt = jsonld.description;
        }
        if record.title.is_none() {
            record.title = jsonld.name;
        }
        if let Some(author) = jsonld.author {
            record.set_metadata_if_absent("author", author);
        }
        if let Some(created) = jsonld.date_created {
            record.set_metadata_if_absent("dateCreated", created);
        }
        if let Some(published) = jsonld.date_published {
            record.set_metadata_if_absent("datePublished", published);
        }

        record.reconcile_images();
        record
    }
}

/// Read every field that a snapshot can provide.
pub fn read_page(html: &str, url: &str, site: &SiteProfile) -> ExtractedPage {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let meta = structured::extract_meta_tags(&document);
    let jsonld = structured::extract_jsonld(&document);
    let scope = settings_scope(&document, site);

    let mut record = CreationRecord::new(url);
    record.source = Some(site.source_name.clone());
    record.creation_id = creation_id_from_url(url);

    record.title = dom::select_first(root, "h1")
        .map(text_of)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            meta.title()
                .map(|t| strip_title_brand(t, &site.title_brand))
                .filter(|t| !t.is_empty())
        });

    record.creation_type = Some(if locator::has_label(VIDEO_MARKER_LABEL, scope) {
        CreationType::Video
    } else {
        CreationType::Image
    });

    match field(&TEXT_PROMPT, scope) {
        Some(p) if hidden_prompt().map_or(false, |re| re.is_match(&p)) => {
            record.metadata.insert("promptHidden".into(), true.into());
        }
        other => record.prompt = other,
    }
    record.video_prompt = field(&VIDEO_PROMPT, scope);
    if record.prompt.is_none() {
        record.prompt = record.video_prompt.clone();
    }
    if record.prompt.is_none() {
        record.prompt = meta.description().map(str::to_string);
    }

    record.revised_prompt = field(&REVISED_PROMPT, scope);
    record.start_image_url = image_field(&START_IMAGE, scope);
    record.model = model_name(scope);
    record.initial_resolution = field(&INITIAL_RESOLUTION, scope);
    record.aspect_ratio = field(&ASPECT_RATIO, scope);
    record.seed = field(&SEED, scope);
    for (key, labels) in AUX_FIELDS {
        if let Some(value) = field(labels, scope) {
            record.metadata.insert((*key).to_string(), value.into());
        }
    }

    record.is_published = is_published(root);

    record.image_url = images::find_primary_image(root, site).or_else(|| meta.image().map(str::to_string));
    let gallery = images::scan_gallery(root, site);

    let tags = tags(root);
    if !tags.is_empty() {
        record.metadata.insert("tags".into(), tags.into());
    }

    if record.title.is_none() {
        debug!("no title found on {url}");
    }

    ExtractedPage {
        record,
        gallery,
        jsonld,
    }
}

/// Extract from HTML alone, without any live interaction.
pub fn extract_html(html: &str, url: &str, site: &SiteProfile) -> CreationRecord {
    read_page(html, url, site).finish(Vec::new())
}

/// Finds the expand control in a snapshot, as a CSS path.
fn expand_target(html: &str, site: &SiteProfile) -> Option<String> {
    let document = Html::parse_document(html);
    let scope = settings_scope(&document, site);
    find_expand_control(scope)
}

/// The extractor for creation pages.
pub struct CreationExtractor {
    site: SiteProfile,
    timing: Timing,
}

impl CreationExtractor {
    pub fn new(site: SiteProfile, timing: Timing) -> Self {
        Self { site, timing }
    }

    async fn ensure_capability(&self, page: &dyn RenderContext) -> Result<(), ExtractError> {
        match page.execute_js(CAPABILITY_PROBE).await {
            Ok(v) if v.as_bool() == Some(true) => Ok(()),
            Ok(_) => Err(ExtractError::NotInjected),
            Err(e) => Err(ExtractError::Unreachable(e.to_string())),
        }
    }

    async fn snapshot(&self, page: &dyn RenderContext) -> Result<String, ExtractError> {
        if page.supports_scripts() {
            if let Err(e) = page.execute_js(ANNOTATE).await {
                debug!("annotation failed: {e}");
            }
        }
        page.get_html()
            .await
            .map_err(|e| ExtractError::Unreachable(e.to_string()))
    }
}

#[async_trait]
impl PageExtractor for CreationExtractor {
    async fn inject(&self, page: &dyn RenderContext) -> Result<(), ExtractError> {
        if !page.supports_scripts() {
            return Ok(());
        }
        page.execute_js(CAPABILITY_SCRIPT)
            .await
            .map(|_| ())
            .map_err(|e| ExtractError::Unreachable(e.to_string()))
    }

    async fn extract(&self, page: &dyn RenderContext) -> Result<CreationRecord, ExtractError> {
        let scripted = page.supports_scripts();
        if scripted {
            self.ensure_capability(page).await?;
        }
        let url = page
            .get_url()
            .await
            .map_err(|e| ExtractError::Unreachable(e.to_string()))?;

        let mut html = self.snapshot(page).await?;
        if scripted {
            if let Some(target) = expand_target(&html, &self.site) {
                if images::click(page, &target).await {
                    tokio::time::sleep(self.timing.expand_settle).await;
                    html = self.snapshot(page).await?;
                }
            }
        }

        let extracted = read_page(&html, &url, &self.site);
        let renditions = if scripted && extracted.gallery.is_interactive() {
            images::capture_renditions(page, &extracted.gallery, &self.timing).await
        } else {
            Vec::new()
        };
        Ok(extracted.finish(renditions))
    }
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Helpers over parsed page snapshots.
//!
//! The live page is never queried here. Values that only exist in a rendered
//! page (computed colour, natural image size, resolved `src`, computed
//! background) are copied onto `data-ci-*` attributes by the injected page
//! capability before the snapshot is taken; the readers below prefer those
//! attributes and fall back to what plain markup carries.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Resolved image source, written by the page capability.
pub const ATTR_SRC: &str = "data-ci-src";
/// `<naturalWidth>x<naturalHeight>`, written by the page capability.
pub const ATTR_NATURAL: &str = "data-ci-natural";
/// Computed `color`, written by the page capability.
pub const ATTR_COLOR: &str = "data-ci-color";
/// URL from the computed `background-image`, written by the page capability.
pub const ATTR_BG: &str = "data-ci-bg";

/// Select all matches of `css` under `scope`. Invalid selectors match nothing.
pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => scope.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

/// First match of `css` under `scope`.
pub fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    scope.select(&sel).next()
}

/// `<body>` if the document has one, otherwise the root element.
pub fn body(document: &Html) -> ElementRef<'_> {
    select_first(document.root_element(), "body").unwrap_or_else(|| document.root_element())
}

/// Trimmed text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Length in characters, the unit every length heuristic is written in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

pub fn next_element_sibling(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// Every non-empty text node under `scope`, trimmed, with its parent element.
pub fn text_nodes<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = (&'a str, ElementRef<'a>)> {
    scope.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let parent = node.parent().and_then(ElementRef::wrap)?;
        let trimmed: &str = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some((trimmed, parent))
        }
    })
}

/// Lower-cased tag name.
pub fn tag_name<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().name()
}

/// Image source of an `<img>`: the resolved source when annotated, then
/// `src`, then common lazy-load attributes.
pub fn image_source(el: ElementRef<'_>) -> Option<String> {
    [ATTR_SRC, "src", "data-src", "data-lazy-src"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Natural size of an image when known, from the annotation or from
/// `width`/`height` attributes.
pub fn natural_size(el: ElementRef<'_>) -> Option<(u32, u32)> {
    if let Some(raw) = el.value().attr(ATTR_NATURAL) {
        if let Some((w, h)) = raw.split_once('x') {
            if let (Ok(w), Ok(h)) = (w.trim().parse(), h.trim().parse()) {
                return Some((w, h));
            }
        }
    }
    let w = el.value().attr("width")?.trim().parse().ok()?;
    let h = el.value().attr("height")?.trim().parse().ok()?;
    Some((w, h))
}

fn inline_bg_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"background(?:-image)?\s*:\s*url\(\s*["']?([^"')]+)["']?\s*\)"#).ok()
    })
    .as_ref()
}

/// URL of an element's background image, annotated or inline.
pub fn background_url(el: ElementRef<'_>) -> Option<String> {
    if let Some(bg) = el.value().attr(ATTR_BG) {
        let bg = bg.trim();
        if !bg.is_empty() {
            return Some(bg.to_string());
        }
    }
    let style = el.value().attr("style")?;
    let caps = inline_bg_pattern()?.captures(style)?;
    caps.get(1).map(|m| m.as_str().trim().to_string())
}

/// Class attribute, or empty.
pub fn class_of<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().attr("class").unwrap_or("")
}

/// A `tag:nth-child(i) > ...` path from the root element to `el`.
///
/// Snapshots are serialized from the live DOM, so the path re-targets the
/// same element in the page as long as it has not re-rendered in between.
pub fn css_path(el: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(el);
    while let Some(node) = current {
        let parent = parent_element(node);
        let segment = match parent {
            Some(_) => {
                let index = node
                    .prev_siblings()
                    .filter(|s| s.value().is_element())
                    .count()
                    + 1;
                format!("{}:nth-child({index})", tag_name(node))
            }
            None => tag_name(node).to_string(),
        };
        segments.push(segment);
        current = parent;
    }
    segments.reverse();
    segments.join(" > ")
}

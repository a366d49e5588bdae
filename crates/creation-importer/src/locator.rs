// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Label → value lookup in a DOM with no stable schema.
//!
//! A label is a short text node (e.g. `Seed`); its value is the text of the
//! first suitable element following it: the label element's next sibling,
//! then the next sibling of each of its nearest ancestors. All functions are
//! pure over a parsed snapshot and return `None` when nothing qualifies.

use crate::dom::{self, char_len, next_element_sibling, parent_element, text_of};
use crate::images::to_full_size;
use scraper::ElementRef;

/// Ancestors whose next sibling is considered for exact labels.
const EXACT_DEPTH: usize = 3;
/// Ancestors whose next sibling is considered for fuzzy labels.
const FUZZY_DEPTH: usize = 2;

/// Slack allowed between a label's text and its element's full text.
const LABEL_SLACK: usize = 4;
/// Values longer than this are containers, not values.
const MAX_SCAN_LEN: usize = 2000;
/// Values must be shorter than this to be accepted.
const MAX_VALUE_LEN: usize = 1500;

const FUZZY_NODE_MAX: usize = 60;
const FUZZY_PARENT_MAX: usize = 80;
const FUZZY_VALUE_MIN: usize = 10;

const FUZZY_IMAGE_NODE_MAX: usize = 50;
const FUZZY_IMAGE_PARENT_MAX: usize = 60;

const MODEL_LINK: &str = r#"a[href*="/model/"]"#;

/// The elements that may hold the value for `label`, nearest first.
pub fn value_candidates(label: ElementRef<'_>, depth: usize) -> Vec<ElementRef<'_>> {
    let mut out = Vec::with_capacity(depth + 1);
    let mut current = Some(label);
    for _ in 0..=depth {
        let Some(el) = current else { break };
        if let Some(sibling) = next_element_sibling(el) {
            out.push(sibling);
        }
        current = parent_element(el);
    }
    out
}

/// Generic locate: for each text node under `container` accepted by
/// `is_label` (given the trimmed text and its parent element), walk the
/// value candidates and return the first one `accept` maps to a value.
pub fn locate_with<'a, T>(
    container: ElementRef<'a>,
    is_label: impl Fn(&str, ElementRef<'a>) -> bool,
    depth: usize,
    accept: impl Fn(ElementRef<'a>) -> Option<T>,
) -> Option<T> {
    for (text, label_el) in dom::text_nodes(container) {
        if !is_label(text, label_el) {
            continue;
        }
        if let Some(value) = value_candidates(label_el, depth)
            .into_iter()
            .find_map(&accept)
        {
            return Some(value);
        }
    }
    None
}

/// Whether a text node exactly matching `label` exists under `container`.
pub fn has_label(label: &str, container: ElementRef<'_>) -> bool {
    dom::text_nodes(container).any(|(text, _)| text == label)
}

fn is_exact_label(label: &str, text: &str, label_el: ElementRef<'_>) -> bool {
    text == label && char_len(&text_of(label_el)) <= char_len(label) + LABEL_SLACK
}

/// Exact lookup: the value adjacent to the text node equal to `label`.
///
/// A link to a model page inside the candidate wins over the candidate's
/// full text. A model link without text (an icon link) ends the lookup
/// with no value.
pub fn locate(label: &str, container: ElementRef<'_>) -> Option<String> {
    locate_with(
        container,
        |text, el| is_exact_label(label, text, el),
        EXACT_DEPTH,
        |cand| {
            let value = text_of(cand);
            let len = char_len(&value);
            if value.is_empty() || value == label || len > MAX_SCAN_LEN {
                return None;
            }
            if let Some(link) = dom::select_first(cand, MODEL_LINK) {
                let text = text_of(link);
                return Some((!text.is_empty()).then_some(text));
            }
            (len < MAX_VALUE_LEN).then_some(Some(value))
        },
    )
    .flatten()
}

/// Fuzzy lookup: any short text node containing `keyword` (case-insensitive)
/// labels a value, as long as the value is substantial and does not repeat
/// the keyword.
pub fn locate_fuzzy(keyword: &str, container: ElementRef<'_>) -> Option<String> {
    let kw = keyword.to_lowercase();
    locate_with(
        container,
        |text, el| {
            text.to_lowercase().contains(&kw)
                && char_len(text) <= FUZZY_NODE_MAX
                && char_len(&text_of(el)) <= FUZZY_PARENT_MAX
        },
        FUZZY_DEPTH,
        |cand| {
            let value = text_of(cand);
            let len = char_len(&value);
            (len > FUZZY_VALUE_MIN && len < MAX_SCAN_LEN && !value.to_lowercase().contains(&kw))
                .then_some(value)
        },
    )
}

/// Try each exact label in order, then the fuzzy keyword.
pub fn locate_any(labels: &[&str], fuzzy: Option<&str>, container: ElementRef<'_>) -> Option<String> {
    labels
        .iter()
        .find_map(|label| locate(label, container))
        .or_else(|| fuzzy.and_then(|kw| locate_fuzzy(kw, container)))
}

/// Full-size URL of the image shown in or as `cand`.
fn image_in(cand: ElementRef<'_>) -> Option<String> {
    if dom::tag_name(cand) == "img" {
        if let Some(src) = dom::image_source(cand) {
            return Some(to_full_size(&src));
        }
    }
    if let Some(img) = dom::select_first(cand, "img") {
        if let Some(src) = dom::image_source(img).filter(|s| s.starts_with("http")) {
            return Some(to_full_size(&src));
        }
    }
    dom::background_url(cand).map(|u| to_full_size(&u))
}

/// Exact lookup of an image that follows `label`.
pub fn locate_image(label: &str, container: ElementRef<'_>) -> Option<String> {
    locate_with(
        container,
        |text, el| is_exact_label(label, text, el),
        EXACT_DEPTH,
        image_in,
    )
}

/// Fuzzy lookup of an image that follows a label containing `keyword`.
pub fn locate_image_fuzzy(keyword: &str, container: ElementRef<'_>) -> Option<String> {
    let kw = keyword.to_lowercase();
    locate_with(
        container,
        |text, el| {
            text.to_lowercase().contains(&kw)
                && char_len(text) <= FUZZY_IMAGE_NODE_MAX
                && char_len(&text_of(el)) <= FUZZY_IMAGE_PARENT_MAX
        },
        FUZZY_DEPTH,
        image_in,
    )
}

/// Try each exact image label in order, then the fuzzy keyword.
pub fn locate_image_any(
    labels: &[&str],
    fuzzy: Option<&str>,
    container: ElementRef<'_>,
) -> Option<String> {
    labels
        .iter()
        .find_map(|label| locate_image(label, container))
        .or_else(|| fuzzy.and_then(|kw| locate_image_fuzzy(kw, container)))
}

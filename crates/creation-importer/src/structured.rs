// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Meta tags and embedded JSON-LD, used as lower-precedence fallbacks for
//! fields the DOM heuristics could not resolve.

use scraper::{Html, Selector};
use serde_json::Value;

/// OpenGraph / Twitter card / document title values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTags {
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
    /// Text of `<title>`.
    pub document_title: Option<String>,
}

impl MetaTags {
    /// Title candidates in precedence order.
    pub fn title(&self) -> Option<&str> {
        self.og_title
            .as_deref()
            .or(self.twitter_title.as_deref())
            .or(self.document_title.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        self.og_description
            .as_deref()
            .or(self.twitter_description.as_deref())
    }

    pub fn image(&self) -> Option<&str> {
        self.og_image.as_deref().or(self.twitter_image.as_deref())
    }
}

/// Values taken from `application/ld+json` blocks. The first block that
/// provides a value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonLdFallbacks {
    pub image: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub date_created: Option<String>,
    pub date_published: Option<String>,
}

/// Extract meta tags. Empty `content` attributes count as absent.
pub fn extract_meta_tags(document: &Html) -> MetaTags {
    let mut meta = MetaTags::default();
    if let Ok(sel) = Selector::parse(r#"meta[property^="og:"]"#) {
        for element in document.select(&sel) {
            let property = element.value().attr("property").unwrap_or("");
            let Some(content) = non_empty(element.value().attr("content")) else {
                continue;
            };
            let slot = match property {
                "og:title" => &mut meta.og_title,
                "og:description" => &mut meta.og_description,
                "og:image" => &mut meta.og_image,
                _ => continue,
            };
            slot.get_or_insert(content);
        }
    }
    if let Ok(sel) = Selector::parse(r#"meta[name^="twitter:"]"#) {
        for element in document.select(&sel) {
            let name = element.value().attr("name").unwrap_or("");
            let Some(content) = non_empty(element.value().attr("content")) else {
                continue;
            };
            let slot = match name {
                "twitter:title" => &mut meta.twitter_title,
                "twitter:description" => &mut meta.twitter_description,
                "twitter:image" => &mut meta.twitter_image,
                _ => continue,
            };
            slot.get_or_insert(content);
        }
    }
    if let Ok(sel) = Selector::parse("title") {
        if let Some(el) = document.select(&sel).next() {
            let text: String = el.text().collect();
            meta.document_title = non_empty(Some(text.as_str()));
        }
    }
    meta
}

/// Extract JSON-LD fallbacks from every parseable block. `@graph` arrays and
/// top-level arrays are walked in order; malformed blocks are skipped.
pub fn extract_jsonld(document: &Html) -> JsonLdFallbacks {
    let mut ld = JsonLdFallbacks::default();
    let Ok(sel) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return ld;
    };
    for element in document.select(&sel) {
        let text = element.inner_html();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            process_jsonld_value(&value, &mut ld);
        }
    }
    ld
}

fn process_jsonld_value(value: &Value, ld: &mut JsonLdFallbacks) {
    if let Some(items) = value.as_array() {
        for item in items {
            process_jsonld_value(item, ld);
        }
    } else if let Some(graph) = value.get("@graph").and_then(|g| g.as_array()) {
        for item in graph {
            absorb_jsonld_object(item, ld);
        }
    } else {
        absorb_jsonld_object(value, ld);
    }
}

fn absorb_jsonld_object(value: &Value, ld: &mut JsonLdFallbacks) {
    if ld.image.is_none() {
        ld.image = image_of(value.get("image"))
            .or_else(|| image_of(value.get("thumbnail")))
            .or_else(|| string_of(value.get("thumbnailUrl")));
    }
    fill(&mut ld.description, value.get("description"));
    fill(&mut ld.name, value.get("name"));
    if ld.author.is_none() {
        ld.author = match value.get("author") {
            Some(Value::Array(authors)) => authors.iter().find_map(|a| string_of(a.get("name"))),
            Some(author) => string_of(author.get("name")),
            None => None,
        };
    }
    fill(&mut ld.date_created, value.get("dateCreated"));
    fill(&mut ld.date_published, value.get("datePublished"));
}

/// `image` may be a URL, an `ImageObject`, or a list of either.
fn image_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(Some(s.as_str())),
        Value::Array(items) => items.iter().find_map(|v| image_of(Some(v))),
        Value::Object(obj) => string_of(obj.get("url")).or_else(|| string_of(obj.get("contentUrl"))),
        _ => None,
    }
}

fn string_of(value: Option<&Value>) -> Option<String> {
    non_empty(value?.as_str())
}

fn fill(slot: &mut Option<String>, value: Option<&Value>) {
    if slot.is_none() {
        *slot = string_of(value);
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Creation descriptors from a listing page (profile, gallery, search).

use crate::dom::{self, text_of};
use crate::extract::creation_id_from_url;
use crate::record::CreationDescriptor;
use scraper::Html;
use url::Url;

/// Every `/creation/<id>` link on the page, first occurrence wins, with
/// absolute URLs resolved against `base_url`. The title is the link text,
/// or the `alt` of an image inside the link.
pub fn collect_descriptors(html: &str, base_url: &str) -> Vec<CreationDescriptor> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut out: Vec<CreationDescriptor> = Vec::new();

    for link in dom::select_all(document.root_element(), r#"a[href*="/creation/"]"#) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let absolute = match &base {
            Some(base) => match base.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            },
            None => match Url::parse(href) {
                Ok(u) => u,
                Err(_) => continue,
            },
        };
        let Some(creation_id) = creation_id_from_url(absolute.as_str()) else {
            continue;
        };

        let title = Some(text_of(link))
            .filter(|t| !t.is_empty())
            .or_else(|| {
                dom::select_first(link, "img[alt]")
                    .and_then(|img| img.value().attr("alt"))
                    .map(|alt| alt.trim().to_string())
                    .filter(|alt| !alt.is_empty())
            });

        if let Some(existing) = out.iter_mut().find(|d| d.creation_id == creation_id) {
            if existing.title.is_none() {
                existing.title = title;
            }
            continue;
        }

        let mut url = absolute;
        url.set_query(None);
        url.set_fragment(None);
        out.push(CreationDescriptor {
            creation_id,
            url: url.to_string(),
            title,
        });
    }
    out
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Creation records and pipeline items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum number of entries in [`CreationRecord::all_images`].
pub const MAX_IMAGES: usize = 30;

/// Kind of generated artifact on a creation page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationType {
    Image,
    Video,
}

/// One scraped creation, as submitted to the destination service.
///
/// Only `url` and `extracted_at` are always present. Everything else stays
/// `None` (or empty) unless the page actually provided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationRecord {
    pub source: Option<String>,
    pub url: String,
    pub creation_id: Option<String>,
    pub title: Option<String>,
    pub creation_type: Option<CreationType>,
    pub prompt: Option<String>,
    pub video_prompt: Option<String>,
    pub revised_prompt: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub all_images: Vec<String>,
    pub start_image_url: Option<String>,
    pub model: Option<String>,
    pub initial_resolution: Option<String>,
    pub aspect_ratio: Option<String>,
    pub seed: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub extracted_at: DateTime<Utc>,
}

impl CreationRecord {
    /// An empty record for `url`, stamped now.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            source: None,
            url: url.into(),
            creation_id: None,
            title: None,
            creation_type: None,
            prompt: None,
            video_prompt: None,
            revised_prompt: None,
            image_url: None,
            all_images: Vec::new(),
            start_image_url: None,
            model: None,
            initial_resolution: None,
            aspect_ratio: None,
            seed: None,
            is_published: false,
            metadata: BTreeMap::new(),
            extracted_at: Utc::now(),
        }
    }

    /// Add an image URL to the gallery unless it is already present.
    /// Returns `false` when the gallery is full or the URL is a duplicate.
    pub fn push_image(&mut self, url: String) -> bool {
        if self.all_images.len() >= MAX_IMAGES || self.all_images.contains(&url) {
            return false;
        }
        self.all_images.push(url);
        true
    }

    /// Enforce the image invariants: no duplicates, at most [`MAX_IMAGES`]
    /// entries, `image_url` is a member of `all_images`, and a missing
    /// `image_url` is taken from the first gallery entry.
    pub fn reconcile_images(&mut self) {
        let mut seen = Vec::with_capacity(self.all_images.len());
        for url in self.all_images.drain(..) {
            if !seen.contains(&url) {
                seen.push(url);
            }
        }
        self.all_images = seen;

        match &self.image_url {
            Some(primary) => {
                if let Some(pos) = self.all_images.iter().position(|u| u == primary) {
                    if pos >= MAX_IMAGES {
                        let url = self.all_images.remove(pos);
                        self.all_images.insert(0, url);
                    }
                } else {
                    self.all_images.insert(0, primary.clone());
                }
            }
            None => self.image_url = self.all_images.first().cloned(),
        }
        self.all_images.truncate(MAX_IMAGES);
    }

    /// Set a metadata key unless it is already present.
    pub fn set_metadata_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata
            .entry(key.to_string())
            .or_insert_with(|| value.into());
    }

    /// A record is worth submitting when it identifies a creation or an image.
    pub fn is_identifiable(&self) -> bool {
        self.creation_id.is_some() || self.image_url.is_some()
    }
}

/// Caller-supplied description of one creation to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationDescriptor {
    pub creation_id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl CreationDescriptor {
    /// Human-readable label: the title when known, otherwise the id.
    pub fn label(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.creation_id)
            .to_string()
    }
}

/// Per-item status within a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Checking,
    Skipped,
    Importing,
    Imported,
    Duplicate,
    Error,
}

impl ItemStatus {
    /// Whether the item has reached an end state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Imported | Self::Duplicate | Self::Error
        )
    }

    /// `pending → checking → {skipped | importing} → {imported | duplicate | error}`.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Pending, Checking)
                | (Checking, Skipped)
                | (Checking, Importing)
                | (Importing, Imported)
                | (Importing, Duplicate)
                | (Importing, Error)
        )
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Checking => "checking",
            Self::Skipped => "skipped",
            Self::Importing => "importing",
            Self::Imported => "imported",
            Self::Duplicate => "duplicate",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A descriptor plus its transient status, owned by a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineItem {
    pub descriptor: CreationDescriptor,
    pub status: ItemStatus,
    pub error: Option<String>,
}

impl PipelineItem {
    pub fn new(descriptor: CreationDescriptor) -> Self {
        Self {
            descriptor,
            status: ItemStatus::Pending,
            error: None,
        }
    }

    /// Move to `next`. Out-of-order transitions are refused and leave the
    /// item unchanged.
    pub fn advance(&mut self, next: ItemStatus, error: Option<String>) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::debug!(
                "refusing status transition {} -> {} for {}",
                self.status,
                next,
                self.descriptor.creation_id
            );
            return false;
        }
        self.status = next;
        self.error = error;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_sets_primary_from_gallery() {
        let mut r = CreationRecord::new("https://x/creation/a");
        r.all_images = vec!["https://img/1".into(), "https://img/2".into()];
        r.reconcile_images();
        assert_eq!(r.image_url.as_deref(), Some("https://img/1"));
    }

    #[test]
    fn test_reconcile_inserts_primary_at_front() {
        let mut r = CreationRecord::new("https://x/creation/a");
        r.image_url = Some("https://img/main".into());
        r.all_images = (0..MAX_IMAGES).map(|i| format!("https://img/{i}")).collect();
        r.reconcile_images();
        assert_eq!(r.all_images.len(), MAX_IMAGES);
        assert_eq!(r.all_images[0], "https://img/main");
    }

    #[test]
    fn test_reconcile_dedupes() {
        let mut r = CreationRecord::new("u");
        r.all_images = vec!["a".into(), "b".into(), "a".into()];
        r.reconcile_images();
        assert_eq!(r.all_images, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reconcile_empty_stays_empty() {
        let mut r = CreationRecord::new("u");
        r.reconcile_images();
        assert!(r.image_url.is_none());
        assert!(r.all_images.is_empty());
    }

    #[test]
    fn test_push_image_caps() {
        let mut r = CreationRecord::new("u");
        for i in 0..40 {
            r.push_image(format!("img{i}"));
        }
        assert_eq!(r.all_images.len(), MAX_IMAGES);
        assert!(!r.push_image("img0".into()));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut r = CreationRecord::new("https://x/creation/abc");
        r.creation_id = Some("abc".into());
        r.creation_type = Some(CreationType::Video);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["creationId"], "abc");
        assert_eq!(json["creationType"], "video");
        assert_eq!(json["isPublished"], false);
        assert!(json["imageUrl"].is_null());
        assert!(json.get("extractedAt").is_some());
    }

    #[test]
    fn test_descriptor_label() {
        let d = CreationDescriptor {
            creation_id: "abc".into(),
            url: "u".into(),
            title: Some("  ".into()),
        };
        assert_eq!(d.label(), "abc");
        let d = CreationDescriptor {
            title: Some("Sunset".into()),
            ..d
        };
        assert_eq!(d.label(), "Sunset");
    }

    #[test]
    fn test_status_transitions() {
        let mut item = PipelineItem::new(CreationDescriptor {
            creation_id: "a".into(),
            url: "u".into(),
            title: None,
        });
        assert!(!item.advance(ItemStatus::Importing, None));
        assert!(item.advance(ItemStatus::Checking, None));
        assert!(item.advance(ItemStatus::Importing, None));
        assert!(item.advance(ItemStatus::Error, Some("boom".into())));
        assert!(item.status.is_terminal());
        assert_eq!(item.error.as_deref(), Some("boom"));
        assert!(!item.advance(ItemStatus::Imported, None));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ItemStatus::Duplicate).unwrap(),
            "\"duplicate\""
        );
        assert_eq!(ItemStatus::Skipped.to_string(), "skipped");
    }
}

// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress events and the broadcast channel they travel on.
//!
//! The pipeline emits one `ProgressEvent` per status change and exactly one
//! completion event per run. Events flow through a `tokio::sync::broadcast`
//! channel to every subscriber. When no subscriber exists, events are
//! silently dropped.

use crate::record::ItemStatus;
use serde::{Deserialize, Serialize};

/// A progress event, tagged with the run it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number within the run.
    pub seq: u64,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

/// Item update or run completion. Serialized without a tag so the wire shape
/// is `{current, total, status, ...}` or `{complete: true, total}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressKind {
    Complete(RunComplete),
    Item(ItemProgress),
}

/// Status change of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    /// 1-based position of the item.
    pub current: usize,
    pub total: usize,
    pub status: ItemStatus,
    pub title: String,
    pub creation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal event of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunComplete {
    pub complete: bool,
    pub total: usize,
}

impl ProgressEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self.kind, ProgressKind::Complete(_))
    }

    pub fn item(&self) -> Option<&ItemProgress> {
        match &self.kind {
            ProgressKind::Item(item) => Some(item),
            ProgressKind::Complete(_) => None,
        }
    }
}

/// Sender handle for emitting progress events.
///
/// Backed by a `tokio::sync::broadcast` channel so multiple listeners can
/// subscribe independently. When no listeners exist, `send()` returns an
/// error which is ignored.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// A run emits at most three events per item plus one, so 256 covers runs
/// of about eighty items even for a subscriber that only drains at the end.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, silently ignoring send errors (which occur when
/// no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, kind: ProgressKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            kind,
        });
    }
}

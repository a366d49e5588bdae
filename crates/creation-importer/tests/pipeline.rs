// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bulk import pipeline tests.
//!
//! Drives `ImportPipeline` against a wiremock destination, with scripted
//! renderers and extractors standing in for the browser.

use anyhow::{bail, Result};
use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use creation_importer::config::{SiteProfile, Timing};
use creation_importer::extract::{
    creation_id_from_url, CreationExtractor, ExtractError, PageExtractor,
};
use creation_importer::pipeline::{ImportPipeline, StartAck};
use creation_importer::progress::{self, ProgressEvent, ProgressReceiver};
use creation_importer::record::{CreationDescriptor, CreationRecord, ItemStatus};
use creation_importer::renderer::snapshot::SnapshotRenderer;
use creation_importer::renderer::{RenderContext, Renderer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fakes ──

#[derive(Clone, Copy)]
enum Load {
    Ready,
    Hang,
    Fail,
}

struct FakeRenderer {
    load: Load,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeRenderer {
    fn new(load: Load) -> Self {
        Self {
            load,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn open(&self, url: &str) -> Result<Box<dyn RenderContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            url: url.to_string(),
            load: self.load,
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

struct FakeContext {
    url: String,
    load: Load,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn wait_for_load(&mut self) -> Result<()> {
        match self.load {
            Load::Ready => Ok(()),
            Load::Hang => std::future::pending().await,
            Load::Fail => bail!("navigation failed"),
        }
    }

    async fn execute_js(&self, _script: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn get_html(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// Titled record with an image.
    Record,
    /// `NotInjected` until `inject` has run once.
    NeedsInjection,
    /// Every attempt fails.
    Fail,
    /// A record with nothing but its URL.
    Bare,
    /// A record whose page reported no URL.
    NoUrl,
}

struct FakeExtractor {
    mode: Mode,
    attempts: AtomicUsize,
    injected: AtomicUsize,
}

impl FakeExtractor {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            attempts: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageExtractor for FakeExtractor {
    async fn inject(&self, _page: &dyn RenderContext) -> Result<(), ExtractError> {
        self.injected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn extract(&self, page: &dyn RenderContext) -> Result<CreationRecord, ExtractError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let url = page
            .get_url()
            .await
            .map_err(|e| ExtractError::Unreachable(e.to_string()))?;
        match self.mode {
            Mode::Fail => Err(ExtractError::Unreachable("page crashed".into())),
            Mode::NeedsInjection if self.injected.load(Ordering::SeqCst) == 0 => {
                Err(ExtractError::NotInjected)
            }
            Mode::Bare => Ok(CreationRecord::new(url)),
            Mode::NoUrl => Ok(CreationRecord::new("")),
            Mode::Record | Mode::NeedsInjection => {
                let mut record = CreationRecord::new(&url);
                record.creation_id = creation_id_from_url(&url);
                record.title = record.creation_id.as_ref().map(|id| format!("Title {id}"));
                record.image_url = Some("https://images.test/full.jpg".into());
                record.reconcile_images();
                Ok(record)
            }
        }
    }
}

// ── Helpers ──

fn fast_timing() -> Timing {
    Timing {
        load_timeout: Duration::from_millis(50),
        render_settle: Duration::ZERO,
        inject_retry_delay: Duration::from_millis(5),
        item_pause: Duration::from_millis(5),
        expand_settle: Duration::ZERO,
        poll_interval: Duration::from_millis(5),
        poll_timeout: Duration::from_millis(20),
        rendition_settle: Duration::ZERO,
        ..Timing::default()
    }
}

fn descriptor(id: &str) -> CreationDescriptor {
    CreationDescriptor {
        creation_id: id.to_string(),
        url: format!("https://creator.nightcafe.studio/creation/{id}"),
        title: None,
    }
}

fn pipeline(renderer: Arc<dyn Renderer>, extractor: Arc<dyn PageExtractor>) -> ImportPipeline {
    ImportPipeline::new(renderer, extractor, fast_timing())
}

fn drain(rx: &mut ProgressReceiver) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[ProgressEvent]) -> Vec<ItemStatus> {
    events
        .iter()
        .filter_map(|e| e.item().map(|i| i.status))
        .collect()
}

async fn mount_status(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/import/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_submit(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/import"))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

fn imported() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "1", "duplicate": false}))
}

// ── Tests ──

#[tokio::test]
async fn test_new_creation_is_imported_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/import/status"))
        .and(query_param("creationId", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exists": false})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/import"))
        .and(body_partial_json(json!({
            "creationId": "abc123",
            "title": "Sunset",
            "prompt": "A calm sunset over the sea",
            "aspectRatio": "16:9"
        })))
        .respond_with(imported())
        .expect(1)
        .mount(&server)
        .await;

    let url = "https://creator.nightcafe.studio/creation/abc123";
    let html = r#"<html><body>
        <h1>Sunset</h1>
        <section class="settings-panel">
          <h3>Creation Settings</h3>
          <div><h4>Text Prompts</h4><div>A calm sunset over the sea</div></div>
          <div><h4>Aspect Ratio</h4><div>16:9</div></div>
        </section>
        </body></html>"#;
    let renderer = Arc::new(SnapshotRenderer::new().with_page(url, html));
    let extractor = Arc::new(CreationExtractor::new(SiteProfile::default(), fast_timing()));
    let pipeline = pipeline(renderer.clone(), extractor);

    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(vec![descriptor("abc123")], &server.uri(), Some(tx))
        .await;
    let events = drain(&mut rx);

    assert_eq!(
        statuses(&events),
        vec![ItemStatus::Checking, ItemStatus::Importing, ItemStatus::Imported]
    );
    assert_json_include!(
        actual: serde_json::to_value(&events[2]).unwrap(),
        expected: json!({
            "current": 1,
            "total": 1,
            "status": "imported",
            "title": "Sunset",
            "creationId": "abc123"
        })
    );
    assert_json_include!(
        actual: serde_json::to_value(&events[3]).unwrap(),
        expected: json!({"complete": true, "total": 1})
    );
    assert_eq!(summary.imported, 1);
    assert_eq!(renderer.opened(), 1);
    assert_eq!(renderer.active_contexts(), 0);

    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
    assert!(events.iter().all(|e| e.run_id == summary.run_id));
}

#[tokio::test]
async fn test_existing_creation_is_skipped_without_opening_a_page() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": true, "title": "Imported earlier"})).await;
    mount_submit(&server, imported(), 0).await;

    let renderer = Arc::new(FakeRenderer::new(Load::Ready));
    let opened = Arc::clone(&renderer.opened);
    let pipeline = pipeline(renderer, Arc::new(FakeExtractor::new(Mode::Record)));

    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(vec![descriptor("old1")], &server.uri(), Some(tx))
        .await;
    let events = drain(&mut rx);

    assert_eq!(statuses(&events), vec![ItemStatus::Checking, ItemStatus::Skipped]);
    assert_eq!(events[1].item().unwrap().title, "Imported earlier");
    assert!(events[2].is_complete());
    assert_eq!(summary.skipped, 1);
    assert_eq!(opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_duplicate_submission_is_reported() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "duplicate": true})),
        1,
    )
    .await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(vec![descriptor("dup1")], &server.uri(), Some(tx))
        .await;
    let events = drain(&mut rx);

    assert_eq!(statuses(&events).last(), Some(&ItemStatus::Duplicate));
    assert_eq!(events[2].item().unwrap().title, "Title dup1");
    assert_eq!(summary.duplicate, 1);
}

#[tokio::test]
async fn test_server_error_marks_item_failed_and_run_continues() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, ResponseTemplate::new(500), 2).await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(
            vec![descriptor("e1"), descriptor("e2")],
            &server.uri(),
            Some(tx),
        )
        .await;
    let events = drain(&mut rx);

    let failures: Vec<_> = events
        .iter()
        .filter_map(|e| e.item())
        .filter(|i| i.status == ItemStatus::Error)
        .collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].error.as_deref(), Some("HTTP 500"));
    assert_eq!(failures[1].current, 2);
    assert_eq!(summary.error, 2);
    assert!(events.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_status_failure_still_imports() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/import/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_submit(&server, imported(), 1).await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(vec![descriptor("s1")], &server.uri(), Some(tx))
        .await;

    assert_eq!(
        statuses(&drain(&mut rx)),
        vec![ItemStatus::Checking, ItemStatus::Importing, ItemStatus::Imported]
    );
    assert_eq!(summary.imported, 1);
}

#[tokio::test]
async fn test_every_item_reported_and_run_completes_once() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 3).await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let (tx, mut rx) = progress::channel();
    let items = vec![descriptor("n1"), descriptor("n2"), descriptor("n3")];
    let summary = pipeline.run(items, &server.uri(), Some(tx)).await;
    let events = drain(&mut rx);

    let terminal: Vec<usize> = events
        .iter()
        .filter_map(|e| e.item())
        .filter(|i| i.status.is_terminal())
        .map(|i| i.current)
        .collect();
    assert_eq!(terminal, vec![1, 2, 3]);
    assert!(events
        .iter()
        .filter_map(|e| e.item())
        .all(|i| i.total == 3));
    assert_eq!(events.iter().filter(|e| e.is_complete()).count(), 1);
    assert!(events.last().unwrap().is_complete());
    assert_eq!(summary.imported, 3);
}

#[tokio::test]
async fn test_empty_run_completes() {
    let server = MockServer::start().await;
    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let (tx, mut rx) = progress::channel();
    let summary = pipeline.run(Vec::new(), &server.uri(), Some(tx)).await;
    let events = drain(&mut rx);

    assert_eq!(events.len(), 1);
    assert_json_include!(
        actual: serde_json::to_value(&events[0]).unwrap(),
        expected: json!({"complete": true, "total": 0})
    );
    assert_eq!(summary.total, 0);
}

#[tokio::test]
async fn test_missing_load_signal_does_not_stall() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 1).await;

    let renderer = Arc::new(FakeRenderer::new(Load::Hang));
    let closed = Arc::clone(&renderer.closed);
    let pipeline = pipeline(renderer, Arc::new(FakeExtractor::new(Mode::Record)));

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(vec![descriptor("h1")], &server.uri(), None),
    )
    .await
    .expect("run stalled on a page that never finished loading");
    assert_eq!(summary.imported, 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_load_signal_still_extracts() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 1).await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Fail)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let summary = pipeline
        .run(vec![descriptor("f1")], &server.uri(), None)
        .await;
    assert_eq!(summary.imported, 1);
}

#[tokio::test]
async fn test_page_closed_once_when_extraction_fails() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 0).await;

    let renderer = Arc::new(FakeRenderer::new(Load::Ready));
    let (opened, closed) = (Arc::clone(&renderer.opened), Arc::clone(&renderer.closed));
    let pipeline = pipeline(renderer, Arc::new(FakeExtractor::new(Mode::Fail)));

    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(vec![descriptor("x1")], &server.uri(), Some(tx))
        .await;
    let events = drain(&mut rx);

    let last = events[2].item().unwrap();
    assert_eq!(last.status, ItemStatus::Error);
    assert!(last.error.as_deref().unwrap().contains("page crashed"));
    assert_eq!(summary.error, 1);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_record_without_url_is_an_error() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 0).await;

    let renderer = Arc::new(FakeRenderer::new(Load::Ready));
    let closed = Arc::clone(&renderer.closed);
    let pipeline = pipeline(renderer, Arc::new(FakeExtractor::new(Mode::NoUrl)));

    let (tx, mut rx) = progress::channel();
    let summary = pipeline
        .run(vec![descriptor("u1")], &server.uri(), Some(tx))
        .await;
    let events = drain(&mut rx);

    assert_eq!(
        statuses(&events),
        vec![ItemStatus::Checking, ItemStatus::Importing, ItemStatus::Error]
    );
    let failed = events[2].item().unwrap();
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("no identifiable creation"));
    assert_eq!(summary.error, 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_capability_is_injected_then_retried() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 1).await;

    let extractor = Arc::new(FakeExtractor::new(Mode::NeedsInjection));
    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::clone(&extractor) as Arc<dyn PageExtractor>,
    );
    let summary = pipeline
        .run(vec![descriptor("i1")], &server.uri(), None)
        .await;

    assert_eq!(summary.imported, 1);
    assert_eq!(extractor.injected.load(Ordering::SeqCst), 1);
    assert_eq!(extractor.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_start_acknowledges_and_streams_progress() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"exists": false})).await;
    mount_submit(&server, imported(), 2).await;

    let pipeline = Arc::new(pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    ));
    let (tx, mut rx) = progress::channel();
    let ack = pipeline.start(
        vec![descriptor("a1"), descriptor("a2")],
        &server.uri(),
        Some(tx),
    );
    assert_eq!(
        ack,
        StartAck {
            ok: true,
            started: true
        }
    );

    let mut seen = Vec::new();
    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            let done = event.is_complete();
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    assert!(finished.is_ok());
    assert_eq!(seen.len(), 7);
    assert_eq!(
        statuses(&seen).last(),
        Some(&ItemStatus::Imported)
    );
}

#[tokio::test]
async fn test_import_one_refuses_unidentifiable_page() {
    let server = MockServer::start().await;
    mount_submit(&server, imported(), 0).await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Bare)),
    );
    let client = creation_importer::destination::DestinationClient::new(&server.uri(), fast_timing());
    let err = tokio_test::assert_err!(pipeline.import_one(&client, "https://host.test/about").await);
    assert!(err.to_string().contains("no identifiable creation"));
}

#[tokio::test]
async fn test_import_one_submits_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/import"))
        .and(body_partial_json(json!({"creationId": "one1", "title": "Title one1"})))
        .respond_with(imported())
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(
        Arc::new(FakeRenderer::new(Load::Ready)),
        Arc::new(FakeExtractor::new(Mode::Record)),
    );
    let client = creation_importer::destination::DestinationClient::new(&server.uri(), fast_timing());
    let (record, receipt) = tokio_test::assert_ok!(
        pipeline
            .import_one(&client, "https://creator.nightcafe.studio/creation/one1")
            .await
    );
    assert_eq!(record.creation_id.as_deref(), Some("one1"));
    assert!(!receipt.duplicate);
}

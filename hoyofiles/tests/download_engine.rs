//! End-to-end tests for manifest parsing, selection and the transfer engine.
//!
//! Transfers run against an in-memory transport so failure modes (ignored
//! range requests, corrupt bodies, flaky connections, slow servers) can be
//! scripted per URL.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use hoyofiles::download::{
    DownloadOrchestrator, RetryPolicy, TransferConfig, TransferStatus, Transport, TransportError,
    TransportResponse,
};
use hoyofiles::game::{GameId, GameTarget, LocaleSelection, VoiceLocale};
use hoyofiles::integrity::{digest_bytes, Checksum, ChecksumAlgorithm};
use hoyofiles::manifest::{DocumentKind, ManifestParser, RawDocument};
use hoyofiles::selection::{resolve, DownloadSet, SelectionRequest};
use hoyofiles::tree::{RemoteObjectRef, TreeBuilder};

const CDN: &str = "https://cdn.test/hk4e/5.0.0";

// =============================================================================
// In-memory transport
// =============================================================================

#[derive(Clone)]
struct Served {
    body: Vec<u8>,
    honor_range: bool,
    corrupt: bool,
    transient_failures: u32,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
}

impl Served {
    fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            honor_range: true,
            corrupt: false,
            transient_failures: 0,
            chunk_size: 16,
            chunk_delay: None,
        }
    }
}

#[derive(Default)]
struct MemoryTransport {
    objects: Mutex<HashMap<String, Served>>,
    requests: Mutex<Vec<(String, u64)>>,
}

impl MemoryTransport {
    fn serve(&self, url: &str, served: Served) {
        self.objects.lock().insert(url.to_string(), served);
    }

    fn requests_for(&self, url: &str) -> Vec<u64> {
        self.requests
            .lock()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, offset)| *offset)
            .collect()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Transport for MemoryTransport {
    async fn open(&self, url: &str, offset: u64) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push((url.to_string(), offset));

        let served = {
            let mut objects = self.objects.lock();
            let Some(served) = objects.get_mut(url) else {
                return Err(TransportError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            };
            if served.transient_failures > 0 {
                served.transient_failures -= 1;
                return Err(TransportError::Connection {
                    url: url.to_string(),
                    reason: "connection reset by peer".to_string(),
                });
            }
            served.clone()
        };

        let mut body = served.body.clone();
        if served.corrupt {
            for byte in body.iter_mut() {
                *byte ^= 0xff;
            }
        }
        let resumed = served.honor_range && offset > 0;
        let start = if resumed { offset as usize } else { 0 };
        let chunks: Vec<Bytes> = body[start.min(body.len())..]
            .chunks(served.chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();

        let stream: BoxStream<'static, Result<Bytes, TransportError>> = match served.chunk_delay {
            None => futures::stream::iter(chunks.into_iter().map(Ok)).boxed(),
            Some(delay) => futures::stream::iter(chunks)
                .then(move |chunk| async move {
                    tokio::time::sleep(delay).await;
                    Ok(chunk)
                })
                .boxed(),
        };

        Ok(TransportResponse {
            resumed,
            content_length: Some((body.len() - start.min(body.len())) as u64),
            body: stream,
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn body(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

fn md5(bytes: &[u8]) -> String {
    digest_bytes(ChecksumAlgorithm::Md5, bytes)
}

fn object_for(path: &str, bytes: &[u8]) -> RemoteObjectRef {
    RemoteObjectRef::new(
        format!("{}/{}", CDN, path),
        bytes.len() as u64,
        Checksum::md5(&md5(bytes)).unwrap(),
    )
}

fn target() -> GameTarget {
    GameTarget::new(GameId::Genshin, "5.0.0")
}

/// Build a download set of `files` and serve each through `transport`.
fn setup(transport: &MemoryTransport, files: &[(&str, Vec<u8>)]) -> DownloadSet {
    let mut builder = TreeBuilder::new(target());
    for (path, bytes) in files {
        builder
            .insert_file(path, object_for(path, bytes), None, None)
            .unwrap();
        transport.serve(&format!("{}/{}", CDN, path), Served::new(bytes.clone()));
    }
    resolve(&builder.build(), &SelectionRequest::full()).unwrap()
}

fn quick_config(retry: RetryPolicy) -> TransferConfig {
    TransferConfig {
        retry,
        idle_timeout: Duration::from_secs(5),
        cancel_grace: Duration::from_secs(2),
        progress_step_bytes: 16,
        update_buffer: 8,
    }
}

fn orchestrator(
    transport: &Arc<MemoryTransport>,
    retry: RetryPolicy,
) -> DownloadOrchestrator<MemoryTransport> {
    DownloadOrchestrator::with_shared_transport(Arc::clone(transport), quick_config(retry))
}

fn pkg_line(name: &str, bytes: &[u8]) -> String {
    format!(
        r#"{{"remoteName":"{}","md5":"{}","fileSize":{}}}"#,
        name,
        md5(bytes),
        bytes.len()
    )
}

fn leftover_parts(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else if path.to_string_lossy().ends_with(".part") {
                found.push(path.display().to_string());
            }
        }
    }
    found
}

// =============================================================================
// Manifest to download set
// =============================================================================

#[test]
fn test_package_and_voice_manifests_yield_ordered_set() {
    let a = body(1, 100);
    let voice = body(2, 50);
    let docs = vec![
        RawDocument::new(
            target(),
            DocumentKind::PackageIndex,
            CDN,
            pkg_line("a.pak", &a),
        ),
        RawDocument::new(
            target(),
            DocumentKind::VoiceIndex(VoiceLocale::English),
            CDN,
            pkg_line("Audio/en/v.pak", &voice),
        ),
    ];
    let parser = ManifestParser::default();

    let locales: LocaleSelection = [VoiceLocale::English].into_iter().collect();
    let tree = parser.parse(&docs, &locales).unwrap();
    let set = resolve(&tree, &SelectionRequest::full()).unwrap();
    let destinations: Vec<&str> = set
        .entries()
        .iter()
        .map(|e| e.destination.as_str())
        .collect();
    assert_eq!(destinations, vec!["Audio/en/v.pak", "a.pak"]);
    assert_eq!(set.total_bytes(), 150);
    assert_eq!(set.entries()[0].locale, Some(VoiceLocale::English));

    let without_voice = parser.parse(&docs, &LocaleSelection::none()).unwrap();
    let set = resolve(&without_voice, &SelectionRequest::full()).unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.entries()[0].destination, "a.pak");
}

#[test]
fn test_diff_manifest_selects_only_changed_files() {
    let a = body(1, 10);
    let b = body(2, 20);
    let patch = body(3, 5);
    let package = format!("{}\n{}", pkg_line("a.pak", &a), pkg_line("b.pak", &b));
    let diff = format!(
        r#"{{"schema":1,"baseVersion":"4.8.0","targetVersion":"5.0.0","files":[
            {{"remoteName":"b.pak","md5":"{}","fileSize":5,"kind":"patch","patchName":"b.pak.hdiff"}}
        ]}}"#,
        md5(&patch)
    );
    let docs = vec![
        RawDocument::new(target(), DocumentKind::PackageIndex, CDN, package),
        RawDocument::new(
            target(),
            DocumentKind::DiffIndex {
                base_version: "4.8.0".into(),
            },
            CDN,
            diff,
        ),
    ];
    let tree = ManifestParser::default()
        .parse(&docs, &LocaleSelection::none())
        .unwrap();

    let set = resolve(&tree, &SelectionRequest::incremental("4.8.0")).unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.entries()[0].destination, "b.pak.hdiff");
    assert!(set.entries()[0].object.is_diff_patch);
    assert_eq!(set.entries()[0].object.url, format!("{}/b.pak.hdiff", CDN));

    assert!(resolve(&tree, &SelectionRequest::incremental("4.7.0")).is_err());
}

// =============================================================================
// Transfers
// =============================================================================

#[tokio::test]
async fn test_downloads_and_verifies_every_entry() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(1, 100);
    let v = body(2, 50);
    let set = setup(&transport, &[("a.pak", a.clone()), ("voice/en/v.pak", v.clone())]);
    let dir = tempfile::tempdir().unwrap();

    let snapshots: Vec<_> = orchestrator(&transport, RetryPolicy::None)
        .execute(set, dir.path(), 2, CancellationToken::new())
        .collect()
        .await;

    assert_eq!(std::fs::read(dir.path().join("a.pak")).unwrap(), a);
    assert_eq!(std::fs::read(dir.path().join("voice/en/v.pak")).unwrap(), v);
    assert!(leftover_parts(dir.path()).is_empty());

    for index in 0..2 {
        let statuses: Vec<TransferStatus> = snapshots
            .iter()
            .filter(|s| s.index == index)
            .map(|s| s.status)
            .collect();
        assert_eq!(statuses.first(), Some(&TransferStatus::InFlight));
        assert_eq!(statuses.last(), Some(&TransferStatus::Done));
        let verifying = statuses
            .iter()
            .position(|s| *s == TransferStatus::Verifying)
            .unwrap();
        assert_eq!(verifying, statuses.len() - 2);

        let bytes: Vec<u64> = snapshots
            .iter()
            .filter(|s| s.index == index)
            .map(|s| s.bytes_transferred)
            .collect();
        assert!(bytes.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[tokio::test]
async fn test_second_run_reuses_verified_files() {
    let transport = Arc::new(MemoryTransport::default());
    let set = setup(&transport, &[("a.pak", body(1, 64)), ("b.pak", body(2, 32))]);
    let dir = tempfile::tempdir().unwrap();
    let engine = orchestrator(&transport, RetryPolicy::None);

    let first = engine
        .execute(set.clone(), dir.path(), 2, CancellationToken::new())
        .into_report()
        .await;
    assert!(first.is_complete());
    let requests = transport.request_count();

    let second = engine
        .execute(set, dir.path(), 2, CancellationToken::new())
        .into_report()
        .await;
    assert!(second.is_complete());
    assert!(second.states.iter().all(|s| s.attempt_count == 0));
    assert_eq!(transport.request_count(), requests);
}

#[tokio::test]
async fn test_resumes_from_existing_part_file() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(7, 100);
    let set = setup(&transport, &[("a.pak", a.clone())]);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pak.part"), &a[..40]).unwrap();

    let report = orchestrator(&transport, RetryPolicy::None)
        .execute(set, dir.path(), 1, CancellationToken::new())
        .into_report()
        .await;

    assert!(report.is_complete());
    assert_eq!(transport.requests_for(&format!("{}/a.pak", CDN)), vec![40]);
    assert_eq!(std::fs::read(dir.path().join("a.pak")).unwrap(), a);
}

#[tokio::test]
async fn test_short_final_file_is_continued_with_range() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(5, 100);
    let set = setup(&transport, &[("a.pak", a.clone())]);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pak"), &a[..40]).unwrap();

    let report = orchestrator(&transport, RetryPolicy::None)
        .execute(set, dir.path(), 1, CancellationToken::new())
        .into_report()
        .await;

    assert!(report.is_complete());
    assert_eq!(transport.requests_for(&format!("{}/a.pak", CDN)), vec![40]);
    assert_eq!(std::fs::read(dir.path().join("a.pak")).unwrap(), a);
    assert!(leftover_parts(dir.path()).is_empty());
}

#[tokio::test]
async fn test_active_transfers_never_exceed_concurrency() {
    let transport = Arc::new(MemoryTransport::default());
    let files: Vec<(String, Vec<u8>)> = (0..8u8)
        .map(|i| (format!("f{}.pak", i), body(i, 64)))
        .collect();
    let refs: Vec<(&str, Vec<u8>)> = files
        .iter()
        .map(|(path, bytes)| (path.as_str(), bytes.clone()))
        .collect();
    let set = setup(&transport, &refs);
    for (path, bytes) in &files {
        transport.serve(
            &format!("{}/{}", CDN, path),
            Served {
                chunk_delay: Some(Duration::from_millis(5)),
                ..Served::new(bytes.clone())
            },
        );
    }
    let dir = tempfile::tempdir().unwrap();

    let mut stream = orchestrator(&transport, RetryPolicy::None).execute(
        set,
        dir.path(),
        3,
        CancellationToken::new(),
    );
    let mut current: HashMap<usize, TransferStatus> = HashMap::new();
    let mut peak = 0;
    while let Some(state) = stream.next().await {
        current.insert(state.index, state.status);
        let active = current
            .values()
            .filter(|s| matches!(s, TransferStatus::InFlight | TransferStatus::Verifying))
            .count();
        assert!(active <= 3, "{} transfers active at once", active);
        peak = peak.max(active);
    }

    assert_eq!(current.len(), 8);
    assert!(current.values().all(|s| *s == TransferStatus::Done));
    assert!(peak > 1);
}

#[tokio::test]
async fn test_restarts_when_server_ignores_range() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(9, 100);
    let set = setup(&transport, &[("a.pak", a.clone())]);
    let url = format!("{}/a.pak", CDN);
    transport.serve(
        &url,
        Served {
            honor_range: false,
            ..Served::new(a.clone())
        },
    );
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pak.part"), &a[..40]).unwrap();

    let report = orchestrator(&transport, RetryPolicy::None)
        .execute(set, dir.path(), 1, CancellationToken::new())
        .into_report()
        .await;

    assert!(report.is_complete());
    assert_eq!(report.states[0].bytes_transferred, 100);
    assert_eq!(std::fs::read(dir.path().join("a.pak")).unwrap(), a);
}

#[tokio::test]
async fn test_corrupt_part_is_discarded_and_refetched() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(3, 80);
    let set = setup(&transport, &[("a.pak", a.clone())]);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.pak.part"), vec![0u8; 30]).unwrap();

    let report = orchestrator(&transport, RetryPolicy::fixed(3, Duration::from_millis(1)))
        .execute(set, dir.path(), 1, CancellationToken::new())
        .into_report()
        .await;

    assert!(report.is_complete());
    assert_eq!(report.states[0].attempt_count, 2);
    assert_eq!(transport.requests_for(&format!("{}/a.pak", CDN)), vec![30, 0]);
    assert_eq!(std::fs::read(dir.path().join("a.pak")).unwrap(), a);
}

#[tokio::test]
async fn test_persistent_mismatch_fails_after_attempt_ceiling() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(4, 48);
    let set = setup(&transport, &[("a.pak", a.clone())]);
    transport.serve(
        &format!("{}/a.pak", CDN),
        Served {
            corrupt: true,
            ..Served::new(a)
        },
    );
    let dir = tempfile::tempdir().unwrap();

    let report = orchestrator(&transport, RetryPolicy::fixed(3, Duration::from_millis(1)))
        .execute(set, dir.path(), 1, CancellationToken::new())
        .into_report()
        .await;

    let state = &report.states[0];
    assert_eq!(state.status, TransferStatus::Failed);
    assert_eq!(state.attempt_count, 3);
    assert!(state.error.as_deref().unwrap().contains("checksum mismatch"));
    assert!(!dir.path().join("a.pak").exists());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let transport = Arc::new(MemoryTransport::default());
    let a = body(5, 32);
    let set = setup(&transport, &[("a.pak", a.clone())]);
    transport.serve(
        &format!("{}/a.pak", CDN),
        Served {
            transient_failures: 2,
            ..Served::new(a.clone())
        },
    );
    let dir = tempfile::tempdir().unwrap();

    let report = orchestrator(&transport, RetryPolicy::fixed(5, Duration::from_millis(1)))
        .execute(set, dir.path(), 1, CancellationToken::new())
        .into_report()
        .await;

    assert!(report.is_complete());
    assert_eq!(report.states[0].attempt_count, 3);
    assert_eq!(report.states[0].error, None);
}

#[tokio::test]
async fn test_missing_object_fails_without_retry() {
    let transport = Arc::new(MemoryTransport::default());
    let set = setup(&transport, &[("a.pak", body(1, 8)), ("b.pak", body(2, 8))]);
    transport.objects.lock().remove(&format!("{}/a.pak", CDN));
    let dir = tempfile::tempdir().unwrap();

    let report = orchestrator(&transport, RetryPolicy::fixed(5, Duration::from_millis(1)))
        .execute(set, dir.path(), 2, CancellationToken::new())
        .into_report()
        .await;

    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.done_count(), 1);
    let failed = report.failed().next().unwrap();
    assert_eq!(failed.destination, "a.pak");
    assert_eq!(failed.attempt_count, 1);
}

#[tokio::test]
async fn test_destination_outside_root_is_refused() {
    let transport = Arc::new(MemoryTransport::default());
    let set = setup(&transport, &[("../evil.pak", body(1, 8))]);
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");

    let report = orchestrator(&transport, RetryPolicy::None)
        .execute(set, &root, 1, CancellationToken::new())
        .into_report()
        .await;

    assert!(report.has_failures());
    assert_eq!(transport.request_count(), 0);
    assert!(!dir.path().join("evil.pak").exists());
}

#[tokio::test]
async fn test_cancellation_keeps_parts_and_reports_pending() {
    let transport = Arc::new(MemoryTransport::default());
    let files: Vec<(&str, Vec<u8>)> = vec![
        ("a.pak", body(1, 400)),
        ("b.pak", body(2, 400)),
        ("c.pak", body(3, 400)),
    ];
    let set = setup(&transport, &files);
    for (path, bytes) in &files {
        transport.serve(
            &format!("{}/{}", CDN, path),
            Served {
                chunk_delay: Some(Duration::from_millis(20)),
                ..Served::new(bytes.clone())
            },
        );
    }
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();

    let mut stream = orchestrator(&transport, RetryPolicy::None).execute(
        set,
        dir.path(),
        1,
        cancel.clone(),
    );
    while let Some(state) = stream.next().await {
        if state.status == TransferStatus::InFlight && state.bytes_transferred > 0 {
            break;
        }
    }
    cancel.cancel();
    let report = stream.into_report().await;

    assert!(report.cancelled);
    assert!(!report.has_failures());
    assert_eq!(report.pending_count(), 3);
    assert!(dir.path().join("a.pak.part").exists());
    assert!(!dir.path().join("a.pak").exists());
}

#[tokio::test]
async fn test_dropping_stream_cancels_run() {
    let transport = Arc::new(MemoryTransport::default());
    let set = setup(&transport, &[("a.pak", body(1, 64))]);
    transport.serve(
        &format!("{}/a.pak", CDN),
        Served {
            chunk_delay: Some(Duration::from_millis(50)),
            ..Served::new(body(1, 64))
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();

    let stream = orchestrator(&transport, RetryPolicy::None).execute(
        set,
        dir.path(),
        1,
        cancel.clone(),
    );
    assert!(!stream.is_cancelled());
    drop(stream);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!dir.path().join("a.pak").exists());
    assert!(!cancel.is_cancelled());
}

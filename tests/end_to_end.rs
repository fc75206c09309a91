//! Fetch then census against a mock package index.

use dist_harvester::census::CensusPipeline;
use dist_harvester::fetch::{Fetcher, RetryPolicy};
use dist_harvester::{FetchConfig, FetchExecutor, Package, ScanConfig};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn wheel_bytes(entries: &[&str]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for entry in entries {
        writer
            .start_file(*entry, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"payload").unwrap();
    }
    writer.finish().unwrap().into_inner()
}

struct IndexedFile {
    name: &'static str,
    data: Vec<u8>,
}

async fn mount_package(server: &MockServer, package: &str, files: &[&IndexedFile]) {
    let urls: Vec<_> = files
        .iter()
        .map(|f| {
            serde_json::json!({
                "digests": { "sha256": sha256_hex(&f.data) },
                "filename": f.name,
                "url": format!("{}/files/{}", server.uri(), f.name),
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/pypi/{package}/json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "urls": urls })))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, file: &IndexedFile) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", file.name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(file.data.clone()))
        .mount(server)
        .await;
}

fn executor(server: &MockServer, root: &Path) -> FetchExecutor {
    let config = FetchConfig::new(root)
        .with_index_url(format!("{}/pypi/{{package}}/json", server.uri()))
        .with_concurrency(4)
        .with_retry(RetryPolicy::default().with_base_delay(Duration::from_millis(1)));
    FetchExecutor::new(Fetcher::new(config).unwrap())
}

fn census(root: &Path) -> Vec<String> {
    let scratch = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    CensusPipeline::new(ScanConfig::new(root).with_scratch_dir(scratch.path()))
        .run(&mut out)
        .unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

async fn file_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/files/"))
        .count()
}

#[tokio::test]
async fn test_numpy_artifact_is_censused_once() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let with_blas = IndexedFile {
        name: "numpy-2.0.0-cp312-cp312-manylinux_2_17_x86_64.whl",
        data: wheel_bytes(&["numpy.libs/libopenblas.so", "numpy/__init__.py"]),
    };
    let without_blas = IndexedFile {
        name: "numpy-2.0.0-cp312-cp312-win_amd64.whl",
        data: wheel_bytes(&["numpy/__init__.py"]),
    };
    mount_package(&server, "numpy", &[&with_blas, &without_blas]).await;
    mount_file(&server, &with_blas).await;
    mount_file(&server, &without_blas).await;

    let summary = executor(&server, root.path())
        .fetch_all(vec![Package::new("numpy")])
        .await;
    assert!(summary.is_success());
    assert_eq!(summary.downloaded(), 2);

    let lines = census(root.path());
    assert_eq!(
        lines,
        vec!["numpy,libopenblas.so,numpy-2.0.0-cp312-cp312-manylinux_2_17_x86_64.whl"]
    );
}

#[tokio::test]
async fn test_artifact_in_every_wheel_is_reported_for_first_wheel_only() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let first = IndexedFile {
        name: "scipy-1.0-a.whl",
        data: wheel_bytes(&["scipy.libs/libgfortran.so.5"]),
    };
    let second = IndexedFile {
        name: "scipy-1.0-b.whl",
        data: wheel_bytes(&["scipy.libs/libgfortran.so.5"]),
    };
    mount_package(&server, "scipy", &[&first, &second]).await;
    mount_file(&server, &first).await;
    mount_file(&server, &second).await;

    assert!(executor(&server, root.path())
        .fetch_all(vec![Package::new("scipy")])
        .await
        .is_success());

    assert_eq!(census(root.path()), vec!["scipy,libgfortran.so.5,scipy-1.0-a.whl"]);
}

#[tokio::test]
async fn test_transient_server_errors_are_retried() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let file = IndexedFile {
        name: "flaky-1.0.whl",
        data: wheel_bytes(&["flaky/_ext.so"]),
    };
    mount_package(&server, "flaky", &[&file]).await;

    Mock::given(method("GET"))
        .and(path("/files/flaky-1.0.whl"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    mount_file(&server, &file).await;

    let summary = executor(&server, root.path())
        .fetch_all(vec![Package::new("flaky")])
        .await;

    assert!(summary.is_success(), "{:?}", summary.failures);
    let stored = root.path().join("flaky/flaky-1.0.whl");
    assert_eq!(
        dist_harvester::fetch::integrity::digest_of(&stored).unwrap(),
        sha256_hex(&file.data)
    );
}

#[tokio::test]
async fn test_refetch_of_valid_files_downloads_nothing() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let file = IndexedFile {
        name: "stable-1.0.whl",
        data: wheel_bytes(&["stable/_ext.so"]),
    };
    mount_package(&server, "stable", &[&file]).await;
    mount_file(&server, &file).await;

    let exec = executor(&server, root.path());
    assert_eq!(exec.fetch_all(vec![Package::new("stable")]).await.downloaded(), 1);
    assert_eq!(file_requests(&server).await, 1);

    let stored = root.path().join("stable/stable-1.0.whl");
    let modified = std::fs::metadata(&stored).unwrap().modified().unwrap();

    let summary = exec.fetch_all(vec![Package::new("stable")]).await;
    assert_eq!(summary.downloaded(), 0);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(file_requests(&server).await, 1);
    assert_eq!(std::fs::metadata(&stored).unwrap().modified().unwrap(), modified);
    assert_eq!(std::fs::read(&stored).unwrap(), file.data);
}

#[tokio::test]
async fn test_corrupted_local_file_is_redownloaded() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let file = IndexedFile {
        name: "fixme-1.0.whl",
        data: wheel_bytes(&["fixme/_ext.so"]),
    };
    mount_package(&server, "fixme", &[&file]).await;
    mount_file(&server, &file).await;

    let stored = root.path().join("fixme/fixme-1.0.whl");
    std::fs::create_dir_all(stored.parent().unwrap()).unwrap();
    // Longer than the real payload so leftover bytes would show up.
    std::fs::write(&stored, vec![0u8; file.data.len() * 3]).unwrap();

    let summary = executor(&server, root.path())
        .fetch_all(vec![Package::new("fixme")])
        .await;

    assert!(summary.is_success());
    assert_eq!(summary.downloaded(), 1);
    assert_eq!(std::fs::read(&stored).unwrap(), file.data);
}

#[test]
fn test_unsupported_archive_does_not_stop_census() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("pkg");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("pkg-1.0.rpm"), b"rpm payload with lib.so inside").unwrap();
    std::fs::write(dir.join("pkg-1.0.whl"), wheel_bytes(&["pkg/libpkg.so"])).unwrap();

    assert_eq!(census(root.path()), vec!["pkg,libpkg.so,pkg-1.0.whl"]);
}

#[tokio::test]
async fn test_empty_package_list_is_a_clean_run() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let summary = executor(&server, root.path()).fetch_all(Vec::new()).await;
    assert!(summary.is_success());
    assert_eq!(summary.downloaded(), 0);
    assert!(server.received_requests().await.unwrap().is_empty());

    assert!(census(root.path()).is_empty());
}

#[tokio::test]
async fn test_one_failing_package_does_not_hide_the_others() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();

    let good = IndexedFile {
        name: "good-1.0.whl",
        data: wheel_bytes(&["good/_ext.pyd"]),
    };
    mount_package(&server, "good", &[&good]).await;
    mount_file(&server, &good).await;

    let bad = IndexedFile {
        name: "bad-1.0.whl",
        data: wheel_bytes(&[]),
    };
    mount_package(&server, "bad", &[&bad]).await;
    Mock::given(method("GET"))
        .and(path("/files/bad-1.0.whl"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let summary = executor(&server, root.path())
        .fetch_all(vec![Package::new("bad"), Package::new("good")])
        .await;

    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].package, Package::new("bad"));
    assert_eq!(summary.completed.len(), 1);
    assert!(root.path().join("good/good-1.0.whl").is_file());
}

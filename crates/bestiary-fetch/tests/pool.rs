use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bestiary_fetch::{
    acquire, AcquireConfig, DownloadRecord, DownloadStatus, FetchError, Session, Snapshot, Target,
};
use futures::future;

/// What the fake web serves, and a log of what was asked.
#[derive(Debug, Clone, Default)]
struct Script {
    pages: HashMap<String, Result<String, FetchError>>,
    images: HashMap<String, Result<Vec<u8>, FetchError>>,
    slow_pages: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
    opened: Arc<AtomicUsize>,
    broken_opens: Arc<AtomicUsize>,
}

impl Script {
    fn page(mut self, url: &str, image: &str) -> Self {
        let html = format!(
            r#"<html><body><table class="infobox"><tr><td><img src="{image}" width="250"></td></tr></table></body></html>"#
        );
        self.pages.insert(url.to_string(), Ok(html));
        self
    }

    fn raw_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(html.to_string()));
        self
    }

    fn image(mut self, url: &str, outcome: Result<Vec<u8>, FetchError>) -> Self {
        self.images.insert(url.to_string(), outcome);
        self
    }

    fn slow(mut self, url: &str) -> Self {
        self.slow_pages.push(url.to_string());
        self
    }

    /// The next `n` sessions fail to open.
    fn broken(self, n: usize) -> Self {
        self.broken_opens.store(n, Ordering::SeqCst);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }
}

struct FakeSession {
    script: Script,
}

#[async_trait]
impl Session for FakeSession {
    type Config = Script;

    fn open(config: &Self::Config) -> anyhow::Result<Self> {
        let broken = config
            .broken_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if broken.is_ok() {
            anyhow::bail!("Connection pool unavailable");
        }
        config.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            script: config.clone(),
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.script.calls.lock().unwrap().push(url.to_string());
        if self.script.slow_pages.iter().any(|u| u == url) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.script
            .pages
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.script.calls.lock().unwrap().push(url.to_string());
        self.script
            .images
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

const WIKI: &str = "https://en.wikipedia.org/wiki";
const UPLOAD: &str = "https://upload.wikimedia.org/wikipedia/commons";

fn target(name: &str) -> Target {
    Target {
        slug: name.to_lowercase(),
        name: name.to_string(),
        source_url: Some(format!("{WIKI}/{name}")),
    }
}

fn config(dir: &tempfile::TempDir) -> AcquireConfig {
    AcquireConfig {
        num_workers: 4,
        retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        seed: Some(7),
        image_dir: dir.path().join("images"),
        ..Default::default()
    }
}

async fn run(targets: Vec<Target>, config: &AcquireConfig, script: &Script) -> Snapshot {
    let acquired = acquire::<FakeSession>(targets, config, script, None, future::pending())
        .await
        .unwrap();
    assert!(!acquired.interrupted);
    acquired.manifest
}

#[tokio::test]
async fn shared_animal_is_fetched_once() {
    let dir = tempfile::tempdir().unwrap();
    let shark_jpg = format!("{UPLOAD}/a/ab/Shark.jpg");
    let cat_png = format!("{UPLOAD}/c/cd/Cat.png");
    let script = Script::default()
        .page(&format!("{WIKI}/Shark"), &shark_jpg)
        .page(&format!("{WIKI}/Cat"), &cat_png)
        .image(&shark_jpg, Ok(b"shark".to_vec()))
        .image(&cat_png, Ok(b"cat".to_vec()));

    // Listed under both "squaloid" and "selachian"
    let targets = vec![target("Shark"), target("Cat"), target("Shark")];
    let conf = config(&dir);
    let manifest = run(targets, &conf, &script).await;

    assert_eq!(manifest.len(), 2);
    assert_eq!(script.count(&format!("{WIKI}/Shark")), 1);
    assert_eq!(script.count(&shark_jpg), 1);

    let shark = &manifest["shark"];
    assert_eq!(shark.status, DownloadStatus::Success);
    assert_eq!(shark.attempts, 1);
    let path = shark.local_path.as_ref().unwrap();
    assert_eq!(path, &conf.image_dir.join("shark.jpg"));
    assert_eq!(fs_err::read(path).unwrap(), b"shark");

    let cat = manifest["cat"].local_path.as_ref().unwrap();
    assert_eq!(cat, &conf.image_dir.join("cat.png"));
    assert!(script.opened.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn retries_are_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let jpg = format!("{UPLOAD}/0/01/Owl.jpg");
    let script = Script::default()
        .page(&format!("{WIKI}/Owl"), &jpg)
        .image(&jpg, Err(FetchError::Status(503)));

    let manifest = run(vec![target("Owl")], &config(&dir), &script).await;

    let owl = &manifest["owl"];
    assert_eq!(owl.status, DownloadStatus::Failed);
    assert_eq!(owl.attempts, 3);
    assert_eq!(owl.local_path, None);
    assert_eq!(owl.last_error.as_deref(), Some("HTTP status 503"));
    assert_eq!(script.count(&jpg), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let jpg = format!("{UPLOAD}/0/01/Yak.jpg");
    let script = Script::default()
        .page(&format!("{WIKI}/Yak"), &jpg)
        .image(&jpg, Err(FetchError::Status(404)));

    let manifest = run(vec![target("Yak")], &config(&dir), &script).await;

    assert_eq!(manifest["yak"].status, DownloadStatus::Failed);
    assert_eq!(manifest["yak"].attempts, 1);
}

#[tokio::test]
async fn missing_candidate_is_a_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::default()
        .raw_page(
            &format!("{WIKI}/Quagga"),
            r#"<html><body><img src="/static/images/icons/wikipedia.png" width="50"></body></html>"#,
        );

    let manifest = run(vec![target("Quagga")], &config(&dir), &script).await;

    assert_eq!(manifest["quagga"], DownloadRecord::placeholder());
    assert_eq!(script.calls(), [format!("{WIKI}/Quagga")]);
}

#[tokio::test]
async fn unreachable_page_is_a_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::default();

    let manifest = run(vec![target("Moa")], &config(&dir), &script).await;

    assert_eq!(manifest["moa"].status, DownloadStatus::Placeholder);
    assert_eq!(manifest["moa"].attempts, 0);
}

#[tokio::test]
async fn no_source_page_skips_the_network() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::default();
    let snark = Target {
        source_url: None,
        ..target("Snark")
    };

    let manifest = run(vec![snark], &config(&dir), &script).await;

    assert_eq!(manifest["snark"], DownloadRecord::placeholder());
    assert!(script.calls().is_empty());
}

#[tokio::test]
async fn previous_manifest_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let conf = config(&dir);
    fs_err::create_dir_all(&conf.image_dir).unwrap();
    let lynx = conf.image_dir.join("lynx.jpg");
    fs_err::write(&lynx, b"lynx").unwrap();

    let mut previous = Snapshot::new();
    previous.insert("lynx".into(), DownloadRecord::success(lynx.clone(), 2));
    previous.insert("dodo".into(), DownloadRecord::placeholder());
    previous.insert("stale".into(), DownloadRecord::placeholder());
    previous.insert("auk".into(), DownloadRecord::failed("HTTP status 503", 3));

    let jpg = format!("{UPLOAD}/1/12/Auk.jpg");
    let script = Script::default()
        .page(&format!("{WIKI}/Auk"), &jpg)
        .image(&jpg, Ok(b"auk".to_vec()));

    let targets = vec![target("Lynx"), target("Dodo"), target("Auk")];
    let acquired =
        acquire::<FakeSession>(targets, &conf, &script, Some(&previous), future::pending())
            .await
            .unwrap();
    let manifest = acquired.manifest;

    assert_eq!(manifest.len(), 3);
    assert!(!manifest.contains_key("stale"));
    assert_eq!(manifest["lynx"], DownloadRecord::success(lynx, 2));
    assert_eq!(manifest["dodo"], DownloadRecord::placeholder());
    assert_eq!(manifest["auk"].status, DownloadStatus::Success);
    assert_eq!(script.calls(), [format!("{WIKI}/Auk"), jpg]);
}

#[tokio::test]
async fn nothing_left_to_download() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script::default();
    let acquired = acquire::<FakeSession>(
        Vec::new(),
        &config(&dir),
        &script,
        None,
        future::pending(),
    )
    .await
    .unwrap();

    assert!(acquired.manifest.is_empty());
    assert_eq!(script.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn interruption_leaves_entries_pending() {
    let dir = tempfile::tempdir().unwrap();
    let emu_jpg = format!("{UPLOAD}/e/ef/Emu.jpg");
    let lynx_jpg = format!("{UPLOAD}/1/1a/Lynx.jpg");
    let script = Script::default()
        .page(&format!("{WIKI}/Emu"), &emu_jpg)
        .image(&emu_jpg, Ok(b"emu".to_vec()))
        .page(&format!("{WIKI}/Lynx"), &lynx_jpg)
        .image(&lynx_jpg, Ok(b"lynx".to_vec()))
        .page(&format!("{WIKI}/Sloth"), "unused")
        .slow(&format!("{WIKI}/Sloth"));

    // Two workers are done well before the shutdown, one is stuck
    let conf = AcquireConfig {
        num_workers: 3,
        ..config(&dir)
    };
    let shutdown = tokio::time::sleep(Duration::from_millis(200));
    let acquired = acquire::<FakeSession>(
        vec![target("Emu"), target("Lynx"), target("Sloth")],
        &conf,
        &script,
        None,
        shutdown,
    )
    .await
    .unwrap();

    assert!(acquired.interrupted);
    assert_eq!(acquired.failed_workers, 0);
    assert_eq!(acquired.manifest["emu"].status, DownloadStatus::Success);
    assert_eq!(acquired.manifest["lynx"].status, DownloadStatus::Success);
    assert_eq!(acquired.manifest["sloth"], DownloadRecord::pending());
}

#[tokio::test]
async fn failed_worker_leaves_the_queue_to_others() {
    let dir = tempfile::tempdir().unwrap();
    let emu_jpg = format!("{UPLOAD}/e/ef/Emu.jpg");
    let lynx_jpg = format!("{UPLOAD}/1/1a/Lynx.jpg");
    let script = Script::default()
        .page(&format!("{WIKI}/Emu"), &emu_jpg)
        .image(&emu_jpg, Ok(b"emu".to_vec()))
        .page(&format!("{WIKI}/Lynx"), &lynx_jpg)
        .image(&lynx_jpg, Ok(b"lynx".to_vec()))
        .broken(1);

    let conf = AcquireConfig {
        num_workers: 2,
        ..config(&dir)
    };
    let acquired = acquire::<FakeSession>(
        vec![target("Emu"), target("Lynx")],
        &conf,
        &script,
        None,
        future::pending(),
    )
    .await
    .unwrap();

    assert!(!acquired.interrupted);
    assert_eq!(acquired.failed_workers, 1);
    assert_eq!(script.opened.load(Ordering::SeqCst), 1);
    assert_eq!(acquired.manifest["emu"].status, DownloadStatus::Success);
    assert_eq!(acquired.manifest["lynx"].status, DownloadStatus::Success);
}

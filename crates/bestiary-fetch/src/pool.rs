use std::cmp;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use bestiary_table::{AnimalEntry, DownloadStatus};
use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::{JoinError, JoinSet};

use crate::backoff::retry;
use crate::config::AcquireConfig;
use crate::locator::{image_extension, ImageLocator};
use crate::manifest::{DownloadRecord, Manifest, Snapshot};
use crate::session::Session;

/// A distinct animal to find a photo for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub slug: String,
    pub name: String,
    pub source_url: Option<String>,
}

impl From<&AnimalEntry> for Target {
    fn from(entry: &AnimalEntry) -> Self {
        Self {
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            source_url: entry.source_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Acquired {
    pub manifest: Snapshot,
    /// The run was cut short, unfinished entries are still pending
    pub interrupted: bool,
    /// Workers that stopped on an error or a panic
    pub failed_workers: usize,
}

/// Downloads one photo per distinct target with a pool of workers.
///
/// Targets sharing a slug are scheduled once. With `reuse`, usable records of a
/// previous run are carried over instead of downloading again. When `shutdown`
/// completes first, workers are aborted and the manifest is returned as it stands.
/// A worker that fails does not end the run, the remaining ones drain the queue.
pub async fn acquire<S>(
    targets: impl IntoIterator<Item = Target>,
    config: &AcquireConfig,
    session_conf: &S::Config,
    reuse: Option<&Snapshot>,
    shutdown: impl Future<Output = ()>,
) -> Result<Acquired>
where
    S: Session + 'static,
{
    let manifest = Arc::new(Manifest::new());
    let (tx, rx) = crossbeam_channel::unbounded::<Target>();

    let mut seen = HashSet::new();
    let (mut queued, mut reused) = (0, 0);
    for target in targets {
        if !seen.insert(target.slug.clone()) {
            log::debug!("Skipping duplicate target {}", target.slug);
            continue;
        }
        manifest.register(&target.slug);

        let previous = reuse
            .and_then(|snapshot| snapshot.get(&target.slug))
            .filter(|record| record.is_reusable());
        if let Some(record) = previous {
            log::debug!("Reusing {:?} record of {}", record.status, target.slug);
            manifest.record(&target.slug, record.clone());
            reused += 1;
            continue;
        }

        tx.send(target)?;
        queued += 1;
    }
    drop(tx);

    if queued == 0 {
        log::info!("Nothing to download, {reused} records reused");
        return Ok(Acquired {
            manifest: manifest.snapshot(),
            interrupted: false,
            failed_workers: 0,
        });
    }

    fs_err::create_dir_all(&config.image_dir)?;
    let num_workers = cmp::max(1, cmp::min(config.num_workers, queued));
    log::info!("Acquiring {queued} images with {num_workers} workers, {reused} records reused");

    // Workers

    let mut workers = JoinSet::new();
    for id in 0..num_workers {
        let rx = rx.clone();
        let manifest = manifest.clone();
        let config = config.clone();
        let session_conf = session_conf.clone();
        workers.spawn(async move { work::<S>(id, &config, &session_conf, rx, &manifest).await });
    }
    drop(rx);

    // Run until done or interrupted

    let mut failed_workers = 0;
    tokio::pin!(shutdown);
    let interrupted = loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(res) => failed_workers += worker_failed(res),
                None => break false,
            },
            _ = &mut shutdown => break true,
        }
    };

    if interrupted {
        log::warn!("Interrupted, abandoning in-flight downloads");
        workers.abort_all();
        while let Some(res) = workers.join_next().await {
            failed_workers += worker_failed(res);
        }
    }

    let snapshot = manifest.snapshot();
    log_summary(&snapshot);
    Ok(Acquired {
        manifest: snapshot,
        interrupted,
        failed_workers,
    })
}

/// Logs why a worker stopped early. Its share of the queue stays with the others.
fn worker_failed(res: Result<Result<()>, JoinError>) -> usize {
    match res {
        Ok(Ok(())) => 0,
        Err(e) if e.is_cancelled() => 0,
        Ok(Err(e)) => {
            log::error!("Worker stopped: {e:#}");
            1
        }
        Err(e) => {
            log::error!("Worker panicked: {e}");
            1
        }
    }
}

async fn work<S: Session>(
    id: usize,
    config: &AcquireConfig,
    session_conf: &S::Config,
    rx: Receiver<Target>,
    manifest: &Manifest,
) -> Result<()> {
    let session = S::open(session_conf)?;
    let locator = ImageLocator::from(config);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
        None => StdRng::from_entropy(),
    };

    while let Ok(target) = rx.try_recv() {
        let outcome = acquire_one(&session, &locator, config, &target, &mut rng).await;
        log::debug!("Worker {id}: {} is {:?}", target.slug, outcome.status);
        manifest.record(&target.slug, outcome);
    }
    Ok(())
}

async fn acquire_one<S, R>(
    session: &S,
    locator: &ImageLocator,
    config: &AcquireConfig,
    target: &Target,
    rng: &mut R,
) -> DownloadRecord
where
    S: Session,
    R: Rng + Send,
{
    let Some(page_url) = target.source_url.as_deref() else {
        log::info!("No page for {:?}, using a placeholder", target.name);
        return DownloadRecord::placeholder();
    };

    let Some(image_url) = locator.locate(session, page_url, rng).await else {
        return DownloadRecord::placeholder();
    };

    let (bytes, attempts) = retry(config.retries(), &config.backoff(), rng, || {
        session.fetch_image(&image_url)
    })
    .await;
    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Giving up on {image_url} after {attempts} attempt(s): {e}");
            return DownloadRecord::failed(e, attempts);
        }
    };

    let path = config
        .image_dir
        .join(format!("{}.{}", target.slug, image_extension(&image_url)));
    match fs_err::write(&path, bytes) {
        Ok(()) => DownloadRecord::success(path, attempts),
        Err(e) => {
            log::error!("Couldn't save image of {:?}: {e}", target.name);
            DownloadRecord::failed(e, attempts)
        }
    }
}

fn log_summary(snapshot: &Snapshot) {
    let count = |status| snapshot.values().filter(|r| r.status == status).count();
    log::info!(
        "Acquisition: {} downloaded, {} placeholders, {} failed, {} pending",
        count(DownloadStatus::Success),
        count(DownloadStatus::Placeholder),
        count(DownloadStatus::Failed),
        count(DownloadStatus::Pending),
    );
}

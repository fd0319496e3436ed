//! Background preloading of upcoming slideshow images.
//!
//! The slideshow hands over its next images; a single drain task per
//! scheduler fetches the uncached ones one at a time through the caller's
//! [`Downloader`], pausing between downloads and abandoning any fetch that
//! does not complete in time.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};

use super::settings::CacheSettings;
use super::store::CacheStore;
use crate::error::CacheError;
use crate::logging::SharedLogger;
use crate::models::ImageDescriptor;

type Outcome = Result<Vec<u8>, CacheError>;

/// Handle a downloader uses to report the result of one fetch.
///
/// Consumed on use, so a fetch completes at most once. Dropping it without
/// completing counts as a failed fetch; completing after the scheduler gave
/// up on the item is silently discarded.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Outcome>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report the fetched payload, or `None` if nothing could be fetched.
    pub fn complete(self, payload: Option<Vec<u8>>) {
        let outcome =
            payload.ok_or_else(|| CacheError::Download("downloader returned no data".into()));
        let _ = self.tx.send(outcome);
    }

    /// Report a failure with a reason for the log.
    pub fn fail(self, reason: impl std::fmt::Display) {
        let _ = self.tx.send(Err(CacheError::Download(reason.to_string())));
    }

    /// The scheduler stopped waiting (timeout); the result would be ignored.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Fetch capability supplied by the slideshow.
///
/// `download` must return promptly and report through `done` later; it is
/// called from the drain task.
pub trait Downloader: Send + Sync + 'static {
    /// Start fetching `image` and eventually complete `done`.
    fn download(&self, image: ImageDescriptor, done: Completion);
}

impl<F> Downloader for F
where
    F: Fn(ImageDescriptor, Completion) + Send + Sync + 'static,
{
    fn download(&self, image: ImageDescriptor, done: Completion) {
        self(image, done);
    }
}

/// Adapt an async fetch function into a [`Downloader`].
///
/// Each fetch runs in its own task so an abandoned one can still finish in
/// the background without holding up the queue.
pub fn downloader_fn<F, Fut, E>(fetch: F) -> impl Downloader
where
    F: Fn(ImageDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    move |image: ImageDescriptor, done: Completion| {
        let fut = fetch(image);
        tokio::spawn(async move {
            match fut.await {
                Ok(bytes) => done.complete(Some(bytes)),
                Err(e) => done.fail(e),
            }
        });
    }
}

struct Shared {
    store: Arc<CacheStore>,
    queue: Mutex<VecDeque<ImageDescriptor>>,
    downloader: Mutex<Option<Arc<dyn Downloader>>>,
    is_preloading: AtomicBool,
    idle: Notify,
    preload_count: usize,
    delay: Duration,
    timeout: Duration,
    logger: SharedLogger,
}

/// Warms the cache for the next few slideshow images.
#[derive(Clone)]
pub struct PreloadScheduler {
    inner: Arc<Shared>,
}

impl PreloadScheduler {
    /// Create a scheduler writing into `store`.
    pub fn new(store: Arc<CacheStore>, settings: &CacheSettings, logger: SharedLogger) -> Self {
        Self {
            inner: Arc::new(Shared {
                store,
                queue: Mutex::new(VecDeque::new()),
                downloader: Mutex::new(None),
                is_preloading: AtomicBool::new(false),
                idle: Notify::new(),
                preload_count: settings.preload_count,
                delay: settings.preload_delay,
                timeout: settings.preload_timeout,
                logger,
            }),
        }
    }

    /// Replace the queue with the first remote images of `images` and make
    /// sure a drain is running.
    ///
    /// Returns immediately. While a drain is in progress the new queue is
    /// picked up by that drain; no second one is started.
    pub fn preload_images(&self, images: Vec<ImageDescriptor>, downloader: Arc<dyn Downloader>) {
        let batch: VecDeque<ImageDescriptor> = images
            .into_iter()
            .filter(ImageDescriptor::is_remote)
            .take(self.inner.preload_count)
            .collect();

        self.inner
            .logger
            .debug(&format!("Queueing {} images for preload", batch.len()));

        *lock(&self.inner.downloader) = Some(downloader);
        *lock(&self.inner.queue) = batch;
        self.start_drain();
    }

    fn start_drain(&self) {
        if !self.inner.claim() {
            self.inner
                .logger
                .debug("Preload already running, queue replaced");
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(inner.drain());
            }
            Err(e) => {
                self.inner.release();
                self.inner
                    .logger
                    .error(&format!("Cannot start preload outside a Tokio runtime: {e}"));
            }
        }
    }

    /// A drain task is active.
    pub fn is_preloading(&self) -> bool {
        self.inner.is_preloading.load(Ordering::Acquire)
    }

    /// Images still waiting in the queue.
    pub fn pending(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    /// Wait until no drain is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_preloading() {
                return;
            }
            notified.await;
        }
    }
}

impl Shared {
    fn claim(&self) -> bool {
        self.is_preloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.is_preloading.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }

    fn pop(&self) -> Option<ImageDescriptor> {
        lock(&self.queue).pop_front()
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let mut downloaded = false;
            while let Some(image) = self.pop() {
                if self.store.contains(&image.identifier).await {
                    self.logger
                        .debug(&format!("Already cached, skipping {}", image.identifier));
                    continue;
                }
                if downloaded && !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.fetch_and_store(image).await;
                downloaded = true;
            }

            self.release();
            // Images queued between the last pop and the release must not be stranded.
            if lock(&self.queue).is_empty() || !self.claim() {
                break;
            }
        }
        self.logger.debug("Preload queue drained");
    }

    async fn fetch_and_store(&self, image: ImageDescriptor) {
        let downloader = lock(&self.downloader).clone();
        let Some(downloader) = downloader else {
            return;
        };
        let identifier = image.identifier.clone();
        let (done, rx) = Completion::channel();
        downloader.download(image, done);

        let bytes = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(bytes))) if !bytes.is_empty() => bytes,
            Ok(Ok(Ok(_))) => {
                self.logger
                    .warn(&format!("Preload of {identifier} returned an empty payload"));
                return;
            }
            Ok(Ok(Err(e))) => {
                self.logger.warn(&format!("Preload of {identifier} failed: {e}"));
                return;
            }
            Ok(Err(_)) => {
                self.logger.warn(&format!(
                    "Preload of {identifier} failed: downloader dropped the completion"
                ));
                return;
            }
            Err(_) => {
                self.logger.error(&format!(
                    "Preload of {identifier} failed: {}",
                    CacheError::Timeout(self.timeout)
                ));
                return;
            }
        };

        match self.store.set(&identifier, &bytes).await {
            Ok(()) => self
                .logger
                .debug(&format!("Preloaded {identifier} ({} bytes)", bytes.len())),
            Err(e) => self
                .logger
                .error(&format!("Failed to store preloaded {identifier}: {e}")),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Profile image thumbnails: memory LRU in front of a disk cache in front of
//! the network.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use lru::LruCache;
use sha1::{Digest, Sha1};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Thumbnail size in pixels. Rendered with half blocks, so this is
/// `THUMB_WIDTH` columns by `THUMB_HEIGHT / 2` rows.
pub const THUMB_WIDTH: u32 = 8;
pub const THUMB_HEIGHT: u32 = 8;

/// Downloads running at once for one [`ImageLoader::prefetch`] batch.
pub const PREFETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl Thumbnail {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        let resized = img.resize_exact(
            THUMB_WIDTH,
            THUMB_HEIGHT,
            image::imageops::FilterType::Nearest,
        );
        let rgb = resized.to_rgb8();
        let pixels = rgb.pixels().map(|p| [p[0], p[1], p[2]]).collect();
        Ok(Self {
            width: THUMB_WIDTH,
            height: THUMB_HEIGHT,
            pixels,
        })
    }

    #[cfg(test)]
    pub(crate) fn solid(color: [u8; 3]) -> Self {
        Self {
            width: THUMB_WIDTH,
            height: THUMB_HEIGHT,
            pixels: vec![color; (THUMB_WIDTH * THUMB_HEIGHT) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        self.pixels[(y * self.width + x) as usize]
    }
}

type Completion = (String, Result<Vec<u8>>);

pub struct ImageLoader {
    memory: LruCache<String, Arc<Thumbnail>>,
    disk_dir: PathBuf,
    client: reqwest::Client,
    pending: HashSet<String>,
    failed: HashSet<String>,
    closed: bool,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
}

impl ImageLoader {
    pub fn new(disk_dir: impl Into<PathBuf>, capacity: usize, client: reqwest::Client) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            memory: LruCache::new(capacity),
            disk_dir: disk_dir.into(),
            client,
            pending: HashSet::new(),
            failed: HashSet::new(),
            closed: false,
            tx,
            rx,
        }
    }

    fn disk_path(&self, url: &str) -> PathBuf {
        let digest = Sha1::digest(url.as_bytes());
        self.disk_dir.join(format!("{:x}", digest))
    }

    /// Memory hit only; never triggers a load.
    pub fn cached(&mut self, url: &str) -> Option<Arc<Thumbnail>> {
        self.memory.get(url).cloned()
    }

    /// Like [`ImageLoader::cached`] but leaves the LRU order alone, for
    /// drawing code that only holds a shared reference.
    pub fn peek(&self, url: &str) -> Option<Arc<Thumbnail>> {
        self.memory.peek(url).cloned()
    }

    /// Returns the thumbnail when it is in memory or on disk. Otherwise
    /// starts a download (once per URL) and returns `None`; the image shows
    /// up in a later [`ImageLoader::poll`].
    pub fn request(&mut self, url: &str) -> Option<Arc<Thumbnail>> {
        if url.is_empty() || self.closed {
            return None;
        }
        if let Some(thumb) = self.memory.get(url) {
            return Some(thumb.clone());
        }
        if self.pending.contains(url) || self.failed.contains(url) {
            return None;
        }

        let path = self.disk_path(url);
        if let Ok(bytes) = std::fs::read(&path) {
            match Thumbnail::decode(&bytes) {
                Ok(thumb) => {
                    let thumb = Arc::new(thumb);
                    self.memory.put(url.to_string(), thumb.clone());
                    return Some(thumb);
                }
                Err(e) => warn!(url, "cached image is unreadable, refetching: {}", e),
            }
        }

        self.spawn_download(url.to_string());
        None
    }

    fn spawn_download(&mut self, url: String) {
        debug!(%url, "downloading image");
        self.pending.insert(url.clone());
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = download(&client, &url).await;
            // The loader may be gone by now.
            let _ = tx.send((url, result));
        });
    }

    /// Warms the cache for `urls` in the background, at most
    /// [`PREFETCH_CONCURRENCY`] downloads at a time. URLs that are cached,
    /// in flight or known to fail are skipped.
    pub fn prefetch<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        if self.closed {
            return;
        }
        let mut wanted = Vec::new();
        for url in urls {
            if url.is_empty()
                || self.memory.contains(&url)
                || self.pending.contains(&url)
                || self.failed.contains(&url)
                || wanted.contains(&url)
            {
                continue;
            }
            if self.disk_path(&url).exists() {
                // Cheap enough to decode on the UI thread.
                self.request(&url);
                continue;
            }
            wanted.push(url);
        }
        if wanted.is_empty() {
            return;
        }

        debug!(count = wanted.len(), "prefetching images");
        self.pending.extend(wanted.iter().cloned());
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            stream::iter(wanted)
                .map(|url| {
                    let client = client.clone();
                    async move {
                        let result = download(&client, &url).await;
                        (url, result)
                    }
                })
                .buffer_unordered(PREFETCH_CONCURRENCY)
                .for_each(|completion| {
                    let _ = tx.send(completion);
                    futures::future::ready(())
                })
                .await;
        });
    }

    /// Drains finished downloads. Returns the URLs that became available.
    pub fn poll(&mut self) -> Vec<String> {
        let mut ready = Vec::new();
        while let Ok((url, result)) = self.rx.try_recv() {
            self.pending.remove(&url);
            if self.closed {
                continue;
            }
            match result.and_then(|bytes| {
                let thumb = Thumbnail::decode(&bytes)?;
                Ok((bytes, thumb))
            }) {
                Ok((bytes, thumb)) => {
                    if let Err(e) = store_on_disk(&self.disk_path(&url), &bytes) {
                        warn!(%url, "could not cache image: {}", e);
                    }
                    self.memory.put(url.clone(), Arc::new(thumb));
                    ready.push(url);
                }
                Err(e) => {
                    warn!(%url, "image load failed: {}", e);
                    self.failed.insert(url);
                }
            }
        }
        ready
    }

    /// Stops accepting requests; late completions are dropped.
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.rx.close();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

fn store_on_disk(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

// SPDX-License-Identifier: MPL-2.0

//! Avatar and server icon loading.
//!
//! Downloads run on the shared runtime with bounded concurrency, are decoded
//! and downscaled off the main thread, and are kept in a small in-memory LRU.
//! Several widgets asking for the same URL share one download.

use crate::runtime;
use gtk4::gdk;
use gtk4::glib;
use gtk4::prelude::{ObjectExt, WidgetExt};
use image::GenericImageView;
use image::imageops::FilterType;
use libadwaita as adw;
use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

const MAX_CONCURRENT_DOWNLOADS: usize = 8;
const DECODED_CACHE_CAPACITY: usize = 256;
const MAX_AVATAR_SIZE: u32 = 128;

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .connect_timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap_or_default()
});

static DOWNLOAD_SEMAPHORE: Lazy<Arc<Semaphore>> =
    Lazy::new(|| Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS)));

static DECODED_CACHE: Lazy<Mutex<DecodedLruCache>> =
    Lazy::new(|| Mutex::new(DecodedLruCache::new(DECODED_CACHE_CAPACITY)));

/// URL -> widgets waiting on it
static PENDING_REQUESTS: Lazy<Mutex<HashMap<String, Vec<Sender<DecodedImage>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Clone)]
struct DecodedImage {
    rgba: Arc<Vec<u8>>,
    width: u32,
    height: u32,
}

struct DecodedLruCache {
    map: HashMap<String, DecodedImage>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DecodedLruCache {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn get(&mut self, key: &str) -> Option<DecodedImage> {
        let img = self.map.get(key).cloned()?;
        self.touch(key);
        Some(img)
    }

    fn insert(&mut self, key: String, value: DecodedImage) {
        if !self.map.contains_key(&key) {
            while self.map.len() >= self.capacity {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.map.remove(&oldest);
            }
        }
        self.map.insert(key.clone(), value);
        self.touch(&key);
    }

    fn touch(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Show the image at `url` in `avatar` once it's available.
/// Until then the avatar keeps its initials.
pub fn load_avatar(avatar: &adw::Avatar, url: &str) {
    if url.is_empty() {
        return;
    }

    if let Some(decoded) = lock(&DECODED_CACHE).get(url) {
        apply_to_avatar(avatar, &decoded);
        return;
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let first_request = {
        let mut pending = lock(&PENDING_REQUESTS);
        match pending.get_mut(url) {
            Some(waiting) => {
                waiting.push(tx);
                false
            }
            None => {
                pending.insert(url.to_string(), vec![tx]);
                true
            }
        }
    };

    poll_for_avatar(avatar.downgrade(), rx);

    if first_request {
        let url = url.to_string();
        runtime::spawn(async move {
            fetch_and_decode(url).await;
        });
    }
}

fn poll_for_avatar(avatar: glib::WeakRef<adw::Avatar>, rx: Receiver<DecodedImage>) {
    glib::timeout_add_local(std::time::Duration::from_millis(16), move || {
        match rx.try_recv() {
            Ok(decoded) => {
                if let Some(avatar) = avatar.upgrade() {
                    apply_to_avatar(&avatar, &decoded);
                }
                glib::ControlFlow::Break
            }
            Err(TryRecvError::Empty) => glib::ControlFlow::Continue,
            Err(TryRecvError::Disconnected) => glib::ControlFlow::Break,
        }
    });
}

async fn fetch_and_decode(url: String) {
    let Ok(_permit) = DOWNLOAD_SEMAPHORE.clone().acquire_owned().await else {
        lock(&PENDING_REQUESTS).remove(&url);
        return;
    };

    let bytes = match fetch(&url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(%url, "Avatar download failed: {}", e);
            lock(&PENDING_REQUESTS).remove(&url);
            return;
        }
    };

    let decoded = tokio::task::spawn_blocking(move || decode(&bytes, MAX_AVATAR_SIZE))
        .await
        .ok()
        .flatten();

    let waiting = lock(&PENDING_REQUESTS).remove(&url).unwrap_or_default();
    let Some(decoded) = decoded else {
        tracing::debug!(%url, "Avatar could not be decoded");
        return;
    };

    lock(&DECODED_CACHE).insert(url, decoded.clone());
    for tx in waiting {
        let _ = tx.send(decoded.clone());
    }
}

async fn fetch(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = HTTP_CLIENT.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Decode to RGBA, downscaling anything larger than `max_size`
fn decode(bytes: &[u8], max_size: u32) -> Option<DecodedImage> {
    let img = image::load_from_memory(bytes).ok()?;
    let (width, height) = img.dimensions();

    let img = if width > max_size || height > max_size {
        img.resize(max_size, max_size, FilterType::Triangle)
    } else {
        img
    };

    let (width, height) = img.dimensions();
    Some(DecodedImage {
        rgba: Arc::new(img.into_rgba8().into_raw()),
        width,
        height,
    })
}

fn apply_to_avatar(avatar: &adw::Avatar, decoded: &DecodedImage) {
    let bytes = glib::Bytes::from(decoded.rgba.as_slice());
    let texture = gdk::MemoryTexture::new(
        decoded.width as i32,
        decoded.height as i32,
        gdk::MemoryFormat::R8g8b8a8,
        &bytes,
        decoded.width as usize * 4,
    );
    avatar.set_custom_image(Some(&texture));
    avatar.queue_draw();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(width: u32) -> DecodedImage {
        DecodedImage {
            rgba: Arc::new(vec![0; (width * 4) as usize]),
            width,
            height: 1,
        }
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut cache = DecodedLruCache::new(2);
        cache.insert("a".into(), img(1));
        cache.insert("b".into(), img(2));
        assert!(cache.get("a").is_some());

        cache.insert("c".into(), img(3));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_lru_reinsert_does_not_evict() {
        let mut cache = DecodedLruCache::new(2);
        cache.insert("a".into(), img(1));
        cache.insert("b".into(), img(2));
        cache.insert("a".into(), img(5));

        assert_eq!(cache.get("a").map(|i| i.width), Some(5));
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_decode_downscales_large_images() {
        let mut png = Vec::new();
        image::DynamicImage::new_rgba8(512, 256)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode(&png, 128).unwrap();
        assert_eq!((decoded.width, decoded.height), (128, 64));
        assert_eq!(decoded.rgba.len(), 128 * 64 * 4);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"not an image", 128).is_none());
    }
}

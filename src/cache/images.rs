use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

/// Bounded in-memory image cache. Limited by entry count and total bytes;
/// the oldest insertions are evicted first.
#[derive(Debug)]
pub struct ImageCache {
    entries: HashMap<String, Bytes>,
    order: VecDeque<String>,
    max_entries: usize,
    max_bytes: usize,
    total_bytes: usize,
}

impl ImageCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
            max_bytes,
            total_bytes: 0,
        }
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.entries.get(url).cloned()
    }

    /// Store `data` under `url`, evicting older entries to make room.
    /// Returns false if the image alone exceeds the byte ceiling; any older
    /// copy under `url` is dropped either way.
    pub fn insert(&mut self, url: String, data: Bytes) -> bool {
        self.remove(&url);

        if self.max_entries == 0 || data.len() > self.max_bytes {
            tracing::debug!("Not caching {} ({} bytes)", url, data.len());
            return false;
        }

        while self.entries.len() >= self.max_entries || self.total_bytes + data.len() > self.max_bytes {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.total_bytes -= evicted.len();
            }
        }

        self.total_bytes += data.len();
        self.order.push_back(url.clone());
        self.entries.insert(url, data);
        true
    }

    pub fn remove(&mut self, url: &str) -> Option<Bytes> {
        let data = self.entries.remove(url)?;
        self.order.retain(|u| u != url);
        self.total_bytes -= data.len();
        Some(data)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

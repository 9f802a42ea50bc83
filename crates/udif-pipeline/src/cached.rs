//! Cached pipeline - bounded page cache shared by many readers
//!
//! A [`CacheZone`] holds fixed-size pages keyed by `(reader name, page index)`
//! and evicts the least recently used page once its byte capacity is exceeded.
//! All bookkeeping happens under one mutex, so lookups, insertions and
//! evictions are atomic with respect to each other.
//!
//! A [`CachedPipeline`] wraps any `Read + Seek` source and serves reads
//! page by page through a zone.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default page granularity in bytes
pub const DEFAULT_PAGE_SIZE: usize = 4096;

type PageKey = (String, u64);

struct CachedPage {
    data: Arc<[u8]>,
    tick: u64,
}

#[derive(Default)]
struct ZoneState {
    pages: HashMap<PageKey, CachedPage>,
    recency: BTreeMap<u64, PageKey>,
    tick: u64,
    resident: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ZoneState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &PageKey) {
        if let Some(page) = self.pages.remove(key) {
            self.recency.remove(&page.tick);
            self.resident -= page.data.len() as u64;
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let oldest = match self.recency.iter().next() {
            Some((_, key)) => key.clone(),
            None => return false,
        };
        self.remove(&oldest);
        self.evictions += 1;
        true
    }
}

/// Snapshot of cache zone counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to go to the source
    pub misses: u64,
    /// Pages dropped to stay within capacity
    pub evictions: u64,
    /// Number of resident pages
    pub pages: usize,
    /// Bytes held by resident pages
    pub resident_bytes: u64,
}

/// Bounded LRU page cache shared by all readers of one container
pub struct CacheZone {
    capacity: u64,
    page_size: usize,
    state: Mutex<ZoneState>,
}

impl CacheZone {
    /// Create a zone holding at most `capacity` bytes in pages of `page_size` bytes
    ///
    /// A `page_size` of zero selects [`DEFAULT_PAGE_SIZE`].
    pub fn new(capacity: u64, page_size: usize) -> Self {
        Self {
            capacity,
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
            state: Mutex::new(ZoneState::default()),
        }
    }

    /// Byte capacity of this zone
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Page granularity in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn state(&self) -> MutexGuard<'_, ZoneState> {
        // Every mutation leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a page, marking it as most recently used
    pub fn get(&self, name: &str, page: u64) -> Option<Arc<[u8]>> {
        let mut state = self.state();
        let key = (name.to_string(), page);
        let tick = state.next_tick();

        let found = state.pages.get_mut(&key).map(|cached| {
            let old = cached.tick;
            cached.tick = tick;
            (cached.data.clone(), old)
        });

        let (data, old_tick) = match found {
            Some(found) => found,
            None => {
                state.misses += 1;
                return None;
            }
        };

        state.recency.remove(&old_tick);
        state.recency.insert(tick, key);
        state.hits += 1;
        Some(data)
    }

    /// Store a page, evicting least recently used pages until it fits
    ///
    /// Pages larger than the whole capacity are not stored.
    pub fn insert(&self, name: &str, page: u64, data: Arc<[u8]>) {
        let size = data.len() as u64;
        if size > self.capacity {
            return;
        }

        let mut state = self.state();
        let key = (name.to_string(), page);
        state.remove(&key);

        while state.resident + size > self.capacity {
            if !state.evict_oldest() {
                break;
            }
        }

        let tick = state.next_tick();
        state.recency.insert(tick, key.clone());
        state.pages.insert(key, CachedPage { data, tick });
        state.resident += size;
    }

    /// Drop every page belonging to one reader
    pub fn invalidate(&self, name: &str) {
        let mut state = self.state();
        let keys: Vec<PageKey> = state
            .pages
            .keys()
            .filter(|(owner, _)| owner == name)
            .cloned()
            .collect();

        for key in keys {
            state.remove(&key);
        }
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            pages: state.pages.len(),
            resident_bytes: state.resident,
        }
    }
}

/// A pipeline that serves reads through a shared [`CacheZone`]
pub struct CachedPipeline<R: Read + Seek> {
    inner: R,
    length: u64,
    zone: Arc<CacheZone>,
    name: String,
    position: u64,
}

impl<R: Read + Seek> CachedPipeline<R> {
    /// Wrap `inner` (of `length` bytes) so its pages are cached under `name`
    pub fn new(inner: R, length: u64, zone: Arc<CacheZone>, name: impl Into<String>) -> Self {
        Self {
            inner,
            length,
            zone,
            name: name.into(),
            position: 0,
        }
    }

    /// Cache key prefix of this reader
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the wrapped stream
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Current position
    pub fn position(&self) -> u64 {
        self.position
    }

    fn load_page(&mut self, page: u64) -> io::Result<Arc<[u8]>> {
        if let Some(data) = self.zone.get(&self.name, page) {
            return Ok(data);
        }

        let page_size = self.zone.page_size() as u64;
        let start = page * page_size;
        let size = page_size.min(self.length.saturating_sub(start)) as usize;

        self.inner.seek(SeekFrom::Start(start))?;
        let mut data = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match self.inner.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        data.truncate(filled);

        let data: Arc<[u8]> = data.into();
        self.zone.insert(&self.name, page, data.clone());
        tracing::trace!("Cached page {} of {}", page, self.name);
        Ok(data)
    }
}

impl<R: Read + Seek> Read for CachedPipeline<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.length || buf.is_empty() {
            return Ok(0);
        }

        let page_size = self.zone.page_size() as u64;
        let page = self.position / page_size;
        let offset = (self.position % page_size) as usize;

        let data = self.load_page(page)?;
        if offset >= data.len() {
            return Ok(0);
        }

        let to_read = buf
            .len()
            .min(data.len() - offset)
            .min((self.length - self.position) as usize);
        buf[..to_read].copy_from_slice(&data[offset..offset + to_read]);
        self.position += to_read as u64;

        Ok(to_read)
    }
}

impl<R: Read + Seek> Seek for CachedPipeline<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(offset) => self.length as i128 + offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek before beginning of cached pipeline",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(len: usize) -> Cursor<Vec<u8>> {
        Cursor::new((0..len).map(|i| (i % 251) as u8).collect())
    }

    #[test]
    fn test_cached_reads_match_source() {
        let zone = Arc::new(CacheZone::new(64 * 1024, 512));
        let mut cached = CachedPipeline::new(source(5000), 5000, zone, "part-0");

        let mut out = Vec::new();
        cached.read_to_end(&mut out).unwrap();

        assert_eq!(out.len(), 5000);
        assert!(out.iter().enumerate().all(|(i, &b)| b == (i % 251) as u8));
    }

    #[test]
    fn test_second_read_hits_cache() {
        let zone = Arc::new(CacheZone::new(64 * 1024, 512));
        let mut cached = CachedPipeline::new(source(2048), 2048, zone.clone(), "part-0");

        let mut buf = [0u8; 100];
        cached.read_exact(&mut buf).unwrap();
        cached.seek(SeekFrom::Start(0)).unwrap();
        cached.read_exact(&mut buf).unwrap();

        let stats = zone.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.resident_bytes, 512);
    }

    #[test]
    fn test_lru_eviction_respects_capacity() {
        let zone = CacheZone::new(1024, 512);

        zone.insert("a", 0, vec![0u8; 512].into());
        zone.insert("a", 1, vec![1u8; 512].into());
        // Touch page 0 so page 1 becomes the oldest
        assert!(zone.get("a", 0).is_some());
        zone.insert("a", 2, vec![2u8; 512].into());

        assert!(zone.get("a", 0).is_some());
        assert!(zone.get("a", 1).is_none());
        assert!(zone.get("a", 2).is_some());

        let stats = zone.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.resident_bytes, 1024);
    }

    #[test]
    fn test_readers_are_keyed_by_name() {
        let zone = Arc::new(CacheZone::new(64 * 1024, 512));
        let mut first = CachedPipeline::new(Cursor::new(vec![1u8; 512]), 512, zone.clone(), "part-0");
        let mut second = CachedPipeline::new(Cursor::new(vec![2u8; 512]), 512, zone.clone(), "part-1");

        let mut buf = [0u8; 4];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1; 4]);
        second.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [2; 4]);

        zone.invalidate("part-0");
        assert_eq!(zone.stats().pages, 1);
    }

    #[test]
    fn test_oversized_page_not_stored() {
        let zone = CacheZone::new(100, 512);
        zone.insert("a", 0, vec![0u8; 512].into());
        assert_eq!(zone.stats().pages, 0);
    }

    #[test]
    fn test_read_stops_at_length() {
        let zone = Arc::new(CacheZone::new(64 * 1024, 512));
        let mut cached = CachedPipeline::new(source(1000), 700, zone, "part-0");

        cached.seek(SeekFrom::Start(650)).unwrap();
        let mut out = Vec::new();
        cached.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 50);
    }

    #[test]
    fn test_zone_shared_across_threads() {
        let zone = Arc::new(CacheZone::new(4 * 512, 512));

        let handles: Vec<_> = (0..4u8)
            .map(|reader| {
                let data: Vec<u8> = (0..16 * 512).map(|i| (i % 241) as u8 ^ reader).collect();
                let mut cached = CachedPipeline::new(
                    Cursor::new(data.clone()),
                    data.len() as u64,
                    zone.clone(),
                    format!("part-{}", reader),
                );

                std::thread::spawn(move || {
                    for _ in 0..3 {
                        cached.seek(SeekFrom::Start(0)).unwrap();
                        let mut out = Vec::new();
                        cached.read_to_end(&mut out).unwrap();
                        assert_eq!(out, data);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = zone.stats();
        assert!(stats.resident_bytes <= zone.capacity());
        assert!(stats.pages <= 4);
        assert!(stats.evictions > 0);
    }
}

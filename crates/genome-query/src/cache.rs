use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Values above this size are stored zlib-compressed.
const COMPRESS_THRESHOLD: usize = 10 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 256,
        }
    }
}

struct Entry {
    stored_at: Instant,
    bytes: Vec<u8>,
    compressed: bool,
}

struct Inner {
    map: HashMap<u64, Entry>,
    order: VecDeque<u64>,
}

/// Query result cache keyed by `(generation, predicate, options)`.
///
/// The genome generation number is part of every key, so a writer bumping
/// the generation invalidates the whole cache in O(1); stale entries
/// simply stop being addressable and age out via LRU.
pub struct QueryCache {
    inner: Mutex<Inner>,
    config: CacheConfig,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            config,
        }
    }

    /// Stable key from the generation and the canonical request forms.
    pub fn key(generation: u64, predicate_key: &str, options_json: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(generation.to_be_bytes());
        hasher.update(predicate_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(options_json.as_bytes());
        let digest = hasher.finalize();
        u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ])
    }

    pub fn get(&self, key: u64) -> Option<Value> {
        let mut inner = self.inner.lock().ok()?;
        let expired = match inner.map.get(&key) {
            None => return None,
            Some(entry) => entry.stored_at.elapsed() > self.config.ttl,
        };
        if expired {
            inner.map.remove(&key);
            inner.order.retain(|k| *k != key);
            return None;
        }

        // Refresh LRU position.
        inner.order.retain(|k| *k != key);
        inner.order.push_back(key);

        let entry = inner.map.get(&key)?;
        let raw = if entry.compressed {
            let mut decoder = ZlibDecoder::new(entry.bytes.as_slice());
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).ok()?;
            out
        } else {
            entry.bytes.clone()
        };
        serde_json::from_slice(&raw).ok()
    }

    pub fn put(&self, key: u64, value: &Value) {
        let Ok(raw) = serde_json::to_vec(value) else {
            return;
        };
        let (bytes, compressed) = if raw.len() > COMPRESS_THRESHOLD {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            if encoder.write_all(&raw).is_err() {
                (raw, false)
            } else {
                match encoder.finish() {
                    Ok(compressed) => (compressed, true),
                    Err(_) => return,
                }
            }
        } else {
            (raw, false)
        };

        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        while inner.order.len() >= self.config.max_entries {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
            } else {
                break;
            }
        }
        inner.order.retain(|k| *k != key);
        inner.order.push_back(key);
        inner.map.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                bytes,
                compressed,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrips_values() {
        let cache = QueryCache::new(CacheConfig::default());
        let key = QueryCache::key(1, "type=function", "{}");
        cache.put(key, &json!({"total_count": 3}));
        assert_eq!(cache.get(key), Some(json!({"total_count": 3})));
    }

    #[test]
    fn generation_is_part_of_the_key() {
        let a = QueryCache::key(1, "type=function", "{}");
        let b = QueryCache::key(2, "type=function", "{}");
        assert_ne!(a, b);
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = QueryCache::new(CacheConfig {
            ttl: Duration::from_millis(0),
            max_entries: 8,
        });
        let key = QueryCache::key(1, "p", "o");
        cache.put(key, &json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(key), None);
    }

    #[test]
    fn lru_evicts_oldest() {
        let cache = QueryCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        let first = QueryCache::key(1, "a", "");
        let second = QueryCache::key(1, "b", "");
        let third = QueryCache::key(1, "c", "");
        cache.put(first, &json!(1));
        cache.put(second, &json!(2));
        cache.put(third, &json!(3));
        assert_eq!(cache.get(first), None);
        assert_eq!(cache.get(third), Some(json!(3)));
    }

    #[test]
    fn large_values_are_compressed_transparently() {
        let cache = QueryCache::new(CacheConfig::default());
        let key = QueryCache::key(1, "big", "");
        let value = json!({"blob": "x".repeat(32 * 1024)});
        cache.put(key, &value);
        assert_eq!(cache.get(key), Some(value));
    }
}

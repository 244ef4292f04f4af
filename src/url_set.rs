//! The URL-seen set: keyed membership with atomic insert-if-absent.
//!
//! Backed by a sharded concurrent set; any implementation with
//! insert-and-report-absent plus a size query would do. The dedup key is the
//! serialized URL, whose scheme and host the `url` crate already lowercases.

use dashmap::DashSet;

/// Concurrency-safe set of URLs the scheduler has already admitted.
#[derive(Debug, Default)]
pub struct UrlSet {
    inner: DashSet<String>,
}

impl UrlSet {
    pub fn new() -> Self {
        UrlSet {
            inner: DashSet::new(),
        }
    }

    /// Inserts the key and reports whether it was absent.
    pub fn put_if_absent(&self, url: &str) -> bool {
        self.inner.insert(url.to_owned())
    }

    /// The number of distinct URLs seen so far.
    pub fn len(&self) -> u64 {
        self.inner.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_absence_exactly_once() {
        let set = UrlSet::new();
        assert!(set.put_if_absent("http://example.test/"));
        assert!(!set.put_if_absent("http://example.test/"));
        assert!(set.put_if_absent("http://example.test/a"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn concurrent_inserts_admit_one_winner() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let set = Arc::new(UrlSet::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if set.put_if_absent("http://example.test/contended") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 1);
    }
}

use std::{cell::RefCell, collections::HashMap, num::NonZeroUsize};

use lru::LruCache;

use crate::{MemoryAccess, Pfn, VmiDriver, VmiError, VmiMappedPage};

struct Entry {
    page: VmiMappedPage,
    protection: MemoryAccess,
}

/// A bounded mapping from page frame number to mapped-frame entry.
///
/// Entries are evicted least-recently-used once the cache exceeds its soft
/// cap; a cap of 0 means unbounded, which the file backend uses since
/// mapping a page from an `mmap`ed snapshot is effectively free.
///
/// The cache does no synchronization of its own: callers are expected to
/// serialize access to one instance, per the library's single-threaded
/// cooperative concurrency model.
pub struct PageCache {
    cap: usize,
    // `LruCache` requires a nonzero capacity; when unbounded we size it to
    // `usize::MAX` and never let it evict on its own, instead tracking our
    // own count for stats.
    entries: RefCell<LruCache<Pfn, Entry>>,
    unbounded: RefCell<HashMap<Pfn, Entry>>,
}

impl PageCache {
    /// Creates a new cache with the given soft cap (0 = unbounded).
    pub fn new(cap: usize) -> Self {
        if cap == 0 {
            Self {
                cap: 0,
                entries: RefCell::new(LruCache::new(NonZeroUsize::new(1).unwrap())),
                unbounded: RefCell::new(HashMap::new()),
            }
        }
        else {
            Self {
                cap,
                entries: RefCell::new(LruCache::new(NonZeroUsize::new(cap).unwrap())),
                unbounded: RefCell::new(HashMap::new()),
            }
        }
    }

    /// Returns a mapped page for `pfn`, mapping it through `driver` on a
    /// cache miss.
    pub fn insert(
        &self,
        driver: &impl VmiDriver,
        pfn: Pfn,
        protection: MemoryAccess,
    ) -> Result<VmiMappedPage, VmiError> {
        if self.cap == 0 {
            let mut unbounded = self.unbounded.borrow_mut();
            if let Some(entry) = unbounded.get(&pfn) {
                if entry.protection.contains(protection) {
                    return Ok(entry.page.clone());
                }
            }

            let page = driver.map_frame(pfn, protection)?;
            unbounded.insert(
                pfn,
                Entry {
                    page: page.clone(),
                    protection,
                },
            );
            return Ok(page);
        }

        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get(&pfn) {
            if entry.protection.contains(protection) {
                return Ok(entry.page.clone());
            }
        }

        let page = driver.map_frame(pfn, protection)?;
        entries.put(
            pfn,
            Entry {
                page: page.clone(),
                protection,
            },
        );
        Ok(page)
    }

    /// Releases every entry. Each mapping's backend resource is released
    /// once its last `VmiMappedPage` clone is dropped.
    pub fn flush(&self) {
        self.entries.borrow_mut().clear();
        self.unbounded.borrow_mut().clear();
    }
}

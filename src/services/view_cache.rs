//! Read-through cache of query results.
//!
//! Holds the last confirmed result of each folder, email and contact query.
//! Mutations never write into the cache; they mark whole query kinds stale
//! and the next read re-fetches from the store.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::domain::{Contact, Email, Folder, FolderId, UserId};

/// Query families that are invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Folders,
    Emails,
    Contacts,
}

impl QueryKind {
    fn index(self) -> usize {
        match self {
            QueryKind::Folders => 0,
            QueryKind::Emails => 1,
            QueryKind::Contacts => 2,
        }
    }
}

/// Key of a single cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Folders(UserId),
    /// Emails of one user, optionally restricted to a folder.
    Emails(UserId, Option<FolderId>),
    Contacts(UserId),
}

impl QueryKey {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryKey::Folders(_) => QueryKind::Folders,
            QueryKey::Emails(..) => QueryKind::Emails,
            QueryKey::Contacts(_) => QueryKind::Contacts,
        }
    }
}

/// A cached query result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedView {
    Folders(Vec<Folder>),
    Emails(Vec<Email>),
    Contacts(Vec<Contact>),
}

#[derive(Debug)]
struct Entry {
    view: CachedView,
    stale: bool,
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<QueryKey, Entry>,
    generations: [u64; 3],
}

/// Bounded LRU cache of query results with kind-wide invalidation.
///
/// Each kind carries a generation counter bumped on invalidation. A fetch
/// that started before an invalidation is stored as stale, so a reader never
/// sees pre-mutation data presented as fresh.
#[derive(Debug)]
pub struct ViewCache {
    inner: Mutex<Inner>,
}

impl ViewCache {
    /// Creates a cache holding at most `capacity` query results.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                generations: [0; 3],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached result for `key` if present and fresh.
    pub fn get(&self, key: &QueryKey) -> Option<CachedView> {
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(entry) if !entry.stale => {
                tracing::trace!(?key, "view cache hit");
                Some(entry.view.clone())
            }
            Some(_) => {
                tracing::debug!(?key, "view cache stale");
                None
            }
            None => None,
        }
    }

    /// Current generation of a query kind. Capture it before fetching and
    /// pass it to [`ViewCache::put`].
    pub fn generation(&self, kind: QueryKind) -> u64 {
        self.lock().generations[kind.index()]
    }

    /// Stores a fetched result. The entry is fresh only if no invalidation
    /// of its kind happened since `observed_generation` was read.
    pub fn put(&self, key: QueryKey, view: CachedView, observed_generation: u64) {
        let mut inner = self.lock();
        let stale = inner.generations[key.kind().index()] != observed_generation;
        if stale {
            tracing::debug!(?key, "fetch raced an invalidation; storing as stale");
        }
        inner.entries.put(key, Entry { view, stale });
    }

    /// Marks every entry of `kind` stale. Returns how many were marked.
    pub fn invalidate(&self, kind: QueryKind) -> usize {
        let mut inner = self.lock();
        inner.generations[kind.index()] += 1;

        let mut marked = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if key.kind() == kind && !entry.stale {
                entry.stale = true;
                marked += 1;
            }
        }
        tracing::debug!(?kind, marked, "views invalidated");
        marked
    }

    /// Whether `key` is cached and stale. `None` if it is not cached.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.lock().entries.peek(key).map(|entry| entry.stale)
    }

    /// Number of cached entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(64)
    }
}

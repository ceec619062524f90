//! Bounded, versioned LRU cache of computed paths.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};
use skulk_core::{Capabilities, LevelVersion, Mutation, MutationKind, Point};

use crate::path::Path;

/// Default number of cached paths.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Identity of a path query, minus the level version which the cache tracks
/// per entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub start: Point,
    pub goal: Point,
    pub caps: Capabilities,
}

impl PathKey {
    pub fn new(start: Point, goal: Point, caps: Capabilities) -> Self {
        Self { start, goal, caps }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    path: Path,
    version: LevelVersion,
    stamp: u64,
}

/// Outcome of [`PathCache::revalidate`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Revalidation {
    pub kept: usize,
    pub dropped: usize,
}

/// LRU map from [`PathKey`] to [`Path`], tagged with the level version it
/// was computed for.
///
/// The cache only ever serves and accepts entries for its current version.
/// A capacity of 0 disables caching.
#[derive(Debug)]
pub struct PathCache {
    capacity: usize,
    version: LevelVersion,
    entries: HashMap<PathKey, Entry>,
    // stamp -> key, oldest first
    lru: BTreeMap<u64, PathKey>,
    clock: u64,
}

impl PathCache {
    pub fn new(capacity: usize, version: LevelVersion) -> Self {
        Self {
            capacity,
            version,
            entries: HashMap::with_capacity(capacity.min(4096)),
            lru: BTreeMap::new(),
            clock: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The version entries are served for.
    #[inline]
    pub fn version(&self) -> LevelVersion {
        self.version
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up `key` at `version`, promoting it on hit.
    pub fn get(&mut self, key: &PathKey, version: LevelVersion) -> Option<Path> {
        if version != self.version {
            return None;
        }
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        if entry.version != version {
            let old = entry.stamp;
            self.entries.remove(key);
            self.lru.remove(&old);
            return None;
        }
        let old = std::mem::replace(&mut entry.stamp, stamp);
        let path = entry.path.clone();
        self.lru.remove(&old);
        self.lru.insert(stamp, *key);
        trace!("path cache hit {} -> {} [{}]", key.start, key.goal, key.caps);
        Some(path)
    }

    /// Store `path` for `key` at `version`, evicting the least recently used
    /// entry when full. Returns `false` if the insert was refused because
    /// `version` is not current or caching is disabled.
    pub fn insert(&mut self, key: PathKey, version: LevelVersion, path: Path) -> bool {
        if version != self.version || self.capacity == 0 {
            return false;
        }
        let stamp = self.tick();
        if let Some(old) = self.entries.insert(
            key,
            Entry {
                path,
                version,
                stamp,
            },
        ) {
            self.lru.remove(&old.stamp);
        } else if self.entries.len() > self.capacity {
            if let Some((_, victim)) = self.lru.pop_first() {
                self.entries.remove(&victim);
            }
        }
        self.lru.insert(stamp, key);
        debug_assert!(self.entries.len() <= self.capacity);
        debug_assert_eq!(self.entries.len(), self.lru.len());
        true
    }

    /// Whether `key` is cached (without promoting it).
    pub fn contains(&self, key: &PathKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry and move to `version`.
    pub fn purge_all(&mut self, version: LevelVersion) {
        let n = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.version = version;
        debug!("path cache purged {n} entries, now at {version}");
    }

    /// Carry entries over a single version bump.
    ///
    /// An entry survives when its capabilities make the change irrelevant,
    /// or when edges were only closed and its path neither steps on nor
    /// cuts diagonally past an affected cell. Survivors are re-tagged with the new version; everything else
    /// is dropped. A mutation that does not start at the current version, or
    /// that rebuilt the whole graph, purges the cache.
    pub fn revalidate(&mut self, m: &Mutation) -> Revalidation {
        if m.from != self.version || m.kind == MutationKind::Rebuilt {
            let dropped = self.entries.len();
            self.purge_all(m.to);
            return Revalidation { kept: 0, dropped };
        }

        let mut report = Revalidation::default();
        let lru = &mut self.lru;
        self.entries.retain(|key, entry| {
            let keep = m.bypassed_by(key.caps)
                || (m.kind == MutationKind::Closed && !entry.path.touches(&m.cells));
            if keep {
                entry.version = m.to;
                report.kept += 1;
            } else {
                lru.remove(&entry.stamp);
                report.dropped += 1;
            }
            keep
        });
        self.version = m.to;
        debug!(
            "path cache revalidated {} -> {} ({:?} {:?}): kept {}, dropped {}",
            m.from, m.to, m.concern, m.kind, report.kept, report.dropped
        );
        report
    }

    /// Keys in least-recently-used order.
    pub fn keys_by_age(&self) -> Vec<PathKey> {
        self.lru.values().copied().collect()
    }
}

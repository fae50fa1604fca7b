//! Stream lookup by id and title, backed by a [`StreamSource`].

use std::collections::HashMap;
use std::sync::Arc;

use conduit_storage::{StorageError, StreamRecord, StreamSource};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Default)]
struct Index {
    by_id: HashMap<String, Arc<StreamRecord>>,
    by_title: HashMap<String, Vec<Arc<StreamRecord>>>,
}

impl Index {
    fn insert(&mut self, stream: StreamRecord) {
        let stream = Arc::new(stream);
        self.by_title
            .entry(stream.title.clone())
            .or_default()
            .push(Arc::clone(&stream));
        self.by_id.insert(stream.id.clone(), stream);
    }

    fn remove(&mut self, id: &str) {
        if let Some(old) = self.by_id.remove(id) {
            if let Some(titled) = self.by_title.get_mut(&old.title) {
                titled.retain(|s| s.id != id);
                if titled.is_empty() {
                    self.by_title.remove(&old.title);
                }
            }
        }
    }
}

/// Read-mostly cache of stream records. Lookups never touch the source;
/// [`StreamCache::reload`] and [`StreamCache::refresh`] pull changes in.
pub struct StreamCache {
    source: Arc<dyn StreamSource>,
    index: RwLock<Index>,
}

impl StreamCache {
    /// An empty cache. Call [`StreamCache::reload`] to fill it.
    pub fn new(source: Arc<dyn StreamSource>) -> Self {
        StreamCache {
            source,
            index: RwLock::new(Index::default()),
        }
    }

    /// Replace the cache contents with everything the source holds.
    pub fn reload(&self) -> Result<usize, StorageError> {
        let streams = self.source.load_streams()?;
        let mut index = Index::default();
        let count = streams.len();
        for stream in streams {
            index.insert(stream);
        }
        *self.index.write() = index;
        debug!(streams = count, "stream cache reloaded");
        Ok(count)
    }

    /// Re-read the given streams; ids the source no longer knows are
    /// evicted.
    pub fn refresh(&self, ids: &[String]) -> Result<(), StorageError> {
        let mut fresh = Vec::with_capacity(ids.len());
        for id in ids {
            fresh.push((id, self.source.load_stream(id)?));
        }
        let mut index = self.index.write();
        for (id, stream) in fresh {
            index.remove(id);
            if let Some(stream) = stream {
                index.insert(stream);
            }
        }
        Ok(())
    }

    pub fn by_id(&self, id: &str) -> Option<Arc<StreamRecord>> {
        self.index.read().by_id.get(id).cloned()
    }

    /// Every stream with this title. Titles are not unique.
    pub fn by_title(&self, title: &str) -> Vec<Arc<StreamRecord>> {
        self.index
            .read()
            .by_title
            .get(title)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_storage::conformance::fixture;
    use conduit_storage::InMemoryStore;

    fn cache() -> (Arc<InMemoryStore>, StreamCache) {
        let store = Arc::new(InMemoryStore::from_bundle(fixture()));
        let cache = StreamCache::new(store.clone());
        cache.reload().unwrap();
        (store, cache)
    }

    #[test]
    fn lookups_by_id_and_title() {
        let (_, cache) = cache();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.by_id("s-audit").unwrap().title, "Audit");
        assert_eq!(cache.by_title("Audit")[0].id, "s-audit");
        assert!(cache.by_title("nope").is_empty());
    }

    #[test]
    fn refresh_picks_up_changes_and_deletions() {
        let (store, cache) = cache();
        store.save_stream(StreamRecord {
            id: "s-audit".to_string(),
            title: "Compliance".to_string(),
            remove_matches_from_default_stream: false,
        });
        store.delete_stream("s-default").unwrap();
        assert_eq!(cache.by_id("s-audit").unwrap().title, "Audit");

        cache
            .refresh(&["s-audit".to_string(), "s-default".to_string()])
            .unwrap();
        assert!(cache.by_title("Audit").is_empty());
        assert_eq!(cache.by_title("Compliance").len(), 1);
        assert!(cache.by_id("s-default").is_none());
    }
}

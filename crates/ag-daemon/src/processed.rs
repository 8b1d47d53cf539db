use std::collections::{HashSet, VecDeque};

/// Ids of posts already forwarded to the agent webhook.
///
/// Lives only in memory: a restart forgets everything and may forward the
/// same post again. Unbounded by default. With a capacity, ids beyond it are
/// evicted oldest first by [`evict_unlisted`], which never drops an id the
/// post store still lists; the set may therefore exceed its capacity while
/// the store holds more posts than that.
///
/// [`evict_unlisted`]: ProcessedPosts::evict_unlisted
#[derive(Debug, Default)]
pub struct ProcessedPosts {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: Option<usize>,
}

impl ProcessedPosts {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.filter(|c| *c > 0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Mark `id` processed. Returns `false` if it already was.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.ids.contains(&id) {
            return false;
        }

        if self.capacity.is_some() {
            self.order.push_back(id.clone());
        }
        self.ids.insert(id);
        true
    }

    /// Trim back towards capacity after a successful listing, oldest first,
    /// skipping ids present in `listed`. Returns how many ids were dropped.
    pub fn evict_unlisted(&mut self, listed: &HashSet<&str>) -> usize {
        let Some(cap) = self.capacity else {
            return 0;
        };
        let mut excess = self.ids.len().saturating_sub(cap);
        if excess == 0 {
            return 0;
        }

        let mut evicted = 0;
        let ids = &mut self.ids;
        self.order.retain(|id| {
            if excess > 0 && !listed.contains(id.as_str()) {
                ids.remove(id);
                excess -= 1;
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

//! 髒標記追蹤

use std::collections::HashSet;
use std::hash::Hash;

/// 髒標記追蹤器（記錄交易中被修改過的鍵）
#[derive(Debug, Clone)]
pub struct DirtyTracker<K> {
    dirty: HashSet<K>,
}

impl<K: Eq + Hash + Clone> DirtyTracker<K> {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self {
            dirty: HashSet::new(),
        }
    }

    /// 標記為髒，首次標記時回傳 true
    pub fn mark_dirty(&mut self, key: K) -> bool {
        self.dirty.insert(key)
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for DirtyTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

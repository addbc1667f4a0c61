//! Maps with nullable keys and nullable values.

use core::hash::Hash;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A map whose values may be null, with at most one extra entry for the null key.
///
/// On the wire, entries with a value and keys without one are counted and sent
/// separately, so a null value costs only its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Eq + Hash, V: Serialize",
    deserialize = "K: Deserialize<'de> + Eq + Hash, V: Deserialize<'de>"
))]
pub struct Map<K: Eq + Hash, V> {
    pub entries: FxHashMap<K, Option<V>>,
    /// `None`: no null key. `Some(None)`: a null key without a value.
    pub null_key: Option<Option<V>>,
}

impl<K: Eq + Hash, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> Map<K, V> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            null_key: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            null_key: None,
        }
    }

    #[inline]
    pub fn insert(&mut self, key: K, value: Option<V>) -> Option<Option<V>> {
        self.entries.insert(key, value)
    }

    #[inline]
    pub fn insert_null_key(&mut self, value: Option<V>) -> Option<Option<V>> {
        self.null_key.replace(value)
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&Option<V>> {
        self.entries.get(key)
    }

    /// Number of entries, the null key included.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.null_key.is_some())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries that carry a value, in iteration order.
    pub fn valued(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    /// Keys mapped to a null value, in iteration order.
    pub fn null_valued(&self) -> impl Iterator<Item = &K> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.is_none().then_some(k))
    }

    /// Keeps at most `max` entries besides the null key.
    ///
    /// Valued entries are kept first, in iteration order, then null-valued keys.
    pub fn truncate(&mut self, max: usize) {
        if self.entries.len() <= max {
            return;
        }

        let mut valued = 0;
        let n_valued = self.entries.values().filter(|v| v.is_some()).count();
        let null_budget = max.saturating_sub(n_valued);
        let mut nulls = 0;

        self.entries.retain(|_, v| {
            if v.is_some() {
                valued += 1;
                valued <= max
            } else {
                nulls += 1;
                nulls <= null_budget
            }
        });
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, Option<V>)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            null_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_key_counts_towards_len() {
        let mut map = Map::<u8, u8>::new();
        assert!(map.is_empty());

        map.insert_null_key(None);
        assert_eq!(map.len(), 1);
        assert!(!map.is_empty());
    }

    #[test]
    fn valued_and_null_valued_partition_entries() {
        let map: Map<u8, u8> = [(1, Some(10)), (2, None), (3, Some(30))]
            .into_iter()
            .collect();

        let mut valued: Vec<_> = map.valued().map(|(k, v)| (*k, *v)).collect();
        valued.sort_unstable();
        assert_eq!(valued, [(1, 10), (3, 30)]);
        assert_eq!(map.null_valued().copied().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn truncate_prefers_valued_entries() {
        let mut map: Map<u8, u8> = [(1, Some(1)), (2, None), (3, Some(3)), (4, None)]
            .into_iter()
            .collect();

        map.truncate(3);
        assert_eq!(map.entries.len(), 3);
        assert_eq!(map.valued().count(), 2);

        map.truncate(1);
        assert_eq!(map.entries.len(), 1);
        assert_eq!(map.null_valued().count(), 0);
    }
}

//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to a node in a [`SceneGraph`](crate::scene::SceneGraph) arena.
    ///
    /// Handles stay valid across unrelated inserts and removals; a handle to a
    /// destroyed node simply stops resolving.
    pub struct NodeId;
}

/// Insertion-ordered map from name to a copyable key.
///
/// Inserting an existing name replaces the entry in place (keeping its position)
/// and hands the displaced value back so the caller can release it.
#[derive(Debug, Clone)]
pub struct NamedEntries<K: Copy + PartialEq> {
    entries: Vec<(String, K)>,
}

impl<K: Copy + PartialEq> Default for NamedEntries<K> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: Copy + PartialEq> NamedEntries<K> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the displaced value on a name collision
    pub fn insert(&mut self, name: impl Into<String>, key: K) -> Option<K> {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(&mut slot.1, key));
        }
        self.entries.push((name, key));
        None
    }

    /// Look up by name
    pub fn get(&self, name: &str) -> Option<K> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
    }

    /// Remove by name
    pub fn remove(&mut self, name: &str) -> Option<K> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Remove by value, returning the name it was stored under
    pub fn remove_key(&mut self, key: K) -> Option<String> {
        let index = self.entries.iter().position(|(_, k)| *k == key)?;
        Some(self.entries.remove(index).0)
    }

    /// Name a value is stored under
    pub fn name_of(&self, key: K) -> Option<&str> {
        self.entries.iter().find(|(_, k)| *k == key).map(|(n, _)| n.as_str())
    }

    /// Values in insertion order
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = K> + '_ {
        self.entries.iter().map(|(_, k)| *k)
    }

    /// Name/value pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, K)> {
        self.entries.iter().map(|(n, k)| (n.as_str(), *k))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

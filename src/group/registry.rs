//! Group Registry
//!
//! Name → group lookup shared by the transport server, the metrics exporter
//! and application code. Groups are never removed once registered.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::{Getter, Group, GroupBuilder};
use crate::error::{Error, Result};

/// Concurrent registry of named groups
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: DashMap<String, Arc<Group>>,
}

impl GroupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a group with default options and register it
    pub fn create_group(
        &self,
        name: impl Into<String>,
        cache_bytes: usize,
        getter: impl Getter + 'static,
    ) -> Result<Arc<Group>> {
        self.register(GroupBuilder::new(name).cache_bytes(cache_bytes).getter(getter))
    }

    /// Build `builder` and register the result.
    ///
    /// Fails with [`Error::GroupExists`] if the name is taken; the existing
    /// group is left untouched.
    pub fn register(&self, builder: GroupBuilder) -> Result<Arc<Group>> {
        let group = builder.build()?;
        self.insert(group)
    }

    /// Register an already built group
    pub fn insert(&self, group: Group) -> Result<Arc<Group>> {
        match self.groups.entry(group.name().to_string()) {
            Entry::Occupied(entry) => Err(Error::GroupExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let group = Arc::new(group);
                entry.insert(Arc::clone(&group));
                info!(group = %group.name(), "Registered cache group");
                Ok(group)
            }
        }
    }

    /// Group named `name`, if registered
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`get`](Self::get), reporting absence as [`Error::GroupNotFound`]
    pub fn lookup(&self, name: &str) -> Result<Arc<Group>> {
        self.get(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    /// Registered group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All registered groups, sorted by name
    pub fn groups(&self) -> Vec<Arc<Group>> {
        let mut groups: Vec<Arc<Group>> = self.groups.iter().map(|e| Arc::clone(e.value())).collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GetterFn;
    use assert_matches::assert_matches;

    fn echo() -> impl Getter + 'static {
        GetterFn::new(|key: String| async move { Ok(key.into_bytes()) })
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = GroupRegistry::new();
        let group = registry.create_group("scores", 1024, echo()).unwrap();

        let found = registry.get("scores").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
        assert_eq!(found.get("Tom").await.unwrap().to_string(), "Tom");

        assert!(registry.get("missing").is_none());
        assert_matches!(registry.lookup("missing"), Err(Error::GroupNotFound(name)) if name == "missing");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = GroupRegistry::new();
        let first = registry.create_group("scores", 1024, echo()).unwrap();

        let result = registry.create_group("scores", 2048, echo());
        assert_matches!(result, Err(Error::GroupExists(name)) if name == "scores");

        let current = registry.get("scores").unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = GroupRegistry::new();
        assert!(registry.is_empty());
        for name in ["users", "avatars", "scores"] {
            registry.create_group(name, 0, echo()).unwrap();
        }

        assert_eq!(registry.names(), vec!["avatars", "scores", "users"]);
        let groups: Vec<_> = registry.groups().iter().map(|g| g.name().to_string()).collect();
        assert_eq!(groups, registry.names());
    }

    #[test]
    fn test_invalid_builder_not_registered() {
        let registry = GroupRegistry::new();
        assert_matches!(registry.register(GroupBuilder::new("no-loader")), Err(Error::Misuse(_)));
        assert!(registry.is_empty());
    }
}

//! Merging of session-scoped and user-scoped artifact names.

use std::collections::BTreeSet;

/// Collects artifact names from several enumerations and emits them
/// deduplicated and sorted.
#[derive(Debug, Default)]
pub struct ArtifactNames {
    names: BTreeSet<String>,
}

impl ArtifactNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_sorted(self) -> Vec<String> {
        self.names.into_iter().collect()
    }
}

impl Extend<String> for ArtifactNames {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.names.extend(iter);
    }
}

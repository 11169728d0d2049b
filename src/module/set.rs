//! Immutable module snapshots and structural diffs.
//!
//! A [`ModuleSet`] is keyed by module name and iterates in ascending name
//! order, so every diff and every plan derived from it is deterministic.

use std::collections::BTreeMap;

use crate::error::ModuleError;

use super::types::Module;

/// Immutable snapshot of modules keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet {
    modules: BTreeMap<String, Module>,
}

/// Structural delta between two module sets.
///
/// `created`, `updated` and `removed` never share a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Modules whose name is absent from the other set.
    pub created: Vec<Module>,
    /// Modules present in both sets with unequal values (new values).
    pub updated: Vec<Module>,
    /// Names present only in the other set.
    pub removed: Vec<String>,
}

impl ModuleSet {
    /// Returns the empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from a list of modules.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::DuplicateModule`] if two modules share a name,
    /// or [`ModuleError::EmptyName`] for a blank name.
    pub fn create(modules: impl IntoIterator<Item = Module>) -> Result<Self, ModuleError> {
        let mut map = BTreeMap::new();
        for module in modules {
            if module.name().trim().is_empty() {
                return Err(ModuleError::EmptyName);
            }
            let name = module.name().to_string();
            if map.insert(name.clone(), module).is_some() {
                return Err(ModuleError::DuplicateModule { name });
            }
        }
        Ok(Self { modules: map })
    }

    /// Looks up a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Returns true if a module with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if the set holds no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterates modules in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Iterates module names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Computes the delta that turns `other` into `self`.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Diff {
        let mut created = Vec::new();
        let mut updated = Vec::new();

        for (name, module) in &self.modules {
            match other.modules.get(name) {
                None => created.push(module.clone()),
                Some(existing) if existing != module => updated.push(module.clone()),
                Some(_) => {}
            }
        }

        let removed = other
            .modules
            .keys()
            .filter(|name| !self.modules.contains_key(*name))
            .cloned()
            .collect();

        Diff {
            created,
            updated,
            removed,
        }
    }

    /// Returns a new set with the diff applied.
    #[must_use]
    pub fn apply_diff(&self, diff: &Diff) -> Self {
        let mut modules = self.modules.clone();
        for name in &diff.removed {
            modules.remove(name);
        }
        for module in diff.created.iter().chain(&diff.updated) {
            modules.insert(module.name().to_string(), module.clone());
        }
        Self { modules }
    }
}

impl Diff {
    /// Returns true if the diff carries no change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed modules.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.created.len() + self.updated.len() + self.removed.len()
    }

    /// Returns true if the named module is touched by this diff.
    #[must_use]
    pub fn touches(&self, name: &str) -> bool {
        self.removed.iter().any(|n| n == name)
            || self
                .created
                .iter()
                .chain(&self.updated)
                .any(|m| m.name() == name)
    }
}

impl<'a> IntoIterator for &'a ModuleSet {
    type Item = &'a Module;
    type IntoIter = std::collections::btree_map::Values<'a, String, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.values()
    }
}

impl std::fmt::Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} removed",
            self.created.len(),
            self.updated.len(),
            self.removed.len()
        )
    }
}

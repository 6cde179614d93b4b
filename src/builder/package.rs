use indexmap::IndexSet;

use crate::builder::EntityId;

/// Namespace container. Holds the ids of the entities currently assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub members: IndexSet<EntityId>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: IndexSet::new() }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Namespace part of a qualified name: `A\B\C` gives `A\B`.
pub fn namespace_of(name: &str) -> Option<&str> {
    let name = name.trim_start_matches('\\');
    name.rfind('\\').map(|pos| &name[..pos])
}

//! The fixed enumeration of predictable ballet actions.

use std::sync::Arc;

/// Ordered, immutable mapping from class id to action name.
///
/// Built once at model-load time and shared read-only by every in-flight
/// request; both models predict over the same catalog.
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    names: Arc<[String]>,
}

impl ClassCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: names.into(),
        }
    }

    /// Number of predictable classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Action name for `class_id`, if in range.
    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    /// All action names in class-id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl PartialEq for ClassCatalog {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

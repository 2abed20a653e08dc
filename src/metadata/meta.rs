//! Free-form meta attributes attached to mapping elements.
//!
//! `hbm.xml` documents can decorate the document, classes and attributes with
//! `<meta attribute="name">value</meta>` elements. Each level gets its own
//! [`MetaAttributeContext`] chained to the enclosing level, so a class sees the attributes of
//! its document and an attribute sees those of its class. Attributes declared with
//! `inherit="false"` are visible on their own level only.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use ormbind::metadata::meta::{MetaAttribute, MetaAttributeContext};
//!
//! let document = Arc::new(MetaAttributeContext::new());
//! document.add(MetaAttribute::new("author", "ada"));
//!
//! let class = MetaAttributeContext::with_parent(document);
//! assert_eq!(class.get_meta_attribute("author").unwrap().value(), Some("ada"));
//! assert!(class.get_local_meta_attribute("author").is_none());
//! ```

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;

/// A named, possibly multi-valued meta attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaAttribute {
    /// Attribute name
    pub name: String,
    /// Values in declaration order
    pub values: Vec<String>,
    /// Whether nested contexts see this attribute
    pub inheritable: bool,
}

impl MetaAttribute {
    /// Create an inheritable attribute with a single value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        MetaAttribute {
            name: name.into(),
            values: vec![value.into()],
            inheritable: true,
        }
    }

    /// Mark the attribute as visible on its own level only
    #[must_use]
    pub fn local_only(mut self) -> Self {
        self.inheritable = false;
        self
    }

    /// The first value
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Returns true if more than one value was declared
    #[must_use]
    pub fn is_multi_valued(&self) -> bool {
        self.values.len() > 1
    }
}

/// A chained store of [`MetaAttribute`]s.
///
/// Writes only ever touch the local level; reads fall back to the parent chain. The local
/// store is concurrent so already-built contexts can be shared while a nested level is
/// still being populated.
#[derive(Debug, Default)]
pub struct MetaAttributeContext {
    parent: Option<Arc<MetaAttributeContext>>,
    attributes: DashMap<String, MetaAttribute>,
}

impl MetaAttributeContext {
    /// Create a root context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that delegates to `parent`
    #[must_use]
    pub fn with_parent(parent: Arc<MetaAttributeContext>) -> Self {
        MetaAttributeContext {
            parent: Some(parent),
            attributes: DashMap::new(),
        }
    }

    /// The enclosing context
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<MetaAttributeContext>> {
        self.parent.as_ref()
    }

    /// Insert or overwrite an attribute on this level
    pub fn add(&self, attribute: MetaAttribute) {
        self.attributes.insert(attribute.name.clone(), attribute);
    }

    /// Look up an attribute on this level, then on the enclosing levels
    #[must_use]
    pub fn get_meta_attribute(&self, key: &str) -> Option<MetaAttribute> {
        self.get_local_meta_attribute(key)
            .or_else(|| self.parent.as_ref().and_then(|p| p.inherited(key)))
    }

    /// Look up an attribute on this level only
    #[must_use]
    pub fn get_local_meta_attribute(&self, key: &str) -> Option<MetaAttribute> {
        self.attributes.get(key).map(|entry| entry.value().clone())
    }

    /// Names visible from this level, local and inherited
    #[must_use]
    pub fn get_keys(&self) -> HashSet<String> {
        let mut keys = self.get_local_keys();
        let mut current = self.parent.as_deref();
        while let Some(context) = current {
            keys.extend(
                context
                    .attributes
                    .iter()
                    .filter(|entry| entry.value().inheritable)
                    .map(|entry| entry.key().clone()),
            );
            current = context.parent.as_deref();
        }
        keys
    }

    /// Names declared on this level
    #[must_use]
    pub fn get_local_keys(&self) -> HashSet<String> {
        self.attributes
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn inherited(&self, key: &str) -> Option<MetaAttribute> {
        match self.attributes.get(key) {
            Some(entry) if entry.value().inheritable => Some(entry.value().clone()),
            Some(_) => None,
            None => self.parent.as_ref().and_then(|p| p.inherited(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_lookup() {
        let parent = Arc::new(MetaAttributeContext::new());
        parent.add(MetaAttribute::new("x", "v"));

        let child = MetaAttributeContext::with_parent(parent);
        assert_eq!(child.get_meta_attribute("x").unwrap().value(), Some("v"));
        assert!(child.get_local_meta_attribute("x").is_none());
        assert!(child.get_meta_attribute("missing").is_none());
    }

    #[test]
    fn test_local_overrides_and_last_write_wins() {
        let parent = Arc::new(MetaAttributeContext::new());
        parent.add(MetaAttribute::new("x", "parent"));

        let child = MetaAttributeContext::with_parent(parent.clone());
        child.add(MetaAttribute::new("x", "first"));
        child.add(MetaAttribute::new("x", "second"));

        assert_eq!(child.get_meta_attribute("x").unwrap().value(), Some("second"));
        assert_eq!(parent.get_meta_attribute("x").unwrap().value(), Some("parent"));
    }

    #[test]
    fn test_non_inheritable_attribute_stays_local() {
        let root = Arc::new(MetaAttributeContext::new());
        root.add(MetaAttribute::new("scope", "root").local_only());
        root.add(MetaAttribute::new("author", "ada"));

        let middle = Arc::new(MetaAttributeContext::with_parent(root.clone()));
        let leaf = MetaAttributeContext::with_parent(middle);

        assert!(root.get_meta_attribute("scope").is_some());
        assert!(leaf.get_meta_attribute("scope").is_none());
        assert_eq!(leaf.get_meta_attribute("author").unwrap().value(), Some("ada"));
    }

    #[test]
    fn test_keys() {
        let parent = Arc::new(MetaAttributeContext::new());
        parent.add(MetaAttribute::new("a", "1"));
        parent.add(MetaAttribute::new("b", "2"));

        let child = MetaAttributeContext::with_parent(parent);
        child.add(MetaAttribute::new("b", "3"));
        child.add(MetaAttribute::new("c", "4"));

        let local = child.get_local_keys();
        assert_eq!(local.len(), 2);
        assert!(local.contains("c"));

        let all = child.get_keys();
        assert_eq!(all.len(), 3);
        assert!(all.contains("a"));
    }
}

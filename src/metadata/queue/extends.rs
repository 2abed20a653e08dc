use std::{fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::{
    metadata::{
        processor::MappingOutcome,
        queue::MetadataSourceQueue,
        source::{qualify_class_name, HbmDocument},
        MetadataImplementor,
    },
    Error::UnresolvedExtends,
    Result,
};

/// A document waiting for a superclass named by `extends`.
#[derive(Clone)]
pub struct ExtendsQueueEntry {
    /// The superclass name as written
    pub explicit_name: String,
    /// Default package of the document
    pub mapping_package: Option<String>,
    /// The deferred document
    pub document: Arc<HbmDocument>,
    /// Entity names declared by the document
    pub entity_names: IndexSet<String>,
}

impl ExtendsQueueEntry {
    /// The superclass name, with the mapping package appended in brackets when present
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.mapping_package {
            Some(package) => format!("{}[{}]", self.explicit_name, package),
            None => self.explicit_name.clone(),
        }
    }

    fn is_resolvable(&self, metadata: &dyn MetadataImplementor) -> bool {
        let super_bound = metadata.is_entity_bound(&self.explicit_name)
            || metadata.is_entity_bound(&qualify_class_name(
                &self.explicit_name,
                self.mapping_package.as_deref(),
            ));
        super_bound
            && self
                .entity_names
                .iter()
                .any(|name| !metadata.is_entity_bound(name))
    }
}

impl fmt::Debug for ExtendsQueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendsQueueEntry")
            .field("explicit_name", &self.explicit_name)
            .field("mapping_package", &self.mapping_package)
            .field("document", &self.document.origin().name)
            .field("entity_names", &self.entity_names)
            .finish()
    }
}

/// Documents deferred until the superclasses they extend are bound.
///
/// Entries are kept in submission order. When several entries are resolvable at once the
/// earliest submitted one is processed first.
#[derive(Debug, Default)]
pub struct ExtendsQueue {
    entries: IndexMap<(u64, String), ExtendsQueueEntry>,
}

impl ExtendsQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; an entry for the same document and superclass is replaced
    pub fn add(&mut self, entry: ExtendsQueueEntry) {
        self.entries
            .insert((entry.document.id(), entry.explicit_name.clone()), entry);
    }

    /// Number of pending entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries in submission order
    pub fn entries(&self) -> impl Iterator<Item = &ExtendsQueueEntry> {
        self.entries.values()
    }

    /// Bind deferred documents until no entry can make progress
    ///
    /// Repeatedly takes the first entry whose superclass is bound and whose document still
    /// declares an unbound entity, and binds its document. Other entries for the same
    /// document are taken with it; binding re-queues whatever is still missing.
    ///
    /// ## Arguments
    /// * 'sources'     - The source queue that binds documents
    /// * 'metadata'    - Bound metadata, consulted for resolvability
    /// * 'bind'        - The hbm binder
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedExtends`] naming every entry left once no entry can
    /// make progress. The entries stay queued.
    pub fn process_extends_queue<F>(
        &mut self,
        sources: &mut MetadataSourceQueue,
        metadata: &dyn MetadataImplementor,
        mut bind: F,
    ) -> Result<()>
    where
        F: FnMut(&HbmDocument) -> Result<MappingOutcome>,
    {
        debug!("processing extends queue");

        while let Some(entry) = self.take_resolvable(metadata) {
            debug!(
                "Resolving {} from {}",
                entry.explicit_name,
                entry.document.origin().name
            );
            let deferred =
                sources.process_hbm_xml(&entry.document, &entry.entity_names, &mut bind)?;
            for pending in deferred {
                self.add(pending);
            }
        }

        if self.entries.is_empty() {
            return Ok(());
        }

        let unresolved = self
            .entries
            .values()
            .map(ExtendsQueueEntry::describe)
            .collect::<Vec<_>>()
            .join(",");
        Err(UnresolvedExtends(format!(
            "Following super classes referenced in extends not found: {unresolved}"
        )))
    }

    fn take_resolvable(&mut self, metadata: &dyn MetadataImplementor) -> Option<ExtendsQueueEntry> {
        let index = self
            .entries
            .values()
            .position(|entry| entry.is_resolvable(metadata))?;
        let (_, entry) = self.entries.shift_remove_index(index)?;

        let document_id = entry.document.id();
        self.entries.retain(|(id, _), _| *id != document_id);
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        metadata::{
            collector::MetadataCollector, config::MetadataOptions,
            naming::DefaultNamingStrategy, typesystem::ClassRegistry,
        },
        test::{create_entity_binding, create_hbm_document},
        Error,
    };

    fn collector() -> MetadataCollector {
        MetadataCollector::new(
            MetadataOptions::default(),
            Arc::new(DefaultNamingStrategy),
            Arc::new(ClassRegistry::new()),
        )
    }

    fn entry(explicit: &str, subclass: &str) -> ExtendsQueueEntry {
        let document = create_hbm_document(&format!(
            r#"<hibernate-mapping><subclass name="{subclass}" extends="{explicit}"/></hibernate-mapping>"#
        ));
        ExtendsQueueEntry {
            explicit_name: explicit.to_string(),
            mapping_package: None,
            entity_names: document.entity_names().unwrap(),
            document,
        }
    }

    /// Binds every entity of the document, as if each document only declared subclasses
    /// whose superclass is bound.
    fn bind_all<'a>(
        collector: &'a MetadataCollector,
        order: &'a std::cell::RefCell<Vec<String>>,
    ) -> impl FnMut(&HbmDocument) -> Result<MappingOutcome> + 'a {
        move |document| {
            for name in document.entity_names()? {
                order.borrow_mut().push(name.clone());
                collector.add_entity(create_entity_binding(&name, &name))?;
            }
            Ok(MappingOutcome::Bound)
        }
    }

    #[test]
    fn test_chain_resolves_in_dependency_order() {
        let collector = collector();
        let order = std::cell::RefCell::new(Vec::new());
        collector.add_entity(create_entity_binding("a.A", "A")).unwrap();

        let mut queue = ExtendsQueue::new();
        queue.add(entry("a.B", "a.C"));
        queue.add(entry("a.A", "a.B"));

        let mut sources = MetadataSourceQueue::new();
        queue
            .process_extends_queue(&mut sources, &collector, bind_all(&collector, &order))
            .unwrap();

        assert_eq!(queue.len(), 0);
        assert_eq!(*order.borrow(), vec!["a.B", "a.C"]);
    }

    #[test]
    fn test_unresolved_entries_stay_queued() {
        let collector = collector();
        let order = std::cell::RefCell::new(Vec::new());
        let mut queue = ExtendsQueue::new();
        queue.add(entry("a.B", "a.C"));
        let mut missing = entry("Base", "p.Sub");
        missing.mapping_package = Some("p".to_string());
        queue.add(missing);

        let mut sources = MetadataSourceQueue::new();
        let err = queue
            .process_extends_queue(&mut sources, &collector, bind_all(&collector, &order))
            .unwrap_err();

        match err {
            Error::UnresolvedExtends(message) => {
                assert_eq!(
                    message,
                    "Following super classes referenced in extends not found: a.B,Base[p]"
                );
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(queue.len(), 2);
        assert!(order.borrow().is_empty());
    }

    #[test]
    fn test_entry_for_bound_document_is_skipped() {
        let collector = collector();
        collector.add_entity(create_entity_binding("a.A", "A")).unwrap();
        collector.add_entity(create_entity_binding("a.B", "B")).unwrap();

        let bound = entry("a.A", "a.B");
        assert!(!bound.is_resolvable(&collector));
        let pending = entry("a.A", "a.X");
        assert!(pending.is_resolvable(&collector));
    }
}

use std::{collections::HashMap, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::{
    metadata::{
        processor::MappingOutcome,
        queue::{order_and_fill_hierarchy, ExtendsQueueEntry},
        source::{HbmDocument, MetadataSourceType},
        typesystem::{ClassDescriptorRc, ClassRegistry},
    },
    Error::InvalidMapping,
    Result,
};

/// Pending mapping sources of both kinds, bound in dependency order.
///
/// `hbm.xml` documents are kept in submission order together with the entity names they
/// declare. Annotated classes are kept as submitted and linearized by inheritance when they
/// are processed. An entity bound by one kind of source is removed from the other kind's
/// pending set, keyed by entity name.
#[derive(Default)]
pub struct MetadataSourceQueue {
    hbm_documents: IndexMap<u64, (Arc<HbmDocument>, IndexSet<String>)>,
    hbm_xref: HashMap<String, u64>,
    annotated_classes: Vec<ClassDescriptorRc>,
    annotated_xref: HashMap<String, ClassDescriptorRc>,
}

impl MetadataSourceQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an `hbm.xml` document
    ///
    /// # Errors
    /// Returns a mapping error if an entity element of the document has no name.
    pub fn add(&mut self, document: Arc<HbmDocument>) -> Result<()> {
        let entity_names = document.entity_names()?;
        for name in &entity_names {
            self.hbm_xref.insert(name.clone(), document.id());
        }
        self.hbm_documents
            .insert(document.id(), (document, entity_names));
        Ok(())
    }

    /// Queue an annotated class
    pub fn add_annotated_class(&mut self, class: ClassDescriptorRc) {
        self.annotated_classes.push(class);
    }

    /// Drop queued classes that are neither entities nor mapped superclasses, and index the
    /// entities by name
    pub fn sync_annotated_classes(&mut self) {
        let mut xref = HashMap::with_capacity(self.annotated_classes.len());
        self.annotated_classes.retain(|class| {
            if class.is_entity() {
                xref.insert(class.name.clone(), class.clone());
                true
            } else if class.is_mapped_superclass() {
                true
            } else {
                debug!(
                    "Ignoring class {} : neither @Entity nor @MappedSuperclass",
                    class.name
                );
                false
            }
        });
        self.annotated_xref = xref;
    }

    /// Drop every source that a source of the `first` kind already maps
    ///
    /// Sources are matched by entity name. With `hbm.xml` first, annotated entities declared by
    /// a document are dropped. With annotations first, a document declaring an annotated
    /// entity is dropped whole.
    pub fn remove_superseded(&mut self, first: MetadataSourceType) {
        self.sync_annotated_classes();
        match first {
            MetadataSourceType::Hbm => {
                let names: Vec<String> = self.hbm_xref.keys().cloned().collect();
                for name in names {
                    self.remove_annotated_class(&name);
                }
            }
            MetadataSourceType::Class => {
                let names: Vec<String> = self.annotated_xref.keys().cloned().collect();
                for name in names {
                    self.remove_document_declaring(&name);
                }
            }
        }
    }

    /// Snapshot of the documents and annotated classes still queued
    #[must_use]
    pub fn pending_sources(&self) -> (Vec<Arc<HbmDocument>>, Vec<ClassDescriptorRc>) {
        (
            self.hbm_documents
                .values()
                .map(|(document, _)| document.clone())
                .collect(),
            self.annotated_classes.clone(),
        )
    }

    fn remove_annotated_class(&mut self, entity_name: &str) {
        if let Some(class) = self.annotated_xref.remove(entity_name) {
            debug!("Annotated class {} is mapped by hbm.xml", class.name);
            self.annotated_classes
                .retain(|queued| !Arc::ptr_eq(queued, &class));
        }
    }

    fn remove_document_declaring(&mut self, entity_name: &str) {
        let Some(document_id) = self.hbm_xref.remove(entity_name) else {
            return;
        };
        if let Some((document, entity_names)) = self.hbm_documents.shift_remove(&document_id) {
            debug!(
                "Document {} is mapped by annotated class {}",
                document.origin().name,
                entity_name
            );
            for name in entity_names {
                self.hbm_xref.remove(&name);
            }
        }
    }

    /// Bind one `hbm.xml` document
    ///
    /// A bound document removes the annotated classes sharing its entity names from the
    /// queue. A deferred document yields one extends entry per missing superclass.
    ///
    /// ## Arguments
    /// * 'document'        - The document
    /// * 'entity_names'    - Entity names the document declares
    /// * 'bind'            - The hbm binder
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMapping`] wrapping whatever the binder raised.
    pub fn process_hbm_xml<F>(
        &mut self,
        document: &Arc<HbmDocument>,
        entity_names: &IndexSet<String>,
        bind: &mut F,
    ) -> Result<Vec<ExtendsQueueEntry>>
    where
        F: FnMut(&HbmDocument) -> Result<MappingOutcome>,
    {
        let outcome = bind(document).map_err(|error| InvalidMapping {
            origin_type: document.origin().origin_type,
            origin_name: document.origin().name.clone(),
            source: Box::new(error),
        })?;

        match outcome {
            MappingOutcome::Bound => {
                for name in entity_names {
                    self.remove_annotated_class(name);
                }
                Ok(Vec::new())
            }
            MappingOutcome::Deferred(missing) => Ok(missing
                .into_iter()
                .map(|explicit_name| ExtendsQueueEntry {
                    explicit_name,
                    mapping_package: document.default_package().map(str::to_string),
                    document: document.clone(),
                    entity_names: entity_names.clone(),
                })
                .collect()),
        }
    }

    /// Bind every queued source, one kind after the other
    ///
    /// ## Arguments
    /// * 'order'       - Which kind of source binds first
    /// * 'classes'     - Registry used to linearize annotated classes
    /// * 'max_depth'   - Longest superclass chain accepted
    /// * 'bind_hbm'    - The hbm binder
    /// * 'bind_class'  - The annotation binder
    ///
    /// # Errors
    /// Returns the first error raised by either binder or by the linearization.
    pub fn process_metadata<H, C>(
        &mut self,
        order: [MetadataSourceType; 2],
        classes: &ClassRegistry,
        max_depth: usize,
        mut bind_hbm: H,
        mut bind_class: C,
    ) -> Result<Vec<ExtendsQueueEntry>>
    where
        H: FnMut(&HbmDocument) -> Result<MappingOutcome>,
        C: FnMut(&ClassDescriptorRc) -> Result<()>,
    {
        self.sync_annotated_classes();
        let mut deferred = Vec::new();
        for source_type in order {
            match source_type {
                MetadataSourceType::Hbm => {
                    deferred.extend(self.process_hbm_xmls(&mut bind_hbm)?);
                }
                MetadataSourceType::Class => {
                    self.process_annotated_classes(classes, max_depth, &mut bind_class)?;
                }
            }
        }
        Ok(deferred)
    }

    fn process_hbm_xmls<F>(&mut self, bind: &mut F) -> Result<Vec<ExtendsQueueEntry>>
    where
        F: FnMut(&HbmDocument) -> Result<MappingOutcome>,
    {
        debug!("Processing hbm.xml files");
        let documents = std::mem::take(&mut self.hbm_documents);
        self.hbm_xref.clear();

        let mut deferred = Vec::new();
        for (document, entity_names) in documents.into_values() {
            deferred.extend(self.process_hbm_xml(&document, &entity_names, bind)?);
        }
        Ok(deferred)
    }

    fn process_annotated_classes<F>(
        &mut self,
        classes: &ClassRegistry,
        max_depth: usize,
        bind: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&ClassDescriptorRc) -> Result<()>,
    {
        debug!("Process annotated classes");
        let ordered = order_and_fill_hierarchy(&self.annotated_classes, classes, max_depth)?;
        self.annotated_classes.clear();
        self.annotated_xref.clear();

        for class in &ordered {
            bind(class)?;
            self.remove_document_declaring(&class.name);
        }
        Ok(())
    }

    /// Returns true if neither documents nor annotated classes are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hbm_documents.is_empty() && self.annotated_classes.is_empty()
    }

    /// Number of pending documents
    #[must_use]
    pub fn pending_documents(&self) -> usize {
        self.hbm_documents.len()
    }

    /// Number of pending annotated classes
    #[must_use]
    pub fn pending_classes(&self) -> usize {
        self.annotated_classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::typesystem::{ClassAnnotation, ClassDescriptor},
        test::create_hbm_document,
        Error,
    };

    #[test]
    fn test_sync_filters_plain_classes() {
        let mut queue = MetadataSourceQueue::new();
        queue.add_annotated_class(Arc::new(
            ClassDescriptor::new("a.Order").annotated(ClassAnnotation::Entity { name: None }),
        ));
        queue.add_annotated_class(Arc::new(ClassDescriptor::new("a.Helper")));
        queue.sync_annotated_classes();
        assert_eq!(queue.pending_classes(), 1);
        assert!(!queue.is_empty());
    }

    #[test]
    fn test_hbm_binding_removes_annotated_duplicate() {
        let mut queue = MetadataSourceQueue::new();
        let document = create_hbm_document(
            r#"<hibernate-mapping package="a"><class name="Order"><id name="id"/></class></hibernate-mapping>"#,
        );
        queue.add(document).unwrap();
        queue.add_annotated_class(Arc::new(
            ClassDescriptor::new("a.Order").annotated(ClassAnnotation::Entity { name: None }),
        ));

        let mut hbm_bound = Vec::new();
        let mut classes_bound = Vec::new();
        let deferred = queue
            .process_metadata(
                [MetadataSourceType::Hbm, MetadataSourceType::Class],
                &ClassRegistry::new(),
                16,
                |document| {
                    hbm_bound.push(document.id());
                    Ok(MappingOutcome::Bound)
                },
                |class| {
                    classes_bound.push(class.name.clone());
                    Ok(())
                },
            )
            .unwrap();

        assert!(deferred.is_empty());
        assert_eq!(hbm_bound.len(), 1);
        assert!(classes_bound.is_empty());
        assert!(queue.is_empty());
    }

    fn queue_with_order_in_both_kinds() -> MetadataSourceQueue {
        let mut queue = MetadataSourceQueue::new();
        queue
            .add(create_hbm_document(
                r#"<hibernate-mapping package="a">
                    <class name="Order"><id name="id"/></class>
                    <class name="Line"><id name="id"/></class>
                </hibernate-mapping>"#,
            ))
            .unwrap();
        queue.add_annotated_class(Arc::new(
            ClassDescriptor::new("a.Order").annotated(ClassAnnotation::Entity { name: None }),
        ));
        queue.add_annotated_class(Arc::new(
            ClassDescriptor::new("a.Customer").annotated(ClassAnnotation::Entity { name: None }),
        ));
        queue
    }

    #[test]
    fn test_hbm_first_drops_annotated_entity_up_front() {
        let mut queue = queue_with_order_in_both_kinds();
        queue.remove_superseded(MetadataSourceType::Hbm);

        let (documents, classes) = queue.pending_sources();
        assert_eq!(documents.len(), 1);
        let names: Vec<&str> = classes.iter().map(|class| class.name.as_str()).collect();
        assert_eq!(names, vec!["a.Customer"]);
    }

    #[test]
    fn test_annotations_first_drops_whole_document_up_front() {
        let mut queue = queue_with_order_in_both_kinds();
        queue.remove_superseded(MetadataSourceType::Class);

        let (documents, classes) = queue.pending_sources();
        assert!(documents.is_empty());
        assert_eq!(classes.len(), 2);
        assert_eq!(queue.pending_documents(), 0);
    }

    #[test]
    fn test_mapped_superclass_is_not_replaced_by_document() {
        let mut queue = MetadataSourceQueue::new();
        queue
            .add(create_hbm_document(
                r#"<hibernate-mapping package="a"><class name="Base"><id name="id"/></class></hibernate-mapping>"#,
            ))
            .unwrap();
        queue.add_annotated_class(Arc::new(
            ClassDescriptor::new("a.Base").annotated(ClassAnnotation::MappedSuperclass),
        ));
        queue.remove_superseded(MetadataSourceType::Hbm);
        assert_eq!(queue.pending_classes(), 1);
    }

    #[test]
    fn test_annotations_first_removes_document() {
        let mut queue = MetadataSourceQueue::new();
        queue
            .add(create_hbm_document(
                r#"<hibernate-mapping package="a"><class name="Order"><id name="id"/></class></hibernate-mapping>"#,
            ))
            .unwrap();
        queue.add_annotated_class(Arc::new(
            ClassDescriptor::new("a.Order").annotated(ClassAnnotation::Entity { name: None }),
        ));

        let mut hbm_bound = 0;
        queue
            .process_metadata(
                [MetadataSourceType::Class, MetadataSourceType::Hbm],
                &ClassRegistry::new(),
                16,
                |_| {
                    hbm_bound += 1;
                    Ok(MappingOutcome::Bound)
                },
                |_| Ok(()),
            )
            .unwrap();
        assert_eq!(hbm_bound, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_errors_are_wrapped_with_origin() {
        let mut queue = MetadataSourceQueue::new();
        let document = create_hbm_document(
            r#"<hibernate-mapping><class name="a.Order"/></hibernate-mapping>"#,
        );
        let names = document.entity_names().unwrap();
        let err = queue
            .process_hbm_xml(&document, &names, &mut |_| Err(mapping_error!("boom")))
            .unwrap_err();
        match err {
            Error::InvalidMapping {
                origin_name,
                source,
                ..
            } => {
                assert_eq!(origin_name, "test.hbm.xml");
                assert!(source.to_string().contains("boom"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_deferred_document_yields_entries() {
        let mut queue = MetadataSourceQueue::new();
        let document = create_hbm_document(
            r#"<hibernate-mapping package="p"><subclass name="Bar" extends="Foo"/></hibernate-mapping>"#,
        );
        let names = document.entity_names().unwrap();
        let entries = queue
            .process_hbm_xml(&document, &names, &mut |_| {
                Ok(MappingOutcome::Deferred(vec!["Foo".to_string()]))
            })
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].explicit_name, "Foo");
        assert_eq!(entries[0].mapping_package.as_deref(), Some("p"));
        assert!(entries[0].entity_names.contains("p.Bar"));
    }
}

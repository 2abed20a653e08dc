//! Entry point collecting mapping sources and running the binding pipeline.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ormbind::prelude::*;
//!
//! let mut sources = MetadataSources::new();
//! sources.add_hbm_xml_str(
//!     r#"<hibernate-mapping package="shop">
//!         <class name="Order"><id name="id" type="long"/></class>
//!     </hibernate-mapping>"#,
//!     "order.hbm.xml",
//! )?;
//!
//! let metadata = sources.build_metadata()?;
//! assert!(metadata.get_entity_binding("shop.Order").is_some());
//! # Ok::<(), ormbind::Error>(())
//! ```

use std::{path::Path, sync::Arc};

use log::debug;

use crate::{
    metadata::{
        binding::{CacheRegionDefinition, CacheRegionType},
        collector::MetadataCollector,
        config::MetadataOptions,
        context::BindingContext,
        defaults::GlobalMappingDefaults,
        model::Metadata,
        naming::{DefaultNamingStrategy, NamingStrategy},
        processor::{
            bind_back_references, AnnotationMetadataSourceProcessor, BindingPhase,
            HbmMetadataSourceProcessor, MetadataSourceProcessor, PhaseGraph,
        },
        queue::{ExtendsQueue, MetadataSourceQueue},
        source::{HbmDocument, MetadataSourceType, Origin, OriginType},
        typesystem::{ClassDescriptor, ClassDescriptorRc, ClassRegistry},
        MetadataImplementor,
    },
    Error::{self, InvalidMapping},
    Result,
};

/// Mapping sources and settings of one binding run.
///
/// Sources are only parsed when added; nothing is bound until
/// [`MetadataSources::build_metadata`], which may be called repeatedly and always starts from
/// scratch.
pub struct MetadataSources {
    options: MetadataOptions,
    naming: Arc<dyn NamingStrategy>,
    classes: Arc<ClassRegistry>,
    documents: Vec<Arc<HbmDocument>>,
    annotated_classes: Vec<ClassDescriptorRc>,
    cache_regions: Vec<CacheRegionDefinition>,
}

impl Default for MetadataSources {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataSources {
    /// Create an empty set of sources with default options and naming
    #[must_use]
    pub fn new() -> Self {
        MetadataSources {
            options: MetadataOptions::default(),
            naming: Arc::new(DefaultNamingStrategy),
            classes: Arc::new(ClassRegistry::new()),
            documents: Vec::new(),
            annotated_classes: Vec::new(),
            cache_regions: Vec::new(),
        }
    }

    /// Replace the options
    #[must_use]
    pub fn with_options(mut self, options: MetadataOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the naming strategy
    #[must_use]
    pub fn with_naming_strategy(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = naming;
        self
    }

    /// The options in effect
    #[must_use]
    pub fn options(&self) -> &MetadataOptions {
        &self.options
    }

    /// Classes known to this run, annotated or not
    #[must_use]
    pub fn class_registry(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    /// Parse and add an `hbm.xml` document held in memory
    ///
    /// ## Arguments
    /// * 'xml'     - The document text
    /// * 'name'    - Label reported in errors
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMapping`] if the document cannot be parsed.
    pub fn add_hbm_xml_str(&mut self, xml: &str, name: &str) -> Result<&mut Self> {
        let origin = Origin::new(OriginType::String, name);
        let document = HbmDocument::parse(xml, origin.clone()).map_err(|error| InvalidMapping {
            origin_type: origin.origin_type,
            origin_name: origin.name,
            source: Box::new(error),
        })?;
        Ok(self.add_document(Arc::new(document)))
    }

    /// Read, parse and add an `hbm.xml` file
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMapping`] if the file cannot be read or parsed.
    pub fn add_file(&mut self, path: &Path) -> Result<&mut Self> {
        let document = HbmDocument::from_file(path).map_err(|error| InvalidMapping {
            origin_type: OriginType::File,
            origin_name: path.display().to_string(),
            source: Box::new(error),
        })?;
        Ok(self.add_document(Arc::new(document)))
    }

    /// Add an already parsed document
    pub fn add_document(&mut self, document: Arc<HbmDocument>) -> &mut Self {
        self.documents.push(document);
        self
    }

    /// Make a class known without binding it, e.g. a superclass or embeddable
    pub fn register_class(&mut self, class: ClassDescriptor) -> &mut Self {
        self.classes.register(class);
        self
    }

    /// Register a class and queue it for annotation binding
    pub fn add_annotated_class(&mut self, class: ClassDescriptor) -> &mut Self {
        let class = self.classes.register(class);
        self.annotated_classes.push(class);
        self
    }

    /// Add caching settings applied once every entity and collection is bound
    pub fn add_cache_region_definition(&mut self, definition: CacheRegionDefinition) -> &mut Self {
        self.cache_regions.push(definition);
        self
    }

    /// Bind every source and return the finished metadata
    ///
    /// Phases run in the order given by [`PhaseGraph::standard`]. The first fatal error aborts
    /// the run; no partially bound metadata is ever returned.
    ///
    /// # Errors
    /// Returns the first mapping, duplicate, extends or configuration error raised while
    /// binding.
    pub fn build_metadata(&self) -> Result<Metadata> {
        let collector = MetadataCollector::new(
            self.options.clone(),
            self.naming.clone(),
            self.classes.clone(),
        );
        let root = BindingContext::new(
            &collector,
            Arc::new(GlobalMappingDefaults::new(&self.options)),
            collector.global_meta_attribute_context().clone(),
        );
        let hbm = HbmMetadataSourceProcessor::new(root.clone());
        let annotations = AnnotationMetadataSourceProcessor::new(root);

        let mut queue = MetadataSourceQueue::new();
        for document in &self.documents {
            queue
                .add(document.clone())
                .map_err(|error| invalid_mapping(document, error))?;
        }
        for class in &self.annotated_classes {
            queue.add_annotated_class(class.clone());
        }
        let mut extends = ExtendsQueue::new();
        let order = self.options.processing_order.source_types();
        queue.remove_superseded(order[0]);
        let (documents, classes) = queue.pending_sources();

        for phase in PhaseGraph::standard()?.execution_order()? {
            debug!("Binding phase {phase}");
            match phase {
                BindingPhase::Independent => visit_sources(order, &documents, &classes, &mut |source| match source {
                    Source::Hbm(document) => hbm_phase(document, |d| hbm.process_independent_metadata(d)),
                    Source::Class(class) => annotations.process_independent_metadata(class),
                })?,
                BindingPhase::TypeDependent => visit_sources(order, &documents, &classes, &mut |source| match source {
                    Source::Hbm(document) => hbm_phase(document, |d| hbm.process_type_dependent_metadata(d)),
                    Source::Class(class) => annotations.process_type_dependent_metadata(class),
                })?,
                BindingPhase::Mapping => {
                    while !queue.is_empty() {
                        let deferred = queue.process_metadata(
                            order,
                            &self.classes,
                            self.options.max_hierarchy_depth,
                            |document| hbm.process_mapping_metadata(document),
                            |class| annotations.process_mapping_metadata(class).map(|_| ()),
                        )?;
                        for entry in deferred {
                            extends.add(entry);
                        }
                    }
                }
                BindingPhase::ExtendsResolution => {
                    extends.process_extends_queue(&mut queue, &collector, |document| {
                        hbm.process_mapping_metadata(document)
                    })?;
                }
                BindingPhase::MappingDependent => {
                    visit_sources(order, &documents, &classes, &mut |source| match source {
                        Source::Hbm(document) => hbm_phase(document, |d| hbm.process_mapping_dependent_metadata(d)),
                        Source::Class(class) => annotations.process_mapping_dependent_metadata(class),
                    })?;
                    bind_back_references(&collector)?;
                }
                BindingPhase::SecondPass => {
                    self.apply_cache_regions(&collector)?;
                    second_pass(&collector)?;
                }
            }
        }

        debug!(
            "Bound {} entities and {} collections",
            collector.entity_bindings().len(),
            collector.collection_bindings().len()
        );
        Ok(Metadata::new(collector))
    }

    fn apply_cache_regions(&self, collector: &MetadataCollector) -> Result<()> {
        for definition in &self.cache_regions {
            match definition.region_type {
                CacheRegionType::Entity => {
                    let entity = collector.get_entity_binding(&definition.role).ok_or_else(|| {
                        mapping_error!(
                            "Can't find entitybinding for role {} to apply cache configuration",
                            definition.role
                        )
                    })?;
                    entity.hierarchy.set_caching(Some(definition.to_caching()));
                }
                CacheRegionType::Collection => {
                    let collection = collector.get_collection(&definition.role).ok_or_else(|| {
                        mapping_error!(
                            "Can't find collection binding for role {} to apply cache configuration",
                            definition.role
                        )
                    })?;
                    collection.set_caching(Some(definition.to_caching()));
                }
            }
        }
        Ok(())
    }
}

enum Source<'s> {
    Hbm(&'s Arc<HbmDocument>),
    Class(&'s ClassDescriptorRc),
}

fn visit_sources(
    order: [MetadataSourceType; 2],
    documents: &[Arc<HbmDocument>],
    classes: &[ClassDescriptorRc],
    visit: &mut dyn FnMut(Source<'_>) -> Result<()>,
) -> Result<()> {
    for source_type in order {
        match source_type {
            MetadataSourceType::Hbm => {
                for document in documents {
                    visit(Source::Hbm(document))?;
                }
            }
            MetadataSourceType::Class => {
                for class in classes {
                    visit(Source::Class(class))?;
                }
            }
        }
    }
    Ok(())
}

fn invalid_mapping(document: &HbmDocument, error: Error) -> Error {
    InvalidMapping {
        origin_type: document.origin().origin_type,
        origin_name: document.origin().name.clone(),
        source: Box::new(error),
    }
}

fn hbm_phase<F>(document: &HbmDocument, process: F) -> Result<()>
where
    F: FnOnce(&HbmDocument) -> Result<()>,
{
    process(document).map_err(|error| invalid_mapping(document, error))
}

fn second_pass(collector: &MetadataCollector) -> Result<()> {
    let lookup = |name: &str| collector.get_entity_binding(name);
    for entity in collector.entity_bindings() {
        entity.finish_initialization(lookup)?;
    }
    for collection in collector.collection_bindings() {
        let owner = lookup(&collection.owner_entity_name).ok_or_else(|| {
            mapping_error!(
                "Collection {} belongs to unmapped entity {}",
                collection.role,
                collection.owner_entity_name
            )
        })?;
        collection.finish_initialization(&owner, lookup)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            binding::AccessType,
            typesystem::{AttributeAnnotation, AttributeDescriptor, ClassAnnotation},
        },
    };

    const ORDER_XML: &str = r#"<hibernate-mapping package="shop">
        <class name="Order" table="ORDERS"><id name="id" type="long"/>
            <set name="tags" table="ORDER_TAGS">
                <key column="ORDER_ID"/>
                <element column="TAG" type="string"/>
            </set>
        </class>
    </hibernate-mapping>"#;

    #[test]
    fn test_build_hbm() {
        let mut sources = MetadataSources::new();
        sources.add_hbm_xml_str(ORDER_XML, "order.hbm.xml").unwrap();
        sources.add_cache_region_definition(CacheRegionDefinition::entity(
            "shop.Order",
            AccessType::ReadWrite,
        ));

        let metadata = sources.build_metadata().unwrap();
        let order = metadata.get_entity_binding("shop.Order").unwrap();
        assert!(order.is_initialized());
        assert_eq!(
            order.hierarchy.caching().unwrap().access_type,
            AccessType::ReadWrite
        );
        assert!(metadata
            .get_collection("shop.Order.tags")
            .unwrap()
            .is_initialized());
        assert_eq!(metadata.get_import("Order").as_deref(), Some("shop.Order"));
    }

    #[test]
    fn test_unknown_cache_role() {
        let mut sources = MetadataSources::new();
        sources.add_hbm_xml_str(ORDER_XML, "order.hbm.xml").unwrap();
        sources.add_cache_region_definition(CacheRegionDefinition::entity(
            "shop.Missing",
            AccessType::ReadOnly,
        ));

        let err = sources.build_metadata().unwrap_err();
        assert!(err
            .to_string()
            .contains("Can't find entitybinding for role shop.Missing"));
    }

    #[test]
    fn test_invalid_document_reports_origin() {
        let mut sources = MetadataSources::new();
        let err = sources
            .add_hbm_xml_str("<hibernate-mapping><class", "broken.hbm.xml")
            .err()
            .unwrap();
        match err {
            Error::InvalidMapping {
                origin_type,
                origin_name,
                ..
            } => {
                assert_eq!(origin_type, OriginType::String);
                assert_eq!(origin_name, "broken.hbm.xml");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_mixed_sources() {
        let mut sources = MetadataSources::new();
        sources.add_hbm_xml_str(ORDER_XML, "order.hbm.xml").unwrap();
        sources.add_annotated_class(
            ClassDescriptor::new("shop.Customer")
                .annotated(ClassAnnotation::Entity { name: None })
                .attribute(
                    AttributeDescriptor::new("id", "long").annotated(AttributeAnnotation::Id),
                ),
        );
        sources.register_class(ClassDescriptor::new("shop.Helper"));

        let metadata = sources.build_metadata().unwrap();
        assert!(metadata.get_entity_binding("shop.Customer").is_some());
        assert!(metadata.get_entity_binding("shop.Helper").is_none());
        assert_eq!(metadata.entity_bindings().len(), 2);
    }
}

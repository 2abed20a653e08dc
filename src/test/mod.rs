use std::sync::Arc;

use crate::metadata::{
    binding::{EntityBinding, EntityBindingRc, EntityHierarchy, IdentifierDescriptor, InheritanceStrategy},
    collector::MetadataCollector,
    config::MetadataOptions,
    context::BindingContext,
    defaults::GlobalMappingDefaults,
    naming::DefaultNamingStrategy,
    relational::{Identifier, SchemaName, Table, TableReference},
    source::{HbmDocument, Origin, OriginType},
    typesystem::{BasicTypeKind, ClassRegistry, JavaType, JavaTypeKind},
    MetadataImplementor,
};

// Helper function to create an empty collector with default options
pub fn create_collector() -> MetadataCollector {
    create_collector_with(MetadataOptions::default())
}

// Helper function to create an empty collector with the given options
pub fn create_collector_with(options: MetadataOptions) -> MetadataCollector {
    MetadataCollector::new(
        options,
        Arc::new(DefaultNamingStrategy),
        Arc::new(ClassRegistry::new()),
    )
}

// Helper function to create the outermost binding context of a collector
pub fn create_root_context(collector: &MetadataCollector) -> BindingContext<'_> {
    BindingContext::new(
        collector,
        Arc::new(GlobalMappingDefaults::new(collector.options())),
        collector.global_meta_attribute_context().clone(),
    )
}

// Helper function to parse a mapping document held in a string
pub fn create_hbm_document(xml: &str) -> Arc<HbmDocument> {
    Arc::new(HbmDocument::parse(xml, Origin::new(OriginType::String, "test.hbm.xml")).unwrap())
}

// Helper function to create a root entity with a long `id` mapped to column `ID`
pub fn create_entity_binding(name: &str, table: &str) -> EntityBindingRc {
    let hierarchy = Arc::new(EntityHierarchy::new(
        name,
        InheritanceStrategy::None,
        IdentifierDescriptor::Simple {
            attribute: Some("id".to_string()),
            columns: vec!["ID".to_string()],
            java_type: Arc::new(JavaType {
                name: "long".to_string(),
                kind: JavaTypeKind::Primitive(BasicTypeKind::Long),
            }),
            generator: None,
            unsaved_value: None,
        },
    ));
    let table = Arc::new(Table::new(
        SchemaName::default(),
        Identifier::to_identifier(table),
    ));
    let mut binding = EntityBinding::new(name, hierarchy, TableReference::Physical(table));
    binding.key_columns = vec!["ID".to_string()];
    Arc::new(binding)
}

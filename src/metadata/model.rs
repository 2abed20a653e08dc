//! The bound metadata and the interface the runtime layer consumes.
//!
//! [`MetadataImplementor`] is the read side of the binding model. It is implemented by the
//! in-progress [`MetadataCollector`], which the extends queue queries while the fixpoint runs,
//! and by the finished [`Metadata`] handed out by
//! [`crate::metadata::builder::MetadataSources::build_metadata`].
//!
//! # Thread Safety
//!
//! [`Metadata`] is [`Send`] and [`Sync`]. It offers no mutating operations, so any number of
//! threads may read it without synchronization.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::metadata::{
    binding::{
        EntityBindingRc, FetchProfile, FilterDefinition, IdGeneratorDefinition,
        NamedEntityGraphDefinition, NamedNativeQueryDefinition, NamedQueryDefinition,
        PluralAttributeBindingRc, ResultSetMappingDefinition, TypeDefinition,
    },
    collector::MetadataCollector,
    config::MetadataOptions,
    meta::MetaAttributeContext,
    naming::NamingStrategy,
    relational::Database,
};

/// Lookup interface over bound metadata.
pub trait MetadataImplementor {
    /// Options of the binding run
    fn options(&self) -> &MetadataOptions;

    /// The naming strategy used while binding
    fn naming_strategy(&self) -> &dyn NamingStrategy;

    /// The physical model
    fn database(&self) -> &Database;

    /// Meta attributes shared by every mapping
    fn global_meta_attribute_context(&self) -> &Arc<MetaAttributeContext>;

    /// Look up an entity by name
    fn get_entity_binding(&self, entity_name: &str) -> Option<EntityBindingRc>;

    /// All entities, ordered by entity name
    fn entity_bindings(&self) -> Vec<EntityBindingRc>;

    /// Look up a collection by role
    fn get_collection(&self, role: &str) -> Option<PluralAttributeBindingRc>;

    /// All collections, ordered by role
    fn collection_bindings(&self) -> Vec<PluralAttributeBindingRc>;

    /// Import aliases to entity names
    fn imports(&self) -> BTreeMap<String, String>;

    /// Resolve one import alias
    fn get_import(&self, import_name: &str) -> Option<String>;

    /// Look up a fetch profile
    fn get_fetch_profile(&self, name: &str) -> Option<Arc<FetchProfile>>;

    /// All fetch profiles
    fn fetch_profiles(&self) -> Vec<Arc<FetchProfile>>;

    /// Look up a named HQL query
    fn get_named_query(&self, name: &str) -> Option<NamedQueryDefinition>;

    /// Look up a named native query
    fn get_named_native_query(&self, name: &str) -> Option<NamedNativeQueryDefinition>;

    /// Look up a result set mapping
    fn get_result_set_mapping(&self, name: &str) -> Option<ResultSetMappingDefinition>;

    /// Look up a filter definition
    fn get_filter_definition(&self, name: &str) -> Option<FilterDefinition>;

    /// Look up an identifier generator definition
    fn get_id_generator(&self, name: &str) -> Option<IdGeneratorDefinition>;

    /// Look up a type definition
    fn get_type_definition(&self, name: &str) -> Option<TypeDefinition>;

    /// Look up a named entity graph
    fn get_named_entity_graph(&self, name: &str) -> Option<NamedEntityGraphDefinition>;

    /// Returns true if an entity with this name is bound
    fn is_entity_bound(&self, entity_name: &str) -> bool {
        self.get_entity_binding(entity_name).is_some()
    }
}

/// The fully bound, immutable mapping model.
pub struct Metadata {
    collector: MetadataCollector,
}

impl Metadata {
    /// Freeze a collector whose second pass has completed
    pub(crate) fn new(collector: MetadataCollector) -> Self {
        collector.database().freeze();
        Metadata { collector }
    }

    /// Named HQL queries
    #[must_use]
    pub fn named_queries(&self) -> Vec<NamedQueryDefinition> {
        self.collector.named_queries()
    }

    /// Named native queries
    #[must_use]
    pub fn named_native_queries(&self) -> Vec<NamedNativeQueryDefinition> {
        self.collector.named_native_queries()
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("entities", &self.collector.entity_bindings().len())
            .field("collections", &self.collector.collection_bindings().len())
            .field("tables", &self.collector.database().tables().len())
            .finish()
    }
}

impl MetadataImplementor for Metadata {
    fn options(&self) -> &MetadataOptions {
        self.collector.options()
    }

    fn naming_strategy(&self) -> &dyn NamingStrategy {
        self.collector.naming_strategy()
    }

    fn database(&self) -> &Database {
        self.collector.database()
    }

    fn global_meta_attribute_context(&self) -> &Arc<MetaAttributeContext> {
        self.collector.global_meta_attribute_context()
    }

    fn get_entity_binding(&self, entity_name: &str) -> Option<EntityBindingRc> {
        self.collector.get_entity_binding(entity_name)
    }

    fn entity_bindings(&self) -> Vec<EntityBindingRc> {
        self.collector.entity_bindings()
    }

    fn get_collection(&self, role: &str) -> Option<PluralAttributeBindingRc> {
        self.collector.get_collection(role)
    }

    fn collection_bindings(&self) -> Vec<PluralAttributeBindingRc> {
        self.collector.collection_bindings()
    }

    fn imports(&self) -> BTreeMap<String, String> {
        self.collector.imports()
    }

    fn get_import(&self, import_name: &str) -> Option<String> {
        self.collector.get_import(import_name)
    }

    fn get_fetch_profile(&self, name: &str) -> Option<Arc<FetchProfile>> {
        self.collector.get_fetch_profile(name)
    }

    fn fetch_profiles(&self) -> Vec<Arc<FetchProfile>> {
        self.collector.fetch_profiles()
    }

    fn get_named_query(&self, name: &str) -> Option<NamedQueryDefinition> {
        self.collector.get_named_query(name)
    }

    fn get_named_native_query(&self, name: &str) -> Option<NamedNativeQueryDefinition> {
        self.collector.get_named_native_query(name)
    }

    fn get_result_set_mapping(&self, name: &str) -> Option<ResultSetMappingDefinition> {
        self.collector.get_result_set_mapping(name)
    }

    fn get_filter_definition(&self, name: &str) -> Option<FilterDefinition> {
        self.collector.get_filter_definition(name)
    }

    fn get_id_generator(&self, name: &str) -> Option<IdGeneratorDefinition> {
        self.collector.get_id_generator(name)
    }

    fn get_type_definition(&self, name: &str) -> Option<TypeDefinition> {
        self.collector.get_type_definition(name)
    }

    fn get_named_entity_graph(&self, name: &str) -> Option<NamedEntityGraphDefinition> {
        self.collector.get_named_entity_graph(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{naming::DefaultNamingStrategy, typesystem::ClassRegistry},
        test::create_entity_binding,
    };

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_metadata_is_shareable() {
        assert_send_sync::<Metadata>();
    }

    #[test]
    fn test_freeze_numbers_tables() {
        let collector = MetadataCollector::new(
            MetadataOptions::default(),
            Arc::new(DefaultNamingStrategy),
            Arc::new(ClassRegistry::new()),
        );
        for (name, table) in [("a.B", "B_TABLE"), ("a.A", "A_TABLE")] {
            let entity = create_entity_binding(name, table);
            if let Some(table) = entity.primary_table.physical() {
                collector
                    .database()
                    .locate_or_create_table(table.schema().clone(), table.name().clone());
            }
            collector.add_entity(entity).unwrap();
        }

        let metadata = Metadata::new(collector);
        let numbers: Vec<_> = metadata
            .database()
            .tables()
            .iter()
            .map(|t| (t.name().text().to_string(), t.table_number()))
            .collect();
        assert_eq!(
            numbers,
            vec![
                ("A_TABLE".to_string(), Some(0)),
                ("B_TABLE".to_string(), Some(1))
            ]
        );
        assert!(metadata.is_entity_bound("a.A"));
    }
}

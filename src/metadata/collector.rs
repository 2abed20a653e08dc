//! The in-progress metadata that binders register into.
//!
//! A [`MetadataCollector`] is created once per binding run. Every registry in it is an
//! ordered lock-free map, so binders only ever need a shared reference. Entity names and
//! collection roles are insert-or-fail; the named definitions are upserts that log when they
//! replace an earlier registration.

use std::{collections::BTreeMap, sync::Arc};

use crossbeam_skiplist::SkipMap;
use log::{debug, trace, warn};

use crate::{
    error::DuplicateMappingKind,
    metadata::{
        binding::{
            EntityBindingRc, FetchProfile, FilterDefinition, IdGeneratorDefinition,
            NamedEntityGraphDefinition, NamedNativeQueryDefinition, NamedQueryDefinition,
            PluralAttributeBindingRc, ResultSetMappingDefinition, TypeDefinition,
        },
        config::MetadataOptions,
        meta::MetaAttributeContext,
        naming::NamingStrategy,
        relational::{Database, SchemaName},
        source::MetadataSourceType,
        typesystem::{ClassRegistry, TypeResolver},
        MetadataImplementor,
    },
    Error::DuplicateMapping,
    Result,
};

/// Registries filled while mapping sources bind.
pub struct MetadataCollector {
    options: MetadataOptions,
    naming: Arc<dyn NamingStrategy>,
    type_resolver: TypeResolver,
    global_meta: Arc<MetaAttributeContext>,
    database: Database,
    entities: SkipMap<String, EntityBindingRc>,
    collections: SkipMap<String, PluralAttributeBindingRc>,
    imports: SkipMap<String, String>,
    fetch_profiles: SkipMap<String, Arc<FetchProfile>>,
    named_queries: SkipMap<String, NamedQueryDefinition>,
    native_queries: SkipMap<String, NamedNativeQueryDefinition>,
    result_set_mappings: SkipMap<String, ResultSetMappingDefinition>,
    filter_definitions: SkipMap<String, FilterDefinition>,
    id_generators: SkipMap<String, IdGeneratorDefinition>,
    type_definitions: SkipMap<String, TypeDefinition>,
    named_entity_graphs: SkipMap<String, NamedEntityGraphDefinition>,
}

impl MetadataCollector {
    /// Create an empty collector
    ///
    /// ## Arguments
    /// * 'options' - Options of this binding run
    /// * 'naming'  - Naming strategy applied by every binder
    /// * 'classes' - Classes available to type resolution
    pub fn new(
        options: MetadataOptions,
        naming: Arc<dyn NamingStrategy>,
        classes: Arc<ClassRegistry>,
    ) -> Self {
        let default_schema = SchemaName::new(
            options.default_schema.as_deref(),
            options.default_catalog.as_deref(),
            options.globally_quoted_identifiers,
        );
        MetadataCollector {
            options,
            naming,
            type_resolver: TypeResolver::new(classes),
            global_meta: Arc::new(MetaAttributeContext::new()),
            database: Database::new(default_schema),
            entities: SkipMap::new(),
            collections: SkipMap::new(),
            imports: SkipMap::new(),
            fetch_profiles: SkipMap::new(),
            named_queries: SkipMap::new(),
            native_queries: SkipMap::new(),
            result_set_mappings: SkipMap::new(),
            filter_definitions: SkipMap::new(),
            id_generators: SkipMap::new(),
            type_definitions: SkipMap::new(),
            named_entity_graphs: SkipMap::new(),
        }
    }

    /// Register an entity binding
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateMapping`] if the entity name is already registered. The
    /// earlier binding stays in place.
    pub fn add_entity(&self, binding: EntityBindingRc) -> Result<()> {
        let name = binding.entity_name.clone();
        let entry = self.entities.get_or_insert(name.clone(), binding.clone());
        if !Arc::ptr_eq(entry.value(), &binding) {
            return Err(DuplicateMapping {
                kind: DuplicateMappingKind::Entity,
                name,
            });
        }
        Ok(())
    }

    /// Register a collection binding
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateMapping`] if the role is already registered.
    pub fn add_collection(&self, binding: PluralAttributeBindingRc) -> Result<()> {
        let role = binding.role.clone();
        let entry = self.collections.get_or_insert(role.clone(), binding.clone());
        if !Arc::ptr_eq(entry.value(), &binding) {
            return Err(DuplicateMapping {
                kind: DuplicateMappingKind::Collection,
                name: role,
            });
        }
        Ok(())
    }

    /// Register an import alias; a later registration replaces an earlier one
    ///
    /// ## Arguments
    /// * 'import_name' - The alias usable in queries
    /// * 'entity_name' - The entity it stands for
    pub fn add_import(&self, import_name: &str, entity_name: &str) {
        trace!("Import: {} -> {}", import_name, entity_name);
        if let Some(existing) = self.imports.get(import_name) {
            if existing.value() != entity_name {
                debug!("{}", import_override_message(import_name, existing.value()));
            }
        }
        self.imports
            .insert(import_name.to_string(), entity_name.to_string());
    }

    /// Return the fetch profile with this name, creating it on first use
    ///
    /// ## Arguments
    /// * 'name'    - Profile name
    /// * 'source'  - Kind of source declaring the profile, recorded on creation only
    pub fn find_or_create_fetch_profile(
        &self,
        name: &str,
        source: MetadataSourceType,
    ) -> Arc<FetchProfile> {
        self.fetch_profiles
            .get_or_insert_with(name.to_string(), || {
                Arc::new(FetchProfile::new(name, source))
            })
            .value()
            .clone()
    }

    /// Register a fetch profile, replacing one with the same name
    pub fn add_fetch_profile(&self, profile: Arc<FetchProfile>) {
        if self.fetch_profiles.contains_key(&profile.name) {
            warn!("Duplicated fetch profile with same name [{}] found.", profile.name);
        }
        self.fetch_profiles.insert(profile.name.clone(), profile);
    }

    /// Register a named HQL query, replacing one with the same name
    pub fn add_named_query(&self, definition: NamedQueryDefinition) {
        if self.named_queries.contains_key(&definition.name) {
            warn!("Duplicated query with same name [{}] found.", definition.name);
        }
        self.named_queries.insert(definition.name.clone(), definition);
    }

    /// Register a named native query, replacing one with the same name
    pub fn add_named_native_query(&self, definition: NamedNativeQueryDefinition) {
        if self.native_queries.contains_key(&definition.name) {
            warn!(
                "Duplicated native query with same name [{}] found.",
                definition.name
            );
        }
        self.native_queries.insert(definition.name.clone(), definition);
    }

    /// Register a result set mapping, replacing one with the same name
    pub fn add_result_set_mapping(&self, definition: ResultSetMappingDefinition) {
        if self.result_set_mappings.contains_key(&definition.name) {
            warn!(
                "Duplicated result set mapping with same name [{}] found.",
                definition.name
            );
        }
        self.result_set_mappings
            .insert(definition.name.clone(), definition);
    }

    /// Register a filter definition
    pub fn add_filter_definition(&self, definition: FilterDefinition) {
        trace!("Filter definition: {}", definition.name);
        self.filter_definitions
            .insert(definition.name.clone(), definition);
    }

    /// Register an identifier generator definition
    pub fn add_id_generator(&self, definition: IdGeneratorDefinition) {
        trace!("Identifier generator: {} -> {}", definition.name, definition.strategy);
        self.id_generators.insert(definition.name.clone(), definition);
    }

    /// Register a type definition
    pub fn add_type_definition(&self, definition: TypeDefinition) {
        trace!("Type definition: {} -> {}", definition.name, definition.type_implementor);
        self.type_definitions
            .insert(definition.name.clone(), definition);
    }

    /// Register a named entity graph
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateMapping`] if a graph with the same name exists.
    pub fn add_named_entity_graph(&self, definition: NamedEntityGraphDefinition) -> Result<()> {
        if self.named_entity_graphs.contains_key(&definition.name) {
            return Err(DuplicateMapping {
                kind: DuplicateMappingKind::NamedEntityGraph,
                name: definition.name,
            });
        }
        self.named_entity_graphs
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    /// The type resolver of this run
    #[must_use]
    pub fn type_resolver(&self) -> &TypeResolver {
        &self.type_resolver
    }

    /// Named HQL queries by name
    #[must_use]
    pub fn named_queries(&self) -> Vec<NamedQueryDefinition> {
        self.named_queries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Named native queries by name
    #[must_use]
    pub fn named_native_queries(&self) -> Vec<NamedNativeQueryDefinition> {
        self.native_queries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl MetadataImplementor for MetadataCollector {
    fn options(&self) -> &MetadataOptions {
        &self.options
    }

    fn naming_strategy(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    fn database(&self) -> &Database {
        &self.database
    }

    fn global_meta_attribute_context(&self) -> &Arc<MetaAttributeContext> {
        &self.global_meta
    }

    fn get_entity_binding(&self, entity_name: &str) -> Option<EntityBindingRc> {
        self.entities
            .get(entity_name)
            .map(|entry| entry.value().clone())
    }

    fn entity_bindings(&self) -> Vec<EntityBindingRc> {
        self.entities
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn get_collection(&self, role: &str) -> Option<PluralAttributeBindingRc> {
        self.collections.get(role).map(|entry| entry.value().clone())
    }

    fn collection_bindings(&self) -> Vec<PluralAttributeBindingRc> {
        self.collections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn imports(&self) -> BTreeMap<String, String> {
        self.imports
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn get_import(&self, import_name: &str) -> Option<String> {
        self.imports
            .get(import_name)
            .map(|entry| entry.value().clone())
    }

    fn get_fetch_profile(&self, name: &str) -> Option<Arc<FetchProfile>> {
        self.fetch_profiles
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn fetch_profiles(&self) -> Vec<Arc<FetchProfile>> {
        self.fetch_profiles
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn get_named_query(&self, name: &str) -> Option<NamedQueryDefinition> {
        self.named_queries
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn get_named_native_query(&self, name: &str) -> Option<NamedNativeQueryDefinition> {
        self.native_queries
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn get_result_set_mapping(&self, name: &str) -> Option<ResultSetMappingDefinition> {
        self.result_set_mappings
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn get_filter_definition(&self, name: &str) -> Option<FilterDefinition> {
        self.filter_definitions
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn get_id_generator(&self, name: &str) -> Option<IdGeneratorDefinition> {
        self.id_generators
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn get_type_definition(&self, name: &str) -> Option<TypeDefinition> {
        self.type_definitions
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn get_named_entity_graph(&self, name: &str) -> Option<NamedEntityGraphDefinition> {
        self.named_entity_graphs
            .get(name)
            .map(|entry| entry.value().clone())
    }
}

fn import_override_message(import_name: &str, previous: &str) -> String {
    format!("import name [{import_name}] overrode previous [{previous}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::naming::DefaultNamingStrategy,
        test::create_entity_binding,
    };

    fn collector() -> MetadataCollector {
        MetadataCollector::new(
            MetadataOptions::default(),
            Arc::new(DefaultNamingStrategy),
            Arc::new(ClassRegistry::new()),
        )
    }

    #[test]
    fn test_fetch_profile_idempotent() {
        let collector = collector();
        let first = collector.find_or_create_fetch_profile("p", MetadataSourceType::Hbm);
        let second = collector.find_or_create_fetch_profile("p", MetadataSourceType::Class);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.source, MetadataSourceType::Hbm);
        assert_eq!(collector.fetch_profiles().len(), 1);
    }

    #[test]
    fn test_duplicate_entity_keeps_first() {
        let collector = collector();
        let first = create_entity_binding("a.Order", "ORDERS");
        collector.add_entity(first.clone()).unwrap();

        let err = collector
            .add_entity(create_entity_binding("a.Order", "OTHER"))
            .unwrap_err();
        assert!(err.is_duplicate_mapping());

        let kept = collector.get_entity_binding("a.Order").unwrap();
        assert!(Arc::ptr_eq(&kept, &first));
        assert_eq!(kept.primary_table.logical_name().text(), "ORDERS");
    }

    #[test]
    fn test_import_last_wins() {
        let collector = collector();
        collector.add_import("Order", "a.Order");
        collector.add_import("Order", "b.Order");
        assert_eq!(collector.get_import("Order").as_deref(), Some("b.Order"));
        assert_eq!(collector.imports().len(), 1);
        assert_eq!(
            import_override_message("Order", "a.Order"),
            "import name [Order] overrode previous [a.Order]"
        );
    }

    #[test]
    fn test_named_entity_graph_duplicate() {
        let collector = collector();
        let graph = NamedEntityGraphDefinition {
            name: "Order.lines".to_string(),
            entity_name: "a.Order".to_string(),
            attribute_nodes: vec!["lines".to_string()],
        };
        collector.add_named_entity_graph(graph.clone()).unwrap();
        assert!(collector.add_named_entity_graph(graph).is_err());
    }

    #[test]
    fn test_named_query_overwrites() {
        let collector = collector();
        collector.add_named_query(NamedQueryDefinition::new("all", "from Order"));
        collector.add_named_query(NamedQueryDefinition::new("all", "from Customer"));
        assert_eq!(collector.get_named_query("all").unwrap().query, "from Customer");
        assert_eq!(collector.named_queries().len(), 1);
    }
}

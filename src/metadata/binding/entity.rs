use std::{
    fmt,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    metadata::{
        binding::{AttributeBinding, EntityHierarchy, PluralAttributeBindingRc},
        meta::MetaAttributeContext,
        relational::TableReference,
        source::MetadataSourceType,
    },
    Result,
};

/// A reference-counted entity binding
pub type EntityBindingRc = Arc<EntityBinding>;

/// A weak reference to an entity binding
///
/// Super, sub and association links between entities are weak, the strong references live in
/// the metadata registries. This keeps the entity graph free of reference cycles.
#[derive(Clone)]
pub struct EntityBindingRef {
    weak_ref: Weak<EntityBinding>,
}

impl EntityBindingRef {
    /// Create a new `EntityBindingRef` from a strong reference
    pub fn new(strong_ref: &EntityBindingRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the entity, returning None if it has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<EntityBindingRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced entity is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// Get the entity name of the referenced entity (if still alive)
    #[must_use]
    pub fn entity_name(&self) -> Option<String> {
        self.upgrade().map(|e| e.entity_name.clone())
    }
}

impl fmt::Debug for EntityBindingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(entity) => write!(f, "EntityBindingRef({})", entity.entity_name),
            None => f.write_str("EntityBindingRef(<dropped>)"),
        }
    }
}

/// A `<filter>` applied to an entity or collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterApplication {
    /// Name of the filter definition
    pub name: String,
    /// Condition, absent to use the definition default
    pub condition: Option<String>,
}

/// An additional table (`<join>`) holding some attributes of an entity.
#[derive(Debug, Clone)]
pub struct SecondaryTable {
    /// The joined table
    pub table: TableReference,
    /// Columns referencing the primary table key
    pub key_columns: Vec<String>,
    /// Whether the row may be absent
    pub optional: bool,
}

/// One bound entity.
///
/// Created once while its mapping source binds, with every value the source itself provides.
/// Associations to other entities only carry the target entity name until
/// [`EntityBinding::finish_initialization`] resolves them, once every entity is registered.
#[derive(Debug)]
pub struct EntityBinding {
    /// Unique entity name
    pub entity_name: String,
    /// Mapped class, absent for dynamic entities
    pub class_name: Option<String>,
    /// Name used in queries
    pub jpa_entity_name: String,
    /// The inheritance tree this entity belongs to
    pub hierarchy: Arc<EntityHierarchy>,
    /// Immediate supertype, absent for roots
    pub super_entity: Option<EntityBindingRef>,
    /// Immediate subtypes, added as they bind
    pub sub_entities: boxcar::Vec<EntityBindingRef>,
    /// Table holding the entity's own attributes
    pub primary_table: TableReference,
    /// Additional joined tables
    pub secondary_tables: Vec<SecondaryTable>,
    /// Primary key columns of the primary table; for joined subclasses these reference the
    /// supertype table
    pub key_columns: Vec<String>,
    /// Discriminator value of this entity
    pub discriminator_value: Option<String>,
    /// Declared and synthetic attributes
    pub attributes: boxcar::Vec<AttributeBinding>,
    /// Whether the class is abstract
    pub is_abstract: bool,
    /// Whether the entity is proxied
    pub lazy: bool,
    /// Whether instances may change
    pub mutable: bool,
    /// Whether updates only write changed columns
    pub dynamic_update: bool,
    /// Whether inserts only write non-null columns
    pub dynamic_insert: bool,
    /// Batch fetch size
    pub batch_size: Option<u32>,
    /// SQL restriction applied to every load
    pub where_clause: Option<String>,
    /// Applied filters
    pub filters: Vec<FilterApplication>,
    /// Tables a subselect entity reads from
    pub synchronized_tables: Vec<String>,
    /// Meta attributes of the entity
    pub meta: Arc<MetaAttributeContext>,
    /// Kind of source the entity was bound from
    pub source: MetadataSourceType,
    finished: OnceLock<()>,
}

impl EntityBinding {
    /// Create an entity with default settings and no attributes
    ///
    /// ## Arguments
    /// * 'entity_name'     - Unique entity name
    /// * 'hierarchy'       - Inheritance tree, shared with the super entity
    /// * 'primary_table'   - Table holding the entity's own attributes
    pub fn new(
        entity_name: impl Into<String>,
        hierarchy: Arc<EntityHierarchy>,
        primary_table: TableReference,
    ) -> Self {
        let entity_name = entity_name.into();
        EntityBinding {
            jpa_entity_name: crate::metadata::typesystem::unqualify(&entity_name).to_string(),
            class_name: Some(entity_name.clone()),
            entity_name,
            hierarchy,
            super_entity: None,
            sub_entities: boxcar::Vec::new(),
            primary_table,
            secondary_tables: Vec::new(),
            key_columns: Vec::new(),
            discriminator_value: None,
            attributes: boxcar::Vec::new(),
            is_abstract: false,
            lazy: true,
            mutable: true,
            dynamic_update: false,
            dynamic_insert: false,
            batch_size: None,
            where_clause: None,
            filters: Vec::new(),
            synchronized_tables: Vec::new(),
            meta: Arc::new(MetaAttributeContext::new()),
            source: MetadataSourceType::Hbm,
            finished: OnceLock::new(),
        }
    }

    /// The immediate supertype
    #[must_use]
    pub fn super_entity(&self) -> Option<EntityBindingRc> {
        self.super_entity.as_ref().and_then(EntityBindingRef::upgrade)
    }

    /// Returns true if the entity roots its hierarchy
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.super_entity.is_none()
    }

    /// Register an immediate subtype
    pub fn add_sub_entity(&self, sub_entity: &EntityBindingRc) {
        self.sub_entities.push(EntityBindingRef::new(sub_entity));
    }

    /// Entity names of the immediate subtypes, in binding order
    #[must_use]
    pub fn sub_entity_names(&self) -> Vec<String> {
        self.sub_entities
            .iter()
            .filter_map(|(_, sub)| sub.entity_name())
            .collect()
    }

    /// Look up a declared or synthetic attribute of this entity (not its supertypes)
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeBinding> {
        self.attributes
            .iter()
            .map(|(_, attribute)| attribute)
            .find(|attribute| attribute.name() == name)
    }

    /// Append an attribute
    pub fn add_attribute(&self, attribute: AttributeBinding) {
        self.attributes.push(attribute);
    }

    /// Attribute names in declaration order
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes
            .iter()
            .map(|(_, attribute)| attribute.name().to_string())
            .collect()
    }

    /// Collection-valued attributes of this entity
    #[must_use]
    pub fn plural_attributes(&self) -> Vec<PluralAttributeBindingRc> {
        self.attributes
            .iter()
            .filter_map(|(_, attribute)| match attribute {
                AttributeBinding::Plural(plural) => Some(plural.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether the second pass ran
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.finished.get().is_some()
    }

    /// Resolve associations to other entities and add the foreign keys they imply
    ///
    /// Joined subclasses also get a foreign key from their key columns to the supertype
    /// table. Running it again has no further effect.
    ///
    /// ## Arguments
    /// * 'lookup' - Entity lookup by name
    ///
    /// # Errors
    /// Returns a mapping error if an association targets an entity that is not mapped.
    pub fn finish_initialization<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<EntityBindingRc>,
    {
        if self.is_initialized() {
            return Ok(());
        }

        let own_table = self.primary_table.physical().cloned();
        let mut failure = None;
        for (_, attribute) in self.attributes.iter() {
            attribute.for_each_to_one(&mut |to_one| {
                if failure.is_some() {
                    return;
                }
                let Some(target) = lookup(&to_one.referenced_entity_name) else {
                    failure = Some(mapping_error!(
                        "An association from the table {} refers to an unmapped class: {}",
                        self.primary_table,
                        to_one.referenced_entity_name
                    ));
                    return;
                };
                to_one.resolve_target(&target);

                let target_columns = match &to_one.property_ref {
                    Some(property) => target
                        .attribute(property)
                        .map(AttributeBinding::column_names)
                        .unwrap_or_default(),
                    None => Vec::new(),
                };
                let columns = if to_one.columns.is_empty() && to_one.constrained {
                    self.key_columns.clone()
                } else {
                    to_one.columns.clone()
                };
                if let (Some(table), Some(target_table), false) = (
                    &own_table,
                    target.primary_table.physical(),
                    columns.is_empty(),
                ) {
                    table.add_foreign_key(columns, target_table, target_columns);
                }
            });
        }
        if let Some(error) = failure {
            return Err(error);
        }

        if let (Some(super_entity), Some(table)) = (self.super_entity(), &own_table) {
            let joined = !self.primary_table.same_table(&super_entity.primary_table);
            if let (true, Some(super_table)) = (joined, super_entity.primary_table.physical()) {
                table.add_foreign_key(self.key_columns.clone(), super_table, Vec::new());
            }
        }

        let _ = self.finished.set(());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        binding::{IdentifierDescriptor, InheritanceStrategy, ToOneAttributeBinding},
        relational::{Identifier, SchemaName, Table},
        typesystem::{BasicTypeKind, JavaType, JavaTypeKind},
    };

    fn entity(name: &str, table: &str) -> EntityBindingRc {
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

    #[test]
    fn test_weak_links() {
        let parent = entity("a.Parent", "PARENT");
        let child = entity("a.Child", "CHILD");
        parent.add_sub_entity(&child);
        assert_eq!(parent.sub_entity_names(), vec!["a.Child"]);

        let link = EntityBindingRef::new(&child);
        assert!(link.is_valid());
        drop(child);
        assert!(!link.is_valid());
        assert!(parent.sub_entity_names().is_empty());
    }

    #[test]
    fn test_finish_resolves_associations() {
        let customer = entity("a.Customer", "CUSTOMER");
        let order = entity("a.Order", "ORDERS");
        order.add_attribute(AttributeBinding::ToOne(ToOneAttributeBinding::new(
            "customer",
            "a.Customer",
            vec!["CUSTOMER_ID".to_string()],
        )));

        let lookup = |name: &str| (name == "a.Customer").then(|| customer.clone());
        order.finish_initialization(lookup).unwrap();
        order.finish_initialization(lookup).unwrap();

        let to_one = order.attribute("customer").and_then(AttributeBinding::as_to_one).unwrap();
        assert_eq!(to_one.target().unwrap().entity_name, "a.Customer");

        let fks = order.primary_table.physical().unwrap().foreign_keys();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].target_table, "CUSTOMER");
    }

    #[test]
    fn test_finish_unmapped_target() {
        let order = entity("a.Order", "ORDERS");
        order.add_attribute(AttributeBinding::ToOne(ToOneAttributeBinding::new(
            "customer",
            "a.Customer",
            vec!["CUSTOMER_ID".to_string()],
        )));
        let err = order.finish_initialization(|_| None).unwrap_err();
        assert!(err.to_string().contains("unmapped class: a.Customer"));
        assert!(!order.is_initialized());
    }
}

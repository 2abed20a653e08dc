use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::{
    metadata::{
        binding::{
            Caching, EmbeddableDescriptor, EntityBindingRc, EntityBindingRef, FetchStyle,
            IdGenerator,
        },
        meta::MetaAttributeContext,
        relational::{Column, Identifier, TableReference},
        typesystem::JavaType,
    },
    Result,
};

/// A reference-counted collection binding
pub type PluralAttributeBindingRc = Arc<PluralAttributeBinding>;

/// The collection semantics of a plural attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum PluralAttributeNature {
    /// Unordered, duplicates allowed
    #[strum(serialize = "bag")]
    Bag,
    /// Bag with a surrogate key per row
    #[strum(serialize = "idbag")]
    IdBag,
    /// Unordered, no duplicates
    #[strum(serialize = "set")]
    Set,
    /// Ordered by an index column
    #[strum(serialize = "list")]
    List,
    /// Keyed by an index
    #[strum(serialize = "map")]
    Map,
    /// Array of entities or components
    #[strum(serialize = "array")]
    Array,
    /// Array of primitives
    #[strum(serialize = "primitive-array")]
    PrimitiveArray,
}

impl PluralAttributeNature {
    /// Whether elements are addressed by an index
    #[must_use]
    pub fn is_indexed(self) -> bool {
        matches!(
            self,
            PluralAttributeNature::List
                | PluralAttributeNature::Map
                | PluralAttributeNature::Array
                | PluralAttributeNature::PrimitiveArray
        )
    }
}

/// The foreign key from collection rows to their owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralAttributeKey {
    /// Key columns
    pub columns: Vec<String>,
    /// Owner attribute referenced instead of the identifier
    pub property_ref: Option<String>,
    /// Whether the key columns may be null
    pub nullable: bool,
    /// Whether the key is updated when elements move between owners
    pub updatable: bool,
    /// Whether deletes cascade at database level
    pub cascade_delete: bool,
}

/// Classification of collection elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ElementClassification {
    /// Basic values
    Basic,
    /// Components
    Embeddable,
    /// Entities referencing the owner through a key on their own table
    OneToMany,
    /// Entities linked through a collection table
    ManyToMany,
    /// Polymorphic references without a foreign key
    Any,
}

/// What the elements of a collection are.
#[derive(Debug)]
pub enum ElementDescriptor {
    /// Basic values in the collection table
    Basic {
        /// Element type
        java_type: Arc<JavaType>,
        /// Element columns
        columns: Vec<String>,
        /// Formula computing the element
        formula: Option<String>,
    },
    /// Components in the collection table
    Embeddable {
        /// The element component
        component: Arc<EmbeddableDescriptor>,
    },
    /// Entities whose table holds the collection key
    OneToMany {
        /// Element entity
        referenced_entity_name: String,
        /// Resolved element entity
        target: OnceLock<EntityBindingRef>,
    },
    /// Entities referenced from the collection table
    ManyToMany {
        /// Element entity
        referenced_entity_name: String,
        /// Columns referencing the element entity
        columns: Vec<String>,
        /// Whether each element appears at most once across owners
        unique: bool,
        /// Resolved element entity
        target: OnceLock<EntityBindingRef>,
    },
    /// Polymorphic references
    Any {
        /// Identifier type of the referenced entities
        id_type: Arc<JavaType>,
        /// Type of the discriminating meta column
        meta_type: Option<String>,
        /// Meta column followed by identifier columns
        columns: Vec<String>,
    },
}

impl ElementDescriptor {
    /// The element classification
    #[must_use]
    pub fn classification(&self) -> ElementClassification {
        match self {
            ElementDescriptor::Basic { .. } => ElementClassification::Basic,
            ElementDescriptor::Embeddable { .. } => ElementClassification::Embeddable,
            ElementDescriptor::OneToMany { .. } => ElementClassification::OneToMany,
            ElementDescriptor::ManyToMany { .. } => ElementClassification::ManyToMany,
            ElementDescriptor::Any { .. } => ElementClassification::Any,
        }
    }

    /// The element entity name of entity-valued collections
    #[must_use]
    pub fn referenced_entity_name(&self) -> Option<&str> {
        match self {
            ElementDescriptor::OneToMany {
                referenced_entity_name,
                ..
            }
            | ElementDescriptor::ManyToMany {
                referenced_entity_name,
                ..
            } => Some(referenced_entity_name),
            ElementDescriptor::Basic { .. }
            | ElementDescriptor::Embeddable { .. }
            | ElementDescriptor::Any { .. } => None,
        }
    }

    /// The resolved element entity, once the second pass ran
    #[must_use]
    pub fn target(&self) -> Option<EntityBindingRc> {
        match self {
            ElementDescriptor::OneToMany { target, .. }
            | ElementDescriptor::ManyToMany { target, .. } => {
                target.get().and_then(EntityBindingRef::upgrade)
            }
            ElementDescriptor::Basic { .. }
            | ElementDescriptor::Embeddable { .. }
            | ElementDescriptor::Any { .. } => None,
        }
    }

    /// Columns of the collection table mapped by the element
    ///
    /// One-to-many elements map no collection table columns.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        match self {
            ElementDescriptor::Basic { columns, .. }
            | ElementDescriptor::ManyToMany { columns, .. }
            | ElementDescriptor::Any { columns, .. } => columns.clone(),
            ElementDescriptor::Embeddable { component } => component.column_names(),
            ElementDescriptor::OneToMany { .. } => Vec::new(),
        }
    }
}

/// How elements of an indexed collection are addressed.
#[derive(Debug)]
pub enum IndexDescriptor {
    /// A basic list position or map key
    Basic {
        /// Index type
        java_type: Arc<JavaType>,
        /// Index columns
        columns: Vec<String>,
        /// First list position
        base: u32,
    },
    /// A component map key
    Embeddable {
        /// The key component
        component: Arc<EmbeddableDescriptor>,
    },
    /// An entity map key
    ManyToMany {
        /// Key entity
        referenced_entity_name: String,
        /// Columns referencing the key entity
        columns: Vec<String>,
        /// Resolved key entity
        target: OnceLock<EntityBindingRef>,
    },
    /// A polymorphic reference map key
    Any {
        /// Identifier type of the referenced entities
        id_type: Arc<JavaType>,
        /// Type of the discriminating meta column
        meta_type: Option<String>,
        /// Meta column followed by identifier columns
        columns: Vec<String>,
    },
}

impl IndexDescriptor {
    /// Index columns
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        match self {
            IndexDescriptor::Basic { columns, .. }
            | IndexDescriptor::ManyToMany { columns, .. }
            | IndexDescriptor::Any { columns, .. } => columns.clone(),
            IndexDescriptor::Embeddable { component } => component.column_names(),
        }
    }

    /// The element classification of the index, sharing the element vocabulary
    #[must_use]
    pub fn classification(&self) -> ElementClassification {
        match self {
            IndexDescriptor::Basic { .. } => ElementClassification::Basic,
            IndexDescriptor::Embeddable { .. } => ElementClassification::Embeddable,
            IndexDescriptor::ManyToMany { .. } => ElementClassification::ManyToMany,
            IndexDescriptor::Any { .. } => ElementClassification::Any,
        }
    }
}

/// The surrogate row key of an id-bag.
#[derive(Debug, Clone)]
pub struct IdDescriptor {
    /// Surrogate key column
    pub column: String,
    /// Surrogate key type
    pub java_type: Arc<JavaType>,
    /// Value generation
    pub generator: IdGenerator,
}

/// A bound collection-valued attribute.
///
/// Constructed with the information its mapping provides. Cross-entity references (element
/// entity, key columns on the element table, foreign keys) are resolved by
/// [`PluralAttributeBinding::finish_initialization`] once every entity exists.
#[derive(Debug)]
pub struct PluralAttributeBinding {
    /// `owningEntityName.attributePath`
    pub role: String,
    /// Entity owning the collection
    pub owner_entity_name: String,
    /// Attribute name inside its container
    pub attribute_name: String,
    /// Collection semantics
    pub nature: PluralAttributeNature,
    /// Collection table; absent for one-to-many, which uses the element entity's table
    pub table: Option<TableReference>,
    /// Key referencing the owner
    pub key: PluralAttributeKey,
    /// Whether the other side maintains the association
    pub inverse: bool,
    /// Elements
    pub element: ElementDescriptor,
    /// Index of indexed collections
    pub index: Option<IndexDescriptor>,
    /// Surrogate key of id-bags
    pub id: Option<IdDescriptor>,
    /// Whether the collection loads lazily
    pub lazy: bool,
    /// Whether size and contains queries avoid loading
    pub extra_lazy: bool,
    /// Fetch style
    pub fetch: FetchStyle,
    /// Cascade style
    pub cascade: String,
    /// SQL order by fragment
    pub order_by: Option<String>,
    /// SQL restriction
    pub where_clause: Option<String>,
    /// Batch fetch size
    pub batch_size: Option<u32>,
    /// Whether elements may change
    pub mutable: bool,
    /// Meta attributes of the collection
    pub meta: Arc<MetaAttributeContext>,
    caching: RwLock<Option<Caching>>,
    finished: OnceLock<()>,
}

impl PluralAttributeBinding {
    /// Create a lazy, mutable collection with no index, id or caching
    #[must_use]
    pub fn new(
        owner_entity_name: &str,
        attribute_path: &str,
        nature: PluralAttributeNature,
        key: PluralAttributeKey,
        element: ElementDescriptor,
    ) -> Self {
        PluralAttributeBinding {
            role: format!("{owner_entity_name}.{attribute_path}"),
            owner_entity_name: owner_entity_name.to_string(),
            attribute_name: attribute_path
                .rsplit('.')
                .next()
                .unwrap_or(attribute_path)
                .to_string(),
            nature,
            table: None,
            key,
            inverse: false,
            element,
            index: None,
            id: None,
            lazy: true,
            extra_lazy: false,
            fetch: FetchStyle::Select,
            cascade: crate::metadata::defaults::DEFAULT_CASCADE.to_string(),
            order_by: None,
            where_clause: None,
            batch_size: None,
            mutable: true,
            meta: Arc::new(MetaAttributeContext::new()),
            caching: RwLock::new(None),
            finished: OnceLock::new(),
        }
    }

    /// Element classification
    #[must_use]
    pub fn element_classification(&self) -> ElementClassification {
        self.element.classification()
    }

    /// Whether elements are entities holding the key on their own table
    #[must_use]
    pub fn is_one_to_many(&self) -> bool {
        self.element_classification() == ElementClassification::OneToMany
    }

    /// Whether the collection has an index
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Cache settings
    #[must_use]
    pub fn caching(&self) -> Option<Caching> {
        self.caching
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the cache settings
    pub fn set_caching(&self, caching: Option<Caching>) {
        *self.caching.write().unwrap_or_else(PoisonError::into_inner) = caching;
    }

    /// Whether the second pass ran
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.finished.get().is_some()
    }

    /// Resolve references to other entities
    ///
    /// Resolves the element and index entities, places the key (and index) columns of a
    /// one-to-many on the element table, and adds the foreign keys of the collection table.
    /// Running it again has no further effect.
    ///
    /// ## Arguments
    /// * 'owner'   - The owning entity
    /// * 'lookup'  - Entity lookup by name
    ///
    /// # Errors
    /// Returns a mapping error if the element or index entity is not mapped.
    pub fn finish_initialization<F>(&self, owner: &EntityBindingRc, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<EntityBindingRc>,
    {
        if self.is_initialized() {
            return Ok(());
        }

        let resolve = |name: &str| {
            lookup(name).ok_or_else(|| {
                mapping_error!(
                    "Association references unmapped class: {} (collection {})",
                    name,
                    self.role
                )
            })
        };

        let owner_table = owner.primary_table.physical().cloned();

        match &self.element {
            ElementDescriptor::OneToMany {
                referenced_entity_name,
                target,
            } => {
                let element_entity = resolve(referenced_entity_name)?;
                let _ = target.set(EntityBindingRef::new(&element_entity));

                if let TableReference::Physical(element_table) = &element_entity.primary_table {
                    let mut owned = self.key.columns.clone();
                    if let Some(index) = &self.index {
                        owned.extend(index.column_names());
                    }
                    for name in &owned {
                        element_table.locate_or_create_column(
                            Column::new(Identifier::to_identifier(name))
                                .nullable(self.key.nullable),
                        );
                    }
                    if let Some(owner_table) = &owner_table {
                        element_table.add_foreign_key(
                            self.key.columns.clone(),
                            owner_table,
                            Vec::new(),
                        );
                    }
                }
            }
            ElementDescriptor::ManyToMany {
                referenced_entity_name,
                columns,
                target,
                ..
            } => {
                let element_entity = resolve(referenced_entity_name)?;
                let _ = target.set(EntityBindingRef::new(&element_entity));

                if let (Some(TableReference::Physical(table)), Some(element_table)) =
                    (&self.table, element_entity.primary_table.physical())
                {
                    table.add_foreign_key(columns.clone(), element_table, Vec::new());
                }
            }
            ElementDescriptor::Basic { .. }
            | ElementDescriptor::Embeddable { .. }
            | ElementDescriptor::Any { .. } => {}
        }

        if let Some(IndexDescriptor::ManyToMany {
            referenced_entity_name,
            target,
            ..
        }) = &self.index
        {
            let index_entity = resolve(referenced_entity_name)?;
            let _ = target.set(EntityBindingRef::new(&index_entity));
        }

        if let (Some(TableReference::Physical(table)), Some(owner_table)) =
            (&self.table, &owner_table)
        {
            if self.key.property_ref.is_none() {
                table.add_foreign_key(self.key.columns.clone(), owner_table, Vec::new());
            }
        }

        let _ = self.finished.set(());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(columns: &[&str]) -> PluralAttributeKey {
        PluralAttributeKey {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            property_ref: None,
            nullable: true,
            updatable: true,
            cascade_delete: false,
        }
    }

    #[test]
    fn test_role_and_attribute_name() {
        let binding = PluralAttributeBinding::new(
            "p.Order",
            "shipping.labels",
            PluralAttributeNature::List,
            key(&["ORDER_ID"]),
            ElementDescriptor::OneToMany {
                referenced_entity_name: "p.Label".to_string(),
                target: OnceLock::new(),
            },
        );
        assert_eq!(binding.role, "p.Order.shipping.labels");
        assert_eq!(binding.attribute_name, "labels");
        assert!(binding.is_one_to_many());
        assert!(binding.nature.is_indexed());
        assert!(!binding.is_initialized());
        assert_eq!(
            binding.element.referenced_entity_name(),
            Some("p.Label")
        );
    }

    #[test]
    fn test_nature_parse() {
        use std::str::FromStr;
        assert_eq!(
            PluralAttributeNature::from_str("primitive-array").unwrap(),
            PluralAttributeNature::PrimitiveArray
        );
        assert!(!PluralAttributeNature::Bag.is_indexed());
        assert!(PluralAttributeNature::Map.is_indexed());
    }
}

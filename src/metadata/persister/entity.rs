use std::sync::Arc;

use crate::metadata::{
    binding::{AttributeBinding, EntityBindingRc, InheritanceStrategy},
    relational::TableReference,
};

/// SQL literals a discriminator value may take without quoting
const DISCRIMINATOR_KEYWORDS: [&str; 2] = ["null", "not null"];

/// The runtime view of one entity: the tables it spans and the columns keying them.
///
/// Everything an entity persister exposes is derived from its binding and the bindings of
/// its hierarchy, which are complete once the metadata is built. It is therefore created in
/// a single step, ahead of the collection persisters that refer to it.
#[derive(Debug)]
pub struct EntityPersister {
    binding: EntityBindingRc,
    table_closure: Vec<TableReference>,
    query_spaces: Vec<String>,
    subclass_closure: Vec<String>,
}

impl EntityPersister {
    /// Create the persister of an entity
    ///
    /// ## Arguments
    /// * 'binding' - The bound entity, with its hierarchy in place
    #[must_use]
    pub fn new(binding: EntityBindingRc) -> Self {
        let strategy = binding.hierarchy.strategy();
        let table_closure = match strategy {
            InheritanceStrategy::None | InheritanceStrategy::Union => {
                vec![binding.primary_table.clone()]
            }
            InheritanceStrategy::Discriminator => {
                vec![root_of(&binding).primary_table.clone()]
            }
            InheritanceStrategy::Joined => joined_chain(&binding),
        };

        let mut subclass_closure = vec![binding.entity_name.clone()];
        collect_subclasses(&binding, &mut subclass_closure);

        let query_spaces = match strategy {
            InheritanceStrategy::Union => {
                let mut spaces = Vec::new();
                if !binding.is_abstract {
                    spaces.push(binding.primary_table.query_text());
                }
                let mut descendants = Vec::new();
                collect_subclass_bindings(&binding, &mut descendants);
                for descendant in descendants.iter().filter(|entity| !entity.is_abstract) {
                    let text = descendant.primary_table.query_text();
                    if !spaces.contains(&text) {
                        spaces.push(text);
                    }
                }
                spaces
            }
            _ => table_closure.iter().map(TableReference::query_text).collect(),
        };

        EntityPersister {
            binding,
            table_closure,
            query_spaces,
            subclass_closure,
        }
    }

    /// The entity name
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.binding.entity_name
    }

    /// The binding this persister was built from
    #[must_use]
    pub fn binding(&self) -> &EntityBindingRc {
        &self.binding
    }

    /// Inheritance strategy of the hierarchy
    #[must_use]
    pub fn strategy(&self) -> InheritanceStrategy {
        self.binding.hierarchy.strategy()
    }

    /// Tables holding the state of this entity
    ///
    /// A joined subclass spans its whole supertype chain, listed from the root table down to
    /// its own. Every other strategy reads one table.
    #[must_use]
    pub fn table_closure(&self) -> &[TableReference] {
        &self.table_closure
    }

    /// The table new instances are inserted into first
    #[must_use]
    pub fn root_table(&self) -> &TableReference {
        self.table_closure
            .first()
            .unwrap_or(&self.binding.primary_table)
    }

    /// The table of this entity itself
    #[must_use]
    pub fn table(&self) -> &TableReference {
        &self.binding.primary_table
    }

    /// Tables a polymorphic query over this entity must read
    ///
    /// For union subclasses these are the tables of every concrete class in the subclass
    /// closure.
    #[must_use]
    pub fn query_spaces(&self) -> &[String] {
        &self.query_spaces
    }

    /// Identifier columns of the hierarchy root
    #[must_use]
    pub fn identifier_column_names(&self) -> Vec<String> {
        self.binding.hierarchy.identifier.column_names()
    }

    /// Columns keying the table of this entity
    ///
    /// These differ from the identifier columns for joined subclasses mapping their own key.
    #[must_use]
    pub fn key_column_names(&self) -> Vec<String> {
        if self.binding.key_columns.is_empty() {
            self.identifier_column_names()
        } else {
            self.binding.key_columns.clone()
        }
    }

    /// The discriminator value as it appears in SQL, for entities of a discriminated hierarchy
    #[must_use]
    pub fn discriminator_sql_value(&self) -> Option<String> {
        let discriminator = self.binding.hierarchy.discriminator.as_ref()?;
        let value = self
            .binding
            .discriminator_value
            .clone()
            .unwrap_or_else(|| self.binding.entity_name.clone());

        let numeric = discriminator
            .java_type
            .basic_kind()
            .map(|kind| kind.is_numeric())
            .unwrap_or(false);
        if numeric || DISCRIMINATOR_KEYWORDS.contains(&value.as_str()) {
            Some(value)
        } else {
            Some(format!("'{}'", value.replace('\'', "''")))
        }
    }

    /// This entity followed by all of its subtypes, depth first
    #[must_use]
    pub fn subclass_closure(&self) -> &[String] {
        &self.subclass_closure
    }

    /// Whether instances can be updated
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.binding.mutable && self.binding.hierarchy.mutable && self.table().is_updatable()
    }

    /// Whether the entity has a supertype
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        !self.binding.is_root()
    }

    /// Columns of an attribute declared by this entity or one of its supertypes
    #[must_use]
    pub fn attribute_column_names(&self, name: &str) -> Option<Vec<String>> {
        let mut current = Some(self.binding.clone());
        while let Some(entity) = current {
            if let Some(attribute) = entity.attribute(name) {
                return Some(attribute.column_names());
            }
            current = entity.super_entity();
        }
        None
    }

    /// Names of attributes this persister writes, including synthetic back references
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(self.binding.clone());
        while let Some(entity) = current {
            current = entity.super_entity();
            chain.push(entity);
        }
        chain
            .iter()
            .rev()
            .flat_map(|entity| entity.attribute_names())
            .collect()
    }

    /// Whether the entity writes a synthetic attribute for the given collection role
    #[must_use]
    pub fn has_back_reference(&self, role: &str) -> bool {
        self.binding.attributes.iter().any(|(_, attribute)| match attribute {
            AttributeBinding::BackRef(backref) => backref.collection_role == role,
            _ => false,
        })
    }
}

fn root_of(binding: &EntityBindingRc) -> EntityBindingRc {
    let mut root = binding.clone();
    while let Some(super_entity) = root.super_entity() {
        root = super_entity;
    }
    root
}

fn joined_chain(binding: &EntityBindingRc) -> Vec<TableReference> {
    let mut chain: Vec<TableReference> = Vec::new();
    let mut current = Some(binding.clone());
    while let Some(entity) = current {
        if !chain
            .iter()
            .any(|table| table.same_table(&entity.primary_table))
        {
            chain.push(entity.primary_table.clone());
        }
        current = entity.super_entity();
    }
    chain.reverse();
    chain
}

fn collect_subclass_bindings(binding: &EntityBindingRc, into: &mut Vec<EntityBindingRc>) {
    for (_, sub) in binding.sub_entities.iter() {
        if let Some(sub) = sub.upgrade() {
            into.push(sub.clone());
            collect_subclass_bindings(&sub, into);
        }
    }
}

fn collect_subclasses(binding: &EntityBindingRc, into: &mut Vec<String>) {
    let mut descendants = Vec::new();
    collect_subclass_bindings(binding, &mut descendants);
    into.extend(descendants.iter().map(|entity| entity.entity_name.clone()));
}

/// A reference-counted entity persister
pub type EntityPersisterRc = Arc<EntityPersister>;

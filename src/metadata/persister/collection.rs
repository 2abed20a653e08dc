use std::sync::{Arc, OnceLock};

use log::trace;

use crate::{
    metadata::{
        binding::{ElementClassification, FetchStyle, PluralAttributeBindingRc},
        persister::EntityPersisterRc,
        relational::TableReference,
    },
    Error::NotInitialized,
    Result,
};

#[derive(Debug)]
struct CollectionPersisterState {
    table: TableReference,
    element_persister: Option<EntityPersisterRc>,
    key_target_columns: Vec<String>,
}

/// The runtime view of one collection role.
///
/// Created in two steps. [`CollectionPersister::new`] only records the binding and its owner;
/// [`CollectionPersister::finish_initialization`] resolves the element persister and the
/// table rows live in. Until then every navigation method fails with
/// [`crate::Error::NotInitialized`].
#[derive(Debug)]
pub struct CollectionPersister {
    binding: PluralAttributeBindingRc,
    owner: EntityPersisterRc,
    state: OnceLock<CollectionPersisterState>,
}

impl CollectionPersister {
    /// Create an uninitialized persister
    ///
    /// ## Arguments
    /// * 'binding' - The bound collection
    /// * 'owner'   - Persister of the owning entity
    #[must_use]
    pub fn new(binding: PluralAttributeBindingRc, owner: EntityPersisterRc) -> Self {
        CollectionPersister {
            binding,
            owner,
            state: OnceLock::new(),
        }
    }

    /// The collection role
    #[must_use]
    pub fn role(&self) -> &str {
        &self.binding.role
    }

    /// The binding this persister was built from
    #[must_use]
    pub fn binding(&self) -> &PluralAttributeBindingRc {
        &self.binding
    }

    /// Persister of the owning entity
    #[must_use]
    pub fn owner(&self) -> &EntityPersisterRc {
        &self.owner
    }

    /// Whether [`CollectionPersister::finish_initialization`] ran
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// Resolve the element persister and the table holding collection rows
    ///
    /// One-to-many collections live in the table of their element entity. Running it again
    /// has no further effect.
    ///
    /// ## Arguments
    /// * 'lookup' - Entity persister lookup by entity name
    ///
    /// # Errors
    /// Returns a mapping error if the element entity has no persister, if a collection other
    /// than one-to-many has no table, or if the key references an owner attribute that does
    /// not exist.
    pub fn finish_initialization<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<EntityPersisterRc>,
    {
        if self.is_initialized() {
            return Ok(());
        }

        let element_persister = match self.binding.element.referenced_entity_name() {
            Some(entity_name) => Some(lookup(entity_name).ok_or_else(|| {
                mapping_error!(
                    "Collection {} references entity {} without persister",
                    self.binding.role,
                    entity_name
                )
            })?),
            None => None,
        };

        let table = match (&self.binding.table, &element_persister) {
            (Some(table), _) => table.clone(),
            (None, Some(element)) if self.binding.is_one_to_many() => element.table().clone(),
            _ => {
                return Err(mapping_error!(
                    "Collection {} has no collection table",
                    self.binding.role
                ))
            }
        };

        let key_target_columns = match &self.binding.key.property_ref {
            Some(property) => self.owner.attribute_column_names(property).ok_or_else(|| {
                mapping_error!(
                    "Collection {} references unknown property {} of {}",
                    self.binding.role,
                    property,
                    self.owner.entity_name()
                )
            })?,
            None => self.owner.identifier_column_names(),
        };

        trace!("Initialized collection persister {}", self.binding.role);
        let _ = self.state.set(CollectionPersisterState {
            table,
            element_persister,
            key_target_columns,
        });
        Ok(())
    }

    fn state(&self) -> Result<&CollectionPersisterState> {
        self.state
            .get()
            .ok_or_else(|| NotInitialized(self.binding.role.clone()))
    }

    /// The table holding collection rows; derived for a `subselect` mapping
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn table(&self) -> Result<&TableReference> {
        Ok(&self.state()?.table)
    }

    /// Persister of the element entity, for entity-valued collections
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn element_persister(&self) -> Result<Option<&EntityPersisterRc>> {
        Ok(self.state()?.element_persister.as_ref())
    }

    /// Columns referencing the owner
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn key_column_names(&self) -> Result<Vec<String>> {
        self.state()?;
        Ok(self.binding.key.columns.clone())
    }

    /// Owner columns the key references: its identifier, or the `property-ref` columns
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn key_target_column_names(&self) -> Result<Vec<String>> {
        Ok(self.state()?.key_target_columns.clone())
    }

    /// Columns holding the element
    ///
    /// The element of a one-to-many is the identifier of the element entity.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn element_column_names(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        match (&state.element_persister, self.binding.is_one_to_many()) {
            (Some(element), true) => Ok(element.identifier_column_names()),
            _ => Ok(self.binding.element.column_names()),
        }
    }

    /// Columns holding the list position or map key; empty when not indexed
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn index_column_names(&self) -> Result<Vec<String>> {
        self.state()?;
        Ok(self
            .binding
            .index
            .as_ref()
            .map(|index| index.column_names())
            .unwrap_or_default())
    }

    /// The surrogate key column of an id-bag
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn identifier_column_name(&self) -> Result<Option<String>> {
        self.state()?;
        Ok(self.binding.id.as_ref().map(|id| id.column.clone()))
    }

    /// Whether rows may be written; derived tables never are
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn is_updatable(&self) -> Result<bool> {
        Ok(self.state()?.table.is_updatable() && self.binding.mutable)
    }

    /// Whether elements are entities keyed on their own table
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn is_one_to_many(&self) -> Result<bool> {
        self.state()?;
        Ok(self.binding.is_one_to_many())
    }

    /// Whether elements are entities linked through the collection table
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn is_many_to_many(&self) -> Result<bool> {
        self.state()?;
        Ok(self.binding.element_classification() == ElementClassification::ManyToMany)
    }

    /// Whether the other side of the association maintains it
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn is_inverse(&self) -> Result<bool> {
        self.state()?;
        Ok(self.binding.inverse)
    }

    /// Whether the collection loads with a subselect over the owner query
    ///
    /// # Errors
    /// Returns [`crate::Error::NotInitialized`] before the second step.
    pub fn is_subselect_loadable(&self) -> Result<bool> {
        self.state()?;
        Ok(self.binding.fetch == FetchStyle::Subselect)
    }
}

/// A reference-counted collection persister
pub type CollectionPersisterRc = Arc<CollectionPersister>;

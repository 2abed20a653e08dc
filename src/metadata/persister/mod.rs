//! Runtime views of the bound entities and collections.
//!
//! Persisters are built from a finished [`Metadata`] in two phases. Entity persisters are
//! created first; collection persisters are created next and then initialized, resolving the
//! persisters of their element entities.
//!
//! # Key Components
//!
//! - [`EntityPersister`]: the table closure of an entity under its inheritance strategy
//! - [`CollectionPersister`]: key, element, index and id columns of a collection role
//! - [`PersisterRegistry`]: all persisters of one [`Metadata`]

mod collection;
mod entity;

pub use collection::{CollectionPersister, CollectionPersisterRc};
pub use entity::{EntityPersister, EntityPersisterRc};

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use log::debug;

use crate::{
    metadata::{model::Metadata, MetadataImplementor},
    Result,
};

/// Entity and collection persisters keyed by entity name and collection role.
pub struct PersisterRegistry {
    entities: SkipMap<String, EntityPersisterRc>,
    collections: SkipMap<String, CollectionPersisterRc>,
}

impl PersisterRegistry {
    /// Build the persisters of every entity and collection
    ///
    /// ## Arguments
    /// * 'metadata' - The finished metadata
    ///
    /// # Errors
    /// Returns a mapping error if a collection belongs to, or holds, an entity without
    /// persister.
    pub fn build(metadata: &Metadata) -> Result<Self> {
        let registry = PersisterRegistry {
            entities: SkipMap::new(),
            collections: SkipMap::new(),
        };

        for entity in metadata.entity_bindings() {
            registry.entities.insert(
                entity.entity_name.clone(),
                Arc::new(EntityPersister::new(entity)),
            );
        }

        for collection in metadata.collection_bindings() {
            let owner = registry
                .entity_persister(&collection.owner_entity_name)
                .ok_or_else(|| {
                    mapping_error!(
                        "Collection {} belongs to unknown entity {}",
                        collection.role,
                        collection.owner_entity_name
                    )
                })?;
            registry.collections.insert(
                collection.role.clone(),
                Arc::new(CollectionPersister::new(collection.clone(), owner)),
            );
        }

        for entry in registry.collections.iter() {
            entry
                .value()
                .finish_initialization(|name| registry.entity_persister(name))?;
        }

        debug!(
            "Built {} entity and {} collection persisters",
            registry.entities.len(),
            registry.collections.len()
        );
        Ok(registry)
    }

    /// Look up the persister of an entity
    #[must_use]
    pub fn entity_persister(&self, entity_name: &str) -> Option<EntityPersisterRc> {
        self.entities
            .get(entity_name)
            .map(|entry| entry.value().clone())
    }

    /// Look up the persister of a collection role
    #[must_use]
    pub fn collection_persister(&self, role: &str) -> Option<CollectionPersisterRc> {
        self.collections.get(role).map(|entry| entry.value().clone())
    }

    /// All entity persisters, ordered by entity name
    #[must_use]
    pub fn entity_persisters(&self) -> Vec<EntityPersisterRc> {
        self.entities
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All collection persisters, ordered by role
    #[must_use]
    pub fn collection_persisters(&self) -> Vec<CollectionPersisterRc> {
        self.collections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::builder::MetadataSources, Error};

    fn build(xml: &str) -> (Metadata, PersisterRegistry) {
        let mut sources = MetadataSources::new();
        sources.add_hbm_xml_str(xml, "persister.hbm.xml").unwrap();
        let metadata = sources.build_metadata().unwrap();
        let registry = PersisterRegistry::build(&metadata).unwrap();
        (metadata, registry)
    }

    #[test]
    fn test_joined_table_closure() {
        let (_, registry) = build(
            r#"<hibernate-mapping package="zoo">
                <class name="Animal" table="ANIMAL"><id name="id" column="ID" type="long"/>
                    <joined-subclass name="Mammal" table="MAMMAL">
                        <key column="MAMMAL_ID"/>
                        <joined-subclass name="Dog" table="DOG">
                            <key column="DOG_ID"/>
                        </joined-subclass>
                    </joined-subclass>
                </class>
            </hibernate-mapping>"#,
        );

        let dog = registry.entity_persister("zoo.Dog").unwrap();
        let tables: Vec<String> = dog
            .table_closure()
            .iter()
            .map(|table| table.logical_name().text().to_string())
            .collect();
        assert_eq!(tables, vec!["ANIMAL", "MAMMAL", "DOG"]);
        assert_eq!(dog.root_table().logical_name().text(), "ANIMAL");
        assert_eq!(dog.identifier_column_names(), vec!["ID"]);
        assert_eq!(dog.key_column_names(), vec!["DOG_ID"]);

        let animal = registry.entity_persister("zoo.Animal").unwrap();
        assert_eq!(animal.subclass_closure(), ["zoo.Animal", "zoo.Mammal", "zoo.Dog"]);
        assert_eq!(animal.table_closure().len(), 1);
    }

    #[test]
    fn test_discriminator_and_union() {
        let (_, registry) = build(
            r#"<hibernate-mapping package="pay">
                <class name="Payment" table="PAYMENT" discriminator-value="P">
                    <id name="id" type="long"/>
                    <discriminator column="KIND" type="string"/>
                    <subclass name="Card" discriminator-value="C"/>
                </class>
                <class name="Account" abstract="true"><id name="id" type="long"/>
                    <union-subclass name="Savings" table="SAVINGS"/>
                    <union-subclass name="Checking" table="CHECKING"/>
                </class>
            </hibernate-mapping>"#,
        );

        let card = registry.entity_persister("pay.Card").unwrap();
        assert_eq!(card.table_closure()[0].logical_name().text(), "PAYMENT");
        assert_eq!(card.discriminator_sql_value().as_deref(), Some("'C'"));

        let account = registry.entity_persister("pay.Account").unwrap();
        assert_eq!(account.query_spaces(), ["SAVINGS", "CHECKING"]);
        assert!(account.discriminator_sql_value().is_none());
    }

    #[test]
    fn test_collection_persisters() {
        let (metadata, registry) = build(
            r#"<hibernate-mapping package="shop">
                <class name="Order" table="ORDERS"><id name="id" column="ID" type="long"/>
                    <list name="lines">
                        <key column="ORDER_ID" not-null="true"/>
                        <list-index column="POS"/>
                        <one-to-many class="Line"/>
                    </list>
                    <set name="tags" table="ORDER_TAGS" fetch="subselect">
                        <key column="ORDER_ID"/>
                        <element column="TAG" type="string"/>
                    </set>
                    <bag name="archived" subselect="select * from ARCHIVE">
                        <key column="ORDER_ID"/>
                        <element column="NOTE" type="string"/>
                    </bag>
                </class>
                <class name="Line" table="LINES"><id name="id" column="LINE_ID" type="long"/></class>
            </hibernate-mapping>"#,
        );

        let lines = registry.collection_persister("shop.Order.lines").unwrap();
        assert!(lines.is_one_to_many().unwrap());
        assert!(!lines.is_many_to_many().unwrap());
        assert_eq!(lines.table().unwrap().logical_name().text(), "LINES");
        assert_eq!(lines.element_column_names().unwrap(), vec!["LINE_ID"]);
        assert_eq!(lines.index_column_names().unwrap(), vec!["POS"]);
        assert_eq!(lines.key_target_column_names().unwrap(), vec!["ID"]);
        assert_eq!(
            lines.element_persister().unwrap().unwrap().entity_name(),
            "shop.Line"
        );
        assert!(registry
            .entity_persister("shop.Line")
            .unwrap()
            .has_back_reference("shop.Order.lines"));

        let tags = registry.collection_persister("shop.Order.tags").unwrap();
        assert!(tags.is_subselect_loadable().unwrap());
        assert!(tags.is_updatable().unwrap());
        assert!(tags.element_persister().unwrap().is_none());

        let archived = registry.collection_persister("shop.Order.archived").unwrap();
        assert!(!archived.is_updatable().unwrap());

        let fresh = CollectionPersister::new(
            metadata.get_collection("shop.Order.lines").unwrap(),
            registry.entity_persister("shop.Order").unwrap(),
        );
        assert!(matches!(fresh.element_persister(), Err(Error::NotInitialized(_))));
        assert!(matches!(fresh.is_inverse(), Err(Error::NotInitialized(_))));
    }
}

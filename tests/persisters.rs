//! Integration tests for persisters built from finished metadata.

use std::sync::Arc;

use ormbind::{metadata::persister::CollectionPersister, prelude::*, Error};

#[test]
fn test_joined_closure_lists_root_first() -> Result<()> {
    let mut sources = MetadataSources::new();
    sources
        .add_annotated_class(
            ClassDescriptor::new("bank.Cheque")
                .extends("bank.Payment")
                .annotated(ClassAnnotation::Entity { name: None })
                .attribute(AttributeDescriptor::new("bank", "string")),
        )
        .add_annotated_class(
            ClassDescriptor::new("bank.Payment")
                .annotated(ClassAnnotation::Entity { name: None })
                .annotated(ClassAnnotation::Inheritance(InheritanceType::Joined))
                .attribute(AttributeDescriptor::new("id", "long").annotated(AttributeAnnotation::Id))
                .attribute(AttributeDescriptor::new("amount", "java.math.BigDecimal")),
        );
    let metadata = sources.build_metadata()?;
    let registry = PersisterRegistry::build(&metadata)?;

    let cheque = registry.entity_persister("bank.Cheque").unwrap();
    let closure: Vec<&str> = cheque
        .table_closure()
        .iter()
        .map(|table| table.logical_name().text())
        .collect();
    assert_eq!(closure, vec!["Payment", "Cheque"]);
    assert!(cheque.is_inherited());
    assert_eq!(cheque.identifier_column_names(), vec!["id"]);

    let payment = registry.entity_persister("bank.Payment").unwrap();
    assert_eq!(payment.subclass_closure(), ["bank.Payment", "bank.Cheque"]);
    Ok(())
}

const LIBRARY_XML: &str = r#"<hibernate-mapping package="lib">
    <class name="Shelf" table="SHELVES"><id name="id" column="SHELF_ID" type="long"/>
        <bag name="loans" table="(select * from LOANS where returned = 0)" mutable="true">
            <key column="SHELF_ID"/>
            <element column="TITLE" type="string"/>
        </bag>
        <set name="books" inverse="true">
            <key column="SHELF_ID"/>
            <one-to-many class="Book"/>
        </set>
        <idbag name="labels" table="SHELF_LABELS">
            <collection-id column="LABEL_ID" type="long"/>
            <key column="SHELF_ID"/>
            <many-to-many class="Label" column="LABEL_REF"/>
        </idbag>
    </class>
    <class name="Book" table="BOOKS"><id name="id" column="BOOK_ID" type="long"/>
        <many-to-one name="shelf" class="Shelf" column="SHELF_ID"/>
    </class>
    <class name="Label" table="LABELS"><id name="id" column="LABEL_ID" type="long"/></class>
</hibernate-mapping>"#;

#[test]
fn test_collection_persisters() -> Result<()> {
    let mut sources = MetadataSources::new();
    sources.add_hbm_xml_str(LIBRARY_XML, "library.hbm.xml")?;
    let metadata = sources.build_metadata()?;
    let registry = PersisterRegistry::build(&metadata)?;
    assert_eq!(registry.collection_persisters().len(), 3);

    let loans = registry.collection_persister("lib.Shelf.loans").unwrap();
    assert!(!loans.table()?.is_updatable());
    assert!(!loans.is_updatable()?);
    assert!(loans.table()?.query_text().starts_with("( select"));

    let books = registry.collection_persister("lib.Shelf.books").unwrap();
    assert!(books.is_inverse()?);
    assert!(books.is_one_to_many()?);
    assert_eq!(books.table()?.logical_name().text(), "BOOKS");
    assert!(!registry
        .entity_persister("lib.Book")
        .unwrap()
        .has_back_reference("lib.Shelf.books"));

    let labels = registry.collection_persister("lib.Shelf.labels").unwrap();
    assert!(labels.is_many_to_many()?);
    assert_eq!(labels.identifier_column_name()?.as_deref(), Some("LABEL_ID"));
    assert_eq!(labels.element_column_names()?, vec!["LABEL_REF"]);
    assert_eq!(labels.key_column_names()?, vec!["SHELF_ID"]);
    assert_eq!(labels.key_target_column_names()?, vec!["SHELF_ID"]);
    assert_eq!(
        labels.element_persister()?.map(|element| element.entity_name()),
        Some("lib.Label")
    );
    Ok(())
}

#[test]
fn test_uninitialized_collection_persister() -> Result<()> {
    let mut sources = MetadataSources::new();
    sources.add_hbm_xml_str(LIBRARY_XML, "library.hbm.xml")?;
    let metadata = sources.build_metadata()?;
    let registry = PersisterRegistry::build(&metadata)?;

    let persister = CollectionPersister::new(
        metadata.get_collection("lib.Shelf.labels").unwrap(),
        registry.entity_persister("lib.Shelf").unwrap(),
    );
    assert!(matches!(
        persister.element_persister(),
        Err(Error::NotInitialized(role)) if role == "lib.Shelf.labels"
    ));
    assert!(matches!(persister.table(), Err(Error::NotInitialized(_))));

    persister.finish_initialization(|name| registry.entity_persister(name))?;
    assert!(persister.element_persister()?.is_some());
    assert!(Arc::ptr_eq(
        persister.owner(),
        &registry.entity_persister("lib.Shelf").unwrap()
    ));
    Ok(())
}

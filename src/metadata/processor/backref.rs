use log::trace;

use crate::{
    metadata::{
        binding::{AttributeBinding, BackRefAttributeBinding},
        collector::MetadataCollector,
        MetadataImplementor,
    },
    Result,
};

/// Give the element entity of every unidirectional, non-nullable one-to-many collection a
/// synthetic attribute holding the collection key, plus one holding the list position or map
/// key when the collection is indexed.
///
/// The element entity writes those columns itself, since no collection table exists to hold
/// them.
///
/// # Errors
/// Returns a mapping error if a collection references an entity that is not bound.
pub(crate) fn bind_back_references(collector: &MetadataCollector) -> Result<()> {
    for collection in collector.collection_bindings() {
        if !collection.is_one_to_many() || collection.inverse || collection.key.nullable {
            continue;
        }
        let Some(target_name) = collection.element.referenced_entity_name() else {
            continue;
        };
        let target = collector.get_entity_binding(target_name).ok_or_else(|| {
            mapping_error!(
                "Association {} references unmapped class: {}",
                collection.role,
                target_name
            )
        })?;

        let mirrored = target.attributes.iter().any(|(_, attribute)| {
            attribute
                .as_to_one()
                .map(|to_one| to_one.columns == collection.key.columns)
                .unwrap_or(false)
        });
        let name = format!("_{}BackRef", collection.role);
        if mirrored || target.attribute(&name).is_some() {
            continue;
        }
        trace!("Adding back reference {} to {}", name, target.entity_name);
        target.add_attribute(AttributeBinding::BackRef(BackRefAttributeBinding {
            name,
            collection_role: collection.role.clone(),
            owner_entity_name: collection.owner_entity_name.clone(),
            columns: collection.key.columns.clone(),
            index: false,
        }));

        if let Some(index) = &collection.index {
            target.add_attribute(AttributeBinding::BackRef(BackRefAttributeBinding {
                name: format!("_{}IndexBackRef", collection.role),
                collection_role: collection.role.clone(),
                owner_entity_name: collection.owner_entity_name.clone(),
                columns: index.column_names(),
                index: true,
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::processor::{HbmMetadataSourceProcessor, MetadataSourceProcessor},
        test::{create_collector, create_hbm_document, create_root_context},
    };

    #[test]
    fn test_back_references() {
        let collector = create_collector();
        let document = create_hbm_document(
            r#"<hibernate-mapping package="shop">
                <class name="Order"><id name="id" type="long"/>
                    <list name="lines">
                        <key column="ORDER_ID" not-null="true"/>
                        <list-index column="POS"/>
                        <one-to-many class="Line"/>
                    </list>
                    <set name="notes">
                        <key column="ORDER_ID"/>
                        <one-to-many class="Note"/>
                    </set>
                </class>
                <class name="Line"><id name="id" type="long"/></class>
                <class name="Note"><id name="id" type="long"/></class>
            </hibernate-mapping>"#,
        );
        let processor = HbmMetadataSourceProcessor::new(create_root_context(&collector));
        processor.process_mapping_metadata(&document).unwrap();

        bind_back_references(&collector).unwrap();
        bind_back_references(&collector).unwrap();

        let line = collector.get_entity_binding("shop.Line").unwrap();
        let backrefs: Vec<String> = line
            .attributes
            .iter()
            .filter(|(_, attribute)| attribute.is_synthetic())
            .map(|(_, attribute)| attribute.name().to_string())
            .collect();
        assert_eq!(
            backrefs,
            vec!["_shop.Order.linesBackRef", "_shop.Order.linesIndexBackRef"]
        );

        let note = collector.get_entity_binding("shop.Note").unwrap();
        assert!(note.attribute_names().is_empty());
    }
}

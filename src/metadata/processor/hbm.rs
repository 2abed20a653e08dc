//! Binder for `hbm.xml` mapping documents.
//!
//! Every document opens a new layer of mapping defaults from the attributes of its
//! `<hibernate-mapping>` root (`package`, `schema`, `default-cascade`, ...). Classes,
//! components and collections open nested meta attribute scopes.

use std::{str::FromStr, sync::Arc};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    metadata::{
        binding::{
            AccessType, AttributeBinding, BasicAttributeBinding, Caching,
            DiscriminatorDescriptor, ElementDescriptor, EmbeddableDescriptor,
            EmbeddedAttributeBinding, EntityBinding, EntityBindingRc, EntityBindingRef,
            EntityHierarchy, EntityReturn, FetchStyle, FilterApplication, FilterDefinition,
            IdDescriptor, IdGenerator, IdGeneratorDefinition, IdentifierDescriptor,
            IndexDescriptor, InheritanceStrategy, NamedNativeQueryDefinition,
            NamedQueryDefinition, PluralAttributeBinding, PluralAttributeBindingRc,
            PluralAttributeKey, PluralAttributeNature, ResultSetMappingDefinition, ScalarReturn,
            SecondaryTable, ToOneAttributeBinding, ToOneKind, TypeDefinition, VersionDescriptor,
        },
        context::BindingContext,
        defaults::OverriddenMappingDefaults,
        meta::{MetaAttribute, MetaAttributeContext},
        processor::{add_column, join_path, MappingOutcome, MetadataSourceProcessor},
        relational::{is_derived_table_expression, AuxiliaryDatabaseObject, TableReference},
        source::{entity_name_of, HbmDocument, MetadataSourceType, XmlElement, ENTITY_ELEMENTS, SUBCLASS_ELEMENTS},
        typesystem::{unqualify, JavaType},
        MetadataImplementor,
    },
    Error::UnresolvedExtends,
    Result,
};

/// Column of a basic collection element or many-to-many link that names none.
const DEFAULT_ELEMENT_COLUMN_NAME: &str = "elt";

/// Column of a list position or map key that names none.
const DEFAULT_INDEX_COLUMN_NAME: &str = "idx";

/// Type used when neither the mapping nor a registered class declares one.
const FALLBACK_TYPE_NAME: &str = "serializable";

const COLLECTION_ELEMENTS: [&str; 7] = [
    "set",
    "bag",
    "idbag",
    "list",
    "map",
    "array",
    "primitive-array",
];

/// Where attributes being bound live.
#[derive(Clone, Copy)]
struct AttributeOwner<'e> {
    entity_name: &'e str,
    /// Class consulted for undeclared attribute types
    class_name: Option<&'e str>,
    table: &'e TableReference,
    identifier_columns: &'e [String],
}

/// Attributes bound from one container element, plus every collection found below it.
#[derive(Default)]
struct BoundAttributes {
    attributes: Vec<AttributeBinding>,
    collections: Vec<PluralAttributeBindingRc>,
}

/// Binds `hbm.xml` documents into a [`crate::metadata::MetadataCollector`].
pub struct HbmMetadataSourceProcessor<'a> {
    context: BindingContext<'a>,
}

impl<'a> HbmMetadataSourceProcessor<'a> {
    /// Create a processor
    ///
    /// ## Arguments
    /// * 'context' - The root context; documents layer their own defaults on top of it
    pub fn new(context: BindingContext<'a>) -> Self {
        HbmMetadataSourceProcessor { context }
    }

    fn document_context(&self, document: &HbmDocument) -> BindingContext<'a> {
        let root = document.root();
        let mut layer = OverriddenMappingDefaults::new(self.context.defaults().clone());
        layer.package_name = root.non_empty_attribute("package").map(str::to_string);
        layer.schema_name = root.non_empty_attribute("schema").map(str::to_string);
        layer.catalog_name = root.non_empty_attribute("catalog").map(str::to_string);
        layer.cascade_style = root.non_empty_attribute("default-cascade").map(str::to_string);
        layer.property_access_name = root.non_empty_attribute("default-access").map(str::to_string);
        layer.associations_lazy = root.attribute("default-lazy").map(|value| value == "true");
        layer.auto_import = root.attribute("auto-import").map(|value| value == "true");

        let meta = bind_meta(self.context.meta(), root);
        self.context.with_defaults(Arc::new(layer), meta)
    }

    fn entity_name(ctx: &BindingContext<'_>, element: &XmlElement) -> Result<String> {
        entity_name_of(element, ctx.defaults().package_name())
            .ok_or_else(|| mapping_error!("Unable to determine entity name of <{}>", element.name))
    }

    fn bind_root_class(
        &self,
        ctx: &BindingContext<'a>,
        element: &XmlElement,
    ) -> Result<EntityBindingRc> {
        let entity_name = Self::entity_name(ctx, element)?;
        let meta = bind_meta(ctx.meta(), element);
        let ctx = ctx.with_meta(meta.clone());
        let class_name = element
            .non_empty_attribute("name")
            .map(|name| ctx.qualify_class_name(name));

        let table = self.bind_entity_table(&ctx, element, &entity_name)?;
        let identifier =
            self.bind_identifier(&ctx, element, &entity_name, class_name.as_deref(), &table)?;
        let key_columns = identifier.column_names();
        if let Some(physical) = table.physical() {
            physical.set_primary_key(&key_columns);
        }

        let mut hierarchy = EntityHierarchy::new(&entity_name, InheritanceStrategy::None, identifier);
        hierarchy.discriminator = self.bind_discriminator(&ctx, element, &table);
        hierarchy.version = self.bind_version(&ctx, element, class_name.as_deref(), &table)?;
        hierarchy.mutable = element.bool_attribute("mutable", true);
        hierarchy.explicit_polymorphism = element.attribute("polymorphism") == Some("explicit");
        hierarchy.set_caching(bind_cache(&ctx, element, &entity_name)?);

        let mut entity = EntityBinding::new(&entity_name, Arc::new(hierarchy), table.clone());
        entity.key_columns = key_columns;
        if entity.hierarchy.discriminator.is_some() {
            entity.discriminator_value = Some(
                element
                    .non_empty_attribute("discriminator-value")
                    .unwrap_or(&entity_name)
                    .to_string(),
            );
        }
        apply_entity_settings(&ctx, element, &mut entity, class_name.clone(), meta)?;

        let identifier_columns = entity.key_columns.clone();
        let owner = AttributeOwner {
            entity_name: &entity_name,
            class_name: class_name.as_deref(),
            table: &table,
            identifier_columns: &identifier_columns,
        };
        let mut bound = BoundAttributes::default();
        self.bind_attributes(&ctx, element, &owner, "", &mut bound, false)?;
        for join in element.children_named("join") {
            let secondary = self.bind_join(&ctx, join, &owner, &mut bound)?;
            entity.secondary_tables.push(secondary);
        }

        self.register_entity(&ctx, element, entity, bound, None)
    }

    fn bind_subclass(
        &self,
        ctx: &BindingContext<'a>,
        element: &XmlElement,
        super_entity: &EntityBindingRc,
    ) -> Result<EntityBindingRc> {
        let strategy = match element.name.as_str() {
            "subclass" => InheritanceStrategy::Discriminator,
            "joined-subclass" => InheritanceStrategy::Joined,
            "union-subclass" => InheritanceStrategy::Union,
            other => return Err(mapping_error!("<{}> does not declare a subclass", other)),
        };
        let hierarchy = super_entity.hierarchy.clone();
        hierarchy.promote_strategy(strategy)?;

        let entity_name = Self::entity_name(ctx, element)?;
        let meta = bind_meta(ctx.meta(), element);
        let ctx = ctx.with_meta(meta.clone());
        let class_name = element
            .non_empty_attribute("name")
            .map(|name| ctx.qualify_class_name(name));
        let identifier_columns = hierarchy.identifier.column_names();

        let (table, key_columns) = match strategy {
            InheritanceStrategy::Joined => {
                let table = self.bind_entity_table(&ctx, element, &entity_name)?;
                let key_columns =
                    self.bind_key_columns(&ctx, element.child("key"), &table, &identifier_columns, false);
                if let Some(physical) = table.physical() {
                    physical.set_primary_key(&key_columns);
                }
                (table, key_columns)
            }
            InheritanceStrategy::Union => {
                let table = self.bind_entity_table(&ctx, element, &entity_name)?;
                if let (Some(own), Some(inherited)) =
                    (table.physical(), super_entity.primary_table.physical())
                {
                    for name in inherited.column_names() {
                        if let Some(column) = inherited.get_column(&name) {
                            own.locate_or_create_column(column);
                        }
                    }
                    own.set_primary_key(&identifier_columns);
                }
                (table, identifier_columns.clone())
            }
            _ => (
                super_entity.primary_table.clone(),
                super_entity.key_columns.clone(),
            ),
        };

        let mut entity = EntityBinding::new(&entity_name, hierarchy, table.clone());
        entity.super_entity = Some(EntityBindingRef::new(super_entity));
        entity.key_columns = key_columns;
        entity.discriminator_value = match strategy {
            InheritanceStrategy::Discriminator => Some(
                element
                    .non_empty_attribute("discriminator-value")
                    .unwrap_or(&entity_name)
                    .to_string(),
            ),
            _ => element
                .non_empty_attribute("discriminator-value")
                .map(str::to_string),
        };
        apply_entity_settings(&ctx, element, &mut entity, class_name.clone(), meta)?;

        let owner = AttributeOwner {
            entity_name: &entity_name,
            class_name: class_name.as_deref(),
            table: &table,
            identifier_columns: &identifier_columns,
        };
        let mut bound = BoundAttributes::default();
        self.bind_attributes(&ctx, element, &owner, "", &mut bound, false)?;
        for join in element.children_named("join") {
            let secondary = self.bind_join(&ctx, join, &owner, &mut bound)?;
            entity.secondary_tables.push(secondary);
        }

        self.register_entity(&ctx, element, entity, bound, Some(super_entity))
    }

    /// Register a fully built entity, its collections and imports, then bind the subclasses
    /// nested in its element.
    fn register_entity(
        &self,
        ctx: &BindingContext<'a>,
        element: &XmlElement,
        entity: EntityBinding,
        bound: BoundAttributes,
        super_entity: Option<&EntityBindingRc>,
    ) -> Result<EntityBindingRc> {
        let collector = ctx.collector();
        let entity = Arc::new(entity);
        for attribute in bound.attributes {
            entity.add_attribute(attribute);
        }

        collector.add_entity(entity.clone())?;
        if let Some(super_entity) = super_entity {
            super_entity.add_sub_entity(&entity);
        }
        debug!("Mapping class: {} -> {}", entity.entity_name, entity.primary_table);

        for collection in bound.collections {
            match &collection.table {
                Some(table) => debug!("Mapping collection: {} -> {}", collection.role, table),
                None => debug!("Mapping collection: {} (one-to-many)", collection.role),
            }
            collector.add_collection(collection)?;
        }

        collector.add_import(&entity.entity_name, &entity.entity_name);
        if ctx.defaults().is_auto_import() && entity.entity_name.contains('.') {
            collector.add_import(unqualify(&entity.entity_name), &entity.entity_name);
        }

        for profile in element.children_named("fetch-profile") {
            bind_fetch_profile(ctx, profile, Some(&entity.entity_name))?;
        }

        for child in element
            .children
            .iter()
            .filter(|child| SUBCLASS_ELEMENTS.contains(&child.name.as_str()))
        {
            self.bind_subclass(ctx, child, &entity)?;
        }

        Ok(entity)
    }

    fn bind_top_level_subclasses(
        &self,
        ctx: &BindingContext<'a>,
        mut pending: Vec<&XmlElement>,
    ) -> Result<()> {
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for element in pending {
                match resolve_extends(ctx, element)? {
                    Some(super_entity) => {
                        self.bind_subclass(ctx, element, &super_entity)?;
                    }
                    None => waiting.push(element),
                }
            }

            if waiting.len() == before {
                let missing = waiting
                    .iter()
                    .filter_map(|element| element.attribute("extends"))
                    .collect::<Vec<_>>()
                    .join(",");
                return Err(UnresolvedExtends(format!(
                    "Following super classes referenced in extends not found: {missing}"
                )));
            }
            pending = waiting;
        }
        Ok(())
    }

    fn bind_entity_table(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        entity_name: &str,
    ) -> Result<TableReference> {
        let database = ctx.collector().database();
        let naming = ctx.naming_strategy();
        let logical_name = || ctx.to_identifier(&naming.class_to_table_name(entity_name));

        if let Some(expression) = subselect_of(element) {
            return Ok(TableReference::Derived(
                database.create_derived_table(expression, Some(logical_name())),
            ));
        }

        let name = match element.non_empty_attribute("table") {
            Some(table) if is_derived_table_expression(table) => {
                return Ok(TableReference::Derived(
                    database.create_derived_table(table, Some(logical_name())),
                ));
            }
            Some(table) => naming.table_name(table),
            None => naming.class_to_table_name(entity_name),
        };

        Ok(physical_table(ctx, element, &name))
    }

    fn bind_identifier(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        entity_name: &str,
        class_name: Option<&str>,
        table: &TableReference,
    ) -> Result<IdentifierDescriptor> {
        if let Some(id) = element.child("id") {
            let attribute = id.non_empty_attribute("name").map(str::to_string);
            let naming = ctx.naming_strategy();
            let columns = bind_columns(
                ctx,
                id,
                table,
                || match &attribute {
                    Some(name) => vec![naming.property_to_column_name(name)],
                    None => vec![ctx.defaults().identifier_column_name().to_string()],
                },
                false,
                false,
            );
            let java_type =
                attribute_type(ctx, id, class_name, attribute.as_deref(), FALLBACK_TYPE_NAME);
            let generator = id
                .child("generator")
                .map(bind_generator)
                .transpose()?
                .unwrap_or_else(|| IdGenerator::new("assigned"));

            return Ok(IdentifierDescriptor::Simple {
                attribute,
                columns,
                java_type,
                generator: Some(generator),
                unsaved_value: id.non_empty_attribute("unsaved-value").map(str::to_string),
            });
        }

        let Some(composite) = element.child("composite-id") else {
            return Err(mapping_error!(
                "Entity {} declares neither <id> nor <composite-id>",
                entity_name
            ));
        };

        let id_class = composite
            .non_empty_attribute("class")
            .map(|name| ctx.qualify_class_name(name));
        let mut bound = BoundAttributes::default();
        let identifier_columns: Vec<String> = Vec::new();

        match composite.non_empty_attribute("name") {
            Some(name) if !composite.bool_attribute("mapped", false) => {
                let owner = AttributeOwner {
                    entity_name,
                    class_name: id_class.as_deref(),
                    table,
                    identifier_columns: &identifier_columns,
                };
                self.bind_attributes(ctx, composite, &owner, name, &mut bound, false)?;
                Ok(IdentifierDescriptor::CompositeAggregated {
                    attribute: EmbeddedAttributeBinding {
                        name: name.to_string(),
                        component: Arc::new(EmbeddableDescriptor {
                            class_name: id_class,
                            path: name.to_string(),
                            parent_attribute: None,
                            attributes: bound.attributes,
                        }),
                        dynamic: false,
                    },
                })
            }
            _ => {
                let owner = AttributeOwner {
                    entity_name,
                    class_name,
                    table,
                    identifier_columns: &identifier_columns,
                };
                self.bind_attributes(ctx, composite, &owner, "", &mut bound, false)?;
                Ok(IdentifierDescriptor::CompositeNonAggregated {
                    attributes: bound.attributes,
                    id_class,
                })
            }
        }
    }

    fn bind_discriminator(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        table: &TableReference,
    ) -> Option<DiscriminatorDescriptor> {
        let discriminator = element.child("discriminator")?;
        let formula = formula_of(discriminator);
        let column = if formula.is_some() && !declares_columns(discriminator) {
            None
        } else {
            let nullable = !discriminator.bool_attribute("not-null", true);
            bind_columns(
                ctx,
                discriminator,
                table,
                || vec![ctx.defaults().discriminator_column_name().to_string()],
                nullable,
                false,
            )
            .into_iter()
            .next()
        };

        Some(DiscriminatorDescriptor {
            column,
            formula,
            java_type: ctx.make_java_type(discriminator.non_empty_attribute("type").unwrap_or("string")),
            forced: discriminator.bool_attribute("force", false),
            insertable: discriminator.bool_attribute("insert", true),
        })
    }

    fn bind_version(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        class_name: Option<&str>,
        table: &TableReference,
    ) -> Result<Option<VersionDescriptor>> {
        let (version, timestamp) = match (element.child("version"), element.child("timestamp")) {
            (Some(version), _) => (version, false),
            (None, Some(timestamp)) => (timestamp, true),
            (None, None) => return Ok(None),
        };

        let name = required_attribute(version, "name")?;
        let columns = bind_columns(
            ctx,
            version,
            table,
            || vec![ctx.naming_strategy().property_to_column_name(name)],
            false,
            false,
        );
        let fallback = if timestamp { "timestamp" } else { "integer" };

        Ok(Some(VersionDescriptor {
            attribute: name.to_string(),
            columns,
            java_type: attribute_type(ctx, version, class_name, Some(name), fallback),
            timestamp,
            unsaved_value: version.non_empty_attribute("unsaved-value").map(str::to_string),
        }))
    }

    fn bind_attributes(
        &self,
        ctx: &BindingContext<'_>,
        container: &XmlElement,
        owner: &AttributeOwner<'_>,
        path: &str,
        bound: &mut BoundAttributes,
        natural_id: bool,
    ) -> Result<()> {
        for child in &container.children {
            match child.name.as_str() {
                "property" | "key-property" => {
                    let attribute = self.bind_property(ctx, child, owner, natural_id)?;
                    bound.attributes.push(AttributeBinding::Basic(attribute));
                }
                "many-to-one" | "key-many-to-one" => {
                    let attribute = self.bind_many_to_one(ctx, child, owner)?;
                    bound.attributes.push(AttributeBinding::ToOne(attribute));
                }
                "one-to-one" => {
                    let attribute = self.bind_one_to_one(ctx, child, owner)?;
                    bound.attributes.push(AttributeBinding::ToOne(attribute));
                }
                "component" | "dynamic-component" | "nested-composite-element" => {
                    let attribute = self.bind_component(ctx, child, owner, path, bound)?;
                    bound.attributes.push(AttributeBinding::Embedded(attribute));
                }
                "natural-id" | "properties" => {
                    let start = bound.attributes.len();
                    let is_natural_id = child.name == "natural-id";
                    self.bind_attributes(ctx, child, owner, path, bound, natural_id || is_natural_id)?;

                    if is_natural_id || child.bool_attribute("unique", false) {
                        let columns: Vec<String> = bound.attributes[start..]
                            .iter()
                            .flat_map(AttributeBinding::column_names)
                            .collect();
                        if let (Some(table), false) = (owner.table.physical(), columns.is_empty()) {
                            table.add_unique_key(columns);
                        }
                    }
                }
                name if COLLECTION_ELEMENTS.contains(&name) => {
                    let collection = self.bind_collection(ctx, child, owner, path)?;
                    bound
                        .attributes
                        .push(AttributeBinding::Plural(collection.clone()));
                    bound.collections.push(collection);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn bind_property(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
        natural_id: bool,
    ) -> Result<BasicAttributeBinding> {
        let name = required_attribute(element, "name")?;
        let formula = formula_of(element);
        let not_null = element.bool_attribute("not-null", element.name == "key-property");
        let unique = element.bool_attribute("unique", false);

        let columns = if formula.is_some() && !declares_columns(element) {
            Vec::new()
        } else {
            bind_columns(
                ctx,
                element,
                owner.table,
                || vec![ctx.naming_strategy().property_to_column_name(name)],
                !not_null,
                unique,
            )
        };

        let java_type = attribute_type(ctx, element, owner.class_name, Some(name), FALLBACK_TYPE_NAME);
        let mut attribute = BasicAttributeBinding::new(name, java_type, columns);
        attribute.insertable = element.bool_attribute("insert", formula.is_none());
        attribute.updatable = element.bool_attribute("update", formula.is_none());
        attribute.formula = formula;
        attribute.nullable = !not_null;
        attribute.lazy = element.bool_attribute("lazy", false);
        attribute.access = element
            .non_empty_attribute("access")
            .unwrap_or(ctx.defaults().property_access_name())
            .to_string();
        attribute.natural_id = natural_id;
        attribute.meta = bind_meta(ctx.meta(), element);
        Ok(attribute)
    }

    fn bind_many_to_one(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
    ) -> Result<ToOneAttributeBinding> {
        let name = required_attribute(element, "name")?;
        let target = referenced_entity_name(ctx, element, reflected_type(ctx, owner.class_name, name))?;
        let not_null = element.bool_attribute("not-null", element.name == "key-many-to-one");
        let unique = element.bool_attribute("unique", false);

        let columns = bind_columns(
            ctx,
            element,
            owner.table,
            || {
                vec![ctx.naming_strategy().foreign_key_column_name(
                    Some(name),
                    &target,
                    unqualify(&target),
                    ctx.defaults().identifier_column_name(),
                )]
            },
            !not_null,
            unique,
        );

        let mut binding = ToOneAttributeBinding::new(name, target, columns);
        binding.property_ref = element.non_empty_attribute("property-ref").map(str::to_string);
        binding.nullable = !not_null;
        binding.unique = unique;
        binding.insertable = element.bool_attribute("insert", true);
        binding.updatable = element.bool_attribute("update", true);
        binding.lazy = association_lazy(ctx, element);
        binding.fetch = fetch_style(element, FetchStyle::Select)?;
        binding.cascade = cascade_of(ctx, element);
        Ok(binding)
    }

    fn bind_one_to_one(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
    ) -> Result<ToOneAttributeBinding> {
        let name = required_attribute(element, "name")?;
        let target = referenced_entity_name(ctx, element, reflected_type(ctx, owner.class_name, name))?;
        let constrained = element.bool_attribute("constrained", false);

        let mut binding = ToOneAttributeBinding::new(name, target, Vec::new());
        binding.kind = ToOneKind::OneToOne;
        binding.constrained = constrained;
        binding.nullable = !constrained;
        binding.property_ref = element.non_empty_attribute("property-ref").map(str::to_string);
        binding.lazy = association_lazy(ctx, element);
        binding.fetch = fetch_style(element, FetchStyle::Select)?;
        binding.cascade = cascade_of(ctx, element);
        Ok(binding)
    }

    fn bind_component(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
        path: &str,
        bound: &mut BoundAttributes,
    ) -> Result<EmbeddedAttributeBinding> {
        let name = required_attribute(element, "name")?;
        let dynamic = element.name == "dynamic-component";
        let component_path = join_path(path, name);
        let class_name = if dynamic {
            None
        } else {
            element
                .non_empty_attribute("class")
                .map(|class| ctx.qualify_class_name(class))
                .or_else(|| reflected_type(ctx, owner.class_name, name))
        };

        let ctx = ctx.with_meta(bind_meta(ctx.meta(), element));
        let nested_owner = AttributeOwner {
            class_name: class_name.as_deref(),
            ..*owner
        };
        let mut nested = BoundAttributes::default();
        self.bind_attributes(&ctx, element, &nested_owner, &component_path, &mut nested, false)?;
        bound.collections.extend(nested.collections);

        Ok(EmbeddedAttributeBinding {
            name: name.to_string(),
            component: Arc::new(EmbeddableDescriptor {
                class_name,
                path: component_path,
                parent_attribute: element
                    .child("parent")
                    .and_then(|parent| parent.non_empty_attribute("name"))
                    .map(str::to_string),
                attributes: nested.attributes,
            }),
            dynamic,
        })
    }

    fn bind_join(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
        bound: &mut BoundAttributes,
    ) -> Result<SecondaryTable> {
        let table_name = required_attribute(element, "table")?;
        let table = physical_table(ctx, element, &ctx.naming_strategy().table_name(table_name));
        let key_columns =
            self.bind_key_columns(ctx, element.child("key"), &table, owner.identifier_columns, false);

        if let (Some(joined), Some(primary)) = (table.physical(), owner.table.physical()) {
            joined.set_primary_key(&key_columns);
            joined.add_foreign_key(key_columns.clone(), primary, owner.identifier_columns.to_vec());
        }

        let join_owner = AttributeOwner {
            table: &table,
            ..*owner
        };
        self.bind_attributes(ctx, element, &join_owner, "", bound, false)?;

        Ok(SecondaryTable {
            table,
            key_columns,
            optional: element.bool_attribute("optional", false),
        })
    }

    /// Key columns declared by a `<key>` element, or copies of `defaults` when it declares
    /// none
    fn bind_key_columns(
        &self,
        ctx: &BindingContext<'_>,
        key: Option<&XmlElement>,
        table: &TableReference,
        defaults: &[String],
        nullable: bool,
    ) -> Vec<String> {
        match key {
            Some(key) if declares_columns(key) => {
                bind_columns(ctx, key, table, Vec::new, nullable, false)
            }
            _ => defaults
                .iter()
                .map(|name| add_column(ctx, table, name, nullable, false))
                .collect(),
        }
    }

    fn bind_collection(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
        path: &str,
    ) -> Result<PluralAttributeBindingRc> {
        let name = required_attribute(element, "name")?;
        let nature = PluralAttributeNature::from_str(&element.name)
            .map_err(|_| mapping_error!("Unknown collection element <{}>", element.name))?;
        let attribute_path = join_path(path, name);
        let role = format!("{}.{}", owner.entity_name, attribute_path);
        let meta = bind_meta(ctx.meta(), element);
        let ctx = ctx.with_meta(meta.clone());
        let naming = ctx.naming_strategy();

        let element_source = element
            .first_child_of(&[
                "element",
                "composite-element",
                "one-to-many",
                "many-to-many",
                "many-to-any",
            ])
            .ok_or_else(|| mapping_error!("Collection {} declares no element mapping", role))?;
        let one_to_many = element_source.name == "one-to-many";
        let element_entity = match element_source.name.as_str() {
            "one-to-many" | "many-to-many" => Some(referenced_entity_name(
                &ctx,
                element_source,
                reflected_element_type(&ctx, owner.class_name, name),
            )?),
            _ => None,
        };

        let owner_table_name = owner.table.logical_name().text().to_string();
        let table = if one_to_many {
            None
        } else {
            Some(bind_collection_table(
                &ctx,
                element,
                owner,
                &owner_table_name,
                element_entity.as_deref(),
                &attribute_path,
                &role,
            ))
        };

        let key_element = element
            .child("key")
            .ok_or_else(|| mapping_error!("Collection {} declares no <key>", role))?;
        let default_key = || {
            if owner.identifier_columns.len() == 1 {
                vec![naming.foreign_key_column_name(
                    None,
                    owner.entity_name,
                    &owner_table_name,
                    &owner.identifier_columns[0],
                )]
            } else {
                owner.identifier_columns.to_vec()
            }
        };
        let key_columns = match &table {
            Some(table) => bind_columns(&ctx, key_element, table, default_key, false, false),
            None => column_names(&ctx, key_element, default_key),
        };
        let key = PluralAttributeKey {
            columns: key_columns.clone(),
            property_ref: key_element.non_empty_attribute("property-ref").map(str::to_string),
            nullable: !key_element.bool_attribute("not-null", false),
            updatable: key_element.bool_attribute("update", true),
            cascade_delete: key_element.attribute("on-delete") == Some("cascade"),
        };

        let element_descriptor =
            self.bind_element(&ctx, element_source, owner, table.as_ref(), &attribute_path, element_entity)?;

        let index = if nature.is_indexed() {
            Some(self.bind_index(&ctx, element, owner, table.as_ref(), &attribute_path, &role)?)
        } else {
            None
        };

        let id = if nature == PluralAttributeNature::IdBag {
            let collection_id = element
                .child("collection-id")
                .ok_or_else(|| mapping_error!("Id-bag {} declares no <collection-id>", role))?;
            let column_table = table
                .as_ref()
                .ok_or_else(|| mapping_error!("Id-bag {} cannot be one-to-many", role))?;
            let column = bind_columns(&ctx, collection_id, column_table, || vec!["id".to_string()], false, false)
                .into_iter()
                .next()
                .ok_or_else(|| mapping_error!("Id-bag {} declares no id column", role))?;
            Some(IdDescriptor {
                column,
                java_type: ctx.make_java_type(collection_id.non_empty_attribute("type").unwrap_or("long")),
                generator: collection_id
                    .child("generator")
                    .map(bind_generator)
                    .transpose()?
                    .unwrap_or_else(|| IdGenerator::new("increment")),
            })
        } else {
            None
        };

        if let Some(physical) = table.as_ref().and_then(TableReference::physical) {
            let mut primary_key = key_columns;
            match nature {
                PluralAttributeNature::IdBag => {
                    primary_key = id.iter().map(|id| id.column.clone()).collect();
                }
                PluralAttributeNature::Set => {
                    if matches!(
                        element_descriptor,
                        ElementDescriptor::Basic { .. } | ElementDescriptor::ManyToMany { .. }
                    ) {
                        primary_key.extend(element_descriptor.column_names());
                    }
                }
                PluralAttributeNature::Bag => primary_key.clear(),
                _ => {
                    if let Some(index) = &index {
                        primary_key.extend(index.column_names());
                    }
                }
            }
            if !primary_key.is_empty() {
                physical.set_primary_key(&primary_key);
            }
        }

        let mut binding = PluralAttributeBinding::new(
            owner.entity_name,
            &attribute_path,
            nature,
            key,
            element_descriptor,
        );
        binding.table = table;
        binding.index = index;
        binding.id = id;
        binding.inverse = element.bool_attribute("inverse", false);
        (binding.lazy, binding.extra_lazy) = match element.attribute("lazy") {
            Some("false") => (false, false),
            Some("extra") => (true, true),
            Some(_) => (true, false),
            None => (ctx.defaults().are_associations_lazy(), false),
        };
        binding.fetch = fetch_style(element, FetchStyle::Select)?;
        binding.cascade = cascade_of(&ctx, element);
        binding.order_by = element.non_empty_attribute("order-by").map(str::to_string);
        binding.where_clause = element.non_empty_attribute("where").map(str::to_string);
        binding.batch_size = parse_u32(element, "batch-size")?;
        binding.mutable = element.bool_attribute("mutable", true);
        binding.meta = meta;
        binding.set_caching(bind_cache(&ctx, element, &role)?);

        trace!("Bound collection {} as {}", binding.role, binding.nature);
        Ok(Arc::new(binding))
    }

    fn bind_element(
        &self,
        ctx: &BindingContext<'_>,
        element: &XmlElement,
        owner: &AttributeOwner<'_>,
        table: Option<&TableReference>,
        attribute_path: &str,
        element_entity: Option<String>,
    ) -> Result<ElementDescriptor> {
        let table_of = || {
            table.ok_or_else(|| {
                mapping_error!(
                    "<{}> of {} requires a collection table",
                    element.name,
                    attribute_path
                )
            })
        };

        match element.name.as_str() {
            "element" => {
                let formula = formula_of(element);
                let columns = if formula.is_some() && !declares_columns(element) {
                    Vec::new()
                } else {
                    let nullable = !element.bool_attribute("not-null", false);
                    bind_columns(
                        ctx,
                        element,
                        table_of()?,
                        || vec![DEFAULT_ELEMENT_COLUMN_NAME.to_string()],
                        nullable,
                        element.bool_attribute("unique", false),
                    )
                };
                Ok(ElementDescriptor::Basic {
                    java_type: attribute_type(ctx, element, None, None, FALLBACK_TYPE_NAME),
                    columns,
                    formula,
                })
            }
            "composite-element" => {
                let class_name = element
                    .non_empty_attribute("class")
                    .map(|class| ctx.qualify_class_name(class));
                let component_path = format!("{attribute_path}.element");
                let nested_owner = AttributeOwner {
                    class_name: class_name.as_deref(),
                    table: table_of()?,
                    ..*owner
                };
                let mut nested = BoundAttributes::default();
                self.bind_attributes(ctx, element, &nested_owner, &component_path, &mut nested, false)?;
                if let Some(collection) = nested.collections.first() {
                    return Err(mapping_error!(
                        "Composite element of {} cannot contain collection {}",
                        attribute_path,
                        collection.role
                    ));
                }
                Ok(ElementDescriptor::Embeddable {
                    component: Arc::new(EmbeddableDescriptor {
                        class_name,
                        path: component_path,
                        parent_attribute: element
                            .child("parent")
                            .and_then(|parent| parent.non_empty_attribute("name"))
                            .map(str::to_string),
                        attributes: nested.attributes,
                    }),
                })
            }
            "one-to-many" => Ok(ElementDescriptor::OneToMany {
                referenced_entity_name: element_entity
                    .ok_or_else(|| mapping_error!("One-to-many {} names no entity", attribute_path))?,
                target: std::sync::OnceLock::new(),
            }),
            "many-to-many" => {
                let columns = bind_columns(
                    ctx,
                    element,
                    table_of()?,
                    || vec![DEFAULT_ELEMENT_COLUMN_NAME.to_string()],
                    false,
                    false,
                );
                Ok(ElementDescriptor::ManyToMany {
                    referenced_entity_name: element_entity.ok_or_else(|| {
                        mapping_error!("Many-to-many {} names no entity", attribute_path)
                    })?,
                    columns,
                    unique: element.bool_attribute("unique", false),
                    target: std::sync::OnceLock::new(),
                })
            }
            _ => {
                let id_type = required_attribute(element, "id-type")?;
                Ok(ElementDescriptor::Any {
                    id_type: ctx.make_java_type(id_type),
                    meta_type: element.non_empty_attribute("meta-type").map(str::to_string),
                    columns: bind_columns(ctx, element, table_of()?, Vec::new, false, false),
                })
            }
        }
    }

    fn bind_index(
        &self,
        ctx: &BindingContext<'_>,
        collection: &XmlElement,
        owner: &AttributeOwner<'_>,
        table: Option<&TableReference>,
        attribute_path: &str,
        role: &str,
    ) -> Result<IndexDescriptor> {
        let index_columns = |element: &XmlElement, default: &str| match table {
            Some(table) => bind_columns(ctx, element, table, || vec![default.to_string()], false, false),
            None => column_names(ctx, element, || vec![default.to_string()]),
        };

        if let Some(index) = collection.first_child_of(&["list-index", "index", "map-key"]) {
            let base = match index.non_empty_attribute("base") {
                Some(base) => base
                    .parse::<u32>()
                    .map_err(|_| mapping_error!("Invalid index base {} of {}", base, role))?,
                None => 0,
            };
            let fallback = if index.name == "map-key" { "string" } else { "integer" };
            return Ok(IndexDescriptor::Basic {
                java_type: attribute_type(ctx, index, None, None, fallback),
                columns: index_columns(index, DEFAULT_INDEX_COLUMN_NAME),
                base,
            });
        }

        if let Some(index) = collection.first_child_of(&["composite-map-key", "composite-index"]) {
            let table = table
                .ok_or_else(|| mapping_error!("Composite map key of {} requires a collection table", role))?;
            let class_name = index
                .non_empty_attribute("class")
                .map(|class| ctx.qualify_class_name(class));
            let key_owner = AttributeOwner {
                class_name: class_name.as_deref(),
                table,
                ..*owner
            };
            let path = format!("{attribute_path}.index");
            let mut nested = BoundAttributes::default();
            self.bind_attributes(ctx, index, &key_owner, &path, &mut nested, false)?;
            return Ok(IndexDescriptor::Embeddable {
                component: Arc::new(EmbeddableDescriptor {
                    class_name,
                    path,
                    parent_attribute: None,
                    attributes: nested.attributes,
                }),
            });
        }

        if let Some(index) = collection.first_child_of(&["map-key-many-to-many", "index-many-to-many"]) {
            let referenced_entity_name = referenced_entity_name(ctx, index, None)?;
            return Ok(IndexDescriptor::ManyToMany {
                columns: index_columns(index, DEFAULT_INDEX_COLUMN_NAME),
                referenced_entity_name,
                target: std::sync::OnceLock::new(),
            });
        }

        if let Some(index) = collection.child("index-many-to-any") {
            let id_type = required_attribute(index, "id-type")?;
            return Ok(IndexDescriptor::Any {
                id_type: ctx.make_java_type(id_type),
                meta_type: index.non_empty_attribute("meta-type").map(str::to_string),
                columns: match table {
                    Some(table) => bind_columns(ctx, index, table, Vec::new, false, false),
                    None => column_names(ctx, index, Vec::new),
                },
            });
        }

        Err(mapping_error!("Indexed collection {} declares no index", role))
    }
}

impl MetadataSourceProcessor for HbmMetadataSourceProcessor<'_> {
    type Source = HbmDocument;

    fn source_type(&self) -> MetadataSourceType {
        MetadataSourceType::Hbm
    }

    fn process_independent_metadata(&self, document: &HbmDocument) -> Result<()> {
        let collector = self.context.collector();
        let root = document.root();

        for typedef in root.children_named("typedef") {
            collector.add_type_definition(TypeDefinition {
                name: required_attribute(typedef, "name")?.to_string(),
                type_implementor: required_attribute(typedef, "class")?.to_string(),
                parameters: parameters_of(typedef),
            });
        }

        for generator in root.children_named("identifier-generator") {
            collector.add_id_generator(IdGeneratorDefinition {
                name: required_attribute(generator, "name")?.to_string(),
                strategy: required_attribute(generator, "class")?.to_string(),
                parameters: parameters_of(generator),
            });
        }
        Ok(())
    }

    fn process_type_dependent_metadata(&self, document: &HbmDocument) -> Result<()> {
        let ctx = self.document_context(document);

        for filter in document.root().children_named("filter-def") {
            let name = required_attribute(filter, "name")?;
            let parameters = filter
                .children_named("filter-param")
                .map(|parameter| {
                    Ok((
                        required_attribute(parameter, "name")?.to_string(),
                        ctx.make_java_type(required_attribute(parameter, "type")?),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            let default_condition = filter
                .non_empty_attribute("condition")
                .or_else(|| Some(filter.text_trim()).filter(|text| !text.is_empty()))
                .map(str::to_string);

            ctx.collector().add_filter_definition(FilterDefinition {
                name: name.to_string(),
                default_condition,
                parameters,
            });
        }
        Ok(())
    }

    fn process_mapping_metadata(&self, document: &HbmDocument) -> Result<MappingOutcome> {
        let collector = self.context.collector();
        let missing = document.extends_needed(|name| collector.is_entity_bound(name))?;
        if !missing.is_empty() {
            debug!(
                "Deferring {} until {} is bound",
                document.origin().name,
                missing.join(",")
            );
            return Ok(MappingOutcome::Deferred(missing));
        }

        let ctx = self.document_context(document);
        let root = document.root();

        for import in root.children_named("import") {
            let class = required_attribute(import, "class")?;
            let rename = import.non_empty_attribute("rename").unwrap_or_else(|| unqualify(class));
            collector.add_import(rename, &ctx.qualify_class_name(class));
        }

        let mut subclasses = Vec::new();
        for child in &root.children {
            match child.name.as_str() {
                "class" => {
                    self.bind_root_class(&ctx, child)?;
                }
                "database-object" => bind_database_object(&ctx, child)?,
                name if SUBCLASS_ELEMENTS.contains(&name) => subclasses.push(child),
                _ => {}
            }
        }
        self.bind_top_level_subclasses(&ctx, subclasses)?;

        Ok(MappingOutcome::Bound)
    }

    fn process_mapping_dependent_metadata(&self, document: &HbmDocument) -> Result<()> {
        let ctx = self.document_context(document);

        for child in &document.root().children {
            match child.name.as_str() {
                "query" => bind_named_query(&ctx, child, None)?,
                "sql-query" => bind_named_native_query(&ctx, child, None)?,
                "resultset" => {
                    let mapping = bind_result_set_mapping(&ctx, child, required_attribute(child, "name")?)?;
                    ctx.collector().add_result_set_mapping(mapping);
                }
                "fetch-profile" => bind_fetch_profile(&ctx, child, None)?,
                name if ENTITY_ELEMENTS.contains(&name) => bind_class_queries(&ctx, child)?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Meta attributes declared by `<meta>` children, scoped below `parent`
///
/// Repeated declarations of the same attribute accumulate into one multi-valued attribute.
fn bind_meta(parent: &Arc<MetaAttributeContext>, element: &XmlElement) -> Arc<MetaAttributeContext> {
    let context = MetaAttributeContext::with_parent(parent.clone());
    let mut declared: IndexMap<&str, MetaAttribute> = IndexMap::new();

    for meta in element.children_named("meta") {
        let Some(name) = meta.non_empty_attribute("attribute") else {
            continue;
        };
        let value = meta.text_trim();
        match declared.get_mut(name) {
            Some(attribute) => attribute.values.push(value.to_string()),
            None => {
                let attribute = MetaAttribute::new(name, value);
                let attribute = if meta.bool_attribute("inherit", true) {
                    attribute
                } else {
                    attribute.local_only()
                };
                declared.insert(name, attribute);
            }
        }
    }

    for attribute in declared.into_values() {
        context.add(attribute);
    }
    Arc::new(context)
}

fn apply_entity_settings(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    entity: &mut EntityBinding,
    class_name: Option<String>,
    meta: Arc<MetaAttributeContext>,
) -> Result<()> {
    entity.class_name = class_name;
    entity.is_abstract = element.bool_attribute("abstract", false);
    entity.lazy = element.bool_attribute("lazy", ctx.defaults().are_associations_lazy());
    entity.mutable = element.bool_attribute("mutable", true);
    entity.dynamic_update = element.bool_attribute("dynamic-update", false);
    entity.dynamic_insert = element.bool_attribute("dynamic-insert", false);
    entity.batch_size = parse_u32(element, "batch-size")?;
    entity.where_clause = element.non_empty_attribute("where").map(str::to_string);
    entity.filters = element
        .children_named("filter")
        .map(|filter| {
            Ok(FilterApplication {
                name: required_attribute(filter, "name")?.to_string(),
                condition: filter
                    .non_empty_attribute("condition")
                    .or_else(|| Some(filter.text_trim()).filter(|text| !text.is_empty()))
                    .map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    entity.synchronized_tables = element
        .children_named("synchronize")
        .filter_map(|sync| sync.non_empty_attribute("table"))
        .map(str::to_string)
        .collect();
    entity.meta = meta;
    entity.source = MetadataSourceType::Hbm;
    Ok(())
}

fn resolve_extends(ctx: &BindingContext<'_>, element: &XmlElement) -> Result<Option<EntityBindingRc>> {
    let extends = element.non_empty_attribute("extends").ok_or_else(|| {
        mapping_error!(
            "Top level <{}> {} declares no extends",
            element.name,
            element.attribute("name").unwrap_or_default()
        )
    })?;
    let collector = ctx.collector();
    Ok(collector
        .get_entity_binding(&ctx.qualify_class_name(extends))
        .or_else(|| collector.get_entity_binding(extends)))
}

fn physical_table(ctx: &BindingContext<'_>, element: &XmlElement, name: &str) -> TableReference {
    let schema = ctx.schema_name(
        element.non_empty_attribute("schema"),
        element.non_empty_attribute("catalog"),
    );
    TableReference::Physical(
        ctx.collector()
            .database()
            .locate_or_create_table(schema, ctx.to_identifier(name)),
    )
}

fn bind_collection_table(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    owner: &AttributeOwner<'_>,
    owner_table_name: &str,
    element_entity: Option<&str>,
    attribute_path: &str,
    role: &str,
) -> TableReference {
    let database = ctx.collector().database();
    if let Some(expression) = subselect_of(element) {
        return TableReference::Derived(
            database.create_derived_table(expression, Some(ctx.to_identifier(role))),
        );
    }

    let naming = ctx.naming_strategy();
    let name = match element.non_empty_attribute("table") {
        Some(table) if is_derived_table_expression(table) => {
            return TableReference::Derived(
                database.create_derived_table(table, Some(ctx.to_identifier(role))),
            );
        }
        Some(table) => naming.table_name(table),
        None => naming.collection_table_name(
            owner.entity_name,
            owner_table_name,
            element_entity,
            element_entity.map(unqualify),
            attribute_path,
        ),
    };
    physical_table(ctx, element, &name)
}

/// Column names declared by `element`: `<column>` children, else the `column` attribute,
/// else `default`
fn column_names<F>(ctx: &BindingContext<'_>, element: &XmlElement, default: F) -> Vec<String>
where
    F: FnOnce() -> Vec<String>,
{
    column_specs(ctx, element, default, true, false)
        .into_iter()
        .map(|(name, _, _)| ctx.to_identifier(&name).text().to_string())
        .collect()
}

fn column_specs<F>(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    default: F,
    nullable: bool,
    unique: bool,
) -> Vec<(String, bool, bool)>
where
    F: FnOnce() -> Vec<String>,
{
    let naming = ctx.naming_strategy();
    let explicit: Vec<(String, bool, bool)> = element
        .children_named("column")
        .filter_map(|column| {
            column.non_empty_attribute("name").map(|name| {
                (
                    naming.column_name(name),
                    !column.bool_attribute("not-null", !nullable),
                    column.bool_attribute("unique", unique),
                )
            })
        })
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }

    match element.non_empty_attribute("column") {
        Some(column) => vec![(naming.column_name(column), nullable, unique)],
        None => default()
            .into_iter()
            .map(|name| (name, nullable, unique))
            .collect(),
    }
}

/// Resolve the columns declared by `element` and add them to `table`
fn bind_columns<F>(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    table: &TableReference,
    default: F,
    nullable: bool,
    unique: bool,
) -> Vec<String>
where
    F: FnOnce() -> Vec<String>,
{
    column_specs(ctx, element, default, nullable, unique)
        .into_iter()
        .map(|(name, nullable, unique)| add_column(ctx, table, &name, nullable, unique))
        .collect()
}

fn declares_columns(element: &XmlElement) -> bool {
    element.non_empty_attribute("column").is_some() || element.child("column").is_some()
}

fn formula_of(element: &XmlElement) -> Option<String> {
    element
        .non_empty_attribute("formula")
        .or_else(|| element.child_text("formula").filter(|text| !text.is_empty()))
        .map(str::to_string)
}

fn subselect_of(element: &XmlElement) -> Option<&str> {
    element
        .non_empty_attribute("subselect")
        .or_else(|| element.child_text("subselect").filter(|text| !text.is_empty()))
}

fn required_attribute<'e>(element: &'e XmlElement, name: &str) -> Result<&'e str> {
    element.non_empty_attribute(name).ok_or_else(|| {
        mapping_error!("<{}> requires the {} attribute", element.name, name)
    })
}

fn parse_u32(element: &XmlElement, name: &str) -> Result<Option<u32>> {
    element
        .non_empty_attribute(name)
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|_| mapping_error!("Invalid {} value {} on <{}>", name, value, element.name))
        })
        .transpose()
}

fn parameters_of(element: &XmlElement) -> Vec<(String, String)> {
    element
        .children_named("param")
        .filter_map(|param| {
            param
                .non_empty_attribute("name")
                .map(|name| (name.to_string(), param.text_trim().to_string()))
        })
        .collect()
}

fn bind_generator(generator: &XmlElement) -> Result<IdGenerator> {
    let mut bound = IdGenerator::new(required_attribute(generator, "class")?);
    bound.parameters = parameters_of(generator);
    Ok(bound)
}

/// The declared type of an attribute of a registered class
fn reflected_type(ctx: &BindingContext<'_>, class_name: Option<&str>, attribute: &str) -> Option<String> {
    let class = ctx.locate_class_by_name(class_name?).ok()?;
    class
        .get_attribute(attribute)
        .map(|descriptor| descriptor.java_type.clone())
}

fn reflected_element_type(
    ctx: &BindingContext<'_>,
    class_name: Option<&str>,
    attribute: &str,
) -> Option<String> {
    let class = ctx.locate_class_by_name(class_name?).ok()?;
    class.get_attribute(attribute)?.element_type.clone()
}

/// The type of an attribute: `type` attribute or `<type name>` child, then the registered
/// class, then `fallback`
fn attribute_type(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    class_name: Option<&str>,
    attribute: Option<&str>,
    fallback: &str,
) -> Arc<JavaType> {
    if let Some(declared) = element
        .non_empty_attribute("type")
        .or_else(|| element.child("type").and_then(|child| child.non_empty_attribute("name")))
    {
        return ctx.make_java_type(declared);
    }
    match attribute.and_then(|name| reflected_type(ctx, class_name, name)) {
        Some(reflected) => ctx.make_java_type(&reflected),
        None => ctx.make_java_type(fallback),
    }
}

/// The entity an association element points at: `entity-name` verbatim, else the qualified
/// `class`, else `reflected`
fn referenced_entity_name(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    reflected: Option<String>,
) -> Result<String> {
    if let Some(entity_name) = element.non_empty_attribute("entity-name") {
        return Ok(entity_name.to_string());
    }
    if let Some(class) = element.non_empty_attribute("class") {
        return Ok(ctx.qualify_class_name(class));
    }
    reflected.ok_or_else(|| {
        mapping_error!(
            "Could not determine the entity referenced by <{}> {}",
            element.name,
            element.attribute("name").unwrap_or_default()
        )
    })
}

fn association_lazy(ctx: &BindingContext<'_>, element: &XmlElement) -> bool {
    match element.attribute("lazy") {
        Some("false") => false,
        Some(_) => true,
        None => ctx.defaults().are_associations_lazy(),
    }
}

fn fetch_style(element: &XmlElement, default: FetchStyle) -> Result<FetchStyle> {
    match element.non_empty_attribute("fetch") {
        Some(fetch) => FetchStyle::from_str(fetch)
            .map_err(|_| mapping_error!("Unknown fetch style {} on <{}>", fetch, element.name)),
        None => Ok(default),
    }
}

fn cascade_of(ctx: &BindingContext<'_>, element: &XmlElement) -> String {
    element
        .non_empty_attribute("cascade")
        .unwrap_or(ctx.defaults().cascade_style())
        .to_string()
}

fn bind_cache(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    default_region: &str,
) -> Result<Option<Caching>> {
    let Some(cache) = element.child("cache") else {
        return Ok(None);
    };

    let usage = match cache.non_empty_attribute("usage") {
        Some(usage) => AccessType::from_str(usage)
            .map_err(|_| mapping_error!("Unknown cache usage {} for {}", usage, default_region))?,
        None => ctx
            .defaults()
            .cache_access_type()
            .ok_or_else(|| mapping_error!("<cache> of {} declares no usage", default_region))?,
    };

    let mut caching = Caching::new(
        cache.non_empty_attribute("region").unwrap_or(default_region),
        usage,
    );
    caching.cache_lazy_properties = cache.attribute("include") != Some("non-lazy");
    Ok(Some(caching))
}

fn bind_database_object(ctx: &BindingContext<'_>, element: &XmlElement) -> Result<()> {
    if let Some(definition) = element.child("definition") {
        return Err(mapping_error!(
            "Custom database object definitions are not supported: {}",
            definition.attribute("class").unwrap_or_default()
        ));
    }

    let create = element
        .child_text("create")
        .ok_or_else(|| mapping_error!("<database-object> declares no <create>"))?;
    let drop = element
        .child_text("drop")
        .ok_or_else(|| mapping_error!("<database-object> declares no <drop>"))?;

    ctx.collector()
        .database()
        .add_auxiliary_database_object(AuxiliaryDatabaseObject {
            create: create.to_string(),
            drop: drop.to_string(),
            dialect_scopes: element
                .children_named("dialect-scope")
                .filter_map(|scope| scope.non_empty_attribute("name"))
                .map(str::to_string)
                .collect(),
        });
    Ok(())
}

fn bind_fetch_profile(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    containing_entity: Option<&str>,
) -> Result<()> {
    let name = required_attribute(element, "name")?;
    let profile = ctx
        .collector()
        .find_or_create_fetch_profile(name, MetadataSourceType::Hbm);

    for fetch in element.children_named("fetch") {
        let entity = match fetch.non_empty_attribute("entity") {
            Some(entity) => ctx.qualify_class_name(entity),
            None => containing_entity.map(str::to_string).ok_or_else(|| {
                mapping_error!("Fetch profile {} declares a fetch without entity", name)
            })?,
        };
        let association = required_attribute(fetch, "association")?;
        let style = match fetch.non_empty_attribute("style") {
            Some(style) => FetchStyle::from_str(style)
                .map_err(|_| mapping_error!("Unknown fetch style {} in profile {}", style, name))?,
            None => FetchStyle::Join,
        };
        profile.add_fetch(&entity, association, style);
    }
    Ok(())
}

fn bind_class_queries(ctx: &BindingContext<'_>, element: &XmlElement) -> Result<()> {
    let entity_name = HbmMetadataSourceProcessor::entity_name(ctx, element)?;
    for child in &element.children {
        match child.name.as_str() {
            "query" => bind_named_query(ctx, child, Some(&entity_name))?,
            "sql-query" => bind_named_native_query(ctx, child, Some(&entity_name))?,
            name if SUBCLASS_ELEMENTS.contains(&name) => bind_class_queries(ctx, child)?,
            _ => {}
        }
    }
    Ok(())
}

fn query_name(element: &XmlElement, scope: Option<&str>) -> Result<String> {
    let name = required_attribute(element, "name")?;
    Ok(match scope {
        Some(entity_name) => format!("{entity_name}.{name}"),
        None => name.to_string(),
    })
}

fn bind_named_query(ctx: &BindingContext<'_>, element: &XmlElement, scope: Option<&str>) -> Result<()> {
    let mut definition = NamedQueryDefinition::new(query_name(element, scope)?, element.text_trim());
    definition.cacheable = element.bool_attribute("cacheable", false);
    definition.cache_region = element.non_empty_attribute("cache-region").map(str::to_string);
    definition.read_only = element.bool_attribute("read-only", false);
    definition.fetch_size = parse_u32(element, "fetch-size")?;
    definition.timeout = parse_u32(element, "timeout")?;
    definition.comment = element.non_empty_attribute("comment").map(str::to_string);
    ctx.collector().add_named_query(definition);
    Ok(())
}

/// Binds a `<sql-query>`; inline returns become a result set mapping named after the query.
fn bind_named_native_query(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    scope: Option<&str>,
) -> Result<()> {
    let name = query_name(element, scope)?;
    let result_set_ref = match element.non_empty_attribute("resultset-ref") {
        Some(reference) => Some(reference.to_string()),
        None => {
            let inline = bind_result_set_mapping(ctx, element, &name)?;
            if inline.entity_returns.is_empty() && inline.scalar_returns.is_empty() {
                None
            } else {
                ctx.collector().add_result_set_mapping(inline);
                Some(name.clone())
            }
        }
    };

    ctx.collector().add_named_native_query(NamedNativeQueryDefinition {
        query: element.text_trim().to_string(),
        result_set_ref,
        synchronized_tables: element
            .children_named("synchronize")
            .filter_map(|sync| sync.non_empty_attribute("table"))
            .map(str::to_string)
            .collect(),
        callable: element.bool_attribute("callable", false),
        name,
    });
    Ok(())
}

fn bind_result_set_mapping(
    ctx: &BindingContext<'_>,
    element: &XmlElement,
    name: &str,
) -> Result<ResultSetMappingDefinition> {
    let mut mapping = ResultSetMappingDefinition {
        name: name.to_string(),
        ..Default::default()
    };

    for entity in element.children_named("return") {
        let alias = required_attribute(entity, "alias")?;
        mapping.entity_returns.push(EntityReturn {
            alias: alias.to_string(),
            entity_name: referenced_entity_name(ctx, entity, None)?,
        });
    }
    for scalar in element.children_named("return-scalar") {
        mapping.scalar_returns.push(ScalarReturn {
            column: required_attribute(scalar, "column")?.to_string(),
            type_name: scalar.non_empty_attribute("type").map(str::to_string),
        });
    }
    Ok(mapping)
}

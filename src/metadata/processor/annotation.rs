//! Binder for annotated classes.
//!
//! Classes arrive superclass first. Mapped superclasses bind nothing on their own; their
//! attributes are folded into the first entity below them. An entity whose nearest entity
//! ancestor is already bound joins that ancestor's hierarchy with the strategy declared by
//! `@Inheritance` on the hierarchy root.

use std::sync::{Arc, OnceLock};

use log::{debug, trace};

use crate::{
    metadata::{
        binding::{
            AttributeBinding, BasicAttributeBinding, Caching, DiscriminatorDescriptor,
            ElementDescriptor, EmbeddableDescriptor, EmbeddedAttributeBinding, EntityBinding,
            EntityBindingRc, EntityBindingRef, EntityHierarchy, EntityReturn, FetchStyle,
            FilterApplication, FilterDefinition, IdGenerator, IdGeneratorDefinition,
            IdentifierDescriptor, IndexDescriptor, InheritanceStrategy,
            NamedEntityGraphDefinition, NamedNativeQueryDefinition, NamedQueryDefinition,
            PluralAttributeBinding, PluralAttributeBindingRc, PluralAttributeKey,
            PluralAttributeNature, ResultSetMappingDefinition, ScalarReturn, ToOneAttributeBinding,
            ToOneKind, TypeDefinition, VersionDescriptor,
        },
        context::BindingContext,
        naming::NamingStrategy,
        processor::{add_column, join_path, MappingOutcome, MetadataSourceProcessor},
        relational::{Column, TableReference},
        source::MetadataSourceType,
        typesystem::{
            unqualify, AttributeAnnotation, AttributeDescriptor, BasicTypeKind, ClassAnnotation,
            ClassDescriptor, ClassDescriptorRc, InheritanceType,
        },
        MetadataImplementor,
    },
    Result,
};

/// Discriminator column of a single-table hierarchy that names none.
const DEFAULT_DISCRIMINATOR_COLUMN: &str = "DTYPE";

/// Alias of the entity returned by a native query declaring a result class.
const RESULT_CLASS_ALIAS: &str = "root";

/// Binds annotated [`ClassDescriptor`]s into a [`crate::metadata::MetadataCollector`].
pub struct AnnotationMetadataSourceProcessor<'a> {
    context: BindingContext<'a>,
}

/// Where attributes being bound live.
struct Owner<'e> {
    entity_name: &'e str,
    table: &'e TableReference,
    identifier_columns: &'e [String],
}

#[derive(Default)]
struct BoundAttributes {
    attributes: Vec<AttributeBinding>,
    collections: Vec<PluralAttributeBindingRc>,
}

impl<'a> AnnotationMetadataSourceProcessor<'a> {
    /// Create a processor
    ///
    /// ## Arguments
    /// * 'context' - The root binding context
    pub fn new(context: BindingContext<'a>) -> Self {
        AnnotationMetadataSourceProcessor { context }
    }

    fn find_class(&self, name: &str) -> Option<ClassDescriptorRc> {
        self.context
            .collector()
            .type_resolver()
            .classes()
            .get(name)
    }

    /// Nearest ancestor annotated `@Entity`
    fn entity_superclass(&self, class: &ClassDescriptor) -> Option<ClassDescriptorRc> {
        let classes = self.context.collector().type_resolver().classes().clone();
        let mut current = classes.superclass_of(class);
        let mut depth = 0;
        while let Some(superclass) = current {
            if superclass.is_entity() {
                return Some(superclass);
            }
            depth += 1;
            if depth > self.context.options().max_hierarchy_depth {
                return None;
            }
            current = classes.superclass_of(&superclass);
        }
        None
    }

    /// Attributes of `class` preceded by those of the mapped superclasses above it, furthest
    /// ancestor first
    fn persistent_attributes(&self, class: &ClassDescriptor) -> Vec<AttributeDescriptor> {
        let classes = self.context.collector().type_resolver().classes().clone();
        let mut chain = Vec::new();
        let mut current = classes.superclass_of(class);
        while let Some(superclass) = current {
            if !superclass.is_mapped_superclass()
                || chain.len() > self.context.options().max_hierarchy_depth
            {
                break;
            }
            current = classes.superclass_of(&superclass);
            chain.push(superclass);
        }

        chain
            .iter()
            .rev()
            .flat_map(|superclass| superclass.attributes.iter().cloned())
            .chain(class.attributes.iter().cloned())
            .filter(|attribute| !attribute.is_transient())
            .collect()
    }

    fn bind_entity(&self, class: &ClassDescriptor) -> Result<EntityBindingRc> {
        let ctx = &self.context;
        let entity_name = class.name.clone();
        let attributes = self.persistent_attributes(class);

        let super_entity = match self.entity_superclass(class) {
            Some(superclass) => Some(
                ctx.collector()
                    .get_entity_binding(&superclass.name)
                    .ok_or_else(|| {
                        mapping_error!(
                            "Superclass {} of entity {} is not bound",
                            superclass.name,
                            entity_name
                        )
                    })?,
            ),
            None => None,
        };

        let mut entity = match &super_entity {
            None => self.bind_root_entity(class, &attributes)?,
            Some(super_entity) => self.bind_sub_entity(class, super_entity)?,
        };

        entity.class_name = Some(class.name.clone());
        entity.jpa_entity_name = class.jpa_entity_name().to_string();
        entity.mutable = !class.annotations.contains(&ClassAnnotation::Immutable);
        entity.lazy = ctx.defaults().are_associations_lazy();
        entity.where_clause = class.find(|a| match a {
            ClassAnnotation::Where(clause) => Some(clause.clone()),
            _ => None,
        });
        entity.filters = class
            .annotations
            .iter()
            .filter_map(|a| match a {
                ClassAnnotation::Filter { name, condition } => Some(FilterApplication {
                    name: name.clone(),
                    condition: condition.clone(),
                }),
                _ => None,
            })
            .collect();
        entity.source = MetadataSourceType::Class;

        let table = entity.primary_table.clone();
        let identifier_columns = entity.hierarchy.identifier.column_names();
        let owner = Owner {
            entity_name: &entity_name,
            table: &table,
            identifier_columns: &identifier_columns,
        };
        let mut bound = BoundAttributes::default();
        let version = entity
            .hierarchy
            .version
            .as_ref()
            .map(|version| version.attribute.clone());
        for attribute in &attributes {
            if attribute.is_id() || version.as_deref() == Some(attribute.name.as_str()) {
                continue;
            }
            self.bind_attribute(attribute, &owner, "", &mut bound)?;
        }

        let entity = Arc::new(entity);
        for attribute in bound.attributes {
            entity.add_attribute(attribute);
        }

        let collector = ctx.collector();
        collector.add_entity(entity.clone())?;
        if let Some(super_entity) = &super_entity {
            super_entity.add_sub_entity(&entity);
        }
        debug!("Bind entity {} on table {}", entity.entity_name, entity.primary_table);

        for collection in bound.collections {
            debug!("Binding collection role: {}", collection.role);
            collector.add_collection(collection)?;
        }

        collector.add_import(&entity.entity_name, &entity.entity_name);
        collector.add_import(&entity.jpa_entity_name, &entity.entity_name);
        Ok(entity)
    }

    fn bind_root_entity(
        &self,
        class: &ClassDescriptor,
        attributes: &[AttributeDescriptor],
    ) -> Result<EntityBinding> {
        let ctx = &self.context;
        let table = self.bind_table(class)?;
        let identifier = self.bind_identifier(class, attributes, &table)?;
        let key_columns = identifier.column_names();
        if let Some(physical) = table.physical() {
            physical.set_primary_key(&key_columns);
        }

        let mut hierarchy = EntityHierarchy::new(&class.name, InheritanceStrategy::None, identifier);
        let inheritance = class.find(|a| match a {
            ClassAnnotation::Inheritance(inheritance) => Some(*inheritance),
            _ => None,
        });
        let discriminator_column = class.find(|a| match a {
            ClassAnnotation::DiscriminatorColumn(column) => Some(column.clone()),
            _ => None,
        });
        if inheritance == Some(InheritanceType::SingleTable) || discriminator_column.is_some() {
            let column = discriminator_column.unwrap_or_else(|| DEFAULT_DISCRIMINATOR_COLUMN.to_string());
            hierarchy.discriminator = Some(DiscriminatorDescriptor {
                column: Some(add_column(ctx, &table, &column, false, false)),
                formula: None,
                java_type: ctx.make_java_type(&BasicTypeKind::String.to_string()),
                forced: false,
                insertable: true,
            });
        }

        hierarchy.version = attributes
            .iter()
            .find(|attribute| attribute.has(|a| matches!(a, AttributeAnnotation::Version)))
            .map(|attribute| {
                let java_type = ctx.make_java_type(&attribute.java_type);
                let timestamp = matches!(
                    java_type.basic_kind(),
                    Some(BasicTypeKind::Timestamp | BasicTypeKind::Date | BasicTypeKind::Instant)
                );
                VersionDescriptor {
                    attribute: attribute.name.clone(),
                    columns: vec![self.bind_basic_column(attribute, &table, "")],
                    java_type,
                    timestamp,
                    unsaved_value: None,
                }
            });
        hierarchy.mutable = !class.annotations.contains(&ClassAnnotation::Immutable);
        hierarchy.set_caching(self.entity_caching(class));

        let mut entity = EntityBinding::new(&class.name, Arc::new(hierarchy), table);
        entity.key_columns = key_columns;
        if entity.hierarchy.discriminator.is_some() {
            entity.discriminator_value = Some(discriminator_value(class));
        }
        Ok(entity)
    }

    fn bind_sub_entity(
        &self,
        class: &ClassDescriptor,
        super_entity: &EntityBindingRc,
    ) -> Result<EntityBinding> {
        let hierarchy = super_entity.hierarchy.clone();
        let inheritance = self
            .find_class(&hierarchy.root_entity_name)
            .and_then(|root| {
                root.find(|a| match a {
                    ClassAnnotation::Inheritance(inheritance) => Some(*inheritance),
                    _ => None,
                })
            })
            .unwrap_or(InheritanceType::SingleTable);
        let strategy = match inheritance {
            InheritanceType::SingleTable => InheritanceStrategy::Discriminator,
            InheritanceType::Joined => InheritanceStrategy::Joined,
            InheritanceType::TablePerClass => InheritanceStrategy::Union,
        };
        hierarchy.promote_strategy(strategy)?;
        let identifier_columns = hierarchy.identifier.column_names();

        let (table, key_columns) = match strategy {
            InheritanceStrategy::Discriminator => (
                super_entity.primary_table.clone(),
                super_entity.key_columns.clone(),
            ),
            _ => {
                let table = self.bind_table(class)?;
                if let (Some(own), Some(inherited)) =
                    (table.physical(), super_entity.primary_table.physical())
                {
                    if strategy == InheritanceStrategy::Union {
                        for name in inherited.column_names() {
                            if let Some(column) = inherited.get_column(&name) {
                                own.locate_or_create_column(column);
                            }
                        }
                    } else {
                        for name in &identifier_columns {
                            own.locate_or_create_column(
                                Column::new(self.context.to_identifier(name)).nullable(false),
                            );
                        }
                        own.add_foreign_key(
                            identifier_columns.clone(),
                            inherited,
                            super_entity.key_columns.clone(),
                        );
                    }
                    own.set_primary_key(&identifier_columns);
                }
                (table, identifier_columns)
            }
        };

        let mut entity = EntityBinding::new(&class.name, hierarchy, table);
        entity.super_entity = Some(EntityBindingRef::new(super_entity));
        entity.key_columns = key_columns;
        entity.discriminator_value = match strategy {
            InheritanceStrategy::Discriminator => Some(discriminator_value(class)),
            _ => class.find(|a| match a {
                ClassAnnotation::DiscriminatorValue(value) => Some(value.clone()),
                _ => None,
            }),
        };
        Ok(entity)
    }

    fn bind_table(&self, class: &ClassDescriptor) -> Result<TableReference> {
        let ctx = &self.context;
        let naming = ctx.naming_strategy();
        let database = ctx.collector().database();

        if let Some(expression) = class.find(|a| match a {
            ClassAnnotation::Subselect(expression) => Some(expression.as_str()),
            _ => None,
        }) {
            let logical_name = ctx.to_identifier(&naming.class_to_table_name(&class.name));
            return Ok(TableReference::Derived(
                database.create_derived_table(expression, Some(logical_name)),
            ));
        }

        let (name, schema, catalog) = class
            .find(|a| match a {
                ClassAnnotation::Table {
                    name,
                    schema,
                    catalog,
                } => Some((name.as_deref(), schema.as_deref(), catalog.as_deref())),
                _ => None,
            })
            .unwrap_or((None, None, None));
        let name = match name {
            Some(name) => naming.table_name(name),
            None => naming.class_to_table_name(&class.name),
        };

        Ok(TableReference::Physical(database.locate_or_create_table(
            ctx.schema_name(schema, catalog),
            ctx.to_identifier(&name),
        )))
    }

    fn bind_identifier(
        &self,
        class: &ClassDescriptor,
        attributes: &[AttributeDescriptor],
        table: &TableReference,
    ) -> Result<IdentifierDescriptor> {
        let ctx = &self.context;

        if let Some(embedded) = attributes
            .iter()
            .find(|attribute| attribute.has(|a| matches!(a, AttributeAnnotation::EmbeddedId)))
        {
            let owner = Owner {
                entity_name: &class.name,
                table,
                identifier_columns: &[],
            };
            let mut bound = BoundAttributes::default();
            let component = self.bind_component(embedded, &owner, "", &mut bound, true)?;
            return Ok(IdentifierDescriptor::CompositeAggregated {
                attribute: component,
            });
        }

        let ids: Vec<&AttributeDescriptor> = attributes.iter().filter(|a| a.is_id()).collect();
        let id_class = class.find(|a| match a {
            ClassAnnotation::IdClass(name) => Some(name.clone()),
            _ => None,
        });

        match (ids.as_slice(), id_class) {
            ([], _) => Err(mapping_error!("No identifier specified for entity: {}", class.name)),
            ([id], None) => {
                let column = self.bind_basic_column(id, table, "");
                Ok(IdentifierDescriptor::Simple {
                    attribute: Some(id.name.clone()),
                    columns: vec![column],
                    java_type: ctx.make_java_type(&id.java_type),
                    generator: Some(self.bind_generator(id)?),
                    unsaved_value: None,
                })
            }
            (ids, id_class) => {
                let attributes = ids
                    .iter()
                    .map(|id| {
                        let column = add_column(
                            ctx,
                            table,
                            &self.column_name(id, ""),
                            false,
                            false,
                        );
                        let mut binding =
                            BasicAttributeBinding::new(&id.name, ctx.make_java_type(&id.java_type), vec![column]);
                        binding.nullable = false;
                        AttributeBinding::Basic(binding)
                    })
                    .collect();
                Ok(IdentifierDescriptor::CompositeNonAggregated { attributes, id_class })
            }
        }
    }

    fn bind_generator(&self, id: &AttributeDescriptor) -> Result<IdGenerator> {
        let generated = id.find(|a| match a {
            AttributeAnnotation::GeneratedValue { generator } => Some(generator.as_deref()),
            _ => None,
        });
        match generated {
            None => Ok(IdGenerator::new("assigned")),
            Some(None) => Ok(IdGenerator::new("native")),
            Some(Some(name)) => {
                let definition = self
                    .context
                    .collector()
                    .get_id_generator(name)
                    .ok_or_else(|| mapping_error!("Unknown id generator: {}", name))?;
                let mut generator = IdGenerator::new(definition.strategy);
                generator.parameters = definition.parameters;
                Ok(generator)
            }
        }
    }

    fn entity_caching(&self, class: &ClassDescriptor) -> Option<Caching> {
        if let Some(caching) = class.find(|a| match a {
            ClassAnnotation::Cache { usage, region } => Some(Caching::new(
                region.clone().unwrap_or_else(|| class.name.clone()),
                *usage,
            )),
            _ => None,
        }) {
            return Some(caching);
        }
        if class.annotations.contains(&ClassAnnotation::Cacheable) {
            return self
                .context
                .defaults()
                .cache_access_type()
                .map(|usage| Caching::new(class.name.clone(), usage));
        }
        None
    }

    fn column_name(&self, attribute: &AttributeDescriptor, path: &str) -> String {
        let naming = self.context.naming_strategy();
        match attribute.column().and_then(|spec| spec.name.as_deref()) {
            Some(name) => naming.column_name(name),
            None => naming.property_to_column_name(&join_path(path, &attribute.name)),
        }
    }

    fn bind_basic_column(&self, attribute: &AttributeDescriptor, table: &TableReference, path: &str) -> String {
        let spec = attribute.column().cloned().unwrap_or_default();
        add_column(
            &self.context,
            table,
            &self.column_name(attribute, path),
            spec.nullable && !attribute.is_id(),
            spec.unique,
        )
    }

    fn bind_attribute(
        &self,
        attribute: &AttributeDescriptor,
        owner: &Owner<'_>,
        path: &str,
        bound: &mut BoundAttributes,
    ) -> Result<()> {
        let association = attribute.find(|a| match a {
            AttributeAnnotation::ManyToOne { .. } | AttributeAnnotation::OneToOne { .. } => Some(a),
            _ => None,
        });
        if let Some(association) = association {
            let binding = self.bind_to_one(attribute, association, owner)?;
            bound.attributes.push(AttributeBinding::ToOne(binding));
            return Ok(());
        }

        if attribute.has(|a| {
            matches!(
                a,
                AttributeAnnotation::OneToMany { .. }
                    | AttributeAnnotation::ManyToMany { .. }
                    | AttributeAnnotation::ElementCollection
            )
        }) {
            let collection = self.bind_collection(attribute, owner, path)?;
            bound
                .attributes
                .push(AttributeBinding::Plural(collection.clone()));
            bound.collections.push(collection);
            return Ok(());
        }

        let embedded = attribute.has(|a| matches!(a, AttributeAnnotation::Embedded))
            || self
                .find_class(&attribute.java_type)
                .map(|class| class.is_embeddable())
                .unwrap_or(false);
        if embedded {
            let component = self.bind_component(attribute, owner, path, bound, false)?;
            bound.attributes.push(AttributeBinding::Embedded(component));
            return Ok(());
        }

        let type_name = attribute
            .find(|a| match a {
                AttributeAnnotation::Type(name) => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or(&attribute.java_type);
        let spec = attribute.column().cloned().unwrap_or_default();
        let column = self.bind_basic_column(attribute, owner.table, path);
        let mut binding =
            BasicAttributeBinding::new(&attribute.name, self.context.make_java_type(type_name), vec![column]);
        binding.nullable = spec.nullable;
        binding.access = self.context.defaults().property_access_name().to_string();
        bound.attributes.push(AttributeBinding::Basic(binding));
        Ok(())
    }

    fn bind_component(
        &self,
        attribute: &AttributeDescriptor,
        owner: &Owner<'_>,
        path: &str,
        bound: &mut BoundAttributes,
        identifier: bool,
    ) -> Result<EmbeddedAttributeBinding> {
        let class = self.find_class(&attribute.java_type).ok_or_else(|| {
            mapping_error!(
                "Embeddable class {} of attribute {} is not registered",
                attribute.java_type,
                attribute.name
            )
        })?;
        let component_path = join_path(path, &attribute.name);
        let mut nested = BoundAttributes::default();
        for nested_attribute in class.attributes.iter().filter(|a| !a.is_transient()) {
            self.bind_attribute(nested_attribute, owner, &component_path, &mut nested)?;
        }
        if identifier {
            for binding in &mut nested.attributes {
                if let AttributeBinding::Basic(basic) = binding {
                    basic.nullable = false;
                    for column in &basic.columns {
                        owner.table.locate_or_create_column(
                            Column::new(self.context.to_identifier(column)).nullable(false),
                        );
                    }
                }
            }
        }
        bound.collections.extend(nested.collections);

        Ok(EmbeddedAttributeBinding {
            name: attribute.name.clone(),
            component: Arc::new(EmbeddableDescriptor {
                class_name: Some(class.name.clone()),
                path: component_path,
                parent_attribute: None,
                attributes: nested.attributes,
            }),
            dynamic: false,
        })
    }

    fn bind_to_one(
        &self,
        attribute: &AttributeDescriptor,
        association: &AttributeAnnotation,
        owner: &Owner<'_>,
    ) -> Result<ToOneAttributeBinding> {
        let ctx = &self.context;
        let (kind, target, optional, mapped_by) = match association {
            AttributeAnnotation::ManyToOne { target, optional } => {
                (ToOneKind::ManyToOne, target, *optional, None)
            }
            AttributeAnnotation::OneToOne { target, mapped_by } => {
                (ToOneKind::OneToOne, target, true, mapped_by.as_deref())
            }
            _ => return Err(mapping_error!("{} is not a to-one association", attribute.name)),
        };
        let target = target.clone().unwrap_or_else(|| attribute.java_type.clone());

        let join_column = attribute.find(|a| match a {
            AttributeAnnotation::JoinColumn { name, nullable } => Some((name.as_str(), *nullable)),
            _ => None,
        });
        let nullable = optional && join_column.map(|(_, nullable)| nullable).unwrap_or(true);

        let columns = match mapped_by {
            Some(_) => Vec::new(),
            None => {
                let name = match join_column {
                    Some((name, _)) => ctx.naming_strategy().column_name(name),
                    None => ctx.naming_strategy().foreign_key_column_name(
                        Some(&attribute.name),
                        &target,
                        &self.target_table_name(&target),
                        ctx.defaults().identifier_column_name(),
                    ),
                };
                vec![add_column(ctx, owner.table, &name, nullable, kind == ToOneKind::OneToOne)]
            }
        };

        let mut binding = ToOneAttributeBinding::new(&attribute.name, target, columns);
        binding.kind = kind;
        binding.property_ref = mapped_by.map(str::to_string);
        binding.nullable = nullable;
        binding.unique = kind == ToOneKind::OneToOne && mapped_by.is_none();
        binding.constrained = kind == ToOneKind::OneToOne && !optional;
        let eager = attribute.has(|a| matches!(a, AttributeAnnotation::Eager));
        binding.lazy = !eager;
        binding.fetch = if eager { FetchStyle::Join } else { FetchStyle::Select };
        binding.cascade = ctx.defaults().cascade_style().to_string();
        Ok(binding)
    }

    fn target_table_name(&self, target: &str) -> String {
        match self.context.collector().get_entity_binding(target) {
            Some(entity) => entity.primary_table.logical_name().text().to_string(),
            None => self.context.naming_strategy().class_to_table_name(target),
        }
    }

    fn bind_collection(
        &self,
        attribute: &AttributeDescriptor,
        owner: &Owner<'_>,
        path: &str,
    ) -> Result<PluralAttributeBindingRc> {
        let ctx = &self.context;
        let naming = ctx.naming_strategy();
        let attribute_path = join_path(path, &attribute.name);
        let role = format!("{}.{}", owner.entity_name, attribute_path);
        let owner_table_name = owner.table.logical_name().text().to_string();
        let element_type = attribute
            .element_type
            .clone()
            .unwrap_or_else(|| BasicTypeKind::Serializable.to_string());

        let order_column = attribute.find(|a| match a {
            AttributeAnnotation::OrderColumn(column) => Some(column.clone()),
            _ => None,
        });
        let nature = match unqualify(&attribute.java_type) {
            "List" if order_column.is_some() => PluralAttributeNature::List,
            "Set" | "SortedSet" => PluralAttributeNature::Set,
            "Map" | "SortedMap" => PluralAttributeNature::Map,
            _ => PluralAttributeNature::Bag,
        };

        let join_table = attribute.find(|a| match a {
            AttributeAnnotation::JoinTable {
                name,
                join_column,
                inverse_join_column,
            } => Some((name.clone(), join_column.clone(), inverse_join_column.clone())),
            _ => None,
        });
        let join_column = attribute.find(|a| match a {
            AttributeAnnotation::JoinColumn { name, .. } => Some(name.clone()),
            _ => None,
        });
        let default_key = || {
            naming.foreign_key_column_name(
                None,
                owner.entity_name,
                &owner_table_name,
                owner.identifier_columns.first().map(String::as_str).unwrap_or_default(),
            )
        };

        let association = attribute.find(|a| match a {
            AttributeAnnotation::OneToMany { target, mapped_by } => {
                Some((true, target.clone(), mapped_by.clone()))
            }
            AttributeAnnotation::ManyToMany { target, mapped_by } => {
                Some((false, target.clone(), mapped_by.clone()))
            }
            _ => None,
        });

        let mut inverse = false;
        let (table, key_columns, element) = match association {
            Some((one_to_many, target, mapped_by)) => {
                let target = target.unwrap_or(element_type);
                let target_table = self.target_table_name(&target);
                inverse = mapped_by.is_some();

                if one_to_many && join_table.is_none() && (mapped_by.is_some() || join_column.is_some()) {
                    let key = match (&mapped_by, &join_column) {
                        (_, Some(column)) => naming.column_name(column),
                        (Some(mapped_by), None) => self.mapped_by_column(&target, mapped_by, &target_table),
                        (None, None) => default_key(),
                    };
                    (
                        None,
                        vec![ctx.to_identifier(&key).text().to_string()],
                        ElementDescriptor::OneToMany {
                            referenced_entity_name: target,
                            target: OnceLock::new(),
                        },
                    )
                } else {
                    let (table_name, key, element_column) = match (&join_table, &mapped_by) {
                        (Some((name, join, inverse_join)), _) => (
                            naming.table_name(name),
                            join.clone().unwrap_or_else(default_key),
                            inverse_join.clone(),
                        ),
                        (None, Some(mapped_by)) => (
                            naming.collection_table_name(
                                &target,
                                &target_table,
                                Some(owner.entity_name),
                                Some(&owner_table_name),
                                mapped_by,
                            ),
                            naming.foreign_key_column_name(
                                Some(mapped_by),
                                owner.entity_name,
                                &owner_table_name,
                                ctx.defaults().identifier_column_name(),
                            ),
                            Some(default_key_for(naming, &target, &target_table)),
                        ),
                        (None, None) => (
                            naming.collection_table_name(
                                owner.entity_name,
                                &owner_table_name,
                                Some(&target),
                                Some(&target_table),
                                &attribute_path,
                            ),
                            default_key(),
                            None,
                        ),
                    };
                    let table = self.collection_table(&table_name);
                    let key = add_column(ctx, &table, &key, false, false);
                    let element_column = element_column.unwrap_or_else(|| {
                        naming.foreign_key_column_name(
                            Some(&attribute_path),
                            &target,
                            &target_table,
                            ctx.defaults().identifier_column_name(),
                        )
                    });
                    let element_column = add_column(ctx, &table, &element_column, false, false);
                    (
                        Some(table),
                        vec![key],
                        ElementDescriptor::ManyToMany {
                            referenced_entity_name: target,
                            columns: vec![element_column],
                            unique: one_to_many,
                            target: OnceLock::new(),
                        },
                    )
                }
            }
            None => {
                let (table_name, key) = match attribute.find(|a| match a {
                    AttributeAnnotation::CollectionTable { name, join_column } => {
                        Some((name.clone(), join_column.clone()))
                    }
                    _ => None,
                }) {
                    Some((name, join_column)) => {
                        (naming.table_name(&name), join_column.unwrap_or_else(default_key))
                    }
                    None => (
                        naming.collection_table_name(
                            owner.entity_name,
                            &owner_table_name,
                            None,
                            None,
                            &attribute_path,
                        ),
                        default_key(),
                    ),
                };
                let table = self.collection_table(&table_name);
                let key = add_column(ctx, &table, &key, false, false);
                let element = self.bind_element_collection_element(attribute, &element_type, &table, &attribute_path)?;
                (Some(table), vec![key], element)
            }
        };

        let index = match nature {
            PluralAttributeNature::List => {
                let column = order_column.unwrap_or_else(|| format!("{}_ORDER", attribute.name));
                Some(IndexDescriptor::Basic {
                    java_type: ctx.make_java_type(&BasicTypeKind::Integer.to_string()),
                    columns: vec![self.index_column(table.as_ref(), &column)],
                    base: 0,
                })
            }
            PluralAttributeNature::Map => {
                let column = attribute
                    .find(|a| match a {
                        AttributeAnnotation::MapKeyColumn(column) => Some(column.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| format!("{}_KEY", attribute.name));
                Some(IndexDescriptor::Basic {
                    java_type: ctx.make_java_type(&BasicTypeKind::String.to_string()),
                    columns: vec![self.index_column(table.as_ref(), &column)],
                    base: 0,
                })
            }
            _ => None,
        };

        if let Some(physical) = table.as_ref().and_then(TableReference::physical) {
            if !inverse {
                let mut primary_key = key_columns.clone();
                match (&index, nature) {
                    (Some(index), _) => primary_key.extend(index.column_names()),
                    (None, PluralAttributeNature::Set) => primary_key.extend(element.column_names()),
                    _ => primary_key.clear(),
                }
                if !primary_key.is_empty() {
                    physical.set_primary_key(&primary_key);
                }
            }
        }

        let key = PluralAttributeKey {
            columns: key_columns,
            property_ref: None,
            nullable: table.is_some() || inverse,
            updatable: true,
            cascade_delete: false,
        };
        let mut binding = PluralAttributeBinding::new(
            owner.entity_name,
            &attribute_path,
            nature,
            key,
            element,
        );
        binding.table = table;
        binding.index = index;
        binding.inverse = inverse;
        let eager = attribute.has(|a| matches!(a, AttributeAnnotation::Eager));
        binding.lazy = !eager;
        binding.fetch = if attribute.has(|a| matches!(a, AttributeAnnotation::SubselectFetch)) {
            FetchStyle::Subselect
        } else if eager {
            FetchStyle::Join
        } else {
            FetchStyle::Select
        };
        binding.cascade = ctx.defaults().cascade_style().to_string();
        binding.order_by = attribute.find(|a| match a {
            AttributeAnnotation::OrderBy(order) => Some(order.clone()),
            _ => None,
        });
        binding.set_caching(attribute.find(|a| match a {
            AttributeAnnotation::Cache { usage, region } => Some(Caching::new(
                region.clone().unwrap_or_else(|| role.clone()),
                *usage,
            )),
            _ => None,
        }));

        trace!("Bound collection {} as {}", binding.role, binding.nature);
        Ok(Arc::new(binding))
    }

    /// The join column of the owning side of a bidirectional association
    fn mapped_by_column(&self, target: &str, mapped_by: &str, target_table: &str) -> String {
        let naming = self.context.naming_strategy();
        let declared = self
            .find_class(target)
            .and_then(|class| class.get_attribute(mapped_by).cloned())
            .and_then(|attribute| {
                attribute.find(|a| match a {
                    AttributeAnnotation::JoinColumn { name, .. } => Some(name.clone()),
                    _ => None,
                })
            });
        match declared {
            Some(column) => naming.column_name(&column),
            None => naming.foreign_key_column_name(
                Some(mapped_by),
                target,
                target_table,
                self.context.defaults().identifier_column_name(),
            ),
        }
    }

    fn collection_table(&self, name: &str) -> TableReference {
        let ctx = &self.context;
        TableReference::Physical(
            ctx.collector()
                .database()
                .locate_or_create_table(ctx.schema_name(None, None), ctx.to_identifier(name)),
        )
    }

    fn index_column(&self, table: Option<&TableReference>, column: &str) -> String {
        match table {
            Some(table) => add_column(&self.context, table, column, false, false),
            None => self.context.to_identifier(column).text().to_string(),
        }
    }

    fn bind_element_collection_element(
        &self,
        attribute: &AttributeDescriptor,
        element_type: &str,
        table: &TableReference,
        attribute_path: &str,
    ) -> Result<ElementDescriptor> {
        let ctx = &self.context;
        if let Some(class) = self.find_class(element_type).filter(|class| class.is_embeddable()) {
            let component_path = format!("{attribute_path}.element");
            let owner = Owner {
                entity_name: attribute_path,
                table,
                identifier_columns: &[],
            };
            let mut nested = BoundAttributes::default();
            for nested_attribute in class.attributes.iter().filter(|a| !a.is_transient()) {
                self.bind_attribute(nested_attribute, &owner, "", &mut nested)?;
            }
            if let Some(collection) = nested.collections.first() {
                return Err(mapping_error!(
                    "Element collection {} cannot contain collection {}",
                    attribute_path,
                    collection.role
                ));
            }
            return Ok(ElementDescriptor::Embeddable {
                component: Arc::new(EmbeddableDescriptor {
                    class_name: Some(class.name.clone()),
                    path: component_path,
                    parent_attribute: None,
                    attributes: nested.attributes,
                }),
            });
        }

        let column = match attribute.column().and_then(|spec| spec.name.as_deref()) {
            Some(name) => ctx.naming_strategy().column_name(name),
            None => ctx.naming_strategy().property_to_column_name(&attribute.name),
        };
        Ok(ElementDescriptor::Basic {
            java_type: ctx.make_java_type(element_type),
            columns: vec![add_column(ctx, table, &column, false, false)],
            formula: None,
        })
    }

    fn bind_fetch_profiles(&self, class: &ClassDescriptor) {
        let collector = self.context.collector();
        for annotation in &class.annotations {
            if let ClassAnnotation::FetchProfile { name, fetches } = annotation {
                let profile = collector.find_or_create_fetch_profile(name, MetadataSourceType::Class);
                for fetch in fetches {
                    profile.add_fetch(&fetch.entity, &fetch.association, fetch.style);
                }
            }
        }
    }
}

fn default_key_for(naming: &dyn NamingStrategy, entity: &str, table: &str) -> String {
    naming.foreign_key_column_name(None, entity, table, "")
}

fn discriminator_value(class: &ClassDescriptor) -> String {
    class
        .find(|a| match a {
            ClassAnnotation::DiscriminatorValue(value) => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| class.jpa_entity_name().to_string())
}

impl MetadataSourceProcessor for AnnotationMetadataSourceProcessor<'_> {
    type Source = ClassDescriptor;

    fn source_type(&self) -> MetadataSourceType {
        MetadataSourceType::Class
    }

    fn process_independent_metadata(&self, class: &ClassDescriptor) -> Result<()> {
        let collector = self.context.collector();
        for annotation in &class.annotations {
            match annotation {
                ClassAnnotation::TypeDef {
                    name,
                    type_class,
                    parameters,
                } => collector.add_type_definition(TypeDefinition {
                    name: name.clone(),
                    type_implementor: type_class.clone(),
                    parameters: parameters.clone(),
                }),
                ClassAnnotation::GenericGenerator {
                    name,
                    strategy,
                    parameters,
                } => collector.add_id_generator(IdGeneratorDefinition {
                    name: name.clone(),
                    strategy: strategy.clone(),
                    parameters: parameters.clone(),
                }),
                ClassAnnotation::SequenceGenerator {
                    name,
                    sequence_name,
                } => collector.add_id_generator(IdGeneratorDefinition {
                    name: name.clone(),
                    strategy: "sequence".to_string(),
                    parameters: vec![("sequence_name".to_string(), sequence_name.clone())],
                }),
                _ => {}
            }
        }
        Ok(())
    }

    fn process_type_dependent_metadata(&self, class: &ClassDescriptor) -> Result<()> {
        for annotation in &class.annotations {
            if let ClassAnnotation::FilterDef {
                name,
                default_condition,
                parameters,
            } = annotation
            {
                self.context
                    .collector()
                    .add_filter_definition(FilterDefinition {
                        name: name.clone(),
                        default_condition: default_condition.clone(),
                        parameters: parameters
                            .iter()
                            .map(|(name, type_name)| {
                                (name.clone(), self.context.make_java_type(type_name))
                            })
                            .collect(),
                    });
            }
        }
        Ok(())
    }

    fn process_mapping_metadata(&self, class: &ClassDescriptor) -> Result<MappingOutcome> {
        if class.is_entity() {
            self.bind_entity(class)?;
            self.bind_fetch_profiles(class);
        } else {
            trace!("{} binds no entity of its own", class.name);
        }
        Ok(MappingOutcome::Bound)
    }

    fn process_mapping_dependent_metadata(&self, class: &ClassDescriptor) -> Result<()> {
        let collector = self.context.collector();
        for annotation in &class.annotations {
            match annotation {
                ClassAnnotation::NamedQuery { name, query } => {
                    collector.add_named_query(NamedQueryDefinition::new(name, query));
                }
                ClassAnnotation::NamedNativeQuery {
                    name,
                    query,
                    result_set_mapping,
                    result_class,
                } => {
                    let result_set_ref = match (result_set_mapping, result_class) {
                        (Some(mapping), _) => Some(mapping.clone()),
                        (None, Some(result_class)) => {
                            collector.add_result_set_mapping(ResultSetMappingDefinition {
                                name: name.clone(),
                                entity_returns: vec![EntityReturn {
                                    alias: RESULT_CLASS_ALIAS.to_string(),
                                    entity_name: result_class.clone(),
                                }],
                                scalar_returns: Vec::new(),
                            });
                            Some(name.clone())
                        }
                        (None, None) => None,
                    };
                    collector.add_named_native_query(NamedNativeQueryDefinition {
                        name: name.clone(),
                        query: query.clone(),
                        result_set_ref,
                        synchronized_tables: Vec::new(),
                        callable: false,
                    });
                }
                ClassAnnotation::SqlResultSetMapping {
                    name,
                    entities,
                    columns,
                } => collector.add_result_set_mapping(ResultSetMappingDefinition {
                    name: name.clone(),
                    entity_returns: entities
                        .iter()
                        .map(|entity| EntityReturn {
                            alias: unqualify(entity).to_string(),
                            entity_name: entity.clone(),
                        })
                        .collect(),
                    scalar_returns: columns
                        .iter()
                        .map(|column| ScalarReturn {
                            column: column.clone(),
                            type_name: None,
                        })
                        .collect(),
                }),
                ClassAnnotation::NamedEntityGraph {
                    name,
                    attribute_nodes,
                } if class.is_entity() => {
                    collector.add_named_entity_graph(NamedEntityGraphDefinition {
                        name: name
                            .clone()
                            .unwrap_or_else(|| class.jpa_entity_name().to_string()),
                        entity_name: class.name.clone(),
                        attribute_nodes: attribute_nodes.clone(),
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            binding::{ElementClassification, IdentifierClassification},
            collector::MetadataCollector,
            typesystem::{ColumnSpec, FetchOverride},
        },
        test::{create_collector, create_root_context},
        Error,
    };

    fn entity(name: &str) -> ClassDescriptor {
        ClassDescriptor::new(name).annotated(ClassAnnotation::Entity { name: None })
    }

    fn id(name: &str) -> AttributeDescriptor {
        AttributeDescriptor::new(name, "long")
            .annotated(AttributeAnnotation::Id)
            .annotated(AttributeAnnotation::GeneratedValue { generator: None })
    }

    fn bind_all(collector: &MetadataCollector, classes: &[ClassDescriptor]) -> Result<()> {
        let registry = collector.type_resolver().classes();
        let registered: Vec<ClassDescriptorRc> = classes
            .iter()
            .map(|class| registry.register(class.clone()))
            .collect();
        let processor = AnnotationMetadataSourceProcessor::new(create_root_context(collector));
        for class in &registered {
            processor.process_independent_metadata(class)?;
        }
        for class in &registered {
            processor.process_type_dependent_metadata(class)?;
        }
        for class in &registered {
            processor.process_mapping_metadata(class)?;
        }
        for class in &registered {
            processor.process_mapping_dependent_metadata(class)?;
        }
        Ok(())
    }

    #[test]
    fn test_bind_entity_with_mapped_superclass() {
        let collector = create_collector();
        bind_all(
            &collector,
            &[
                ClassDescriptor::new("acme.Base")
                    .annotated(ClassAnnotation::MappedSuperclass)
                    .attribute(id("id"))
                    .attribute(AttributeDescriptor::new("created", "java.sql.Timestamp")),
                entity("acme.Customer")
                    .extends("acme.Base")
                    .annotated(ClassAnnotation::Table {
                        name: Some("CUSTOMERS".to_string()),
                        schema: None,
                        catalog: None,
                    })
                    .attribute(
                        AttributeDescriptor::new("name", "java.lang.String").annotated(
                            AttributeAnnotation::Column(ColumnSpec {
                                name: Some("FULL_NAME".to_string()),
                                nullable: false,
                                ..Default::default()
                            }),
                        ),
                    )
                    .attribute(AttributeDescriptor::new("cache", "java.lang.String").annotated(AttributeAnnotation::Transient)),
            ],
        )
        .unwrap();

        let customer = collector.get_entity_binding("acme.Customer").unwrap();
        assert_eq!(customer.jpa_entity_name, "Customer");
        assert_eq!(customer.source, MetadataSourceType::Class);
        assert_eq!(customer.attribute_names(), vec!["created", "name"]);
        assert_eq!(
            customer.hierarchy.identifier.generator().unwrap().strategy,
            "native"
        );
        let table = customer.primary_table.physical().unwrap();
        assert_eq!(table.qualified_name(), "CUSTOMERS");
        assert_eq!(table.primary_key(), vec!["id"]);
        assert!(!table.get_column("FULL_NAME").unwrap().nullable);
        assert!(collector.get_entity_binding("acme.Base").is_none());
        assert_eq!(collector.get_import("Customer").as_deref(), Some("acme.Customer"));
    }

    #[test]
    fn test_joined_hierarchy() {
        let collector = create_collector();
        bind_all(
            &collector,
            &[
                entity("acme.Payment")
                    .annotated(ClassAnnotation::Inheritance(InheritanceType::Joined))
                    .attribute(id("id")),
                entity("acme.CardPayment")
                    .extends("acme.Payment")
                    .attribute(AttributeDescriptor::new("number", "java.lang.String")),
            ],
        )
        .unwrap();

        let card = collector.get_entity_binding("acme.CardPayment").unwrap();
        assert_eq!(card.hierarchy.strategy(), InheritanceStrategy::Joined);
        let table = card.primary_table.physical().unwrap();
        assert_eq!(table.qualified_name(), "CardPayment");
        assert_eq!(table.primary_key(), vec!["id"]);
        assert_eq!(table.foreign_keys().len(), 1);
        assert_eq!(card.super_entity().unwrap().entity_name, "acme.Payment");
    }

    #[test]
    fn test_single_table_hierarchy() {
        let collector = create_collector();
        bind_all(
            &collector,
            &[
                entity("zoo.Animal")
                    .annotated(ClassAnnotation::Inheritance(InheritanceType::SingleTable))
                    .attribute(id("id")),
                entity("zoo.Dog")
                    .extends("zoo.Animal")
                    .annotated(ClassAnnotation::DiscriminatorValue("D".to_string())),
            ],
        )
        .unwrap();

        let animal = collector.get_entity_binding("zoo.Animal").unwrap();
        let discriminator = animal.hierarchy.discriminator.as_ref().unwrap();
        assert_eq!(discriminator.column.as_deref(), Some("DTYPE"));
        assert_eq!(animal.discriminator_value.as_deref(), Some("Animal"));

        let dog = collector.get_entity_binding("zoo.Dog").unwrap();
        assert_eq!(dog.discriminator_value.as_deref(), Some("D"));
        assert!(dog.primary_table.same_table(&animal.primary_table));
    }

    #[test]
    fn test_collections() {
        let collector = create_collector();
        bind_all(
            &collector,
            &[
                entity("shop.Order")
                    .attribute(id("id"))
                    .attribute(
                        AttributeDescriptor::new("lines", "java.util.List")
                            .of("shop.Line")
                            .annotated(AttributeAnnotation::OneToMany {
                                target: None,
                                mapped_by: Some("order".to_string()),
                            })
                            .annotated(AttributeAnnotation::OrderColumn("POS".to_string())),
                    )
                    .attribute(
                        AttributeDescriptor::new("tags", "java.util.Set")
                            .of("java.lang.String")
                            .annotated(AttributeAnnotation::ElementCollection),
                    ),
                entity("shop.Line").attribute(id("id")).attribute(
                    AttributeDescriptor::new("order", "shop.Order")
                        .annotated(AttributeAnnotation::ManyToOne {
                            target: None,
                            optional: false,
                        })
                        .annotated(AttributeAnnotation::JoinColumn {
                            name: "ORDER_ID".to_string(),
                            nullable: false,
                        }),
                ),
            ],
        )
        .unwrap();

        let lines = collector.get_collection("shop.Order.lines").unwrap();
        assert_eq!(lines.nature, PluralAttributeNature::List);
        assert!(lines.inverse);
        assert!(lines.is_one_to_many());
        assert_eq!(lines.key.columns, vec!["ORDER_ID"]);

        let tags = collector.get_collection("shop.Order.tags").unwrap();
        assert_eq!(tags.element_classification(), ElementClassification::Basic);
        let table = tags.table.as_ref().unwrap().physical().unwrap();
        assert_eq!(table.qualified_name(), "Order_tags");
        assert_eq!(table.primary_key(), vec!["Order", "tags"]);

        let line = collector.get_entity_binding("shop.Line").unwrap();
        let order = line.attribute("order").unwrap().as_to_one().unwrap();
        assert!(!order.nullable);
        assert_eq!(order.columns, vec!["ORDER_ID"]);
    }

    #[test]
    fn test_embedded_id() {
        let collector = create_collector();
        bind_all(
            &collector,
            &[
                ClassDescriptor::new("acme.LinePk")
                    .annotated(ClassAnnotation::Embeddable)
                    .attribute(AttributeDescriptor::new("orderId", "long"))
                    .attribute(AttributeDescriptor::new("position", "int")),
                entity("acme.LineItem").attribute(
                    AttributeDescriptor::new("pk", "acme.LinePk").annotated(AttributeAnnotation::EmbeddedId),
                ),
            ],
        )
        .unwrap();

        let item = collector.get_entity_binding("acme.LineItem").unwrap();
        assert_eq!(
            item.hierarchy.identifier.classification(),
            IdentifierClassification::CompositeAggregated
        );
        assert_eq!(item.key_columns, vec!["orderId", "position"]);
        assert!(item.attribute_names().is_empty());
    }

    #[test]
    fn test_missing_identifier() {
        let collector = create_collector();
        let err = bind_all(&collector, &[entity("acme.NoId")]).unwrap_err();
        assert!(err.to_string().contains("No identifier specified for entity: acme.NoId"));
    }

    #[test]
    fn test_definitions_and_queries() {
        let collector = create_collector();
        bind_all(
            &collector,
            &[entity("acme.Account")
                .annotated(ClassAnnotation::GenericGenerator {
                    name: "uuid".to_string(),
                    strategy: "uuid2".to_string(),
                    parameters: Vec::new(),
                })
                .annotated(ClassAnnotation::NamedQuery {
                    name: "Account.all".to_string(),
                    query: "from Account".to_string(),
                })
                .annotated(ClassAnnotation::NamedNativeQuery {
                    name: "Account.raw".to_string(),
                    query: "select * from Account".to_string(),
                    result_set_mapping: None,
                    result_class: Some("acme.Account".to_string()),
                })
                .annotated(ClassAnnotation::NamedEntityGraph {
                    name: None,
                    attribute_nodes: vec!["owner".to_string()],
                })
                .annotated(ClassAnnotation::FetchProfile {
                    name: "eager".to_string(),
                    fetches: vec![FetchOverride {
                        entity: "acme.Account".to_string(),
                        association: "owner".to_string(),
                        style: FetchStyle::Join,
                    }],
                })
                .attribute(
                    AttributeDescriptor::new("id", "java.lang.String")
                        .annotated(AttributeAnnotation::Id)
                        .annotated(AttributeAnnotation::GeneratedValue {
                            generator: Some("uuid".to_string()),
                        }),
                )],
        )
        .unwrap();

        let account = collector.get_entity_binding("acme.Account").unwrap();
        assert_eq!(account.hierarchy.identifier.generator().unwrap().strategy, "uuid2");
        assert!(collector.get_named_query("Account.all").is_some());
        let raw = collector.get_named_native_query("Account.raw").unwrap();
        assert_eq!(raw.result_set_ref.as_deref(), Some("Account.raw"));
        let graph = collector.get_named_entity_graph("Account").unwrap();
        assert_eq!(graph.entity_name, "acme.Account");
        assert_eq!(collector.get_fetch_profile("eager").unwrap().fetch_count(), 1);
    }

    #[test]
    fn test_duplicate_entity_graph() {
        let collector = create_collector();
        let graph = ClassAnnotation::NamedEntityGraph {
            name: Some("g".to_string()),
            attribute_nodes: Vec::new(),
        };
        let err = bind_all(
            &collector,
            &[
                entity("a.A").annotated(graph.clone()).attribute(id("id")),
                entity("a.B").annotated(graph).attribute(id("id")),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateMapping { .. }));
    }
}

use std::sync::{Arc, OnceLock};

use crate::metadata::{
    binding::{EntityBindingRc, EntityBindingRef, FetchStyle, PluralAttributeBindingRc},
    meta::MetaAttributeContext,
    typesystem::JavaType,
};

/// A single-valued attribute mapped to one or more columns (or a formula).
#[derive(Debug)]
pub struct BasicAttributeBinding {
    /// Attribute name
    pub name: String,
    /// Resolved attribute type
    pub java_type: Arc<JavaType>,
    /// Mapped columns, empty for formula attributes
    pub columns: Vec<String>,
    /// SQL formula computing the value
    pub formula: Option<String>,
    /// Whether the value may be null
    pub nullable: bool,
    /// Whether the value is written on insert
    pub insertable: bool,
    /// Whether the value is written on update
    pub updatable: bool,
    /// Whether the value is fetched lazily
    pub lazy: bool,
    /// Property access strategy
    pub access: String,
    /// Whether the attribute is part of the natural id
    pub natural_id: bool,
    /// Meta attributes of the attribute
    pub meta: Arc<MetaAttributeContext>,
}

impl BasicAttributeBinding {
    /// Create a nullable, insertable and updatable attribute
    pub fn new(name: impl Into<String>, java_type: Arc<JavaType>, columns: Vec<String>) -> Self {
        BasicAttributeBinding {
            name: name.into(),
            java_type,
            columns,
            formula: None,
            nullable: true,
            insertable: true,
            updatable: true,
            lazy: false,
            access: crate::metadata::defaults::DEFAULT_PROPERTY_ACCESS.to_string(),
            natural_id: false,
            meta: Arc::new(MetaAttributeContext::new()),
        }
    }
}

/// An inline value type with no identity of its own.
#[derive(Debug)]
pub struct EmbeddableDescriptor {
    /// Component class, absent for dynamic components
    pub class_name: Option<String>,
    /// Attribute path of the component inside its owner, e.g. `address` or `id`
    pub path: String,
    /// Attribute of the component pointing back at the owner
    pub parent_attribute: Option<String>,
    /// Component attributes
    pub attributes: Vec<AttributeBinding>,
}

impl EmbeddableDescriptor {
    /// Columns of every attribute of the component, recursively
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.attributes
            .iter()
            .flat_map(AttributeBinding::column_names)
            .collect()
    }
}

/// An attribute whose value is a component.
#[derive(Debug)]
pub struct EmbeddedAttributeBinding {
    /// Attribute name
    pub name: String,
    /// The component
    pub component: Arc<EmbeddableDescriptor>,
    /// Whether the component is a map of dynamic properties
    pub dynamic: bool,
}

/// Kinds of single-valued entity associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ToOneKind {
    /// Foreign key on the owning table
    #[strum(serialize = "many-to-one")]
    ManyToOne,
    /// Shared primary key, or a unique foreign key on the other side
    #[strum(serialize = "one-to-one")]
    OneToOne,
}

/// A single-valued association to another entity.
///
/// The target entity is resolved in the second pass, once every entity is bound.
#[derive(Debug)]
pub struct ToOneAttributeBinding {
    /// Attribute name
    pub name: String,
    /// Association kind
    pub kind: ToOneKind,
    /// Entity name of the target
    pub referenced_entity_name: String,
    /// Foreign key columns, empty for a primary key one-to-one
    pub columns: Vec<String>,
    /// Target attribute referenced instead of the identifier
    pub property_ref: Option<String>,
    /// Whether the foreign key may be null
    pub nullable: bool,
    /// Whether the foreign key is unique
    pub unique: bool,
    /// Whether the foreign key is written on insert
    pub insertable: bool,
    /// Whether the foreign key is written on update
    pub updatable: bool,
    /// Whether the target is proxied
    pub lazy: bool,
    /// Fetch style
    pub fetch: FetchStyle,
    /// Cascade style
    pub cascade: String,
    /// Whether a one-to-one is constrained by a foreign key to the target
    pub constrained: bool,
    target: OnceLock<EntityBindingRef>,
}

impl ToOneAttributeBinding {
    /// Create a lazy, nullable many-to-one
    pub fn new(
        name: impl Into<String>,
        referenced_entity_name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        ToOneAttributeBinding {
            name: name.into(),
            kind: ToOneKind::ManyToOne,
            referenced_entity_name: referenced_entity_name.into(),
            columns,
            property_ref: None,
            nullable: true,
            unique: false,
            insertable: true,
            updatable: true,
            lazy: true,
            fetch: FetchStyle::Select,
            cascade: crate::metadata::defaults::DEFAULT_CASCADE.to_string(),
            constrained: false,
            target: OnceLock::new(),
        }
    }

    /// The target entity, once resolved
    #[must_use]
    pub fn target(&self) -> Option<EntityBindingRc> {
        self.target.get().and_then(EntityBindingRef::upgrade)
    }

    pub(crate) fn resolve_target(&self, target: &EntityBindingRc) {
        let _ = self.target.set(EntityBindingRef::new(target));
    }
}

/// A synthetic attribute tracking the owner key (or index) of a unidirectional one-to-many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackRefAttributeBinding {
    /// Synthetic attribute name, `_<role>BackRef` or `_<role>IndexBackRef`
    pub name: String,
    /// Role of the collection the attribute belongs to
    pub collection_role: String,
    /// Entity owning the collection
    pub owner_entity_name: String,
    /// Key (or index) columns
    pub columns: Vec<String>,
    /// Whether this tracks the collection index rather than the key
    pub index: bool,
}

/// A bound attribute of an entity or component.
#[derive(Debug)]
pub enum AttributeBinding {
    /// Single-column value
    Basic(BasicAttributeBinding),
    /// Component value
    Embedded(EmbeddedAttributeBinding),
    /// Single-valued association
    ToOne(ToOneAttributeBinding),
    /// Collection
    Plural(PluralAttributeBindingRc),
    /// Synthetic back reference
    BackRef(BackRefAttributeBinding),
}

impl AttributeBinding {
    /// Attribute name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            AttributeBinding::Basic(basic) => &basic.name,
            AttributeBinding::Embedded(embedded) => &embedded.name,
            AttributeBinding::ToOne(to_one) => &to_one.name,
            AttributeBinding::Plural(plural) => &plural.attribute_name,
            AttributeBinding::BackRef(back_ref) => &back_ref.name,
        }
    }

    /// Columns of the owning table this attribute maps to
    ///
    /// Collections map no columns of their owner.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        match self {
            AttributeBinding::Basic(basic) => basic.columns.clone(),
            AttributeBinding::Embedded(embedded) => embedded.component.column_names(),
            AttributeBinding::ToOne(to_one) => to_one.columns.clone(),
            AttributeBinding::Plural(_) => Vec::new(),
            AttributeBinding::BackRef(back_ref) => back_ref.columns.clone(),
        }
    }

    /// Returns true for attributes added by the binder rather than declared by a mapping
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self, AttributeBinding::BackRef(_))
    }

    /// This attribute as an association, if it is one
    #[must_use]
    pub fn as_to_one(&self) -> Option<&ToOneAttributeBinding> {
        match self {
            AttributeBinding::ToOne(to_one) => Some(to_one),
            _ => None,
        }
    }

    /// Visit every association of this attribute, descending into components
    pub fn for_each_to_one<F>(&self, visit: &mut F)
    where
        F: FnMut(&ToOneAttributeBinding),
    {
        match self {
            AttributeBinding::ToOne(to_one) => visit(to_one),
            AttributeBinding::Embedded(embedded) => {
                for attribute in &embedded.component.attributes {
                    attribute.for_each_to_one(visit);
                }
            }
            AttributeBinding::Basic(_) | AttributeBinding::Plural(_) | AttributeBinding::BackRef(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{BasicTypeKind, JavaTypeKind};

    fn string_type() -> Arc<JavaType> {
        Arc::new(JavaType {
            name: "string".to_string(),
            kind: JavaTypeKind::Basic(BasicTypeKind::String),
        })
    }

    #[test]
    fn test_component_columns_recurse() {
        let inner = EmbeddableDescriptor {
            class_name: Some("a.Zip".to_string()),
            path: "address.zip".to_string(),
            parent_attribute: None,
            attributes: vec![AttributeBinding::Basic(BasicAttributeBinding::new(
                "code",
                string_type(),
                vec!["ZIP".to_string()],
            ))],
        };
        let outer = EmbeddableDescriptor {
            class_name: Some("a.Address".to_string()),
            path: "address".to_string(),
            parent_attribute: None,
            attributes: vec![
                AttributeBinding::Basic(BasicAttributeBinding::new(
                    "street",
                    string_type(),
                    vec!["STREET".to_string()],
                )),
                AttributeBinding::Embedded(EmbeddedAttributeBinding {
                    name: "zip".to_string(),
                    component: Arc::new(inner),
                    dynamic: false,
                }),
                AttributeBinding::ToOne(ToOneAttributeBinding::new(
                    "city",
                    "a.City",
                    vec!["CITY_ID".to_string()],
                )),
            ],
        };

        assert_eq!(outer.column_names(), vec!["STREET", "ZIP", "CITY_ID"]);

        let embedded = AttributeBinding::Embedded(EmbeddedAttributeBinding {
            name: "address".to_string(),
            component: Arc::new(outer),
            dynamic: false,
        });
        let mut targets = Vec::new();
        embedded.for_each_to_one(&mut |to_one| targets.push(to_one.referenced_entity_name.clone()));
        assert_eq!(targets, vec!["a.City"]);
        assert!(!embedded.is_synthetic());
    }
}

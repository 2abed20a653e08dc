//! Class descriptors standing in for runtime reflection.
//!
//! Annotated classes are described explicitly: a [`ClassDescriptor`] carries the class name,
//! its superclass, the class-level annotations and one [`AttributeDescriptor`] per persistent
//! field. The [`ClassRegistry`] is the lookup table the binders consult where a reflective
//! implementation would load a class.
//!
//! # Examples
//!
//! ```rust
//! use ormbind::metadata::typesystem::{
//!     AttributeAnnotation, AttributeDescriptor, ClassAnnotation, ClassDescriptor, ClassRegistry,
//! };
//!
//! let registry = ClassRegistry::new();
//! registry.register(
//!     ClassDescriptor::new("org.acme.Order")
//!         .annotated(ClassAnnotation::Entity { name: None })
//!         .attribute(AttributeDescriptor::new("id", "long").annotated(AttributeAnnotation::Id)),
//! );
//!
//! let order = registry.get("org.acme.Order").unwrap();
//! assert!(order.is_entity());
//! assert_eq!(order.package(), Some("org.acme"));
//! ```

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::metadata::binding::{AccessType, FetchStyle};

/// A reference-counted class descriptor
pub type ClassDescriptorRc = Arc<ClassDescriptor>;

/// Name of the universal root class; superclass walks stop here.
pub const ROOT_CLASS_NAME: &str = "java.lang.Object";

/// JPA inheritance strategies as declared on a hierarchy root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum InheritanceType {
    /// All classes of the hierarchy share one table
    #[strum(serialize = "SINGLE_TABLE")]
    SingleTable,
    /// Each class has its own table joined by primary key
    #[strum(serialize = "JOINED")]
    Joined,
    /// Each concrete class has a complete table
    #[strum(serialize = "TABLE_PER_CLASS")]
    TablePerClass,
}

/// A single fetch of a fetch profile declared by annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOverride {
    /// Entity owning the association
    pub entity: String,
    /// Association name
    pub association: String,
    /// How the association is fetched when the profile is active
    pub style: FetchStyle,
}

/// Class-level annotations understood by the annotation binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassAnnotation {
    /// `@Entity`, optionally with an explicit JPA entity name
    Entity {
        /// JPA entity name, defaults to the unqualified class name
        name: Option<String>,
    },
    /// `@MappedSuperclass`
    MappedSuperclass,
    /// `@Embeddable`
    Embeddable,
    /// `@Table`
    Table {
        /// Table name
        name: Option<String>,
        /// Schema name
        schema: Option<String>,
        /// Catalog name
        catalog: Option<String>,
    },
    /// `@Subselect`, mapping the entity to a derived table
    Subselect(String),
    /// `@Inheritance`
    Inheritance(InheritanceType),
    /// `@DiscriminatorColumn`
    DiscriminatorColumn(String),
    /// `@DiscriminatorValue`
    DiscriminatorValue(String),
    /// `@IdClass`
    IdClass(String),
    /// `@Cacheable`
    Cacheable,
    /// `@Cache`
    Cache {
        /// Access strategy
        usage: AccessType,
        /// Region name, defaults to the entity name
        region: Option<String>,
    },
    /// `@Immutable`
    Immutable,
    /// `@Where`
    Where(String),
    /// `@FetchProfile`
    FetchProfile {
        /// Profile name
        name: String,
        /// Fetch overrides of the profile
        fetches: Vec<FetchOverride>,
    },
    /// `@NamedQuery`
    NamedQuery {
        /// Query name
        name: String,
        /// Query text
        query: String,
    },
    /// `@NamedNativeQuery`
    NamedNativeQuery {
        /// Query name
        name: String,
        /// SQL text
        query: String,
        /// Name of a result set mapping
        result_set_mapping: Option<String>,
        /// Entity returned by the query
        result_class: Option<String>,
    },
    /// `@SqlResultSetMapping`
    SqlResultSetMapping {
        /// Mapping name
        name: String,
        /// Returned entity classes
        entities: Vec<String>,
        /// Returned scalar columns
        columns: Vec<String>,
    },
    /// `@NamedEntityGraph`
    NamedEntityGraph {
        /// Graph name, defaults to the JPA entity name
        name: Option<String>,
        /// Attribute nodes of the graph
        attribute_nodes: Vec<String>,
    },
    /// `@FilterDef`
    FilterDef {
        /// Filter name
        name: String,
        /// Default condition
        default_condition: Option<String>,
        /// Parameter names and their type names
        parameters: Vec<(String, String)>,
    },
    /// `@Filter`
    Filter {
        /// Filter name
        name: String,
        /// Condition overriding the definition's default
        condition: Option<String>,
    },
    /// `@TypeDef`
    TypeDef {
        /// Definition name
        name: String,
        /// Implementing type
        type_class: String,
        /// Parameters
        parameters: Vec<(String, String)>,
    },
    /// `@GenericGenerator`
    GenericGenerator {
        /// Generator name
        name: String,
        /// Generation strategy
        strategy: String,
        /// Parameters
        parameters: Vec<(String, String)>,
    },
    /// `@SequenceGenerator`
    SequenceGenerator {
        /// Generator name
        name: String,
        /// Database sequence name
        sequence_name: String,
    },
}

/// `@Column` details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name, defaults to the naming strategy's choice
    pub name: Option<String>,
    /// Whether the column accepts null
    pub nullable: bool,
    /// Whether the column is unique
    pub unique: bool,
    /// Column length
    pub length: Option<u32>,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        ColumnSpec {
            name: None,
            nullable: true,
            unique: false,
            length: None,
        }
    }
}

/// Attribute-level annotations understood by the annotation binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeAnnotation {
    /// `@Id`
    Id,
    /// `@EmbeddedId`
    EmbeddedId,
    /// `@Embedded`
    Embedded,
    /// `@Version`
    Version,
    /// `@Transient`
    Transient,
    /// `@Column`
    Column(ColumnSpec),
    /// `@Type`, naming a basic type or type definition
    Type(String),
    /// `@GeneratedValue`, optionally naming a generator definition
    GeneratedValue {
        /// Generator name
        generator: Option<String>,
    },
    /// `@ManyToOne`
    ManyToOne {
        /// Target entity, defaults to the attribute type
        target: Option<String>,
        /// Whether the association is optional
        optional: bool,
    },
    /// `@OneToOne`
    OneToOne {
        /// Target entity, defaults to the attribute type
        target: Option<String>,
        /// Owning attribute on the other side
        mapped_by: Option<String>,
    },
    /// `@JoinColumn`
    JoinColumn {
        /// Column name
        name: String,
        /// Whether the column accepts null
        nullable: bool,
    },
    /// `@OneToMany`
    OneToMany {
        /// Target entity, defaults to the element type
        target: Option<String>,
        /// Owning attribute on the target entity
        mapped_by: Option<String>,
    },
    /// `@ManyToMany`
    ManyToMany {
        /// Target entity, defaults to the element type
        target: Option<String>,
        /// Owning attribute on the target entity
        mapped_by: Option<String>,
    },
    /// `@ElementCollection`
    ElementCollection,
    /// `@JoinTable`
    JoinTable {
        /// Table name
        name: String,
        /// Column referencing the owner
        join_column: Option<String>,
        /// Column referencing the target
        inverse_join_column: Option<String>,
    },
    /// `@CollectionTable`
    CollectionTable {
        /// Table name
        name: String,
        /// Column referencing the owner
        join_column: Option<String>,
    },
    /// `@OrderColumn`
    OrderColumn(String),
    /// `@MapKeyColumn`
    MapKeyColumn(String),
    /// `@OrderBy`
    OrderBy(String),
    /// `@Lazy(false)` style override of the association default
    Eager,
    /// `@Cache` on a collection
    Cache {
        /// Access strategy
        usage: AccessType,
        /// Region name, defaults to the collection role
        region: Option<String>,
    },
    /// `@Fetch(SUBSELECT)`
    SubselectFetch,
}

/// A persistent field of a described class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Attribute name
    pub name: String,
    /// Declared type, e.g. `long`, `java.lang.String`, `java.util.Set`, `org.acme.Address`
    pub java_type: String,
    /// Element type of a collection-valued attribute
    pub element_type: Option<String>,
    /// Attribute annotations
    pub annotations: Vec<AttributeAnnotation>,
}

impl AttributeDescriptor {
    /// Create a new attribute descriptor
    ///
    /// ## Arguments
    /// * 'name'        - The attribute name
    /// * 'java_type'   - The declared type
    pub fn new(name: impl Into<String>, java_type: impl Into<String>) -> Self {
        AttributeDescriptor {
            name: name.into(),
            java_type: java_type.into(),
            element_type: None,
            annotations: Vec::new(),
        }
    }

    /// Set the element type of a collection-valued attribute
    #[must_use]
    pub fn of(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    /// Add an annotation
    #[must_use]
    pub fn annotated(mut self, annotation: AttributeAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Returns true if the attribute carries an annotation matching `predicate`
    pub fn has<F>(&self, predicate: F) -> bool
    where
        F: Fn(&AttributeAnnotation) -> bool,
    {
        self.annotations.iter().any(predicate)
    }

    /// Returns the first annotation mapped to `Some` by `select`
    pub fn find<'a, T, F>(&'a self, select: F) -> Option<T>
    where
        F: Fn(&'a AttributeAnnotation) -> Option<T>,
    {
        self.annotations.iter().find_map(select)
    }

    /// `@Id` or `@EmbeddedId`
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.has(|a| matches!(a, AttributeAnnotation::Id | AttributeAnnotation::EmbeddedId))
    }

    /// `@Transient`
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.has(|a| matches!(a, AttributeAnnotation::Transient))
    }

    /// Explicit column name from `@Column`
    #[must_use]
    pub fn column(&self) -> Option<&ColumnSpec> {
        self.find(|a| match a {
            AttributeAnnotation::Column(spec) => Some(spec),
            _ => None,
        })
    }
}

/// Explicit description of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    /// Fully qualified class name
    pub name: String,
    /// Fully qualified superclass name, `None` for the root class
    pub superclass: Option<String>,
    /// Class-level annotations
    pub annotations: Vec<ClassAnnotation>,
    /// Persistent attributes in declaration order
    pub attributes: Vec<AttributeDescriptor>,
}

impl ClassDescriptor {
    /// Create a descriptor for a class directly extending the root class
    pub fn new(name: impl Into<String>) -> Self {
        ClassDescriptor {
            name: name.into(),
            superclass: None,
            annotations: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Set the superclass
    #[must_use]
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add a class-level annotation
    #[must_use]
    pub fn annotated(mut self, annotation: ClassAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Add a persistent attribute
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Returns the first annotation mapped to `Some` by `select`
    pub fn find<'a, T, F>(&'a self, select: F) -> Option<T>
    where
        F: Fn(&'a ClassAnnotation) -> Option<T>,
    {
        self.annotations.iter().find_map(select)
    }

    /// `@Entity`
    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| matches!(a, ClassAnnotation::Entity { .. }))
    }

    /// `@MappedSuperclass`
    #[must_use]
    pub fn is_mapped_superclass(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| matches!(a, ClassAnnotation::MappedSuperclass))
    }

    /// `@Embeddable`
    #[must_use]
    pub fn is_embeddable(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| matches!(a, ClassAnnotation::Embeddable))
    }

    /// The JPA entity name: the explicit `@Entity(name)` or the unqualified class name
    #[must_use]
    pub fn jpa_entity_name(&self) -> &str {
        self.find(|a| match a {
            ClassAnnotation::Entity { name: Some(name) } => Some(name.as_str()),
            _ => None,
        })
        .unwrap_or_else(|| unqualify(&self.name))
    }

    /// The package part of the class name
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.name.rfind('.').map(|pos| &self.name[..pos])
    }

    /// Find a declared attribute by name
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

/// Strip the package from a qualified name.
#[must_use]
pub fn unqualify(name: &str) -> &str {
    name.rfind('.').map_or(name, |pos| &name[pos + 1..])
}

/// Lookup table of every class known to a binding run.
///
/// Keyed by fully qualified class name. Registration is last-write-wins.
#[derive(Default)]
pub struct ClassRegistry {
    classes: SkipMap<String, ClassDescriptorRc>,
}

impl ClassRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class descriptor
    pub fn register(&self, descriptor: ClassDescriptor) -> ClassDescriptorRc {
        let descriptor = Arc::new(descriptor);
        self.classes
            .insert(descriptor.name.clone(), descriptor.clone());
        descriptor
    }

    /// Look up a class by fully qualified name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ClassDescriptorRc> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    /// Returns true if the class is known
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Returns the superclass descriptor of `descriptor`, if registered
    #[must_use]
    pub fn superclass_of(&self, descriptor: &ClassDescriptor) -> Option<ClassDescriptorRc> {
        descriptor
            .superclass
            .as_deref()
            .filter(|name| *name != ROOT_CLASS_NAME)
            .and_then(|name| self.get(name))
    }

    /// Number of registered classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no class is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpa_entity_name() {
        let plain = ClassDescriptor::new("org.acme.Order")
            .annotated(ClassAnnotation::Entity { name: None });
        assert_eq!(plain.jpa_entity_name(), "Order");

        let named = ClassDescriptor::new("org.acme.Order").annotated(ClassAnnotation::Entity {
            name: Some("PurchaseOrder".to_string()),
        });
        assert_eq!(named.jpa_entity_name(), "PurchaseOrder");
    }

    #[test]
    fn test_superclass_lookup_stops_at_root() {
        let registry = ClassRegistry::new();
        let base = registry.register(ClassDescriptor::new("a.Base").extends(ROOT_CLASS_NAME));
        let leaf = registry.register(ClassDescriptor::new("a.Leaf").extends("a.Base"));

        assert_eq!(registry.superclass_of(&leaf).unwrap().name, "a.Base");
        assert!(registry.superclass_of(&base).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_attribute_queries() {
        let attr = AttributeDescriptor::new("name", "java.lang.String").annotated(
            AttributeAnnotation::Column(ColumnSpec {
                name: Some("FULL_NAME".to_string()),
                ..Default::default()
            }),
        );
        assert!(!attr.is_id());
        assert_eq!(
            attr.column().and_then(|c| c.name.as_deref()),
            Some("FULL_NAME")
        );
        assert_eq!(unqualify("a.b.C"), "C");
        assert_eq!(unqualify("C"), "C");
    }
}

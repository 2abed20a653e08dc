use std::sync::Arc;

use crate::metadata::{
    binding::{AttributeBinding, EmbeddedAttributeBinding},
    typesystem::JavaType,
};

/// How identifier values are generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    /// Strategy name or implementing class, e.g. `native`, `sequence`, `assigned`
    pub strategy: String,
    /// Strategy parameters
    pub parameters: Vec<(String, String)>,
}

impl IdGenerator {
    /// A generator without parameters
    pub fn new(strategy: impl Into<String>) -> Self {
        IdGenerator {
            strategy: strategy.into(),
            parameters: Vec::new(),
        }
    }
}

/// The structural classification of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum IdentifierClassification {
    /// One basic attribute
    Simple,
    /// One embedded attribute of composite type
    CompositeAggregated,
    /// Several identifier attributes directly on the entity
    CompositeNonAggregated,
}

/// How an entity hierarchy's primary key is structured.
///
/// Set once when the root entity binds and shared by every entity of the hierarchy.
#[derive(Debug)]
pub enum IdentifierDescriptor {
    /// A single basic-typed attribute
    Simple {
        /// Identifier attribute, absent for an unnamed `<id>`
        attribute: Option<String>,
        /// Primary key columns
        columns: Vec<String>,
        /// Identifier type
        java_type: Arc<JavaType>,
        /// Value generation
        generator: Option<IdGenerator>,
        /// Value marking a transient instance
        unsaved_value: Option<String>,
    },
    /// A single embedded attribute whose component holds the key attributes
    CompositeAggregated {
        /// The embedded identifier attribute
        attribute: EmbeddedAttributeBinding,
    },
    /// Several key attributes declared directly on the entity
    CompositeNonAggregated {
        /// Key attributes
        attributes: Vec<AttributeBinding>,
        /// Class mirroring the key attributes, if any
        id_class: Option<String>,
    },
}

impl IdentifierDescriptor {
    /// The classification of this identifier
    #[must_use]
    pub fn classification(&self) -> IdentifierClassification {
        match self {
            IdentifierDescriptor::Simple { .. } => IdentifierClassification::Simple,
            IdentifierDescriptor::CompositeAggregated { .. } => {
                IdentifierClassification::CompositeAggregated
            }
            IdentifierDescriptor::CompositeNonAggregated { .. } => {
                IdentifierClassification::CompositeNonAggregated
            }
        }
    }

    /// Primary key columns in key order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        match self {
            IdentifierDescriptor::Simple { columns, .. } => columns.clone(),
            IdentifierDescriptor::CompositeAggregated { attribute } => {
                attribute.component.column_names()
            }
            IdentifierDescriptor::CompositeNonAggregated { attributes, .. } => attributes
                .iter()
                .flat_map(AttributeBinding::column_names)
                .collect(),
        }
    }

    /// Names of the identifier attributes on the entity
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        match self {
            IdentifierDescriptor::Simple { attribute, .. } => {
                attribute.iter().cloned().collect()
            }
            IdentifierDescriptor::CompositeAggregated { attribute } => {
                vec![attribute.name.clone()]
            }
            IdentifierDescriptor::CompositeNonAggregated { attributes, .. } => attributes
                .iter()
                .map(|attribute| attribute.name().to_string())
                .collect(),
        }
    }

    /// The value generator, only simple identifiers are generated
    #[must_use]
    pub fn generator(&self) -> Option<&IdGenerator> {
        match self {
            IdentifierDescriptor::Simple { generator, .. } => generator.as_ref(),
            IdentifierDescriptor::CompositeAggregated { .. }
            | IdentifierDescriptor::CompositeNonAggregated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        binding::{BasicAttributeBinding, EmbeddableDescriptor},
        typesystem::{BasicTypeKind, JavaTypeKind},
    };

    fn long_type() -> Arc<JavaType> {
        Arc::new(JavaType {
            name: "long".to_string(),
            kind: JavaTypeKind::Primitive(BasicTypeKind::Long),
        })
    }

    #[test]
    fn test_simple() {
        let id = IdentifierDescriptor::Simple {
            attribute: Some("id".to_string()),
            columns: vec!["ID".to_string()],
            java_type: long_type(),
            generator: Some(IdGenerator::new("native")),
            unsaved_value: None,
        };
        assert_eq!(id.classification(), IdentifierClassification::Simple);
        assert_eq!(id.column_names(), vec!["ID"]);
        assert_eq!(id.attribute_names(), vec!["id"]);
        assert_eq!(id.generator().unwrap().strategy, "native");
    }

    #[test]
    fn test_composite_variants() {
        let key_part = |name: &str, column: &str| {
            AttributeBinding::Basic(BasicAttributeBinding::new(
                name,
                long_type(),
                vec![column.to_string()],
            ))
        };

        let aggregated = IdentifierDescriptor::CompositeAggregated {
            attribute: EmbeddedAttributeBinding {
                name: "id".to_string(),
                component: Arc::new(EmbeddableDescriptor {
                    class_name: Some("a.LineId".to_string()),
                    path: "id".to_string(),
                    parent_attribute: None,
                    attributes: vec![key_part("orderId", "ORDER_ID"), key_part("lineNo", "LINE_NO")],
                }),
                dynamic: false,
            },
        };
        assert_eq!(aggregated.column_names(), vec!["ORDER_ID", "LINE_NO"]);
        assert_eq!(aggregated.attribute_names(), vec!["id"]);
        assert!(aggregated.generator().is_none());

        let non_aggregated = IdentifierDescriptor::CompositeNonAggregated {
            attributes: vec![key_part("orderId", "ORDER_ID"), key_part("lineNo", "LINE_NO")],
            id_class: Some("a.LineId".to_string()),
        };
        assert_eq!(
            non_aggregated.classification(),
            IdentifierClassification::CompositeNonAggregated
        );
        assert_eq!(non_aggregated.attribute_names(), vec!["orderId", "lineNo"]);
    }
}

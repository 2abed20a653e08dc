use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    metadata::{
        binding::{Caching, IdentifierDescriptor},
        typesystem::JavaType,
    },
    Result,
};

/// How the entities of one hierarchy are laid out in tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum InheritanceStrategy {
    /// No subclasses
    #[strum(serialize = "NONE")]
    None,
    /// One table with a discriminator column
    #[strum(serialize = "DISCRIMINATOR")]
    Discriminator,
    /// One table per class joined by primary key
    #[strum(serialize = "JOINED")]
    Joined,
    /// One complete table per concrete class
    #[strum(serialize = "UNION")]
    Union,
}

/// The discriminator of a single-table hierarchy.
#[derive(Debug, Clone)]
pub struct DiscriminatorDescriptor {
    /// Discriminator column, absent for a formula
    pub column: Option<String>,
    /// SQL formula computing the discriminator
    pub formula: Option<String>,
    /// Discriminator type
    pub java_type: Arc<JavaType>,
    /// Whether queries always restrict by discriminator
    pub forced: bool,
    /// Whether the discriminator is written on insert
    pub insertable: bool,
}

/// The version attribute of a hierarchy.
#[derive(Debug, Clone)]
pub struct VersionDescriptor {
    /// Attribute name
    pub attribute: String,
    /// Version column
    pub columns: Vec<String>,
    /// Version type
    pub java_type: Arc<JavaType>,
    /// Whether this is a `<timestamp>`
    pub timestamp: bool,
    /// Value marking a transient instance
    pub unsaved_value: Option<String>,
}

/// One inheritance tree: its root, strategy, identifier and version.
///
/// The identifier is set when the root binds and is shared read-only by all subclasses. The
/// strategy is refined while subclasses are discovered, and caching can be replaced by
/// external cache region definitions during the second pass.
#[derive(Debug)]
pub struct EntityHierarchy {
    /// Entity name of the root
    pub root_entity_name: String,
    /// The identifier of every entity in the hierarchy
    pub identifier: IdentifierDescriptor,
    /// Optional version attribute
    pub version: Option<VersionDescriptor>,
    /// Optional discriminator
    pub discriminator: Option<DiscriminatorDescriptor>,
    /// Whether entities of the hierarchy are mutable
    pub mutable: bool,
    /// Whether implicit polymorphic queries skip this hierarchy
    pub explicit_polymorphism: bool,
    strategy: RwLock<InheritanceStrategy>,
    caching: RwLock<Option<Caching>>,
}

impl EntityHierarchy {
    /// Create a hierarchy
    pub fn new(
        root_entity_name: impl Into<String>,
        strategy: InheritanceStrategy,
        identifier: IdentifierDescriptor,
    ) -> Self {
        EntityHierarchy {
            root_entity_name: root_entity_name.into(),
            identifier,
            version: None,
            discriminator: None,
            mutable: true,
            explicit_polymorphism: false,
            strategy: RwLock::new(strategy),
            caching: RwLock::new(None),
        }
    }

    /// The current inheritance strategy
    #[must_use]
    pub fn strategy(&self) -> InheritanceStrategy {
        *self.strategy.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the strategy implied by a newly discovered subclass
    ///
    /// A hierarchy without subclasses adopts the subclass strategy; a hierarchy that already
    /// has one must match it.
    ///
    /// # Errors
    /// Returns a mapping error if the subclass uses a different strategy than its siblings.
    pub fn promote_strategy(&self, strategy: InheritanceStrategy) -> Result<()> {
        let mut current = self.strategy.write().unwrap_or_else(PoisonError::into_inner);
        match *current {
            InheritanceStrategy::None => {
                *current = strategy;
                Ok(())
            }
            existing if existing == strategy => Ok(()),
            existing => Err(mapping_error!(
                "Hierarchy rooted at {} uses {} inheritance, cannot add a {} subclass",
                self.root_entity_name,
                existing,
                strategy
            )),
        }
    }

    /// Cache settings of the hierarchy
    #[must_use]
    pub fn caching(&self) -> Option<Caching> {
        self.caching
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the cache settings
    pub fn set_caching(&self, caching: Option<Caching>) {
        *self.caching.write().unwrap_or_else(PoisonError::into_inner) = caching;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        binding::AccessType,
        typesystem::{BasicTypeKind, JavaTypeKind},
    };

    fn hierarchy(strategy: InheritanceStrategy) -> EntityHierarchy {
        EntityHierarchy::new(
            "a.Animal",
            strategy,
            IdentifierDescriptor::Simple {
                attribute: Some("id".to_string()),
                columns: vec!["ID".to_string()],
                java_type: Arc::new(JavaType {
                    name: "long".to_string(),
                    kind: JavaTypeKind::Primitive(BasicTypeKind::Long),
                }),
                generator: None,
                unsaved_value: None,
            },
        )
    }

    #[test]
    fn test_strategy_promotion() {
        let h = hierarchy(InheritanceStrategy::None);
        h.promote_strategy(InheritanceStrategy::Joined).unwrap();
        h.promote_strategy(InheritanceStrategy::Joined).unwrap();
        assert_eq!(h.strategy(), InheritanceStrategy::Joined);

        let err = h.promote_strategy(InheritanceStrategy::Union).unwrap_err();
        assert!(err.to_string().contains("JOINED"));
        assert_eq!(h.strategy(), InheritanceStrategy::Joined);
    }

    #[test]
    fn test_caching_replacement() {
        let h = hierarchy(InheritanceStrategy::None);
        assert!(h.caching().is_none());
        h.set_caching(Some(Caching::new("animals", AccessType::ReadOnly)));
        assert_eq!(h.caching().unwrap().region, "animals");
    }
}

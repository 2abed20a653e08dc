//! The bound domain model: entities, hierarchies, identifiers, attributes and collections.
//!
//! Everything in this module is produced by the source processors and registered with the
//! metadata collector. Bindings are built in two phases. The first phase constructs each
//! binding from what its own mapping states. The second phase (`finish_initialization`)
//! resolves references between entities once every entity exists, so the cyclic entity graph
//! never has to be built in one step.
//!
//! # Key Components
//!
//! - [`EntityBinding`] / [`EntityBindingRef`]: one bound entity and a weak link to it
//! - [`EntityHierarchy`]: root, [`InheritanceStrategy`], identifier, version and discriminator
//! - [`IdentifierDescriptor`]: simple, composite aggregated or composite non-aggregated keys
//! - [`AttributeBinding`]: basic, embedded, to-one, plural and synthetic back reference
//! - [`PluralAttributeBinding`]: a collection with its element, index and id descriptors
//! - [`Caching`] / [`CacheRegionDefinition`]: second-level cache settings
//! - [`FetchProfile`], [`NamedQueryDefinition`], [`ResultSetMappingDefinition`] and the other
//!   named definitions kept by the metadata

mod attribute;
mod caching;
mod definitions;
mod entity;
mod hierarchy;
mod identifier;
mod plural;

pub use attribute::{
    AttributeBinding, BackRefAttributeBinding, BasicAttributeBinding, EmbeddableDescriptor,
    EmbeddedAttributeBinding, ToOneAttributeBinding, ToOneKind,
};
pub use caching::{AccessType, CacheRegionDefinition, CacheRegionType, Caching};
pub use definitions::{
    EntityReturn, Fetch, FetchProfile, FetchStyle, FilterDefinition, IdGeneratorDefinition,
    NamedEntityGraphDefinition, NamedNativeQueryDefinition, NamedQueryDefinition,
    ResultSetMappingDefinition, ScalarReturn, TypeDefinition,
};
pub use entity::{
    EntityBinding, EntityBindingRc, EntityBindingRef, FilterApplication, SecondaryTable,
};
pub use hierarchy::{
    DiscriminatorDescriptor, EntityHierarchy, InheritanceStrategy, VersionDescriptor,
};
pub use identifier::{IdGenerator, IdentifierClassification, IdentifierDescriptor};
pub use plural::{
    ElementClassification, ElementDescriptor, IdDescriptor, IndexDescriptor,
    PluralAttributeBinding, PluralAttributeBindingRc, PluralAttributeKey, PluralAttributeNature,
};

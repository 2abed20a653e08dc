//! # ormbind Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the ormbind library. Import this module to get quick access to the essential
//! types for binding mapping sources and reading the bound model.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ormbind operations
pub use crate::Error;

/// The result type used throughout ormbind
pub use crate::Result;

/// Options shaping a binding run
pub use crate::metadata::config::{MetadataOptions, MetadataSourceProcessingOrder};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Collects mapping sources and builds the metadata
pub use crate::metadata::MetadataSources;

/// The finished metadata and its lookup interface
pub use crate::metadata::{Metadata, MetadataImplementor};

// ================================================================================================
// Mapping Sources
// ================================================================================================

/// Parsed `hbm.xml` documents and where they came from
pub use crate::metadata::source::{HbmDocument, MetadataSourceType, Origin, OriginType};

/// Annotated class descriptors
pub use crate::metadata::typesystem::{
    AttributeAnnotation, AttributeDescriptor, ClassAnnotation, ClassDescriptor, ClassRegistry,
    ColumnSpec, InheritanceType,
};

/// Logical to physical naming
pub use crate::metadata::naming::{DefaultNamingStrategy, ImprovedNamingStrategy, NamingStrategy};

// ================================================================================================
// Bound Model
// ================================================================================================

/// Entities and their hierarchies
pub use crate::metadata::binding::{
    AttributeBinding, EntityBinding, EntityBindingRc, EntityHierarchy, IdentifierDescriptor,
    InheritanceStrategy,
};

/// Collections
pub use crate::metadata::binding::{
    ElementClassification, PluralAttributeBinding, PluralAttributeBindingRc,
    PluralAttributeNature,
};

/// Caching and named definitions
pub use crate::metadata::binding::{
    AccessType, CacheRegionDefinition, Caching, FetchProfile, NamedNativeQueryDefinition,
    NamedQueryDefinition,
};

/// Meta attributes
pub use crate::metadata::meta::{MetaAttribute, MetaAttributeContext};

/// The physical model
pub use crate::metadata::relational::{Column, Database, Table, TableReference};

// ================================================================================================
// Persisters
// ================================================================================================

/// Runtime views of entities and collections
pub use crate::metadata::persister::{CollectionPersister, EntityPersister, PersisterRegistry};

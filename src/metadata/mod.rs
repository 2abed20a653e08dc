//! Mapping metadata: sources, the binding pipeline and the bound model.
//!
//! Mapping sources (`hbm.xml` documents and annotated class descriptors) are collected by
//! [`MetadataSources`] and bound in ordered phases into a [`MetadataCollector`]. Once every
//! phase has run, the collector is frozen into an immutable [`Metadata`] that any number of
//! threads may read.
//!
//! # Key Components
//!
//! - [`builder`] - The entry point running the pipeline
//! - [`source`] - Parsed `hbm.xml` documents and their origins
//! - [`typesystem`] - Class descriptors, annotations and type resolution
//! - [`queue`] - Source ordering, including documents deferred on `extends`
//! - [`processor`] - The `hbm.xml` and annotation binders and the phase graph
//! - [`binding`] - Entities, hierarchies, identifiers, attributes and collections
//! - [`relational`] - Tables, columns and derived tables
//! - [`persister`] - Runtime views built from finished metadata
//!
//! # Examples
//!
//! ```rust,no_run
//! use ormbind::metadata::{MetadataImplementor, MetadataSources};
//!
//! let mut sources = MetadataSources::new();
//! sources.add_file("mappings/Order.hbm.xml".as_ref())?;
//! let metadata = sources.build_metadata()?;
//!
//! for entity in metadata.entity_bindings() {
//!     println!("{} -> {}", entity.entity_name, entity.primary_table);
//! }
//! # Ok::<(), ormbind::Error>(())
//! ```

/// The bound domain model
pub mod binding;
/// Entry point collecting sources and running the pipeline
pub mod builder;
/// Registries filled while binding
pub mod collector;
/// Options of a binding run
pub mod config;
/// Per-scope view of defaults, naming and the collector
pub mod context;
/// Layered mapping defaults
pub mod defaults;
/// Meta attributes of mapping elements
pub mod meta;
/// The finished metadata and its lookup interface
pub mod model;
/// Logical to physical naming
pub mod naming;
/// Entity and collection persisters
pub mod persister;
/// Source binders and binding phases
pub mod processor;
/// Source ordering and the extends queue
pub mod queue;
/// The physical relational model
pub mod relational;
/// Raw mapping sources
pub mod source;
/// Class descriptors and type resolution
pub mod typesystem;

pub use builder::MetadataSources;
pub use collector::MetadataCollector;
pub use context::BindingContext;
pub use model::{Metadata, MetadataImplementor};

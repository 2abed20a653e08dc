//! Binders turning mapping sources into bindings.
//!
//! Each kind of mapping source has a [`MetadataSourceProcessor`]. Binding runs in phases that
//! are ordered by a [`PhaseGraph`]; every processor contributes to the phases that concern
//! its sources:
//!
//! 1. **Independent**: type definitions and identifier generators
//! 2. **Type dependent**: filter definitions, whose parameters reference types
//! 3. **Mapping**: entities, collections, imports, fetch profiles declared on classes
//! 4. **Extends resolution**: documents deferred on an `extends` target
//! 5. **Mapping dependent**: named queries, result sets, entity graphs, back references
//! 6. **Second pass**: cache regions, cross-entity references, table numbering
//!
//! # Key Components
//!
//! - [`HbmMetadataSourceProcessor`]: binds `hbm.xml` documents
//! - [`AnnotationMetadataSourceProcessor`]: binds annotated class descriptors

mod annotation;
mod backref;
mod graph;
mod hbm;

pub use annotation::AnnotationMetadataSourceProcessor;
pub(crate) use backref::bind_back_references;
pub use graph::{BindingPhase, PhaseGraph};
pub use hbm::HbmMetadataSourceProcessor;

use crate::{
    metadata::{
        context::BindingContext,
        relational::{Column, TableReference},
        source::MetadataSourceType,
    },
    Result,
};

/// What happened when a source was asked to bind its mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingOutcome {
    /// Everything the source declares is bound
    Bound,
    /// Nothing was bound; the source waits for these `extends` targets
    Deferred(Vec<String>),
}

/// The binder for one kind of mapping source.
///
/// Each method handles one binding phase for one source. The pipeline calls a phase for
/// every source before it moves on to the next phase.
pub trait MetadataSourceProcessor {
    /// The source handled by this processor
    type Source: ?Sized;

    /// Kind of source handled
    fn source_type(&self) -> MetadataSourceType;

    /// Register definitions that depend on nothing else
    ///
    /// # Errors
    /// Returns a mapping error for malformed definitions.
    fn process_independent_metadata(&self, source: &Self::Source) -> Result<()>;

    /// Register definitions that depend on types
    ///
    /// # Errors
    /// Returns a mapping error for malformed definitions.
    fn process_type_dependent_metadata(&self, source: &Self::Source) -> Result<()>;

    /// Bind entities and collections
    ///
    /// # Errors
    /// Returns a mapping error, or a duplicate mapping error for an entity or role that is
    /// already bound.
    fn process_mapping_metadata(&self, source: &Self::Source) -> Result<MappingOutcome>;

    /// Register definitions that refer to bound entities
    ///
    /// # Errors
    /// Returns a mapping error for malformed definitions.
    fn process_mapping_dependent_metadata(&self, source: &Self::Source) -> Result<()>;
}

/// Add a column to `table` and return its normalized name
fn add_column(
    ctx: &BindingContext<'_>,
    table: &TableReference,
    name: &str,
    nullable: bool,
    unique: bool,
) -> String {
    let identifier = ctx.to_identifier(name);
    let text = identifier.text().to_string();
    table.locate_or_create_column(Column::new(identifier).nullable(nullable).unique(unique));
    text
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

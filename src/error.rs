use thiserror::Error;

use crate::metadata::source::OriginType;

macro_rules! mapping_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Mapping {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Mapping {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The kind of registration that collided in a [`Error::DuplicateMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DuplicateMappingKind {
    /// Two entity bindings share an entity name
    #[strum(serialize = "entity")]
    Entity,
    /// Two plural attributes share a collection role
    #[strum(serialize = "collection")]
    Collection,
    /// Two tables share a qualified name where uniqueness is required
    #[strum(serialize = "table")]
    Table,
    /// An attribute name is declared twice on the same container
    #[strum(serialize = "property")]
    Property,
    /// Two named entity graphs share a name
    #[strum(serialize = "named entity graph")]
    NamedEntityGraph,
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure of the binding pipeline is fatal: the pipeline aborts and no partially bound
/// [`crate::metadata::Metadata`] is ever handed out.
///
/// # Error Categories
///
/// ## Binding Errors
/// - [`Error::DuplicateMapping`] - Entity name or collection role registered twice
/// - [`Error::UnresolvedExtends`] - `extends` references that never resolved
/// - [`Error::InvalidMapping`] - A mapping failure raised while binding one document
/// - [`Error::Mapping`] - Generic mapping failure with source location
///
/// ## Resolution Errors
/// - [`Error::ClassNotFound`] - A referenced class is unknown to the class registry
/// - [`Error::NotInitialized`] - A persister was navigated before its second phase ran
/// - [`Error::RecursionLimit`] - A superclass chain exceeded the configured depth
///
/// ## Input Errors
/// - [`Error::Xml`] - The mapping document is not well-formed XML
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Configuration`] - An unparsable configuration property
///
/// # Examples
///
/// ```rust
/// use ormbind::{Error, MetadataSources};
///
/// let mut sources = MetadataSources::new();
/// sources.add_hbm_xml_str(
///     r#"<hibernate-mapping><subclass name="a.Child" extends="a.Missing"/></hibernate-mapping>"#,
///     "child.hbm.xml",
/// )?;
///
/// match sources.build_metadata() {
///     Err(Error::UnresolvedExtends(message)) => assert!(message.contains("a.Missing")),
///     other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
/// }
/// # Ok::<(), ormbind::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An entity name or collection role was registered twice.
    ///
    /// Raised immediately at registration time. The first registration stays in place.
    #[error("Duplicate {kind} mapping {name}")]
    DuplicateMapping {
        /// What kind of registration collided
        kind: DuplicateMappingKind,
        /// The colliding name or role
        name: String,
    },

    /// One or more `extends` superclass references never resolved.
    ///
    /// Raised once, after the extends fixpoint has been exhausted. The message enumerates
    /// every unresolved superclass name (qualified by its mapping package if present).
    #[error("{0}")]
    UnresolvedExtends(String),

    /// A mapping failure raised while binding a specific mapping document.
    ///
    /// Wraps the lower-level failure with the origin of the document.
    #[error("Could not parse mapping document from {origin_type} {origin_name}: {source}")]
    InvalidMapping {
        /// How the document was supplied
        origin_type: OriginType,
        /// Name of the document (file path, resource name, ...)
        origin_name: String,
        /// The underlying failure
        source: Box<Error>,
    },

    /// A referenced class could not be located.
    #[error("Unable to locate class [{0}]")]
    ClassNotFound(String),

    /// Generic mapping failure.
    ///
    /// Carries the source location where the failure was detected, like the other
    /// macro-built errors of this crate.
    #[error("Mapping - {file}:{line}: {message}")]
    Mapping {
        /// The message to be printed for the Mapping error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A persister navigation method was called before `finish_initialization`.
    #[error("Persister [{0}] has not been initialized")]
    NotInitialized(String),

    /// The mapping document is not well-formed XML.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Binding phase graph error.
    ///
    /// Raised when a phase depends on a phase that is not registered, or when the phase
    /// dependencies form a cycle.
    #[error("{0}")]
    GraphError(String),

    /// Recursion limit reached.
    ///
    /// A superclass chain exceeded the configured maximum depth, which only happens when
    /// class descriptors form a cycle.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// An unparsable configuration property.
    #[error("Invalid configuration - {0}")]
    Configuration(String),
}

impl Error {
    /// Returns `true` when this error, or the error wrapped by an [`Error::InvalidMapping`],
    /// is a [`Error::DuplicateMapping`].
    #[must_use]
    pub fn is_duplicate_mapping(&self) -> bool {
        match self {
            Error::DuplicateMapping { .. } => true,
            Error::InvalidMapping { source, .. } => source.is_duplicate_mapping(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_macro() {
        let err = mapping_error!("Unable to determine entity name");
        match err {
            Error::Mapping { message, file, .. } => {
                assert_eq!(message, "Unable to determine entity name");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("wrong variant"),
        }

        let err = mapping_error!("Cannot extend unmapped class {}", "Base");
        assert!(err.to_string().contains("Cannot extend unmapped class Base"));
    }

    #[test]
    fn test_duplicate_mapping_display() {
        let err = Error::DuplicateMapping {
            kind: DuplicateMappingKind::Collection,
            name: "p.Order.lines".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate collection mapping p.Order.lines");
        assert!(err.is_duplicate_mapping());
    }

    #[test]
    fn test_invalid_mapping_wraps_duplicate() {
        let err = Error::InvalidMapping {
            origin_type: OriginType::File,
            origin_name: "order.hbm.xml".to_string(),
            source: Box::new(Error::DuplicateMapping {
                kind: DuplicateMappingKind::Entity,
                name: "p.Order".to_string(),
            }),
        };
        assert!(err.is_duplicate_mapping());
        let text = err.to_string();
        assert!(text.contains("file"));
        assert!(text.contains("order.hbm.xml"));
    }
}

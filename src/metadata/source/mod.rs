//! Raw mapping sources consumed by the binding pipeline.
//!
//! Two kinds of mapping input exist:
//!
//! - [`HbmDocument`]: a legacy `hbm.xml` mapping document, parsed into an element tree
//! - annotated classes: [`crate::metadata::typesystem::ClassDescriptor`] entries of the class
//!   registry that carry an `Entity` or `MappedSuperclass` annotation
//!
//! Sources own nothing after binding completes; they are consumed by the
//! [`crate::metadata::queue::MetadataSourceQueue`] and discarded.

mod hbm;

pub use hbm::{HbmDocument, XmlElement};
pub(crate) use hbm::{entity_name_of, qualify_class_name, ENTITY_ELEMENTS, SUBCLASS_ELEMENTS};

use std::sync::Arc;

use crate::metadata::typesystem::ClassDescriptor;

/// How a mapping document was supplied, reported in [`crate::Error::InvalidMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum OriginType {
    /// Read from a file on disk
    #[strum(serialize = "file")]
    File,
    /// Supplied as an in-memory string
    #[strum(serialize = "string")]
    String,
    /// Supplied under a resource name
    #[strum(serialize = "resource")]
    Resource,
    /// Produced programmatically
    #[strum(serialize = "other")]
    Other,
}

/// Where a mapping document came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// How the document was supplied
    pub origin_type: OriginType,
    /// The file path, resource name or caller-provided label
    pub name: String,
}

impl Origin {
    /// Create a new origin
    pub fn new(origin_type: OriginType, name: impl Into<String>) -> Self {
        Origin {
            origin_type,
            name: name.into(),
        }
    }
}

/// Which kind of mapping source a processor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum MetadataSourceType {
    /// `hbm.xml` documents
    #[strum(serialize = "hbm")]
    Hbm,
    /// Annotated class descriptors
    #[strum(serialize = "class")]
    Class,
}

/// A single raw mapping input.
#[derive(Debug, Clone)]
pub enum MappingSource {
    /// A parsed `hbm.xml` document
    XmlDocument(Arc<HbmDocument>),
    /// An annotated class
    AnnotatedClass(Arc<ClassDescriptor>),
}

impl MappingSource {
    /// The kind of this source
    #[must_use]
    pub fn source_type(&self) -> MetadataSourceType {
        match self {
            MappingSource::XmlDocument(_) => MetadataSourceType::Hbm,
            MappingSource::AnnotatedClass(_) => MetadataSourceType::Class,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_source_type_parse() {
        assert_eq!(
            MetadataSourceType::from_str("hbm").unwrap(),
            MetadataSourceType::Hbm
        );
        assert_eq!(
            MetadataSourceType::from_str("CLASS").unwrap(),
            MetadataSourceType::Class
        );
        assert!(MetadataSourceType::from_str("xml").is_err());
    }

    #[test]
    fn test_origin_display() {
        let origin = Origin::new(OriginType::Resource, "org/acme/Order.hbm.xml");
        assert_eq!(origin.origin_type.to_string(), "resource");
        assert_eq!(origin.name, "org/acme/Order.hbm.xml");
    }
}

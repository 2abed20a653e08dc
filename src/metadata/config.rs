//! Configuration for a metadata binding run
//!
//! This module provides the options that shape a binding run: global schema and catalog
//! defaults, which kind of mapping source is processed first, cache defaults and identifier
//! quoting.

use std::{collections::HashMap, str::FromStr};

use crate::{
    metadata::{binding::AccessType, source::MetadataSourceType},
    Error::Configuration,
    Result,
};

/// Property naming the default schema
pub const DEFAULT_SCHEMA: &str = "hibernate.default_schema";
/// Property naming the default catalog
pub const DEFAULT_CATALOG: &str = "hibernate.default_catalog";
/// Property listing source kinds in processing order, e.g. `hbm, class`
pub const MAPPING_PRECEDENCE: &str = "hibernate.mapping.precedence";
/// Property naming the default cache concurrency strategy
pub const DEFAULT_CACHE_CONCURRENCY_STRATEGY: &str =
    "hibernate.cache.default_cache_concurrency_strategy";
/// Property switching on quoting of every identifier
pub const GLOBALLY_QUOTED_IDENTIFIERS: &str = "hibernate.globally_quoted_identifiers";

/// Which kind of mapping source binds first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataSourceProcessingOrder {
    /// `hbm.xml` documents before annotated classes
    #[default]
    HbmFirst,
    /// Annotated classes before `hbm.xml` documents
    AnnotationsFirst,
}

impl MetadataSourceProcessingOrder {
    /// The source kinds in processing order
    #[must_use]
    pub fn source_types(self) -> [MetadataSourceType; 2] {
        match self {
            MetadataSourceProcessingOrder::HbmFirst => {
                [MetadataSourceType::Hbm, MetadataSourceType::Class]
            }
            MetadataSourceProcessingOrder::AnnotationsFirst => {
                [MetadataSourceType::Class, MetadataSourceType::Hbm]
            }
        }
    }

    /// Parse a precedence list such as `"class, hbm"`
    ///
    /// Tokens may be separated by commas, semicolons or whitespace. The first token decides
    /// the order; an empty list keeps the default.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] for an unknown token.
    pub fn parse_precedence(text: &str) -> Result<Self> {
        let mut first = None;
        for token in text
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
        {
            let source_type = MetadataSourceType::from_str(token).map_err(|_| {
                Configuration(format!(
                    "Unknown metadata source type '{token}' in {MAPPING_PRECEDENCE}"
                ))
            })?;
            first.get_or_insert(source_type);
        }

        Ok(match first {
            Some(MetadataSourceType::Class) => MetadataSourceProcessingOrder::AnnotationsFirst,
            Some(MetadataSourceType::Hbm) | None => MetadataSourceProcessingOrder::HbmFirst,
        })
    }
}

/// Options for a metadata binding run
///
/// Options are global: per-document defaults (the `hbm.xml` root attributes) are layered on
/// top of them through [`crate::metadata::defaults::MappingDefaults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Schema used where a mapping names none
    pub default_schema: Option<String>,

    /// Catalog used where a mapping names none
    pub default_catalog: Option<String>,

    /// Which kind of mapping source binds first
    pub processing_order: MetadataSourceProcessingOrder,

    /// Cache strategy for `@Cacheable` classes that name none
    pub default_cache_access_type: Option<AccessType>,

    /// Quote every table and column name
    pub globally_quoted_identifiers: bool,

    /// Register unqualified entity names as imports unless a document disables it
    pub auto_import: bool,

    /// Maximum superclass chain length walked while ordering annotated classes (default: 64)
    pub max_hierarchy_depth: usize,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            default_schema: None,
            default_catalog: None,
            processing_order: MetadataSourceProcessingOrder::HbmFirst,
            default_cache_access_type: None,
            globally_quoted_identifiers: false,
            auto_import: true,
            max_hierarchy_depth: 64,
        }
    }
}

impl MetadataOptions {
    /// Options binding annotated classes before `hbm.xml` documents
    #[must_use]
    pub fn annotations_first() -> Self {
        Self {
            processing_order: MetadataSourceProcessingOrder::AnnotationsFirst,
            ..Self::default()
        }
    }

    /// Options quoting every identifier
    #[must_use]
    pub fn quoted() -> Self {
        Self {
            globally_quoted_identifiers: true,
            ..Self::default()
        }
    }

    /// Set the default schema
    #[must_use]
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Set the default catalog
    #[must_use]
    pub fn with_default_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.default_catalog = Some(catalog.into());
        self
    }

    /// Read options from configuration properties
    ///
    /// Unknown keys are ignored; missing keys keep their defaults.
    ///
    /// ## Arguments
    /// * 'properties' - Property map, e.g. loaded from `hibernate.properties`
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if a recognized property has a malformed value.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        let non_empty = |key: &str| {
            properties
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        options.default_schema = non_empty(DEFAULT_SCHEMA).map(str::to_string);
        options.default_catalog = non_empty(DEFAULT_CATALOG).map(str::to_string);

        if let Some(precedence) = non_empty(MAPPING_PRECEDENCE) {
            options.processing_order = MetadataSourceProcessingOrder::parse_precedence(precedence)?;
        }

        if let Some(strategy) = non_empty(DEFAULT_CACHE_CONCURRENCY_STRATEGY) {
            options.default_cache_access_type =
                Some(AccessType::from_str(strategy).map_err(|_| {
                    Configuration(format!(
                        "Unknown cache concurrency strategy '{strategy}' in {DEFAULT_CACHE_CONCURRENCY_STRATEGY}"
                    ))
                })?);
        }

        if let Some(quoted) = non_empty(GLOBALLY_QUOTED_IDENTIFIERS) {
            options.globally_quoted_identifiers = quoted.parse::<bool>().map_err(|_| {
                Configuration(format!(
                    "Expected true or false for {GLOBALLY_QUOTED_IDENTIFIERS}, found '{quoted}'"
                ))
            })?;
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_precedence_parsing() {
        assert_eq!(
            MetadataSourceProcessingOrder::parse_precedence("class, hbm").unwrap(),
            MetadataSourceProcessingOrder::AnnotationsFirst
        );
        assert_eq!(
            MetadataSourceProcessingOrder::parse_precedence("hbm;class").unwrap(),
            MetadataSourceProcessingOrder::HbmFirst
        );
        assert_eq!(
            MetadataSourceProcessingOrder::parse_precedence("  ").unwrap(),
            MetadataSourceProcessingOrder::HbmFirst
        );
        assert!(MetadataSourceProcessingOrder::parse_precedence("hbm orm").is_err());
    }

    #[test]
    fn test_from_properties() {
        let options = MetadataOptions::from_properties(&props(&[
            (DEFAULT_SCHEMA, "sales"),
            (MAPPING_PRECEDENCE, "class hbm"),
            (DEFAULT_CACHE_CONCURRENCY_STRATEGY, "read-write"),
            (GLOBALLY_QUOTED_IDENTIFIERS, "true"),
        ]))
        .unwrap();

        assert_eq!(options.default_schema.as_deref(), Some("sales"));
        assert_eq!(options.default_catalog, None);
        assert_eq!(
            options.processing_order,
            MetadataSourceProcessingOrder::AnnotationsFirst
        );
        assert_eq!(options.default_cache_access_type, Some(AccessType::ReadWrite));
        assert!(options.globally_quoted_identifiers);
    }

    #[test]
    fn test_malformed_properties() {
        assert!(MetadataOptions::from_properties(&props(&[(
            GLOBALLY_QUOTED_IDENTIFIERS,
            "yes"
        )]))
        .is_err());
        assert!(MetadataOptions::from_properties(&props(&[(
            DEFAULT_CACHE_CONCURRENCY_STRATEGY,
            "eventual"
        )]))
        .is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            MetadataOptions::annotations_first().processing_order.source_types(),
            [MetadataSourceType::Class, MetadataSourceType::Hbm]
        );
        assert!(MetadataOptions::quoted().globally_quoted_identifiers);
        assert!(MetadataOptions::default().auto_import);
    }
}

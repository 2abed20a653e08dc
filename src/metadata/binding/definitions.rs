//! Named definitions registered alongside entity and collection bindings.
//!
//! These are the registries the runtime layer looks up by name: fetch profiles, named HQL and
//! native queries, result set mappings, filter definitions, identifier generators and type
//! definitions. They are plain data; uniqueness rules are enforced by the
//! [`crate::metadata::MetadataCollector`] that registers them.

use std::sync::Arc;

use crate::metadata::{source::MetadataSourceType, typesystem::JavaType};

/// Fetch style of an association inside a fetch profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FetchStyle {
    /// Fetch with an outer join
    #[strum(serialize = "join")]
    Join,
    /// Fetch with a secondary select
    #[strum(serialize = "select")]
    Select,
    /// Fetch with a subselect over the owner query
    #[strum(serialize = "subselect")]
    Subselect,
}

/// One association fetch of a [`FetchProfile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    /// Entity owning the association
    pub entity: String,
    /// Association name
    pub association: String,
    /// Fetch style
    pub style: FetchStyle,
}

/// A named set of association fetch overrides.
///
/// Profiles are created once by name and shared; fetches are appended by whichever source
/// declares them.
#[derive(Debug)]
pub struct FetchProfile {
    /// Profile name
    pub name: String,
    /// The kind of source that first declared the profile
    pub source: MetadataSourceType,
    /// Declared fetches
    pub fetches: boxcar::Vec<Fetch>,
}

impl FetchProfile {
    /// Create an empty profile
    pub fn new(name: impl Into<String>, source: MetadataSourceType) -> Self {
        FetchProfile {
            name: name.into(),
            source,
            fetches: boxcar::Vec::new(),
        }
    }

    /// Append a fetch
    pub fn add_fetch(&self, entity: &str, association: &str, style: FetchStyle) {
        self.fetches.push(Fetch {
            entity: entity.to_string(),
            association: association.to_string(),
            style,
        });
    }

    /// Number of declared fetches
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.count()
    }
}

/// A named HQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQueryDefinition {
    /// Query name
    pub name: String,
    /// Query text
    pub query: String,
    /// Whether results are cacheable
    pub cacheable: bool,
    /// Query cache region
    pub cache_region: Option<String>,
    /// Whether loaded entities are read-only
    pub read_only: bool,
    /// Fetch size hint
    pub fetch_size: Option<u32>,
    /// Timeout in seconds
    pub timeout: Option<u32>,
    /// Comment added to generated SQL
    pub comment: Option<String>,
}

impl NamedQueryDefinition {
    /// Create a definition with default settings
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        NamedQueryDefinition {
            name: name.into(),
            query: query.into(),
            cacheable: false,
            cache_region: None,
            read_only: false,
            fetch_size: None,
            timeout: None,
            comment: None,
        }
    }
}

/// A named native SQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedNativeQueryDefinition {
    /// Query name
    pub name: String,
    /// SQL text
    pub query: String,
    /// Name of the result set mapping describing the returned columns
    pub result_set_ref: Option<String>,
    /// Tables whose modification invalidates cached results
    pub synchronized_tables: Vec<String>,
    /// Whether the query is a stored procedure call
    pub callable: bool,
}

/// An entity returned by a native query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReturn {
    /// SQL alias
    pub alias: String,
    /// Returned entity
    pub entity_name: String,
}

/// A scalar column returned by a native query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarReturn {
    /// Column alias
    pub column: String,
    /// Declared type name
    pub type_name: Option<String>,
}

/// Description of the rows a native query returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSetMappingDefinition {
    /// Mapping name
    pub name: String,
    /// Entity returns
    pub entity_returns: Vec<EntityReturn>,
    /// Scalar returns
    pub scalar_returns: Vec<ScalarReturn>,
}

/// A filter definition with typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    /// Filter name
    pub name: String,
    /// Condition used where the filter is applied without one
    pub default_condition: Option<String>,
    /// Parameter names and resolved types
    pub parameters: Vec<(String, Arc<JavaType>)>,
}

/// A reusable identifier generator definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGeneratorDefinition {
    /// Generator name
    pub name: String,
    /// Generation strategy, e.g. `sequence`, `native`, or an implementing class
    pub strategy: String,
    /// Strategy parameters
    pub parameters: Vec<(String, String)>,
}

/// A named, parameterized custom type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Definition name
    pub name: String,
    /// Implementing type
    pub type_implementor: String,
    /// Parameters
    pub parameters: Vec<(String, String)>,
}

/// A named entity graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntityGraphDefinition {
    /// Graph name
    pub name: String,
    /// Root entity of the graph
    pub entity_name: String,
    /// Attribute nodes
    pub attribute_nodes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_profile_appends() {
        let profile = FetchProfile::new("customer-with-orders", MetadataSourceType::Hbm);
        profile.add_fetch("p.Customer", "orders", FetchStyle::Join);
        profile.add_fetch("p.Order", "lines", FetchStyle::Subselect);

        assert_eq!(profile.fetch_count(), 2);
        let styles: Vec<_> = profile.fetches.iter().map(|(_, f)| f.style).collect();
        assert_eq!(styles, vec![FetchStyle::Join, FetchStyle::Subselect]);
    }
}

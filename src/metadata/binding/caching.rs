/// Second-level cache concurrency strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AccessType {
    /// Immutable data
    #[strum(to_string = "read-only", serialize = "read_only")]
    ReadOnly,
    /// Read-write with soft locks
    #[strum(to_string = "read-write", serialize = "read_write")]
    ReadWrite,
    /// Read-write without locking
    #[strum(
        to_string = "nonstrict-read-write",
        serialize = "nonstrict_read_write"
    )]
    NonStrictReadWrite,
    /// Fully transactional cache
    #[strum(to_string = "transactional")]
    Transactional,
}

/// Cache settings of an entity hierarchy or a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caching {
    /// Cache region name
    pub region: String,
    /// Concurrency strategy
    pub access_type: AccessType,
    /// Whether lazy properties are cached as well
    pub cache_lazy_properties: bool,
}

impl Caching {
    /// Create cache settings caching lazy properties
    pub fn new(region: impl Into<String>, access_type: AccessType) -> Self {
        Caching {
            region: region.into(),
            access_type,
            cache_lazy_properties: true,
        }
    }
}

/// What a [`CacheRegionDefinition`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CacheRegionType {
    /// An entity hierarchy, addressed by entity name
    #[strum(serialize = "entity")]
    Entity,
    /// A collection, addressed by collection role
    #[strum(serialize = "collection")]
    Collection,
}

/// Cache configuration supplied outside the mapping sources.
///
/// Applied after binding; the addressed entity or collection must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRegionDefinition {
    /// What the definition applies to
    pub region_type: CacheRegionType,
    /// Entity name or collection role
    pub role: String,
    /// Concurrency strategy
    pub usage: AccessType,
    /// Region name, defaults to the role
    pub region: Option<String>,
    /// Whether lazy properties are cached as well
    pub cache_lazy: bool,
}

impl CacheRegionDefinition {
    /// Define caching for an entity hierarchy
    pub fn entity(role: impl Into<String>, usage: AccessType) -> Self {
        CacheRegionDefinition {
            region_type: CacheRegionType::Entity,
            role: role.into(),
            usage,
            region: None,
            cache_lazy: true,
        }
    }

    /// Define caching for a collection
    pub fn collection(role: impl Into<String>, usage: AccessType) -> Self {
        CacheRegionDefinition {
            region_type: CacheRegionType::Collection,
            ..Self::entity(role, usage)
        }
    }

    /// Set an explicit region name
    #[must_use]
    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// The cache settings this definition produces
    #[must_use]
    pub fn to_caching(&self) -> Caching {
        Caching {
            region: self.region.clone().unwrap_or_else(|| self.role.clone()),
            access_type: self.usage,
            cache_lazy_properties: self.cache_lazy,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_access_type_parse() {
        assert_eq!(
            AccessType::from_str("read-write").unwrap(),
            AccessType::ReadWrite
        );
        assert_eq!(
            AccessType::from_str("NONSTRICT_READ_WRITE").unwrap(),
            AccessType::NonStrictReadWrite
        );
        assert_eq!(AccessType::ReadOnly.to_string(), "read-only");
        assert!(AccessType::from_str("write-behind").is_err());
    }

    #[test]
    fn test_region_defaults_to_role() {
        let def = CacheRegionDefinition::collection("p.Order.lines", AccessType::ReadOnly);
        assert_eq!(def.region_type, CacheRegionType::Collection);
        assert_eq!(def.to_caching().region, "p.Order.lines");

        let def = def.in_region("orders");
        assert_eq!(def.to_caching().region, "orders");
    }
}

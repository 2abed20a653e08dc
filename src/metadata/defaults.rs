//! Fallback values for mapping details a source leaves out.
//!
//! Defaults form a stack. [`GlobalMappingDefaults`] sits at the bottom and is derived from
//! [`MetadataOptions`]; each `hbm.xml` document pushes an [`OverriddenMappingDefaults`] layer
//! built from its root attributes. A layer answers from its own values and falls through to
//! the layer below for everything it does not set.

use std::sync::Arc;

use crate::metadata::{binding::AccessType, config::MetadataOptions};

/// Identifier column used when neither a column nor an attribute name is given
pub const DEFAULT_IDENTIFIER_COLUMN_NAME: &str = "id";
/// Discriminator column used when the mapping names none
pub const DEFAULT_DISCRIMINATOR_COLUMN_NAME: &str = "class";
/// Tenant discriminator column used when the mapping names none
pub const DEFAULT_TENANT_IDENTIFIER_COLUMN_NAME: &str = "tenant_id";
/// Cascade style used when the mapping names none
pub const DEFAULT_CASCADE: &str = "none";
/// Property access strategy used when the mapping names none
pub const DEFAULT_PROPERTY_ACCESS: &str = "property";

/// Read-only fallback values consulted by the binders.
pub trait MappingDefaults: Send + Sync {
    /// Package prepended to unqualified class names
    fn package_name(&self) -> Option<&str>;
    /// Schema for tables that name none
    fn schema_name(&self) -> Option<&str>;
    /// Catalog for tables that name none
    fn catalog_name(&self) -> Option<&str>;
    /// Identifier column name
    fn identifier_column_name(&self) -> &str;
    /// Discriminator column name
    fn discriminator_column_name(&self) -> &str;
    /// Tenant discriminator column name
    fn tenant_id_column_name(&self) -> &str;
    /// Cascade style of associations
    fn cascade_style(&self) -> &str;
    /// Property access strategy
    fn property_access_name(&self) -> &str;
    /// Whether associations are lazy
    fn are_associations_lazy(&self) -> bool;
    /// Whether unqualified entity names are imported
    fn is_auto_import(&self) -> bool;
    /// Cache strategy for cacheable classes that name none
    fn cache_access_type(&self) -> Option<AccessType>;
}

/// The bottom layer of the defaults stack.
#[derive(Debug, Clone)]
pub struct GlobalMappingDefaults {
    schema: Option<String>,
    catalog: Option<String>,
    auto_import: bool,
    cache_access_type: Option<AccessType>,
}

impl GlobalMappingDefaults {
    /// Derive the global defaults from the run options
    #[must_use]
    pub fn new(options: &MetadataOptions) -> Self {
        GlobalMappingDefaults {
            schema: options.default_schema.clone(),
            catalog: options.default_catalog.clone(),
            auto_import: options.auto_import,
            cache_access_type: options.default_cache_access_type,
        }
    }
}

impl MappingDefaults for GlobalMappingDefaults {
    fn package_name(&self) -> Option<&str> {
        None
    }

    fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn catalog_name(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    fn identifier_column_name(&self) -> &str {
        DEFAULT_IDENTIFIER_COLUMN_NAME
    }

    fn discriminator_column_name(&self) -> &str {
        DEFAULT_DISCRIMINATOR_COLUMN_NAME
    }

    fn tenant_id_column_name(&self) -> &str {
        DEFAULT_TENANT_IDENTIFIER_COLUMN_NAME
    }

    fn cascade_style(&self) -> &str {
        DEFAULT_CASCADE
    }

    fn property_access_name(&self) -> &str {
        DEFAULT_PROPERTY_ACCESS
    }

    fn are_associations_lazy(&self) -> bool {
        true
    }

    fn is_auto_import(&self) -> bool {
        self.auto_import
    }

    fn cache_access_type(&self) -> Option<AccessType> {
        self.cache_access_type
    }
}

/// A layer of the defaults stack overriding some values of the layer below.
pub struct OverriddenMappingDefaults {
    parent: Arc<dyn MappingDefaults>,
    /// Package override
    pub package_name: Option<String>,
    /// Schema override
    pub schema_name: Option<String>,
    /// Catalog override
    pub catalog_name: Option<String>,
    /// Cascade override
    pub cascade_style: Option<String>,
    /// Access strategy override
    pub property_access_name: Option<String>,
    /// Laziness override
    pub associations_lazy: Option<bool>,
    /// Auto-import override
    pub auto_import: Option<bool>,
}

impl OverriddenMappingDefaults {
    /// Create a layer that overrides nothing yet
    pub fn new(parent: Arc<dyn MappingDefaults>) -> Self {
        OverriddenMappingDefaults {
            parent,
            package_name: None,
            schema_name: None,
            catalog_name: None,
            cascade_style: None,
            property_access_name: None,
            associations_lazy: None,
            auto_import: None,
        }
    }
}

impl MappingDefaults for OverriddenMappingDefaults {
    fn package_name(&self) -> Option<&str> {
        self.package_name
            .as_deref()
            .or_else(|| self.parent.package_name())
    }

    fn schema_name(&self) -> Option<&str> {
        self.schema_name
            .as_deref()
            .or_else(|| self.parent.schema_name())
    }

    fn catalog_name(&self) -> Option<&str> {
        self.catalog_name
            .as_deref()
            .or_else(|| self.parent.catalog_name())
    }

    fn identifier_column_name(&self) -> &str {
        self.parent.identifier_column_name()
    }

    fn discriminator_column_name(&self) -> &str {
        self.parent.discriminator_column_name()
    }

    fn tenant_id_column_name(&self) -> &str {
        self.parent.tenant_id_column_name()
    }

    fn cascade_style(&self) -> &str {
        self.cascade_style
            .as_deref()
            .unwrap_or_else(|| self.parent.cascade_style())
    }

    fn property_access_name(&self) -> &str {
        self.property_access_name
            .as_deref()
            .unwrap_or_else(|| self.parent.property_access_name())
    }

    fn are_associations_lazy(&self) -> bool {
        self.associations_lazy
            .unwrap_or_else(|| self.parent.are_associations_lazy())
    }

    fn is_auto_import(&self) -> bool {
        self.auto_import
            .unwrap_or_else(|| self.parent.is_auto_import())
    }

    fn cache_access_type(&self) -> Option<AccessType> {
        self.parent.cache_access_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_defaults() {
        let defaults = GlobalMappingDefaults::new(&MetadataOptions::default());
        assert_eq!(defaults.identifier_column_name(), "id");
        assert_eq!(defaults.discriminator_column_name(), "class");
        assert_eq!(defaults.tenant_id_column_name(), "tenant_id");
        assert_eq!(defaults.cascade_style(), "none");
        assert_eq!(defaults.property_access_name(), "property");
        assert!(defaults.are_associations_lazy());
        assert!(defaults.package_name().is_none());
    }

    #[test]
    fn test_layer_falls_through() {
        let global: Arc<dyn MappingDefaults> = Arc::new(GlobalMappingDefaults::new(
            &MetadataOptions::default().with_default_schema("app"),
        ));

        let mut document = OverriddenMappingDefaults::new(global);
        document.package_name = Some("org.acme".to_string());
        document.associations_lazy = Some(false);
        let document: Arc<dyn MappingDefaults> = Arc::new(document);

        let mut nested = OverriddenMappingDefaults::new(document);
        nested.cascade_style = Some("all".to_string());

        assert_eq!(nested.package_name(), Some("org.acme"));
        assert_eq!(nested.schema_name(), Some("app"));
        assert_eq!(nested.cascade_style(), "all");
        assert!(!nested.are_associations_lazy());
        assert_eq!(nested.property_access_name(), "property");
    }
}

//! The context handed to every binder.
//!
//! A [`BindingContext`] bundles what a binder needs to resolve one mapping element: the
//! collector being filled, the current layer of the mapping defaults stack, and the meta
//! attributes in scope. It holds references only. Nested scopes (a `<class>` inside a
//! document, a component inside a class) derive a new context with
//! [`BindingContext::with_defaults`] or [`BindingContext::with_meta`].

use std::sync::Arc;

use crate::{
    metadata::{
        collector::MetadataCollector,
        config::MetadataOptions,
        defaults::MappingDefaults,
        meta::MetaAttributeContext,
        naming::NamingStrategy,
        relational::{Identifier, SchemaName},
        source::qualify_class_name,
        typesystem::{ClassDescriptorRc, JavaType},
        MetadataImplementor,
    },
    Result,
};

/// Defaults, naming, type resolution and the collector, as seen from one mapping scope.
#[derive(Clone)]
pub struct BindingContext<'a> {
    collector: &'a MetadataCollector,
    defaults: Arc<dyn MappingDefaults>,
    meta: Arc<MetaAttributeContext>,
}

impl<'a> BindingContext<'a> {
    /// Create a context at the bottom of the defaults stack
    ///
    /// ## Arguments
    /// * 'collector'   - The metadata being filled
    /// * 'defaults'    - The mapping defaults in scope
    /// * 'meta'        - The meta attributes in scope
    pub fn new(
        collector: &'a MetadataCollector,
        defaults: Arc<dyn MappingDefaults>,
        meta: Arc<MetaAttributeContext>,
    ) -> Self {
        BindingContext {
            collector,
            defaults,
            meta,
        }
    }

    /// A nested context with another defaults layer and meta scope
    #[must_use]
    pub fn with_defaults(
        &self,
        defaults: Arc<dyn MappingDefaults>,
        meta: Arc<MetaAttributeContext>,
    ) -> BindingContext<'a> {
        BindingContext {
            collector: self.collector,
            defaults,
            meta,
        }
    }

    /// A nested context with another meta scope
    #[must_use]
    pub fn with_meta(&self, meta: Arc<MetaAttributeContext>) -> BindingContext<'a> {
        BindingContext {
            collector: self.collector,
            defaults: self.defaults.clone(),
            meta,
        }
    }

    /// The metadata being filled
    #[must_use]
    pub fn collector(&self) -> &'a MetadataCollector {
        self.collector
    }

    /// The mapping defaults in scope
    #[must_use]
    pub fn defaults(&self) -> &Arc<dyn MappingDefaults> {
        &self.defaults
    }

    /// The meta attributes in scope
    #[must_use]
    pub fn meta(&self) -> &Arc<MetaAttributeContext> {
        &self.meta
    }

    /// The naming strategy of this run
    #[must_use]
    pub fn naming_strategy(&self) -> &'a dyn NamingStrategy {
        self.collector.naming_strategy()
    }

    /// Options of this run
    #[must_use]
    pub fn options(&self) -> &'a MetadataOptions {
        self.collector.options()
    }

    /// Resolve a type name, possibly to a provisional placeholder
    pub fn make_java_type(&self, name: &str) -> Arc<JavaType> {
        self.collector.type_resolver().make_java_type(name)
    }

    /// Locate a class by name
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if the class is not registered.
    pub fn locate_class_by_name(&self, name: &str) -> Result<ClassDescriptorRc> {
        self.collector.type_resolver().locate_class_by_name(name)
    }

    /// Prefix the default package to a name without package separator
    #[must_use]
    pub fn qualify_class_name(&self, name: &str) -> String {
        qualify_class_name(name, self.defaults.package_name())
    }

    /// Parse a table or column name, honoring globally quoted identifiers
    #[must_use]
    pub fn to_identifier(&self, text: &str) -> Identifier {
        Identifier::to_identifier_quoted(text, self.options().globally_quoted_identifiers)
    }

    /// Schema for a table, falling back to the defaults in scope
    #[must_use]
    pub fn schema_name(&self, schema: Option<&str>, catalog: Option<&str>) -> SchemaName {
        SchemaName::new(
            schema.or_else(|| self.defaults.schema_name()),
            catalog.or_else(|| self.defaults.catalog_name()),
            self.options().globally_quoted_identifiers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        defaults::{GlobalMappingDefaults, OverriddenMappingDefaults},
        naming::DefaultNamingStrategy,
        typesystem::{ClassDescriptor, ClassRegistry, JavaTypeKind},
    };

    #[test]
    fn test_layered_qualification() {
        let classes = Arc::new(ClassRegistry::new());
        classes.register(ClassDescriptor::new("p.Foo"));
        let collector = MetadataCollector::new(
            MetadataOptions::quoted(),
            Arc::new(DefaultNamingStrategy),
            classes,
        );
        let global: Arc<dyn MappingDefaults> =
            Arc::new(GlobalMappingDefaults::new(collector.options()));
        let context = BindingContext::new(&collector, global.clone(), Arc::new(MetaAttributeContext::new()));
        assert_eq!(context.qualify_class_name("Foo"), "Foo");

        let mut layer = OverriddenMappingDefaults::new(global);
        layer.package_name = Some("p".to_string());
        layer.schema_name = Some("app".to_string());
        let nested = context.with_defaults(Arc::new(layer), context.meta().clone());

        assert_eq!(nested.qualify_class_name("Foo"), "p.Foo");
        assert_eq!(nested.qualify_class_name("q.Bar"), "q.Bar");
        assert_eq!(nested.make_java_type("p.Foo").kind, JavaTypeKind::Class);
        assert!(nested.locate_class_by_name("p.Missing").is_err());
        assert!(nested.to_identifier("ORDERS").is_quoted());
        assert_eq!(
            nested.schema_name(None, None).schema.unwrap().text(),
            "app"
        );
    }
}

use std::{str::FromStr, sync::Arc};

use dashmap::DashMap;

use crate::{
    metadata::typesystem::{BasicTypeKind, ClassDescriptorRc, ClassRegistry},
    Error::ClassNotFound,
    Result,
};

/// Classification of a resolved type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JavaTypeKind {
    /// A primitive (`int`, `long`, ...) with its basic column type
    Primitive(BasicTypeKind),
    /// A basic value class (`java.lang.String`, `big_decimal`, ...)
    Basic(BasicTypeKind),
    /// A class known to the [`ClassRegistry`]
    Class,
    /// A provisional placeholder for a name that could not be resolved
    Unresolved,
}

/// A resolved type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JavaType {
    /// The name the type was requested by
    pub name: String,
    /// What the name resolved to
    pub kind: JavaTypeKind,
}

impl JavaType {
    /// The basic column type, if this is a primitive or basic type
    #[must_use]
    pub fn basic_kind(&self) -> Option<BasicTypeKind> {
        match self.kind {
            JavaTypeKind::Primitive(kind) | JavaTypeKind::Basic(kind) => Some(kind),
            JavaTypeKind::Class | JavaTypeKind::Unresolved => None,
        }
    }

    /// Returns true for provisional placeholders
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.kind == JavaTypeKind::Unresolved
    }
}

/// Resolves type names to [`JavaType`] descriptors.
///
/// Results are cached per name. Names that are neither primitive, basic nor a registered
/// class resolve to an [`JavaTypeKind::Unresolved`] placeholder; callers that require a
/// loadable class use [`TypeResolver::locate_class_by_name`] instead.
pub struct TypeResolver {
    classes: Arc<ClassRegistry>,
    cache: DashMap<String, Arc<JavaType>>,
}

impl TypeResolver {
    /// Create a new resolver over the given class registry
    ///
    /// ## Arguments
    /// * 'classes' - The class registry to consult
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        TypeResolver {
            classes,
            cache: DashMap::new(),
        }
    }

    /// The underlying class registry
    #[must_use]
    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    /// Resolve a type name, consulting the cache first
    ///
    /// ## Arguments
    /// * 'name' - A primitive name, basic type name, or fully qualified class name
    pub fn make_java_type(&self, name: &str) -> Arc<JavaType> {
        if let Some(cached) = self.cache.get(name) {
            return cached.clone();
        }

        let kind = if let Some(kind) = BasicTypeKind::from_primitive(name) {
            JavaTypeKind::Primitive(kind)
        } else if let Ok(kind) = BasicTypeKind::from_str(name) {
            JavaTypeKind::Basic(kind)
        } else if self.classes.contains(name) {
            JavaTypeKind::Class
        } else {
            JavaTypeKind::Unresolved
        };

        let resolved = Arc::new(JavaType {
            name: name.to_string(),
            kind,
        });

        // A class registered after the first lookup must not stay a placeholder
        if kind != JavaTypeKind::Unresolved {
            self.cache.insert(name.to_string(), resolved.clone());
        }
        resolved
    }

    /// Locate a class descriptor by name
    ///
    /// ## Arguments
    /// * 'name' - Fully qualified class name
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if the class is not registered.
    pub fn locate_class_by_name(&self, name: &str) -> Result<ClassDescriptorRc> {
        self.classes
            .get(name)
            .ok_or_else(|| ClassNotFound(name.to_string()))
    }

    /// Number of cached resolutions
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::ClassDescriptor;

    #[test]
    fn test_resolution_kinds() {
        let classes = Arc::new(ClassRegistry::new());
        classes.register(ClassDescriptor::new("org.acme.Address"));
        let resolver = TypeResolver::new(classes);

        assert_eq!(
            resolver.make_java_type("int").kind,
            JavaTypeKind::Primitive(BasicTypeKind::Integer)
        );
        assert_eq!(
            resolver.make_java_type("java.lang.String").basic_kind(),
            Some(BasicTypeKind::String)
        );
        assert_eq!(
            resolver.make_java_type("org.acme.Address").kind,
            JavaTypeKind::Class
        );
        assert!(resolver.make_java_type("org.acme.Missing").is_unresolved());
    }

    #[test]
    fn test_cache_hits_share_descriptor() {
        let resolver = TypeResolver::new(Arc::new(ClassRegistry::new()));
        let first = resolver.make_java_type("long");
        let second = resolver.make_java_type("long");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_placeholder_upgrades_once_registered() {
        let classes = Arc::new(ClassRegistry::new());
        let resolver = TypeResolver::new(classes.clone());
        assert!(resolver.make_java_type("a.Late").is_unresolved());

        classes.register(ClassDescriptor::new("a.Late"));
        assert_eq!(resolver.make_java_type("a.Late").kind, JavaTypeKind::Class);
    }

    #[test]
    fn test_locate_missing_class() {
        let resolver = TypeResolver::new(Arc::new(ClassRegistry::new()));
        match resolver.locate_class_by_name("a.Missing") {
            Err(crate::Error::ClassNotFound(name)) => assert_eq!(name, "a.Missing"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

//! Type resolution for mapped attributes.
//!
//! Mapping sources refer to types by name. This module turns those names into descriptors:
//!
//! - [`BasicTypeKind`]: the closed set of single-column value types
//! - [`ClassDescriptor`] / [`ClassRegistry`]: explicit class descriptions used where a
//!   reflective runtime would load classes
//! - [`TypeResolver`]: cached name-to-[`JavaType`] resolution
//!
//! # Provisional Types
//!
//! `hbm.xml` documents may omit attribute types. When the owning class is not registered the
//! attribute type resolves to a [`JavaTypeKind::Unresolved`] placeholder instead of failing;
//! only call sites that need a loadable class (`locate_class_by_name`) report
//! [`crate::Error::ClassNotFound`].

mod basic;
mod classes;
mod resolver;

pub use basic::BasicTypeKind;
pub use classes::{
    unqualify, AttributeAnnotation, AttributeDescriptor, ClassAnnotation, ClassDescriptor,
    ClassDescriptorRc, ClassRegistry, ColumnSpec, FetchOverride, InheritanceType,
    ROOT_CLASS_NAME,
};
pub use resolver::{JavaType, JavaTypeKind, TypeResolver};

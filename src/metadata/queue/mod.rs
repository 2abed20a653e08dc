//! Ordering of mapping sources.
//!
//! Mapping sources reference each other out of order: an `hbm.xml` subclass may name a
//! superclass that a later document declares, and annotated classes arrive in no particular
//! order. This module decides when each source binds.
//!
//! # Key Components
//!
//! - [`MetadataSourceQueue`]: pending documents and annotated classes, cross-referenced by
//!   entity name so a class bound by one kind of source is dropped from the other
//! - [`order_and_fill_hierarchy`]: linearizes annotated classes superclass first, filling in
//!   mapped superclasses
//! - [`ExtendsQueue`]: documents deferred on an `extends` target, resolved to a fixpoint

mod extends;
mod order;
mod sources;

pub use extends::{ExtendsQueue, ExtendsQueueEntry};
pub use order::order_and_fill_hierarchy;
pub use sources::MetadataSourceQueue;

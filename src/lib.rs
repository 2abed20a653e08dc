// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # ormbind
//!
//! Binds object/relational mapping sources into an immutable, queryable mapping model.
//!
//! Two kinds of mapping source are understood: legacy `hbm.xml` documents and annotated
//! class descriptors. Both are bound into one model of entities, inheritance hierarchies,
//! identifiers, attributes, collections and the physical tables behind them, together with
//! named queries, fetch profiles, filters and the other named definitions a mapping carries.
//!
//! ## Features
//!
//! - **Mixed sources** - `hbm.xml` and annotated classes in one run, with configurable
//!   precedence when both map the same entity
//! - **Out-of-order documents** - subclasses naming a superclass that binds later are
//!   deferred and resolved to a fixpoint
//! - **Layered defaults** - schema, catalog, cascade, access and laziness defaults per
//!   document on top of global options
//! - **Two-phase bindings** - cross-entity references resolve after every entity exists
//! - **Thread-safe results** - the finished [`metadata::Metadata`] is `Send + Sync`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ormbind::prelude::*;
//!
//! let mut sources = MetadataSources::new();
//! sources.add_hbm_xml_str(
//!     r#"<hibernate-mapping package="shop">
//!         <class name="Order" table="ORDERS">
//!             <id name="id" type="long"><generator class="native"/></id>
//!             <property name="placed" type="timestamp"/>
//!         </class>
//!     </hibernate-mapping>"#,
//!     "Order.hbm.xml",
//! )?;
//!
//! let metadata = sources.build_metadata()?;
//! let order = metadata.get_entity_binding("shop.Order").unwrap();
//! println!("{} is stored in {}", order.entity_name, order.primary_table);
//! # Ok::<(), ormbind::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`metadata`] - Sources, the binding pipeline, the bound model and persisters
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Errors raised while binding a document
//! are wrapped with the document's origin:
//!
//! ```rust,no_run
//! use ormbind::{metadata::MetadataSources, Error};
//!
//! let mut sources = MetadataSources::new();
//! match sources.add_file("mappings/Broken.hbm.xml".as_ref()) {
//!     Ok(_) => println!("Document queued"),
//!     Err(Error::InvalidMapping { origin_name, source, .. }) => {
//!         println!("{origin_name}: {source}")
//!     }
//!     Err(e) => println!("Error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust,no_run
/// use ormbind::prelude::*;
///
/// let metadata = MetadataSources::new().build_metadata()?;
/// assert!(metadata.entity_bindings().is_empty());
/// # Ok::<(), ormbind::Error>(())
/// ```
pub mod prelude;

/// Mapping sources, the binding pipeline and the bound model.
///
/// See [`metadata::MetadataSources`] for the entry point and
/// [`metadata::MetadataImplementor`] for the lookup interface of the result.
pub mod metadata;

/// `ormbind` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `ormbind` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,no_run
/// use ormbind::{metadata::MetadataSources, Error};
///
/// let mut sources = MetadataSources::new();
/// sources.add_hbm_xml_str(
///     r#"<hibernate-mapping><subclass name="a.Dog" extends="a.Animal"/></hibernate-mapping>"#,
///     "dog.hbm.xml",
/// )?;
///
/// match sources.build_metadata() {
///     Ok(_) => println!("Bound"),
///     Err(Error::UnresolvedExtends(message)) => println!("{message}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// # Ok::<(), Error>(())
/// ```
pub use error::{DuplicateMappingKind, Error};

/// Entry point collecting mapping sources and building [`metadata::Metadata`].
pub use metadata::MetadataSources;

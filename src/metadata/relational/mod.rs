//! The physical relational model.
//!
//! Bindings locate or create their tables here while sources are processed. The model is
//! owned by the metadata and frozen together with it.
//!
//! # Key Components
//!
//! - [`Database`]: table registry, derived tables and auxiliary database objects
//! - [`Table`] / [`Column`]: physical tables with keys and columns
//! - [`DerivedTable`]: a `(select ...)` expression used in place of a table
//! - [`TableReference`]: what a binding points at; derived tables are never updatable
//! - [`Identifier`]: names with back-tick quoting

mod database;
mod identifier;
mod table;

pub use database::{is_derived_table_expression, AuxiliaryDatabaseObject, Database};
pub use identifier::Identifier;
pub use table::{Column, DerivedTable, ForeignKey, SchemaName, Table, TableRc, TableReference};

use std::{
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use indexmap::IndexMap;

use crate::metadata::relational::Identifier;

/// A reference-counted physical table
pub type TableRc = Arc<Table>;

/// Schema and catalog qualifying a table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaName {
    /// Catalog, if any
    pub catalog: Option<Identifier>,
    /// Schema, if any
    pub schema: Option<Identifier>,
}

impl SchemaName {
    /// Create a schema name from optional mapping text
    #[must_use]
    pub fn new(schema: Option<&str>, catalog: Option<&str>, force_quote: bool) -> Self {
        SchemaName {
            catalog: catalog.map(|c| Identifier::to_identifier_quoted(c, force_quote)),
            schema: schema.map(|s| Identifier::to_identifier_quoted(s, force_quote)),
        }
    }

    /// Qualify an object name with this schema
    #[must_use]
    pub fn qualify(&self, name: &Identifier) -> String {
        let mut qualified = String::new();
        if let Some(catalog) = &self.catalog {
            qualified.push_str(&catalog.to_string());
            qualified.push('.');
        }
        if let Some(schema) = &self.schema {
            qualified.push_str(&schema.to_string());
            qualified.push('.');
        }
        qualified.push_str(&name.to_string());
        qualified
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: Identifier,
    /// Whether the column accepts null
    pub nullable: bool,
    /// Whether the column carries a unique constraint
    pub unique: bool,
    /// Declared length
    pub length: Option<u32>,
    /// Explicit SQL type
    pub sql_type: Option<String>,
}

impl Column {
    /// Create a nullable column
    #[must_use]
    pub fn new(name: Identifier) -> Self {
        Column {
            name,
            nullable: true,
            unique: false,
            length: None,
            sql_type: None,
        }
    }

    /// Set nullability
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set uniqueness
    #[must_use]
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// A foreign key from one table to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing columns of the owning table
    pub columns: Vec<String>,
    /// Qualified name of the referenced table
    pub target_table: String,
    /// Referenced columns, empty for the target's primary key
    pub target_columns: Vec<String>,
    /// Whether deletes cascade at database level
    pub cascade_delete: bool,
}

/// A physical table.
///
/// Columns and keys are added while sources bind; the table number is assigned once when the
/// owning [`crate::metadata::relational::Database`] is frozen.
#[derive(Debug)]
pub struct Table {
    schema: SchemaName,
    name: Identifier,
    columns: RwLock<IndexMap<String, Column>>,
    primary_key: RwLock<Vec<String>>,
    unique_keys: RwLock<Vec<Vec<String>>>,
    foreign_keys: boxcar::Vec<ForeignKey>,
    table_number: OnceLock<usize>,
}

impl Table {
    /// Create an empty table
    #[must_use]
    pub fn new(schema: SchemaName, name: Identifier) -> Self {
        Table {
            schema,
            name,
            columns: RwLock::new(IndexMap::new()),
            primary_key: RwLock::new(Vec::new()),
            unique_keys: RwLock::new(Vec::new()),
            foreign_keys: boxcar::Vec::new(),
            table_number: OnceLock::new(),
        }
    }

    /// The table name
    #[must_use]
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Schema and catalog
    #[must_use]
    pub fn schema(&self) -> &SchemaName {
        &self.schema
    }

    /// `catalog.schema.name`, omitting absent parts
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.schema.qualify(&self.name)
    }

    /// Return the column named like `column`, adding `column` if none exists yet
    pub fn locate_or_create_column(&self, column: Column) -> Column {
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        columns
            .entry(column.name.text().to_string())
            .or_insert(column)
            .clone()
    }

    /// Look up a column
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<Column> {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns true if the column exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Column names in creation order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Replace the primary key; the key columns become non-nullable
    pub fn set_primary_key(&self, columns: &[String]) {
        {
            let mut existing = self.columns.write().unwrap_or_else(PoisonError::into_inner);
            for name in columns {
                existing
                    .entry(name.clone())
                    .or_insert_with(|| Column::new(Identifier::to_identifier(name)))
                    .nullable = false;
            }
        }
        *self.primary_key.write().unwrap_or_else(PoisonError::into_inner) = columns.to_vec();
    }

    /// Primary key column names
    #[must_use]
    pub fn primary_key(&self) -> Vec<String> {
        self.primary_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Add a unique key over `columns`
    pub fn add_unique_key(&self, columns: Vec<String>) {
        let mut keys = self.unique_keys.write().unwrap_or_else(PoisonError::into_inner);
        if !keys.contains(&columns) {
            keys.push(columns);
        }
    }

    /// Declared unique keys
    #[must_use]
    pub fn unique_keys(&self) -> Vec<Vec<String>> {
        self.unique_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Add a foreign key referencing `target_table`; an identical key is not added twice
    pub fn add_foreign_key(&self, columns: Vec<String>, target_table: &Table, target_columns: Vec<String>) {
        let target = target_table.qualified_name();
        let exists = self.foreign_keys.iter().any(|(_, fk)| {
            fk.columns == columns && fk.target_table == target && fk.target_columns == target_columns
        });
        if !exists {
            self.foreign_keys.push(ForeignKey {
                columns,
                target_table: target,
                target_columns,
                cascade_delete: false,
            });
        }
    }

    /// Declared foreign keys
    #[must_use]
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        self.foreign_keys.iter().map(|(_, fk)| fk.clone()).collect()
    }

    /// The table number, assigned when the database is frozen
    #[must_use]
    pub fn table_number(&self) -> Option<usize> {
        self.table_number.get().copied()
    }

    pub(crate) fn assign_table_number(&self, number: usize) {
        let _ = self.table_number.set(number);
    }
}

/// A table defined by a `(select ...)` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTable {
    /// The select expression, without surrounding parentheses
    pub expression: String,
    /// Logical name used to refer to the derived table
    pub logical_name: Identifier,
}

/// What a binding reads from and writes to.
#[derive(Debug, Clone)]
pub enum TableReference {
    /// A physical table, located or created by qualified name
    Physical(TableRc),
    /// A derived table; never a target of insert, update or delete
    Derived(Arc<DerivedTable>),
}

impl TableReference {
    /// Whether SQL may insert into, update or delete from this table
    #[must_use]
    pub fn is_updatable(&self) -> bool {
        match self {
            TableReference::Physical(_) => true,
            TableReference::Derived(_) => false,
        }
    }

    /// The physical table, if this is one
    #[must_use]
    pub fn physical(&self) -> Option<&TableRc> {
        match self {
            TableReference::Physical(table) => Some(table),
            TableReference::Derived(_) => None,
        }
    }

    /// Logical name
    #[must_use]
    pub fn logical_name(&self) -> &Identifier {
        match self {
            TableReference::Physical(table) => table.name(),
            TableReference::Derived(derived) => &derived.logical_name,
        }
    }

    /// Text usable in a from clause
    #[must_use]
    pub fn query_text(&self) -> String {
        match self {
            TableReference::Physical(table) => table.qualified_name(),
            TableReference::Derived(derived) => format!("( {} )", derived.expression),
        }
    }

    /// Add a column to the physical table; derived tables expose their columns as selected
    pub fn locate_or_create_column(&self, column: Column) {
        if let TableReference::Physical(table) = self {
            table.locate_or_create_column(column);
        }
    }

    /// Returns true if both refer to the same table
    #[must_use]
    pub fn same_table(&self, other: &TableReference) -> bool {
        match (self, other) {
            (TableReference::Physical(a), TableReference::Physical(b)) => Arc::ptr_eq(a, b),
            (TableReference::Derived(a), TableReference::Derived(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_text())
    }
}

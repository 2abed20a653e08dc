use std::sync::{atomic::AtomicUsize, atomic::Ordering, Arc};

use crossbeam_skiplist::SkipMap;

use crate::metadata::relational::{DerivedTable, Identifier, SchemaName, Table, TableRc};

/// A `<database-object>` declared by a mapping document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryDatabaseObject {
    /// DDL executed on schema creation
    pub create: String,
    /// DDL executed on schema drop
    pub drop: String,
    /// Dialects the object applies to, empty for all
    pub dialect_scopes: Vec<String>,
}

/// The physical model derived from the bindings.
///
/// Tables are keyed by schema and name, so locating the same table twice yields the same
/// [`Table`]. Once [`Database::freeze`] runs every table carries a number in
/// `(catalog, schema, name)` order.
#[derive(Debug, Default)]
pub struct Database {
    default_schema: SchemaName,
    tables: SkipMap<(SchemaName, Identifier), TableRc>,
    derived_tables: boxcar::Vec<Arc<DerivedTable>>,
    auxiliary_objects: boxcar::Vec<AuxiliaryDatabaseObject>,
    derived_counter: AtomicUsize,
}

impl Database {
    /// Create an empty database with the schema used when mappings name none
    #[must_use]
    pub fn new(default_schema: SchemaName) -> Self {
        Database {
            default_schema,
            ..Default::default()
        }
    }

    /// Schema used when a mapping names none
    #[must_use]
    pub fn default_schema(&self) -> &SchemaName {
        &self.default_schema
    }

    /// Return the table with the given schema and name, creating it on first use
    ///
    /// ## Arguments
    /// * 'schema'  - Schema and catalog, with absent parts filled from the default schema
    /// * 'name'    - Physical table name
    pub fn locate_or_create_table(&self, schema: SchemaName, name: Identifier) -> TableRc {
        let schema = SchemaName {
            catalog: schema.catalog.or_else(|| self.default_schema.catalog.clone()),
            schema: schema.schema.or_else(|| self.default_schema.schema.clone()),
        };
        let key = (schema.clone(), name.clone());
        self.tables
            .get_or_insert_with(key, || Arc::new(Table::new(schema, name)))
            .value()
            .clone()
    }

    /// Register a table defined by a select expression
    ///
    /// ## Arguments
    /// * 'expression'      - The select text
    /// * 'logical_name'    - Name to refer to the table by, generated when absent
    pub fn create_derived_table(
        &self,
        expression: &str,
        logical_name: Option<Identifier>,
    ) -> Arc<DerivedTable> {
        let logical_name = logical_name.unwrap_or_else(|| {
            let index = self.derived_counter.fetch_add(1, Ordering::Relaxed);
            Identifier::new(format!("derived_{index}"), false)
        });
        let derived = Arc::new(DerivedTable {
            expression: strip_parentheses(expression).to_string(),
            logical_name,
        });
        self.derived_tables.push(derived.clone());
        derived
    }

    /// Look up a table by its qualified name
    #[must_use]
    pub fn get_table(&self, qualified_name: &str) -> Option<TableRc> {
        self.tables
            .iter()
            .find(|entry| entry.value().qualified_name() == qualified_name)
            .map(|entry| entry.value().clone())
    }

    /// All physical tables in `(catalog, schema, name)` order
    #[must_use]
    pub fn tables(&self) -> Vec<TableRc> {
        self.tables.iter().map(|entry| entry.value().clone()).collect()
    }

    /// All derived tables in creation order
    #[must_use]
    pub fn derived_tables(&self) -> Vec<Arc<DerivedTable>> {
        self.derived_tables
            .iter()
            .map(|(_, derived)| derived.clone())
            .collect()
    }

    /// Register a `<database-object>`
    pub fn add_auxiliary_database_object(&self, object: AuxiliaryDatabaseObject) {
        self.auxiliary_objects.push(object);
    }

    /// Declared auxiliary objects
    #[must_use]
    pub fn auxiliary_database_objects(&self) -> Vec<AuxiliaryDatabaseObject> {
        self.auxiliary_objects
            .iter()
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Number every table in key order
    ///
    /// Calling this more than once leaves the first numbering in place.
    pub fn freeze(&self) {
        for (number, entry) in self.tables.iter().enumerate() {
            entry.value().assign_table_number(number);
        }
    }
}

/// Returns true if mapping text names a derived table: `(select ...)`.
#[must_use]
pub fn is_derived_table_expression(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('(') && trimmed.ends_with(')') && {
        let inner = trimmed[1..trimmed.len() - 1].trim_start();
        inner
            .get(..6)
            .is_some_and(|keyword| keyword.eq_ignore_ascii_case("select"))
    }
}

fn strip_parentheses(expression: &str) -> &str {
    let trimmed = expression.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_or_create_is_idempotent() {
        let db = Database::new(SchemaName::default());
        let first = db.locate_or_create_table(SchemaName::default(), Identifier::to_identifier("ORDERS"));
        let second = db.locate_or_create_table(SchemaName::default(), Identifier::to_identifier("ORDERS"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(db.tables().len(), 1);
    }

    #[test]
    fn test_default_schema_applied() {
        let db = Database::new(SchemaName::new(Some("app"), None, false));
        let table = db.locate_or_create_table(SchemaName::default(), Identifier::to_identifier("T"));
        assert_eq!(table.qualified_name(), "app.T");
        assert!(db.get_table("app.T").is_some());
        assert!(db.get_table("T").is_none());
    }

    #[test]
    fn test_freeze_numbers_in_order() {
        let db = Database::new(SchemaName::default());
        let b = db.locate_or_create_table(SchemaName::default(), Identifier::to_identifier("B"));
        let a = db.locate_or_create_table(SchemaName::default(), Identifier::to_identifier("A"));
        db.freeze();
        assert_eq!(a.table_number(), Some(0));
        assert_eq!(b.table_number(), Some(1));
    }

    #[test]
    fn test_derived_tables() {
        assert!(is_derived_table_expression("(select * from ORDERS)"));
        assert!(is_derived_table_expression("  ( SELECT 1 )"));
        assert!(!is_derived_table_expression("ORDERS"));
        assert!(!is_derived_table_expression("(ORDERS)"));

        let db = Database::new(SchemaName::default());
        let derived = db.create_derived_table("(select * from ORDERS)", None);
        assert_eq!(derived.expression, "select * from ORDERS");
        assert_eq!(derived.logical_name.text(), "derived_0");
        assert_eq!(db.derived_tables().len(), 1);
    }
}

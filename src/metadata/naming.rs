//! Logical to physical naming of tables and columns.
//!
//! A [`NamingStrategy`] is chosen per binding run and handed to the binders through the
//! binding context. Two strategies are provided:
//!
//! - [`DefaultNamingStrategy`]: unqualified names, otherwise verbatim
//! - [`ImprovedNamingStrategy`]: `snake_case` names derived from mixed-case class and
//!   attribute names
//!
//! # Examples
//!
//! ```rust
//! use ormbind::metadata::naming::{ImprovedNamingStrategy, NamingStrategy};
//!
//! let naming = ImprovedNamingStrategy;
//! assert_eq!(naming.class_to_table_name("org.acme.LineItem"), "line_item");
//! assert_eq!(naming.property_to_column_name("address.zipCode"), "zip_code");
//! ```

use crate::metadata::typesystem::unqualify;

/// Maps logical names found in mappings to physical names.
pub trait NamingStrategy: Send + Sync {
    /// Table name for an entity that names no table
    fn class_to_table_name(&self, class_name: &str) -> String;

    /// Column name for an attribute that names no column
    fn property_to_column_name(&self, property_name: &str) -> String;

    /// Physical name for an explicitly named table
    fn table_name(&self, table_name: &str) -> String;

    /// Physical name for an explicitly named column
    fn column_name(&self, column_name: &str) -> String;

    /// Table name for a collection that names no table
    ///
    /// ## Arguments
    /// * 'owner_entity'        - Entity owning the collection
    /// * 'owner_table'         - Primary table of the owner
    /// * 'associated_entity'   - Element entity of an entity-valued collection
    /// * 'associated_table'    - Primary table of the element entity, if known
    /// * 'property_name'       - Collection attribute name
    fn collection_table_name(
        &self,
        owner_entity: &str,
        owner_table: &str,
        associated_entity: Option<&str>,
        associated_table: Option<&str>,
        property_name: &str,
    ) -> String;

    /// Column name for a foreign key that names no column
    ///
    /// ## Arguments
    /// * 'property_name'           - Association attribute, absent for collection keys
    /// * 'property_entity_name'    - Referenced entity
    /// * 'property_table_name'     - Table of the referenced entity
    /// * 'referenced_column_name'  - Referenced column
    fn foreign_key_column_name(
        &self,
        property_name: Option<&str>,
        property_entity_name: &str,
        property_table_name: &str,
        referenced_column_name: &str,
    ) -> String;

    /// Column name for a join key that names no column
    fn join_key_column_name(&self, joined_column: &str, joined_table: &str) -> String;

    /// Logical name of a column, used to refer to it from other mappings
    fn logical_column_name(&self, column_name: Option<&str>, property_name: &str) -> String;
}

/// Unqualified names, otherwise verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

impl NamingStrategy for DefaultNamingStrategy {
    fn class_to_table_name(&self, class_name: &str) -> String {
        unqualify(class_name).to_string()
    }

    fn property_to_column_name(&self, property_name: &str) -> String {
        unqualify(property_name).to_string()
    }

    fn table_name(&self, table_name: &str) -> String {
        table_name.to_string()
    }

    fn column_name(&self, column_name: &str) -> String {
        column_name.to_string()
    }

    fn collection_table_name(
        &self,
        _owner_entity: &str,
        owner_table: &str,
        _associated_entity: Option<&str>,
        _associated_table: Option<&str>,
        property_name: &str,
    ) -> String {
        format!("{owner_table}_{}", unqualify(property_name))
    }

    fn foreign_key_column_name(
        &self,
        property_name: Option<&str>,
        _property_entity_name: &str,
        property_table_name: &str,
        _referenced_column_name: &str,
    ) -> String {
        match property_name {
            Some(property) => unqualify(property).to_string(),
            None => property_table_name.to_string(),
        }
    }

    fn join_key_column_name(&self, joined_column: &str, _joined_table: &str) -> String {
        joined_column.to_string()
    }

    fn logical_column_name(&self, column_name: Option<&str>, property_name: &str) -> String {
        match column_name {
            Some(column) if !column.is_empty() => column.to_string(),
            _ => unqualify(property_name).to_string(),
        }
    }
}

/// `snake_case` names derived from mixed-case names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImprovedNamingStrategy;

impl NamingStrategy for ImprovedNamingStrategy {
    fn class_to_table_name(&self, class_name: &str) -> String {
        add_underscores(unqualify(class_name))
    }

    fn property_to_column_name(&self, property_name: &str) -> String {
        add_underscores(unqualify(property_name))
    }

    fn table_name(&self, table_name: &str) -> String {
        add_underscores(table_name)
    }

    fn column_name(&self, column_name: &str) -> String {
        add_underscores(column_name)
    }

    fn collection_table_name(
        &self,
        _owner_entity: &str,
        owner_table: &str,
        _associated_entity: Option<&str>,
        _associated_table: Option<&str>,
        property_name: &str,
    ) -> String {
        add_underscores(&format!("{owner_table}_{}", unqualify(property_name)))
    }

    fn foreign_key_column_name(
        &self,
        property_name: Option<&str>,
        _property_entity_name: &str,
        property_table_name: &str,
        _referenced_column_name: &str,
    ) -> String {
        add_underscores(unqualify(property_name.unwrap_or(property_table_name)))
    }

    fn join_key_column_name(&self, joined_column: &str, _joined_table: &str) -> String {
        add_underscores(joined_column)
    }

    fn logical_column_name(&self, column_name: Option<&str>, property_name: &str) -> String {
        match column_name {
            Some(column) if !column.is_empty() => column.to_string(),
            _ => unqualify(property_name).to_string(),
        }
    }
}

/// Insert `_` at every lower-to-upper case transition followed by a lower case letter, then
/// lower-case everything.
fn add_underscores(name: &str) -> String {
    let chars: Vec<char> = name.replace('.', "_").chars().collect();
    let mut result = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_lowercase()
            && c.is_uppercase()
            && chars[i + 1].is_lowercase()
        {
            result.push('_');
        }
        result.extend(c.to_lowercase());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy() {
        let naming = DefaultNamingStrategy;
        assert_eq!(naming.class_to_table_name("org.acme.LineItem"), "LineItem");
        assert_eq!(naming.property_to_column_name("address.zip"), "zip");
        assert_eq!(
            naming.collection_table_name("org.acme.Order", "ORDERS", None, None, "tags"),
            "ORDERS_tags"
        );
        assert_eq!(
            naming.foreign_key_column_name(Some("customer"), "org.acme.Customer", "CUSTOMER", "ID"),
            "customer"
        );
        assert_eq!(
            naming.foreign_key_column_name(None, "org.acme.Customer", "CUSTOMER", "ID"),
            "CUSTOMER"
        );
        assert_eq!(naming.logical_column_name(None, "name"), "name");
        assert_eq!(naming.logical_column_name(Some("FULL_NAME"), "name"), "FULL_NAME");
    }

    #[test]
    fn test_improved_strategy() {
        let naming = ImprovedNamingStrategy;
        assert_eq!(naming.class_to_table_name("org.acme.LineItem"), "line_item");
        assert_eq!(naming.property_to_column_name("zipCode"), "zip_code");
        assert_eq!(naming.table_name("URLMapping"), "urlmapping");
        assert_eq!(
            naming.collection_table_name("org.acme.Order", "orders", None, None, "lineItems"),
            "orders_line_items"
        );
    }
}

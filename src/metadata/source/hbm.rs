//! `hbm.xml` mapping documents.
//!
//! A document is parsed once into a small owned element tree ([`XmlElement`]). The tree is
//! what the hbm binder walks; the document itself additionally knows how to enumerate the
//! entity names it declares and which `extends` targets it still needs, which is all the
//! [`crate::metadata::queue::MetadataSourceQueue`] needs to order documents.
//!
//! # Document Shape
//!
//! ```xml
//! <hibernate-mapping package="org.acme">
//!     <class name="Animal" table="ANIMAL">
//!         <id name="id" column="ID"/>
//!         <subclass name="Dog" discriminator-value="D"/>
//!     </class>
//!     <subclass name="Cat" extends="Animal"/>
//! </hibernate-mapping>
//! ```

use std::{
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use indexmap::IndexSet;
use quick_xml::{events::Event, Reader};

use crate::{
    metadata::source::{Origin, OriginType},
    Result,
};

/// Element names that declare an entity.
pub(crate) const ENTITY_ELEMENTS: [&str; 4] =
    ["class", "subclass", "joined-subclass", "union-subclass"];

/// Element names that may carry an `extends` attribute at the document level.
pub(crate) const SUBCLASS_ELEMENTS: [&str; 3] = ["subclass", "joined-subclass", "union-subclass"];

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// A single XML element with its attributes, children and text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local element name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// Concatenated text and CDATA content
    pub text: String,
}

impl XmlElement {
    /// Create an element with the given name and no content
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the value of the named attribute
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of the named attribute, treating an empty value as absent
    #[must_use]
    pub fn non_empty_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).filter(|value| !value.is_empty())
    }

    /// Interprets the named attribute as a boolean (`"true"`), falling back to `default`
    #[must_use]
    pub fn bool_attribute(&self, name: &str, default: bool) -> bool {
        match self.attribute(name) {
            Some(value) => value == "true",
            None => default,
        }
    }

    /// Iterate all children with the given element name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// The first child with the given element name
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// The first child whose name is one of `names`
    #[must_use]
    pub fn first_child_of(&self, names: &[&str]) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|child| names.contains(&child.name.as_str()))
    }

    /// Trimmed text content
    #[must_use]
    pub fn text_trim(&self) -> &str {
        self.text.trim()
    }

    /// Trimmed text of the first child with the given name
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlElement::text_trim)
    }

    /// Builder helper: add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Builder helper: add a child element
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }
}

/// A parsed `hbm.xml` mapping document.
#[derive(Debug, Clone)]
pub struct HbmDocument {
    id: u64,
    origin: Origin,
    root: XmlElement,
}

impl HbmDocument {
    /// Parse a mapping document from a string
    ///
    /// ## Arguments
    /// * 'xml'     - The document text
    /// * 'origin'  - Where the document came from, used for diagnostics
    ///
    /// # Errors
    /// Returns [`crate::Error::Xml`] if the text is not well-formed, or a mapping error if the
    /// root element is not `<hibernate-mapping>`.
    pub fn parse(xml: &str, origin: Origin) -> Result<Self> {
        let root = parse_element_tree(xml)?;
        if root.name != "hibernate-mapping" {
            return Err(mapping_error!(
                "Expected <hibernate-mapping> root element in {}, found <{}>",
                origin.name,
                root.name
            ));
        }

        Ok(Self::from_root(root, origin))
    }

    /// Read and parse a mapping document from disk
    ///
    /// ## Arguments
    /// * 'path' - Path of the `hbm.xml` file
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, otherwise the same
    /// errors as [`HbmDocument::parse`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse(
            &xml,
            Origin::new(OriginType::File, path.display().to_string()),
        )
    }

    /// Wrap an already built element tree
    pub fn from_root(root: XmlElement, origin: Origin) -> Self {
        HbmDocument {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            origin,
            root,
        }
    }

    /// Process-unique identity of this document
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Where the document came from
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The `<hibernate-mapping>` root element
    #[must_use]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// The `package` attribute of the root element
    #[must_use]
    pub fn default_package(&self) -> Option<&str> {
        self.root.non_empty_attribute("package")
    }

    /// Collects every entity name declared anywhere in this document.
    ///
    /// Nested subclass declarations are included. The set preserves document order.
    pub fn entity_names(&self) -> Result<IndexSet<String>> {
        let mut names = IndexSet::new();
        collect_entity_names(self.default_package(), &self.root, &mut names)?;
        Ok(names)
    }

    /// Returns the `extends` targets this document needs before it can be bound.
    ///
    /// Only top-level subclass declarations can name a superclass outside the document.
    /// A target counts as satisfied when `is_bound` accepts either its raw or its
    /// package-qualified name, or when the document itself declares it.
    pub fn extends_needed<F>(&self, is_bound: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> bool,
    {
        let package = self.default_package();
        let mut needed: IndexSet<String> = IndexSet::new();

        for element in self
            .root
            .children
            .iter()
            .filter(|child| SUBCLASS_ELEMENTS.contains(&child.name.as_str()))
        {
            let Some(extends) = element.non_empty_attribute("extends") else {
                continue;
            };
            if !is_bound(extends) && !is_bound(&qualify_class_name(extends, package)) {
                needed.insert(extends.to_string());
            }
        }

        if needed.is_empty() {
            return Ok(Vec::new());
        }

        // extends targets declared by this very document do not defer it
        let declared = self.entity_names()?;
        needed.retain(|name| {
            let qualified = qualify_class_name(name, package);
            !declared.contains(name.as_str()) && !declared.contains(&qualified)
        });

        Ok(needed.into_iter().collect())
    }
}

/// Prefix `name` with `package` when it contains no package separator.
pub(crate) fn qualify_class_name(name: &str, package: Option<&str>) -> String {
    match package {
        Some(package) if !package.is_empty() && !name.contains('.') => {
            format!("{package}.{name}")
        }
        _ => name.to_string(),
    }
}

/// The entity name declared by an entity element: `entity-name` verbatim, else the
/// package-qualified `name`.
pub(crate) fn entity_name_of(element: &XmlElement, package: Option<&str>) -> Option<String> {
    if let Some(entity_name) = element.non_empty_attribute("entity-name") {
        return Some(entity_name.to_string());
    }
    element
        .non_empty_attribute("name")
        .map(|name| qualify_class_name(name, package))
}

fn collect_entity_names(
    package: Option<&str>,
    node: &XmlElement,
    names: &mut IndexSet<String>,
) -> Result<()> {
    for element in node
        .children
        .iter()
        .filter(|child| ENTITY_ELEMENTS.contains(&child.name.as_str()))
    {
        let entity_name = entity_name_of(element, package)
            .ok_or_else(|| mapping_error!("Unable to determine entity name"))?;
        names.insert(entity_name);
        collect_entity_names(package, element, names)?;
    }
    Ok(())
}

fn parse_element_tree(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref start) => {
                stack.push(element_from_start(start)?);
            }
            Event::Empty(ref start) => {
                let element = element_from_start(start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| mapping_error!("Unbalanced end tag in mapping document"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(mapping_error!("Mapping document ended inside <{}>", stack[stack.len() - 1].name));
    }

    root.ok_or_else(|| mapping_error!("Mapping document has no root element"))
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(mapping_error!(
            "Mapping document has more than one root element"
        ));
    }
    *root = Some(element);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANIMALS: &str = r#"<?xml version="1.0"?>
<!DOCTYPE hibernate-mapping PUBLIC "-//Hibernate/Hibernate Mapping DTD 3.0//EN" "http://www.hibernate.org/dtd/hibernate-mapping-3.0.dtd">
<hibernate-mapping package="org.acme">
    <!-- root of the tree -->
    <class name="Animal" table="ANIMAL">
        <meta attribute="author">Ada &amp; Bob</meta>
        <id name="id" column="ID"/>
        <subclass name="Dog" discriminator-value="D">
            <subclass entity-name="Puppy"/>
        </subclass>
    </class>
    <sql-query name="q"><![CDATA[select * from ANIMAL where a < 3]]></sql-query>
</hibernate-mapping>"#;

    fn parse(xml: &str) -> HbmDocument {
        HbmDocument::parse(xml, Origin::new(OriginType::String, "test")).unwrap()
    }

    #[test]
    fn test_parse_tree() {
        let doc = parse(ANIMALS);
        assert_eq!(doc.default_package(), Some("org.acme"));

        let class = doc.root().child("class").unwrap();
        assert_eq!(class.attribute("table"), Some("ANIMAL"));
        assert_eq!(class.child_text("meta"), Some("Ada & Bob"));
        assert_eq!(class.children_named("subclass").count(), 1);

        let query = doc.root().child("sql-query").unwrap();
        assert_eq!(query.text_trim(), "select * from ANIMAL where a < 3");
    }

    #[test]
    fn test_entity_names_recurse() {
        let doc = parse(ANIMALS);
        let names: Vec<_> = doc.entity_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["org.acme.Animal", "org.acme.Dog", "Puppy"]);
    }

    #[test]
    fn test_entity_name_qualification() {
        let element = XmlElement::new("class").with_attribute("name", "x.y.Thing");
        assert_eq!(
            entity_name_of(&element, Some("org.acme")).as_deref(),
            Some("x.y.Thing")
        );

        let element = XmlElement::new("class").with_attribute("name", "Thing");
        assert_eq!(entity_name_of(&element, None).as_deref(), Some("Thing"));
    }

    #[test]
    fn test_missing_entity_name() {
        let doc = parse(r#"<hibernate-mapping><class table="T"/></hibernate-mapping>"#);
        assert!(doc.entity_names().is_err());
    }

    #[test]
    fn test_extends_needed() {
        let doc = parse(
            r#"<hibernate-mapping package="p">
                <subclass name="Bar" extends="Foo"/>
                <subclass name="Baz" extends="Bar"/>
                <joined-subclass name="Qux" extends="p.Known"/>
            </hibernate-mapping>"#,
        );

        let needed = doc.extends_needed(|name| name == "p.Known").unwrap();
        assert_eq!(needed, vec!["Foo".to_string()]);

        let needed = doc.extends_needed(|name| name == "p.Foo" || name == "p.Known").unwrap();
        assert!(needed.is_empty());
    }

    #[test]
    fn test_wrong_root_rejected() {
        let result = HbmDocument::parse("<mapping/>", Origin::new(OriginType::String, "x"));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let result = HbmDocument::parse(
            "<hibernate-mapping><class></hibernate-mapping>",
            Origin::new(OriginType::String, "x"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_document_ids_are_unique() {
        let first = parse("<hibernate-mapping/>");
        let second = parse("<hibernate-mapping/>");
        assert_ne!(first.id(), second.id());
    }
}

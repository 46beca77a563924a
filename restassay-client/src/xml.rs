//! XPath-queryable XML documents.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use quick_xml::escape::escape;
use sxd_document::Package;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};

use crate::{Error, Result};

thread_local! {
    // Last parsed source on this thread, keyed by its shared text.
    static PARSED: RefCell<Option<(Arc<str>, Package)>> = const { RefCell::new(None) };
}

#[cfg(test)]
thread_local! {
    static PARSES: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

/// An immutable XML document with a set of registered namespace prefixes.
///
/// The document keeps its validated source text, so the type is `Send + Sync`
/// and cheap to clone. The parsed tree is not `Send`; each thread keeps the
/// tree of the document it queried last, so consecutive queries against one
/// document (or its clones) parse it once. Registering a namespace returns a
/// new document sharing the same text; the original is unchanged.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    source: Arc<str>,
    namespaces: BTreeMap<String, String>,
}

impl XmlDocument {
    /// Parse XML text.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text: String = text.into();
        let source: Arc<str> = Arc::from(text);
        let package = parse_package(&source)?;
        PARSED.with(|cell| *cell.borrow_mut() = Some((Arc::clone(&source), package)));
        Ok(Self {
            source,
            namespaces: BTreeMap::new(),
        })
    }

    /// The document text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Registered namespace prefixes.
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// A copy of this document with one more namespace prefix registered.
    pub fn register_ns(&self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let mut document = self.clone();
        document.namespaces.insert(prefix.into(), uri.into());
        document
    }

    /// A copy of this document with all the given prefixes registered.
    pub fn merge<I, K, V>(&self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut document = self.clone();
        document
            .namespaces
            .extend(namespaces.into_iter().map(|(k, v)| (k.into(), v.into())));
        document
    }

    /// Evaluate an XPath query and return matches as strings.
    ///
    /// Node sets yield the string value of each node in document order;
    /// scalar results yield a single string.
    pub fn xpath(&self, query: &str) -> Result<Vec<String>> {
        self.evaluate(query, |value| {
            Ok(match value {
                Value::Nodeset(nodes) => nodes
                    .document_order()
                    .iter()
                    .map(|node| node.string_value())
                    .collect(),
                Value::String(text) => vec![text],
                Value::Number(number) => vec![number.to_string()],
                Value::Boolean(flag) => vec![flag.to_string()],
            })
        })
    }

    /// Check if an XPath query selects anything, using XPath `boolean()`
    /// semantics for scalar results.
    pub fn matches(&self, query: &str) -> Result<bool> {
        self.evaluate(query, |value| {
            Ok(match value {
                Value::Nodeset(nodes) => nodes.size() > 0,
                Value::String(text) => !text.is_empty(),
                Value::Number(number) => number != 0.0 && !number.is_nan(),
                Value::Boolean(flag) => flag,
            })
        })
    }

    /// Evaluate an XPath query and return each matching element as its own
    /// document, carrying this document's namespaces.
    pub fn nodes(&self, query: &str) -> Result<Vec<XmlDocument>> {
        self.evaluate(query, |value| {
            let nodes = match value {
                Value::Nodeset(nodes) => nodes,
                _ => {
                    return Err(Error::Document(format!(
                        "XPath '{}' does not select nodes",
                        query
                    )));
                }
            };
            nodes
                .document_order()
                .into_iter()
                .map(|node| {
                    let element = match node {
                        Node::Element(element) => element,
                        Node::Root(root) => root
                            .children()
                            .into_iter()
                            .find_map(|child| match child {
                                ChildOfRoot::Element(element) => Some(element),
                                _ => None,
                            })
                            .ok_or_else(|| Error::Document("document has no root element".into()))?,
                        _ => {
                            return Err(Error::Document(format!(
                                "XPath '{}' selects a node that is not an element",
                                query
                            )));
                        }
                    };
                    let mut text = String::new();
                    write_element(element, None, &mut text);
                    Ok(XmlDocument {
                        source: Arc::from(text),
                        namespaces: self.namespaces.clone(),
                    })
                })
                .collect()
        })
    }

    fn evaluate<T>(&self, query: &str, read: impl FnOnce(Value<'_>) -> Result<T>) -> Result<T> {
        // Taken out of the slot so that `read` may query other documents.
        let package = match PARSED.with(|cell| cell.borrow_mut().take()) {
            Some((source, package)) if Arc::ptr_eq(&source, &self.source) => package,
            _ => parse_package(&self.source)?,
        };
        let result = self.query(&package, query, read);
        PARSED.with(|cell| *cell.borrow_mut() = Some((Arc::clone(&self.source), package)));
        result
    }

    fn query<T>(
        &self,
        package: &Package,
        query: &str,
        read: impl FnOnce(Value<'_>) -> Result<T>,
    ) -> Result<T> {
        let document = package.as_document();

        let xpath = Factory::new()
            .build(query)
            .map_err(|e| Error::Document(format!("invalid XPath '{}': {}", query, e)))?
            .ok_or_else(|| Error::Document(format!("empty XPath '{}'", query)))?;

        let mut context = Context::new();
        for (prefix, uri) in &self.namespaces {
            context.set_namespace(prefix, uri);
        }

        let value = xpath
            .evaluate(&context, document.root())
            .map_err(|e| Error::Document(format!("XPath '{}' failed: {}", query, e)))?;
        read(value)
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_package(source: &str) -> Result<Package> {
    #[cfg(test)]
    PARSES.with(|count| count.set(count.get() + 1));
    parser::parse(source).map_err(|e| Error::Document(format!("malformed XML: {:?}", e)))
}

// Writes an element subtree, declaring every namespace it uses so the output
// parses on its own.
fn write_element<'d>(element: Element<'d>, default_ns: Option<&'d str>, out: &mut String) {
    let name = element.name();
    let mut declared = BTreeSet::new();
    let mut declarations = String::new();
    let mut inherited = default_ns;

    let tag = match (element.preferred_prefix(), name.namespace_uri()) {
        (Some(prefix), Some(uri)) => {
            declared.insert(prefix.to_string());
            declarations.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(uri)));
            format!("{}:{}", prefix, name.local_part())
        }
        (_, Some(uri)) => {
            if default_ns != Some(uri) {
                declarations.push_str(&format!(" xmlns=\"{}\"", escape(uri)));
            }
            inherited = Some(uri);
            name.local_part().to_string()
        }
        (_, None) => {
            if default_ns.is_some() {
                declarations.push_str(" xmlns=\"\"");
            }
            inherited = None;
            name.local_part().to_string()
        }
    };

    out.push('<');
    out.push_str(&tag);
    out.push_str(&declarations);
    for attribute in element.attributes() {
        let attr_name = attribute.name();
        let qualified = match (attribute.preferred_prefix(), attr_name.namespace_uri()) {
            (Some(prefix), Some(uri)) => {
                if declared.insert(prefix.to_string()) {
                    out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(uri)));
                }
                format!("{}:{}", prefix, attr_name.local_part())
            }
            _ => attr_name.local_part().to_string(),
        };
        out.push_str(&format!(" {}=\"{}\"", qualified, escape(attribute.value())));
    }

    let children = element.children();
    if children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in children {
        match child {
            ChildOfElement::Element(child) => write_element(child, inherited, out),
            ChildOfElement::Text(text) => out.push_str(&escape(text.text())),
            ChildOfElement::Comment(comment) => {
                out.push_str(&format!("<!--{}-->", comment.text()));
            }
            ChildOfElement::ProcessingInstruction(pi) => match pi.value() {
                Some(value) => out.push_str(&format!("<?{} {}?>", pi.target(), value)),
                None => out.push_str(&format!("<?{}?>", pi.target())),
            },
        }
    }
    out.push_str(&format!("</{}>", tag));
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = "<data><user id=\"1\">John</user><user id=\"2\">Jane &amp; co</user></data>";

    #[test]
    fn test_xpath_text_and_attributes() {
        let document = XmlDocument::parse(USERS).unwrap();
        assert_eq!(document.xpath("/data/user").unwrap(), vec!["John", "Jane & co"]);
        assert_eq!(document.xpath("/data/user/@id").unwrap(), vec!["1", "2"]);
        assert!(document.xpath("/data/missing").unwrap().is_empty());
    }

    #[test]
    fn test_xpath_scalars() {
        let document = XmlDocument::parse(USERS).unwrap();
        assert_eq!(document.xpath("count(/data/user)").unwrap(), vec!["2"]);
        assert!(document.matches("/data/user[.='John']").unwrap());
        assert!(!document.matches("/data/user[.='Bob']").unwrap());
        assert!(!document.matches("count(/data/user) = 3").unwrap());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            XmlDocument::parse("<data><user></data>"),
            Err(Error::Document(_))
        ));
    }

    #[test]
    fn test_invalid_query() {
        let document = XmlDocument::parse(USERS).unwrap();
        assert!(matches!(document.xpath("/data/["), Err(Error::Document(_))));
    }

    #[test]
    fn test_namespaces() {
        let document =
            XmlDocument::parse("<r:root xmlns:r=\"urn:test\"><r:item>x</r:item></r:root>").unwrap();
        assert!(document.xpath("/t:root/t:item").is_err());

        let registered = document.register_ns("t", "urn:test");
        assert!(document.namespaces().is_empty());
        assert_eq!(registered.xpath("/t:root/t:item/text()").unwrap(), vec!["x"]);

        let merged = document.merge([("t", "urn:test")]);
        assert_eq!(merged.xpath("/t:root/t:item").unwrap(), vec!["x"]);
    }

    #[test]
    fn test_nodes_are_standalone_documents() {
        let document = XmlDocument::parse(USERS).unwrap();
        let nodes = document.nodes("/data/user").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].xpath("/user/@id").unwrap(), vec!["2"]);
        assert_eq!(nodes[1].xpath("/user").unwrap(), vec!["Jane & co"]);
    }

    #[test]
    fn test_nodes_keep_default_namespace() {
        let document = XmlDocument::parse(
            "<feed xmlns=\"urn:feed\"><entry><title>a</title></entry></feed>",
        )
        .unwrap()
        .register_ns("f", "urn:feed");

        let entries = document.nodes("/f:feed/f:entry").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].namespaces().get("f").map(String::as_str), Some("urn:feed"));
        assert_eq!(entries[0].xpath("/f:entry/f:title/text()").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_queries_reuse_the_parsed_tree() {
        let parses = || PARSES.with(|count| count.get());
        let users = XmlDocument::parse(USERS).unwrap();
        let other = XmlDocument::parse("<other><item>x</item></other>").unwrap();

        let before = parses();
        assert_eq!(other.xpath("/other/item").unwrap(), vec!["x"]);
        assert_eq!(other.register_ns("o", "urn:o").xpath("count(//item)").unwrap(), vec!["1"]);
        assert_eq!(parses(), before);

        // Switching documents re-parses, and results stay per document.
        assert_eq!(users.xpath("/data/user/@id").unwrap(), vec!["1", "2"]);
        assert_eq!(other.xpath("/other/item").unwrap(), vec!["x"]);
        assert_eq!(parses(), before + 2);
    }

    #[test]
    fn test_nodes_escape_text_and_attributes() {
        let document =
            XmlDocument::parse("<a><b title=\"x &quot;y&quot;\">1 &lt; 2 &amp; 3</b></a>").unwrap();
        let nodes = document.nodes("/a/b").unwrap();
        assert_eq!(nodes[0].xpath("/b/@title").unwrap(), vec!["x \"y\""]);
        assert_eq!(nodes[0].xpath("/b").unwrap(), vec!["1 < 2 & 3"]);
    }

    #[test]
    fn test_nodes_reject_scalars() {
        let document = XmlDocument::parse(USERS).unwrap();
        assert!(document.nodes("count(/data/user)").is_err());
    }
}

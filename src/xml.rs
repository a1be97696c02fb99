//! Namespace-aware XML element tree.
//!
//! Uses quick-xml which is safe against XXE by default (doesn't expand entities).
//! The whole document is read into a small tree; WSDL cross-references
//! (`binding="tns:CalcBinding"` etc.) are resolved against it afterwards.

use crate::config::XxePreventionConfig;
use crate::error::{Result, WsdlError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// In-scope prefix bindings. The empty prefix is the default namespace.
pub type NamespaceScope = BTreeMap<String, String>;

/// An expanded name: namespace URI plus local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    /// Namespace URI (empty when the name is not in a namespace)
    pub namespace: String,
    /// Local part
    pub local_name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

/// A parsed element.
#[derive(Debug, Clone)]
pub struct Element {
    /// Resolved namespace URI (None when unqualified or the prefix is unbound)
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
    /// Non-namespace attributes, by qualified name as written
    attributes: Vec<(String, String)>,
    /// Prefix bindings in scope for this element
    scope: Rc<NamespaceScope>,
    /// Child elements in document order
    pub children: Vec<Element>,
    /// Concatenated text content
    pub text: String,
}

impl Element {
    /// Check the element's expanded name.
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Get an attribute value by its name as written.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Children with the given expanded name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |child| child.is(namespace, local_name))
    }

    /// First child with the given expanded name.
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|child| child.is(namespace, local_name))
    }

    /// Prefix bindings in scope for this element.
    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }

    /// Resolve a QName-valued attribute (`tns:Foo`, `xsd:int`, `Foo`).
    ///
    /// Unprefixed values take the default namespace. An unbound prefix
    /// resolves to an empty namespace.
    pub fn resolve_qname(&self, value: &str) -> QualifiedName {
        let value = value.trim();
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", value),
        };
        let namespace = self.scope.get(prefix).cloned().unwrap_or_default();
        QualifiedName::new(namespace, local)
    }

    /// Resolve a QName-valued attribute, if present.
    pub fn attr_qname(&self, name: &str) -> Option<QualifiedName> {
        self.attr(name).map(|value| self.resolve_qname(value))
    }
}

/// Parse a complete document into its root element.
///
/// Any well-formedness problem (unbalanced or mismatched tags, text or a
/// second element outside the root, unknown entities, an empty document)
/// is reported as `WsdlError::Syntax`.
pub fn parse_document(xml: &str, xxe: &XxePreventionConfig) -> Result<Element> {
    if xxe.enabled {
        check_xxe_patterns(xml, xxe)?;
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root_scope = NamespaceScope::new();
    root_scope.insert("xml".to_string(), XML_NS.to_string());
    let root_scope = Rc::new(root_scope);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let parent_scope = stack.last().map(|p| &p.scope).unwrap_or(&root_scope);
                let element = open_element(e, parent_scope)?;
                stack.push(element);
            }

            Ok(Event::Empty(ref e)) => {
                let parent_scope = stack.last().map(|p| &p.scope).unwrap_or(&root_scope);
                let element = open_element(e, parent_scope)?;
                attach(element, &mut stack, &mut root)?;
            }

            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| WsdlError::Syntax("unexpected closing tag".to_string()))?;
                attach(element, &mut stack, &mut root)?;
            }

            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| WsdlError::Syntax(format!("invalid text content: {}", e)))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None => {
                        return Err(WsdlError::Syntax(
                            "text content outside the root element".to_string(),
                        ))
                    }
                }
            }

            Ok(Event::CData(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e));
                }
            }

            Ok(Event::DocType(_)) => {
                if xxe.enabled && xxe.block_doctype {
                    return Err(WsdlError::UnsafeDocument(
                        "DOCTYPE declarations are not allowed".to_string(),
                    ));
                }
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(WsdlError::Syntax(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }

            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(WsdlError::Syntax(format!(
            "unexpected end of document, <{}> is not closed",
            open.local_name
        )));
    }

    root.ok_or_else(|| WsdlError::Syntax("document has no root element".to_string()))
}

/// Hand a finished element to its parent, or make it the root.
fn attach(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(WsdlError::Syntax(format!(
                "more than one root element (<{}>)",
                element.local_name
            )));
        }
        None => *root = Some(element),
    }
    Ok(())
}

/// Build an element from its start tag, extending the namespace scope.
fn open_element(e: &BytesStart, parent_scope: &Rc<NamespaceScope>) -> Result<Element> {
    let mut declarations: Vec<(String, String)> = Vec::new();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| WsdlError::Syntax(format!("invalid attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| WsdlError::Syntax(format!("invalid attribute name: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| WsdlError::Syntax(format!("invalid attribute value: {}", e)))?
            .into_owned();

        if key == "xmlns" {
            declarations.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_string(), value));
        } else {
            attributes.push((key, value));
        }
    }

    let scope = if declarations.is_empty() {
        Rc::clone(parent_scope)
    } else {
        let mut scope = NamespaceScope::clone(parent_scope);
        for (prefix, uri) in declarations {
            if uri.is_empty() {
                scope.remove(&prefix);
            } else {
                scope.insert(prefix, uri);
            }
        }
        Rc::new(scope)
    };

    let name = e.name();
    let name = std::str::from_utf8(name.as_ref())
        .map_err(|e| WsdlError::Syntax(format!("invalid element name: {}", e)))?;
    let (prefix, local_name) = match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", name),
    };
    let namespace = scope.get(prefix).cloned();

    Ok(Element {
        namespace,
        local_name: local_name.to_string(),
        attributes,
        scope,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Check for XXE attack patterns.
fn check_xxe_patterns(xml: &str, config: &XxePreventionConfig) -> Result<()> {
    if config.block_doctype && (xml.contains("<!DOCTYPE") || xml.contains("<!doctype")) {
        return Err(WsdlError::UnsafeDocument(
            "DOCTYPE declarations are not allowed".to_string(),
        ));
    }

    if config.block_external_entities && (xml.contains("<!ENTITY") || xml.contains("<!entity")) {
        return Err(WsdlError::UnsafeDocument(
            "Entity declarations are not allowed".to_string(),
        ));
    }

    Ok(())
}

//! WSDL 1.1 grammar parsing.
//!
//! Turns a document into a [`ServiceModel`]. Only what the catalog needs is
//! interpreted: inline schema elements, messages, port types, SOAP/HTTP
//! bindings and services. `wsdl:import` is not followed.

use crate::config::XxePreventionConfig;
use crate::error::{Result, WsdlError};
use crate::model::{
    Binding, OperationDescriptor, ParamDescriptor, Port, Service, ServiceModel, SoapVersion,
};
use crate::source::DocumentSource;
use crate::xml::{parse_document, Element, QualifiedName};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use url::Url;

/// WSDL and binding extension namespace URIs.
pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const WSDL_HTTP_NS: &str = "http://schemas.xmlsoap.org/wsdl/http/";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Fetch `uri` through `source` and parse the result.
pub fn parse_from_uri(
    source: &dyn DocumentSource,
    uri: &Url,
    xxe: &XxePreventionConfig,
) -> Result<ServiceModel> {
    let document = source.fetch(uri)?;
    parse_wsdl(&document, xxe)
}

/// Parse a WSDL document.
pub fn parse_wsdl(xml: &str, xxe: &XxePreventionConfig) -> Result<ServiceModel> {
    let root = parse_document(xml, xxe)?;

    if !root.is(WSDL_NS, "definitions") {
        return Err(WsdlError::MalformedGrammar(format!(
            "root element <{}> is not wsdl:definitions",
            root.local_name
        )));
    }

    let target_namespace = root.attr("targetNamespace").map(String::from);
    let schema = SchemaIndex::collect(&root);
    let messages = collect_messages(&root);
    let port_types = collect_port_types(&root);
    let bindings = collect_bindings(&root)?;

    let mut model = ServiceModel {
        target_namespace: target_namespace.clone(),
        prefixes: root
            .scope()
            .iter()
            .filter(|(prefix, _)| prefix.as_str() != "xml")
            .map(|(prefix, uri)| (prefix.clone(), uri.clone()))
            .collect(),
        ..Default::default()
    };

    for service_el in root.children_named(WSDL_NS, "service") {
        let service_name = required_name(service_el, "service")?;
        let service = model
            .services
            .entry(service_name.clone())
            .or_insert_with(|| Service {
                name: service_name.clone(),
                ports: BTreeMap::new(),
            });

        for port_el in service_el.children_named(WSDL_NS, "port") {
            let port_name = required_name(port_el, "port")?;
            if service.ports.contains_key(&port_name) {
                debug!(
                    service = %service_name,
                    port = %port_name,
                    "Port already declared, keeping first declaration"
                );
                continue;
            }

            let binding_ref = port_el.attr_qname("binding").ok_or_else(|| {
                WsdlError::MalformedGrammar(format!("port '{}' has no binding", port_name))
            })?;
            let binding = bindings.get(&binding_ref.local_name).ok_or_else(|| {
                WsdlError::MalformedGrammar(format!(
                    "port '{}' references undeclared binding {}",
                    port_name, binding_ref
                ))
            })?;
            let binding_address = port_address(port_el);

            for op in &binding.operations {
                if let Some(existing) = model.operations.get_mut(&op.name) {
                    // Location comes from the first exposing port that has an address.
                    if existing.location.is_none() && binding_address.is_some() {
                        existing.location = binding_address.clone();
                    }
                    debug!(
                        operation = %op.name,
                        port = %port_name,
                        "Operation already declared, keeping first declaration"
                    );
                    continue;
                }

                let input_params = binding
                    .port_type
                    .as_ref()
                    .and_then(|port_type| port_types.get(&port_type.local_name))
                    .and_then(|ops| ops.get(&op.name))
                    .and_then(|input| input.as_ref())
                    .map(|message| message_params(message, &messages, &schema))
                    .unwrap_or_default();

                model.operations.insert(
                    op.name.clone(),
                    OperationDescriptor {
                        name: op.name.clone(),
                        namespace: op
                            .namespace
                            .clone()
                            .or_else(|| target_namespace.clone())
                            .unwrap_or_default(),
                        soap_action: op.soap_action.clone(),
                        location: binding_address.clone(),
                        input_params,
                    },
                );
            }

            service.ports.insert(
                port_name.clone(),
                Port {
                    name: port_name,
                    binding: binding.name.clone(),
                    binding_address,
                    operations: binding.operations.iter().map(|op| op.name.clone()).collect(),
                },
            );
        }
    }

    model.bindings = bindings
        .into_values()
        .map(|b| {
            (
                b.name.clone(),
                Binding {
                    name: b.name,
                    soap_version: b.soap_version,
                    operations: b.operations.into_iter().map(|op| op.name).collect(),
                },
            )
        })
        .collect();

    debug!(
        services = model.services.len(),
        operations = model.operations.len(),
        "Parsed WSDL document"
    );

    Ok(model)
}

/// Top-level schema declarations from `wsdl:types`.
struct SchemaIndex<'a> {
    elements: HashMap<QualifiedName, (&'a Element, String)>,
    complex_types: HashMap<QualifiedName, (&'a Element, String)>,
}

impl<'a> SchemaIndex<'a> {
    fn collect(root: &'a Element) -> Self {
        let mut index = Self {
            elements: HashMap::new(),
            complex_types: HashMap::new(),
        };

        let schemas = root
            .children_named(WSDL_NS, "types")
            .flat_map(|types| types.children_named(XSD_NS, "schema"));

        for schema in schemas {
            let tns = schema.attr("targetNamespace").unwrap_or_default().to_string();
            for decl in &schema.children {
                let Some(name) = decl.attr("name") else {
                    continue;
                };
                let key = QualifiedName::new(tns.clone(), name);
                if decl.is(XSD_NS, "element") {
                    index.elements.insert(key, (decl, tns.clone()));
                } else if decl.is(XSD_NS, "complexType") {
                    index.complex_types.insert(key, (decl, tns.clone()));
                }
            }
        }

        index
    }

    /// Children of a document/literal wrapper element, in sequence order.
    ///
    /// Returns None when the element is unknown or not a plain sequence.
    fn wrapped_params(&self, element: &QualifiedName) -> Option<Vec<ParamDescriptor>> {
        let (decl, tns) = self.elements.get(element)?;

        let (complex, tns) = match decl.child(XSD_NS, "complexType") {
            Some(inline) => (inline, tns),
            None => {
                let type_ref = decl.attr_qname("type")?;
                let (named, tns) = self.complex_types.get(&type_ref)?;
                (*named, tns)
            }
        };

        let group = complex
            .child(XSD_NS, "sequence")
            .or_else(|| complex.child(XSD_NS, "all"));
        let group = match group {
            Some(group) => group,
            // no content model at all: an operation without arguments
            None if complex.children.is_empty() => return Some(Vec::new()),
            None => return None,
        };

        let params = group
            .children_named(XSD_NS, "element")
            .map(|child| self.child_param(child, tns))
            .collect();
        Some(params)
    }

    fn child_param(&self, child: &Element, tns: &str) -> ParamDescriptor {
        if let Some(reference) = child.attr_qname("ref") {
            let type_ref = self
                .elements
                .get(&reference)
                .and_then(|(decl, _)| decl.attr_qname("type"))
                .unwrap_or_else(|| reference.clone());
            return ParamDescriptor {
                name: reference.local_name,
                type_ref: (type_ref.namespace, type_ref.local_name),
            };
        }

        let name = child.attr("name").unwrap_or_default().to_string();
        let type_ref = child
            .attr_qname("type")
            .unwrap_or_else(|| QualifiedName::new(tns, name.clone()));
        ParamDescriptor {
            name,
            type_ref: (type_ref.namespace, type_ref.local_name),
        }
    }
}

/// Message parts by message name.
fn collect_messages(root: &Element) -> HashMap<String, Vec<&Element>> {
    root.children_named(WSDL_NS, "message")
        .filter_map(|message| {
            let name = message.attr("name")?;
            Some((name.to_string(), message.children_named(WSDL_NS, "part").collect()))
        })
        .collect()
}

/// Input message of each port type operation, by port type name.
fn collect_port_types(root: &Element) -> HashMap<String, HashMap<String, Option<QualifiedName>>> {
    root.children_named(WSDL_NS, "portType")
        .filter_map(|port_type| {
            let name = port_type.attr("name")?;
            let ops = port_type
                .children_named(WSDL_NS, "operation")
                .filter_map(|op| {
                    let op_name = op.attr("name")?;
                    let input = op
                        .child(WSDL_NS, "input")
                        .and_then(|input| input.attr_qname("message"));
                    Some((op_name.to_string(), input))
                })
                .collect();
            Some((name.to_string(), ops))
        })
        .collect()
}

/// A binding as read from the document, before it is folded into the model.
struct RawBinding {
    name: String,
    port_type: Option<QualifiedName>,
    soap_version: Option<SoapVersion>,
    operations: Vec<BindingOperation>,
}

struct BindingOperation {
    name: String,
    soap_action: String,
    namespace: Option<String>,
}

fn collect_bindings(root: &Element) -> Result<BTreeMap<String, RawBinding>> {
    let mut bindings = BTreeMap::new();

    for binding_el in root.children_named(WSDL_NS, "binding") {
        let name = required_name(binding_el, "binding")?;

        let soap_version = if binding_el.child(WSDL_SOAP11_NS, "binding").is_some() {
            Some(SoapVersion::Soap11)
        } else if binding_el.child(WSDL_SOAP12_NS, "binding").is_some() {
            Some(SoapVersion::Soap12)
        } else {
            None
        };

        let operations = binding_el
            .children_named(WSDL_NS, "operation")
            .map(|op| {
                let op_name = required_name(op, "binding operation")?;
                let soap_action = soap_extension(op, "operation")
                    .and_then(|soap_op| soap_op.attr("soapAction"))
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let namespace = op
                    .child(WSDL_NS, "input")
                    .and_then(|input| soap_extension(input, "body"))
                    .and_then(|body| body.attr("namespace"))
                    .filter(|ns| !ns.is_empty())
                    .map(String::from);
                Ok(BindingOperation {
                    name: op_name,
                    soap_action,
                    namespace,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        bindings.insert(
            name.clone(),
            RawBinding {
                name,
                port_type: binding_el.attr_qname("type"),
                soap_version,
                operations,
            },
        );
    }

    Ok(bindings)
}

/// Expand the parts of an input message into parameters.
fn message_params(
    message: &QualifiedName,
    messages: &HashMap<String, Vec<&Element>>,
    schema: &SchemaIndex<'_>,
) -> Vec<ParamDescriptor> {
    let Some(parts) = messages.get(&message.local_name) else {
        debug!(input_message = %message, "Input message not declared");
        return Vec::new();
    };

    let mut params = Vec::new();
    for part in parts {
        let part_name = part.attr("name").unwrap_or_default().to_string();

        if let Some(type_ref) = part.attr_qname("type") {
            params.push(ParamDescriptor {
                name: part_name,
                type_ref: (type_ref.namespace, type_ref.local_name),
            });
        } else if let Some(element) = part.attr_qname("element") {
            match schema.wrapped_params(&element) {
                Some(wrapped) => params.extend(wrapped),
                None => params.push(ParamDescriptor {
                    name: part_name,
                    type_ref: (element.namespace, element.local_name),
                }),
            }
        } else {
            params.push(ParamDescriptor {
                name: part_name,
                type_ref: (String::new(), String::new()),
            });
        }
    }
    params
}

/// Address a port is bound to, from any supported binding extension.
fn port_address(port: &Element) -> Option<String> {
    [WSDL_SOAP11_NS, WSDL_SOAP12_NS, WSDL_HTTP_NS]
        .iter()
        .find_map(|ns| port.child(ns, "address"))
        .and_then(|address| address.attr("location"))
        .map(|location| location.trim().to_string())
}

/// SOAP 1.1 or 1.2 extension child with the given local name.
fn soap_extension<'a>(parent: &'a Element, local_name: &str) -> Option<&'a Element> {
    parent
        .child(WSDL_SOAP11_NS, local_name)
        .or_else(|| parent.child(WSDL_SOAP12_NS, local_name))
}

fn required_name(element: &Element, what: &str) -> Result<String> {
    element
        .attr("name")
        .map(String::from)
        .ok_or_else(|| WsdlError::MalformedGrammar(format!("{} without a name", what)))
}

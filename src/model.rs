//! In-memory service model built from a WSDL document.
//!
//! The model is read-only once built. Catalog views (`Operation`,
//! `Parameter`) are derived from it on demand.

use crate::error::{Result, WsdlError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SOAP versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoapVersion {
    /// SOAP 1.1 (binding namespace: http://schemas.xmlsoap.org/wsdl/soap/)
    #[serde(rename = "1.1")]
    Soap11,
    /// SOAP 1.2 (binding namespace: http://schemas.xmlsoap.org/wsdl/soap12/)
    #[serde(rename = "1.2")]
    Soap12,
}

/// Navigable model of one WSDL document.
#[derive(Debug, Clone, Default)]
pub struct ServiceModel {
    /// `targetNamespace` of the definitions element
    pub target_namespace: Option<String>,
    /// Prefix bindings declared on the definitions element
    pub prefixes: BTreeMap<String, String>,
    /// Bindings by local name
    pub bindings: BTreeMap<String, Binding>,
    /// Services by name
    pub services: BTreeMap<String, Service>,
    /// Operations by name
    pub operations: BTreeMap<String, OperationDescriptor>,
}

/// A `wsdl:binding`.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Binding name
    pub name: String,
    /// SOAP version when this is a SOAP binding (None for HTTP bindings)
    pub soap_version: Option<SoapVersion>,
    /// Operation names declared by the binding, in document order
    pub operations: Vec<String>,
}

/// A `wsdl:service`.
#[derive(Debug, Clone, Default)]
pub struct Service {
    /// Service name
    pub name: String,
    /// Ports by name
    pub ports: BTreeMap<String, Port>,
}

/// A `wsdl:port`.
#[derive(Debug, Clone)]
pub struct Port {
    /// Port name
    pub name: String,
    /// Binding this port implements (local name)
    pub binding: String,
    /// Network address the port is bound to, as written
    pub binding_address: Option<String>,
    /// Operation names reachable through this port
    pub operations: Vec<String>,
}

/// One operation, as declared by the grammar.
#[derive(Debug, Clone, Default)]
pub struct OperationDescriptor {
    /// Operation name
    pub name: String,
    /// Namespace the operation's body elements live in
    pub namespace: String,
    /// `soapAction` as written (may be empty)
    pub soap_action: String,
    /// Address of the first port exposing the operation, as written
    pub location: Option<String>,
    /// Input parameters in declaration order
    pub input_params: Vec<ParamDescriptor>,
}

/// One input parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Parameter name
    pub name: String,
    /// Parameter type as `(namespace, local name)`
    pub type_ref: (String, String),
}

/// Result of looking an operation up by name.
#[derive(Debug, Clone, Copy)]
pub enum OperationLookup<'a> {
    Found(&'a OperationDescriptor),
    NotFound,
}

impl<'a> OperationLookup<'a> {
    /// Turn a miss into `WsdlError::UnknownOperation`.
    pub fn require(self, name: &str) -> Result<&'a OperationDescriptor> {
        match self {
            Self::Found(descriptor) => Ok(descriptor),
            Self::NotFound => Err(WsdlError::UnknownOperation(name.to_string())),
        }
    }
}

impl ServiceModel {
    /// Look an operation up by name.
    pub fn lookup(&self, name: &str) -> OperationLookup<'_> {
        match self.operations.get(name) {
            Some(descriptor) => OperationLookup::Found(descriptor),
            None => OperationLookup::NotFound,
        }
    }

    /// True when the document declares at least one service.
    pub fn has_services(&self) -> bool {
        !self.services.is_empty()
    }

    /// Iterate every port of every service.
    pub fn ports(&self) -> impl Iterator<Item = (&Service, &Port)> {
        self.services
            .values()
            .flat_map(|service| service.ports.values().map(move |port| (service, port)))
    }

    /// Operation names in the model.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

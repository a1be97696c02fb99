//! Endpoint and operation catalog extraction.
//!
//! Pure reads over an already-built model. Unknown operations and
//! malformed addresses are errors, never silently skipped.

use crate::error::{Result, WsdlError};
use crate::model::{OperationDescriptor, ServiceModel};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// A remote operation, ready to be called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    /// Operation name
    pub name: String,
    /// Namespace of the operation's body elements
    pub namespace: String,
    /// SOAPAction to send (None when the document leaves it empty)
    pub soap_action: Option<Url>,
    /// Endpoint the operation is reachable at
    pub location: Option<Url>,
    /// Positional call arguments, in declaration order
    pub parameters: Vec<Parameter>,
}

/// One call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    /// Argument name
    pub name: String,
    /// Local name of the argument's type
    pub type_name: String,
    /// Namespace of the argument's type
    pub type_namespace: String,
}

/// An accepted service description and the model it was built from.
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    uri: Url,
    model: ServiceModel,
}

impl ServiceDescription {
    pub fn new(uri: Url, model: ServiceModel) -> Self {
        Self { uri, model }
    }

    /// URI the description was loaded from.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn model(&self) -> &ServiceModel {
        &self.model
    }

    /// Every distinct address the service's ports are bound to.
    pub fn discovered_endpoints(&self) -> Result<HashSet<Url>> {
        let mut endpoints = HashSet::new();
        for (_, port) in self.model.ports() {
            if let Some(address) = &port.binding_address {
                endpoints.insert(parse_endpoint(address)?);
            }
        }
        Ok(endpoints)
    }

    /// Every operation in the model, ordered by name.
    pub fn operations(&self) -> Result<Vec<Operation>> {
        self.model
            .operation_names()
            .map(|name| self.operation(name))
            .collect()
    }

    /// Resolve a single operation by name.
    pub fn operation(&self, name: &str) -> Result<Operation> {
        let descriptor = self.model.lookup(name).require(name)?;

        let location = descriptor
            .location
            .as_deref()
            .map(parse_endpoint)
            .transpose()?;
        let soap_action = resolve_soap_action(&descriptor.soap_action, location.as_ref())?;

        Ok(Operation {
            name: descriptor.name.clone(),
            namespace: descriptor.namespace.clone(),
            soap_action,
            location,
            parameters: parameters_of(descriptor),
        })
    }

    /// Input parameters of `operation`, in declaration order.
    pub fn parameters(&self, operation: &str) -> Result<Vec<Parameter>> {
        let descriptor = self.model.lookup(operation).require(operation)?;
        Ok(parameters_of(descriptor))
    }
}

fn parameters_of(descriptor: &OperationDescriptor) -> Vec<Parameter> {
    descriptor
        .input_params
        .iter()
        .map(|param| Parameter {
            name: param.name.clone(),
            // type_ref is (namespace, local name)
            type_namespace: param.type_ref.0.clone(),
            type_name: param.type_ref.1.clone(),
        })
        .collect()
}

fn parse_endpoint(address: &str) -> Result<Url> {
    Url::parse(address).map_err(|e| WsdlError::malformed_endpoint(address, e))
}

/// Absolute SOAP actions are kept as-is; relative ones are resolved
/// against the operation's location.
fn resolve_soap_action(action: &str, location: Option<&Url>) -> Result<Option<Url>> {
    if action.is_empty() {
        return Ok(None);
    }

    match Url::parse(action) {
        Ok(url) => Ok(Some(url)),
        Err(url::ParseError::RelativeUrlWithoutBase) => match location {
            Some(base) => base
                .join(action)
                .map(Some)
                .map_err(|e| WsdlError::malformed_endpoint(action, e)),
            None => Err(WsdlError::malformed_endpoint(
                action,
                url::ParseError::RelativeUrlWithoutBase,
            )),
        },
        Err(e) => Err(WsdlError::malformed_endpoint(action, e)),
    }
}

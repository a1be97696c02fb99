//! WSDL service-description probe for Zentinel crawlers
//!
//! Decides whether a fetched resource describes a SOAP service and, if so,
//! extracts the endpoints and operations it exposes so they can be added as
//! new targets.
//!
//! # Features
//!
//! - Cheap, side-effect free classification (`NotXml` / `NotAService` / `Valid`)
//! - Endpoint discovery from every port's binding address
//! - Operation catalog (namespace, SOAPAction, location, ordered parameters)
//! - One audit record with a structural dump per accepted document
//! - XXE prevention (DOCTYPE and entity declarations are refused)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zentinel_wsdl_probe::{Classification, MemoryAuditStore, WsdlLoader, WsdlProbeConfig};
//!
//! let audit = Arc::new(MemoryAuditStore::new());
//! let loader = WsdlLoader::with_http(WsdlProbeConfig::default(), audit)?;
//!
//! if let Classification::Valid(_) = loader.probe(&uri) {
//!     let description = loader.construct(&uri)?;
//!     for endpoint in description.discovered_endpoints()? {
//!         crawler.schedule(endpoint);
//!     }
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod report;
pub mod source;
pub mod xml;

pub use catalog::{Operation, Parameter, ServiceDescription};
pub use config::WsdlProbeConfig;
pub use error::{ErrorCode, WsdlError};
pub use loader::{Classification, WsdlLoader};
pub use model::{OperationLookup, ServiceModel};
pub use report::{AuditRecord, AuditSink, MemoryAuditStore};
pub use source::{DocumentSource, HttpSource, MemorySource};

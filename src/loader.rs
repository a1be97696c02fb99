//! Service description loading and classification.
//!
//! `probe` answers "is this a usable WSDL?" without side effects, and is
//! safe to call on every document a crawler sees. `construct` loads an
//! accepted document for extraction and leaves one audit record behind.

use crate::catalog::ServiceDescription;
use crate::config::WsdlProbeConfig;
use crate::error::{Result, WsdlError};
use crate::model::ServiceModel;
use crate::parser::parse_from_uri;
use crate::report::{AuditRecord, AuditSink};
use crate::source::{DocumentSource, HttpSource};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of probing a document.
#[derive(Debug)]
pub enum Classification {
    /// Not retrievable, not well-formed, or not a WSDL grammar
    NotXml(WsdlError),
    /// A WSDL document that declares no services
    NotAService,
    /// A usable service description
    Valid(ServiceModel),
}

impl Classification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The model, or the reason there is none.
    pub fn into_model(self, uri: &Url) -> Result<ServiceModel> {
        match self {
            Self::Valid(model) => Ok(model),
            Self::NotAService => Err(WsdlError::NoServicesDeclared(uri.to_string())),
            Self::NotXml(reason) => Err(reason),
        }
    }
}

/// Loads WSDL documents and classifies them.
///
/// Holds no per-document state; one loader can serve any number of
/// concurrent probes.
pub struct WsdlLoader {
    config: WsdlProbeConfig,
    source: Arc<dyn DocumentSource>,
    audit: Arc<dyn AuditSink>,
}

impl WsdlLoader {
    /// Create a loader over an explicit source and audit sink.
    pub fn new(
        config: WsdlProbeConfig,
        source: Arc<dyn DocumentSource>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            source,
            audit,
        }
    }

    /// Create a loader that fetches over HTTP.
    pub fn with_http(config: WsdlProbeConfig, audit: Arc<dyn AuditSink>) -> Result<Self> {
        config.validate()?;
        let source = HttpSource::new(&config.fetch)?;
        Ok(Self::new(config, Arc::new(source), audit))
    }

    /// Classify the document at `uri`.
    ///
    /// Never fails: rejection is the common case and is returned as a value.
    /// The document is reloaded on every call.
    pub fn probe(&self, uri: &Url) -> Classification {
        match self.load(uri) {
            Ok(model) if model.has_services() => {
                debug!(
                    uri = %uri,
                    services = model.services.len(),
                    operations = model.operations.len(),
                    "Document is a WSDL service description"
                );
                Classification::Valid(model)
            }
            Ok(_) => {
                debug!(
                    uri = %uri,
                    code = WsdlError::NoServicesDeclared(uri.to_string()).code().as_str(),
                    "WSDL document declares no services"
                );
                Classification::NotAService
            }
            Err(e) => {
                debug!(
                    uri = %uri,
                    code = e.code().as_str(),
                    error = %e,
                    "Document is not a readable WSDL"
                );
                Classification::NotXml(e)
            }
        }
    }

    /// Load an accepted document for extraction.
    ///
    /// Does not repeat the service-count check `probe` makes. Appends exactly
    /// one audit record per successful call.
    pub fn construct(&self, uri: &Url) -> Result<ServiceDescription> {
        let model = self.load(uri).map_err(|e| {
            warn!(
                uri = %uri,
                code = e.code().as_str(),
                error = %e,
                "Failed to construct service description"
            );
            WsdlError::InvalidDocument {
                uri: uri.to_string(),
                source: Box::new(e),
            }
        })?;

        self.report(&model);

        info!(
            uri = %uri,
            services = model.services.len(),
            operations = model.operations.len(),
            "Constructed service description"
        );

        Ok(ServiceDescription::new(uri.clone(), model))
    }

    fn load(&self, uri: &Url) -> Result<ServiceModel> {
        parse_from_uri(self.source.as_ref(), uri, &self.config.xxe_prevention)
    }

    fn report(&self, model: &ServiceModel) {
        let record = AuditRecord::for_model(model, &self.config.audit);
        self.audit.append(&self.config.audit.category, record);
    }
}

//! Configuration types for the WSDL probe.

use crate::error::{Result, WsdlError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the WSDL probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WsdlProbeConfig {
    /// Config version
    pub version: String,

    /// Document retrieval settings
    pub fetch: FetchConfig,

    /// XXE prevention configuration
    pub xxe_prevention: XxePreventionConfig,

    /// Audit record settings
    pub audit: AuditConfig,
}

impl Default for WsdlProbeConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            fetch: FetchConfig::default(),
            xxe_prevention: XxePreventionConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl WsdlProbeConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| WsdlError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every fetch fail.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 {
            return Err(WsdlError::Config("fetch.timeout_secs must be greater than 0".into()));
        }
        if self.fetch.max_document_size == 0 {
            return Err(WsdlError::Config(
                "fetch.max_document_size must be greater than 0".into(),
            ));
        }
        if self.audit.category.is_empty() {
            return Err(WsdlError::Config("audit.category must not be empty".into()));
        }
        Ok(())
    }
}

/// Document retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum document size to accept (bytes)
    pub max_document_size: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_document_size: 5 * 1_048_576, // 5MB
            user_agent: format!("zentinel-wsdl-probe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// XXE (XML External Entity) prevention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XxePreventionConfig {
    /// Enable XXE prevention
    pub enabled: bool,

    /// Refuse documents with DOCTYPE declarations
    pub block_doctype: bool,

    /// Refuse documents with entity declarations
    pub block_external_entities: bool,
}

impl Default for XxePreventionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_doctype: true,
            block_external_entities: true,
        }
    }
}

/// Audit record settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Title given to every record
    pub title: String,

    /// Store category records are appended under
    pub category: String,

    /// Component name recorded as the record's producer
    pub plugin_name: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            title: "SOAP details".to_string(),
            category: "soap_actions".to_string(),
            plugin_name: "web_spider".to_string(),
        }
    }
}
